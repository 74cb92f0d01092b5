//! Point types and related functionality

use nalgebra::Point3;
use serde::{Deserialize, Serialize};

/// A 3D point with floating point coordinates
pub type Point3f = Point3<f32>;

/// A single LiDAR return as delivered by the capture layer.
///
/// Returns flagged `invalid` (no echo, saturated, out of range) are kept in
/// the batch so indices match the sensor layout, and are dropped when a
/// frame is built. So are returns with a non-finite coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawPoint {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub intensity: f32,
    pub invalid: bool,
}

impl RawPoint {
    /// Create a valid return
    pub fn new(x: f32, y: f32, z: f32, intensity: f32) -> Self {
        Self {
            x,
            y,
            z,
            intensity,
            invalid: false,
        }
    }

    /// Create a return marked invalid by the sensor
    pub fn invalid(x: f32, y: f32, z: f32) -> Self {
        Self {
            x,
            y,
            z,
            intensity: 0.0,
            invalid: true,
        }
    }

    /// True if x, y and z are all finite
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Position of the return
    pub fn position(&self) -> Point3f {
        Point3f::new(self.x, self.y, self.z)
    }
}

impl Default for RawPoint {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0, 0.0)
    }
}

impl From<RawPoint> for Point3f {
    fn from(p: RawPoint) -> Self {
        p.position()
    }
}
