//! Point cloud containers

use crate::error::{Error, Result};
use crate::point::*;
use serde::{Deserialize, Serialize};
use std::ops::Index;

/// A generic point cloud container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointCloud<T> {
    pub points: Vec<T>,
}

/// One sweep worth of raw returns, valid and invalid
pub type PointBatch = PointCloud<RawPoint>;

impl<T> PointCloud<T> {
    /// Create a new empty point cloud
    pub fn new() -> Self {
        Self { points: Vec::new() }
    }

    /// Create a point cloud from a vector of points
    pub fn from_points(points: Vec<T>) -> Self {
        Self { points }
    }

    /// Get the number of points in the cloud
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the point cloud is empty
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl PointCloud<RawPoint> {
    /// Build a batch from per-field columns, the layout most capture formats
    /// hand out.
    ///
    /// # Errors
    /// Returns [`Error::InvalidData`] if the columns differ in length.
    pub fn from_columns(
        x: &[f32],
        y: &[f32],
        z: &[f32],
        intensity: &[f32],
        invalid: &[bool],
    ) -> Result<Self> {
        let n = x.len();
        if [y.len(), z.len(), intensity.len(), invalid.len()]
            .iter()
            .any(|&len| len != n)
        {
            return Err(Error::InvalidData(format!(
                "column lengths differ: x={}, y={}, z={}, intensity={}, invalid={}",
                n,
                y.len(),
                z.len(),
                intensity.len(),
                invalid.len()
            )));
        }

        let points = (0..n)
            .map(|i| RawPoint {
                x: x[i],
                y: y[i],
                z: z[i],
                intensity: intensity[i],
                invalid: invalid[i],
            })
            .collect();
        Ok(Self { points })
    }

    /// Number of usable returns
    pub fn valid_count(&self) -> usize {
        self.valid().count()
    }

    /// Iterate over the returns that are not flagged invalid and have finite
    /// coordinates
    pub fn valid(&self) -> impl Iterator<Item = &RawPoint> {
        self.points.iter().filter(|p| !p.invalid && p.is_finite())
    }
}

impl<T> Default for PointCloud<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Index<usize> for PointCloud<T> {
    type Output = T;

    fn index(&self, index: usize) -> &Self::Output {
        &self.points[index]
    }
}
