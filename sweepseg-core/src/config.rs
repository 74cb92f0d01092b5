//! Segmentation configuration
//!
//! Every field is required; there is no sensible sensor-independent default
//! for bin sizes or height thresholds, so configurations are written out in
//! full (usually as JSON next to the sensor calibration).

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Grid resolutions and thresholds for one sensor setup.
///
/// Distances are in meters, angles in radians. Heights are measured from the
/// estimated ground plane, positive upwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SegmentationConfig {
    /// Sensor origin height above the ground
    pub mount_height: f32,
    /// Offset added to the azimuth before binning
    pub max_theta: f32,
    /// Angular bin width
    pub theta_grid_size: f32,
    /// Number of angular bins swept by local ground refinement
    pub n_angular_grids: usize,
    /// Horizontal range mapped to range bin 0
    pub min_dist: f32,
    /// Range bin width
    pub dist_grid_size: f32,
    /// Number of range bins swept by local ground refinement
    pub n_dist_grids: usize,
    /// Upper height bound of ground points; also the lower bound of the
    /// clustering band
    pub dz_local: f32,
    /// Depth below the ground plane still accepted as ground; also the upper
    /// bound of the candidate tolerance
    pub dz_global: f32,
    /// Maximum ground slope (dz per meter)
    pub max_slope: f32,
    /// Minimum ground points for a local plane fit
    pub min_grd_pts: usize,
    /// Minimum occupancy of a 2x2 block to open a new cluster
    pub min_samples: usize,
    /// Top of the clustering band, bottom of the first growth layer
    pub base_h_cut: f32,
    /// Growth stops below this height
    pub h_max_cut: f32,
    /// Thickness of a growth layer
    pub h_grid_size: f32,
}

impl SegmentationConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a JSON configuration file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let config: Self = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration before any frame is processed.
    pub fn validate(&self) -> Result<()> {
        let floats = [
            ("mount_height", self.mount_height),
            ("max_theta", self.max_theta),
            ("theta_grid_size", self.theta_grid_size),
            ("min_dist", self.min_dist),
            ("dist_grid_size", self.dist_grid_size),
            ("dz_local", self.dz_local),
            ("dz_global", self.dz_global),
            ("max_slope", self.max_slope),
            ("base_h_cut", self.base_h_cut),
            ("h_max_cut", self.h_max_cut),
            ("h_grid_size", self.h_grid_size),
        ];
        if let Some((name, value)) = floats.iter().find(|(_, v)| !v.is_finite()) {
            return Err(invalid(format!("{} must be finite, got {}", name, value)));
        }

        for (name, value) in [
            ("theta_grid_size", self.theta_grid_size),
            ("dist_grid_size", self.dist_grid_size),
            ("h_grid_size", self.h_grid_size),
        ] {
            if value <= 0.0 {
                return Err(invalid(format!("{} must be positive, got {}", name, value)));
            }
        }

        for (name, value) in [
            ("mount_height", self.mount_height),
            ("max_theta", self.max_theta),
            ("min_dist", self.min_dist),
            ("max_slope", self.max_slope),
        ] {
            if value < 0.0 {
                return Err(invalid(format!("{} must not be negative, got {}", name, value)));
            }
        }

        if self.n_angular_grids == 0 || self.n_dist_grids == 0 {
            return Err(invalid(format!(
                "grid must have at least one bin per axis, got {}x{}",
                self.n_angular_grids, self.n_dist_grids
            )));
        }

        if self.dz_local > self.dz_global {
            return Err(invalid(format!(
                "dz_local ({}) must not exceed dz_global ({})",
                self.dz_local, self.dz_global
            )));
        }

        if self.h_max_cut <= self.base_h_cut {
            return Err(invalid(format!(
                "h_max_cut ({}) must be above base_h_cut ({})",
                self.h_max_cut, self.base_h_cut
            )));
        }

        // A plane needs three points
        if self.min_grd_pts < 3 {
            return Err(invalid(format!(
                "min_grd_pts must be at least 3, got {}",
                self.min_grd_pts
            )));
        }

        if self.min_samples == 0 {
            return Err(invalid("min_samples must be at least 1".to_string()));
        }

        Ok(())
    }

    /// Tolerance on |z + mount_height| for a point at horizontal range
    /// `range_xy` to be a ground candidate.
    pub fn candidate_tolerance(&self, range_xy: f32) -> f32 {
        (range_xy * self.max_slope).clamp(self.dz_local, self.dz_global)
    }

    /// Number of growth layers between `base_h_cut` and `h_max_cut`.
    pub fn n_layers(&self) -> usize {
        ((self.h_max_cut - self.base_h_cut) / self.h_grid_size).ceil() as usize
    }

    /// Half-open height interval of growth layer `k`.
    pub fn layer_bounds(&self, k: usize) -> (f32, f32) {
        let h0 = self.base_h_cut + k as f32 * self.h_grid_size;
        (h0, h0 + self.h_grid_size)
    }
}

fn invalid(msg: String) -> Error {
    Error::InvalidConfig(msg)
}
