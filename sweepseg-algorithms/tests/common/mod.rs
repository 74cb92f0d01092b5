//! Synthetic sweeps for the integration tests.

#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::ops::Range;
use sweepseg_core::{RawPoint, SegmentationConfig};

/// Forward sensor at 1.5m, 64 azimuth bins of 0.05rad, 40 rings of 1m.
pub fn config() -> SegmentationConfig {
    SegmentationConfig::from_json_str(
        r#"{
            "mount_height": 1.5,
            "max_theta": 1.6,
            "theta_grid_size": 0.05,
            "n_angular_grids": 64,
            "min_dist": 1.0,
            "dist_grid_size": 1.0,
            "n_dist_grids": 40,
            "dz_local": 0.15,
            "dz_global": 0.3,
            "max_slope": 0.1,
            "min_grd_pts": 5,
            "min_samples": 4,
            "base_h_cut": 1.0,
            "h_max_cut": 2.5,
            "h_grid_size": 0.5
        }"#,
    )
    .expect("test config is valid")
}

/// Builds a sweep object by object and remembers where each one landed.
pub struct SceneBuilder {
    config: SegmentationConfig,
    rng: StdRng,
    points: Vec<RawPoint>,
}

impl SceneBuilder {
    pub fn new(config: &SegmentationConfig) -> Self {
        Self {
            config: config.clone(),
            rng: StdRng::seed_from_u64(42),
            points: Vec::new(),
        }
    }

    /// Position at fractional offset (u, v) inside grid cell (ix, iy)
    fn at(&self, ix: i32, iy: i32, u: f32, v: f32) -> (f32, f32) {
        let theta = (ix as f32 + u) * self.config.theta_grid_size - self.config.max_theta;
        let r = self.config.min_dist + (iy as f32 + v) * self.config.dist_grid_size;
        (r * theta.sin(), r * theta.cos())
    }

    /// Ground returns over a block of cells, four per cell, with uniform
    /// vertical noise of `noise` metres around `surface(x, y)`.
    pub fn ground<S>(&mut self, angular: Range<i32>, range: Range<i32>, noise: f32, surface: S) -> Range<usize>
    where
        S: Fn(f32, f32) -> f32,
    {
        let start = self.points.len();
        for ix in angular {
            for iy in range.clone() {
                for (u, v) in [(0.25, 0.25), (0.75, 0.25), (0.25, 0.75), (0.75, 0.75)] {
                    let (x, y) = self.at(ix, iy, u, v);
                    let dz = if noise > 0.0 {
                        self.rng.gen_range(-noise..noise)
                    } else {
                        0.0
                    };
                    self.points.push(RawPoint::new(x, y, surface(x, y) + dz, 10.0));
                }
            }
        }
        start..self.points.len()
    }

    /// A narrow object inside one cell, four returns every 0.2m from 0.2m up
    /// to `top` above `surface`.
    pub fn column<S>(&mut self, ix: i32, iy: i32, top: f32, surface: S) -> Range<usize>
    where
        S: Fn(f32, f32) -> f32,
    {
        let start = self.points.len();
        let mut level = 1;
        while 0.2 * level as f32 <= top + 1e-3 {
            let h = 0.2 * level as f32;
            for (u, v) in [(0.3, 0.3), (0.7, 0.3), (0.3, 0.7), (0.7, 0.7)] {
                let (x, y) = self.at(ix, iy, u, v);
                self.points.push(RawPoint::new(x, y, surface(x, y) + h, 80.0));
            }
            level += 1;
        }
        start..self.points.len()
    }

    /// Scatter dropouts flagged invalid between the returns.
    pub fn with_dropouts(mut self, every: usize) -> Self {
        let mut out = Vec::with_capacity(self.points.len() + self.points.len() / every + 1);
        for (i, p) in self.points.drain(..).enumerate() {
            if i % every == 0 {
                out.push(RawPoint::invalid(0.0, 0.0, 0.0));
            }
            out.push(p);
        }
        self.points = out;
        self
    }

    pub fn points(&self) -> &[RawPoint] {
        &self.points
    }

    pub fn build(self) -> Vec<RawPoint> {
        self.points
    }
}

/// Level ground below the sensor
pub fn level(config: &SegmentationConfig) -> impl Fn(f32, f32) -> f32 {
    let z = -config.mount_height;
    move |_, _| z
}
