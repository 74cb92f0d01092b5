//! Synthetic scenes shared by the unit tests

use crate::frame::{Frame, Stage};
use crate::grid::GridCell;
use crate::plane_fit::{LeastSquaresPlaneFitter, Plane, PlaneFitter};
use std::cell::RefCell;
use std::ops::Range;
use sweepseg_core::{Point3f, PointBatch, RawPoint, Result, SegmentationConfig};

/// Forward-looking sensor 1.5m above flat ground, 5cm azimuth bins, 1m rings
pub(crate) fn config() -> SegmentationConfig {
    SegmentationConfig {
        mount_height: 1.5,
        max_theta: 1.6,
        theta_grid_size: 0.05,
        n_angular_grids: 64,
        min_dist: 1.0,
        dist_grid_size: 1.0,
        n_dist_grids: 40,
        dz_local: 0.15,
        dz_global: 0.3,
        max_slope: 0.1,
        min_grd_pts: 5,
        min_samples: 4,
        base_h_cut: 1.0,
        h_max_cut: 2.5,
        h_grid_size: 0.5,
    }
}

/// Point at fractional position (u, v) inside grid cell (ix, iy)
pub(crate) fn polar_point(config: &SegmentationConfig, ix: i32, iy: i32, u: f32, v: f32, z: f32) -> RawPoint {
    let theta = (ix as f32 + u) * config.theta_grid_size - config.max_theta;
    let r = config.min_dist + (iy as f32 + v) * config.dist_grid_size;
    RawPoint::new(r * theta.sin(), r * theta.cos(), z, 1.0)
}

/// `per_axis`² points in every cell of the block, z given by `height(x, y)`
pub(crate) fn flat_ground<H>(
    config: &SegmentationConfig,
    angular: Range<i32>,
    range: Range<i32>,
    per_axis: usize,
    height: H,
) -> Vec<RawPoint>
where
    H: Fn(f32, f32) -> f32,
{
    let mut points = Vec::new();
    for ix in angular {
        for iy in range.clone() {
            for a in 0..per_axis {
                for b in 0..per_axis {
                    let u = (a as f32 + 0.5) / per_axis as f32;
                    let v = (b as f32 + 0.5) / per_axis as f32;
                    let mut p = polar_point(config, ix, iy, u, v, 0.0);
                    p.z = height(p.x, p.y);
                    points.push(p);
                }
            }
        }
    }
    points
}

/// Frame at stage `S` with the given cells and heights and no other content
pub(crate) fn staged_frame<S: Stage>(cells: Vec<GridCell>, heights: Vec<f32>) -> Frame<S> {
    assert_eq!(cells.len(), heights.len());
    let batch = PointBatch::from_points(vec![RawPoint::new(0.0, 1.0, 0.0, 0.0); cells.len()]);
    let mut frame = Frame::from_batch(&batch, 1.5).into_stage::<S>();
    frame.cells = cells;
    frame.heights = heights;
    frame
}

/// Least-squares fitter that records the size of every fit request
#[derive(Debug, Default)]
pub(crate) struct RecordingFitter {
    calls: RefCell<Vec<usize>>,
}

impl RecordingFitter {
    pub(crate) fn calls(&self) -> Vec<usize> {
        self.calls.borrow().clone()
    }
}

impl PlaneFitter for RecordingFitter {
    fn fit(&self, points: &[Point3f]) -> Result<Plane> {
        self.calls.borrow_mut().push(points.len());
        LeastSquaresPlaneFitter.fit(points)
    }
}
