//! Hierarchical ground estimation
//!
//! 1. **Global fit**: points whose z lies close to the expected ground
//!    height (`-mount_height`, with a tolerance that grows with range and is
//!    clamped to `[dz_local, dz_global]`) are candidates. One plane is fitted
//!    over all of them; it absorbs the tilt of the sensor platform. Every
//!    point gets its height above that plane and candidates below `dz_local`
//!    are seeded as ground.
//!
//! 2. **Local refinement**: cell by cell, a plane is fitted over the ground
//!    points of the 3×3 neighborhood, its slope clamped to `max_slope`, and
//!    the heights of the centre cell are recomputed. Points inside
//!    `(-dz_global, dz_local)` become ground; everything else loses all of
//!    its flags. Cells are visited range row by range row, so a refinement
//!    sees the flags already rewritten by the cells before it.

use crate::frame::{Estimated, Frame, Gridded, Grounded};
use crate::grid::{CellArena, GridCell};
use crate::plane_fit::{LeastSquaresPlaneFitter, PlaneFitter};
use log::{debug, info, warn};
use rayon::prelude::*;
use sweepseg_core::{Point3f, PointFlags, Result, SegmentationConfig};

/// Ground estimation stage
#[derive(Debug, Clone)]
pub struct GroundEstimator<F = LeastSquaresPlaneFitter> {
    config: SegmentationConfig,
    fitter: F,
}

impl GroundEstimator<LeastSquaresPlaneFitter> {
    /// # Errors
    /// [`sweepseg_core::Error::InvalidConfig`] if the configuration does not validate.
    pub fn new(config: &SegmentationConfig) -> Result<Self> {
        Self::with_fitter(config, LeastSquaresPlaneFitter)
    }
}

impl<F: PlaneFitter> GroundEstimator<F> {
    /// Use a custom plane fitter
    pub fn with_fitter(config: &SegmentationConfig, fitter: F) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: config.clone(),
            fitter,
        })
    }

    pub fn fitter(&self) -> &F {
        &self.fitter
    }

    /// Run the global fit followed by local refinement.
    pub fn estimate(&self, frame: Frame<Gridded>) -> Frame<Grounded> {
        let mut frame = self.estimate_global(frame);
        self.refine_cells(&mut frame);
        frame
    }

    /// Run the global fit only.
    pub fn estimate_global(&self, frame: Frame<Gridded>) -> Frame<Grounded> {
        let mut frame = frame.into_stage::<Grounded>();
        self.fit_global(&mut frame);
        frame
    }

    /// Run local refinement again on an estimated frame.
    pub fn refine<S: Estimated>(&self, mut frame: Frame<S>) -> Frame<S> {
        self.refine_cells(&mut frame);
        frame
    }

    fn fit_global<S: Estimated>(&self, frame: &mut Frame<S>) {
        frame.flags.iter_mut().for_each(PointFlags::clear);
        if frame.is_empty() {
            return;
        }

        let mount_height = self.config.mount_height;
        let candidates: Vec<usize> = (0..frame.len())
            .filter(|&i| {
                let dz = (frame.positions[i].z + mount_height).abs();
                dz < self.config.candidate_tolerance(frame.range_xy[i])
            })
            .collect();
        let candidate_points: Vec<Point3f> = candidates.iter().map(|&i| frame.positions[i]).collect();

        match self.fitter.fit(&candidate_points) {
            Ok(plane) => frame.ground_plane = plane,
            Err(e) => warn!(
                "global ground fit failed over {} candidates ({}), keeping {:?}",
                candidates.len(),
                e,
                frame.ground_plane
            ),
        }

        let plane = frame.ground_plane;
        frame.heights = frame
            .positions
            .par_iter()
            .map(|p| plane.height_of(p))
            .collect();

        let mut seeded = 0;
        for &i in &candidates {
            if frame.heights[i] < self.config.dz_local {
                frame.flags[i].insert(PointFlags::GROUND);
                seeded += 1;
            }
        }

        info!(
            "global ground plane a={:.4} b={:.4} c={:.3} from {} candidates, {} seeds",
            plane.a,
            plane.b,
            plane.c,
            candidates.len(),
            seeded
        );
    }

    fn refine_cells<S: Estimated>(&self, frame: &mut Frame<S>) {
        if frame.is_empty() {
            return;
        }

        let min_pts = self.config.min_grd_pts;
        let arena = CellArena::build(&frame.cells);
        let mut fit_points: Vec<Point3f> = Vec::with_capacity(9 * min_pts);
        let mut refined = 0usize;
        let mut rejected = 0usize;

        for iy in 0..self.config.n_dist_grids as i32 {
            if arena.row_count(iy) < min_pts {
                continue;
            }
            for ix in 0..self.config.n_angular_grids as i32 {
                let cell = GridCell::new(ix, iy);
                let inside = arena.cell(cell);
                if inside.is_empty() {
                    continue;
                }

                fit_points.clear();
                fit_points.extend(
                    arena
                        .neighborhood(cell)
                        .into_iter()
                        .filter(|&i| frame.flags[i].is_ground())
                        .map(|i| frame.positions[i]),
                );
                if fit_points.len() < min_pts {
                    continue;
                }

                let plane = match self.fitter.fit(&fit_points) {
                    Ok(plane) => plane.clamp_slope(self.config.max_slope),
                    Err(e) if e.is_local() => {
                        debug!("skipping cell ({}, {}): {}", ix, iy, e);
                        continue;
                    }
                    Err(e) => {
                        warn!("local ground fit failed at cell ({}, {}): {}", ix, iy, e);
                        continue;
                    }
                };

                for &i in inside {
                    let h = plane.height_of(&frame.positions[i]);
                    frame.heights[i] = h;
                    if h > -self.config.dz_global && h < self.config.dz_local {
                        frame.flags[i].insert(PointFlags::GROUND);
                    } else {
                        frame.flags[i].clear();
                        rejected += 1;
                    }
                }
                refined += 1;
            }
        }

        debug!(
            "local ground refinement: {} cells refitted, {} points rejected",
            refined, rejected
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridIndexer;
    use crate::tests_support::{config, flat_ground, polar_point, RecordingFitter};
    use approx::assert_relative_eq;
    use sweepseg_core::{Error, PointBatch, RawPoint};

    fn gridded(points: Vec<RawPoint>, config: &SegmentationConfig) -> Frame<Gridded> {
        Frame::from_batch(&PointBatch::from_points(points), config.mount_height)
            .grid(&GridIndexer::new(config))
            .unwrap()
    }

    #[test]
    fn test_flat_plane_is_ground_after_global_fit() {
        let config = config();
        // 1000 points on level ground
        let mut points = Vec::new();
        for i in 0..25 {
            for j in 0..40 {
                let x = -5.0 + i as f32 * 0.4;
                let y = 2.0 + j as f32 * 0.25;
                points.push(RawPoint::new(x, y, -config.mount_height, 1.0));
            }
        }
        assert_eq!(points.len(), 1000);

        let frame = GroundEstimator::new(&config).unwrap().estimate_global(gridded(points, &config));
        assert_eq!(frame.ground_count(), 1000);
        for &h in frame.heights() {
            assert!(h.abs() < 1e-4, "height {} should be ~0", h);
        }
        assert_relative_eq!(frame.ground_plane().c, -config.mount_height, epsilon = 1e-4);
    }

    #[test]
    fn test_infinite_return_does_not_poison_the_global_fit() {
        let config = config();
        let mut points = flat_ground(&config, 28..33, 2..7, 2, |_, _| -config.mount_height);
        assert_eq!(points.len(), 100);
        points.push(RawPoint::new(0.0, f32::INFINITY, -config.mount_height, 1.0));

        let frame = GroundEstimator::new(&config).unwrap().estimate_global(gridded(points, &config));
        assert_eq!(frame.len(), 100);
        assert_eq!(frame.ground_count(), 100);
        let plane = frame.ground_plane();
        assert!(plane.a.is_finite() && plane.b.is_finite());
        assert_relative_eq!(plane.c, -config.mount_height, epsilon = 1e-4);
        for &h in frame.heights() {
            assert!(h.abs() < 1e-4, "height {} should be ~0", h);
        }
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let mut config = config();
        config.dz_local = 0.5;
        assert!(matches!(GroundEstimator::new(&config), Err(Error::InvalidConfig(_))));
        assert!(matches!(
            GroundEstimator::with_fitter(&config, RecordingFitter::default()),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_global_fit_absorbs_tilt() {
        let config = config();
        // Gentle tilt, still inside the candidate tolerance everywhere
        let points = flat_ground(&config, 28..36, 0..4, 3, |_, y| -config.mount_height + 0.02 * y);
        let n = points.len();

        let frame = GroundEstimator::new(&config).unwrap().estimate_global(gridded(points, &config));
        assert_relative_eq!(frame.ground_plane().b, 0.02, epsilon = 1e-4);
        assert_eq!(frame.ground_count(), n);
    }

    #[test]
    fn test_local_refinement_promotes_beyond_candidate_tolerance() {
        let config = config();
        // Slope 0.06: beyond ~5m range the ground leaves the candidate band
        let points = flat_ground(&config, 28..36, 0..12, 3, |_, y| -config.mount_height + 0.06 * y);
        let n = points.len();
        let estimator = GroundEstimator::new(&config).unwrap();

        let global = estimator.estimate_global(gridded(points.clone(), &config));
        assert!(global.ground_count() < n);

        let frame = estimator.estimate(gridded(points, &config));
        assert_eq!(frame.ground_count(), n);
        for &h in frame.heights() {
            assert!(h.abs() < 1e-3, "height {} should be ~0 after local fit", h);
        }
    }

    #[test]
    fn test_local_refinement_clamps_slope_not_intercept() {
        let config = config();
        // A 0.3 ramp, three times steeper than max_slope
        let ramp = |y: f32| -config.mount_height + 0.3 * (y - 4.0);
        let points = flat_ground(&config, 28..36, 3..6, 3, |_, y| ramp(y));
        let frame = GroundEstimator::new(&config).unwrap().estimate(gridded(points, &config));

        // The global fit follows the ramp exactly
        assert_relative_eq!(frame.ground_plane().b, 0.3, epsilon = 1e-4);

        for i in 0..frame.len() {
            let y = frame.positions()[i].y;
            if frame.cells()[i].range == 3 {
                // Refitted with slope clamped to 0.1 around the ramp's intercept:
                // h = (0.3y - 2.7) - (0.1y - 2.7) = 0.2y
                assert_relative_eq!(frame.heights()[i], 0.2 * y, epsilon = 1e-3);
                assert_eq!(frame.flags()[i], PointFlags::NONE);
            } else {
                // Rows without ground evidence keep the global heights
                assert!(frame.heights()[i].abs() < 1e-3);
                assert!(!frame.is_ground(i));
            }
        }
    }

    #[test]
    fn test_local_rejection_clears_all_bits() {
        let config = config();
        let mut points = flat_ground(&config, 28..34, 2..6, 3, |_, _| -config.mount_height);
        let bump = points.len();
        points.push(polar_point(&config, 31, 4, 0.5, 0.5, -config.mount_height + 0.5));

        let estimator = GroundEstimator::new(&config).unwrap();
        let mut frame = estimator.estimate_global(gridded(points, &config));
        assert!(!frame.is_ground(bump));

        // Tag the point as if an earlier pass had classified it
        frame.flags[bump] = PointFlags::GROUND | PointFlags::VEHICLE;
        let frame = estimator.refine(frame);

        assert!(frame.heights()[bump] >= config.dz_local);
        assert_eq!(frame.flags()[bump], PointFlags::NONE);
        assert_eq!(frame.flags()[bump].bits(), 0);
    }

    #[test]
    fn test_min_grd_pts_boundary_per_cell() {
        let config = config();
        let offsets = [(0.2, 0.2), (0.8, 0.3), (0.5, 0.5), (0.3, 0.8), (0.7, 0.7)];

        for k in [config.min_grd_pts, config.min_grd_pts - 1] {
            let mut points: Vec<RawPoint> = offsets
                .iter()
                .take(k)
                .map(|&(u, v)| polar_point(&config, 50, 12, u, v, -config.mount_height + 0.1))
                .collect();
            // Same range row, far away in azimuth, well above ground
            points.extend(flat_ground(&config, 10..11, 12..13, 3, |_, _| -0.5));

            let estimator = GroundEstimator::with_fitter(&config, RecordingFitter::default()).unwrap();
            let frame = estimator.estimate(gridded(points, &config));

            let calls = estimator.fitter().calls();
            if k == config.min_grd_pts {
                assert_eq!(calls, vec![k, k], "global fit plus one local fit");
            } else {
                assert_eq!(calls, vec![k], "local fit must be skipped");
            }
            assert_eq!(frame.ground_count(), k);
        }
    }

    #[test]
    fn test_min_grd_pts_boundary_per_row() {
        let config = config();
        let offsets = [(0.2, 0.2), (0.8, 0.3), (0.5, 0.5), (0.3, 0.8), (0.7, 0.7)];

        for (k, local_fits) in [(config.min_grd_pts, 13), (config.min_grd_pts - 1, 12)] {
            let mut points = flat_ground(&config, 28..34, 4..5, 3, |_, _| -config.mount_height);
            points.extend(flat_ground(&config, 28..34, 6..7, 3, |_, _| -config.mount_height));
            for &(u, v) in offsets.iter().take(k) {
                points.push(polar_point(&config, 31, 5, u, v, -config.mount_height));
            }

            let estimator = GroundEstimator::with_fitter(&config, RecordingFitter::default()).unwrap();
            estimator.estimate(gridded(points, &config));

            // One global fit, then one per refined cell
            assert_eq!(estimator.fitter().calls().len(), 1 + local_fits, "k={}", k);
        }
    }

    #[test]
    fn test_refine_is_idempotent_on_converged_frame() {
        let config = config();
        let points = flat_ground(&config, 26..38, 0..10, 3, |x, _| -config.mount_height + 0.01 * x);
        let estimator = GroundEstimator::new(&config).unwrap();

        let first = estimator.estimate(gridded(points, &config));
        let heights = first.heights().to_vec();
        let flags = first.flags().to_vec();

        let second = estimator.refine(first);
        assert_eq!(second.heights(), heights.as_slice());
        assert_eq!(second.flags(), flags.as_slice());
    }

    #[test]
    fn test_ground_count_monotonic_in_dz_global() {
        let base = config();
        let mut points = flat_ground(&base, 26..38, 1..10, 4, |_, _| -base.mount_height);
        // One shallow pit per cell
        for ix in 26..38 {
            for iy in 1..10 {
                points.push(polar_point(&base, ix, iy, 0.5, 0.5, -base.mount_height - 0.25));
            }
        }

        let mut last = 0;
        for dz_global in [0.2, 0.3, 0.45] {
            let mut config = base.clone();
            config.dz_global = dz_global;
            let frame = GroundEstimator::new(&config).unwrap().estimate(gridded(points.clone(), &config));
            let count = frame.ground_count();
            assert!(count >= last, "dz_global {} lowered ground count {} -> {}", dz_global, last, count);
            last = count;
        }
        assert_eq!(last, points.len());
    }

    #[test]
    fn test_no_candidates_keeps_default_plane() {
        let config = config();
        // Everything floats two meters above the expected ground
        let points = flat_ground(&config, 30..32, 2..4, 2, |_, _| -config.mount_height + 2.0);
        let frame = GroundEstimator::new(&config).unwrap().estimate(gridded(points, &config));

        assert_eq!(frame.ground_plane(), crate::plane_fit::Plane::horizontal(-config.mount_height));
        assert_eq!(frame.ground_count(), 0);
        for &h in frame.heights() {
            assert_relative_eq!(h, 2.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_empty_frame_is_noop() {
        let config = config();
        let frame = GroundEstimator::new(&config).unwrap().estimate(gridded(Vec::new(), &config));
        assert!(frame.is_empty());
        assert!(frame.heights().is_empty());
        assert!(frame.flags().is_empty());
    }
}
