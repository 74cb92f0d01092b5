//! Full single-frame segmentation

use crate::clustering::ClusterBuilder;
use crate::frame::{Frame, Segmented};
use crate::grid::GridIndexer;
use crate::ground::GroundEstimator;
use crate::growing::ClusterGrower;
use crate::plane_fit::{LeastSquaresPlaneFitter, PlaneFitter};
use log::info;
use sweepseg_core::{PointBatch, Result, SegmentationConfig};

/// Runs gridding, ground estimation, cluster seeding and cluster growth
/// on one sweep.
///
/// # Example
///
/// ```
/// use sweepseg_algorithms::Segmenter;
/// use sweepseg_core::{PointBatch, RawPoint, SegmentationConfig};
///
/// let config = SegmentationConfig::from_json_str(r#"{
///     "mount_height": 1.5, "max_theta": 1.6, "theta_grid_size": 0.05,
///     "n_angular_grids": 64, "min_dist": 1.0, "dist_grid_size": 1.0,
///     "n_dist_grids": 40, "dz_local": 0.15, "dz_global": 0.3,
///     "max_slope": 0.1, "min_grd_pts": 5, "min_samples": 4,
///     "base_h_cut": 1.0, "h_max_cut": 2.5, "h_grid_size": 0.5
/// }"#).unwrap();
///
/// let batch = PointBatch::from_points(vec![
///     RawPoint::new(0.0, 4.0, -1.5, 1.0),
///     RawPoint::new(0.5, 6.0, -1.5, 1.0),
///     RawPoint::new(-0.5, 8.0, -1.5, 1.0),
/// ]);
/// let frame = Segmenter::new(config).unwrap().segment(&batch).unwrap();
/// assert_eq!(frame.ground_count(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct Segmenter<F = LeastSquaresPlaneFitter> {
    config: SegmentationConfig,
    indexer: GridIndexer,
    ground: GroundEstimator<F>,
    builder: ClusterBuilder,
    grower: ClusterGrower,
}

impl Segmenter<LeastSquaresPlaneFitter> {
    /// # Errors
    /// [`sweepseg_core::Error::InvalidConfig`] if the configuration does not validate.
    pub fn new(config: SegmentationConfig) -> Result<Self> {
        Self::with_fitter(config, LeastSquaresPlaneFitter)
    }
}

impl<F: PlaneFitter> Segmenter<F> {
    pub fn with_fitter(config: SegmentationConfig, fitter: F) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            indexer: GridIndexer::new(&config),
            ground: GroundEstimator::with_fitter(&config, fitter)?,
            builder: ClusterBuilder::new(&config)?,
            grower: ClusterGrower::new(&config)?,
            config,
        })
    }

    pub fn config(&self) -> &SegmentationConfig {
        &self.config
    }

    /// Segment one batch. Points flagged invalid or with a non-finite
    /// coordinate are dropped first.
    pub fn segment(&self, batch: &PointBatch) -> Result<Frame<Segmented>> {
        let frame = Frame::from_batch(batch, self.config.mount_height);
        if frame.len() < batch.len() {
            info!("dropped {} invalid or non-finite returns", batch.len() - frame.len());
        }

        let frame = frame.grid(&self.indexer)?;
        let frame = self.ground.estimate(frame);
        let frame = self.builder.build(frame);
        let frame = self.grower.grow(frame);

        info!("{}", frame.summary(&self.config));
        Ok(frame)
    }
}
