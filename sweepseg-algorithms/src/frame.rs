//! Per-sweep frame state
//!
//! A [`Frame`] owns every per-point buffer of one sweep. The stage marker
//! `S` records which stages already ran: each stage takes the frame by value
//! and hands back the next stage type, so the gridding, ground, clustering
//! and growing order cannot be violated by a caller.
//!
//! ```text
//! Frame<Raw> ──grid──► Frame<Gridded> ──GroundEstimator──► Frame<Grounded>
//!     ──ClusterBuilder──► Frame<Clustered> ──ClusterGrower──► Frame<Segmented>
//! ```

use crate::grid::{GridCell, GridIndexer};
use crate::growing::ClusterGrowth;
use crate::plane_fit::Plane;
use itertools::Itertools;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use sweepseg_core::{Error, Point3f, PointBatch, PointFlags, RawPoint, Result, SegmentationConfig};

mod sealed {
    pub trait Sealed {}
}

/// Processing stage of a frame
pub trait Stage: sealed::Sealed {}

/// Stages after gridding; grid cells are available
pub trait Indexed: Stage {}

/// Stages after ground estimation; heights and flags are meaningful
pub trait Estimated: Indexed {}

macro_rules! stage {
    ($name:ident, $doc:literal $(, $marker:ident)*) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy)]
        pub enum $name {}
        impl sealed::Sealed for $name {}
        impl Stage for $name {}
        $(impl $marker for $name {})*
    };
}

stage!(Raw, "Valid points loaded, nothing derived yet");
stage!(Gridded, "Grid cells assigned", Indexed);
stage!(Grounded, "Heights and ground flags estimated", Indexed, Estimated);
stage!(Clustered, "Initial cluster ids assigned", Indexed, Estimated);
stage!(Segmented, "Clusters grown through the height layers", Indexed, Estimated);

/// One sweep of valid returns plus the buffers derived from it.
///
/// All per-point vectors are index-aligned and hold one entry per valid
/// input point.
#[derive(Debug, Clone)]
pub struct Frame<S: Stage = Raw> {
    pub(crate) positions: Vec<Point3f>,
    pub(crate) intensities: Vec<f32>,
    pub(crate) range_xy: Vec<f32>,
    pub(crate) heights: Vec<f32>,
    pub(crate) flags: Vec<PointFlags>,
    pub(crate) cluster_ids: Vec<u32>,
    pub(crate) cells: Vec<GridCell>,
    pub(crate) ground_plane: Plane,
    pub(crate) clusters_allocated: u32,
    pub(crate) growth: Vec<ClusterGrowth>,
    _stage: PhantomData<S>,
}

impl Frame<Raw> {
    /// Build a frame from a raw batch, dropping returns flagged invalid.
    ///
    /// Returns with a non-finite coordinate or horizontal range are dropped
    /// too, so every buffer of the frame holds finite values.
    ///
    /// `mount_height` seeds the ground plane as level ground right below the
    /// sensor until the global fit replaces it.
    pub fn from_batch(batch: &PointBatch, mount_height: f32) -> Self {
        let valid: Vec<&RawPoint> = batch.valid().collect();
        let (positions, intensities, range_xy): (Vec<Point3f>, Vec<f32>, Vec<f32>) = valid
            .par_iter()
            .map(|p| (p.position(), p.intensity, (p.x * p.x + p.y * p.y).sqrt()))
            .filter(|&(_, _, range)| range.is_finite())
            .collect::<Vec<_>>()
            .into_iter()
            .multiunzip();
        let n = positions.len();

        Self {
            positions,
            intensities,
            range_xy,
            heights: vec![0.0; n],
            flags: vec![PointFlags::NONE; n],
            cluster_ids: vec![0; n],
            cells: Vec::new(),
            ground_plane: Plane::horizontal(-mount_height),
            clusters_allocated: 0,
            growth: Vec::new(),
            _stage: PhantomData,
        }
    }

    /// Assign every point its grid cell.
    ///
    /// # Errors
    /// [`Error::InvalidConfig`] when `min_dist` lies beyond every observed
    /// range, which would put the whole frame in negative range bins.
    pub fn grid(self, indexer: &GridIndexer) -> Result<Frame<Gridded>> {
        if !self.is_empty() {
            let max_range = self.range_xy.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            if indexer.min_dist() > max_range {
                return Err(Error::InvalidConfig(format!(
                    "min_dist ({}) exceeds the largest observed range ({})",
                    indexer.min_dist(),
                    max_range
                )));
            }
        }

        let cells = indexer.index(&self.positions, &self.range_xy);
        let mut frame = self.into_stage::<Gridded>();
        frame.cells = cells;
        Ok(frame)
    }
}

impl<S: Stage> Frame<S> {
    pub(crate) fn into_stage<T: Stage>(self) -> Frame<T> {
        Frame {
            positions: self.positions,
            intensities: self.intensities,
            range_xy: self.range_xy,
            heights: self.heights,
            flags: self.flags,
            cluster_ids: self.cluster_ids,
            cells: self.cells,
            ground_plane: self.ground_plane,
            clusters_allocated: self.clusters_allocated,
            growth: self.growth,
            _stage: PhantomData,
        }
    }

    /// Number of valid points
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self) -> &[Point3f] {
        &self.positions
    }

    pub fn intensities(&self) -> &[f32] {
        &self.intensities
    }

    /// Horizontal distance of every point from the sensor
    pub fn range_xy(&self) -> &[f32] {
        &self.range_xy
    }

    /// Global ground plane; the mount-height default before ground estimation
    pub fn ground_plane(&self) -> Plane {
        self.ground_plane
    }
}

impl<S: Indexed> Frame<S> {
    /// Grid cell of every point
    pub fn cells(&self) -> &[GridCell] {
        &self.cells
    }
}

impl<S: Estimated> Frame<S> {
    /// Height of every point above the local ground
    pub fn heights(&self) -> &[f32] {
        &self.heights
    }

    pub fn flags(&self) -> &[PointFlags] {
        &self.flags
    }

    pub fn is_ground(&self, index: usize) -> bool {
        self.flags[index].is_ground()
    }

    /// Number of points carrying the ground bit
    pub fn ground_count(&self) -> usize {
        self.flags.iter().filter(|f| f.is_ground()).count()
    }

    /// Cluster id of every point, 0 for unassigned
    pub fn cluster_ids(&self) -> &[u32] {
        &self.cluster_ids
    }

    /// Number of cluster ids handed out so far
    pub fn cluster_count(&self) -> u32 {
        self.clusters_allocated
    }

    /// Indices of the points carrying `cluster_id`
    pub fn cluster_indices(&self, cluster_id: u32) -> Vec<usize> {
        if cluster_id == 0 {
            return Vec::new();
        }
        self.cluster_ids
            .iter()
            .enumerate()
            .filter(|(_, &id)| id == cluster_id)
            .map(|(i, _)| i)
            .collect()
    }

    /// Point counts for reporting
    pub fn summary(&self, config: &SegmentationConfig) -> FrameSummary {
        let clustered = || self.cluster_ids.iter().filter(|&&id| id > 0);

        FrameSummary {
            n_points: self.len(),
            n_ground: self.ground_count(),
            n_above_ground: self.heights.iter().filter(|&&h| h >= config.dz_local).count(),
            n_clusters: clustered().unique().count(),
            n_clustered: clustered().count(),
        }
    }
}

impl Frame<Segmented> {
    /// Growth record of every cluster that had seeds, in id order
    pub fn growth(&self) -> &[ClusterGrowth] {
        &self.growth
    }
}

/// Point counts of a processed frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSummary {
    pub n_points: usize,
    pub n_ground: usize,
    /// Points at or above the ground band
    pub n_above_ground: usize,
    /// Distinct cluster ids still present
    pub n_clusters: usize,
    /// Points carrying any cluster id
    pub n_clustered: usize,
}

impl fmt::Display for FrameSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} points: {} on ground, {} above ground, {} clusters covering {} points",
            self.n_points, self.n_ground, self.n_above_ground, self.n_clusters, self.n_clustered
        )
    }
}
