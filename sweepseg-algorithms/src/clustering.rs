//! Initial cluster labelling over the above-ground band
//!
//! Points with `dz_local <= height < base_h_cut` are swept in 2×2 cell
//! blocks, angular bin outer and range bin inner. A block that already holds
//! a labelled point spreads the largest label in it to the whole block; an
//! unlabelled block dense enough gets a fresh label. The sweep runs once and
//! is not iterated to a fixpoint, so its order decides which label survives
//! where two groups touch.

use crate::frame::{Clustered, Frame, Grounded};
use crate::grid::{CellArena, GridBounds};
use log::{debug, info};
use sweepseg_core::{Result, SegmentationConfig};

/// Hands out cluster ids 1, 2, 3, ... in allocation order
#[derive(Debug, Clone)]
pub struct ClusterIdAllocator {
    next: u32,
}

impl ClusterIdAllocator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    pub fn allocate(&mut self) -> u32 {
        let id = self.next;
        self.next += 1;
        id
    }

    /// Number of ids handed out so far
    pub fn allocated(&self) -> u32 {
        self.next - 1
    }
}

impl Default for ClusterIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Cluster seeding stage
#[derive(Debug, Clone)]
pub struct ClusterBuilder {
    dz_local: f32,
    base_h_cut: f32,
    min_samples: usize,
}

impl ClusterBuilder {
    /// # Errors
    /// [`sweepseg_core::Error::InvalidConfig`] if the configuration does not validate.
    pub fn new(config: &SegmentationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            dz_local: config.dz_local,
            base_h_cut: config.base_h_cut,
            min_samples: config.min_samples,
        })
    }

    /// Label dense groups in the band between the ground and `base_h_cut`.
    pub fn build(&self, frame: Frame<Grounded>) -> Frame<Clustered> {
        let mut frame = frame.into_stage::<Clustered>();
        let Some(bounds) = GridBounds::of(&frame.cells) else {
            return frame;
        };

        let heights = &frame.heights;
        let arena = CellArena::build_filtered(&frame.cells, |i| {
            heights[i] >= self.dz_local && heights[i] < self.base_h_cut
        });
        debug!(
            "clustering band holds {} points in {} cells",
            arena.len(),
            arena.occupied_cells()
        );

        let mut allocator = ClusterIdAllocator::new();
        if !arena.is_empty() {
            for ix in (bounds.min_angular + 1)..bounds.max_angular {
                for iy in (bounds.min_range + 1)..bounds.max_range {
                    let block = arena.block(ix - 1, ix, iy - 1, iy);
                    if block.is_empty() {
                        continue;
                    }

                    let existing = block.iter().map(|&i| frame.cluster_ids[i]).max().unwrap_or(0);
                    let id = if existing > 0 {
                        existing
                    } else if block.len() >= self.min_samples {
                        allocator.allocate()
                    } else {
                        continue;
                    };

                    for &i in &block {
                        frame.cluster_ids[i] = id;
                    }
                }
            }
        }

        frame.clusters_allocated = allocator.allocated();
        info!(
            "{} clusters seeded from {} band points",
            frame.clusters_allocated,
            arena.len()
        );
        frame
    }
}
