//! Upward cluster growth through height layers
//!
//! Each seeded cluster climbs from `base_h_cut` to `h_max_cut` in
//! `h_grid_size` steps. At every layer it claims the layer points that lie
//! within one cell of its current footprint, and the cells of the claimed
//! points become the footprint for the next layer. The first layer that
//! claims nothing ends the climb.

use crate::frame::{Clustered, Frame, Segmented};
use crate::grid::{CellArena, GridCell};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use sweepseg_core::{Result, SegmentationConfig};

/// How far one cluster climbed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterGrowth {
    pub cluster_id: u32,
    /// Points in the connect layer the climb started from
    pub seeds: usize,
    /// Layers that claimed at least one point
    pub layers_grown: usize,
    pub points_assigned: usize,
}

/// Cluster growing stage
#[derive(Debug, Clone)]
pub struct ClusterGrower {
    config: SegmentationConfig,
}

impl ClusterGrower {
    /// # Errors
    /// [`sweepseg_core::Error::InvalidConfig`] if the configuration does not validate.
    pub fn new(config: &SegmentationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: config.clone(),
        })
    }

    /// Grow every cluster, lowest id first.
    pub fn grow(&self, frame: Frame<Clustered>) -> Frame<Segmented> {
        let mut frame = frame.into_stage::<Segmented>();
        let max_id = frame.cluster_ids.iter().copied().max().unwrap_or(0);
        if max_id == 0 {
            return frame;
        }

        let mut layers = LayerArenas::new(&frame.cells, &frame.heights, &self.config);

        // Growth only writes points at or above base_h_cut, so the connect
        // layer of every cluster is fixed before the first climb.
        let connect = self.config.base_h_cut - self.config.dz_global;
        let mut seeds: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
        for (i, &id) in frame.cluster_ids.iter().enumerate() {
            if id > 0 && frame.heights[i] > connect {
                seeds.entry(id).or_default().push(i);
            }
        }

        let mut growth = Vec::with_capacity(seeds.len());
        for (cluster_id, seed_points) in seeds {
            let mut footprint: BTreeSet<GridCell> = seed_points.iter().map(|&i| frame.cells[i]).collect();
            let mut record = ClusterGrowth {
                cluster_id,
                seeds: seed_points.len(),
                layers_grown: 0,
                points_assigned: 0,
            };

            for k in 0..layers.len() {
                let layer = layers.get(k);
                let claimed: BTreeSet<usize> = footprint
                    .iter()
                    .flat_map(|&cell| layer.neighborhood(cell))
                    .collect();
                if claimed.is_empty() {
                    debug!("cluster {} stops below layer {}", cluster_id, k);
                    break;
                }

                for &i in &claimed {
                    frame.cluster_ids[i] = cluster_id;
                }
                footprint = claimed.iter().map(|&i| frame.cells[i]).collect();
                record.layers_grown += 1;
                record.points_assigned += claimed.len();
            }

            growth.push(record);
        }

        debug!("built {} of {} layer arenas", layers.built(), layers.len());
        info!(
            "grew {} of {} clusters, {} points claimed above base_h_cut",
            growth.iter().filter(|g| g.layers_grown > 0).count(),
            max_id,
            growth.iter().map(|g| g.points_assigned).sum::<usize>()
        );
        frame.growth = growth;
        frame
    }
}

/// Per-layer cell arenas, each built the first time a climb reaches it
struct LayerArenas<'a> {
    cells: &'a [GridCell],
    heights: &'a [f32],
    config: &'a SegmentationConfig,
    layers: Vec<Option<CellArena>>,
}

impl<'a> LayerArenas<'a> {
    fn new(cells: &'a [GridCell], heights: &'a [f32], config: &'a SegmentationConfig) -> Self {
        Self {
            cells,
            heights,
            config,
            layers: vec![None; config.n_layers()],
        }
    }

    fn len(&self) -> usize {
        self.layers.len()
    }

    fn get(&mut self, k: usize) -> &CellArena {
        let (cells, heights) = (self.cells, self.heights);
        let (lo, hi) = self.config.layer_bounds(k);
        self.layers[k]
            .get_or_insert_with(|| CellArena::build_filtered(cells, |i| heights[i] >= lo && heights[i] < hi))
    }

    /// Number of layers built so far
    fn built(&self) -> usize {
        self.layers.iter().filter(|layer| layer.is_some()).count()
    }
}
