//! Angular / range gridding of a sweep
//!
//! Points are binned by azimuth (`asin(x / range_xy)`) and horizontal range.
//! The stages never rescan the whole frame per cell; instead they build a
//! [`CellArena`] once, mapping each occupied cell to the ascending list of
//! point indices inside it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use sweepseg_core::{Point3f, SegmentationConfig};

/// Discrete (angular, range) partition of the sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct GridCell {
    pub angular: i32,
    pub range: i32,
}

impl GridCell {
    pub fn new(angular: i32, range: i32) -> Self {
        Self { angular, range }
    }
}

/// Maps positions to grid cells
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridIndexer {
    max_theta: f32,
    theta_grid_size: f32,
    min_dist: f32,
    dist_grid_size: f32,
}

impl GridIndexer {
    pub fn new(config: &SegmentationConfig) -> Self {
        Self {
            max_theta: config.max_theta,
            theta_grid_size: config.theta_grid_size,
            min_dist: config.min_dist,
            dist_grid_size: config.dist_grid_size,
        }
    }

    /// Cell of a point with lateral coordinate `x` at horizontal range `range_xy`.
    ///
    /// A point on the sensor axis has no azimuth; it is put at angle 0
    /// rather than producing a NaN bin. `range_xy` is expected to be finite,
    /// as it is for every point of a [`Frame`](crate::Frame).
    pub fn cell_of(&self, x: f32, range_xy: f32) -> GridCell {
        let theta = if range_xy > 0.0 && range_xy.is_finite() {
            (x / range_xy).clamp(-1.0, 1.0).asin()
        } else {
            0.0
        };
        let angular = ((theta + self.max_theta) / self.theta_grid_size).floor() as i32;
        let range = ((range_xy - self.min_dist) / self.dist_grid_size).floor() as i32;
        GridCell::new(angular, range)
    }

    /// Horizontal range mapped to range bin 0
    pub fn min_dist(&self) -> f32 {
        self.min_dist
    }

    /// Cells of every point, index-aligned with `positions`
    pub fn index(&self, positions: &[Point3f], range_xy: &[f32]) -> Vec<GridCell> {
        debug_assert_eq!(positions.len(), range_xy.len());
        positions
            .iter()
            .zip(range_xy)
            .map(|(p, &r)| self.cell_of(p.x, r))
            .collect()
    }
}

/// Inclusive bin ranges spanned by a set of cells
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridBounds {
    pub min_angular: i32,
    pub max_angular: i32,
    pub min_range: i32,
    pub max_range: i32,
}

impl GridBounds {
    pub fn of(cells: &[GridCell]) -> Option<Self> {
        let first = cells.first()?;
        let mut bounds = GridBounds {
            min_angular: first.angular,
            max_angular: first.angular,
            min_range: first.range,
            max_range: first.range,
        };
        for cell in &cells[1..] {
            bounds.min_angular = bounds.min_angular.min(cell.angular);
            bounds.max_angular = bounds.max_angular.max(cell.angular);
            bounds.min_range = bounds.min_range.min(cell.range);
            bounds.max_range = bounds.max_range.max(cell.range);
        }
        Some(bounds)
    }
}

/// Cell -> point index lists for a subset of a frame
#[derive(Debug, Clone, Default)]
pub struct CellArena {
    cells: HashMap<GridCell, Vec<usize>>,
    rows: HashMap<i32, usize>,
    len: usize,
}

impl CellArena {
    /// Arena over every point
    pub fn build(cells: &[GridCell]) -> Self {
        Self::build_filtered(cells, |_| true)
    }

    /// Arena over the points for which `keep(index)` holds.
    ///
    /// Indices are pushed in ascending order, so every cell list is sorted.
    pub fn build_filtered<F>(cells: &[GridCell], keep: F) -> Self
    where
        F: Fn(usize) -> bool,
    {
        let mut arena = Self::default();
        for (i, cell) in cells.iter().enumerate() {
            if !keep(i) {
                continue;
            }
            arena.cells.entry(*cell).or_default().push(i);
            *arena.rows.entry(cell.range).or_default() += 1;
            arena.len += 1;
        }
        arena
    }

    /// Number of points in the arena
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of occupied cells
    pub fn occupied_cells(&self) -> usize {
        self.cells.len()
    }

    /// Points inside `cell`
    pub fn cell(&self, cell: GridCell) -> &[usize] {
        self.cells.get(&cell).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Points whose range bin equals `range`
    pub fn row_count(&self, range: i32) -> usize {
        self.rows.get(&range).copied().unwrap_or(0)
    }

    /// Points in the block `[angular_lo, angular_hi] x [range_lo, range_hi]`,
    /// sorted by index.
    pub fn block(&self, angular_lo: i32, angular_hi: i32, range_lo: i32, range_hi: i32) -> Vec<usize> {
        let mut out = Vec::new();
        for angular in angular_lo..=angular_hi {
            for range in range_lo..=range_hi {
                out.extend_from_slice(self.cell(GridCell::new(angular, range)));
            }
        }
        out.sort_unstable();
        out
    }

    /// Points within Chebyshev distance 1 of `center`, sorted by index
    pub fn neighborhood(&self, center: GridCell) -> Vec<usize> {
        self.block(
            center.angular.saturating_sub(1),
            center.angular.saturating_add(1),
            center.range.saturating_sub(1),
            center.range.saturating_add(1),
        )
    }
}
