//! # SweepSeg Algorithms
//!
//! Single-frame LiDAR segmentation stages.
//!
//! This crate turns one sweep of returns into per-point ground flags, heights
//! above the local ground and cluster ids, including gridding, ground
//! estimation, cluster seeding and upward cluster growth.

pub mod plane_fit;
pub mod grid;
pub mod frame;
pub mod ground;
pub mod clustering;
pub mod growing;
pub mod pipeline;

#[cfg(test)]
mod tests_support;

// Re-export commonly used items
pub use plane_fit::*;
pub use grid::*;
pub use frame::*;
pub use ground::*;
pub use clustering::*;
pub use growing::*;
pub use pipeline::*;
