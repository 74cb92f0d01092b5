//! Core data structures for sweepseg
//!
//! This crate provides the types shared by the segmentation stages: raw
//! LiDAR returns and the batch container holding one sweep, the per-point
//! classification bitset, the segmentation configuration and the error type.

pub mod config;
pub mod error;
pub mod flags;
pub mod point;
pub mod point_cloud;

pub use config::*;
pub use error::*;
pub use flags::*;
pub use point::*;
pub use point_cloud::*;
