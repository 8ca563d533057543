//! Core types and utilities shared by every stage of the bubble-sheet
//! reading pipeline: image buffers, homography estimation/warping, the
//! greedy 1D clustering primitive, the invocation-boundary configuration
//! record, and the ambient logging/error stack.
//!
//! This crate is intentionally small and purely geometric/numeric. It does
//! *not* depend on any concrete decoding, circle-detection, or scoring
//! logic — those live in the downstream `omr-*` crates.

mod config;
mod error;
mod geom;
mod homography;
mod image;
mod logger;
mod onedim;

pub use config::{Overrides, PipelineConfig};
pub use error::{FatalError, RecoverableError};
pub use geom::{Block, Circle, Grid, PagePoint, RowResult, Thresholds, Tier, EPS};
pub use homography::{
    estimate_homography_rect_to_img, homography_from_4pt, warp_perspective_gray, Homography,
};
pub use image::{sample_bilinear, sample_bilinear_u8, GrayImage, GrayImageView};
pub use logger::init_with_level;
#[cfg(feature = "tracing")]
pub use logger::init_tracing;
pub use onedim::{assign_to_nearest, cluster_1d, Cluster1d};
