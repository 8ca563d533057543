//! High-level facade crate for the bubble-sheet (OMR) reading pipeline.
//!
//! This crate provides:
//! - the `Template` schema (§6) describing one sheet layout
//! - [`run_pipeline`], the end-to-end orchestration over an already-decoded
//!   grayscale page (C1-C7, plus the `OMR_USE_GRID` alternative C9)
//! - the `result.json` wire types and their (de)serialization
//! - (feature-gated by `image-io`) a file-based `run` helper that decodes an
//!   input image and writes `result.json`/`warped.png` to an output directory

mod pipeline;
mod result;
mod template;

#[cfg(feature = "image-io")]
mod io;

pub use pipeline::{run_pipeline, PipelineOutcome};
pub use result::{AnswerRow, Anchors, Meta, PipelineResult, ResultIoError, Summary};
pub use template::{ColumnRangeSpec, PageSize, Template};

#[cfg(feature = "image-io")]
pub use io::{run, run_with_config, RunError, RunOutcome};
