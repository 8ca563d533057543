//! File-based convenience wrapper (§6): decode an input image, run the
//! pipeline, and write `result.json`/`warped.png` to an output directory.
//! Everything here sits outside the pipeline's real contract (§1) — plain
//! callers can always go straight to [`crate::run_pipeline`] with an
//! already-decoded buffer instead.

use std::path::{Path, PathBuf};

use image::{save_buffer, ColorType, ImageReader};

use omr_core::{GrayImageView, PipelineConfig};

use crate::pipeline::run_pipeline;
use crate::result::{PipelineResult, ResultIoError};
use crate::template::Template;

/// Errors from the file-based `run` entry point.
#[derive(thiserror::Error, Debug)]
pub enum RunError {
    #[error("failed to open/decode input image: {0}")]
    ImageDecode(#[from] image::ImageError),
    #[error("failed to write {path}: {source}")]
    WriteWarped { path: PathBuf, source: image::ImageError },
    #[error(transparent)]
    ResultIo(#[from] ResultIoError),
}

/// Paths written by [`run`], plus the decoded [`PipelineResult`].
pub struct RunOutcome {
    pub result: PipelineResult,
    pub result_json_path: PathBuf,
    pub warped_png_path: PathBuf,
}

/// Convert a decoded `image::GrayImage` into the lightweight
/// `omr-core` view type the pipeline crates operate on.
fn gray_view(img: &image::GrayImage) -> GrayImageView<'_> {
    GrayImageView {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw(),
    }
}

/// Decode `input_path`, run the full reading pipeline against `template`,
/// and write `result.json` + `warped.png` into `output_dir` (§6). Returns
/// the decoded result alongside the two paths written.
pub fn run(input_path: impl AsRef<Path>, template: &Template, output_dir: impl AsRef<Path>) -> Result<RunOutcome, RunError> {
    let decoded = ImageReader::open(input_path.as_ref())?.decode()?.to_luma8();
    let view = gray_view(&decoded);
    let config = PipelineConfig::default();
    run_with_config(&view, template, &config, output_dir)
}

/// Same as [`run`] but taking an already-built [`PipelineConfig`] (e.g. one
/// built from environment variables by an embedding CLI via
/// [`omr_core::PipelineConfig::from_env`]) instead of the default.
pub fn run_with_config(
    input: &GrayImageView<'_>,
    template: &Template,
    config: &PipelineConfig,
    output_dir: impl AsRef<Path>,
) -> Result<RunOutcome, RunError> {
    let output_dir = output_dir.as_ref();
    std::fs::create_dir_all(output_dir).map_err(|e| RunError::ResultIo(ResultIoError::Io(e)))?;

    let outcome = run_pipeline(input, template, config);

    let result_json_path = output_dir.join("result.json");
    outcome.result.write_json(&result_json_path)?;

    let warped_png_path = output_dir.join("warped.png");
    save_buffer(
        &warped_png_path,
        &outcome.warped.data,
        outcome.warped.width as u32,
        outcome.warped.height as u32,
        ColorType::L8,
    )
    .map_err(|source| RunError::WriteWarped {
        path: warped_png_path.clone(),
        source,
    })?;
    log::info!("wrote {} and {}", result_json_path.display(), warped_png_path.display());

    Ok(RunOutcome {
        result: outcome.result,
        result_json_path,
        warped_png_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use omr_core::GrayImage;

    #[test]
    fn run_with_config_writes_result_json_and_warped_png() {
        let w = 200usize;
        let h = 260usize;
        let gray = GrayImage {
            width: w,
            height: h,
            data: vec![245u8; w * h],
        };
        let view = GrayImageView {
            width: w,
            height: h,
            data: &gray.data,
        };
        let template = crate::template::Template {
            key: "midterm-v1".to_string(),
            choices: vec!["A".into(), "B".into(), "C".into(), "D".into(), "E".into()],
            page: crate::template::PageSize { width: w as u32, height: h as u32 },
            question_columns: 1,
            rows_per_block: 8,
            expected_question_count: 8,
            threshold: None,
            min_fill_delta: None,
            roi_x: None,
            roi_y: None,
            roi_w: None,
            roi_h: None,
            column_ranges: None,
        };
        let config = PipelineConfig::default();
        let dir = tempfile::tempdir().expect("tempdir");

        let outcome = run_with_config(&view, &template, &config, dir.path()).expect("run succeeds");

        assert!(outcome.result_json_path.exists());
        assert!(outcome.warped_png_path.exists());
        assert_eq!(outcome.result.answers.len(), template.expected_question_count);

        let raw = std::fs::read_to_string(&outcome.result_json_path).expect("read result.json");
        assert!(raw.contains("\"templateKey\""));
    }
}
