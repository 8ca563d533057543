//! Template schema (§6): the JSON document describing one sheet layout.
//!
//! Loading is the caller's job in the general case (file I/O sits outside
//! this crate's scope) but `Template` is `Deserialize` so an embedding
//! caller can feed it straight from `serde_json::from_str`/`from_reader`.

use serde::{Deserialize, Serialize};

use omr_grid::ColumnRange as GridColumnRange;

fn default_choices() -> Vec<String> {
    ["A", "B", "C", "D", "E"].iter().map(|s| s.to_string()).collect()
}

fn default_page_width() -> u32 {
    1700
}

fn default_page_height() -> u32 {
    2200
}

fn default_question_columns() -> u32 {
    3
}

fn default_rows_per_block() -> usize {
    52
}

fn default_expected_question_count() -> usize {
    156
}

/// Page dimensions in pixels, `page.width`/`page.height` in the template JSON.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct PageSize {
    #[serde(default = "default_page_width")]
    pub width: u32,
    #[serde(default = "default_page_height")]
    pub height: u32,
}

impl Default for PageSize {
    fn default() -> Self {
        Self {
            width: default_page_width(),
            height: default_page_height(),
        }
    }
}

/// One question-column's horizontal extent and vertical band within the
/// region of interest, grid-mode only (§9 GridReader alternative).
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ColumnRangeSpec {
    pub start: f32,
    pub end: f32,
    #[serde(default)]
    pub top: f32,
    #[serde(default = "default_one")]
    pub bottom: f32,
}

fn default_one() -> f32 {
    1.0
}

impl From<ColumnRangeSpec> for GridColumnRange {
    fn from(spec: ColumnRangeSpec) -> Self {
        GridColumnRange {
            start: spec.start,
            end: spec.end,
        }
    }
}

/// Sheet layout description, see `SPEC_FULL.md` §6 "Template schema".
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Template {
    pub key: String,
    #[serde(default = "default_choices")]
    pub choices: Vec<String>,
    #[serde(default)]
    pub page: PageSize,
    #[serde(default = "default_question_columns")]
    pub question_columns: u32,
    #[serde(default = "default_rows_per_block")]
    pub rows_per_block: usize,
    #[serde(default = "default_expected_question_count")]
    pub expected_question_count: usize,
    /// Grid-mode only: fixed mark/delta thresholds, bypassing per-block calibration.
    #[serde(default)]
    pub threshold: Option<f32>,
    #[serde(default)]
    pub min_fill_delta: Option<f32>,
    /// Grid-mode only: region of interest, normalized `[0, 1]` fractions of the page.
    #[serde(default)]
    pub roi_x: Option<f32>,
    #[serde(default)]
    pub roi_y: Option<f32>,
    #[serde(default)]
    pub roi_w: Option<f32>,
    #[serde(default)]
    pub roi_h: Option<f32>,
    #[serde(default)]
    pub column_ranges: Option<Vec<ColumnRangeSpec>>,
}

impl Template {
    /// Five choice letters as a fixed array, truncating/padding is the
    /// caller's problem — a template with != 5 choices is a schema error the
    /// external loader should have already rejected.
    pub fn choice_chars(&self) -> [char; 5] {
        let mut out = ['A', 'B', 'C', 'D', 'E'];
        for (i, c) in self.choices.iter().take(5).enumerate() {
            out[i] = c.chars().next().unwrap_or(out[i]);
        }
        out
    }

    /// Resolve the GridReader ROI in page pixels, `None` if any of the
    /// four ROI fields is absent from the template.
    pub fn grid_roi_px(&self) -> Option<(f32, f32, f32, f32)> {
        let (x, y, w, h) = (self.roi_x?, self.roi_y?, self.roi_w?, self.roi_h?);
        let pw = self.page.width as f32;
        let ph = self.page.height as f32;
        Some((x * pw, y * ph, w * pw, h * ph))
    }

    /// Resolve the GridReader's per-column ranges in page pixels. Falls back
    /// to evenly-spaced columns spanning the ROI when the template doesn't
    /// declare `columnRanges` explicitly.
    pub fn grid_column_ranges(&self) -> Vec<GridColumnRange> {
        let pw = self.page.width as f32;
        match &self.column_ranges {
            Some(ranges) => ranges
                .iter()
                .map(|r| GridColumnRange {
                    start: r.start * pw,
                    end: r.end * pw,
                })
                .collect(),
            None => {
                let (roi_x, _, roi_w, _) = self.grid_roi_px().unwrap_or((0.0, 0.0, pw, 0.0));
                omr_grid::GridReaderConfig::even_columns(roi_x, roi_w, self.question_columns as usize)
            }
        }
    }
}
