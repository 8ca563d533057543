//! `result.json` types (§6) and the small I/O helpers to read/write them.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use omr_core::{RowResult, Tier};

/// Reading or writing a `result.json` failed.
#[derive(thiserror::Error, Debug)]
pub enum ResultIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// One answer row in `result.json`'s `answers` array.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnswerRow {
    pub question: usize,
    pub answer: Option<char>,
    pub confidence: u8,
    pub scores: BTreeMap<char, f32>,
    pub flags: Vec<String>,
    pub block: String,
    pub status: String,
    pub best: f32,
    pub delta: f32,
    pub z: f32,
    pub noise_gap: f32,
    pub ink_ratio: f32,
    pub tier: String,
    pub veto_reason: Option<String>,
    pub tags: Vec<String>,
}

impl AnswerRow {
    /// Build a wire row from a decided [`RowResult`] and the template's
    /// choice letters, applying STRICT-mode nulling (§4.6) if the row's
    /// tier is one of `MULTI`/`LOW_CONF` and `strict` is set.
    pub fn from_row_result(row: &RowResult, choices: &[char; 5], strict: bool) -> Self {
        let mut scores = BTreeMap::new();
        for (i, &c) in choices.iter().enumerate() {
            scores.insert(c, row.scores[i]);
        }
        let answer = if strict && row.tier.is_strict_only_blank() {
            None
        } else {
            row.answer
        };
        Self {
            question: row.question,
            answer,
            confidence: row.confidence,
            scores,
            flags: row.flags.clone(),
            block: row.block.clone(),
            status: row.tier.as_str().to_string(),
            best: row.best,
            delta: row.delta,
            z: row.z,
            noise_gap: row.noise_gap,
            ink_ratio: row.ink_ratio,
            tier: row.tier.as_str().to_string(),
            veto_reason: row.veto_reason.clone(),
            tags: row.tags.clone(),
        }
    }
}

/// `result.json`'s `summary` object.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct Summary {
    pub total: usize,
    pub answered: usize,
    pub ok: usize,
}

impl Summary {
    pub fn compute(answers: &[AnswerRow]) -> Self {
        Self {
            total: answers.len(),
            answered: answers.iter().filter(|r| r.answer.is_some()).count(),
            ok: answers.iter().filter(|r| r.status.starts_with("OK")).count(),
        }
    }
}

/// `result.json`'s `meta` object.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    pub template_key: String,
    pub expected_question_count: usize,
    pub page_size: [u32; 2],
    pub strict_mode: bool,
    pub version: String,
    pub corner_markers_found: bool,
    pub total_circles: usize,
    pub blocks_detected: usize,
    pub warnings: Vec<String>,
}

/// `result.json`'s `anchors` object, one entry per slot actually resolved.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct Anchors {
    #[serde(rename = "q1A", skip_serializing_if = "Option::is_none")]
    pub q1a: Option<[f32; 2]>,
    #[serde(rename = "q1E", skip_serializing_if = "Option::is_none")]
    pub q1e: Option<[f32; 2]>,
    #[serde(rename = "q53A", skip_serializing_if = "Option::is_none")]
    pub q53a: Option<[f32; 2]>,
}

/// The full `result.json` document (§6).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResult {
    pub template_key: String,
    pub answers: Vec<AnswerRow>,
    pub summary: Summary,
    pub meta: Meta,
    pub anchors: Anchors,
}

impl PipelineResult {
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ResultIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ResultIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use omr_core::RowResult;

    #[test]
    fn multi_is_nulled_under_strict_but_kept_otherwise() {
        let mut row = RowResult::not_detected(1);
        row.tier = Tier::Multi;
        row.answer = Some('B');
        let choices = ['A', 'B', 'C', 'D', 'E'];

        let strict_row = AnswerRow::from_row_result(&row, &choices, true);
        assert!(strict_row.answer.is_none());
        assert_eq!(strict_row.status, "MULTI");

        let lenient_row = AnswerRow::from_row_result(&row, &choices, false);
        assert_eq!(lenient_row.answer, Some('B'));
    }

    #[test]
    fn summary_counts_match_rows() {
        let mut ok_row = RowResult::not_detected(1);
        ok_row.tier = Tier::Ok;
        ok_row.answer = Some('A');
        let mut blank_row = RowResult::not_detected(2);
        blank_row.tier = Tier::Blank;

        let choices = ['A', 'B', 'C', 'D', 'E'];
        let answers = vec![
            AnswerRow::from_row_result(&ok_row, &choices, true),
            AnswerRow::from_row_result(&blank_row, &choices, true),
        ];
        let summary = Summary::compute(&answers);
        assert_eq!(summary.total, 2);
        assert_eq!(summary.answered, 1);
        assert_eq!(summary.ok, 1);
    }

    #[test]
    fn meta_and_anchors_use_the_wire_casing_from_the_template_schema() {
        let meta = Meta {
            template_key: "midterm-v1".to_string(),
            expected_question_count: 156,
            page_size: [1700, 2200],
            strict_mode: true,
            version: "0.1.0".to_string(),
            corner_markers_found: true,
            total_circles: 480,
            blocks_detected: 3,
            warnings: Vec::new(),
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["templateKey"], "midterm-v1");
        assert_eq!(json["expectedQuestionCount"], 156);
        assert_eq!(json["cornerMarkersFound"], true);
        assert_eq!(json["totalCircles"], 480);
        assert_eq!(json["blocksDetected"], 3);

        let anchors = Anchors {
            q1a: Some([10.0, 20.0]),
            q1e: None,
            q53a: None,
        };
        let json = serde_json::to_value(&anchors).unwrap();
        assert_eq!(json["q1A"], serde_json::json!([10.0, 20.0]));
        assert!(json.get("q1E").is_none());
    }
}
