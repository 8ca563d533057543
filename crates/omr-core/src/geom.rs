//! Shared page-space value types passed between pipeline stages.

use serde::{Deserialize, Serialize};

/// A detected bubble candidate in rectified page pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    pub cx: f32,
    pub cy: f32,
    pub r: f32,
}

impl Circle {
    pub fn new(cx: f32, cy: f32, r: f32) -> Self {
        Self { cx, cy, r }
    }
}

/// A point in rectified page pixels, used for anchors and grid centers.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PagePoint {
    pub x: f32,
    pub y: f32,
}

impl PagePoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// A vertical cluster of circles belonging to one question-column.
#[derive(Clone, Debug)]
pub struct Block {
    pub name: String,
    pub q_start: usize,
    pub q_end: usize,
    pub circles: Vec<Circle>,
    pub x_min: f32,
    pub x_max: f32,
    pub y_min: f32,
    pub y_max: f32,
}

impl Block {
    /// Rebuild the bounding extents from `circles`. No-op on an empty block.
    pub fn recompute_bounds(&mut self) {
        if self.circles.is_empty() {
            return;
        }
        let mut x_min = f32::INFINITY;
        let mut x_max = f32::NEG_INFINITY;
        let mut y_min = f32::INFINITY;
        let mut y_max = f32::NEG_INFINITY;
        for c in &self.circles {
            x_min = x_min.min(c.cx);
            x_max = x_max.max(c.cx);
            y_min = y_min.min(c.cy);
            y_max = y_max.max(c.cy);
        }
        self.x_min = x_min;
        self.x_max = x_max;
        self.y_min = y_min;
        self.y_max = y_max;
    }

    pub fn mean_cx(&self) -> f32 {
        if self.circles.is_empty() {
            return 0.0;
        }
        self.circles.iter().map(|c| c.cx).sum::<f32>() / self.circles.len() as f32
    }
}

/// Reconstructed choice-cell centers for one block.
#[derive(Clone, Debug)]
pub struct Grid {
    pub x_centers: Vec<f32>,
    pub y_centers: Vec<f32>,
    pub radius: f32,
    pub anchor_used: bool,
}

/// Per-block decision thresholds, see `SPEC_FULL.md` §4.6.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Thresholds {
    pub mark_th: f32,
    pub blank_th: f32,
    pub margin: f32,
}

/// Small numeric floor used throughout the scoring math to avoid division by zero.
pub const EPS: f32 = 1e-6;

/// Terminal tier assigned to one row by the decider (§4.6/§9). Transitions
/// are single-direction: once a row lands in a tier it is never re-entered
/// by a later check, only demoted to a stricter one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tier {
    Ok,
    OkStabOverride,
    FaintOk,
    Multi,
    LowConf,
    Nv,
    InkRelFail,
    StabilityFail,
    Blank,
    EmptyBlock,
    NotDetected,
}

impl Tier {
    /// Wire name used in `result.json` `status`/`tier` fields (§6).
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Ok => "OK",
            Tier::OkStabOverride => "OK_STAB_OVERRIDE",
            Tier::FaintOk => "FAINT_OK",
            Tier::Multi => "MULTI",
            Tier::LowConf => "LOW_CONF",
            Tier::Nv => "NV",
            Tier::InkRelFail => "INK_REL_FAIL",
            Tier::StabilityFail => "STABILITY_FAIL",
            Tier::Blank => "BLANK",
            Tier::EmptyBlock => "EMPTY_BLOCK",
            Tier::NotDetected => "NOT_DETECTED",
        }
    }

    /// `true` for the two tiers whose answer-or-blank resolution depends on
    /// strict mode (§4.6, §8 invariant 2).
    pub fn is_strict_only_blank(self) -> bool {
        matches!(self, Tier::Multi | Tier::LowConf)
    }

    /// `true` for tiers that always yield `answer = None` regardless of mode.
    pub fn always_blank(self) -> bool {
        matches!(
            self,
            Tier::Blank
                | Tier::EmptyBlock
                | Tier::NotDetected
                | Tier::StabilityFail
                | Tier::Nv
                | Tier::InkRelFail
        )
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-question outcome produced by the decider (§3 `RowResult`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RowResult {
    pub question: usize,
    pub block: String,
    pub scores: [f32; 5],
    pub coords: [(f32, f32); 5],
    pub best: f32,
    pub second: f32,
    pub delta: f32,
    pub row_median: f32,
    pub row_std: f32,
    pub z: f32,
    pub noise_max: f32,
    pub noise_gap: f32,
    pub ink_ratio: f32,
    /// Index into `scores`/`coords` of the highest-scoring choice, `None` if
    /// no grid was available for this row (`NOT_DETECTED`).
    pub best_idx: Option<usize>,
    /// Resolved answer letter, `None` when the tier maps to a blank.
    pub answer: Option<char>,
    pub confidence: u8,
    pub tier: Tier,
    pub flags: Vec<String>,
    pub veto_reason: Option<String>,
    pub tags: Vec<String>,
}

impl RowResult {
    /// A placeholder row for a question number the pipeline never reached
    /// (e.g. fewer circles/blocks detected than `expectedQuestionCount`).
    pub fn not_detected(question: usize) -> Self {
        Self {
            question,
            block: "unknown".to_string(),
            scores: [0.0; 5],
            coords: [(0.0, 0.0); 5],
            best: 0.0,
            second: 0.0,
            delta: 0.0,
            row_median: 0.0,
            row_std: 0.0,
            z: 0.0,
            noise_max: 0.0,
            noise_gap: 0.0,
            ink_ratio: 0.0,
            best_idx: None,
            answer: None,
            confidence: 0,
            tier: Tier::NotDetected,
            flags: vec!["BLANK".to_string(), "NOT_DETECTED".to_string()],
            veto_reason: None,
            tags: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_bounds_follow_circles() {
        let mut b = Block {
            name: "block1".into(),
            q_start: 1,
            q_end: 52,
            circles: vec![Circle::new(10.0, 5.0, 8.0), Circle::new(30.0, 40.0, 8.0)],
            x_min: 0.0,
            x_max: 0.0,
            y_min: 0.0,
            y_max: 0.0,
        };
        b.recompute_bounds();
        assert_eq!(b.x_min, 10.0);
        assert_eq!(b.x_max, 30.0);
        assert_eq!(b.y_min, 5.0);
        assert_eq!(b.y_max, 40.0);
        assert!((b.mean_cx() - 20.0).abs() < 1e-6);
    }

    #[test]
    fn tier_wire_names_match_result_json_vocabulary() {
        assert_eq!(Tier::Ok.as_str(), "OK");
        assert_eq!(Tier::EmptyBlock.as_str(), "EMPTY_BLOCK");
        assert!(Tier::Multi.is_strict_only_blank());
        assert!(!Tier::Ok.is_strict_only_blank());
        assert!(Tier::Blank.always_blank());
        assert!(!Tier::FaintOk.always_blank());
    }

    #[test]
    fn not_detected_row_has_no_answer() {
        let row = RowResult::not_detected(7);
        assert_eq!(row.question, 7);
        assert!(row.answer.is_none());
        assert_eq!(row.tier, Tier::NotDetected);
    }
}
