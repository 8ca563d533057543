//! Invocation-boundary configuration record.
//!
//! Environment-driven booleans are read exactly once, at the call boundary,
//! into this record; nothing downstream touches `std::env` again.

use serde::{Deserialize, Serialize};

use crate::geom::PagePoint;

/// Caller-supplied quadrilateral / anchor overrides, parsed once from
/// `OMR_CORNERS` / `OMR_ANCHORS` (or constructed directly by an embedding
/// caller that skips the environment entirely).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Overrides {
    /// Four image-space quadrilateral points, TL/TR/BR/BL order not required
    /// (the rectifier re-orders by the canonical rule).
    pub corners: Option<[PagePoint; 4]>,
    pub q1a: Option<PagePoint>,
    pub q1e: Option<PagePoint>,
    pub q53a: Option<PagePoint>,
}

/// Full set of invocation-time flags, see `SPEC_FULL.md` §6/§9.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub debug: bool,
    pub strict: bool,
    pub preview_only: bool,
    pub use_grid: bool,
    pub faint: bool,
    pub limit_first_block: bool,
    pub max_questions: Option<usize>,
    pub rescue_passes: bool,
    pub log_json: bool,
    #[serde(skip)]
    pub overrides: Overrides,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            debug: false,
            strict: true,
            preview_only: false,
            use_grid: false,
            faint: false,
            limit_first_block: false,
            max_questions: None,
            rescue_passes: false,
            log_json: false,
            overrides: Overrides::default(),
        }
    }
}

impl PipelineConfig {
    fn env_flag(name: &str) -> bool {
        std::env::var(name)
            .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "yes"))
            .unwrap_or(false)
    }

    /// Build a configuration from the environment variables of §6. Corner and
    /// anchor overrides are parsed here too; malformed JSON is reported to the
    /// caller as a warning string rather than panicking (see `error.rs`).
    pub fn from_env() -> (Self, Vec<String>) {
        let mut warnings = Vec::new();

        let corners = std::env::var("OMR_CORNERS").ok().and_then(|raw| {
            match serde_json::from_str::<Vec<PagePoint>>(&raw) {
                Ok(pts) if pts.len() == 4 => Some([pts[0], pts[1], pts[2], pts[3]]),
                Ok(_) => {
                    warnings.push("OMR_CORNERS did not contain exactly 4 points".to_string());
                    None
                }
                Err(e) => {
                    warnings.push(format!("OMR_CORNERS parse failed: {e}"));
                    None
                }
            }
        });

        #[derive(Deserialize)]
        struct AnchorPayload {
            #[serde(rename = "q1A")]
            q1a: Option<PagePoint>,
            #[serde(rename = "q1E")]
            q1e: Option<PagePoint>,
            #[serde(rename = "q53A")]
            q53a: Option<PagePoint>,
        }

        let (q1a, q1e, q53a) = match std::env::var("OMR_ANCHORS") {
            Ok(raw) => match serde_json::from_str::<AnchorPayload>(&raw) {
                Ok(a) => (a.q1a, a.q1e, a.q53a),
                Err(e) => {
                    warnings.push(format!("OMR_ANCHORS parse failed: {e}"));
                    (None, None, None)
                }
            },
            Err(_) => (None, None, None),
        };

        let max_questions = std::env::var("OMR_MAX_QUESTIONS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok());

        (
            Self {
                debug: Self::env_flag("OMR_DEBUG"),
                strict: std::env::var("OMR_STRICT")
                    .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "yes"))
                    .unwrap_or(true),
                preview_only: Self::env_flag("OMR_PREVIEW_ONLY"),
                use_grid: Self::env_flag("OMR_USE_GRID"),
                faint: Self::env_flag("OMR_FAINT"),
                limit_first_block: Self::env_flag("OMR_LIMIT_FIRST_BLOCK"),
                max_questions,
                rescue_passes: Self::env_flag("OMR_RESCUE_PASSES"),
                log_json: Self::env_flag("OMR_LOG_JSON"),
                overrides: Overrides {
                    corners,
                    q1a,
                    q1e,
                    q53a,
                },
            },
            warnings,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_strict_and_unrestricted() {
        let cfg = PipelineConfig::default();
        assert!(cfg.strict);
        assert!(!cfg.rescue_passes);
        assert!(cfg.max_questions.is_none());
    }
}
