//! Recoverable and fatal error kinds shared across the pipeline (§7).

/// A failure that a stage can recover from by falling back to a lesser
/// strategy. Every variant has a matching warning string pushed to
/// `meta.warnings[]` at the call site; the enum itself carries only the
/// structured reason.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum RecoverableError {
    #[error("corner override rejected: {reason}")]
    CornerOverrideFailed { reason: String },
    #[error("anchor payload rejected: {reason}")]
    AnchorParseFailed { reason: String },
    #[error("corner fiducials not found, falling back to rough warp")]
    CornersMissing,
    #[error("no circles detected")]
    NoCircles,
    #[error("too few circles detected ({found} < {min_required})")]
    TooFewCircles { found: usize, min_required: usize },
    #[error("block '{name}' has too few confident rows, marked EMPTY_BLOCK")]
    BlockEmpty { name: String },
}

/// A failure that aborts the whole invocation.
#[derive(thiserror::Error, Debug)]
pub enum FatalError {
    #[error("input image could not be decoded: {0}")]
    ImageDecodeFailed(String),
    #[error("template schema violation: {0}")]
    InvalidTemplate(String),
    #[error(transparent)]
    Recoverable(#[from] RecoverableError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_error_messages_are_stable() {
        let e = RecoverableError::TooFewCircles {
            found: 3,
            min_required: 10,
        };
        assert_eq!(e.to_string(), "too few circles detected (3 < 10)");
    }
}
