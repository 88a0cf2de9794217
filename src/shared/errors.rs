//! Error handling for the engine

use thiserror::Error;

/// Errors raised while producing and validating opportunities.
///
/// Per-pair and per-candidate errors are isolated at the point they occur;
/// none of these variants is allowed to abort a worker loop or the pipeline.
#[derive(Error, Debug, Clone)]
pub enum EngineError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("No price history for pair {pair}")]
    EstimationUnavailable { pair: String },

    #[error("Transient quote failure: {0}")]
    RequoteTransient(String),

    #[error("Permanent quote failure: {0}")]
    RequotePermanent(String),

    #[error("Candidate went stale after {age_ms}ms (max {max_ms}ms)")]
    StaleCandidate { age_ms: u64, max_ms: u64 },

    #[error("Unknown fee kind: {0}")]
    UnknownFeeKind(String),
}

impl EngineError {
    /// Whether a re-quote attempt hitting this error is worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, EngineError::RequoteTransient(_))
    }
}

/// Structured reason attached to every discarded candidate.
///
/// Rejections are never silent; the gate records one of these so the
/// estimator calibration and the operator can see why candidates died.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// Authoritative net profit came in below the configured threshold
    /// (or was not positive at all).
    BelowThreshold { authoritative_net: i64 },

    /// The re-quote exhausted its retries or hit a permanent API error.
    RequoteFailed(String),

    /// The candidate exceeded its staleness window before a quote landed.
    Stale { age_ms: u64 },
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::BelowThreshold { authoritative_net } => {
                write!(f, "authoritative net profit {} below threshold", authoritative_net)
            }
            RejectReason::RequoteFailed(msg) => write!(f, "re-quote failed: {}", msg),
            RejectReason::Stale { age_ms } => write!(f, "stale after {}ms", age_ms),
        }
    }
}
