//! Error types returned by the robust estimators.

use thiserror::Error;

/// Invalid configuration or input data, detected eagerly at call time.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ArgumentError {
    /// Thresholds must be strictly positive.
    #[error("threshold must be greater than zero, got {0}")]
    InvalidThreshold(f64),
    /// Confidence must lie in [0, 1].
    #[error("confidence must be in [0, 1], got {0}")]
    InvalidConfidence(f64),
    /// At least one iteration is required.
    #[error("max iterations must be at least 1, got {0}")]
    InvalidMaxIterations(usize),
    /// Progress delta must lie in [0, 1].
    #[error("progress delta must be in [0, 1], got {0}")]
    InvalidProgressDelta(f64),
    /// Inlier factor used by median-based methods must be strictly positive.
    #[error("inlier factor must be greater than zero, got {0}")]
    InvalidInlierFactor(f64),
    /// Fewer correspondences than the minimal sample size.
    #[error("need at least {required} correspondences, got {got}")]
    NotEnoughCorrespondences { required: usize, got: usize },
    /// Parallel sequences of different lengths.
    #[error("size mismatch: expected {expected} elements, got {got}")]
    SizeMismatch { expected: usize, got: usize },
    /// Quality scores must be finite and non-negative.
    #[error("quality score at index {index} must be finite and non-negative, got {value}")]
    InvalidQualityScore { index: usize, value: f64 },
    /// Suggestion weight must be finite and non-negative.
    #[error("suggestion weight must be finite and non-negative, got {0}")]
    InvalidSuggestionWeight(f64),
}

/// Errors surfaced by [`RobustEstimator`](crate::robust::RobustEstimator).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EstimatorError {
    #[error("invalid argument: {0}")]
    InvalidArgument(#[from] ArgumentError),
    /// A mutator was called while `estimate` is running.
    #[error("estimator is locked while an estimation is running")]
    Locked,
    /// Data, quality scores or sizes do not allow an estimation.
    #[error("estimator is not ready: missing data or inconsistent sizes")]
    NotReady,
    /// The iteration budget was exhausted without a single valid candidate.
    #[error("robust estimation failed after {iterations} iterations, not enough robustness against outliers")]
    RobustEstimationFailed { iterations: usize },
}

/// Reasons for a refinement to be discarded. Never surfaced by `estimate`,
/// the unrefined model is kept instead.
#[derive(Debug, Error)]
pub enum RefinementError {
    #[error("need at least {required} inliers to refine, got {got}")]
    NotEnoughInliers { required: usize, got: usize },
    #[error("cost is not finite")]
    NonFiniteCost,
    #[error("refined model could not be converted back from its parameters")]
    InvalidParameters,
    #[error("evaluating the refinement problem failed: {0}")]
    Operator(argmin::core::Error),
}

impl From<argmin::core::Error> for RefinementError {
    fn from(err: argmin::core::Error) -> Self {
        RefinementError::Operator(err)
    }
}
