use thiserror::Error;

/// Errors raised by the predictor core.
///
/// Every variant is a configuration or programming error; none of them are
/// retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PredictorError {
    /// The configuration can't describe a valid slot table.
    #[error("invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },

    /// A computed slot index fell outside `[0, slot_count)`.
    #[error("slot {slot} is out of range for a table of {slot_count} slots")]
    OutOfRangeSlot { slot: usize, slot_count: usize },

    /// A restored probability is not a finite value in `[0, 1]`.
    #[error("probability {value} for slot {slot} is outside [0, 1]")]
    InvalidProbability { slot: usize, value: f64 },

    /// A restored table has a different number of slots than configured.
    #[error("expected {expected} slots, got {actual}")]
    SlotCountMismatch { expected: usize, actual: usize },
}

impl PredictorError {
    pub(super) fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            reason: reason.into(),
        }
    }
}

pub type PredictorResult<T> = Result<T, PredictorError>;
