use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};

use super::{error::PredictorResult, predictor::Predictor};

/// Published view of a predictor at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictorAttributes {
    /// Predicted state for the current block.
    pub is_on: bool,

    /// Whether the source has been on during the current block so far.
    pub current_time_block_state: bool,

    /// Forecast starting with the current block.
    pub probabilities: Vec<f64>,

    /// Probability for the current block, same as `probabilities[0]`.
    pub probability: f64,

    /// Slot index of the current block.
    pub time_block_rotation: usize,
}

impl PredictorAttributes {
    pub fn snapshot<Tz: TimeZone>(
        predictor: &Predictor,
        timestamp: &DateTime<Tz>,
        current_time_block_state: bool,
    ) -> PredictorResult<Self> {
        let probabilities = predictor.forecast(timestamp)?;

        Ok(Self {
            is_on: predictor.current_state(timestamp)?,
            current_time_block_state,
            probability: probabilities[0],
            probabilities,
            time_block_rotation: predictor.indexer().slot_index(timestamp)?,
        })
    }
}
