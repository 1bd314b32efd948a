use std::time::Duration;

use super::error::{PredictorError, PredictorResult};

/// Length of one calendar day.
pub const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Default time block length (5 minutes, 288 blocks per day).
pub const DEFAULT_BLOCK_LENGTH: Duration = Duration::from_secs(5 * 60);

pub const DEFAULT_FADING: f64 = 0.5;
pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// Parameters of a single predictor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictorConfig {
    /// Length of the recurring cycle. Must divide one day evenly.
    pub period_length: Duration,

    /// Length of a single time block. `period_length` must be an exact
    /// multiple of it, and it must divide one day evenly.
    pub block_length: Duration,

    /// Weight of the previous estimate in the update rule (0.0-1.0). higher =
    /// slower adaptation, 1.0 freezes the table.
    pub fading: f64,

    /// Minimum probability at which the sensor reports "on" (0.0-1.0).
    pub threshold: f64,
}

impl PredictorConfig {
    /// Check the configuration and return the number of slots it describes.
    pub fn validate(&self) -> PredictorResult<usize> {
        if !self.fading.is_finite() || !(0.0..=1.0).contains(&self.fading) {
            return Err(PredictorError::invalid_config(format!(
                "fading factor {} is outside [0, 1]",
                self.fading
            )));
        }

        if !self.threshold.is_finite() || !(0.0..=1.0).contains(&self.threshold) {
            return Err(PredictorError::invalid_config(format!(
                "threshold {} is outside [0, 1]",
                self.threshold
            )));
        }

        if self.block_length.subsec_nanos() != 0 || self.period_length.subsec_nanos() != 0 {
            return Err(PredictorError::invalid_config(
                "period and block lengths must be whole seconds",
            ));
        }

        let block_secs = self.block_length.as_secs();
        let period_secs = self.period_length.as_secs();

        if block_secs == 0 {
            return Err(PredictorError::invalid_config("block length must not be zero"));
        }

        if period_secs == 0 || period_secs % block_secs != 0 {
            return Err(PredictorError::invalid_config(format!(
                "period of {period_secs}s is not a multiple of the {block_secs}s block length"
            )));
        }

        if self.period_length > DAY {
            return Err(PredictorError::invalid_config(format!(
                "period of {period_secs}s is longer than one day"
            )));
        }

        // blocks and cycles restart at local midnight, so both must tile the day
        let day_secs = DAY.as_secs();

        if day_secs % block_secs != 0 {
            return Err(PredictorError::invalid_config(format!(
                "block length of {block_secs}s does not divide one day"
            )));
        }

        if day_secs % period_secs != 0 {
            return Err(PredictorError::invalid_config(format!(
                "period of {period_secs}s does not divide one day"
            )));
        }

        Ok((period_secs / block_secs) as usize)
    }
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            period_length: DAY,
            block_length: DEFAULT_BLOCK_LENGTH,
            fading: DEFAULT_FADING,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}
