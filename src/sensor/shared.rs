use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, TimeZone};

use super::{error::PredictorResult, predictor::Predictor};

/// Cloneable, lock-protected handle to one [`Predictor`].
///
/// One write lock covers one block update and one read lock covers a whole
/// forecast, so readers never see a half-applied update.
#[derive(Debug, Clone)]
pub struct SharedPredictor {
    inner: Arc<RwLock<Predictor>>,
}

impl SharedPredictor {
    pub fn new(predictor: Predictor) -> Self {
        Self {
            inner: Arc::new(RwLock::new(predictor)),
        }
    }

    pub fn on_block_end<Tz: TimeZone>(
        &self,
        timestamp: &DateTime<Tz>,
        observed_on: bool,
    ) -> PredictorResult<f64> {
        // an update is a single store, so a poisoned lock still guards a valid
        // table
        let mut predictor = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        predictor.on_block_end(timestamp, observed_on)
    }

    pub fn current_state<Tz: TimeZone>(&self, timestamp: &DateTime<Tz>) -> PredictorResult<bool> {
        self.read(|predictor| predictor.current_state(timestamp))
    }

    pub fn forecast<Tz: TimeZone>(&self, timestamp: &DateTime<Tz>) -> PredictorResult<Vec<f64>> {
        self.read(|predictor| predictor.forecast(timestamp))
    }

    /// Run `f` against a consistent view of the predictor.
    pub fn read<T>(&self, f: impl FnOnce(&Predictor) -> T) -> T {
        let predictor = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f(&predictor)
    }
}
