use chrono::{DateTime, TimeZone};

use super::{
    config::PredictorConfig,
    error::PredictorResult,
    indexer::TimeBlockIndexer,
    table::ProbabilityTable,
};

/// Per-time-block predictor for a binary sensor.
///
/// Its only state is the probability table; there is no warm-up mode. A
/// fresh predictor reports every slot as 0 and blends in one more day of
/// evidence each time a slot's block ends.
#[derive(Debug, Clone, PartialEq)]
pub struct Predictor {
    config: PredictorConfig,
    indexer: TimeBlockIndexer,
    table: ProbabilityTable,
}

impl Predictor {
    pub fn new(config: PredictorConfig) -> PredictorResult<Self> {
        let indexer = TimeBlockIndexer::new(&config)?;
        let table = ProbabilityTable::new(indexer.slot_count(), config.fading);

        Ok(Self {
            config,
            indexer,
            table,
        })
    }

    /// Create a predictor that continues from previously saved probabilities.
    pub fn with_probabilities(
        config: PredictorConfig,
        probabilities: Vec<f64>,
    ) -> PredictorResult<Self> {
        let indexer = TimeBlockIndexer::new(&config)?;
        let table =
            ProbabilityTable::from_probabilities(probabilities, indexer.slot_count(), config.fading)?;

        Ok(Self {
            config,
            indexer,
            table,
        })
    }

    /// Record the observation for the block containing `timestamp`, which has
    /// just ended. Returns the slot's new probability.
    ///
    /// Not idempotent: calling this twice for the same block applies the
    /// fading rule twice.
    pub fn on_block_end<Tz: TimeZone>(
        &mut self,
        timestamp: &DateTime<Tz>,
        observed_on: bool,
    ) -> PredictorResult<f64> {
        let slot = self.indexer.slot_index(timestamp)?;
        let probability = self.table.update(slot, observed_on)?;

        log::trace!("slot {slot} observed {observed_on}, probability now {probability}");
        Ok(probability)
    }

    /// Whether the sensor is predicted to be on at `timestamp`.
    pub fn current_state<Tz: TimeZone>(&self, timestamp: &DateTime<Tz>) -> PredictorResult<bool> {
        Ok(self.probability(timestamp)? >= self.config.threshold)
    }

    /// Probability for the block containing `timestamp`.
    pub fn probability<Tz: TimeZone>(&self, timestamp: &DateTime<Tz>) -> PredictorResult<f64> {
        self.table.get(self.indexer.slot_index(timestamp)?)
    }

    /// Probabilities for every block of the cycle, starting with the block
    /// containing `timestamp`.
    pub fn forecast<Tz: TimeZone>(&self, timestamp: &DateTime<Tz>) -> PredictorResult<Vec<f64>> {
        let slot = self.indexer.slot_index(timestamp)?;
        Ok(self.table.rotated(slot)?.collect())
    }

    pub fn config(&self) -> &PredictorConfig {
        &self.config
    }

    pub fn indexer(&self) -> &TimeBlockIndexer {
        &self.indexer
    }

    /// Probabilities indexed by slot of day, unrotated.
    pub fn probabilities(&self) -> &[f64] {
        self.table.as_slice()
    }
}
