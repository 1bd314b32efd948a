use super::error::{PredictorError, PredictorResult};

/// Probability of the source being on, for each slot of the cycle.
///
/// Each slot fades independently: `p = p × fading + observed × (1 - fading)`.
/// Starting from 0, every value stays within [0, 1] because each update is a
/// weighted average of two values in that range.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityTable {
    slots: Vec<f64>,
    fading: f64,
}

impl ProbabilityTable {
    /// Create a table of `slot_count` zeroed slots.
    ///
    /// `fading` is assumed to have been validated by
    /// [`PredictorConfig::validate`](super::config::PredictorConfig::validate).
    pub fn new(slot_count: usize, fading: f64) -> Self {
        Self {
            slots: vec![0.0; slot_count],
            fading,
        }
    }

    /// Rebuild a table from restored probabilities.
    pub fn from_probabilities(
        probabilities: Vec<f64>,
        slot_count: usize,
        fading: f64,
    ) -> PredictorResult<Self> {
        if probabilities.len() != slot_count {
            return Err(PredictorError::SlotCountMismatch {
                expected: slot_count,
                actual: probabilities.len(),
            });
        }

        if let Some((slot, &value)) = probabilities
            .iter()
            .enumerate()
            .find(|(_, p)| !p.is_finite() || !(0.0..=1.0).contains(*p))
        {
            return Err(PredictorError::InvalidProbability { slot, value });
        }

        Ok(Self {
            slots: probabilities,
            fading,
        })
    }

    /// Apply one ended block's observation to its slot.
    pub fn update(&mut self, slot: usize, observed_on: bool) -> PredictorResult<f64> {
        let slot_count = self.slots.len();
        let fading = self.fading;
        let p = self
            .slots
            .get_mut(slot)
            .ok_or(PredictorError::OutOfRangeSlot { slot, slot_count })?;

        let observed = if observed_on { 1.0 } else { 0.0 };
        *p = *p * fading + observed * (1.0 - fading);

        Ok(*p)
    }

    pub fn get(&self, slot: usize) -> PredictorResult<f64> {
        self.slots
            .get(slot)
            .copied()
            .ok_or(PredictorError::OutOfRangeSlot {
                slot,
                slot_count: self.slots.len(),
            })
    }

    /// All slots, starting at `start` and wrapping around the end of the
    /// cycle. Nothing is moved; the view is two chained slices.
    pub fn rotated(&self, start: usize) -> PredictorResult<impl Iterator<Item = f64> + '_> {
        if start >= self.slots.len() {
            return Err(PredictorError::OutOfRangeSlot {
                slot: start,
                slot_count: self.slots.len(),
            });
        }

        let (before, from_start) = self.slots.split_at(start);
        Ok(from_start.iter().chain(before).copied())
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.slots
    }
}
