use chrono::{DateTime, TimeZone, Timelike};

use super::{
    config::PredictorConfig,
    error::{PredictorError, PredictorResult},
};

/// Maps wall-clock instants onto the slots of the daily cycle.
///
/// Slots are counted from local midnight of the timestamp's own time zone, so
/// indices stay stable across restarts. On days with a DST shift some slots
/// are skipped or visited twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeBlockIndexer {
    block_secs: u64,
    slot_count: usize,
}

impl TimeBlockIndexer {
    pub fn new(config: &PredictorConfig) -> PredictorResult<Self> {
        let slot_count = config.validate()?;

        Ok(Self {
            block_secs: config.block_length.as_secs(),
            slot_count,
        })
    }

    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    /// Slot of the block containing `timestamp`.
    ///
    /// A timestamp exactly on a boundary belongs to the block that starts
    /// there.
    pub fn slot_index<Tz: TimeZone>(&self, timestamp: &DateTime<Tz>) -> PredictorResult<usize> {
        let seconds_of_day = timestamp.time().num_seconds_from_midnight() as u64;
        let slot = (seconds_of_day / self.block_secs) as usize % self.slot_count;

        // only reachable through an indexing bug; never clamp into a neighbor
        if slot >= self.slot_count {
            return Err(PredictorError::OutOfRangeSlot {
                slot,
                slot_count: self.slot_count,
            });
        }

        Ok(slot)
    }

    /// Start of the block containing `timestamp`.
    pub fn block_start<Tz: TimeZone>(&self, timestamp: &DateTime<Tz>) -> DateTime<Tz> {
        timestamp.clone() - self.offset_into_block(timestamp)
    }

    /// Start of the block after the one containing `timestamp`.
    pub fn next_block_start<Tz: TimeZone>(&self, timestamp: &DateTime<Tz>) -> DateTime<Tz> {
        self.block_start(timestamp) + chrono::Duration::seconds(self.block_secs as i64)
    }

    fn offset_into_block<Tz: TimeZone>(&self, timestamp: &DateTime<Tz>) -> chrono::Duration {
        let time = timestamp.time();
        let seconds = time.num_seconds_from_midnight() as u64 % self.block_secs;
        // leap seconds report nanoseconds past 1e9
        let nanos = time.nanosecond().min(999_999_999);

        chrono::Duration::seconds(seconds as i64) + chrono::Duration::nanoseconds(nanos as i64)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{FixedOffset, Utc};

    use super::*;

    fn default_indexer() -> TimeBlockIndexer {
        TimeBlockIndexer::new(&PredictorConfig::default()).unwrap()
    }

    #[test]
    fn test_slot_index_calculation() {
        let indexer = default_indexer();

        // 00:00 -> slot 0
        let t = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        assert_eq!(indexer.slot_index(&t), Ok(0));

        // 00:04:59 -> still slot 0
        let t = Utc.with_ymd_and_hms(2024, 5, 1, 0, 4, 59).unwrap();
        assert_eq!(indexer.slot_index(&t), Ok(0));

        // 12:00 -> slot 144
        let t = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(indexer.slot_index(&t), Ok(144));

        // 23:59:59 -> slot 287 (last slot)
        let t = Utc.with_ymd_and_hms(2024, 5, 1, 23, 59, 59).unwrap();
        assert_eq!(indexer.slot_index(&t), Ok(287));
    }

    #[test]
    fn test_boundary_belongs_to_starting_block() {
        let indexer = default_indexer();

        let boundary = Utc.with_ymd_and_hms(2024, 5, 1, 8, 5, 0).unwrap();
        let just_before = boundary - chrono::Duration::nanoseconds(1);

        assert_eq!(indexer.slot_index(&boundary), Ok(97));
        assert_eq!(indexer.slot_index(&just_before), Ok(96));
    }

    #[test]
    fn test_uses_local_wall_clock() {
        let indexer = default_indexer();

        // local midnight at UTC+02:00 is 22:00 UTC the previous day
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let local_midnight = tz.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap();
        assert_eq!(indexer.slot_index(&local_midnight), Ok(0));

        let same_instant_utc = local_midnight.with_timezone(&Utc);
        assert_eq!(indexer.slot_index(&same_instant_utc), Ok(264));
    }

    #[test]
    fn test_short_period_wraps() {
        // four 5-minute slots: 00:20 is back to slot 0
        let config = PredictorConfig {
            period_length: Duration::from_secs(20 * 60),
            ..Default::default()
        };
        let indexer = TimeBlockIndexer::new(&config).unwrap();
        assert_eq!(indexer.slot_count(), 4);

        let t = Utc.with_ymd_and_hms(2024, 5, 1, 0, 20, 0).unwrap();
        assert_eq!(indexer.slot_index(&t), Ok(0));

        let t = Utc.with_ymd_and_hms(2024, 5, 1, 0, 35, 0).unwrap();
        assert_eq!(indexer.slot_index(&t), Ok(3));
    }

    #[test]
    fn test_block_start_and_next() {
        let indexer = default_indexer();

        let t = Utc.with_ymd_and_hms(2024, 5, 1, 8, 7, 30).unwrap();
        assert_eq!(
            indexer.block_start(&t),
            Utc.with_ymd_and_hms(2024, 5, 1, 8, 5, 0).unwrap()
        );
        assert_eq!(
            indexer.next_block_start(&t),
            Utc.with_ymd_and_hms(2024, 5, 1, 8, 10, 0).unwrap()
        );

        // a boundary is its own block start
        let boundary = Utc.with_ymd_and_hms(2024, 5, 1, 8, 10, 0).unwrap();
        assert_eq!(indexer.block_start(&boundary), boundary);

        // the last block of the day rolls over to midnight
        let late = Utc.with_ymd_and_hms(2024, 5, 1, 23, 58, 0).unwrap();
        assert_eq!(
            indexer.next_block_start(&late),
            Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_last_block_ends_at_midnight() {
        for minutes in [1, 10, 15, 45, 120] {
            let config = PredictorConfig {
                block_length: Duration::from_secs(minutes * 60),
                ..Default::default()
            };
            let indexer = TimeBlockIndexer::new(&config).unwrap();

            let late = Utc.with_ymd_and_hms(2024, 5, 1, 23, 58, 30).unwrap();
            let next = indexer.next_block_start(&late);

            assert_eq!(
                next,
                Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap(),
                "block of {minutes} min"
            );
            assert_eq!(indexer.slot_index(&next), Ok(0), "block of {minutes} min");
        }
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = PredictorConfig {
            block_length: Duration::from_secs(7 * 60),
            ..Default::default()
        };
        assert!(TimeBlockIndexer::new(&config).is_err());
    }
}
