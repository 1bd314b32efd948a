use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Local, TimeZone, Utc};
use tokio::time::MissedTickBehavior;

use super::{
    BlockObservation, Predictor, PredictorAttributes, PredictorConfig, PredictorResult,
    SharedPredictor, SourceWatch, get_attributes_path, get_state_path, load_predictor,
    read_source_state, save_predictor, write_attributes,
};
use crate::settings::SensorConfig;

/// Restore a sensor's predictor from its state file, or start a fresh one.
pub fn load_or_create_predictor(name: &str, config: PredictorConfig) -> PredictorResult<Predictor> {
    let restored = get_state_path(name).and_then(|path| load_predictor(&path, config));

    match restored {
        Ok(restored) => {
            log::info!("loaded predictor for {name} from previous session");

            let missed = missed_blocks(&restored.predictor, restored.saved_at, &Local::now());
            if missed > 0 {
                log::info!("{name} missed {missed} blocks while stopped, leaving them untouched");
            }

            Ok(restored.predictor)
        }
        Err(e) => {
            log::info!("creating new predictor for {name}: {e}");
            Predictor::new(config)
        }
    }
}

/// Save a sensor's predictor to its state file.
pub fn save_sensor(name: &str, predictor: &SharedPredictor) -> Result<()> {
    let path = get_state_path(name)?;
    let snapshot = predictor.read(Predictor::clone);
    save_predictor(&path, &snapshot, Utc::now())
}

/// Number of whole blocks that ended between the block containing
/// `saved_at` and the block containing `now`. A block that was still running
/// when the state was saved counts as missed.
fn missed_blocks<Tz: TimeZone>(
    predictor: &Predictor,
    saved_at: DateTime<Utc>,
    now: &DateTime<Tz>,
) -> i64 {
    let block_secs = predictor.config().block_length.as_secs() as i64;
    let saved_at = saved_at.with_timezone(&now.timezone());

    let saved_block_start = predictor.indexer().block_start(&saved_at);
    let current_block_start = predictor.indexer().block_start(now);

    let elapsed = (current_block_start - saved_block_start).num_seconds();
    if elapsed <= 0 {
        0
    } else {
        elapsed / block_secs
    }
}

/// Where the block starting at `block_start` stands at `now`.
///
/// `None` while it is still running, including when the wall clock went
/// backwards. Otherwise the start of the block containing `now`, and how many
/// whole blocks passed in between without being observed.
fn block_boundary<Tz: TimeZone>(
    predictor: &Predictor,
    block_start: &DateTime<Tz>,
    now: &DateTime<Tz>,
) -> Option<(DateTime<Tz>, i64)> {
    let next_block = predictor.indexer().next_block_start(block_start);
    if *now < next_block {
        return None;
    }

    let block_secs = predictor.config().block_length.as_secs() as i64;
    let current_block = predictor.indexer().block_start(now);
    let skipped = (current_block.clone() - next_block).num_seconds() / block_secs;

    Some((current_block, skipped))
}

/// Resolves when the watched source changes. Never resolves without a watch.
async fn source_changed(watch: &mut Option<SourceWatch>) -> Result<()> {
    match watch {
        Some(watch) => watch.changed().await,
        None => std::future::pending().await,
    }
}

/// Sample the sensor's source, logging unreadable states.
fn sample_source(sensor: &SensorConfig, observation: &mut BlockObservation) {
    match read_source_state(&sensor.source) {
        Ok(on) => observation.record(on),
        Err(e) => log::warn!("couldn't sample source of {}: {e:#}", sensor.name),
    }
}

/// Write the sensor's current attributes.
fn publish_attributes(
    sensor: &SensorConfig,
    predictor: &SharedPredictor,
    observation: &BlockObservation,
) {
    let now = Local::now();
    let attributes = predictor
        .read(|predictor| PredictorAttributes::snapshot(predictor, &now, observation.block_on()));

    let result = match attributes {
        Ok(attributes) => {
            log::debug!(
                "{} is {} (probability {:.3})",
                sensor.name,
                if attributes.is_on { "on" } else { "off" },
                attributes.probability
            );
            get_attributes_path(&sensor.name).and_then(|path| write_attributes(&path, &attributes))
        }
        Err(e) => Err(e.into()),
    };

    if let Err(e) = result {
        log::warn!("couldn't publish attributes of {}: {e:#}", sensor.name);
    }
}

/// Drive one sensor: sample its source on every change and every
/// `poll_interval`, and feed the predictor once per ended block.
pub async fn start_sensor_watcher(
    sensor: SensorConfig,
    predictor: SharedPredictor,
    poll_interval: Duration,
) {
    let mut observation = BlockObservation::new();
    let mut block_start = predictor.read(|predictor| predictor.indexer().block_start(&Local::now()));

    // set the watch up before the first sample so no change slips in between
    let mut watch = match SourceWatch::new(&sensor.source) {
        Ok(watch) => Some(watch),
        Err(e) => {
            log::warn!("couldn't watch source of {}, polling only: {e:#}", sensor.name);
            None
        }
    };

    sample_source(&sensor, &mut observation);
    publish_attributes(&sensor, &predictor, &observation);

    let mut poll = tokio::time::interval(poll_interval);
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

    log::info!("watching {} for {}", sensor.source.display(), sensor.name);

    loop {
        let next_block =
            predictor.read(|predictor| predictor.indexer().next_block_start(&block_start));
        let until_next_block = (next_block - Local::now())
            .to_std()
            .unwrap_or(Duration::ZERO);

        tokio::select! {
            changed = source_changed(&mut watch) => match changed {
                Ok(()) => sample_source(&sensor, &mut observation),
                Err(e) => {
                    log::error!("source watcher for {} has died, polling only: {e:#}", sensor.name);
                    watch = None;
                }
            },
            _ = poll.tick() => {
                sample_source(&sensor, &mut observation);
            }
            _ = tokio::time::sleep(until_next_block) => {
                let now = Local::now();
                let Some((current_block, skipped)) =
                    predictor.read(|predictor| block_boundary(predictor, &block_start, &now))
                else {
                    continue;
                };

                let observed_on = observation.finish_block();

                match predictor.on_block_end(&block_start, observed_on) {
                    Ok(probability) => log::debug!(
                        "{} block at {} observed {}, probability now {:.3}",
                        sensor.name,
                        block_start.format("%H:%M"),
                        observed_on,
                        probability
                    ),
                    Err(e) => log::error!("couldn't update predictor for {}: {}", sensor.name, e),
                }

                if skipped > 0 {
                    log::info!(
                        "{} skipped {} blocks before {}, leaving them untouched",
                        sensor.name,
                        skipped,
                        current_block.format("%H:%M")
                    );
                }
                block_start = current_block;

                if let Err(e) = save_sensor(&sensor.name, &predictor) {
                    log::warn!("couldn't save predictor for {}: {e:#}", sensor.name);
                }

                publish_attributes(&sensor, &predictor, &observation);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missed_blocks() {
        let predictor = Predictor::new(PredictorConfig::default()).unwrap();
        let saved_at = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();

        // restarted within the same block
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 8, 3, 0).unwrap();
        assert_eq!(missed_blocks(&predictor, saved_at, &now), 0);

        // 08:00-08:05 and 08:05-08:10 ended unobserved
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 8, 12, 0).unwrap();
        assert_eq!(missed_blocks(&predictor, saved_at, &now), 2);

        // a whole day away
        let now = Utc.with_ymd_and_hms(2024, 5, 2, 8, 0, 0).unwrap();
        assert_eq!(missed_blocks(&predictor, saved_at, &now), 288);

        // saved "in the future" after a clock change
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 7, 0, 0).unwrap();
        assert_eq!(missed_blocks(&predictor, saved_at, &now), 0);
    }

    #[test]
    fn test_missed_blocks_saved_mid_block() {
        let predictor = Predictor::new(PredictorConfig::default()).unwrap();
        let saved_at = Utc.with_ymd_and_hms(2024, 5, 1, 8, 3, 0).unwrap();

        // the 08:00 block was cut short, the 08:05 block never observed
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 8, 12, 0).unwrap();
        assert_eq!(missed_blocks(&predictor, saved_at, &now), 2);

        // back inside the block that was running at save time
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 8, 4, 0).unwrap();
        assert_eq!(missed_blocks(&predictor, saved_at, &now), 0);
    }

    #[test]
    fn test_block_boundary() {
        let predictor = Predictor::new(PredictorConfig::default()).unwrap();
        let block_start = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();

        // still inside the block
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 8, 4, 59).unwrap();
        assert_eq!(block_boundary(&predictor, &block_start, &now), None);

        // the wall clock went backwards
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 7, 58, 0).unwrap();
        assert_eq!(block_boundary(&predictor, &block_start, &now), None);

        // woke up right on time
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 8, 5, 0).unwrap();
        assert_eq!(
            block_boundary(&predictor, &block_start, &now),
            Some((now, 0))
        );

        // woke up late, after a suspend
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 8, 21, 30).unwrap();
        assert_eq!(
            block_boundary(&predictor, &block_start, &now),
            Some((Utc.with_ymd_and_hms(2024, 5, 1, 8, 20, 0).unwrap(), 3))
        );
    }

    #[test]
    fn test_block_boundary_across_midnight() {
        let predictor = Predictor::new(PredictorConfig::default()).unwrap();
        let block_start = Utc.with_ymd_and_hms(2024, 5, 1, 23, 55, 0).unwrap();

        let now = Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 1).unwrap();
        let (current_block, skipped) = block_boundary(&predictor, &block_start, &now).unwrap();

        assert_eq!(current_block, Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap());
        assert_eq!(skipped, 0);
        assert_eq!(predictor.indexer().slot_index(&current_block), Ok(0));
    }
}
