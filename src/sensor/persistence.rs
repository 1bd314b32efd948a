use std::{
    fs,
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{attributes::PredictorAttributes, config::PredictorConfig, predictor::Predictor};

/// Serialization format version. Increment when the format changes
/// incompatibly so that old files are discarded instead of misread.
const STATE_VERSION: u32 = 0;

/// Serializable state for one predictor.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PredictorState {
    /// Format version -- used to discard incompatible saved states.
    version: u32,
    slot_count: usize,
    /// Probabilities indexed by slot of day, unrotated.
    probabilities: Vec<f64>,
    saved_at: DateTime<Utc>,
}

impl PredictorState {
    fn from_predictor(predictor: &Predictor, saved_at: DateTime<Utc>) -> Self {
        Self {
            version: STATE_VERSION,
            slot_count: predictor.indexer().slot_count(),
            probabilities: predictor.probabilities().to_vec(),
            saved_at,
        }
    }

    /// Rebuild a predictor for `config`, or `None` if this state doesn't fit it.
    fn to_predictor(&self, config: PredictorConfig) -> Option<Predictor> {
        if self.version != STATE_VERSION {
            log::info!(
                "predictor state version mismatch (got {}, want {}), starting fresh",
                self.version,
                STATE_VERSION
            );
            return None;
        }

        if self.slot_count != self.probabilities.len() {
            log::warn!(
                "predictor state claims {} slots but holds {}",
                self.slot_count,
                self.probabilities.len()
            );
            return None;
        }

        Predictor::with_probabilities(config, self.probabilities.clone())
            .map_err(|e| log::warn!("saved predictor state doesn't fit the configuration: {e}"))
            .ok()
    }
}

/// A predictor restored from disk, with the time it was saved.
#[derive(Debug, Clone)]
pub struct RestoredPredictor {
    pub predictor: Predictor,
    pub saved_at: DateTime<Utc>,
}

/// Get the directory holding predictor state and attributes.
fn get_state_dir() -> Result<PathBuf> {
    let state_dir = dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .context("couldn't find state directory")?;

    let predictor_state = state_dir.join("binary-sensor-predictor");
    fs::create_dir_all(&predictor_state)?;

    Ok(predictor_state)
}

/// Get the path to a sensor's predictor state file.
pub fn get_state_path(sensor_name: &str) -> Result<PathBuf> {
    Ok(get_state_dir()?.join(format!("{sensor_name}.json")))
}

/// Get the path to a sensor's published attributes.
pub fn get_attributes_path(sensor_name: &str) -> Result<PathBuf> {
    Ok(get_state_dir()?.join(format!("{sensor_name}.attributes.json")))
}

/// Replace the file at `path` with `contents`.
///
/// The contents go to a temporary file next to `path` first and are renamed
/// over it, so concurrent writers and readers only ever see a whole file.
fn write_atomically(path: &Path, contents: &str) -> Result<()> {
    static NEXT_TEMP: AtomicU64 = AtomicU64::new(0);

    let file_name = path
        .file_name()
        .with_context(|| format!("{path:?} has no file name"))?;
    let mut temp_name = file_name.to_os_string();
    temp_name.push(format!(
        ".{}.{}.tmp",
        std::process::id(),
        NEXT_TEMP.fetch_add(1, Ordering::Relaxed)
    ));
    let temp_path = path.with_file_name(temp_name);

    if let Err(e) = fs::write(&temp_path, contents) {
        let _ = fs::remove_file(&temp_path);
        return Err(e).with_context(|| format!("couldn't write {temp_path:?}"));
    }

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        anyhow::Error::new(e).context(format!("couldn't replace {path:?}"))
    })
}

/// Save predictor state to disk.
pub fn save_predictor(path: &Path, predictor: &Predictor, saved_at: DateTime<Utc>) -> Result<()> {
    let state = PredictorState::from_predictor(predictor, saved_at);
    let json = serde_json::to_string_pretty(&state)?;

    write_atomically(path, &json).context("couldn't write predictor state")?;

    log::debug!("saved predictor state to {:?}", path);
    Ok(())
}

/// Load predictor state from disk.
///
/// Fails if the file is missing, corrupt, from an incompatible version, or
/// saved under a different slot layout; the caller then starts fresh.
pub fn load_predictor(path: &Path, config: PredictorConfig) -> Result<RestoredPredictor> {
    let json = fs::read_to_string(path).context("couldn't read predictor state")?;
    let state: PredictorState = serde_json::from_str(&json)?;

    let predictor = state.to_predictor(config).ok_or_else(|| {
        anyhow::anyhow!("predictor state was invalid or incompatible, starting fresh")
    })?;

    Ok(RestoredPredictor {
        predictor,
        saved_at: state.saved_at,
    })
}

/// Publish a sensor's attributes.
pub fn write_attributes(path: &Path, attributes: &PredictorAttributes) -> Result<()> {
    let json = serde_json::to_string_pretty(attributes)?;
    write_atomically(path, &json)
        .with_context(|| format!("couldn't write attributes to {path:?}"))?;
    Ok(())
}
