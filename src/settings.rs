use std::{collections::HashSet, fs, path::PathBuf, time::Duration};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::sensor::{PredictorConfig, PredictorError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// How often each source is sampled, in seconds
    pub poll_interval_secs: u64,
    /// Sensors to learn and predict
    pub sensors: Vec<SensorConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorConfig {
    /// Unique name, also used for the state file names
    pub name: String,
    /// File holding the source's current state (`on` or `off`)
    pub source: PathBuf,
    /// Length of the cycle in minutes, must divide one day
    #[serde(default = "default_period_minutes")]
    pub period_minutes: u64,
    /// Length of one time block in minutes, must divide one day
    #[serde(default = "default_time_block_minutes")]
    pub time_block_minutes: u64,
    /// Fading factor (0.0-1.0)
    #[serde(default = "default_fading")]
    pub fading: f64,
    /// Probability at which the sensor reports on (0.0-1.0)
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

fn default_period_minutes() -> u64 {
    24 * 60
}

fn default_time_block_minutes() -> u64 {
    5
}

fn default_fading() -> f64 {
    crate::sensor::DEFAULT_FADING
}

fn default_threshold() -> f64 {
    crate::sensor::DEFAULT_THRESHOLD
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 10,
            sensors: Vec::new(),
        }
    }
}

impl SensorConfig {
    pub fn predictor_config(&self) -> Result<PredictorConfig, PredictorError> {
        let config = PredictorConfig {
            period_length: Duration::from_secs(self.period_minutes.saturating_mul(60)),
            block_length: Duration::from_secs(self.time_block_minutes.saturating_mul(60)),
            fading: self.fading,
            threshold: self.threshold,
        };
        config.validate()?;

        Ok(config)
    }
}

impl DaemonConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    /// Sensors with a usable configuration. Invalid or duplicate sensors are
    /// logged and skipped.
    pub fn valid_sensors(&self) -> Vec<(SensorConfig, PredictorConfig)> {
        let mut seen = HashSet::new();

        self.sensors
            .iter()
            .filter_map(|sensor| {
                if !is_valid_name(&sensor.name) {
                    log::warn!(
                        "skipping sensor {:?}: names may only use letters, digits, '-' and '_'",
                        sensor.name
                    );
                    return None;
                }

                if !seen.insert(sensor.name.as_str()) {
                    log::warn!("skipping duplicate sensor {:?}", sensor.name);
                    return None;
                }

                match sensor.predictor_config() {
                    Ok(config) => Some((sensor.clone(), config)),
                    Err(e) => {
                        log::warn!("skipping sensor {:?}: {}", sensor.name, e);
                        None
                    }
                }
            })
            .collect()
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[derive(Debug)]
pub struct ConfigManager {
    config: DaemonConfig,
    config_path: PathBuf,
}

impl ConfigManager {
    /// Load the configuration from `path`, or from the default location
    pub fn new(path: Option<PathBuf>) -> Result<Self> {
        let config_path = path.unwrap_or_else(Self::get_config_path);
        let config = Self::load_config(&config_path)?;

        Ok(Self {
            config,
            config_path,
        })
    }

    /// load configuration from file, create default if doesn't exist
    pub fn load_config(path: &PathBuf) -> Result<DaemonConfig> {
        if path.exists() {
            let content = fs::read_to_string(path)?;
            let config: DaemonConfig = serde_json::from_str(&content)?;
            log::info!("loaded configuration from: {}", path.display());
            Ok(config)
        } else {
            let default_config = DaemonConfig::default();

            // create config directory if it doesn't exist
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }

            // write default config
            let content = serde_json::to_string_pretty(&default_config)?;
            fs::write(path, content)?;
            log::info!("created default configuration at: {}", path.display());

            Ok(default_config)
        }
    }

    /// Get the configuration file path
    pub fn get_config_path() -> PathBuf {
        // Use XDG config directory or fallback to ~/.config
        let config_dir = if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            PathBuf::from(xdg_config)
        } else if let Ok(home) = std::env::var("HOME") {
            PathBuf::from(home).join(".config")
        } else {
            PathBuf::from("./config") // fallback for testing
        };

        config_dir
            .join("binary-sensor-predictor")
            .join("config.json")
    }

    /// Get the current configuration
    pub fn config(&self) -> &DaemonConfig {
        &self.config
    }

    pub fn config_path(&self) -> &PathBuf {
        &self.config_path
    }
}
