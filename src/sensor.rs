//! Learns when a binary sensor is usually on, per time block of the day.
//!
//! Every block of the daily cycle owns one probability. When a block ends,
//! its probability fades towards what was observed during it:
//!
//! ```text
//! p = p × fading + observed × (1 - fading)
//! ```
//!
//! The predicted state for a block is `p >= threshold`, and the forecast is
//! the table read starting at the current block. Blocks that end without an
//! observation (the host was stopped) are left untouched.

mod attributes;
mod config;
mod error;
mod indexer;
mod observation;
mod persistence;
mod predictor;
mod shared;
mod source;
mod table;
mod watcher;

pub use attributes::PredictorAttributes;
pub use config::{DEFAULT_FADING, DEFAULT_THRESHOLD, PredictorConfig};
pub use error::{PredictorError, PredictorResult};
pub use indexer::TimeBlockIndexer;
pub use observation::BlockObservation;
pub use persistence::{
    RestoredPredictor, get_attributes_path, get_state_path, load_predictor, save_predictor,
    write_attributes,
};
pub use predictor::Predictor;
pub use shared::SharedPredictor;
pub use source::{SourceWatch, parse_source_state, read_source_state};
pub use table::ProbabilityTable;
pub use watcher::{load_or_create_predictor, save_sensor, start_sensor_watcher};
