//! Per-time-block on/off predictor for binary sensors, plus a small daemon
//! that feeds it from state files.

pub mod sensor;
pub mod settings;
