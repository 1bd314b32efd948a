use std::path::PathBuf;

use anyhow::{Context, Result};
use binary_sensor_predictor::{
    sensor::{SharedPredictor, load_or_create_predictor, save_sensor, start_sensor_watcher},
    settings::ConfigManager,
};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    // optional config path as the only argument
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let manager = ConfigManager::new(config_path).context("failed to load configuration")?;
    let config = manager.config();

    let sensors = config.valid_sensors();
    if sensors.is_empty() {
        log::warn!(
            "no sensors configured, add some to {}",
            manager.config_path().display()
        );
        return Ok(());
    }

    let mut running = Vec::with_capacity(sensors.len());
    for (sensor, predictor_config) in sensors {
        let predictor = match load_or_create_predictor(&sensor.name, predictor_config) {
            Ok(predictor) => SharedPredictor::new(predictor),
            Err(e) => {
                log::error!("couldn't start sensor {}: {}", sensor.name, e);
                continue;
            }
        };

        running.push((sensor.name.clone(), predictor.clone()));
        tokio::spawn(start_sensor_watcher(
            sensor,
            predictor,
            config.poll_interval(),
        ));
    }

    shutdown_signal().await?;

    log::info!("shutting down, saving {} predictors", running.len());
    for (name, predictor) in &running {
        if let Err(e) = save_sensor(name, predictor) {
            log::warn!("couldn't save predictor for {name}: {e:#}");
        }
    }

    Ok(())
}

/// Wait for Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut terminate =
            signal(SignalKind::terminate()).context("couldn't listen for SIGTERM")?;

        tokio::select! {
            result = tokio::signal::ctrl_c() => result.context("couldn't listen for ctrl-c")?,
            _ = terminate.recv() => {}
        }
    }

    #[cfg(not(unix))]
    tokio::signal::ctrl_c()
        .await
        .context("couldn't listen for ctrl-c")?;

    Ok(())
}
