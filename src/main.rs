use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;

use camera_bridge_rs::{Bridge, BridgeArgs, BridgeConfig};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = BridgeArgs::parse();
    let config = BridgeConfig::try_from(args).context("invalid arguments")?;

    log::info!("[{}] Camera Bridge Starting", ts_now());
    log::info!("  Device: {:?} ({})", config.device.mode, config.device.model);
    log::info!("  Query surface: {}", config.query_addr);
    log::info!("  Metrics: {}", config.metrics_addr);
    log::info!("  Freshness: {:?}", config.freshness);

    let bridge = Bridge::start(&config).await.context("startup failed")?;

    tokio::signal::ctrl_c().await.context("failed to listen for ctrl-c")?;
    log::info!("[{}] Shutting down...", ts_now());

    let stats = bridge.shutdown().await;
    log::info!(
        "[{}] Stopped: {} polls, {} IMU / {} magnetometer / {} barometer readings accepted",
        ts_now(),
        stats.polls,
        stats.imu_accepted,
        stats.magnetometer_accepted,
        stats.barometer_accepted
    );

    Ok(())
}

fn ts_now() -> String {
    Utc::now().format("%H:%M:%S").to_string()
}
