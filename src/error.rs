use std::net::SocketAddr;
use thiserror::Error;

use crate::device::DeviceModel;

/// Failures reported by a camera back end
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeviceError {
    #[error("Failed to open device: {0}")]
    OpenFailed(String),

    #[error("{0} has no additional sensors (IMU, magnetometer, barometer)")]
    UnsupportedModel(DeviceModel),

    #[error("Sensor data not available: {0}")]
    SensorsUnavailable(String),

    #[error("Frame grab failed: {0}")]
    GrabFailed(String),

    #[error("Replay exhausted after {0} samples")]
    ReplayExhausted(usize),
}

/// Bridge-level errors surfaced at startup
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error("Failed to bind {what} on {addr}: {source}")]
    Bind {
        what: &'static str,
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to spawn acquisition thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Frame encoding failed: {0}")]
    Encode(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type BridgeResult<T> = Result<T, BridgeError>;
