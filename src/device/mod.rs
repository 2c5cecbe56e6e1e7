//! Camera device abstraction.
//!
//! The acquisition loop and every video viewer share one handle, so back ends
//! must accept concurrent calls from several threads.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::DeviceError;
use crate::types::{CombinedSample, RawFrame};

pub mod replay;
pub mod simulated;

pub use replay::ReplayDevice;
pub use simulated::{SimulatedDevice, TestPattern};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceModel {
    Zed,
    ZedM,
    Zed2,
    Zed2i,
    ZedX,
}

impl DeviceModel {
    /// The original ZED has no IMU, magnetometer or barometer.
    pub fn has_sensors(self) -> bool {
        !matches!(self, DeviceModel::Zed)
    }

    pub fn has_environment_sensors(self) -> bool {
        matches!(self, DeviceModel::Zed2 | DeviceModel::Zed2i | DeviceModel::ZedX)
    }
}

impl fmt::Display for DeviceModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceModel::Zed => "ZED",
            DeviceModel::ZedM => "ZED-M",
            DeviceModel::Zed2 => "ZED2",
            DeviceModel::Zed2i => "ZED2i",
            DeviceModel::ZedX => "ZED-X",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SensorParameters {
    pub sensor_type: String,
    pub is_available: bool,
    pub sampling_rate_hz: f64,
    /// (min, max)
    pub range: (f64, f64),
    pub resolution: f64,
    pub unit: String,
    pub noise_density: Option<f64>,
    pub random_walk: Option<f64>,
}

impl SensorParameters {
    /// Log the parameter block the way the SDK tutorials print it.
    pub fn log(&self) {
        if !self.is_available {
            return;
        }
        log::info!("[DEVICE] *****************************");
        log::info!("[DEVICE] Sensor type: {}", self.sensor_type);
        log::info!("[DEVICE] Max rate: {} Hz", self.sampling_rate_hz);
        log::info!("[DEVICE] Range: [{}, {}] {}", self.range.0, self.range.1, self.unit);
        log::info!("[DEVICE] Resolution: {} {}", self.resolution, self.unit);
        if let Some(noise) = self.noise_density {
            log::info!("[DEVICE] Noise Density: {} {}/sqrt(Hz)", noise, self.unit);
        }
        if let Some(walk) = self.random_walk {
            log::info!("[DEVICE] Random Walk: {} {}/s/sqrt(Hz)", walk, self.unit);
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DeviceInfo {
    pub model: DeviceModel,
    pub serial_number: u32,
    pub camera_firmware: u32,
    pub sensors_firmware: u32,
    pub sensors: Vec<SensorParameters>,
}

impl DeviceInfo {
    pub fn log(&self) {
        log::info!("[DEVICE] Camera Model: {}", self.model);
        log::info!("[DEVICE] Serial Number: {}", self.serial_number);
        log::info!("[DEVICE] Camera Firmware: {}", self.camera_firmware);
        log::info!("[DEVICE] Sensors Firmware: {}", self.sensors_firmware);
        for sensor in &self.sensors {
            sensor.log();
        }
    }
}

/// Handle to an opened camera.
pub trait CameraDevice: Send + Sync {
    fn info(&self) -> &DeviceInfo;

    /// Latest sample of every sensor the model carries. Repeated calls may
    /// return the same timestamps when a sensor has not ticked yet.
    fn poll_sensors(&self) -> Result<CombinedSample, DeviceError>;

    /// Grab and retrieve the left image. Blocks until a frame is available.
    fn grab_frame(&self) -> Result<RawFrame, DeviceError>;
}

#[derive(Clone, Debug, PartialEq)]
pub enum DeviceMode {
    Simulated,
    Replay(PathBuf),
}

#[derive(Clone, Debug)]
pub struct DeviceConfig {
    pub mode: DeviceMode,
    pub model: DeviceModel,
    pub frame_rate: u32,
    pub frame_width: u32,
    pub frame_height: u32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            mode: DeviceMode::Simulated,
            model: DeviceModel::Zed2,
            frame_rate: 30,
            frame_width: 672,
            frame_height: 376,
        }
    }
}

/// Open the configured back end and reject models without extra sensors.
pub fn open(config: &DeviceConfig) -> Result<Arc<dyn CameraDevice>, DeviceError> {
    if !config.model.has_sensors() {
        return Err(DeviceError::UnsupportedModel(config.model));
    }
    if config.frame_rate == 0 {
        return Err(DeviceError::OpenFailed("frame rate must be positive".to_string()));
    }

    let device: Arc<dyn CameraDevice> = match &config.mode {
        DeviceMode::Simulated => Arc::new(SimulatedDevice::new(config)),
        DeviceMode::Replay(path) => Arc::new(ReplayDevice::open(path, config)?),
    };
    Ok(device)
}

/// Sensor parameter blocks for a model, as the SDK would report them.
pub(crate) fn sensor_parameters_for(model: DeviceModel) -> Vec<SensorParameters> {
    let mut sensors = vec![
        SensorParameters {
            sensor_type: "ACCELEROMETER".to_string(),
            is_available: true,
            sampling_rate_hz: 400.0,
            range: (-78.4532, 78.4532),
            resolution: 0.0023928,
            unit: "m/s²".to_string(),
            noise_density: Some(0.0016),
            random_walk: Some(0.0002509),
        },
        SensorParameters {
            sensor_type: "GYROSCOPE".to_string(),
            is_available: true,
            sampling_rate_hz: 400.0,
            range: (-1000.0, 1000.0),
            resolution: 0.0305,
            unit: "deg/s".to_string(),
            noise_density: Some(0.007),
            random_walk: Some(0.0019474),
        },
    ];
    let env = model.has_environment_sensors();
    sensors.push(SensorParameters {
        sensor_type: "MAGNETOMETER".to_string(),
        is_available: env,
        sampling_rate_hz: 50.0,
        range: (-4900.0, 4900.0),
        resolution: 0.15,
        unit: "uT".to_string(),
        noise_density: None,
        random_walk: None,
    });
    sensors.push(SensorParameters {
        sensor_type: "BAROMETER".to_string(),
        is_available: env,
        sampling_rate_hz: 25.0,
        range: (260.0, 1260.0),
        resolution: 0.0039,
        unit: "hPa".to_string(),
        noise_density: None,
        random_walk: None,
    });
    sensors
}
