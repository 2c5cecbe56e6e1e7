use flate2::read::GzDecoder;
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Mutex;

use super::{sensor_parameters_for, CameraDevice, DeviceConfig, DeviceInfo};
use crate::error::DeviceError;
use crate::types::{CombinedSample, RawFrame};

use super::simulated::FrameClock;

#[derive(Deserialize)]
struct ReplayLog {
    samples: Vec<CombinedSample>,
}

fn load_log(path: &Path) -> Result<ReplayLog, DeviceError> {
    let file = File::open(path)
        .map_err(|e| DeviceError::OpenFailed(format!("{}: {}", path.display(), e)))?;
    let parsed = if path.extension().map(|e| e == "gz").unwrap_or(false) {
        serde_json::from_reader(BufReader::new(GzDecoder::new(file)))
    } else {
        serde_json::from_reader(BufReader::new(file))
    };
    parsed.map_err(|e| DeviceError::OpenFailed(format!("{}: {}", path.display(), e)))
}

/// Plays back recorded combined samples in order, one per poll.
pub struct ReplayDevice {
    info: DeviceInfo,
    samples: Vec<CombinedSample>,
    cursor: Mutex<usize>,
    frames: Mutex<FrameClock>,
}

impl ReplayDevice {
    pub fn open(path: &Path, config: &DeviceConfig) -> Result<Self, DeviceError> {
        let log = load_log(path)?;
        log::info!("[DEVICE] Loaded {} samples from {}", log.samples.len(), path.display());
        Ok(Self::from_samples(log.samples, config))
    }

    pub fn from_samples(samples: Vec<CombinedSample>, config: &DeviceConfig) -> Self {
        Self {
            info: DeviceInfo {
                model: config.model,
                serial_number: 0,
                camera_firmware: 0,
                sensors_firmware: 0,
                sensors: sensor_parameters_for(config.model),
            },
            samples,
            cursor: Mutex::new(0),
            frames: Mutex::new(FrameClock::new(config)),
        }
    }

    pub fn remaining(&self) -> usize {
        let cursor = self.cursor.lock().map(|c| *c).unwrap_or(self.samples.len());
        self.samples.len().saturating_sub(cursor)
    }
}

impl CameraDevice for ReplayDevice {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn poll_sensors(&self) -> Result<CombinedSample, DeviceError> {
        let mut cursor = self
            .cursor
            .lock()
            .map_err(|_| DeviceError::SensorsUnavailable("replay cursor lock poisoned".to_string()))?;
        let sample = self
            .samples
            .get(*cursor)
            .cloned()
            .ok_or(DeviceError::ReplayExhausted(self.samples.len()))?;
        *cursor += 1;
        Ok(sample)
    }

    fn grab_frame(&self) -> Result<RawFrame, DeviceError> {
        let mut clock = self
            .frames
            .lock()
            .map_err(|_| DeviceError::GrabFailed("frame clock lock poisoned".to_string()))?;
        Ok(clock.grab())
    }
}
