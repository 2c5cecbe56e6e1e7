use chrono::Utc;
use std::f64::consts::PI;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::{sensor_parameters_for, CameraDevice, DeviceConfig, DeviceInfo, DeviceModel};
use crate::error::DeviceError;
use crate::types::{
    BarometerData, CombinedSample, ImuData, MagnetometerData, PixelFormat, Quaternion, RawFrame,
    Timestamp, Vector3,
};

const IMU_PERIOD_US: u64 = 2_500; // 400 Hz
const MAG_PERIOD_US: u64 = 20_000; // 50 Hz
const BARO_PERIOD_US: u64 = 40_000; // 25 Hz

/// Moving BGRA gradient used as the left image by the synthetic back ends.
#[derive(Debug)]
pub struct TestPattern {
    width: u32,
    height: u32,
    frame_index: u64,
}

impl TestPattern {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height, frame_index: 0 }
    }

    pub fn next_frame(&mut self) -> RawFrame {
        let shift = (self.frame_index % 256) as u32;
        let mut data = Vec::with_capacity(self.width as usize * self.height as usize * 4);
        for y in 0..self.height {
            for x in 0..self.width {
                let b = ((x + shift) % 256) as u8;
                let g = ((y + shift) % 256) as u8;
                let r = ((x + y) / 2 % 256) as u8;
                data.extend_from_slice(&[b, g, r, 255]);
            }
        }
        self.frame_index += 1;
        RawFrame { width: self.width, height: self.height, format: PixelFormat::Bgra8, data }
    }
}

/// Test pattern paced at the configured frame rate.
pub struct FrameClock {
    pattern: TestPattern,
    next_deadline: Instant,
    interval: Duration,
}

impl FrameClock {
    pub fn new(config: &DeviceConfig) -> Self {
        Self {
            pattern: TestPattern::new(config.frame_width, config.frame_height),
            next_deadline: Instant::now(),
            interval: Duration::from_secs_f64(1.0 / config.frame_rate.max(1) as f64),
        }
    }

    /// Blocks until the next frame period, like a real grab.
    pub fn grab(&mut self) -> RawFrame {
        let now = Instant::now();
        if self.next_deadline > now {
            std::thread::sleep(self.next_deadline - now);
        }
        self.next_deadline = Instant::now().max(self.next_deadline) + self.interval;
        self.pattern.next_frame()
    }
}

/// Synthetic camera whose sensors tick at the ZED2 rates.
///
/// Timestamps are quantised to each sensor's period, so polling faster than
/// a sensor runs returns its previous reading again.
pub struct SimulatedDevice {
    info: DeviceInfo,
    epoch_us: u64,
    started: Instant,
    frames: Mutex<FrameClock>,
}

impl SimulatedDevice {
    pub fn new(config: &DeviceConfig) -> Self {
        let epoch_us = u64::try_from(Utc::now().timestamp_micros()).unwrap_or_default();
        Self {
            info: DeviceInfo {
                model: config.model,
                serial_number: 30_000_001,
                camera_firmware: 1523,
                sensors_firmware: 777,
                sensors: sensor_parameters_for(config.model),
            },
            epoch_us,
            started: Instant::now(),
            frames: Mutex::new(FrameClock::new(config)),
        }
    }

    fn sample_at(&self, elapsed_us: u64) -> CombinedSample {
        let imu_us = quantize(elapsed_us, IMU_PERIOD_US);
        let t = imu_us as f64 / 1e6;

        let yaw = 0.3 * (0.5 * t).sin();
        let orientation = Quaternion::new(0.0, 0.0, (yaw / 2.0).sin(), (yaw / 2.0).cos());
        let linear_acceleration = Vector3::new(
            (t * 2.0 * PI * 0.5).sin() * 0.2,
            (t * 2.0 * PI * 0.5).cos() * 0.1,
            9.81 + (t * PI).sin() * 0.05,
        );
        let angular_velocity = Vector3::new(
            (t * 0.5).sin() * 0.05,
            (t * 0.3).cos() * 0.03,
            0.15 * (0.5 * t).cos(),
        );

        let imu = ImuData {
            timestamp: Timestamp(self.epoch_us + imu_us),
            orientation,
            linear_acceleration,
            angular_velocity,
        };

        if !self.info.model.has_environment_sensors() {
            return CombinedSample { imu, magnetometer: None, barometer: None };
        }

        let mag_us = quantize(elapsed_us, MAG_PERIOD_US);
        let mag_yaw = 0.3 * (0.5 * mag_us as f64 / 1e6).sin();
        let magnetometer = MagnetometerData {
            timestamp: Timestamp(self.epoch_us + mag_us),
            magnetic_field: Vector3::new(22.0 * mag_yaw.cos(), -22.0 * mag_yaw.sin(), -41.5),
        };

        let baro_us = quantize(elapsed_us, BARO_PERIOD_US);
        let barometer = BarometerData {
            timestamp: Timestamp(self.epoch_us + baro_us),
            pressure: 1013.25 + 0.05 * (0.1 * baro_us as f64 / 1e6).sin(),
        };

        CombinedSample { imu, magnetometer: Some(magnetometer), barometer: Some(barometer) }
    }

    pub fn model(&self) -> DeviceModel {
        self.info.model
    }
}

fn quantize(elapsed_us: u64, period_us: u64) -> u64 {
    elapsed_us - elapsed_us % period_us
}

impl CameraDevice for SimulatedDevice {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn poll_sensors(&self) -> Result<CombinedSample, DeviceError> {
        let elapsed_us = u64::try_from(self.started.elapsed().as_micros()).unwrap_or(u64::MAX);
        Ok(self.sample_at(elapsed_us))
    }

    fn grab_frame(&self) -> Result<RawFrame, DeviceError> {
        let mut clock = self
            .frames
            .lock()
            .map_err(|_| DeviceError::GrabFailed("frame clock lock poisoned".to_string()))?;
        Ok(clock.grab())
    }
}
