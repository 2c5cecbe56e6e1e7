//! Sample types shared by the device back ends, the acquisition loop and
//! the HTTP surfaces.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The three physical sensor clocks a combined sample can carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    Imu,
    Magnetometer,
    Barometer,
}

impl SensorKind {
    pub const ALL: [SensorKind; 3] = [SensorKind::Imu, SensorKind::Magnetometer, SensorKind::Barometer];

    pub(crate) fn index(self) -> usize {
        match self {
            SensorKind::Imu => 0,
            SensorKind::Magnetometer => 1,
            SensorKind::Barometer => 2,
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorKind::Imu => f.write_str("imu"),
            SensorKind::Magnetometer => f.write_str("magnetometer"),
            SensorKind::Barometer => f.write_str("barometer"),
        }
    }
}

/// Device timestamp in microseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub fn from_micros(micros: u64) -> Self {
        Timestamp(micros)
    }

    pub fn as_micros(self) -> u64 {
        self.0
    }
}

/// Orientation quaternion, passed through as the device reports it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Quaternion {
    pub fn new(x: f64, y: f64, z: f64, w: f64) -> Self {
        Self { x, y, z, w }
    }

    pub fn identity() -> Self {
        Self::new(0.0, 0.0, 0.0, 1.0)
    }
}

/// Three-axis reading in device-native units.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImuData {
    pub timestamp: Timestamp,
    pub orientation: Quaternion,
    pub linear_acceleration: Vector3,
    pub angular_velocity: Vector3,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MagnetometerData {
    pub timestamp: Timestamp,
    /// Calibrated field, microtesla
    pub magnetic_field: Vector3,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BarometerData {
    pub timestamp: Timestamp,
    /// hPa
    pub pressure: f64,
}

/// One device poll. Models without a magnetometer or barometer leave those
/// parts empty.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CombinedSample {
    pub imu: ImuData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub magnetometer: Option<MagnetometerData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub barometer: Option<BarometerData>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Gray8,
    Rgb8,
    /// ZED SDK native layout for `retrieve_image`
    Bgra8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Gray8 => 1,
            PixelFormat::Rgb8 => 3,
            PixelFormat::Bgra8 => 4,
        }
    }
}

/// Uncompressed frame as grabbed from the left sensor.
#[derive(Clone, Debug)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub data: Vec<u8>,
}

impl RawFrame {
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_ordering() {
        assert!(Timestamp(10) > Timestamp(9));
        assert_eq!(Timestamp::from_micros(42).as_micros(), 42);
    }

    #[test]
    fn test_combined_sample_without_optional_parts() {
        let json = r#"{
            "imu": {
                "timestamp": 1000,
                "orientation": {"x": 0.0, "y": 0.0, "z": 0.0, "w": 1.0},
                "linear_acceleration": {"x": 0.0, "y": 0.0, "z": 9.8},
                "angular_velocity": {"x": 0.0, "y": 0.0, "z": 0.0}
            }
        }"#;
        let sample: CombinedSample = serde_json::from_str(json).unwrap();
        assert_eq!(sample.imu.timestamp, Timestamp(1000));
        assert_eq!(sample.imu.orientation, Quaternion::identity());
        assert!(sample.magnetometer.is_none());
        assert!(sample.barometer.is_none());
    }

    #[test]
    fn test_frame_expected_len() {
        let frame = RawFrame { width: 4, height: 2, format: PixelFormat::Bgra8, data: vec![] };
        assert_eq!(frame.expected_len(), 32);
    }
}
