//! Sensor acquisition loop.
//!
//! The only writer of the snapshot. Polls the device as fast as the call
//! returns, because the IMU, magnetometer and barometer tick at unrelated
//! rates and a slower sensor must never hold back the IMU. Freshness is
//! decided per kind by the timestamp deduplicator; accepted readings go to
//! the snapshot and the metrics sink in the same iteration.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::dedup::TimestampDeduplicator;
use crate::device::CameraDevice;
use crate::metrics::MetricsSink;
use crate::snapshot::SnapshotWriter;
use crate::types::{CombinedSample, SensorKind};

/// When the magnetometer and barometer are checked for new readings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum FreshnessPolicy {
    /// Every iteration, regardless of the IMU.
    #[default]
    Independent,
    /// Only when the same poll carried a new IMU reading. Assumes the IMU
    /// always ticks at least as often as the other two sensors.
    ImuGated,
}

/// Which kinds a single iteration accepted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// The device call failed; nothing changed.
    Skipped,
    Polled { imu: bool, magnetometer: bool, barometer: bool },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AcquisitionStats {
    pub polls: u64,
    pub failed_polls: u64,
    pub imu_accepted: u64,
    pub magnetometer_accepted: u64,
    pub barometer_accepted: u64,
}

pub struct AcquisitionLoop {
    device: Arc<dyn CameraDevice>,
    snapshot: SnapshotWriter,
    metrics: Arc<MetricsSink>,
    dedup: TimestampDeduplicator,
    policy: FreshnessPolicy,
    stats: AcquisitionStats,
}

impl AcquisitionLoop {
    pub fn new(
        device: Arc<dyn CameraDevice>,
        snapshot: SnapshotWriter,
        metrics: Arc<MetricsSink>,
        policy: FreshnessPolicy,
    ) -> Self {
        Self {
            device,
            snapshot,
            metrics,
            dedup: TimestampDeduplicator::new(),
            policy,
            stats: AcquisitionStats::default(),
        }
    }

    pub fn stats(&self) -> AcquisitionStats {
        self.stats
    }

    /// One poll of the device.
    pub fn step(&mut self) -> StepOutcome {
        self.stats.polls += 1;
        match self.device.poll_sensors() {
            Ok(sample) => self.apply(&sample),
            Err(e) => {
                self.stats.failed_polls += 1;
                log::trace!("[ACQ] poll skipped: {}", e);
                StepOutcome::Skipped
            }
        }
    }

    /// Fan one combined sample out to the snapshot and the metrics sink.
    pub fn apply(&mut self, sample: &CombinedSample) -> StepOutcome {
        let imu = &sample.imu;
        let imu_new = self.dedup.is_new(SensorKind::Imu, imu.timestamp);
        if imu_new {
            self.snapshot
                .publish_imu(imu.orientation, imu.linear_acceleration, imu.angular_velocity);
            self.metrics.update_quaternion(&imu.orientation);
            self.metrics.update_linear_acceleration(&imu.linear_acceleration);
            self.metrics.update_angular_velocity(&imu.angular_velocity);
            self.stats.imu_accepted += 1;
        }

        if self.policy == FreshnessPolicy::ImuGated && !imu_new {
            return StepOutcome::Polled { imu: false, magnetometer: false, barometer: false };
        }

        let mut magnetometer = false;
        if let Some(mag) = &sample.magnetometer {
            if self.dedup.is_new(SensorKind::Magnetometer, mag.timestamp) {
                self.snapshot.publish_magnetic_field(mag.magnetic_field);
                self.metrics.update_magnetic_field(&mag.magnetic_field);
                self.stats.magnetometer_accepted += 1;
                magnetometer = true;
            }
        }

        let mut barometer = false;
        if let Some(baro) = &sample.barometer {
            if self.dedup.is_new(SensorKind::Barometer, baro.timestamp) {
                self.snapshot.publish_atmospheric_pressure(baro.pressure);
                self.metrics.update_atmospheric_pressure(baro.pressure);
                self.stats.barometer_accepted += 1;
                barometer = true;
            }
        }

        StepOutcome::Polled { imu: imu_new, magnetometer, barometer }
    }

    /// Poll until `cancel` fires. Never sleeps.
    pub fn run(mut self, cancel: CancellationToken) -> AcquisitionStats {
        log::info!("[ACQ] Acquisition loop started ({:?} freshness)", self.policy);
        while !cancel.is_cancelled() {
            self.step();
        }
        log::debug!(
            "[ACQ] Stopped after {} polls ({} failed): imu={} mag={} baro={}",
            self.stats.polls,
            self.stats.failed_polls,
            self.stats.imu_accepted,
            self.stats.magnetometer_accepted,
            self.stats.barometer_accepted
        );
        self.stats
    }

    /// Run on a dedicated OS thread so the loop never competes with the
    /// async runtime for a worker.
    pub fn spawn(self, cancel: CancellationToken) -> io::Result<JoinHandle<AcquisitionStats>> {
        thread::Builder::new()
            .name("acquisition".to_string())
            .spawn(move || self.run(cancel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceConfig, DeviceInfo, DeviceModel, ReplayDevice};
    use crate::error::DeviceError;
    use crate::snapshot::{snapshot_channel, SnapshotReader};
    use crate::types::{
        BarometerData, ImuData, MagnetometerData, Quaternion, RawFrame, Timestamp, Vector3,
    };
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    struct ScriptedDevice {
        info: DeviceInfo,
        polls: Mutex<VecDeque<Result<CombinedSample, DeviceError>>>,
    }

    impl ScriptedDevice {
        fn new(script: Vec<Result<CombinedSample, DeviceError>>) -> Arc<Self> {
            Arc::new(Self {
                info: DeviceInfo {
                    model: DeviceModel::Zed2,
                    serial_number: 1,
                    camera_firmware: 1,
                    sensors_firmware: 1,
                    sensors: Vec::new(),
                },
                polls: Mutex::new(script.into()),
            })
        }
    }

    impl CameraDevice for ScriptedDevice {
        fn info(&self) -> &DeviceInfo {
            &self.info
        }

        fn poll_sensors(&self) -> Result<CombinedSample, DeviceError> {
            self.polls
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(DeviceError::SensorsUnavailable("script done".into())))
        }

        fn grab_frame(&self) -> Result<RawFrame, DeviceError> {
            Err(DeviceError::GrabFailed("no video".into()))
        }
    }

    fn imu(ts: u64, q: Quaternion, a: Vector3, g: Vector3) -> ImuData {
        ImuData { timestamp: Timestamp(ts), orientation: q, linear_acceleration: a, angular_velocity: g }
    }

    fn resting(ts: u64) -> CombinedSample {
        CombinedSample {
            imu: imu(ts, Quaternion::identity(), Vector3::new(0.0, 0.0, 9.8), Vector3::new(0.0, 0.0, 0.0)),
            magnetometer: None,
            barometer: None,
        }
    }

    fn full(imu_ts: u64, mag_ts: u64, field: Vector3, baro_ts: u64, pressure: f64) -> CombinedSample {
        CombinedSample {
            imu: imu(
                imu_ts,
                Quaternion::new(0.1, 0.2, 0.3, 0.9),
                Vector3::new(imu_ts as f64, 0.0, 9.8),
                Vector3::new(0.01, 0.02, 0.03),
            ),
            magnetometer: Some(MagnetometerData { timestamp: Timestamp(mag_ts), magnetic_field: field }),
            barometer: Some(BarometerData { timestamp: Timestamp(baro_ts), pressure }),
        }
    }

    fn build(policy: FreshnessPolicy) -> (AcquisitionLoop, SnapshotReader, Arc<MetricsSink>) {
        let (writer, reader) = snapshot_channel();
        let metrics = Arc::new(MetricsSink::new());
        let device = ScriptedDevice::new(Vec::new());
        (AcquisitionLoop::new(device, writer, metrics.clone(), policy), reader, metrics)
    }

    #[test]
    fn test_duplicate_imu_is_idempotent() {
        let (mut acq, reader, metrics) = build(FreshnessPolicy::Independent);

        acq.apply(&resting(1_000));
        let after_first = reader.current();
        let gauges_first = metrics.render();

        let outcome = acq.apply(&resting(1_000));
        assert_eq!(outcome, StepOutcome::Polled { imu: false, magnetometer: false, barometer: false });
        assert_eq!(reader.current(), after_first);
        assert_eq!(metrics.render(), gauges_first);
        assert_eq!(after_first.orientation, Some(Quaternion::identity()));
        assert_eq!(after_first.linear_acceleration, Some(Vector3::new(0.0, 0.0, 9.8)));
        assert_eq!(after_first.angular_velocity, Some(Vector3::new(0.0, 0.0, 0.0)));
    }

    #[test]
    fn test_older_readings_never_roll_back() {
        let (mut acq, reader, metrics) = build(FreshnessPolicy::Independent);
        let newer_field = Vector3::new(30.0, -2.0, -45.0);

        acq.apply(&full(500, 300, newer_field, 300, 1010.0));
        let latest = reader.current();
        let gauges_latest = metrics.render();

        let outcome = acq.apply(&full(400, 200, Vector3::new(1.0, 1.0, 1.0), 200, 990.0));
        assert_eq!(outcome, StepOutcome::Polled { imu: false, magnetometer: false, barometer: false });
        assert_eq!(reader.current(), latest);
        assert_eq!(metrics.render(), gauges_latest);
        assert_eq!(reader.magnetic_field(), Some(newer_field));
        assert_eq!(metrics.value("linear_acceleration_x"), Some(500.0));
        assert_eq!(metrics.value("atmospheric_pressure"), Some(1010.0));

        // Only the magnetometer goes backwards while the IMU moves on
        let outcome = acq.apply(&full(600, 250, Vector3::new(2.0, 2.0, 2.0), 300, 990.0));
        assert_eq!(outcome, StepOutcome::Polled { imu: true, magnetometer: false, barometer: false });
        assert_eq!(reader.magnetic_field(), Some(newer_field));
        assert_eq!(metrics.value("magnetic_field_x"), Some(30.0));
        assert_eq!(reader.linear_acceleration(), Some(Vector3::new(600.0, 0.0, 9.8)));
    }

    #[test]
    fn test_stale_magnetometer_keeps_field_while_imu_updates() {
        let (mut acq, reader, metrics) = build(FreshnessPolicy::ImuGated);
        let first_field = Vector3::new(20.0, -5.0, -40.0);

        acq.apply(&full(100, 50, first_field, 50, 1013.0));
        let outcome = acq.apply(&full(200, 50, Vector3::new(99.0, 99.0, 99.0), 60, 1012.5));

        assert_eq!(outcome, StepOutcome::Polled { imu: true, magnetometer: false, barometer: true });
        let snap = reader.current();
        assert_eq!(snap.magnetic_field, Some(first_field));
        assert_eq!(snap.linear_acceleration, Some(Vector3::new(200.0, 0.0, 9.8)));
        assert_eq!(snap.atmospheric_pressure, Some(1012.5));
        assert_eq!(metrics.value("magnetic_field_x"), Some(20.0));
        assert_eq!(metrics.value("linear_acceleration_x"), Some(200.0));
    }

    #[test]
    fn test_imu_gated_ignores_mag_without_new_imu() {
        let (mut acq, reader, _) = build(FreshnessPolicy::ImuGated);
        acq.apply(&full(100, 10, Vector3::new(1.0, 1.0, 1.0), 10, 1000.0));
        // Same IMU tick but fresh magnetometer/barometer
        let outcome = acq.apply(&full(100, 20, Vector3::new(2.0, 2.0, 2.0), 20, 999.0));

        assert_eq!(outcome, StepOutcome::Polled { imu: false, magnetometer: false, barometer: false });
        assert_eq!(reader.magnetic_field(), Some(Vector3::new(1.0, 1.0, 1.0)));
        assert_eq!(reader.atmospheric_pressure(), Some(1000.0));
    }

    #[test]
    fn test_independent_accepts_mag_without_new_imu() {
        let (mut acq, reader, metrics) = build(FreshnessPolicy::Independent);
        acq.apply(&full(100, 10, Vector3::new(1.0, 1.0, 1.0), 10, 1000.0));
        let outcome = acq.apply(&full(100, 20, Vector3::new(2.0, 2.0, 2.0), 20, 999.0));

        assert_eq!(outcome, StepOutcome::Polled { imu: false, magnetometer: true, barometer: true });
        assert_eq!(reader.magnetic_field(), Some(Vector3::new(2.0, 2.0, 2.0)));
        assert_eq!(metrics.value("atmospheric_pressure"), Some(999.0));
    }

    #[test]
    fn test_device_error_skips_iteration() {
        let (writer, reader) = snapshot_channel();
        let device = ScriptedDevice::new(vec![
            Err(DeviceError::SensorsUnavailable("busy".into())),
            Ok(resting(5)),
            Err(DeviceError::SensorsUnavailable("busy".into())),
            Ok(resting(6)),
        ]);
        let mut acq = AcquisitionLoop::new(device, writer, Arc::new(MetricsSink::new()), FreshnessPolicy::Independent);

        assert_eq!(acq.step(), StepOutcome::Skipped);
        assert!(reader.orientation().is_none());
        assert!(matches!(acq.step(), StepOutcome::Polled { imu: true, .. }));
        assert_eq!(acq.step(), StepOutcome::Skipped);
        assert!(matches!(acq.step(), StepOutcome::Polled { imu: true, .. }));

        let stats = acq.stats();
        assert_eq!(stats.polls, 4);
        assert_eq!(stats.failed_polls, 2);
        assert_eq!(stats.imu_accepted, 2);
    }

    #[test]
    fn test_spawned_loop_stops_on_cancel() {
        let samples = (1..=50).map(|ts| full(ts * 10, ts, Vector3::new(ts as f64, 0.0, 0.0), ts, 1000.0)).collect();
        let device = Arc::new(ReplayDevice::from_samples(samples, &DeviceConfig::default()));
        let (writer, reader) = snapshot_channel();
        let metrics = Arc::new(MetricsSink::new());
        let cancel = CancellationToken::new();

        let handle = AcquisitionLoop::new(device.clone(), writer, metrics, FreshnessPolicy::Independent)
            .spawn(cancel.clone())
            .unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while device.remaining() > 0 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        cancel.cancel();
        let stats = handle.join().unwrap();

        assert_eq!(stats.imu_accepted, 50);
        assert_eq!(stats.magnetometer_accepted, 50);
        assert!(stats.polls >= 50);
        assert_eq!(reader.magnetic_field(), Some(Vector3::new(50.0, 0.0, 0.0)));
    }
}
