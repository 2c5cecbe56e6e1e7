//! Latest-known sensor state.
//!
//! One writer (the acquisition loop) and any number of readers. The whole
//! record sits behind a single `RwLock`, so every group a reader copies out
//! comes from one accepted reading; the IMU groups are published together.

use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock};

use crate::types::{Quaternion, Vector3};

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct SensorSnapshot {
    pub orientation: Option<Quaternion>,
    pub linear_acceleration: Option<Vector3>,
    pub angular_velocity: Option<Vector3>,
    pub magnetic_field: Option<Vector3>,
    pub atmospheric_pressure: Option<f64>,
}

/// Create an empty snapshot and split it into its write and read halves.
pub fn snapshot_channel() -> (SnapshotWriter, SnapshotReader) {
    let inner = Arc::new(RwLock::new(SensorSnapshot::default()));
    (
        SnapshotWriter { inner: inner.clone() },
        SnapshotReader { inner },
    )
}

/// Exclusive write handle. Not `Clone`.
#[derive(Debug)]
pub struct SnapshotWriter {
    inner: Arc<RwLock<SensorSnapshot>>,
}

impl SnapshotWriter {
    pub fn publish_imu(&mut self, orientation: Quaternion, linear_acceleration: Vector3, angular_velocity: Vector3) {
        let mut state = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        state.orientation = Some(orientation);
        state.linear_acceleration = Some(linear_acceleration);
        state.angular_velocity = Some(angular_velocity);
    }

    pub fn publish_magnetic_field(&mut self, field: Vector3) {
        let mut state = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        state.magnetic_field = Some(field);
    }

    pub fn publish_atmospheric_pressure(&mut self, pressure: f64) {
        let mut state = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        state.atmospheric_pressure = Some(pressure);
    }

    pub fn reader(&self) -> SnapshotReader {
        SnapshotReader { inner: self.inner.clone() }
    }
}

/// Cloneable read-only view.
#[derive(Clone, Debug)]
pub struct SnapshotReader {
    inner: Arc<RwLock<SensorSnapshot>>,
}

impl SnapshotReader {
    pub fn current(&self) -> SensorSnapshot {
        *self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn orientation(&self) -> Option<Quaternion> {
        self.current().orientation
    }

    pub fn linear_acceleration(&self) -> Option<Vector3> {
        self.current().linear_acceleration
    }

    pub fn angular_velocity(&self) -> Option<Vector3> {
        self.current().angular_velocity
    }

    pub fn magnetic_field(&self) -> Option<Vector3> {
        self.current().magnetic_field
    }

    pub fn atmospheric_pressure(&self) -> Option<f64> {
        self.current().atmospheric_pressure
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_starts_empty() {
        let (_writer, reader) = snapshot_channel();
        assert_eq!(reader.current(), SensorSnapshot::default());
        assert!(reader.orientation().is_none());
        assert!(reader.atmospheric_pressure().is_none());
    }

    #[test]
    fn test_groups_update_independently() {
        let (mut writer, reader) = snapshot_channel();
        writer.publish_atmospheric_pressure(1013.25);
        let snap = reader.current();
        assert_eq!(snap.atmospheric_pressure, Some(1013.25));
        assert!(snap.orientation.is_none());
        assert!(snap.magnetic_field.is_none());

        writer.publish_magnetic_field(Vector3::new(1.0, -2.0, 3.0));
        assert_eq!(reader.magnetic_field(), Some(Vector3::new(1.0, -2.0, 3.0)));
        assert_eq!(reader.atmospheric_pressure(), Some(1013.25));
    }

    #[test]
    fn test_reader_from_writer_sees_writes() {
        let (mut writer, _) = snapshot_channel();
        let reader = writer.reader();
        writer.publish_imu(Quaternion::identity(), Vector3::new(0.0, 0.0, 9.8), Vector3::new(0.0, 0.0, 0.0));
        assert_eq!(reader.orientation(), Some(Quaternion::identity()));
        assert_eq!(reader.linear_acceleration(), Some(Vector3::new(0.0, 0.0, 9.8)));
        assert_eq!(reader.angular_velocity(), Some(Vector3::new(0.0, 0.0, 0.0)));
    }

    #[test]
    fn test_concurrent_reads_never_torn() {
        let (mut writer, reader) = snapshot_channel();

        let writer_thread = thread::spawn(move || {
            for i in 0..20_000u32 {
                let v = i as f64;
                writer.publish_imu(
                    Quaternion::new(v, v, v, v),
                    Vector3::new(v, v, v),
                    Vector3::new(-v, -v, -v),
                );
            }
        });

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let reader = reader.clone();
                thread::spawn(move || {
                    for _ in 0..20_000 {
                        let snap = reader.current();
                        if let Some(q) = snap.orientation {
                            assert!(q.x == q.y && q.y == q.z && q.z == q.w, "torn quaternion {:?}", q);
                            // IMU groups are published together
                            let a = snap.linear_acceleration.unwrap();
                            let g = snap.angular_velocity.unwrap();
                            assert_eq!(a.x, q.x);
                            assert_eq!(g.z, -q.x);
                        }
                    }
                })
            })
            .collect();

        writer_thread.join().unwrap();
        for r in readers {
            r.join().unwrap();
        }
    }
}
