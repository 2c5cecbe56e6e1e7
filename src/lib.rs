// Camera sensor bridge
// Fans a stereo camera's IMU, magnetometer and barometer readings out to an
// HTTP query surface and a Prometheus gauge endpoint, next to an MJPEG feed.

pub mod acquisition;
pub mod bridge;
pub mod config;
pub mod dedup;
pub mod device;
pub mod error;
pub mod metrics;
pub mod query;
pub mod snapshot;
pub mod types;
pub mod video;

pub use acquisition::{AcquisitionLoop, AcquisitionStats, FreshnessPolicy};
pub use bridge::Bridge;
pub use config::{BridgeArgs, BridgeConfig};
pub use dedup::TimestampDeduplicator;
pub use error::{BridgeError, BridgeResult, DeviceError};
pub use metrics::{MetricsExporter, MetricsSink};
pub use snapshot::{snapshot_channel, SensorSnapshot, SnapshotReader, SnapshotWriter};
pub use types::{CombinedSample, Quaternion, SensorKind, Timestamp, Vector3};
