use clap::Parser;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use crate::acquisition::FreshnessPolicy;
use crate::device::{DeviceConfig, DeviceMode, DeviceModel};
use crate::error::BridgeError;
use crate::metrics::DEFAULT_METRICS_PORT;
use crate::query::DEFAULT_QUERY_ADDR;
use crate::video::DEFAULT_JPEG_QUALITY;

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum DeviceKind {
    Simulated,
    Replay,
}

#[derive(Parser, Debug)]
#[command(name = "camera_bridge")]
#[command(about = "Stereo camera bridge - MJPEG video, sensor endpoints and Prometheus gauges", long_about = None)]
pub struct BridgeArgs {
    /// Device back end
    #[arg(long, value_enum, default_value = "simulated")]
    pub device: DeviceKind,

    /// Recorded samples for `--device replay` (.json or .json.gz)
    #[arg(long, value_name = "PATH", required_if_eq("device", "replay"))]
    pub replay: Option<PathBuf>,

    /// Camera model to report
    #[arg(long, value_enum, default_value = "zed2")]
    pub model: DeviceModel,

    /// Query surface address
    #[arg(long, default_value = DEFAULT_QUERY_ADDR)]
    pub bind: SocketAddr,

    /// Metrics exposition port
    #[arg(long, default_value_t = DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,

    /// JPEG quality (1-100)
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub jpeg_quality: u8,

    /// When magnetometer and barometer readings are checked
    #[arg(long, value_enum, default_value = "independent")]
    pub freshness: FreshnessPolicy,

    /// Video frame rate for both back ends
    #[arg(long, default_value_t = 30)]
    pub frame_rate: u32,
}

#[derive(Clone, Debug)]
pub struct BridgeConfig {
    pub device: DeviceConfig,
    pub query_addr: SocketAddr,
    pub metrics_addr: SocketAddr,
    pub jpeg_quality: u8,
    pub freshness: FreshnessPolicy,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            device: DeviceConfig::default(),
            query_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 5000)),
            metrics_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_METRICS_PORT)),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            freshness: FreshnessPolicy::default(),
        }
    }
}

impl TryFrom<BridgeArgs> for BridgeConfig {
    type Error = BridgeError;

    fn try_from(args: BridgeArgs) -> Result<Self, Self::Error> {
        let mode = match (args.device, args.replay) {
            (DeviceKind::Simulated, _) => DeviceMode::Simulated,
            (DeviceKind::Replay, Some(path)) => DeviceMode::Replay(path),
            (DeviceKind::Replay, None) => {
                return Err(BridgeError::InvalidConfig("--device replay needs --replay <PATH>".to_string()))
            }
        };
        if args.frame_rate == 0 {
            return Err(BridgeError::InvalidConfig("--frame-rate must be positive".to_string()));
        }

        Ok(Self {
            device: DeviceConfig {
                mode,
                model: args.model,
                frame_rate: args.frame_rate,
                ..DeviceConfig::default()
            },
            query_addr: args.bind,
            metrics_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, args.metrics_port)),
            jpeg_quality: args.jpeg_quality,
            freshness: args.freshness,
        })
    }
}
