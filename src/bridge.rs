// bridge.rs: wires the device, acquisition thread, metrics endpoint and
// query surface together and owns their shared shutdown token.

use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::acquisition::{AcquisitionLoop, AcquisitionStats};
use crate::config::BridgeConfig;
use crate::device;
use crate::error::{BridgeError, BridgeResult};
use crate::metrics::{MetricsExporter, MetricsSink};
use crate::query::{QueryServer, QueryState};
use crate::snapshot::{snapshot_channel, SnapshotReader};
use crate::video::{JpegFrameEncoder, VideoStreamProducer};

pub struct Bridge {
    cancel: CancellationToken,
    acquisition: JoinHandle<AcquisitionStats>,
    metrics: MetricsExporter,
    query: QueryServer,
    snapshot: SnapshotReader,
    sink: Arc<MetricsSink>,
}

impl Bridge {
    /// Open the device and bring every component up. Any failure here is
    /// fatal for the process; components already started are cancelled.
    pub async fn start(config: &BridgeConfig) -> BridgeResult<Self> {
        let device = device::open(&config.device)?;
        device.info().log();

        let cancel = CancellationToken::new();
        let sink = Arc::new(MetricsSink::new());
        let metrics = MetricsExporter::start(config.metrics_addr, sink.clone(), cancel.clone()).await?;

        let (writer, snapshot) = snapshot_channel();
        let video = VideoStreamProducer::new(
            device.clone(),
            Arc::new(JpegFrameEncoder::new(config.jpeg_quality)),
        );
        let state = QueryState { snapshot: snapshot.clone(), video, cancel: cancel.clone() };
        let query = match QueryServer::start(config.query_addr, state).await {
            Ok(query) => query,
            Err(e) => {
                cancel.cancel();
                return Err(e);
            }
        };

        let acquisition = AcquisitionLoop::new(device, writer, sink.clone(), config.freshness)
            .spawn(cancel.clone())
            .map_err(|e| {
                cancel.cancel();
                BridgeError::Spawn(e)
            })?;

        Ok(Self { cancel, acquisition, metrics, query, snapshot, sink })
    }

    pub fn query_addr(&self) -> SocketAddr {
        self.query.local_addr()
    }

    pub fn metrics_addr(&self) -> SocketAddr {
        self.metrics.local_addr()
    }

    pub fn snapshot(&self) -> SnapshotReader {
        self.snapshot.clone()
    }

    pub fn metrics(&self) -> Arc<MetricsSink> {
        self.sink.clone()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop everything and wait for the acquisition thread.
    pub async fn shutdown(self) -> AcquisitionStats {
        self.cancel.cancel();
        self.query.join().await;
        self.metrics.join().await;

        let acquisition = self.acquisition;
        match tokio::task::spawn_blocking(move || acquisition.join()).await {
            Ok(Ok(stats)) => stats,
            _ => {
                log::error!("[ACQ] Acquisition thread panicked");
                AcquisitionStats::default()
            }
        }
    }
}
