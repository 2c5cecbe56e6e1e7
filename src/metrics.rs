//! Gauge registry and its pull-based exposition endpoint.

use axum::{extract::State, http::header, response::IntoResponse, routing::get, Router};
use crossbeam::atomic::AtomicCell;
use std::fmt::Write as _;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{BridgeError, BridgeResult};
use crate::types::{Quaternion, Vector3};

pub const DEFAULT_METRICS_PORT: u16 = 9090;

const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Gauge names in exposition order.
pub const GAUGE_NAMES: [&str; 14] = [
    "quaternion_x",
    "quaternion_y",
    "quaternion_z",
    "quaternion_w",
    "linear_acceleration_x",
    "linear_acceleration_y",
    "linear_acceleration_z",
    "angular_velocity_x",
    "angular_velocity_y",
    "angular_velocity_z",
    "magnetic_field_x",
    "magnetic_field_y",
    "magnetic_field_z",
    "atmospheric_pressure",
];

/// Fourteen last-write-wins gauges, one per scalar signal component.
///
/// Each signal group lives in a single cell, so a scrape never mixes the
/// components of two different readings.
pub struct MetricsSink {
    quaternion: AtomicCell<[f64; 4]>,
    linear_acceleration: AtomicCell<[f64; 3]>,
    angular_velocity: AtomicCell<[f64; 3]>,
    magnetic_field: AtomicCell<[f64; 3]>,
    atmospheric_pressure: AtomicCell<f64>,
}

impl MetricsSink {
    pub fn new() -> Self {
        Self {
            quaternion: AtomicCell::new([0.0; 4]),
            linear_acceleration: AtomicCell::new([0.0; 3]),
            angular_velocity: AtomicCell::new([0.0; 3]),
            magnetic_field: AtomicCell::new([0.0; 3]),
            atmospheric_pressure: AtomicCell::new(0.0),
        }
    }

    pub fn update_quaternion(&self, q: &Quaternion) {
        self.quaternion.store([q.x, q.y, q.z, q.w]);
    }

    pub fn update_linear_acceleration(&self, a: &Vector3) {
        self.linear_acceleration.store([a.x, a.y, a.z]);
    }

    pub fn update_angular_velocity(&self, w: &Vector3) {
        self.angular_velocity.store([w.x, w.y, w.z]);
    }

    pub fn update_magnetic_field(&self, m: &Vector3) {
        self.magnetic_field.store([m.x, m.y, m.z]);
    }

    pub fn update_atmospheric_pressure(&self, pressure: f64) {
        self.atmospheric_pressure.store(pressure);
    }

    /// Every gauge value in `GAUGE_NAMES` order, one load per group.
    fn values(&self) -> [f64; 14] {
        let [qx, qy, qz, qw] = self.quaternion.load();
        let [ax, ay, az] = self.linear_acceleration.load();
        let [wx, wy, wz] = self.angular_velocity.load();
        let [mx, my, mz] = self.magnetic_field.load();
        let pressure = self.atmospheric_pressure.load();
        [qx, qy, qz, qw, ax, ay, az, wx, wy, wz, mx, my, mz, pressure]
    }

    pub fn value(&self, name: &str) -> Option<f64> {
        let index = GAUGE_NAMES.iter().position(|g| *g == name)?;
        Some(self.values()[index])
    }

    /// Render every gauge in the Prometheus text format.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(GAUGE_NAMES.len() * 96);
        for (name, value) in GAUGE_NAMES.iter().zip(self.values()) {
            let _ = writeln!(out, "# HELP {} {}", name, name);
            let _ = writeln!(out, "# TYPE {} gauge", name);
            let _ = writeln!(out, "{} {}", name, format_value(value));
        }
        out
    }
}

impl Default for MetricsSink {
    fn default() -> Self {
        Self::new()
    }
}

fn format_value(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v == f64::INFINITY {
        "+Inf".to_string()
    } else if v == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        format!("{}", v)
    }
}

pub fn metrics_router(sink: Arc<MetricsSink>) -> Router {
    Router::new()
        .route("/", get(metrics_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(sink)
}

async fn metrics_handler(State(sink): State<Arc<MetricsSink>>) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, EXPOSITION_CONTENT_TYPE)], sink.render())
}

/// Running exposition server. The listener is bound before `start` returns.
pub struct MetricsExporter {
    local_addr: SocketAddr,
    task: JoinHandle<()>,
}

impl MetricsExporter {
    pub async fn start(addr: SocketAddr, sink: Arc<MetricsSink>, cancel: CancellationToken) -> BridgeResult<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| BridgeError::Bind { what: "metrics endpoint", addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| BridgeError::Bind { what: "metrics endpoint", addr, source })?;

        log::info!("[METRICS] Exposition endpoint at http://{}/metrics", local_addr);

        let app = metrics_router(sink);
        let task = tokio::spawn(async move {
            let shutdown = async move { cancel.cancelled().await };
            if let Err(e) = axum::serve(listener, app).with_graceful_shutdown(shutdown).await {
                log::error!("[METRICS] Server error: {}", e);
            }
        });

        Ok(Self { local_addr, task })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub async fn join(self) {
        let _ = self.task.await;
    }
}
