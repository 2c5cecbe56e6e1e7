//! HTTP query surface: signal endpoints, the MJPEG feed and the viewer page.

use axum::{
    body::Body,
    extract::State,
    http::header,
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

use crate::error::{BridgeError, BridgeResult};
use crate::snapshot::SnapshotReader;
use crate::types::{Quaternion, Vector3};
use crate::video::{VideoStreamProducer, MULTIPART_CONTENT_TYPE};

pub const DEFAULT_QUERY_ADDR: &str = "0.0.0.0:5000";

#[derive(Clone)]
pub struct QueryState {
    pub snapshot: SnapshotReader,
    pub video: VideoStreamProducer,
    pub cancel: CancellationToken,
}

#[derive(Debug, Serialize, PartialEq)]
struct QuaternionReading {
    x: Option<f64>,
    y: Option<f64>,
    z: Option<f64>,
    w: Option<f64>,
}

impl From<Option<Quaternion>> for QuaternionReading {
    fn from(q: Option<Quaternion>) -> Self {
        Self {
            x: q.map(|q| q.x),
            y: q.map(|q| q.y),
            z: q.map(|q| q.z),
            w: q.map(|q| q.w),
        }
    }
}

#[derive(Debug, Serialize, PartialEq)]
struct AxesReading {
    x: Option<f64>,
    y: Option<f64>,
    z: Option<f64>,
}

impl From<Option<Vector3>> for AxesReading {
    fn from(v: Option<Vector3>) -> Self {
        Self { x: v.map(|v| v.x), y: v.map(|v| v.y), z: v.map(|v| v.z) }
    }
}

#[derive(Debug, Serialize, PartialEq)]
struct ScalarReading {
    value: Option<f64>,
}

pub fn query_router(state: QueryState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/video_feed", get(video_feed))
        .route("/orientation", get(orientation))
        // Historical spelling kept for existing clients
        .route("/accelaration", get(linear_acceleration))
        .route("/acceleration", get(linear_acceleration))
        .route("/angular_velocity", get(angular_velocity))
        .route("/magnetic_field", get(magnetic_field))
        .route("/atmospheric_pressure", get(atmospheric_pressure))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn index_handler() -> Html<&'static str> {
    Html(include_str!("viewer.html"))
}

async fn video_feed(State(state): State<QueryState>) -> impl IntoResponse {
    log::debug!("[HTTP] Viewer attached to /video_feed");
    let stream = state.video.clone().stream(state.cancel.child_token());
    (
        [
            (header::CONTENT_TYPE, MULTIPART_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(stream),
    )
}

async fn orientation(State(state): State<QueryState>) -> Json<QuaternionReading> {
    Json(state.snapshot.orientation().into())
}

async fn linear_acceleration(State(state): State<QueryState>) -> Json<AxesReading> {
    Json(state.snapshot.linear_acceleration().into())
}

async fn angular_velocity(State(state): State<QueryState>) -> Json<AxesReading> {
    Json(state.snapshot.angular_velocity().into())
}

async fn magnetic_field(State(state): State<QueryState>) -> Json<AxesReading> {
    Json(state.snapshot.magnetic_field().into())
}

async fn atmospheric_pressure(State(state): State<QueryState>) -> Json<ScalarReading> {
    Json(ScalarReading { value: state.snapshot.atmospheric_pressure() })
}

/// Running query server.
pub struct QueryServer {
    local_addr: SocketAddr,
    task: JoinHandle<()>,
}

impl QueryServer {
    pub async fn start(addr: SocketAddr, state: QueryState) -> BridgeResult<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| BridgeError::Bind { what: "query surface", addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| BridgeError::Bind { what: "query surface", addr, source })?;

        log::info!("[HTTP] Serving on http://{}", local_addr);

        let cancel = state.cancel.clone();
        let app = query_router(state);
        let task = tokio::spawn(async move {
            let shutdown = async move { cancel.cancelled().await };
            if let Err(e) = axum::serve(listener, app).with_graceful_shutdown(shutdown).await {
                log::error!("[HTTP] Server error: {}", e);
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
