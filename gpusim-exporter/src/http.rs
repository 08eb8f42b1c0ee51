//! HTTP listener - network front end for the exporter
//!
//! Thin axum router over the shared store and formatter:
//! - GET /metrics : exposition text of the current snapshot
//! - GET /health  : liveness payload (independent of snapshot age)
//!
//! All data logic lives in the store/formatter; this module only owns
//! the transport. A bind failure is fatal to this listener alone.

use crate::devices::GpuRegistry;
use crate::exposition::{self, CONTENT_TYPE};
use crate::health::{ExporterHealth, HealthTracker, ListenerState};
use crate::snapshot::MetricsStore;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::{self, JoinHandle};
use tracing::{error, info};

#[derive(Clone)]
pub struct AppState {
    pub store: MetricsStore,
    pub registry: Arc<GpuRegistry>,
    pub health_tracker: HealthTracker,
    pub hostname: String,
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(get_metrics))
        .route("/health", get(get_health))
        .with_state(app_state)
}

// GET /metrics (exposition text)
async fn get_metrics(State(app): State<AppState>) -> impl IntoResponse {
    let snapshot = app.store.current();
    let body = exposition::render(&snapshot, &app.registry, &app.hostname);
    ([(header::CONTENT_TYPE, CONTENT_TYPE)], body)
}

// GET /health (liveness, no dependency on snapshot freshness)
async fn get_health(State(app): State<AppState>) -> (StatusCode, Json<ExporterHealth>) {
    let health = app.health_tracker.get_health(&app.registry, &app.store);
    (StatusCode::OK, Json(health))
}

/// Spawn the HTTP listener task. Bind failure marks this listener failed
/// and returns; the rest of the process keeps running.
pub fn spawn_http_listener(app_state: AppState, port: u16) -> JoinHandle<()> {
    task::spawn(async move {
        let tracker = app_state.health_tracker.clone();
        tracker.set_http_state(ListenerState::Starting);

        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = match TcpListener::bind(addr).await {
            Ok(l) => l,
            Err(e) => {
                error!("HTTP listener failed to bind {addr}: {e}");
                tracker.set_http_state(ListenerState::Failed);
                return;
            }
        };

        tracker.set_http_state(ListenerState::Serving);
        info!("HTTP listener serving on http://{addr}/metrics");

        let router = build_router(app_state);
        if let Err(e) = axum::serve(listener, router).await {
            error!("HTTP listener stopped: {e}");
        }
        tracker.set_http_state(ListenerState::Stopped);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::build_snapshot;
    use crate::config::ExporterConfig;
    use crate::profiles::ProfileKind;

    fn app_state() -> AppState {
        let cfg = ExporterConfig {
            num_gpus: 3,
            profiles: vec![ProfileKind::Stable],
            ..ExporterConfig::default()
        };
        let registry = Arc::new(GpuRegistry::from_config(&cfg));
        let store = MetricsStore::new(build_snapshot(&registry, None, 0, 0.0));
        AppState {
            store,
            registry,
            health_tracker: HealthTracker::new(),
            hostname: "testhost".to_string(),
        }
    }

    #[tokio::test]
    async fn test_metrics_endpoint_over_real_socket() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let state = app_state();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = build_router(state);
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let mut conn = tokio::net::TcpStream::connect(addr).await.unwrap();
        conn.write_all(b"GET /metrics HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        conn.read_to_string(&mut response).await.unwrap();

        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains("text/plain; version=0.0.4"));
        assert!(response.contains("dcgm_gpu_temp{gpu=\"1\""));
        assert!(response.contains("dcgm_fb_free{gpu=\"3\""));
    }

    #[tokio::test]
    async fn test_health_endpoint_reports_listener_states() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let state = app_state();
        state.health_tracker.set_http_state(ListenerState::Serving);
        state.health_tracker.set_uds_state(ListenerState::Failed);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = build_router(state);
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let mut conn = tokio::net::TcpStream::connect(addr).await.unwrap();
        conn.write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        conn.read_to_string(&mut response).await.unwrap();

        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains("\"status\":\"degraded\""));
        assert!(response.contains("\"uds_listener\":\"failed\""));
    }

    #[tokio::test]
    async fn test_unknown_path_is_404() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let state = app_state();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = build_router(state);
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let mut conn = tokio::net::TcpStream::connect(addr).await.unwrap();
        conn.write_all(b"GET /nope HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        conn.read_to_string(&mut response).await.unwrap();

        assert!(response.starts_with("HTTP/1.1 404"));
    }
}
