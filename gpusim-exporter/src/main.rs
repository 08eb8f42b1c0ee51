//! Gpusim Exporter - simulated GPU fleet telemetry
//!
//! Simulates up to 16 GPU devices, advances their metrics on a fixed
//! interval under per-device behavior profiles, and serves Prometheus
//! exposition text over two independent transports:
//! - HTTP on EXPORTER_PORT (default 9400): /metrics and /health
//! - Unix domain socket at UDS_SOCKET_PATH (when ENABLE_UDS is set)
//!
//! No persistence: a restart resets all simulated state, including the
//! degrading profile's drift.

mod clock;
mod config;
mod devices;
mod exposition;
mod health;
mod http;
mod profiles;
mod snapshot;
mod state;
mod uds;

use anyhow::Context;

use crate::clock::{build_snapshot, spawn_simulation_clock};
use crate::config::ExporterConfig;
use crate::devices::GpuRegistry;
use crate::health::{HealthTracker, ListenerState};
use crate::http::AppState;
use crate::snapshot::MetricsStore;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let started = Instant::now();
    let cfg = ExporterConfig::from_env();

    let profile_names: Vec<&str> = cfg.profiles.iter().map(|p| p.as_str()).collect();
    info!(
        "gpusim-exporter starting (profiles available: {})",
        crate::profiles::ProfileKind::ALL.map(|p| p.as_str()).join(",")
    );
    info!(
        "devices: {} (ids from {}), profiles: [{}], interval: {}s",
        cfg.num_gpus,
        cfg.gpu_start_index,
        profile_names.join(","),
        cfg.update_interval.as_secs()
    );

    let registry = Arc::new(GpuRegistry::from_config(&cfg));
    let hostname = gethostname::gethostname().to_string_lossy().into_owned();

    // Publish tick 0 before any listener comes up so the first scrape
    // never sees an empty store.
    let store = MetricsStore::new(build_snapshot(
        &registry,
        None,
        0,
        started.elapsed().as_secs_f64(),
    ));

    let health_tracker = HealthTracker::new();
    let app_state = AppState {
        store: store.clone(),
        registry: registry.clone(),
        health_tracker: health_tracker.clone(),
        hostname,
    };

    spawn_simulation_clock(registry, store, cfg.update_interval, started);
    http::spawn_http_listener(app_state.clone(), cfg.http_port);

    if cfg.uds_enabled {
        uds::spawn_uds_listener(app_state, cfg.uds_path.clone());
    } else {
        health_tracker.set_uds_state(ListenerState::Disabled);
        info!("UDS listener disabled (set ENABLE_UDS=true to enable)");
    }

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutdown signal received, exiting");

    if cfg.uds_enabled {
        let _ = std::fs::remove_file(&cfg.uds_path);
    }
    Ok(())
}
