//! Exporter liveness tracking
//!
//! Tracks uptime and the per-listener state machine
//! (stopped -> starting -> serving -> stopped, with failed as the
//! bind-error terminal state). A listener that fails to bind degrades
//! the reported status without taking the process down.

use crate::devices::GpuRegistry;
use crate::snapshot::MetricsStore;
use crate::state::{new_state, Shared};
use serde::Serialize;
use std::time::Instant;
use time::format_description::well_known::Rfc3339;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ListenerState {
    Stopped,
    Starting,
    Serving,
    Failed,
    Disabled,
}

#[derive(Debug, Serialize)]
pub struct ExporterHealth {
    pub status: String,
    pub uptime_seconds: u64,
    pub devices: u32,
    pub tick: u64,
    pub last_update: String,
    pub http_listener: ListenerState,
    pub uds_listener: ListenerState,
}

#[derive(Clone)]
pub struct HealthTracker {
    start_time: Instant,
    http_state: Shared<ListenerState>,
    uds_state: Shared<ListenerState>,
}

impl HealthTracker {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            http_state: new_state(ListenerState::Stopped),
            uds_state: new_state(ListenerState::Stopped),
        }
    }

    pub fn set_http_state(&self, state: ListenerState) {
        *self.http_state.lock() = state;
    }

    pub fn set_uds_state(&self, state: ListenerState) {
        *self.uds_state.lock() = state;
    }

    pub fn http_state(&self) -> ListenerState {
        *self.http_state.lock()
    }

    pub fn uds_state(&self) -> ListenerState {
        *self.uds_state.lock()
    }

    /// Liveness payload: process is alive, snapshot freshness is not a
    /// factor here.
    pub fn get_health(&self, registry: &GpuRegistry, store: &MetricsStore) -> ExporterHealth {
        let http = self.http_state();
        let uds = self.uds_state();
        let degraded = http == ListenerState::Failed || uds == ListenerState::Failed;
        let snapshot = store.current();

        ExporterHealth {
            status: if degraded { "degraded" } else { "ok" }.to_string(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
            devices: registry.len() as u32,
            tick: snapshot.tick,
            last_update: snapshot.timestamp.format(&Rfc3339).unwrap_or_default(),
            http_listener: http,
            uds_listener: uds,
        }
    }
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::build_snapshot;
    use crate::config::ExporterConfig;
    use crate::profiles::ProfileKind;

    fn fixtures() -> (GpuRegistry, MetricsStore) {
        let cfg = ExporterConfig {
            num_gpus: 2,
            profiles: vec![ProfileKind::Static],
            ..ExporterConfig::default()
        };
        let registry = GpuRegistry::from_config(&cfg);
        let store = MetricsStore::new(build_snapshot(&registry, None, 0, 0.0));
        (registry, store)
    }

    #[test]
    fn test_health_ok_when_listeners_serving() {
        let (registry, store) = fixtures();
        let tracker = HealthTracker::new();
        tracker.set_http_state(ListenerState::Serving);
        tracker.set_uds_state(ListenerState::Disabled);

        let health = tracker.get_health(&registry, &store);
        assert_eq!(health.status, "ok");
        assert_eq!(health.devices, 2);
        assert_eq!(health.tick, 0);
    }

    #[test]
    fn test_health_payload_serializes_with_expected_shape() {
        let (registry, store) = fixtures();
        let tracker = HealthTracker::new();
        tracker.set_http_state(ListenerState::Serving);
        tracker.set_uds_state(ListenerState::Disabled);

        let health = tracker.get_health(&registry, &store);
        let json = serde_json::to_value(&health).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["devices"], 2);
        assert_eq!(json["http_listener"], "serving");
        assert_eq!(json["uds_listener"], "disabled");
        assert!(json["uptime_seconds"].is_u64());
        assert!(json["last_update"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn test_failed_listener_degrades_health() {
        let (registry, store) = fixtures();
        let tracker = HealthTracker::new();
        tracker.set_http_state(ListenerState::Serving);
        tracker.set_uds_state(ListenerState::Failed);

        let health = tracker.get_health(&registry, &store);
        assert_eq!(health.status, "degraded");
        assert_eq!(health.http_listener, ListenerState::Serving);
        assert_eq!(health.uds_listener, ListenerState::Failed);
    }
}
