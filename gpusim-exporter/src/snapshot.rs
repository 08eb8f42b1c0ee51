//! Published snapshots and the shared metrics store
//!
//! The store is the single mutable shared resource in the exporter:
//! one writer (the simulation clock) swaps an `Arc<Snapshot>` under a
//! short-held lock, many readers clone the `Arc` out. A reader always
//! gets a complete snapshot from one tick, never values from two.

use crate::profiles::{MetricChannel, MetricValue};
use crate::state::{new_state, Shared};
use std::sync::Arc;
use time::OffsetDateTime;

/// Full channel set for one device at one tick.
#[derive(Debug, Clone)]
pub struct DeviceSample {
    pub device_id: u32,
    values: [MetricValue; MetricChannel::COUNT],
}

impl DeviceSample {
    pub fn new(device_id: u32, values: [MetricValue; MetricChannel::COUNT]) -> Self {
        Self { device_id, values }
    }

    pub fn value(&self, channel: MetricChannel) -> MetricValue {
        self.values[channel.index()]
    }
}

/// Immutable, timestamped view of the whole fleet for one tick.
///
/// Samples are ordered by ascending device id (registry order).
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub tick: u64,
    pub timestamp: OffsetDateTime,
    pub samples: Vec<DeviceSample>,
}

impl Snapshot {
    pub fn new(tick: u64, samples: Vec<DeviceSample>) -> Self {
        Self {
            tick,
            timestamp: OffsetDateTime::now_utc(),
            samples,
        }
    }

    pub fn sample(&self, device_id: u32) -> Option<&DeviceSample> {
        self.samples.iter().find(|s| s.device_id == device_id)
    }
}

/// Atomic publish/read point between the clock and the listeners.
#[derive(Clone)]
pub struct MetricsStore {
    current: Shared<Arc<Snapshot>>,
}

impl MetricsStore {
    pub fn new(initial: Snapshot) -> Self {
        Self {
            current: new_state(Arc::new(initial)),
        }
    }

    /// Replace the current snapshot. The lock is held only for the swap.
    pub fn publish(&self, snapshot: Snapshot) {
        *self.current.lock() = Arc::new(snapshot);
    }

    /// Latest published snapshot; never partially constructed.
    pub fn current(&self) -> Arc<Snapshot> {
        self.current.lock().clone()
    }
}
