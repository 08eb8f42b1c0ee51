//! Simulation clock - the single writer behind the metrics store
//!
//! One background task recomputes every device's channels once per
//! configured interval and publishes a fresh snapshot. Readers never
//! block the clock and the clock never blocks readers; the only shared
//! touch point is the store's O(1) swap.
//!
//! A device whose computation comes out inconsistent keeps its previous
//! sample for that tick (warn + carry-forward); the clock itself never
//! dies, it just tries again next interval.

use crate::devices::GpuRegistry;
use crate::profiles::{self, MetricChannel, MetricValue};
use crate::snapshot::{DeviceSample, MetricsStore, Snapshot};
use rand::Rng;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::{self, JoinHandle};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Compute one device's channel set, rejecting inconsistent output.
///
/// The profile engine itself is total, so the only way to get here is a
/// non-finite value escaping the generators; treat that as the device
/// failing this tick.
fn sample_device_checked<R: Rng>(
    kind: crate::profiles::ProfileKind,
    device_index: usize,
    elapsed_secs: f64,
    rng: &mut R,
) -> Option<[MetricValue; MetricChannel::COUNT]> {
    let values = profiles::sample_device(kind, device_index, elapsed_secs, rng);
    let consistent = values
        .iter()
        .all(|v| v.as_f64().map(f64::is_finite).unwrap_or(true));
    consistent.then_some(values)
}

/// Build the snapshot for one tick.
///
/// `prev` supplies carry-forward samples for devices that fail to
/// compute; a device with no previous sample falls back to marking every
/// channel invalid rather than aborting the tick.
pub fn build_snapshot(
    registry: &GpuRegistry,
    prev: Option<&Snapshot>,
    tick: u64,
    elapsed_secs: f64,
) -> Snapshot {
    let mut rng = rand::thread_rng();
    let mut samples = Vec::with_capacity(registry.len());

    for device in registry.devices() {
        let sample = match sample_device_checked(device.profile, device.index, elapsed_secs, &mut rng)
        {
            Some(values) => DeviceSample::new(device.id, values),
            None => match prev.and_then(|p| p.sample(device.id)) {
                Some(previous) => {
                    warn!(
                        "GPU {} produced inconsistent values at tick {tick}, carrying forward",
                        device.id
                    );
                    previous.clone()
                }
                None => {
                    warn!(
                        "GPU {} produced inconsistent values at tick {tick} with no prior sample",
                        device.id
                    );
                    DeviceSample::new(device.id, [MetricValue::Invalid; MetricChannel::COUNT])
                }
            },
        };
        samples.push(sample);
    }

    Snapshot::new(tick, samples)
}

/// Spawn the periodic update task.
///
/// The store must already hold the startup snapshot (tick 0); this task
/// publishes tick 1, 2, ... on the interval.
pub fn spawn_simulation_clock(
    registry: Arc<GpuRegistry>,
    store: MetricsStore,
    interval: Duration,
    started: Instant,
) -> JoinHandle<()> {
    task::spawn(async move {
        info!("metric updater started (interval: {}s)", interval.as_secs());
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first interval tick completes immediately; the startup
        // snapshot already covers it.
        ticker.tick().await;

        let mut tick: u64 = 1;
        loop {
            ticker.tick().await;
            let elapsed = started.elapsed().as_secs_f64();
            let prev = store.current();
            let snapshot = build_snapshot(&registry, Some(&prev), tick, elapsed);
            store.publish(snapshot);
            debug!("published snapshot for tick {tick} (elapsed {elapsed:.1}s)");
            tick += 1;
        }
    })
}
