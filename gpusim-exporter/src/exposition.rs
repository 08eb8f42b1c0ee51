//! Prometheus text exposition rendering
//!
//! Pure function of (snapshot, registry, hostname): the same inputs
//! always render to byte-identical text. Channel-major layout with one
//! HELP/TYPE block per metric family and device lines in ascending id
//! order. Invalid values render as NaN rather than being dropped, so a
//! faulting channel stays visible to the scrape.

use crate::devices::GpuRegistry;
use crate::profiles::{MetricChannel, MetricValue};
use crate::snapshot::Snapshot;
use std::fmt::Write;

/// Content type declared on both transports.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Render a snapshot in exposition format v0.0.4.
pub fn render(snapshot: &Snapshot, registry: &GpuRegistry, hostname: &str) -> String {
    let mut out = String::with_capacity(registry.len() * MetricChannel::COUNT * 160);

    for channel in MetricChannel::ALL {
        let name = channel.metric_name();
        let _ = writeln!(out, "# HELP {name} {}", channel.help_text());
        let _ = writeln!(out, "# TYPE {name} gauge");

        for device in registry.devices() {
            // Registry and snapshot come from the same device table, so
            // every device has a sample; skip if that ever breaks.
            let Some(sample) = snapshot.sample(device.id) else {
                continue;
            };
            let rendered = match sample.value(channel) {
                MetricValue::Valid(v) => format_value(v),
                MetricValue::Invalid => "NaN".to_string(),
            };
            let _ = writeln!(
                out,
                "{name}{{gpu=\"{}\",UUID=\"{}\",device=\"nvidia{}\",modelName=\"{}\",pci_bus_id=\"{}\",Hostname=\"{}\"}} {rendered}",
                device.id, device.uuid, device.id, device.model_name, device.pci_bus_id, hostname
            );
        }
    }

    out
}

/// Fixed-point value rendering: integral values print without a
/// fractional part, everything else keeps full precision.
fn format_value(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}
