//! Metric behavior profiles for simulated GPUs
//!
//! A profile decides how one device's metric channels evolve over time:
//! - `static`/`stable` for flat baselines (with or without jitter)
//! - `spike`/`faulty`/`chaos` for stochastic fault and load injection
//! - `wave`/`degrading` as deterministic functions of elapsed time
//!
//! The engine is pure: value = f(kind, channel, device index, elapsed, rng).
//! It never fails; anything it has no rule for degrades to a bounded
//! uniform draw so serving keeps going.

use rand::Rng;
use tracing::warn;

/// Behavior profile assigned to one device for its whole lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileKind {
    Static,
    Stable,
    Spike,
    Wave,
    Degrading,
    Faulty,
    Chaos,
}

impl ProfileKind {
    pub const ALL: [ProfileKind; 7] = [
        ProfileKind::Static,
        ProfileKind::Stable,
        ProfileKind::Spike,
        ProfileKind::Wave,
        ProfileKind::Degrading,
        ProfileKind::Faulty,
        ProfileKind::Chaos,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileKind::Static => "static",
            ProfileKind::Stable => "stable",
            ProfileKind::Spike => "spike",
            ProfileKind::Wave => "wave",
            ProfileKind::Degrading => "degrading",
            ProfileKind::Faulty => "faulty",
            ProfileKind::Chaos => "chaos",
        }
    }

    /// Parse a profile name, falling back to `static` for unknown names.
    pub fn parse(name: &str) -> ProfileKind {
        match name.trim().to_ascii_lowercase().as_str() {
            "static" => ProfileKind::Static,
            "stable" => ProfileKind::Stable,
            "spike" => ProfileKind::Spike,
            "wave" => ProfileKind::Wave,
            "degrading" => ProfileKind::Degrading,
            "faulty" => ProfileKind::Faulty,
            "chaos" => ProfileKind::Chaos,
            other => {
                warn!("unknown profile '{other}', using 'static'");
                ProfileKind::Static
            }
        }
    }
}

/// One sampled metric value, or the fault-injection marker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    Valid(f64),
    Invalid,
}

impl MetricValue {
    pub fn is_valid(&self) -> bool {
        matches!(self, MetricValue::Valid(_))
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Valid(v) => Some(*v),
            MetricValue::Invalid => None,
        }
    }
}

/// Total framebuffer per simulated device, in MiB.
pub const FB_TOTAL_MIB: f64 = 16384.0;

/// Closed set of telemetry channels. Order here is the exposition order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricChannel {
    GpuTemp,
    PowerUsage,
    GpuUtilization,
    MemCopyUtilization,
    SmClock,
    MemClock,
    FbTotal,
    FbUsed,
    FbFree,
}

impl MetricChannel {
    pub const COUNT: usize = 9;

    pub const ALL: [MetricChannel; Self::COUNT] = [
        MetricChannel::GpuTemp,
        MetricChannel::PowerUsage,
        MetricChannel::GpuUtilization,
        MetricChannel::MemCopyUtilization,
        MetricChannel::SmClock,
        MetricChannel::MemClock,
        MetricChannel::FbTotal,
        MetricChannel::FbUsed,
        MetricChannel::FbFree,
    ];

    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Exported Prometheus metric name.
    pub fn metric_name(&self) -> &'static str {
        match self {
            MetricChannel::GpuTemp => "dcgm_gpu_temp",
            MetricChannel::PowerUsage => "dcgm_power_usage",
            MetricChannel::GpuUtilization => "dcgm_gpu_utilization",
            MetricChannel::MemCopyUtilization => "dcgm_mem_copy_utilization",
            MetricChannel::SmClock => "dcgm_sm_clock",
            MetricChannel::MemClock => "dcgm_mem_clock",
            MetricChannel::FbTotal => "dcgm_fb_total",
            MetricChannel::FbUsed => "dcgm_fb_used",
            MetricChannel::FbFree => "dcgm_fb_free",
        }
    }

    pub fn help_text(&self) -> &'static str {
        match self {
            MetricChannel::GpuTemp => "GPU temperature in Celsius",
            MetricChannel::PowerUsage => "Power usage in watts",
            MetricChannel::GpuUtilization => "GPU utilization percentage",
            MetricChannel::MemCopyUtilization => "Memory utilization percentage",
            MetricChannel::SmClock => "SM clock in MHz",
            MetricChannel::MemClock => "Memory clock in MHz",
            MetricChannel::FbTotal => "Total framebuffer in MB",
            MetricChannel::FbUsed => "Used framebuffer in MB",
            MetricChannel::FbFree => "Free framebuffer in MB",
        }
    }
}

/// Baseline and shape constants for one channel.
///
/// `base` is the fleet baseline; `step` spreads devices apart so a
/// dashboard can tell them from each other. `amplitude` scales wave and
/// degradation swings, `period` is the wave period in seconds.
#[derive(Debug, Clone, Copy)]
struct ChannelSpec {
    base: f64,
    step: f64,
    amplitude: f64,
    period: f64,
    min: f64,
    max: f64,
    /// +1.0 if degradation pushes the value up (temp, power), -1.0 if
    /// it erodes it (utilization, clocks).
    drift_sign: f64,
}

fn channel_spec(channel: MetricChannel) -> ChannelSpec {
    match channel {
        MetricChannel::GpuTemp => ChannelSpec {
            base: 50.0,
            step: 5.0,
            amplitude: 20.0,
            period: 300.0,
            min: 30.0,
            max: 110.0,
            drift_sign: 1.0,
        },
        MetricChannel::PowerUsage => ChannelSpec {
            base: 150.0,
            step: 20.0,
            amplitude: 80.0,
            period: 300.0,
            min: 50.0,
            max: 400.0,
            drift_sign: 1.0,
        },
        MetricChannel::GpuUtilization => ChannelSpec {
            base: 30.0,
            step: 10.0,
            amplitude: 40.0,
            period: 240.0,
            min: 0.0,
            max: 100.0,
            drift_sign: -1.0,
        },
        MetricChannel::MemCopyUtilization => ChannelSpec {
            base: 40.0,
            step: 5.0,
            amplitude: 32.0,
            period: 240.0,
            min: 0.0,
            max: 100.0,
            drift_sign: -1.0,
        },
        MetricChannel::SmClock => ChannelSpec {
            base: 1400.0,
            step: 0.0,
            amplitude: 200.0,
            period: 600.0,
            min: 500.0,
            max: 2100.0,
            drift_sign: -1.0,
        },
        MetricChannel::MemClock => ChannelSpec {
            base: 877.0,
            step: 0.0,
            amplitude: 100.0,
            period: 600.0,
            min: 400.0,
            max: 1200.0,
            drift_sign: -1.0,
        },
        // FbTotal is constant and FbFree is derived; the specs below only
        // matter for the generic fallback draw.
        MetricChannel::FbTotal => ChannelSpec {
            base: FB_TOTAL_MIB,
            step: 0.0,
            amplitude: 0.0,
            period: 300.0,
            min: FB_TOTAL_MIB,
            max: FB_TOTAL_MIB,
            drift_sign: 0.0,
        },
        MetricChannel::FbUsed => ChannelSpec {
            base: 4096.0,
            step: 1024.0,
            amplitude: 4096.0,
            period: 300.0,
            min: 1024.0,
            max: FB_TOTAL_MIB,
            drift_sign: 1.0,
        },
        MetricChannel::FbFree => ChannelSpec {
            base: FB_TOTAL_MIB - 4096.0,
            step: 0.0,
            amplitude: 0.0,
            period: 300.0,
            min: 0.0,
            max: FB_TOTAL_MIB,
            drift_sign: -1.0,
        },
    }
}

/// Probability per tick that a `spike` device jumps to ~2x baseline.
const SPIKE_PROBABILITY: f64 = 0.20;
/// Probability per tick that a `faulty` device reports an invalid value.
const FAULT_PROBABILITY: f64 = 0.15;
/// Jitter band (fraction of baseline) for the `stable` profile.
const STABLE_JITTER: f64 = 0.05;
/// Seconds until the `degrading` profile reaches its full drift.
const DEGRADE_FULL_SECS: f64 = 6000.0;

fn clamp(value: f64, spec: &ChannelSpec) -> f64 {
    value.clamp(spec.min, spec.max)
}

/// Compute one channel value for one device.
///
/// `device_index` is the 0-based position of the device in the registry
/// (not its exported id), used for the per-device baseline offset and the
/// wave phase. `elapsed_secs` is monotonic time since process start.
pub fn sample_channel<R: Rng>(
    kind: ProfileKind,
    channel: MetricChannel,
    device_index: usize,
    elapsed_secs: f64,
    rng: &mut R,
) -> MetricValue {
    let spiking = kind == ProfileKind::Spike && rng.gen_bool(SPIKE_PROBABILITY);
    channel_value(kind, channel, device_index, elapsed_secs, spiking, rng)
}

/// Channel computation with the per-tick device state already drawn.
///
/// A spiking device spikes on every channel at once, so the spike draw
/// belongs to the device tick, not to the individual channel.
fn channel_value<R: Rng>(
    kind: ProfileKind,
    channel: MetricChannel,
    device_index: usize,
    elapsed_secs: f64,
    spiking: bool,
    rng: &mut R,
) -> MetricValue {
    let spec = channel_spec(channel);

    // Channels outside the generators' vocabulary: FbTotal is a constant
    // and FbFree only exists as `total - used` (derived by the caller).
    // Reaching FbFree here means the caller asked for a channel the
    // engine has no rule for, so degrade to a bounded draw instead of
    // failing. Simulation must keep serving.
    if matches!(channel, MetricChannel::FbTotal) {
        return MetricValue::Valid(FB_TOTAL_MIB);
    }
    if matches!(channel, MetricChannel::FbFree) {
        return MetricValue::Valid(rng.gen_range(spec.min..=spec.max));
    }

    let base = clamp(spec.base + device_index as f64 * spec.step, &spec);

    let value = match kind {
        ProfileKind::Static => base,
        ProfileKind::Stable => {
            let jitter = rng.gen_range(-STABLE_JITTER..=STABLE_JITTER);
            base * (1.0 + jitter)
        }
        ProfileKind::Spike => {
            if spiking {
                base * 2.0
            } else {
                base
            }
        }
        ProfileKind::Wave => {
            let phase = device_index as f64 * 0.5;
            base + spec.amplitude * (elapsed_secs / spec.period + phase).sin()
        }
        ProfileKind::Degrading => {
            let factor = (elapsed_secs / DEGRADE_FULL_SECS).min(0.5);
            base + spec.drift_sign * spec.amplitude * factor * 2.0
        }
        ProfileKind::Faulty => {
            if rng.gen_bool(FAULT_PROBABILITY) {
                return MetricValue::Invalid;
            }
            base
        }
        ProfileKind::Chaos => rng.gen_range(spec.min..=spec.max),
    };

    MetricValue::Valid(clamp(value, &spec))
}

/// Compute a full channel set for one device.
///
/// FbFree is derived from FbUsed within the same call so the framebuffer
/// triple always adds up; an invalid FbUsed makes FbFree invalid too.
pub fn sample_device<R: Rng>(
    kind: ProfileKind,
    device_index: usize,
    elapsed_secs: f64,
    rng: &mut R,
) -> [MetricValue; MetricChannel::COUNT] {
    let mut values = [MetricValue::Invalid; MetricChannel::COUNT];

    // One spike decision per device per tick: a spiking GPU runs hot,
    // draws more power and fills memory together.
    let spiking = kind == ProfileKind::Spike && rng.gen_bool(SPIKE_PROBABILITY);

    for channel in MetricChannel::ALL {
        let value = match channel {
            MetricChannel::FbFree => match values[MetricChannel::FbUsed.index()] {
                MetricValue::Valid(used) => MetricValue::Valid(FB_TOTAL_MIB - used),
                MetricValue::Invalid => MetricValue::Invalid,
            },
            _ => channel_value(kind, channel, device_index, elapsed_secs, spiking, rng),
        };
        values[channel.index()] = value;
    }

    values
}
