//! Exporter configuration resolved from the environment
//!
//! The surrounding deployment owns how values get into the environment
//! (.env, container env, supervisor); this module only resolves them into
//! an [`ExporterConfig`]. Bad values never abort startup: they fall back
//! to defaults with a warning so the exporter always comes up with a
//! usable device set.

use crate::profiles::ProfileKind;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Hard ceiling on simulated devices (native fake-entity limit).
pub const MAX_FAKE_GPUS: usize = 16;

pub const DEFAULT_NUM_GPUS: usize = 4;
pub const DEFAULT_UPDATE_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_HTTP_PORT: u16 = 9400;
pub const DEFAULT_UDS_PATH: &str = "/var/run/gpusim/metrics.sock";

#[derive(Debug, Clone)]
pub struct ExporterConfig {
    pub num_gpus: usize,
    pub gpu_start_index: u32,
    /// Profile assignment list, cycled over devices by the registry.
    /// Never empty.
    pub profiles: Vec<ProfileKind>,
    pub update_interval: Duration,
    pub http_port: u16,
    pub uds_enabled: bool,
    pub uds_path: PathBuf,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            num_gpus: DEFAULT_NUM_GPUS,
            gpu_start_index: 1,
            profiles: vec![ProfileKind::Static],
            update_interval: Duration::from_secs(DEFAULT_UPDATE_INTERVAL_SECS),
            http_port: DEFAULT_HTTP_PORT,
            uds_enabled: false,
            uds_path: PathBuf::from(DEFAULT_UDS_PATH),
        }
    }
}

impl ExporterConfig {
    /// Resolve the configuration from process environment variables.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        cfg.num_gpus = clamp_num_gpus(parse_var("NUM_FAKE_GPUS", DEFAULT_NUM_GPUS));
        cfg.gpu_start_index = clamp_start_index(parse_var("GPU_START_INDEX", 1u32));

        // GPU_PROFILES (per-device list) wins over METRIC_PROFILE (fleet-wide).
        cfg.profiles = match std::env::var("GPU_PROFILES") {
            Ok(list) if !list.trim().is_empty() => parse_profile_list(&list),
            _ => {
                let name =
                    std::env::var("METRIC_PROFILE").unwrap_or_else(|_| "static".to_string());
                vec![ProfileKind::parse(&name)]
            }
        };

        let interval_secs: u64 = parse_var("METRIC_UPDATE_INTERVAL", DEFAULT_UPDATE_INTERVAL_SECS);
        cfg.update_interval = Duration::from_secs(interval_secs.max(1));

        cfg.http_port = parse_var("EXPORTER_PORT", DEFAULT_HTTP_PORT);
        cfg.uds_enabled = std::env::var("ENABLE_UDS")
            .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
            .unwrap_or(false);
        if let Ok(path) = std::env::var("UDS_SOCKET_PATH") {
            if !path.trim().is_empty() {
                cfg.uds_path = PathBuf::from(path);
            }
        }

        cfg
    }
}

/// Clamp the requested device count into 1..=MAX_FAKE_GPUS.
pub fn clamp_num_gpus(requested: usize) -> usize {
    if requested > MAX_FAKE_GPUS {
        warn!("requested {requested} GPUs exceeds limit of {MAX_FAKE_GPUS}, reducing to {MAX_FAKE_GPUS}");
        MAX_FAKE_GPUS
    } else if requested == 0 {
        warn!("requested 0 GPUs, using 1");
        1
    } else {
        requested
    }
}

/// Keep the start index low enough that id arithmetic for a full fleet
/// cannot overflow.
pub fn clamp_start_index(requested: u32) -> u32 {
    let max = u32::MAX - MAX_FAKE_GPUS as u32;
    if requested > max {
        warn!("GPU_START_INDEX {requested} is too large, reducing to {max}");
        max
    } else {
        requested
    }
}

/// Parse a comma-separated profile list; unknown names become `static`.
pub fn parse_profile_list(list: &str) -> Vec<ProfileKind> {
    let parsed: Vec<ProfileKind> = list
        .split(',')
        .filter(|p| !p.trim().is_empty())
        .map(ProfileKind::parse)
        .collect();
    if parsed.is_empty() {
        vec![ProfileKind::Static]
    } else {
        parsed
    }
}

fn parse_var<T: std::str::FromStr + std::fmt::Display>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => match raw.trim().parse() {
            Ok(v) => v,
            Err(_) => {
                warn!("invalid {name} value '{raw}', using default: {default}");
                default
            }
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_num_gpus() {
        assert_eq!(clamp_num_gpus(64), MAX_FAKE_GPUS);
        assert_eq!(clamp_num_gpus(16), 16);
        assert_eq!(clamp_num_gpus(4), 4);
        assert_eq!(clamp_num_gpus(0), 1);
    }

    #[test]
    fn test_clamp_start_index() {
        assert_eq!(clamp_start_index(1), 1);
        assert_eq!(clamp_start_index(100), 100);
        assert_eq!(clamp_start_index(u32::MAX), u32::MAX - MAX_FAKE_GPUS as u32);
        assert_eq!(
            clamp_start_index(u32::MAX - MAX_FAKE_GPUS as u32),
            u32::MAX - MAX_FAKE_GPUS as u32
        );
    }

    #[test]
    fn test_parse_profile_list() {
        assert_eq!(
            parse_profile_list("stable,spike,faulty"),
            vec![ProfileKind::Stable, ProfileKind::Spike, ProfileKind::Faulty]
        );
        assert_eq!(
            parse_profile_list(" wave , bogus "),
            vec![ProfileKind::Wave, ProfileKind::Static]
        );
        assert_eq!(parse_profile_list(""), vec![ProfileKind::Static]);
    }

    #[test]
    fn test_defaults() {
        let cfg = ExporterConfig::default();
        assert_eq!(cfg.num_gpus, 4);
        assert_eq!(cfg.gpu_start_index, 1);
        assert_eq!(cfg.update_interval, Duration::from_secs(30));
        assert_eq!(cfg.http_port, 9400);
        assert!(!cfg.uds_enabled);
    }
}
