//! Simulated device registry
//!
//! Built once at startup from the resolved configuration, immutable
//! afterwards. Every device gets a stable identity (UUID, model name,
//! synthetic PCI address) and exactly one behavior profile for its
//! lifetime; the profile list cycles when there are more devices than
//! named profiles.

use crate::config::ExporterConfig;
use crate::profiles::ProfileKind;
use tracing::info;

/// Model name catalog, cycled over devices.
pub const GPU_MODELS: [&str; 6] = [
    "Tesla V100-SXM2-16GB",
    "Tesla V100-SXM2-32GB",
    "A100-SXM4-40GB",
    "A100-SXM4-80GB",
    "H100-SXM5-80GB",
    "A100-PCIE-40GB",
];

/// One simulated GPU. Immutable after registry construction.
#[derive(Debug, Clone)]
pub struct GpuDevice {
    /// Exported device id (starts at the configured start index).
    pub id: u32,
    /// 0-based position in the registry, used for baseline offsets.
    pub index: usize,
    pub uuid: String,
    pub model_name: String,
    pub pci_bus_id: String,
    pub profile: ProfileKind,
}

/// Fixed-size, read-only table of simulated devices.
#[derive(Debug)]
pub struct GpuRegistry {
    devices: Vec<GpuDevice>,
}

impl GpuRegistry {
    pub fn from_config(cfg: &ExporterConfig) -> Self {
        let mut devices = Vec::with_capacity(cfg.num_gpus);
        for index in 0..cfg.num_gpus {
            let id = cfg.gpu_start_index + index as u32;
            let profile = cfg.profiles[index % cfg.profiles.len()];
            let seq = index + 1;
            devices.push(GpuDevice {
                id,
                index,
                uuid: format!(
                    "GPU-{seq:08x}-fake-gpu-{seq:04x}-{:04x}{seq:08x}",
                    cfg.num_gpus
                ),
                model_name: GPU_MODELS[index % GPU_MODELS.len()].to_string(),
                pci_bus_id: format!("00000000:{seq:02x}:00.0"),
                profile,
            });
        }

        for d in &devices {
            info!(
                "GPU {}: {} [{}] {}",
                d.id,
                d.model_name,
                d.profile.as_str(),
                d.pci_bus_id
            );
        }

        Self { devices }
    }

    pub fn devices(&self) -> &[GpuDevice] {
        &self.devices
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MAX_FAKE_GPUS;
    use std::time::Duration;

    fn test_config(num_gpus: usize, profiles: Vec<ProfileKind>) -> ExporterConfig {
        ExporterConfig {
            num_gpus,
            gpu_start_index: 1,
            profiles,
            update_interval: Duration::from_secs(30),
            http_port: 9400,
            uds_enabled: false,
            uds_path: "/tmp/test.sock".into(),
        }
    }

    #[test]
    fn test_registry_assigns_ids_from_start_index() {
        let mut cfg = test_config(4, vec![ProfileKind::Static]);
        cfg.gpu_start_index = 3;
        let registry = GpuRegistry::from_config(&cfg);
        let ids: Vec<u32> = registry.devices().iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![3, 4, 5, 6]);
    }

    #[test]
    fn test_max_start_index_does_not_overflow_ids() {
        let mut cfg = test_config(MAX_FAKE_GPUS, vec![ProfileKind::Static]);
        cfg.gpu_start_index = crate::config::clamp_start_index(u32::MAX);
        let registry = GpuRegistry::from_config(&cfg);
        let ids: Vec<u32> = registry.devices().iter().map(|d| d.id).collect();
        assert_eq!(ids.len(), MAX_FAKE_GPUS);
        let mut deduped = ids.clone();
        deduped.sort_unstable();
        deduped.dedup();
        assert_eq!(deduped, ids, "ids wrapped or collided");
    }

    #[test]
    fn test_profiles_cycle_over_devices() {
        let cfg = test_config(5, vec![ProfileKind::Stable, ProfileKind::Spike]);
        let registry = GpuRegistry::from_config(&cfg);
        let kinds: Vec<ProfileKind> = registry.devices().iter().map(|d| d.profile).collect();
        assert_eq!(
            kinds,
            vec![
                ProfileKind::Stable,
                ProfileKind::Spike,
                ProfileKind::Stable,
                ProfileKind::Spike,
                ProfileKind::Stable,
            ]
        );
    }

    #[test]
    fn test_identities_are_unique_and_stable() {
        let cfg = test_config(MAX_FAKE_GPUS, vec![ProfileKind::Static]);
        let registry = GpuRegistry::from_config(&cfg);
        assert_eq!(registry.len(), MAX_FAKE_GPUS);
        let mut uuids: Vec<&str> = registry.devices().iter().map(|d| d.uuid.as_str()).collect();
        uuids.sort();
        uuids.dedup();
        assert_eq!(uuids.len(), MAX_FAKE_GPUS);
        assert_eq!(registry.devices()[0].pci_bus_id, "00000000:01:00.0");
        assert_eq!(registry.devices()[15].pci_bus_id, "00000000:10:00.0");
    }
}
