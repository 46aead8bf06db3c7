//! GPU detection and per-vendor readers.

mod amd;
mod intel;
mod nvidia;

pub use amd::AmdGpu;
pub use intel::IntelGpu;
pub use nvidia::NvidiaSmi;

use std::fs;
use std::path::PathBuf;
use tracing::{debug, info};

use super::data::{GpuReading, GpuVendor};
use super::SensorRoots;

const PCI_VENDOR_AMD: &str = "0x1002";
const PCI_VENDOR_INTEL: &str = "0x8086";

/// The GPU source chosen at startup.
#[derive(Debug, Clone)]
pub enum GpuBackend {
    Nvidia(NvidiaSmi),
    Amd(AmdGpu),
    Intel(IntelGpu),
    None,
}

impl GpuBackend {
    /// Picks a backend: NVIDIA tool first, then DRM cards by PCI vendor.
    pub async fn detect(roots: &SensorRoots, nvidia: NvidiaSmi) -> Self {
        if nvidia.probe().await {
            info!("NVIDIA GPU detected");
            return GpuBackend::Nvidia(nvidia);
        }

        let backend = Self::detect_drm(roots);
        match &backend {
            GpuBackend::Amd(amd) => info!("AMD GPU detected at {}", amd.device.display()),
            GpuBackend::Intel(intel) => info!("Intel GPU detected at {}", intel.card.display()),
            _ => info!("No supported GPU detected"),
        }
        backend
    }

    fn detect_drm(roots: &SensorRoots) -> Self {
        let Ok(entries) = fs::read_dir(roots.sys_path("class/drm")) else {
            return GpuBackend::None;
        };

        // Connector entries (card0-DP-1) share the card's device
        let mut cards: Vec<PathBuf> = entries
            .flatten()
            .filter(|e| {
                let name = e.file_name().to_string_lossy().to_string();
                name.starts_with("card") && !name.contains('-')
            })
            .map(|e| e.path())
            .collect();
        cards.sort();

        for card in cards {
            let device = card.join("device");
            let Some(vendor) = roots.read_string(&device.join("vendor")) else {
                continue;
            };

            match vendor.to_lowercase().as_str() {
                PCI_VENDOR_AMD => match first_hwmon(&device) {
                    Some(hwmon) => return GpuBackend::Amd(AmdGpu { device, hwmon }),
                    None => debug!("AMD card {} has no hwmon, skipping", card.display()),
                },
                PCI_VENDOR_INTEL => return GpuBackend::Intel(IntelGpu { card, device }),
                other => debug!("Ignoring {} with vendor {}", card.display(), other),
            }
        }

        GpuBackend::None
    }

    pub fn vendor(&self) -> GpuVendor {
        match self {
            GpuBackend::Nvidia(_) => GpuVendor::Nvidia,
            GpuBackend::Amd(_) => GpuVendor::Amd,
            GpuBackend::Intel(_) => GpuVendor::Intel,
            GpuBackend::None => GpuVendor::None,
        }
    }

    /// Reads the current metrics. Never fails; missing data reads as zero.
    pub async fn read(&self, roots: &SensorRoots) -> GpuReading {
        match self {
            GpuBackend::Nvidia(smi) => smi.read().await,
            GpuBackend::Amd(amd) => amd.read(roots),
            GpuBackend::Intel(intel) => intel.read(roots),
            GpuBackend::None => GpuReading::default(),
        }
    }
}

fn first_hwmon(device: &std::path::Path) -> Option<PathBuf> {
    let mut chips: Vec<PathBuf> = fs::read_dir(device.join("hwmon"))
        .ok()?
        .flatten()
        .map(|e| e.path())
        .collect();
    chips.sort();
    chips.into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::testing::FakeSys;
    use std::time::Duration;

    fn no_tool() -> NvidiaSmi {
        NvidiaSmi::new("/nonexistent/nvidia-smi", Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_no_gpu() {
        let sys = FakeSys::new();
        let roots = sys.roots();

        let backend = GpuBackend::detect(&roots, no_tool()).await;
        assert_eq!(backend.vendor(), GpuVendor::None);

        let reading = backend.read(&roots).await;
        assert!(!reading.valid);
        assert_eq!(reading.temperature, 0.0);
        assert_eq!(reading.usage, 0.0);
    }

    #[tokio::test]
    async fn test_detect_amd() {
        let sys = FakeSys::new();
        sys.write("sys/class/drm/card0/device/vendor", "0x1002\n");
        sys.write("sys/class/drm/card0/device/gpu_busy_percent", "42");
        sys.mkdir("sys/class/drm/card0/device/hwmon/hwmon3");
        sys.write("sys/class/drm/card0-DP-1/device/vendor", "0x8086");
        let roots = sys.roots();

        let backend = GpuBackend::detect(&roots, no_tool()).await;
        assert_eq!(backend.vendor(), GpuVendor::Amd);

        let reading = backend.read(&roots).await;
        assert_eq!(reading.usage, 42.0);
        assert!(reading.valid);
    }

    #[tokio::test]
    async fn test_amd_without_hwmon_falls_through() {
        let sys = FakeSys::new();
        sys.write("sys/class/drm/card0/device/vendor", "0x1002");
        sys.write("sys/class/drm/card1/device/vendor", "0x8086");

        let backend = GpuBackend::detect(&sys.roots(), no_tool()).await;
        match backend {
            GpuBackend::Intel(intel) => assert!(intel.card.ends_with("card1")),
            other => panic!("expected Intel, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_vendor() {
        let sys = FakeSys::new();
        sys.write("sys/class/drm/card0/device/vendor", "0x1af4");

        let backend = GpuBackend::detect(&sys.roots(), no_tool()).await;
        assert_eq!(backend.vendor(), GpuVendor::None);
    }
}
