//! AMD GPU readings from amdgpu sysfs.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

use crate::sensors::data::{GpuReading, GpuVendor};
use crate::sensors::hwmon::{self, read_preferred_temp};
use crate::sensors::SensorRoots;

static SCLK_MHZ: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)\s*[Mm][Hh]z").expect("static pattern"));

/// An amdgpu device and its sensor chip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmdGpu {
    /// `/sys/class/drm/cardN/device`
    pub device: PathBuf,
    /// `<device>/hwmon/hwmonM`
    pub hwmon: PathBuf,
}

impl AmdGpu {
    pub fn read(&self, roots: &SensorRoots) -> GpuReading {
        let mut data = GpuReading::for_vendor(GpuVendor::Amd);

        data.name = roots
            .read_string(&self.device.join("product_name"))
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "AMD Radeon GPU".to_string());

        if let Some(temp) = read_preferred_temp(roots, &self.hwmon, &["edge"]) {
            data.temperature = temp;
            data.valid = true;
        }

        if let Some(usage) = self.read_usage(roots) {
            data.usage = usage;
            data.valid = true;
        }

        let frequency = roots
            .read_string(&self.device.join("pp_dpm_sclk"))
            .and_then(|table| parse_active_sclk(&table))
            .or_else(|| {
                // freq1_input is in Hz
                roots
                    .read_value(&self.hwmon.join("freq1_input"))
                    .map(|hz| hz / 1_000_000.0)
            });
        if let Some(mhz) = frequency {
            data.frequency = mhz;
            data.valid = true;
        }

        let vram_used = roots.read_value(&self.device.join("mem_info_vram_used"));
        let vram_total = roots.read_value(&self.device.join("mem_info_vram_total"));
        if let (Some(used), Some(total)) = (vram_used, vram_total) {
            if total > 0.0 {
                data.memory_usage = used / total * 100.0;
            }
        }

        if let Some(rpm) = hwmon::read_fans(roots, &self.hwmon).next() {
            data.fan_rpm = rpm as u32;
        }

        // Power is in microwatts; average beats instantaneous
        let power = roots
            .read_value(&self.hwmon.join("power1_average"))
            .filter(|uw| *uw > 0.0)
            .or_else(|| roots.read_value(&self.hwmon.join("power1_input")));
        if let Some(uw) = power {
            data.power = uw / 1_000_000.0;
            data.valid = true;
        }

        data
    }

    /// Utilization, first source that answers wins.
    fn read_usage(&self, roots: &SensorRoots) -> Option<f64> {
        if let Some(usage) = roots.read_value(&self.device.join("gpu_busy_percent")) {
            debug!("AMD GPU usage from gpu_busy_percent: {}%", usage);
            return Some(usage);
        }

        let mut cards: Vec<PathBuf> = fs::read_dir(roots.sys_path("class/drm"))
            .ok()?
            .flatten()
            .filter(|e| {
                let name = e.file_name().to_string_lossy().to_string();
                name.strip_prefix("card")
                    .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
            })
            .map(|e| e.path())
            .collect();
        cards.sort();
        for card in cards {
            let busy = card.join("device/gpu_busy_percent");
            if let Some(usage) = roots.read_value(&busy) {
                debug!("AMD GPU usage from {}: {}%", busy.display(), usage);
                return Some(usage);
            }
        }

        let mut files: Vec<PathBuf> = fs::read_dir(&self.hwmon)
            .ok()?
            .flatten()
            .map(|e| e.path())
            .filter(|p| {
                let name = p
                    .file_name()
                    .map(|n| n.to_string_lossy().to_lowercase())
                    .unwrap_or_default();
                name.contains("activity") || name.contains("busy")
            })
            .collect();
        files.sort();
        files.iter().find_map(|f| roots.read_value(f))
    }
}

/// Extracts the active shader clock from a `pp_dpm_sclk` table.
///
/// ```text
/// 0: 500Mhz
/// 1: 1800Mhz *
/// ```
pub fn parse_active_sclk(table: &str) -> Option<f64> {
    let line = table.lines().find(|line| line.contains('*'))?;
    let captures = SCLK_MHZ.captures(line)?;
    captures.get(1)?.as_str().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::testing::FakeSys;

    fn amd(sys: &FakeSys) -> AmdGpu {
        AmdGpu {
            device: sys.path("sys/class/drm/card0/device"),
            hwmon: sys.path("sys/class/drm/card0/device/hwmon/hwmon4"),
        }
    }

    #[test]
    fn test_parse_active_sclk() {
        assert_eq!(
            parse_active_sclk("0: 500Mhz\n1: 1800Mhz *\n2: 2400Mhz\n"),
            Some(1800.0)
        );
        assert_eq!(parse_active_sclk("0: 500Mhz\n1: 800Mhz\n"), None);
    }

    #[test]
    fn test_busy_percent() {
        let sys = FakeSys::new();
        sys.write("sys/class/drm/card0/device/gpu_busy_percent", "42\n");
        sys.mkdir("sys/class/drm/card0/device/hwmon/hwmon4");

        let gpu = amd(&sys).read(&sys.roots());
        assert_eq!(gpu.usage, 42.0);
        assert!(gpu.valid);
        assert_eq!(gpu.vendor, GpuVendor::Amd);
        assert_eq!(gpu.name, "AMD Radeon GPU");
    }

    #[test]
    fn test_usage_from_other_card() {
        let sys = FakeSys::new();
        sys.mkdir("sys/class/drm/card0/device/hwmon/hwmon4");
        sys.write("sys/class/drm/card1/device/gpu_busy_percent", "17");
        sys.write("sys/class/drm/card1-DP-1/device/gpu_busy_percent", "99");

        let gpu = amd(&sys).read(&sys.roots());
        assert_eq!(gpu.usage, 17.0);
    }

    #[test]
    fn test_usage_from_activity_file() {
        let sys = FakeSys::new();
        sys.write("sys/class/drm/card0/device/hwmon/hwmon4/gpu_activity", "63");

        let gpu = amd(&sys).read(&sys.roots());
        assert_eq!(gpu.usage, 63.0);
    }

    #[test]
    fn test_full_reading() {
        let sys = FakeSys::new();
        let dev = "sys/class/drm/card0/device";
        let hw = "sys/class/drm/card0/device/hwmon/hwmon4";
        sys.write(&format!("{dev}/product_name"), "Radeon RX 6800 XT");
        sys.write(&format!("{dev}/pp_dpm_sclk"), "0: 500Mhz\n1: 2250Mhz *\n");
        sys.write(&format!("{dev}/mem_info_vram_used"), "4294967296");
        sys.write(&format!("{dev}/mem_info_vram_total"), "17179869184");
        sys.write(&format!("{hw}/temp1_input"), "52000");
        sys.write(&format!("{hw}/temp1_label"), "edge");
        sys.write(&format!("{hw}/temp2_input"), "65000");
        sys.write(&format!("{hw}/temp2_label"), "junction");
        sys.write(&format!("{hw}/fan1_input"), "1480");
        sys.write(&format!("{hw}/power1_average"), "187000000");
        sys.write(&format!("{hw}/power1_input"), "201000000");

        let gpu = amd(&sys).read(&sys.roots());
        assert_eq!(gpu.name, "Radeon RX 6800 XT");
        assert_eq!(gpu.temperature, 52.0);
        assert_eq!(gpu.frequency, 2250.0);
        assert_eq!(gpu.memory_usage, 25.0);
        assert_eq!(gpu.fan_rpm, 1480);
        assert_eq!(gpu.power, 187.0);
        assert!(gpu.valid);
    }

    #[test]
    fn test_frequency_and_power_fallbacks() {
        let sys = FakeSys::new();
        let hw = "sys/class/drm/card0/device/hwmon/hwmon4";
        sys.write(&format!("{hw}/freq1_input"), "1200000000");
        sys.write(&format!("{hw}/power1_input"), "45000000");

        let gpu = amd(&sys).read(&sys.roots());
        assert_eq!(gpu.frequency, 1200.0);
        assert_eq!(gpu.power, 45.0);
        assert!(gpu.valid);
    }

    #[test]
    fn test_clock_alone_is_valid() {
        let sys = FakeSys::new();
        sys.write(
            "sys/class/drm/card0/device/pp_dpm_sclk",
            "0: 500Mhz *\n1: 2000Mhz\n",
        );
        sys.mkdir("sys/class/drm/card0/device/hwmon/hwmon4");

        let gpu = amd(&sys).read(&sys.roots());
        assert_eq!(gpu.frequency, 500.0);
        assert!(gpu.valid);
    }

    #[test]
    fn test_nothing_readable_is_invalid() {
        let sys = FakeSys::new();
        sys.mkdir("sys/class/drm/card0/device/hwmon/hwmon4");

        let gpu = amd(&sys).read(&sys.roots());
        assert!(!gpu.valid);
        assert_eq!(gpu.frequency, 0.0);
        assert_eq!(gpu.power, 0.0);
    }
}
