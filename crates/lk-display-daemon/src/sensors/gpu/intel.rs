//! Intel GPU readings from i915 sysfs.
//!
//! Only clock and temperature. There is no busy counter we can rely on, so
//! utilization stays 0.

use std::fs;
use std::path::PathBuf;

use crate::sensors::data::{GpuReading, GpuVendor};
use crate::sensors::SensorRoots;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntelGpu {
    /// `/sys/class/drm/cardN`
    pub card: PathBuf,
    /// `/sys/class/drm/cardN/device`
    pub device: PathBuf,
}

impl IntelGpu {
    pub fn read(&self, roots: &SensorRoots) -> GpuReading {
        let mut data = GpuReading {
            name: "Intel Graphics".to_string(),
            ..GpuReading::for_vendor(GpuVendor::Intel)
        };

        let freq = [&self.card, &self.device]
            .iter()
            .find_map(|dir| roots.read_value(&dir.join("gt_cur_freq_mhz")));
        if let Some(mhz) = freq {
            data.frequency = mhz;
            data.valid = true;
        }

        if let Some(celsius) = self.read_temperature(roots) {
            data.temperature = celsius;
            data.valid = true;
        }

        data
    }

    fn read_temperature(&self, roots: &SensorRoots) -> Option<f64> {
        let mut chips: Vec<PathBuf> = fs::read_dir(self.device.join("hwmon"))
            .ok()?
            .flatten()
            .map(|e| e.path())
            .collect();
        chips.sort();
        chips
            .iter()
            .find_map(|chip| roots.read_value(&chip.join("temp1_input")))
            .map(|millis| millis / 1000.0)
    }
}
