//! Index of kernel hardware-monitoring chips under /sys/class/hwmon.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::SensorRoots;

/// CPU temperature chips in priority order.
pub const CPU_TEMP_CHIPS: &[&str] = &[
    "coretemp", "k10temp", "zenpower", "it87", "nct6775", "acpitz",
];

/// Channel labels that identify a package-level CPU temperature.
pub const CPU_TEMP_LABELS: &[&str] = &["package", "tctl", "tdie"];

/// Motherboard super-I/O chips that report the CPU fan.
pub const CPU_FAN_CHIPS: &[&str] = &["nct6775", "nct6779", "nct6683", "it87"];

/// Chips that report drive temperatures.
pub const DISK_TEMP_CHIPS: &[&str] = &["nvme", "drivetemp"];

/// Highest tempN/fanN index probed.
const MAX_CHANNEL: usize = 9;

/// A sensor chip and its sysfs directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HwmonChip {
    pub name: String,
    pub path: PathBuf,
}

/// Name to directory mapping, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct HwmonIndex {
    chips: Vec<HwmonChip>,
}

impl HwmonIndex {
    /// Scans `<sys>/class/hwmon`.
    pub fn scan(roots: &SensorRoots) -> Self {
        let base = roots.sys_path("class/hwmon");
        let mut dirs: Vec<PathBuf> = match fs::read_dir(&base) {
            Ok(entries) => entries.flatten().map(|e| e.path()).collect(),
            Err(_) => {
                warn!("{} not found", base.display());
                return Self::default();
            }
        };
        dirs.sort();

        let chips = dirs
            .into_iter()
            .filter_map(|path| {
                let name = roots.read_string(&path.join("name"))?;
                info!("Found hwmon device: {} at {}", name, path.display());
                Some(HwmonChip { name, path })
            })
            .collect();

        Self { chips }
    }

    /// Returns the first chip registered under `name`.
    pub fn get(&self, name: &str) -> Option<&Path> {
        self.chips
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.path.as_path())
    }

    /// Returns the first chip matching any of `names`, in the order given.
    pub fn first_of(&self, names: &[&str]) -> Option<&Path> {
        names.iter().find_map(|name| self.get(name))
    }

    /// Resolves the chip that reports CPU temperature.
    ///
    /// Known CPU chips win in priority order; otherwise the first chip with
    /// any temperature channel.
    pub fn cpu_temp_chip(&self) -> Option<&Path> {
        self.first_of(CPU_TEMP_CHIPS).or_else(|| {
            self.chips
                .iter()
                .find(|c| has_temp_channel(&c.path))
                .map(|c| c.path.as_path())
        })
    }

    pub fn chips(&self) -> &[HwmonChip] {
        &self.chips
    }

    pub fn len(&self) -> usize {
        self.chips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chips.is_empty()
    }
}

/// Returns true if `chip` exposes any `tempN_input`.
pub fn has_temp_channel(chip: &Path) -> bool {
    (1..=MAX_CHANNEL).any(|i| chip.join(format!("temp{}_input", i)).exists())
}

/// Reads a temperature in °C from `chip`.
///
/// A channel whose label contains one of `labels` (case-insensitive) is
/// returned immediately. Otherwise the first readable channel is used.
pub fn read_preferred_temp(roots: &SensorRoots, chip: &Path, labels: &[&str]) -> Option<f64> {
    let mut fallback = None;

    for i in 1..=MAX_CHANNEL {
        let Some(millis) = roots.read_value(&chip.join(format!("temp{}_input", i))) else {
            continue;
        };
        let celsius = millis / 1000.0;

        let label = roots
            .read_string(&chip.join(format!("temp{}_label", i)))
            .unwrap_or_default()
            .to_lowercase();
        if labels.iter().any(|l| label.contains(l)) {
            return Some(celsius);
        }
        if fallback.is_none() {
            fallback = Some(celsius);
        }
    }

    fallback
}

/// Iterates over readable `fanN_input` values in RPM.
pub fn read_fans<'a>(roots: &'a SensorRoots, chip: &'a Path) -> impl Iterator<Item = f64> + 'a {
    (1..=MAX_CHANNEL).filter_map(move |i| roots.read_value(&chip.join(format!("fan{}_input", i))))
}
