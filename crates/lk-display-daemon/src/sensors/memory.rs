//! Memory usage sensor.

use std::path::PathBuf;

use super::{Sensor, SensorRoots};

/// Memory usage sensor backed by /proc/meminfo.
pub struct MemorySensor {
    roots: SensorRoots,
    meminfo: PathBuf,
}

impl MemorySensor {
    /// Creates a new memory sensor.
    pub fn new(roots: SensorRoots) -> Self {
        Self {
            meminfo: roots.proc_path("meminfo"),
            roots,
        }
    }

    /// Extracts (MemTotal, MemAvailable) in kB.
    fn parse_meminfo(content: &str) -> Option<(u64, u64)> {
        let field = |key: &str| {
            content
                .lines()
                .find(|line| line.starts_with(key))
                .and_then(|line| line.split_whitespace().nth(1))
                .and_then(|v| v.parse::<u64>().ok())
        };
        Some((field("MemTotal:")?, field("MemAvailable:")?))
    }
}

impl Sensor for MemorySensor {
    fn sample(&mut self) -> f64 {
        let Some(content) = self.roots.read_string(&self.meminfo) else {
            return 0.0;
        };
        match Self::parse_meminfo(&content) {
            Some((total, available)) if total > 0 => {
                let used = total.saturating_sub(available);
                100.0 * (used as f64 / total as f64)
            }
            _ => 0.0,
        }
    }
}
