//! System sensors module.
//!
//! Discovers CPU/GPU sensor sources once at startup and turns the kernel's
//! vendor-specific interfaces into normalized readings.

#![allow(dead_code, unused_imports)]

mod cpu;
pub mod data;
mod disk;
pub mod gpu;
mod hwmon;
mod memory;
mod network;

pub use cpu::{CpuMonitor, CpuTimes, CpuUsageTracker, RaplMeter};
pub use data::{CpuReading, DiskReading, GpuReading, GpuVendor};
pub use disk::DiskSensor;
pub use gpu::GpuBackend;
pub use hwmon::HwmonIndex;
pub use memory::MemorySensor;
pub use network::NetworkSensor;

use std::cell::RefCell;
use std::collections::HashSet;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{debug, info, warn};

use crate::config::Config;

/// Trait for percentage-style sensors.
pub trait Sensor {
    /// Samples the current value in percent.
    fn sample(&mut self) -> f64;
}

/// Filesystem roots for sensor sources, plus the soft-fail read helpers
/// every reader goes through.
///
/// Clones share the set of paths already reported as denied.
#[derive(Debug, Clone)]
pub struct SensorRoots {
    sys: PathBuf,
    proc: PathBuf,
    denied: Rc<RefCell<HashSet<PathBuf>>>,
}

impl Default for SensorRoots {
    fn default() -> Self {
        Self::new("/sys", "/proc")
    }
}

impl SensorRoots {
    pub fn new(sys: impl Into<PathBuf>, proc: impl Into<PathBuf>) -> Self {
        Self {
            sys: sys.into(),
            proc: proc.into(),
            denied: Rc::new(RefCell::new(HashSet::new())),
        }
    }

    /// Joins a path relative to the sysfs root.
    pub fn sys_path(&self, rel: &str) -> PathBuf {
        self.sys.join(rel)
    }

    /// Joins a path relative to the procfs root.
    pub fn proc_path(&self, rel: &str) -> PathBuf {
        self.proc.join(rel)
    }

    /// Reads a trimmed string. Absent or unreadable sources yield `None`;
    /// permission problems are reported once per path.
    pub fn read_string(&self, path: &Path) -> Option<String> {
        match fs::read_to_string(path) {
            Ok(content) => Some(content.trim().to_string()),
            Err(e) => {
                self.read_failed(path, &e);
                None
            }
        }
    }

    fn read_failed(&self, path: &Path, err: &io::Error) {
        match err.kind() {
            ErrorKind::NotFound => {}
            ErrorKind::PermissionDenied => {
                if self.denied.borrow_mut().insert(path.to_path_buf()) {
                    warn!("Permission denied reading {}", path.display());
                } else {
                    debug!("Permission denied reading {}", path.display());
                }
            }
            _ => debug!("Failed to read {}: {}", path.display(), err),
        }
    }

    /// Reads one numeric sensor value.
    pub fn read_value(&self, path: &Path) -> Option<f64> {
        let content = self.read_string(path)?;
        match content.parse::<f64>() {
            Ok(value) => Some(value),
            Err(_) => {
                debug!("Unparsable value in {}: {:?}", path.display(), content);
                None
            }
        }
    }
}

/// All sensor sources, resolved once at startup.
pub struct Sensors {
    roots: SensorRoots,
    hwmon: HwmonIndex,
    cpu: CpuMonitor,
    gpu: GpuBackend,
    memory: MemorySensor,
    disk: DiskSensor,
    network: NetworkSensor,
}

impl Sensors {
    /// Probes the system: GPU vendor, hwmon chips, network interface.
    pub async fn discover(roots: SensorRoots, config: &Config) -> Self {
        let gpu = GpuBackend::detect(&roots, config.gpu.nvidia_smi()).await;
        let network = if config.network.interface == "auto" {
            NetworkSensor::auto(&roots)
        } else {
            NetworkSensor::new(&config.network.interface)
        };
        Self::new(roots, gpu, &config.disk.mount, network)
    }

    /// Assembles sensors around an already-detected GPU backend.
    pub fn new(roots: SensorRoots, gpu: GpuBackend, mount: &str, network: NetworkSensor) -> Self {
        let hwmon = HwmonIndex::scan(&roots);
        info!(
            "Sensors ready: {} hwmon chip(s), GPU vendor {}",
            hwmon.len(),
            gpu.vendor()
        );

        Self {
            cpu: CpuMonitor::new(&roots),
            memory: MemorySensor::new(roots.clone()),
            disk: DiskSensor::new(mount),
            roots,
            hwmon,
            gpu,
            network,
        }
    }

    /// Takes a CPU usage sample without building a full reading.
    pub fn sample_cpu_usage(&mut self) -> f64 {
        self.cpu.tracker_mut().sample()
    }

    pub fn read_cpu(&mut self) -> CpuReading {
        self.cpu.read(&self.roots, &self.hwmon)
    }

    pub async fn read_gpu(&self) -> GpuReading {
        self.gpu.read(&self.roots).await
    }

    pub fn read_memory(&mut self) -> f64 {
        self.memory.sample()
    }

    pub fn read_disk(&mut self) -> DiskReading {
        DiskReading {
            usage: self.disk.sample(),
            temperature: self.disk.temperature(&self.roots, &self.hwmon),
        }
    }

    /// Returns (upload, download) in bytes/second.
    pub fn read_network(&mut self) -> (f64, f64) {
        self.network.sample(&self.roots);
        (self.network.tx_rate(), self.network.rx_rate())
    }

    pub fn gpu_vendor(&self) -> GpuVendor {
        self.gpu.vendor()
    }
}
