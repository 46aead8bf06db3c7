//! Normalized sensor readings.

use lk_display_hw::ComponentLoad;

/// One CPU poll.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CpuReading {
    /// Model name from /proc/cpuinfo
    pub name: String,
    /// Package temperature in °C
    pub temperature: f64,
    /// Utilization percentage (0-100)
    pub usage: f64,
    /// Core clock in MHz
    pub frequency: f64,
    /// Package power in watts
    pub power: f64,
    /// Fan speed in RPM
    pub fan_rpm: u32,
    /// True if usage or temperature came from a real source
    pub valid: bool,
}

/// GPU vendor tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GpuVendor {
    Nvidia,
    Amd,
    Intel,
    #[default]
    None,
}

impl std::fmt::Display for GpuVendor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GpuVendor::Nvidia => write!(f, "nvidia"),
            GpuVendor::Amd => write!(f, "amd"),
            GpuVendor::Intel => write!(f, "intel"),
            GpuVendor::None => write!(f, "none"),
        }
    }
}

/// One GPU poll.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GpuReading {
    pub name: String,
    /// Temperature in °C
    pub temperature: f64,
    /// Utilization percentage (0-100)
    pub usage: f64,
    /// Core clock in MHz
    pub frequency: f64,
    /// VRAM usage percentage (0-100)
    pub memory_usage: f64,
    /// Fan speed in RPM
    pub fan_rpm: u32,
    /// Board power in watts
    pub power: f64,
    pub vendor: GpuVendor,
    /// True if at least one metric came from a real source
    pub valid: bool,
}

impl GpuReading {
    /// Creates an empty, invalid reading tagged with `vendor`.
    pub fn for_vendor(vendor: GpuVendor) -> Self {
        Self {
            vendor,
            ..Default::default()
        }
    }
}

/// Disk usage and temperature.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DiskReading {
    /// Used space percentage (0-100)
    pub usage: f64,
    /// Drive temperature in °C (0 if unknown)
    pub temperature: f64,
}

impl From<&CpuReading> for ComponentLoad {
    fn from(cpu: &CpuReading) -> Self {
        ComponentLoad {
            temperature: cpu.temperature,
            usage: cpu.usage,
            frequency: cpu.frequency,
            fan_rpm: cpu.fan_rpm as f64,
            power: cpu.power,
        }
    }
}

impl From<&GpuReading> for ComponentLoad {
    fn from(gpu: &GpuReading) -> Self {
        ComponentLoad {
            temperature: gpu.temperature,
            usage: gpu.usage,
            frequency: gpu.frequency,
            fan_rpm: gpu.fan_rpm as f64,
            power: gpu.power,
        }
    }
}
