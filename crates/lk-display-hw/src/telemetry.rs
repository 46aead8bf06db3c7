//! Normalized telemetry snapshot consumed by the report encoder.
//!
//! Every field already has its wire width. Setters take raw readings and
//! saturate them into range, so a snapshot is always encodable as-is.

/// Raw readings for one processing unit (CPU or GPU).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ComponentLoad {
    /// Temperature in °C.
    pub temperature: f64,
    /// Utilization in percent.
    pub usage: f64,
    /// Clock in MHz.
    pub frequency: f64,
    /// Fan speed in RPM.
    pub fan_rpm: f64,
    /// Power draw in watts.
    pub power: f64,
}

/// The single record encoded into every report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub cpu_temp: u8,
    pub cpu_usage: u8,
    pub cpu_freq: u16,
    pub cpu_fan_rpm: u16,
    pub cpu_power: u16,

    pub gpu_temp: u8,
    pub gpu_usage: u8,
    pub gpu_freq: u16,
    pub gpu_fan_rpm: u16,
    pub gpu_power: u16,

    pub mem_usage: u8,
    pub mem_temp: u8,

    pub disk_usage: u8,
    pub disk_temp: u8,

    /// Upload rate in bytes/second.
    pub net_upload: u32,
    /// Download rate in bytes/second.
    pub net_download: u32,

    pub display_mode: u8,
}

impl Snapshot {
    /// Creates an all-zero snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores CPU readings.
    pub fn set_cpu(&mut self, load: ComponentLoad) {
        self.cpu_temp = clamp_u8(load.temperature, u8::MAX);
        self.cpu_usage = clamp_u8(load.usage, 100);
        self.cpu_freq = clamp_u16(load.frequency);
        self.cpu_fan_rpm = clamp_u16(load.fan_rpm);
        self.cpu_power = clamp_u16(load.power);
    }

    /// Stores GPU readings.
    pub fn set_gpu(&mut self, load: ComponentLoad) {
        self.gpu_temp = clamp_u8(load.temperature, u8::MAX);
        self.gpu_usage = clamp_u8(load.usage, 100);
        self.gpu_freq = clamp_u16(load.frequency);
        self.gpu_fan_rpm = clamp_u16(load.fan_rpm);
        self.gpu_power = clamp_u16(load.power);
    }

    /// Stores memory usage (percent) and temperature (°C).
    pub fn set_memory(&mut self, usage: f64, temperature: f64) {
        self.mem_usage = clamp_u8(usage, 100);
        self.mem_temp = clamp_u8(temperature, u8::MAX);
    }

    /// Stores disk usage (percent) and temperature (°C).
    pub fn set_disk(&mut self, usage: f64, temperature: f64) {
        self.disk_usage = clamp_u8(usage, 100);
        self.disk_temp = clamp_u8(temperature, u8::MAX);
    }

    /// Stores network rates in bytes/second.
    pub fn set_network(&mut self, upload: f64, download: f64) {
        self.net_upload = clamp_u32(upload);
        self.net_download = clamp_u32(download);
    }

    /// Selects the screen layout on displays that support it.
    pub fn set_display_mode(&mut self, mode: u8) {
        self.display_mode = mode;
    }
}

/// Truncates toward zero and saturates to `0..=max`. NaN maps to 0.
pub fn clamp_u8(value: f64, max: u8) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.clamp(0.0, max as f64) as u8
}

/// Truncates toward zero and saturates to `0..=65535`.
pub fn clamp_u16(value: f64) -> u16 {
    if value.is_nan() {
        return 0;
    }
    value.clamp(0.0, u16::MAX as f64) as u16
}

/// Truncates toward zero and saturates to the 32-bit range.
pub fn clamp_u32(value: f64) -> u32 {
    if value.is_nan() {
        return 0;
    }
    value.clamp(0.0, u32::MAX as f64) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_saturates() {
        let mut snapshot = Snapshot::new();
        snapshot.set_cpu(ComponentLoad {
            usage: 150.0,
            ..Default::default()
        });
        assert_eq!(snapshot.cpu_usage, 100);

        snapshot.set_cpu(ComponentLoad {
            usage: -10.0,
            ..Default::default()
        });
        assert_eq!(snapshot.cpu_usage, 0);
    }

    #[test]
    fn test_wide_fields_saturate() {
        let mut snapshot = Snapshot::new();
        snapshot.set_gpu(ComponentLoad {
            temperature: 300.0,
            usage: 42.9,
            frequency: 70000.0,
            fan_rpm: -5.0,
            power: 120.5,
        });
        assert_eq!(snapshot.gpu_temp, 255);
        assert_eq!(snapshot.gpu_usage, 42);
        assert_eq!(snapshot.gpu_freq, 65535);
        assert_eq!(snapshot.gpu_fan_rpm, 0);
        assert_eq!(snapshot.gpu_power, 120);

        snapshot.set_network(5e12, f64::NAN);
        assert_eq!(snapshot.net_upload, u32::MAX);
        assert_eq!(snapshot.net_download, 0);
    }
}
