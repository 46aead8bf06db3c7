//! Network throughput sensor.

use std::fs;
use std::time::Instant;
use tracing::info;

use super::SensorRoots;

/// Network throughput sensor.
pub struct NetworkSensor {
    interface: String,
    last_rx: u64,
    last_tx: u64,
    last_time: Option<Instant>,
    last_rx_rate: f64,
    last_tx_rate: f64,
}

impl NetworkSensor {
    /// Creates a new network sensor for a specific interface.
    pub fn new(interface: &str) -> Self {
        info!("Network sensor using interface: {}", interface);
        Self {
            interface: interface.to_string(),
            last_rx: 0,
            last_tx: 0,
            last_time: None,
            last_rx_rate: 0.0,
            last_tx_rate: 0.0,
        }
    }

    /// Creates a new network sensor with auto-detected interface.
    pub fn auto(roots: &SensorRoots) -> Self {
        let interface = Self::detect_interface(roots).unwrap_or_else(|| "eth0".to_string());
        Self::new(&interface)
    }

    /// Detects the primary network interface.
    /// Checks /proc/net/route for the default gateway interface.
    pub fn detect_interface(roots: &SensorRoots) -> Option<String> {
        if let Some(content) = roots.read_string(&roots.proc_path("net/route")) {
            for line in content.lines().skip(1) {
                let fields: Vec<&str> = line.split_whitespace().collect();
                // Default route has destination 00000000
                if fields.len() >= 2 && fields[1] == "00000000" {
                    return Some(fields[0].to_string());
                }
            }
        }

        // Fallback: first non-virtual interface with statistics
        let mut names: Vec<String> = fs::read_dir(roots.sys_path("class/net"))
            .ok()?
            .flatten()
            .map(|e| e.file_name().to_string_lossy().to_string())
            .filter(|name| {
                name != "lo" && !name.starts_with("veth") && !name.starts_with("docker")
            })
            .collect();
        names.sort();
        names.into_iter().find(|name| {
            roots
                .sys_path(&format!("class/net/{}/statistics/rx_bytes", name))
                .exists()
        })
    }

    fn read_stats(&self, roots: &SensorRoots) -> Option<(u64, u64)> {
        let base = format!("class/net/{}/statistics", self.interface);
        let rx = roots.read_value(&roots.sys_path(&format!("{}/rx_bytes", base)))?;
        let tx = roots.read_value(&roots.sys_path(&format!("{}/tx_bytes", base)))?;
        Some((rx as u64, tx as u64))
    }

    /// Updates rates from the interface counters.
    ///
    /// Unreadable counters (interface gone or renamed) report 0 and the next
    /// successful read primes the deltas again.
    pub fn sample(&mut self, roots: &SensorRoots) {
        match self.read_stats(roots) {
            Some((rx, tx)) => self.update(rx, tx, Instant::now()),
            None => self.reset(),
        }
    }

    fn reset(&mut self) {
        self.last_time = None;
        self.last_rx_rate = 0.0;
        self.last_tx_rate = 0.0;
    }

    fn update(&mut self, rx: u64, tx: u64, now: Instant) {
        if let Some(last_time) = self.last_time {
            let elapsed = now.saturating_duration_since(last_time).as_secs_f64();
            if elapsed > 0.0 {
                self.last_rx_rate = rx.saturating_sub(self.last_rx) as f64 / elapsed;
                self.last_tx_rate = tx.saturating_sub(self.last_tx) as f64 / elapsed;
            }
        }

        self.last_rx = rx;
        self.last_tx = tx;
        self.last_time = Some(now);
    }

    /// Returns the current RX (download) rate in bytes/second.
    pub fn rx_rate(&self) -> f64 {
        self.last_rx_rate
    }

    /// Returns the current TX (upload) rate in bytes/second.
    pub fn tx_rate(&self) -> f64 {
        self.last_tx_rate
    }

    /// Returns the network interface name.
    pub fn interface_name(&self) -> &str {
        &self.interface
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::testing::FakeSys;
    use std::time::Duration;

    #[test]
    fn test_detect_default_route() {
        let sys = FakeSys::new();
        sys.write(
            "proc/net/route",
            "Iface\tDestination\tGateway\n\
             docker0\t0011A8C0\t00000000\n\
             enp5s0\t00000000\t0101A8C0\n",
        );
        assert_eq!(
            NetworkSensor::detect_interface(&sys.roots()).as_deref(),
            Some("enp5s0")
        );
    }

    #[test]
    fn test_detect_fallback_to_sysfs() {
        let sys = FakeSys::new();
        sys.write("sys/class/net/lo/statistics/rx_bytes", "0");
        sys.write("sys/class/net/wlan0/statistics/rx_bytes", "0");
        sys.mkdir("sys/class/net/dummy0");
        assert_eq!(
            NetworkSensor::detect_interface(&sys.roots()).as_deref(),
            Some("wlan0")
        );
    }

    #[test]
    fn test_rates() {
        let mut sensor = NetworkSensor::new("eth0");
        let start = Instant::now();

        sensor.update(1_000, 500, start);
        assert_eq!(sensor.rx_rate(), 0.0);

        sensor.update(5_000, 2_500, start + Duration::from_secs(2));
        assert_eq!(sensor.rx_rate(), 2_000.0);
        assert_eq!(sensor.tx_rate(), 1_000.0);
    }

    #[test]
    fn test_sample_reads_counters() {
        let sys = FakeSys::new();
        sys.write("sys/class/net/eth0/statistics/rx_bytes", "100\n");
        sys.write("sys/class/net/eth0/statistics/tx_bytes", "200\n");
        let roots = sys.roots();

        let mut sensor = NetworkSensor::new("eth0");
        sensor.sample(&roots);
        assert_eq!(sensor.last_rx, 100);
        assert_eq!(sensor.last_tx, 200);
        assert_eq!(sensor.interface_name(), "eth0");
    }

    #[test]
    fn test_vanished_interface_reports_zero() {
        let sys = FakeSys::new();
        sys.write("sys/class/net/eth0/statistics/rx_bytes", "0");
        sys.write("sys/class/net/eth0/statistics/tx_bytes", "0");
        let roots = sys.roots();

        let mut sensor = NetworkSensor::new("eth0");
        sensor.sample(&roots);
        std::thread::sleep(Duration::from_millis(20));
        sys.write("sys/class/net/eth0/statistics/rx_bytes", "1000000");
        sys.write("sys/class/net/eth0/statistics/tx_bytes", "500000");
        sensor.sample(&roots);
        assert!(sensor.rx_rate() > 0.0);
        assert!(sensor.tx_rate() > 0.0);

        std::fs::remove_dir_all(sys.path("sys/class/net/eth0")).unwrap();
        for _ in 0..3 {
            sensor.sample(&roots);
            assert_eq!(sensor.rx_rate(), 0.0);
            assert_eq!(sensor.tx_rate(), 0.0);
        }

        // Back again: the first read only primes
        sys.write("sys/class/net/eth0/statistics/rx_bytes", "2000000");
        sys.write("sys/class/net/eth0/statistics/tx_bytes", "900000");
        sensor.sample(&roots);
        assert_eq!(sensor.rx_rate(), 0.0);
        assert_eq!(sensor.last_rx, 2_000_000);
    }
}
