//! CPU usage, temperature, clock, fan and power.

use std::path::PathBuf;
use std::time::Instant;
use tracing::debug;

use super::data::CpuReading;
use super::hwmon::{self, HwmonIndex, CPU_FAN_CHIPS, CPU_TEMP_LABELS};
use super::{Sensor, SensorRoots};

/// Cumulative idle and total jiffies from the aggregate `cpu` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuTimes {
    /// idle + iowait
    pub idle: u64,
    /// Sum of the first ten fields
    pub total: u64,
}

impl CpuTimes {
    /// Parses the first line of /proc/stat.
    ///
    /// Fields: user nice system idle iowait irq softirq steal guest guest_nice
    pub fn parse(stat: &str) -> Option<Self> {
        let line = stat.lines().next()?;
        let mut parts = line.split_whitespace();
        if parts.next()? != "cpu" {
            return None;
        }
        let fields: Vec<u64> = parts.take(10).map_while(|s| s.parse().ok()).collect();
        if fields.len() < 5 {
            return None;
        }

        Some(Self {
            idle: fields[3] + fields[4],
            total: fields.iter().sum(),
        })
    }
}

/// Delta-based CPU utilization.
///
/// The first successful sample only primes the counters and returns 0.0,
/// so callers should discard a few samples before trusting the output.
pub struct CpuUsageTracker {
    roots: SensorRoots,
    stat_path: PathBuf,
    last: Option<CpuTimes>,
}

impl CpuUsageTracker {
    pub fn new(roots: &SensorRoots) -> Self {
        Self {
            stat_path: roots.proc_path("stat"),
            roots: roots.clone(),
            last: None,
        }
    }

    fn read_times(&self) -> Option<CpuTimes> {
        let content = self.roots.read_string(&self.stat_path)?;
        CpuTimes::parse(&content)
    }

    /// Folds a new counter pair into the tracker and returns utilization.
    pub fn update(&mut self, now: CpuTimes) -> f64 {
        let Some(prev) = self.last.replace(now) else {
            return 0.0;
        };

        let idle_delta = now.idle as i128 - prev.idle as i128;
        let total_delta = now.total as i128 - prev.total as i128;
        if total_delta <= 0 {
            return 0.0;
        }

        let usage = 100.0 * (1.0 - idle_delta as f64 / total_delta as f64);
        usage.clamp(0.0, 100.0)
    }
}

impl Sensor for CpuUsageTracker {
    /// A failed read returns 0.0 and leaves the counters untouched.
    fn sample(&mut self) -> f64 {
        match self.read_times() {
            Some(now) => self.update(now),
            None => 0.0,
        }
    }
}

/// Package power from RAPL energy counters.
pub struct RaplMeter {
    path: Option<PathBuf>,
    last: Option<(f64, Instant)>,
}

impl RaplMeter {
    pub fn new(roots: &SensorRoots) -> Self {
        let path = [
            "class/powercap/intel-rapl:0/energy_uj",
            "class/powercap/intel-rapl/intel-rapl:0/energy_uj",
        ]
        .iter()
        .map(|rel| roots.sys_path(rel))
        .find(|p| p.exists());

        if let Some(path) = &path {
            debug!("Using RAPL energy counter at {}", path.display());
        }
        Self { path, last: None }
    }

    /// Returns watts since the previous sample, if any.
    pub fn sample(&mut self, roots: &SensorRoots) -> Option<f64> {
        let energy = roots.read_value(self.path.as_ref()?)?;
        self.update(energy, Instant::now())
    }

    /// Folds a new energy reading (µJ) taken at `at` into the meter.
    pub fn update(&mut self, energy_uj: f64, at: Instant) -> Option<f64> {
        let (prev_energy, prev_at) = self.last.replace((energy_uj, at))?;
        let elapsed = at.saturating_duration_since(prev_at).as_secs_f64();
        // Counter wrapped or no time passed
        if elapsed <= 0.0 || energy_uj < prev_energy {
            return None;
        }
        Some((energy_uj - prev_energy) / elapsed / 1_000_000.0)
    }
}

/// Gathers a full CPU reading each cycle.
pub struct CpuMonitor {
    name: String,
    tracker: CpuUsageTracker,
    rapl: RaplMeter,
}

impl CpuMonitor {
    pub fn new(roots: &SensorRoots) -> Self {
        Self {
            name: read_model_name(roots).unwrap_or_else(|| "Unknown CPU".to_string()),
            tracker: CpuUsageTracker::new(roots),
            rapl: RaplMeter::new(roots),
        }
    }

    pub fn tracker_mut(&mut self) -> &mut CpuUsageTracker {
        &mut self.tracker
    }

    pub fn read(&mut self, roots: &SensorRoots, hwmon: &HwmonIndex) -> CpuReading {
        let mut data = CpuReading {
            name: self.name.clone(),
            ..Default::default()
        };

        data.usage = self.tracker.sample();
        if data.usage > 0.0 {
            data.valid = true;
        }

        // scaling_cur_freq is in kHz
        if let Some(khz) =
            roots.read_value(&roots.sys_path("devices/system/cpu/cpu0/cpufreq/scaling_cur_freq"))
        {
            data.frequency = khz / 1000.0;
        }

        if let Some(chip) = hwmon.cpu_temp_chip() {
            if let Some(temp) = hwmon::read_preferred_temp(roots, chip, CPU_TEMP_LABELS) {
                data.temperature = temp;
                data.valid = true;
            }
        }

        data.fan_rpm = CPU_FAN_CHIPS
            .iter()
            .filter_map(|name| hwmon.get(name))
            .flat_map(|chip| hwmon::read_fans(roots, chip))
            .find(|rpm| *rpm > 0.0)
            .map(|rpm| rpm as u32)
            .unwrap_or(0);

        if let Some(watts) = self.rapl.sample(roots) {
            data.power = watts;
        }

        data
    }
}

fn read_model_name(roots: &SensorRoots) -> Option<String> {
    let content = roots.read_string(&roots.proc_path("cpuinfo"))?;
    content
        .lines()
        .find(|line| line.starts_with("model name"))
        .and_then(|line| line.split(':').nth(1))
        .map(|name| name.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::testing::FakeSys;
    use std::time::Duration;

    fn times(idle: u64, total: u64) -> CpuTimes {
        CpuTimes { idle, total }
    }

    #[test]
    fn test_parse_stat() {
        let stat = "cpu  10 20 30 40 50 60 70 80 90 100 110\ncpu0 1 2 3 4 5 6 7 8 9 10\n";
        let t = CpuTimes::parse(stat).unwrap();
        assert_eq!(t.idle, 90);
        // Only the first ten fields count
        assert_eq!(t.total, 550);

        assert!(CpuTimes::parse("intr 1 2 3").is_none());
        assert!(CpuTimes::parse("cpu 1 2").is_none());
    }

    #[test]
    fn test_first_sample_is_zero() {
        let sys = FakeSys::new();
        let mut tracker = CpuUsageTracker::new(&sys.roots());
        assert_eq!(tracker.update(times(0, 100)), 0.0);
    }

    #[test]
    fn test_usage_from_deltas() {
        let sys = FakeSys::new();
        let mut tracker = CpuUsageTracker::new(&sys.roots());
        tracker.update(times(100, 1000));
        assert_eq!(tracker.update(times(150, 1200)), 75.0);
    }

    #[test]
    fn test_non_positive_total_delta() {
        let sys = FakeSys::new();
        let mut tracker = CpuUsageTracker::new(&sys.roots());
        tracker.update(times(100, 1000));
        assert_eq!(tracker.update(times(100, 1000)), 0.0);
        // Counter reset
        assert_eq!(tracker.update(times(10, 50)), 0.0);
    }

    #[test]
    fn test_usage_stays_in_range() {
        let sys = FakeSys::new();
        let mut tracker = CpuUsageTracker::new(&sys.roots());
        tracker.update(times(500, 1000));
        // idle grew more than total
        assert_eq!(tracker.update(times(900, 1100)), 0.0);
        // idle went backwards
        assert_eq!(tracker.update(times(800, 1200)), 100.0);

        for (idle, total) in [(850, 1300), (1000, 1500), (1000, 1600)] {
            let usage = tracker.update(times(idle, total));
            assert!((0.0..=100.0).contains(&usage));
        }
    }

    #[test]
    fn test_sample_reads_proc_stat() {
        let sys = FakeSys::new();
        let mut tracker = CpuUsageTracker::new(&sys.roots());

        // Unreadable source: 0.0 and no state change
        assert_eq!(tracker.sample(), 0.0);

        // idle+iowait = 100, total = 1000
        sys.write("proc/stat", "cpu 500 0 400 90 10 0 0 0 0 0\n");
        assert_eq!(tracker.sample(), 0.0);

        // idle+iowait = 150, total = 1200
        sys.write("proc/stat", "cpu 600 0 450 140 10 0 0 0 0 0\n");
        assert_eq!(tracker.sample(), 75.0);
    }

    #[test]
    fn test_rapl_power() {
        let sys = FakeSys::new();
        let mut meter = RaplMeter::new(&sys.roots());
        let start = Instant::now();

        assert_eq!(meter.update(1_000_000.0, start), None);
        let watts = meter
            .update(31_000_000.0, start + Duration::from_secs(2))
            .unwrap();
        assert!((watts - 15.0).abs() < 1e-9);
        // Wraparound
        assert_eq!(meter.update(5.0, start + Duration::from_secs(3)), None);
    }

    #[test]
    fn test_cpu_reading() {
        let sys = FakeSys::new();
        sys.write(
            "proc/cpuinfo",
            "processor\t: 0\nmodel name\t: AMD Ryzen 7 5800X 8-Core Processor\n",
        );
        sys.write(
            "sys/devices/system/cpu/cpu0/cpufreq/scaling_cur_freq",
            "3800000\n",
        );
        sys.write("sys/class/hwmon/hwmon0/name", "k10temp");
        sys.write("sys/class/hwmon/hwmon0/temp1_input", "61500");
        sys.write("sys/class/hwmon/hwmon0/temp1_label", "Tctl");
        sys.write("sys/class/hwmon/hwmon1/name", "nct6775");
        sys.write("sys/class/hwmon/hwmon1/fan1_input", "0");
        sys.write("sys/class/hwmon/hwmon1/fan2_input", "1150");

        let roots = sys.roots();
        let hwmon = HwmonIndex::scan(&roots);
        let mut monitor = CpuMonitor::new(&roots);
        let reading = monitor.read(&roots, &hwmon);

        assert_eq!(reading.name, "AMD Ryzen 7 5800X 8-Core Processor");
        assert_eq!(reading.frequency, 3800.0);
        assert_eq!(reading.temperature, 61.5);
        assert_eq!(reading.fan_rpm, 1150);
        assert_eq!(reading.usage, 0.0);
        assert!(reading.valid);
    }

    #[test]
    fn test_cpu_reading_without_sources() {
        let sys = FakeSys::new();
        let roots = sys.roots();
        let mut monitor = CpuMonitor::new(&roots);
        let reading = monitor.read(&roots, &HwmonIndex::default());
        assert_eq!(reading.name, "Unknown CPU");
        assert!(!reading.valid);
    }
}
