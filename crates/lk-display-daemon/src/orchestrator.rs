//! The update loop: sample sensors, fill the snapshot, push it to every display.

use lk_display_hw::{ComponentLoad, DeviceBackend, DeviceManager, Error, Snapshot};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{debug, error, info};

use crate::config::Config;
use crate::sensors::Sensors;

/// CPU samples discarded before the first report.
pub const WARMUP_SAMPLES: usize = 3;

/// Spacing between warm-up samples.
pub const WARMUP_DELAY: Duration = Duration::from_millis(200);

/// Sleep before rescanning when no display is connected.
pub const NO_DEVICE_BACKOFF: Duration = Duration::from_secs(5);

/// Loop parameters taken from the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub refresh_delay: Duration,
    pub display_mode: u8,
}

impl From<&Config> for Settings {
    fn from(config: &Config) -> Self {
        Self {
            refresh_delay: Duration::from_millis(config.refresh_delay),
            display_mode: config.display_mode,
        }
    }
}

/// Result of one loop iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Nothing connected; sensors were not read.
    NoDevices,
    /// At least one display took the report.
    Sent,
    /// Displays are open but none accepted a full report.
    NotSent,
}

pub struct Orchestrator<B: DeviceBackend> {
    settings: Settings,
    sensors: Sensors,
    devices: DeviceManager<B>,
    snapshot: Snapshot,
    running: Arc<AtomicBool>,
    backoff: Duration,
    warmup_delay: Duration,
}

impl<B: DeviceBackend> Orchestrator<B> {
    pub fn new(settings: Settings, sensors: Sensors, devices: DeviceManager<B>) -> Self {
        Self {
            settings,
            sensors,
            devices,
            snapshot: Snapshot::new(),
            running: Arc::new(AtomicBool::new(true)),
            backoff: NO_DEVICE_BACKOFF,
            warmup_delay: WARMUP_DELAY,
        }
    }

    /// Overrides the no-device backoff and warm-up spacing.
    pub fn with_backoff(mut self, backoff: Duration, warmup_delay: Duration) -> Self {
        self.backoff = backoff;
        self.warmup_delay = warmup_delay;
        self
    }

    /// The flag the loop checks once per iteration.
    pub fn running(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    pub fn devices(&self) -> &DeviceManager<B> {
        &self.devices
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Opens the displays. Finding none at startup is the only fatal error.
    pub fn start(&mut self) -> lk_display_hw::Result<usize> {
        let opened = self.devices.open_all();
        if opened == 0 {
            error!("No supported display could be opened");
            error!("Check that the display is connected (lsusb should list 1b80:b538 or 0145:1005)");
            error!("Check permissions on /dev/hidraw* (run as root or install a udev rule)");
            error!("Run with --scan to list detected devices");
            return Err(Error::NoDisplay);
        }
        info!("Opened {} display(s)", opened);
        Ok(opened)
    }

    /// Clears the running flag on SIGINT or SIGTERM.
    fn listen_for_signals(&self) -> std::io::Result<()> {
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        let running = self.running.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                _ = sigint.recv() => info!("Received SIGINT, shutting down"),
            }
            running.store(false, Ordering::SeqCst);
        });
        Ok(())
    }

    /// Primes the CPU usage tracker, whose first samples carry no delta.
    pub async fn warm_up(&mut self) {
        for _ in 0..WARMUP_SAMPLES {
            self.sensors.sample_cpu_usage();
            tokio::time::sleep(self.warmup_delay).await;
        }
        debug!("Warm-up complete");
    }

    /// Runs one iteration without the trailing refresh sleep.
    pub async fn cycle(&mut self) -> CycleOutcome {
        if self.devices.active_count() == 0 && self.devices.open_all() == 0 {
            debug!("No display connected, retrying in {:?}", self.backoff);
            tokio::time::sleep(self.backoff).await;
            return CycleOutcome::NoDevices;
        }

        let cpu = self.sensors.read_cpu();
        let gpu = self.sensors.read_gpu().await;
        let memory = self.sensors.read_memory();
        let disk = self.sensors.read_disk();
        let (upload, download) = self.sensors.read_network();

        self.snapshot.set_cpu(ComponentLoad::from(&cpu));
        // An unreadable GPU still sends its fields, as zeros
        self.snapshot.set_gpu(if gpu.valid {
            ComponentLoad::from(&gpu)
        } else {
            ComponentLoad::default()
        });
        self.snapshot.set_memory(memory, 0.0);
        self.snapshot.set_disk(disk.usage, disk.temperature);
        self.snapshot.set_network(upload, download);
        self.snapshot.set_display_mode(self.settings.display_mode);

        debug!(
            "CPU {:.0}°C {:.1}% {:.0}MHz | GPU({}) {:.0}°C {:.1}% {:.0}MHz | MEM {:.1}% | DISK {:.1}% | NET up {:.0}B/s down {:.0}B/s",
            cpu.temperature,
            cpu.usage,
            cpu.frequency,
            gpu.vendor,
            gpu.temperature,
            gpu.usage,
            gpu.frequency,
            memory,
            disk.usage,
            upload,
            download
        );

        if self.devices.transmit(&self.snapshot) {
            CycleOutcome::Sent
        } else {
            CycleOutcome::NotSent
        }
    }

    /// Runs until a termination signal arrives, then closes every display.
    pub async fn run(&mut self) -> lk_display_hw::Result<()> {
        self.start()?;
        self.listen_for_signals()?;
        self.warm_up().await;

        info!(
            "Updating every {:?} (GPU: {})",
            self.settings.refresh_delay,
            self.sensors.gpu_vendor()
        );

        while self.running.load(Ordering::SeqCst) {
            if self.cycle().await == CycleOutcome::NoDevices {
                continue;
            }
            tokio::time::sleep(self.settings.refresh_delay).await;
        }

        self.devices.close_all();
        info!("Stopped");
        Ok(())
    }
}
