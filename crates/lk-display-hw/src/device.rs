//! Display discovery and connection lifecycle.
//!
//! Each display moves through `Identified -> Open -> Initialized -> Streaming`.
//! A write that fails with `ENODEV` drops the handle (closing its descriptor);
//! the device has to be discovered and initialized again afterwards.

use std::collections::{BTreeMap, HashSet};
use std::io;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::protocol::{
    build_command_packet, build_packet, DeviceFamily, WallClock, INIT_COMMAND_DELAY_MS,
    REPORT_SIZE,
};
use crate::telemetry::Snapshot;
use crate::{lookup_device, Error, Result, SupportedDevice};

/// Minimum spacing between repeated transient-error logs for one device.
const ERROR_LOG_INTERVAL: Duration = Duration::from_secs(60);

/// Identification data for one HID node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Node path, e.g. `/dev/hidraw3`.
    pub path: String,
    pub bus_type: u32,
    pub vendor_id: u16,
    pub product_id: u16,
    /// Name reported by the device.
    pub name: String,
}

impl DeviceInfo {
    /// Returns the supported-device entry matching this node, if any.
    pub fn supported(&self) -> Option<&'static SupportedDevice> {
        lookup_device(self.vendor_id, self.product_id)
    }
}

/// An open, writable device node. Dropping it closes the descriptor.
pub trait Transport {
    /// Writes one report and returns the number of bytes accepted.
    fn write(&mut self, report: &[u8]) -> io::Result<usize>;
}

/// Source of HID nodes.
pub trait DeviceBackend {
    type Transport: Transport;

    /// Lists every HID node that could be identified.
    fn enumerate(&self) -> Vec<DeviceInfo>;

    /// Opens a node for writing.
    fn open(&self, path: &str) -> io::Result<Self::Transport>;
}

/// Lifecycle state of an open display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    /// Matched the supported-device table.
    Identified,
    /// Descriptor open, init sequence not yet sent.
    Open,
    /// Init sequence sent (or not needed).
    Initialized,
    /// At least one full data report accepted.
    Streaming,
}

/// An open display.
pub struct DeviceHandle<T> {
    info: DeviceInfo,
    family: DeviceFamily,
    model: &'static str,
    transport: T,
    state: DeviceState,
    error_count: u32,
    last_error_log: Option<Instant>,
}

impl<T: Transport> DeviceHandle<T> {
    fn new(info: DeviceInfo, supported: &'static SupportedDevice, transport: T) -> Self {
        Self {
            info,
            family: supported.family,
            model: supported.name,
            transport,
            state: DeviceState::Open,
            error_count: 0,
            last_error_log: None,
        }
    }

    /// Returns the identification data.
    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    /// Returns the report family.
    pub fn family(&self) -> DeviceFamily {
        self.family
    }

    /// Returns the lifecycle state.
    pub fn state(&self) -> DeviceState {
        self.state
    }

    fn write_report(&mut self, report: &[u8]) -> Result<()> {
        match self.transport.write(report) {
            Ok(n) if n == report.len() => Ok(()),
            Ok(n) => Err(Error::PartialWrite {
                path: self.info.path.clone(),
                written: n,
                expected: report.len(),
            }),
            Err(e) => Err(Error::from_write(&self.info.path, e)),
        }
    }

    /// Sends the family's wake sequence. Individual command failures are
    /// tolerated unless the device is gone.
    fn initialize(&mut self, delay: Duration) -> Result<()> {
        let commands = self.family.init_sequence();
        for command in commands {
            let packet = build_command_packet(command);
            match self.write_report(&packet) {
                Ok(()) => {}
                Err(e) if e.is_disconnect() => return Err(e),
                Err(e) => debug!("Init command failed on {}: {}", self.info.path, e),
            }
            if !delay.is_zero() {
                std::thread::sleep(delay);
            }
        }
        if !commands.is_empty() {
            info!("{} initialization complete ({})", self.model, self.info.path);
        }
        self.state = DeviceState::Initialized;
        Ok(())
    }

    fn send(&mut self, snapshot: &Snapshot, clock: &WallClock, delay: Duration) -> Result<()> {
        if self.state == DeviceState::Open {
            self.initialize(delay)?;
        }

        let packet = build_packet(self.family, snapshot, clock);
        self.write_report(&packet)?;
        debug!("Sent {} bytes to {}", REPORT_SIZE, self.info.path);
        self.state = DeviceState::Streaming;
        self.error_count = 0;
        self.last_error_log = None;
        Ok(())
    }

    /// Logs a transient error, collapsing repeats into one line per minute.
    ///
    /// `error_count` holds the errors swallowed since the last logged one.
    /// A successful report clears both, so the next failure logs at once.
    fn log_transient(&mut self, err: &Error) {
        self.error_count += 1;
        let due = self
            .last_error_log
            .map(|t| t.elapsed() >= ERROR_LOG_INTERVAL)
            .unwrap_or(true);
        if due {
            if self.error_count > 1 {
                error!(
                    "Write error on {} (repeated {} times): {}",
                    self.info.path, self.error_count, err
                );
            } else {
                error!("Write error on {}: {}", self.info.path, err);
            }
            self.last_error_log = Some(Instant::now());
            self.error_count = 0;
        }
    }
}

/// Owns every open display and drives their lifecycle.
pub struct DeviceManager<B: DeviceBackend> {
    backend: B,
    devices: BTreeMap<String, DeviceHandle<B::Transport>>,
    init_delay: Duration,
    /// Paths whose open failure has already been reported.
    unopenable: HashSet<String>,
}

impl<B: DeviceBackend> DeviceManager<B> {
    /// Creates a manager with no open devices.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            devices: BTreeMap::new(),
            init_delay: Duration::from_millis(INIT_COMMAND_DELAY_MS),
            unopenable: HashSet::new(),
        }
    }

    /// Overrides the spacing between init commands.
    pub fn with_init_delay(mut self, delay: Duration) -> Self {
        self.init_delay = delay;
        self
    }

    /// Returns the backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Lists supported displays currently attached. Other nodes are ignored.
    pub fn discover(&self) -> Vec<DeviceInfo> {
        self.backend
            .enumerate()
            .into_iter()
            .filter(|info| match info.supported() {
                Some(supported) => {
                    debug!(
                        "Found {}: {} (VID={:04X}, PID={:04X})",
                        supported.name, info.path, info.vendor_id, info.product_id
                    );
                    true
                }
                None => false,
            })
            .collect()
    }

    /// Opens every discovered display that is not already open and returns
    /// how many were opened by this call.
    pub fn open_all(&mut self) -> usize {
        let mut opened = 0;
        let found = self.discover();

        // Forget nodes that went away so a replugged device is reported again
        self.unopenable
            .retain(|path| found.iter().any(|info| &info.path == path));

        for info in found {
            if self.devices.contains_key(&info.path) {
                continue;
            }
            let Some(supported) = info.supported() else {
                continue;
            };

            match self.backend.open(&info.path) {
                Ok(transport) => {
                    info!("Opened device: {} ({})", info.path, info.name);
                    self.unopenable.remove(&info.path);
                    let path = info.path.clone();
                    self.devices
                        .insert(path, DeviceHandle::new(info, supported, transport));
                    opened += 1;
                }
                // Unopenable devices are skipped, the rest still get opened
                Err(e) => {
                    let err = Error::from_open(&info.path, e);
                    if self.unopenable.insert(info.path.clone()) {
                        warn!("{}", err);
                    } else {
                        debug!("{}", err);
                    }
                }
            }
        }

        opened
    }

    /// Closes every open display.
    pub fn close_all(&mut self) {
        for (path, _) in std::mem::take(&mut self.devices) {
            info!("Closed device: {}", path);
        }
    }

    /// Returns the number of open displays.
    pub fn active_count(&self) -> usize {
        self.devices.len()
    }

    /// Returns the open display at `path`.
    pub fn device(&self, path: &str) -> Option<&DeviceHandle<B::Transport>> {
        self.devices.get(path)
    }

    /// Iterates over open displays.
    pub fn devices(&self) -> impl Iterator<Item = &DeviceHandle<B::Transport>> {
        self.devices.values()
    }

    /// Sends the snapshot to every open display using the current local time.
    ///
    /// Returns true if at least one display accepted a full report.
    pub fn transmit(&mut self, snapshot: &Snapshot) -> bool {
        self.transmit_at(snapshot, &WallClock::now())
    }

    /// Sends the snapshot stamped with `clock`.
    pub fn transmit_at(&mut self, snapshot: &Snapshot, clock: &WallClock) -> bool {
        let mut success = false;
        let mut disconnected = Vec::new();

        for (path, handle) in self.devices.iter_mut() {
            match handle.send(snapshot, clock, self.init_delay) {
                Ok(()) => success = true,
                Err(e) if e.is_disconnect() => {
                    info!("Device disconnected: {}", path);
                    disconnected.push(path.clone());
                }
                Err(e @ Error::PartialWrite { .. }) => warn!("{}", e),
                Err(e) => handle.log_transient(&e),
            }
        }

        for path in disconnected {
            // Dropping the handle closes the descriptor
            self.devices.remove(&path);
        }

        success
    }
}

impl<B: DeviceBackend> Drop for DeviceManager<B> {
    fn drop(&mut self) {
        self.close_all();
    }
}
