//! Filesystem usage and drive temperature.

use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;
use tracing::debug;

use super::hwmon::{self, HwmonIndex, DISK_TEMP_CHIPS};
use super::{Sensor, SensorRoots};

/// Reports how full one mounted filesystem is.
pub struct DiskSensor {
    mount: PathBuf,
}

impl DiskSensor {
    /// Creates a sensor for the filesystem mounted at `mount`.
    pub fn new(mount: &str) -> Self {
        Self {
            mount: PathBuf::from(mount),
        }
    }

    /// Returns (blocks, free blocks, fragment size) for the mount.
    fn statvfs(&self) -> Option<(u64, u64, u64)> {
        let path = CString::new(self.mount.as_os_str().as_bytes()).ok()?;
        // SAFETY: statvfs is plain old data; all-zero is a valid value
        let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };

        // SAFETY: path is NUL-terminated and stat is a valid out pointer
        let rc = unsafe { libc::statvfs(path.as_ptr(), &mut stat) };
        if rc != 0 {
            debug!(
                "statvfs({}) failed: {}",
                self.mount.display(),
                std::io::Error::last_os_error()
            );
            return None;
        }

        Some((
            stat.f_blocks as u64,
            stat.f_bfree as u64,
            stat.f_frsize as u64,
        ))
    }

    /// Drive temperature in °C from the first NVMe or SATA sensor chip.
    pub fn temperature(&self, roots: &SensorRoots, hwmon: &HwmonIndex) -> f64 {
        hwmon
            .first_of(DISK_TEMP_CHIPS)
            .and_then(|chip| hwmon::read_preferred_temp(roots, chip, &["composite"]))
            .unwrap_or(0.0)
    }
}

/// Used space as a percentage of total space.
pub fn usage_percent(blocks: u64, free: u64, fragment_size: u64) -> f64 {
    let total = blocks.saturating_mul(fragment_size);
    if total == 0 {
        return 0.0;
    }
    let used = total.saturating_sub(free.saturating_mul(fragment_size));
    100.0 * used as f64 / total as f64
}

impl Sensor for DiskSensor {
    fn sample(&mut self) -> f64 {
        self.statvfs()
            .map(|(blocks, free, frsize)| usage_percent(blocks, free, frsize))
            .unwrap_or(0.0)
    }
}
