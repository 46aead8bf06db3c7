//! Linux hidraw backend.
//!
//! Nodes are identified with the `HIDIOCGRAWINFO`/`HIDIOCGRAWNAME` ioctls.
//! When a node cannot be opened for the query (usually permissions), the
//! same data is read from its sysfs `uevent` instead.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::device::{DeviceBackend, DeviceInfo, Transport};

/// `_IOR('H', 0x03, struct hidraw_devinfo)`
const HIDIOCGRAWINFO: libc::c_ulong = 0x8008_4803;

/// Name buffer size for `HIDIOCGRAWNAME`.
const HIDRAW_NAME_LEN: usize = 256;

/// `_IOC(_IOC_READ, 'H', 0x04, len)`
const fn hidiocgrawname(len: usize) -> libc::c_ulong {
    (2 << 30) | ((len as libc::c_ulong) << 16) | ((b'H' as libc::c_ulong) << 8) | 0x04
}

/// Mirror of the kernel's `struct hidraw_devinfo`.
#[repr(C)]
#[derive(Debug, Default)]
struct HidrawDevinfo {
    bustype: u32,
    vendor: i16,
    product: i16,
}

/// Backend over `/dev/hidraw*`.
#[derive(Debug, Clone)]
pub struct HidrawBackend {
    dev_root: PathBuf,
    sys_root: PathBuf,
}

impl Default for HidrawBackend {
    fn default() -> Self {
        Self::new("/dev", "/sys")
    }
}

impl HidrawBackend {
    /// Creates a backend rooted at the given device and sysfs directories.
    pub fn new(dev_root: impl Into<PathBuf>, sys_root: impl Into<PathBuf>) -> Self {
        Self {
            dev_root: dev_root.into(),
            sys_root: sys_root.into(),
        }
    }

    /// Lists hidraw node paths in name order.
    pub fn list_nodes(&self) -> Vec<PathBuf> {
        let mut nodes: Vec<PathBuf> = match fs::read_dir(&self.dev_root) {
            Ok(entries) => entries
                .flatten()
                .filter(|e| e.file_name().to_string_lossy().starts_with("hidraw"))
                .map(|e| e.path())
                .collect(),
            Err(e) => {
                debug!("Cannot list {}: {}", self.dev_root.display(), e);
                Vec::new()
            }
        };
        nodes.sort();
        nodes
    }

    /// Identifies one node, preferring the ioctl query.
    pub fn identify(&self, path: &Path) -> Option<DeviceInfo> {
        match query_ioctl(path) {
            Ok(info) => Some(info),
            Err(e) => {
                debug!("Device info query failed for {}: {}", path.display(), e);
                self.identify_sysfs(path)
            }
        }
    }

    fn identify_sysfs(&self, path: &Path) -> Option<DeviceInfo> {
        let node = path.file_name()?.to_string_lossy().to_string();
        let uevent = self
            .sys_root
            .join("class/hidraw")
            .join(&node)
            .join("device/uevent");
        let content = fs::read_to_string(&uevent).ok()?;
        let (bus_type, vendor_id, product_id, name) = parse_uevent(&content)?;
        Some(DeviceInfo {
            path: path.to_string_lossy().to_string(),
            bus_type,
            vendor_id,
            product_id,
            name,
        })
    }
}

/// Queries bus, VID, PID and name through the hidraw ioctls.
fn query_ioctl(path: &Path) -> io::Result<DeviceInfo> {
    let file = OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(path)?;
    let fd = file.as_raw_fd();

    let mut info = HidrawDevinfo::default();
    // SAFETY: fd is open for the lifetime of `file` and `info` matches the
    // kernel struct layout the request encodes.
    let rc = unsafe { libc::ioctl(fd, HIDIOCGRAWINFO as _, &mut info as *mut HidrawDevinfo) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }

    let mut name_buf = [0u8; HIDRAW_NAME_LEN];
    // SAFETY: the request length is one less than the buffer, leaving room
    // for the terminator.
    let rc = unsafe {
        libc::ioctl(
            fd,
            hidiocgrawname(HIDRAW_NAME_LEN - 1) as _,
            name_buf.as_mut_ptr(),
        )
    };
    let name = if rc < 0 {
        "Unknown Device".to_string()
    } else {
        let end = name_buf.iter().position(|&b| b == 0).unwrap_or(name_buf.len());
        String::from_utf8_lossy(&name_buf[..end]).to_string()
    };

    Ok(DeviceInfo {
        path: path.to_string_lossy().to_string(),
        bus_type: info.bustype,
        vendor_id: info.vendor as u16,
        product_id: info.product as u16,
        name,
    })
}

/// Parses `HID_ID=0003:00001B80:0000B538` and `HID_NAME=...` from a uevent.
pub fn parse_uevent(content: &str) -> Option<(u32, u16, u16, String)> {
    let mut id = None;
    let mut name = String::from("Unknown Device");

    for line in content.lines() {
        if let Some(value) = line.strip_prefix("HID_ID=") {
            let mut parts = value.trim().split(':');
            let bus = u32::from_str_radix(parts.next()?, 16).ok()?;
            let vendor = u32::from_str_radix(parts.next()?, 16).ok()?;
            let product = u32::from_str_radix(parts.next()?, 16).ok()?;
            id = Some((bus, vendor as u16, product as u16));
        } else if let Some(value) = line.strip_prefix("HID_NAME=") {
            name = value.trim().to_string();
        }
    }

    id.map(|(bus, vendor, product)| (bus, vendor, product, name))
}

/// An open hidraw node.
#[derive(Debug)]
pub struct HidrawTransport {
    file: File,
}

impl Transport for HidrawTransport {
    fn write(&mut self, report: &[u8]) -> io::Result<usize> {
        self.file.write(report)
    }
}

impl DeviceBackend for HidrawBackend {
    type Transport = HidrawTransport;

    fn enumerate(&self) -> Vec<DeviceInfo> {
        self.list_nodes()
            .iter()
            .filter_map(|path| self.identify(path))
            .collect()
    }

    fn open(&self, path: &str) -> io::Result<HidrawTransport> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(HidrawTransport { file })
    }
}
