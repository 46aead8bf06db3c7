//! LK Display Hardware Library
//!
//! Device discovery, connection lifecycle and report encoding for the USB
//! sensor displays built into GAMDIAS ATLAS coolers and HWCX controllers.

pub mod device;
pub mod error;
pub mod hidraw;
pub mod protocol;
pub mod telemetry;

pub use device::{DeviceBackend, DeviceHandle, DeviceInfo, DeviceManager, DeviceState, Transport};
pub use error::{Error, Result};
pub use hidraw::HidrawBackend;
pub use protocol::{build_packet, DeviceFamily, WallClock, REPORT_SIZE};
pub use telemetry::{ComponentLoad, Snapshot};

/// A display model the daemon knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupportedDevice {
    pub vendor_id: u16,
    pub product_id: u16,
    pub name: &'static str,
    pub family: DeviceFamily,
}

/// USB VID:PID pairs accepted during discovery.
pub const SUPPORTED_DEVICES: &[SupportedDevice] = &[
    SupportedDevice {
        vendor_id: 0x1B80,
        product_id: 0xB538,
        name: "GAMDIAS ATLAS",
        family: DeviceFamily::Gamdias,
    },
    SupportedDevice {
        vendor_id: 0x0145,
        product_id: 0x1005,
        name: "HWCX Controller",
        family: DeviceFamily::Hwcx,
    },
];

/// Looks up a VID:PID pair in the supported-device table.
pub fn lookup_device(vendor_id: u16, product_id: u16) -> Option<&'static SupportedDevice> {
    SUPPORTED_DEVICES
        .iter()
        .find(|d| d.vendor_id == vendor_id && d.product_id == product_id)
}
