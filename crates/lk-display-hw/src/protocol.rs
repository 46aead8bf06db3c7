//! Report layouts for the supported display families.
//!
//! Protocol structure:
//! - Report size: 65 bytes (1 report ID byte + 64 payload bytes)
//! - GAMDIAS: report ID 0xB0, command 0x01, mixed endianness
//! - HWCX: report ID 0x00, command 0x02, big-endian throughout
//!
//! Offsets not listed below are always zero.

use chrono::{Datelike, Local, Timelike};

use crate::telemetry::Snapshot;

/// Total report size including the report ID byte.
pub const REPORT_SIZE: usize = 65;

/// GAMDIAS report ID.
pub const GAMDIAS_REPORT_ID: u8 = 0xB0;

/// HWCX report ID.
pub const HWCX_REPORT_ID: u8 = 0x00;

/// Delay between init commands in milliseconds.
pub const INIT_COMMAND_DELAY_MS: u64 = 50;

/// Display families, each with its own report layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceFamily {
    /// GAMDIAS ATLAS AIO cooler LCD.
    Gamdias,
    /// HWCX sensor panel controller.
    Hwcx,
}

impl std::fmt::Display for DeviceFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceFamily::Gamdias => write!(f, "gamdias"),
            DeviceFamily::Hwcx => write!(f, "hwcx"),
        }
    }
}

/// Report commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    /// GAMDIAS dynamic sensor data.
    DynamicData = 0x01,
    /// HWCX sensor data update.
    UpdateData = 0x02,
}

/// GAMDIAS wake/enable sequence, sent once per open handle.
const GAMDIAS_INIT: &[&[u8]] = &[
    &[GAMDIAS_REPORT_ID, Command::DynamicData as u8, 0x00],
    &[0x00, 0x38, 0xB5, 0x01, 0x00],
    &[0x00, 0x38, 0xB5, 0x01, 0x01],
];

impl DeviceFamily {
    /// Returns the one-time init commands, unpadded. Empty when the family
    /// needs no init.
    pub fn init_sequence(&self) -> &'static [&'static [u8]] {
        match self {
            DeviceFamily::Gamdias => GAMDIAS_INIT,
            DeviceFamily::Hwcx => &[],
        }
    }
}

/// Local wall-clock fields stamped into each report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WallClock {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub year: u16,
    pub month: u8,
    pub day: u8,
    /// Days since Monday (Monday = 0).
    pub weekday: u8,
}

impl WallClock {
    /// Reads the local time.
    pub fn now() -> Self {
        let now = Local::now();
        Self {
            hour: now.hour() as u8,
            minute: now.minute() as u8,
            second: now.second() as u8,
            year: now.year().clamp(0, u16::MAX as i32) as u16,
            month: now.month() as u8,
            day: now.day() as u8,
            weekday: now.weekday().num_days_from_monday() as u8,
        }
    }
}

/// Pads a raw command to a full report.
pub fn build_command_packet(command: &[u8]) -> [u8; REPORT_SIZE] {
    let mut buffer = [0u8; REPORT_SIZE];
    let len = command.len().min(REPORT_SIZE);
    buffer[..len].copy_from_slice(&command[..len]);
    buffer
}

/// Builds the data report for `family`.
pub fn build_packet(
    family: DeviceFamily,
    snapshot: &Snapshot,
    clock: &WallClock,
) -> [u8; REPORT_SIZE] {
    match family {
        DeviceFamily::Gamdias => build_gamdias_packet(snapshot, clock),
        DeviceFamily::Hwcx => build_hwcx_packet(snapshot, clock),
    }
}

/// Builds a GAMDIAS dynamic data report.
pub fn build_gamdias_packet(data: &Snapshot, clock: &WallClock) -> [u8; REPORT_SIZE] {
    let mut buffer = [0u8; REPORT_SIZE];
    buffer[0] = GAMDIAS_REPORT_ID;
    buffer[1] = Command::DynamicData as u8;
    buffer[2] = 0x00;

    buffer[3] = data.gpu_temp;
    buffer[4..6].copy_from_slice(&(data.cpu_temp as u16).to_le_bytes());
    buffer[6] = data.cpu_usage;
    buffer[7..9].copy_from_slice(&data.cpu_fan_rpm.to_le_bytes());
    buffer[9..11].copy_from_slice(&data.gpu_fan_rpm.to_le_bytes());
    buffer[11..13].copy_from_slice(&data.gpu_power.to_le_bytes());
    // 13 reserved

    // Frequencies are big-endian on this device
    buffer[14..16].copy_from_slice(&data.cpu_freq.to_be_bytes());
    buffer[16] = data.gpu_usage;
    buffer[17..19].copy_from_slice(&data.gpu_freq.to_be_bytes());

    buffer[19] = clock.hour;
    buffer[20] = clock.minute;
    buffer[21] = clock.second;
    buffer[22] = data.mem_usage;
    buffer[23] = data.disk_usage;
    buffer[24..26].copy_from_slice(&data.cpu_power.to_le_bytes());
    buffer
}

/// Builds an HWCX data update report.
pub fn build_hwcx_packet(data: &Snapshot, clock: &WallClock) -> [u8; REPORT_SIZE] {
    let mut buffer = [0u8; REPORT_SIZE];
    buffer[0] = HWCX_REPORT_ID;
    buffer[1] = Command::UpdateData as u8;
    buffer[2] = data.cpu_temp;
    buffer[3] = data.gpu_temp;

    buffer[4] = clock.hour;
    buffer[5] = clock.minute;
    buffer[6] = clock.second;
    // 7 reserved
    buffer[8..10].copy_from_slice(&clock.year.to_be_bytes());
    buffer[10] = clock.month;
    buffer[11] = clock.day;
    buffer[12] = clock.weekday;

    buffer[13] = data.cpu_usage;
    buffer[14..16].copy_from_slice(&data.cpu_freq.to_be_bytes());
    buffer[16] = data.gpu_usage;
    buffer[17..19].copy_from_slice(&data.gpu_freq.to_be_bytes());

    buffer[19] = data.mem_usage;
    buffer[20] = data.mem_temp;
    // 21-22 memory clock, unknown source
    buffer[23] = data.disk_usage;
    buffer[24] = data.disk_temp;

    buffer[25..27].copy_from_slice(&data.cpu_fan_rpm.to_be_bytes());
    // 27-28 CPU voltage
    buffer[29..31].copy_from_slice(&data.cpu_power.to_be_bytes());
    buffer[31..33].copy_from_slice(&data.gpu_fan_rpm.to_be_bytes());
    // 33-34 GPU voltage
    buffer[35..37].copy_from_slice(&data.gpu_power.to_be_bytes());

    buffer[41..45].copy_from_slice(&data.net_upload.to_be_bytes());
    buffer[45..49].copy_from_slice(&data.net_download.to_be_bytes());
    buffer[49] = data.display_mode;
    buffer
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::ComponentLoad;

    fn clock() -> WallClock {
        WallClock {
            hour: 14,
            minute: 30,
            second: 45,
            year: 2024,
            month: 3,
            day: 9,
            weekday: 5,
        }
    }

    fn sample_snapshot() -> Snapshot {
        let mut snapshot = Snapshot::new();
        snapshot.set_cpu(ComponentLoad {
            temperature: 45.0,
            usage: 25.0,
            frequency: 3500.0,
            fan_rpm: 1200.0,
            power: 65.0,
        });
        snapshot.set_gpu(ComponentLoad {
            temperature: 55.0,
            usage: 30.0,
            frequency: 1800.0,
            fan_rpm: 1500.0,
            power: 120.0,
        });
        snapshot.set_memory(60.0, 0.0);
        snapshot.set_disk(71.0, 38.0);
        snapshot
    }

    #[test]
    fn test_gamdias_packet() {
        let packet = build_gamdias_packet(&sample_snapshot(), &clock());
        assert_eq!(packet.len(), REPORT_SIZE);
        assert_eq!(packet[0], 0xB0);
        assert_eq!(packet[1], 0x01);
        assert_eq!(packet[2], 0x00);
        assert_eq!(packet[3], 55);
        assert_eq!(u16::from_le_bytes([packet[4], packet[5]]), 45);
        assert_eq!(packet[6], 25);
        assert_eq!(u16::from_le_bytes([packet[7], packet[8]]), 1200);
        assert_eq!(u16::from_le_bytes([packet[9], packet[10]]), 1500);
        assert_eq!(u16::from_le_bytes([packet[11], packet[12]]), 120);
        assert_eq!(packet[13], 0);
        assert_eq!(u16::from_be_bytes([packet[14], packet[15]]), 3500);
        assert_eq!(packet[16], 30);
        assert_eq!(u16::from_be_bytes([packet[17], packet[18]]), 1800);
        assert_eq!(&packet[19..22], &[14, 30, 45]);
        assert_eq!(packet[22], 60);
        assert_eq!(packet[23], 71);
        assert_eq!(u16::from_le_bytes([packet[24], packet[25]]), 65);
        assert!(packet[26..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_hwcx_packet() {
        let mut snapshot = sample_snapshot();
        snapshot.set_network(1_000_000.0, 0x0102_0304 as f64);
        snapshot.set_display_mode(2);

        let packet = build_hwcx_packet(&snapshot, &clock());
        assert_eq!(packet[0], 0x00);
        assert_eq!(packet[1], 0x02);
        assert_eq!(packet[2], 45);
        assert_eq!(packet[3], 55);
        assert_eq!(&packet[4..8], &[14, 30, 45, 0]);
        assert_eq!(u16::from_be_bytes([packet[8], packet[9]]), 2024);
        assert_eq!(&packet[10..13], &[3, 9, 5]);
        assert_eq!(packet[13], 25);
        assert_eq!(u16::from_be_bytes([packet[14], packet[15]]), 3500);
        assert_eq!(packet[16], 30);
        assert_eq!(u16::from_be_bytes([packet[17], packet[18]]), 1800);
        assert_eq!(&packet[19..25], &[60, 0, 0, 0, 71, 38]);
        assert_eq!(u16::from_be_bytes([packet[25], packet[26]]), 1200);
        assert_eq!(&packet[27..29], &[0, 0]);
        assert_eq!(u16::from_be_bytes([packet[29], packet[30]]), 65);
        assert_eq!(u16::from_be_bytes([packet[31], packet[32]]), 1500);
        assert_eq!(u16::from_be_bytes([packet[35], packet[36]]), 120);
        assert_eq!(&packet[37..41], &[0, 0, 0, 0]);
        assert_eq!(
            u32::from_be_bytes([packet[41], packet[42], packet[43], packet[44]]),
            1_000_000
        );
        assert_eq!(&packet[45..49], &[0x01, 0x02, 0x03, 0x04]);
        assert_eq!(packet[49], 2);
        assert!(packet[50..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let snapshot = sample_snapshot();
        let before = snapshot.clone();
        for family in [DeviceFamily::Gamdias, DeviceFamily::Hwcx] {
            let a = build_packet(family, &snapshot, &clock());
            let b = build_packet(family, &snapshot, &clock());
            assert_eq!(a, b);
        }
        assert_eq!(snapshot, before);
    }

    #[test]
    fn test_clamped_usage_encodes_at_range_limits() {
        let mut snapshot = Snapshot::new();
        snapshot.set_cpu(ComponentLoad {
            usage: 150.0,
            ..Default::default()
        });
        assert_eq!(build_gamdias_packet(&snapshot, &clock())[6], 100);
        assert_eq!(build_hwcx_packet(&snapshot, &clock())[13], 100);

        snapshot.set_cpu(ComponentLoad {
            usage: -10.0,
            ..Default::default()
        });
        assert_eq!(build_gamdias_packet(&snapshot, &clock())[6], 0);
        assert_eq!(build_hwcx_packet(&snapshot, &clock())[13], 0);
    }

    #[test]
    fn test_zero_gpu_fields() {
        let mut snapshot = sample_snapshot();
        snapshot.set_gpu(ComponentLoad::default());

        let packet = build_gamdias_packet(&snapshot, &clock());
        assert_eq!(packet[3], 0);
        assert_eq!(&packet[9..13], &[0, 0, 0, 0]);
        assert_eq!(&packet[16..19], &[0, 0, 0]);

        let packet = build_hwcx_packet(&snapshot, &clock());
        assert_eq!(packet[3], 0);
        assert_eq!(&packet[16..19], &[0, 0, 0]);
        assert_eq!(&packet[31..33], &[0, 0]);
        assert_eq!(&packet[35..37], &[0, 0]);
    }

    #[test]
    fn test_command_packet_padding() {
        let packet = build_command_packet(&[0x00, 0x38, 0xB5, 0x01, 0x01]);
        assert_eq!(&packet[..5], &[0x00, 0x38, 0xB5, 0x01, 0x01]);
        assert!(packet[5..].iter().all(|&b| b == 0));

        assert_eq!(DeviceFamily::Gamdias.init_sequence().len(), 3);
        assert!(DeviceFamily::Hwcx.init_sequence().is_empty());
    }
}
