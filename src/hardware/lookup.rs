//! Declarative hardware lookup tables.
//!
//! Table data lives here instead of in code branches so probe logic stays
//! mechanical. A table miss is a recorded warning plus a conservative
//! default at the call site, never a silent substitution.

use super::{RamKind, StorageKind};

/// Unified-memory bandwidth by Apple chip, GB/s. Most specific names first
/// so "m1 max" does not match the plain "m1" row.
pub static APPLE_BANDWIDTH_GBPS: &[(&str, f32)] = &[
    ("m1 ultra", 800.0),
    ("m1 max", 400.0),
    ("m1 pro", 200.0),
    ("m1", 68.0),
    ("m2 ultra", 800.0),
    ("m2 max", 400.0),
    ("m2 pro", 200.0),
    ("m2", 100.0),
    ("m3 ultra", 819.0),
    ("m3 max", 400.0),
    ("m3 pro", 150.0),
    ("m3", 100.0),
    ("m4 max", 546.0),
    ("m4 pro", 273.0),
    ("m4", 120.0),
];

/// Conservative bandwidth assumed for an Apple chip missing from the table.
pub const APPLE_BANDWIDTH_FALLBACK_GBPS: f32 = 100.0;

pub fn apple_bandwidth_gbps(chip_name: &str) -> Option<f32> {
    let needle = chip_name.to_lowercase();
    APPLE_BANDWIDTH_GBPS
        .iter()
        .find(|(key, _)| needle.contains(key))
        .map(|(_, gbps)| *gbps)
}

/// Board-power reference (TDP) by GPU marketing name, watts. Longer names
/// first so "rtx 4070 ti" wins over "rtx 4070".
pub static REFERENCE_TDP_WATTS: &[(&str, f32)] = &[
    ("rtx 5090", 575.0),
    ("rtx 5080", 360.0),
    ("rtx 5070 ti", 300.0),
    ("rtx 5070", 250.0),
    ("rtx 4090", 450.0),
    ("rtx 4080", 320.0),
    ("rtx 4070 ti", 285.0),
    ("rtx 4070", 200.0),
    ("rtx 4060 ti", 160.0),
    ("rtx 4060", 115.0),
    ("rtx 3090", 350.0),
    ("rtx 3080", 320.0),
    ("rtx 3070", 220.0),
    ("rtx 3060", 170.0),
];

pub fn reference_tdp_watts(gpu_name: &str) -> Option<f32> {
    let needle = gpu_name.to_lowercase();
    REFERENCE_TDP_WATTS
        .iter()
        .find(|(key, _)| needle.contains(key))
        .map(|(_, watts)| *watts)
}

/// Name fragments that mark a laptop GPU even before power limits are read.
pub static LAPTOP_NAME_MARKERS: &[&str] = &["laptop", "mobile", "max-q"];

pub fn name_marks_laptop(gpu_name: &str) -> bool {
    let needle = gpu_name.to_lowercase();
    LAPTOP_NAME_MARKERS.iter().any(|m| needle.contains(m))
}

/// A laptop draws visibly less than the reference board power.
pub const LAPTOP_POWER_RATIO: f32 = 0.85;

/// Dual-channel bandwidth by memory type and clock, GB/s.
pub static RAM_BANDWIDTH_GBPS: &[(RamKind, u32, f32)] = &[
    (RamKind::Ddr4, 2400, 38.4),
    (RamKind::Ddr4, 2666, 42.7),
    (RamKind::Ddr4, 3200, 51.2),
    (RamKind::Ddr4, 3600, 57.6),
    (RamKind::Ddr5, 4800, 76.8),
    (RamKind::Ddr5, 5600, 89.6),
    (RamKind::Ddr5, 6000, 96.0),
    (RamKind::Ddr5, 6400, 102.4),
    (RamKind::Lpddr5, 6400, 102.4),
    (RamKind::Lpddr5, 7500, 120.0),
];

/// Bandwidth for the closest table clock at or below `speed_mhz`.
pub fn ram_bandwidth_gbps(kind: RamKind, speed_mhz: u32) -> Option<f32> {
    RAM_BANDWIDTH_GBPS
        .iter()
        .filter(|(k, clock, _)| *k == kind && *clock <= speed_mhz)
        .max_by_key(|(_, clock, _)| *clock)
        .map(|(_, _, gbps)| *gbps)
}

/// Sequential read throughput by storage class, MB/s.
pub const NVME_GEN4_READ_MBPS: f32 = 7000.0;
pub const NVME_GEN3_READ_MBPS: f32 = 3500.0;
pub const SATA_SSD_READ_MBPS: f32 = 600.0;
pub const HDD_READ_MBPS: f32 = 140.0;

/// Throughput assumed for a storage class. NVMe generation is rarely
/// observable from userland, so NVMe assumes Gen3.
pub fn storage_read_mbps(kind: StorageKind) -> f32 {
    match kind {
        StorageKind::Nvme => NVME_GEN3_READ_MBPS,
        StorageKind::SataSsd => SATA_SSD_READ_MBPS,
        StorageKind::Hdd => HDD_READ_MBPS,
        StorageKind::Unknown => SATA_SSD_READ_MBPS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apple_bandwidth_most_specific_wins() {
        assert_eq!(apple_bandwidth_gbps("Apple M1 Max"), Some(400.0));
        assert_eq!(apple_bandwidth_gbps("Apple M1"), Some(68.0));
        assert_eq!(apple_bandwidth_gbps("Apple M4 Max"), Some(546.0));
        assert_eq!(apple_bandwidth_gbps("Apple M9 Hyper"), None);
    }

    #[test]
    fn test_reference_tdp_ti_before_base() {
        assert_eq!(reference_tdp_watts("NVIDIA GeForce RTX 4070 Ti"), Some(285.0));
        assert_eq!(reference_tdp_watts("NVIDIA GeForce RTX 4070"), Some(200.0));
    }

    #[test]
    fn test_laptop_markers() {
        assert!(name_marks_laptop("NVIDIA GeForce RTX 4090 Laptop GPU"));
        assert!(!name_marks_laptop("NVIDIA GeForce RTX 4090"));
    }

    #[test]
    fn test_ram_bandwidth_rounds_down() {
        assert_eq!(ram_bandwidth_gbps(RamKind::Ddr5, 5600), Some(89.6));
        // 5200 has no row; the 4800 row applies
        assert_eq!(ram_bandwidth_gbps(RamKind::Ddr5, 5200), Some(76.8));
        assert_eq!(ram_bandwidth_gbps(RamKind::Ddr4, 2133), None);
    }
}
