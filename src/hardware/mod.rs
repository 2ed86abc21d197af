//! Normalized hardware facts for the recommendation pipeline.
//!
//! Platform probes in [`detect`] produce a [`HardwareProfile`]; lookup
//! tables live in [`lookup`]. Constraint semantics downstream depend on the
//! derived fields here (effective VRAM, offload headroom, tier), so all
//! derivation happens in one place, [`HardwareProfile::build`].

pub mod detect;
pub mod lookup;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// RAM the OS keeps for itself before offload headroom is counted.
pub const OS_RESERVE_GB: f32 = 4.0;

/// Fraction of post-reserve RAM the offloader may actually claim.
pub const OFFLOAD_SAFETY_FACTOR: f32 = 0.8;

/// Offload headroom below this many GB does not count toward the tier.
pub const TIER_OFFLOAD_FLOOR_GB: f32 = 4.0;

/// Share of unified memory the GPU can address for model weights.
pub const UNIFIED_VRAM_SHARE: f32 = 0.75;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    NvidiaDesktop,
    NvidiaLaptop,
    AppleSilicon,
    AmdRocm,
    CpuOnly,
}

impl Platform {
    pub fn is_nvidia(self) -> bool {
        matches!(self, Platform::NvidiaDesktop | Platform::NvidiaLaptop)
    }

    pub fn is_apple(self) -> bool {
        self == Platform::AppleSilicon
    }

    /// Stable identifier used in catalog incompatibility lists.
    pub fn id(self) -> &'static str {
        match self {
            Platform::NvidiaDesktop => "nvidia_desktop",
            Platform::NvidiaLaptop => "nvidia_laptop",
            Platform::AppleSilicon => "apple_silicon",
            Platform::AmdRocm => "amd_rocm",
            Platform::CpuOnly => "cpu_only",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GpuVendor {
    Nvidia,
    Apple,
    Amd,
    None,
}

/// CUDA compute capability, e.g. 8.9 for Ada Lovelace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeCapability {
    pub major: u32,
    pub minor: u32,
}

impl ComputeCapability {
    pub fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    pub fn value(self) -> f32 {
        self.major as f32 + self.minor as f32 / 10.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpuInfo {
    pub vendor: GpuVendor,
    pub name: String,
    pub vram_gb: f32,
    pub memory_bandwidth_gbps: Option<f32>,
    pub compute_capability: Option<ComputeCapability>,
    pub supports_fp8: bool,
    pub supports_bf16: bool,
    pub supports_fp4: bool,
    pub flash_attention: bool,
    pub unified_memory: bool,
}

impl GpuInfo {
    /// Placeholder GPU for the CPU-only fallback platform.
    pub fn none() -> Self {
        Self {
            vendor: GpuVendor::None,
            name: "none".to_string(),
            vram_gb: 0.0,
            memory_bandwidth_gbps: None,
            compute_capability: None,
            supports_fp8: false,
            supports_bf16: false,
            supports_fp4: false,
            flash_attention: false,
            unified_memory: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CpuTier {
    Minimal,
    Low,
    Medium,
    High,
}

impl CpuTier {
    pub fn from_physical_cores(cores: u32) -> Self {
        match cores {
            c if c >= 16 => CpuTier::High,
            c if c >= 8 => CpuTier::Medium,
            c if c >= 4 => CpuTier::Low,
            _ => CpuTier::Minimal,
        }
    }

    /// Offload needs a CPU that can keep up with spilled layers.
    pub fn can_host_offload(self) -> bool {
        matches!(self, CpuTier::High | CpuTier::Medium)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CpuInfo {
    pub model: String,
    pub physical_cores: u32,
    pub logical_cores: u32,
    pub arch: String,
    pub supports_avx: bool,
    pub supports_avx2: bool,
    pub supports_avx512: bool,
    pub tier: CpuTier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RamKind {
    Ddr4,
    Ddr5,
    Lpddr5,
    Unified,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RamInfo {
    pub total_gb: f32,
    pub available_gb: f32,
    pub kind: RamKind,
    pub speed_mhz: Option<u32>,
    pub bandwidth_gbps: Option<f32>,
    pub usable_for_offload_gb: f32,
}

impl RamInfo {
    pub fn new(
        total_gb: f32,
        available_gb: f32,
        kind: RamKind,
        speed_mhz: Option<u32>,
        bandwidth_gbps: Option<f32>,
    ) -> Self {
        Self {
            total_gb,
            available_gb,
            kind,
            speed_mhz,
            bandwidth_gbps,
            usable_for_offload_gb: usable_for_offload(available_gb),
        }
    }
}

/// Offload headroom: what is left after the OS reserve, discounted by the
/// safety factor so the offloader never fights the working set.
pub fn usable_for_offload(available_gb: f32) -> f32 {
    ((available_gb - OS_RESERVE_GB) * OFFLOAD_SAFETY_FACTOR).max(0.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    Nvme,
    SataSsd,
    Hdd,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StorageTier {
    Fast,
    Moderate,
    Slow,
}

impl StorageKind {
    pub fn tier(self) -> StorageTier {
        match self {
            StorageKind::Nvme => StorageTier::Fast,
            StorageKind::SataSsd => StorageTier::Moderate,
            StorageKind::Hdd => StorageTier::Slow,
            StorageKind::Unknown => StorageTier::Moderate,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageInfo {
    pub free_gb: f32,
    pub total_gb: f32,
    pub kind: StorageKind,
    pub tier: StorageTier,
    pub read_mbps: f32,
}

/// Chassis and sustained-throughput facts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormFactor {
    pub is_laptop: bool,
    pub power_limit_watts: Option<f32>,
    pub reference_tdp_watts: Option<f32>,
    /// 1.0 on desktops; `sqrt(power_limit / reference_tdp)` clamped to
    /// `[0.25, 1.0]` on laptops.
    pub sustained_performance_ratio: f32,
}

impl FormFactor {
    pub fn desktop() -> Self {
        Self {
            is_laptop: false,
            power_limit_watts: None,
            reference_tdp_watts: None,
            sustained_performance_ratio: 1.0,
        }
    }

    pub fn laptop(power_limit_watts: Option<f32>, reference_tdp_watts: Option<f32>) -> Self {
        let ratio = match (power_limit_watts, reference_tdp_watts) {
            (Some(power), Some(reference)) if reference > 0.0 => {
                (power / reference).sqrt().clamp(0.25, 1.0)
            }
            // Power facts missing: assume moderate throttling rather than none.
            _ => 0.7,
        };
        Self {
            is_laptop: true,
            power_limit_watts,
            reference_tdp_watts,
            sustained_performance_ratio: ratio,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThermalState {
    Nominal,
    Fair,
    Serious,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerState {
    Ac,
    Battery,
}

/// Capability class over effective capacity (effective VRAM plus counted
/// offload headroom).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HardwareTier {
    Minimal,
    Entry,
    Consumer,
    Prosumer,
    Professional,
    Workstation,
}

impl HardwareTier {
    pub fn from_effective_capacity_gb(capacity: f32) -> Self {
        if capacity >= 48.0 {
            HardwareTier::Workstation
        } else if capacity >= 16.0 {
            HardwareTier::Professional
        } else if capacity >= 12.0 {
            HardwareTier::Prosumer
        } else if capacity >= 8.0 {
            HardwareTier::Consumer
        } else if capacity >= 4.0 {
            HardwareTier::Entry
        } else {
            HardwareTier::Minimal
        }
    }
}

/// Immutable, normalized view of the machine. Built once per run and handed
/// to every pipeline stage by reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HardwareProfile {
    pub platform: Platform,
    pub gpu: GpuInfo,
    pub cpu: CpuInfo,
    pub ram: RamInfo,
    pub storage: StorageInfo,
    pub form_factor: FormFactor,
    pub thermal_state: ThermalState,
    pub power_state: PowerState,
    pub effective_vram_gb: f32,
    pub tier: HardwareTier,
    pub warnings: Vec<String>,
}

impl HardwareProfile {
    /// Derive effective VRAM and the tier, validate invariants, freeze.
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        platform: Platform,
        gpu: GpuInfo,
        cpu: CpuInfo,
        ram: RamInfo,
        storage: StorageInfo,
        form_factor: FormFactor,
        thermal_state: ThermalState,
        power_state: PowerState,
        warnings: Vec<String>,
    ) -> Result<Self, CoreError> {
        if gpu.vram_gb < 0.0 || ram.total_gb < 0.0 || storage.free_gb < 0.0 {
            return Err(CoreError::invariant(format!(
                "negative capacity: vram={} ram={} storage={}",
                gpu.vram_gb, ram.total_gb, storage.free_gb
            )));
        }
        if let Some(bw) = gpu.memory_bandwidth_gbps {
            if bw <= 0.0 {
                return Err(CoreError::invariant("non-positive GPU bandwidth"));
            }
        }
        if let Some(bw) = ram.bandwidth_gbps {
            if bw <= 0.0 {
                return Err(CoreError::invariant("non-positive RAM bandwidth"));
            }
        }

        let effective_vram_gb = if gpu.unified_memory {
            ram.total_gb * UNIFIED_VRAM_SHARE
        } else {
            gpu.vram_gb
        };

        let has_accelerator = gpu.unified_memory || gpu.vram_gb > 0.0;
        if has_accelerator != (effective_vram_gb > 0.0) {
            return Err(CoreError::invariant(
                "effective VRAM must be positive exactly when an accelerator is present",
            ));
        }

        let mut profile = Self {
            platform,
            gpu,
            cpu,
            ram,
            storage,
            form_factor,
            thermal_state,
            power_state,
            effective_vram_gb,
            tier: HardwareTier::Minimal,
            warnings,
        };
        profile.tier = HardwareTier::from_effective_capacity_gb(profile.effective_capacity_gb());
        Ok(profile)
    }

    /// Effective VRAM plus offload headroom, when the CPU can host offload
    /// and the headroom is worth counting.
    pub fn effective_capacity_gb(&self) -> f32 {
        let offload = if self.cpu.tier.can_host_offload()
            && self.ram.usable_for_offload_gb > TIER_OFFLOAD_FLOOR_GB
        {
            self.ram.usable_for_offload_gb
        } else {
            0.0
        };
        self.effective_vram_gb + offload
    }

    pub fn effective_vram_mb(&self) -> f32 {
        self.effective_vram_gb * 1024.0
    }
}
