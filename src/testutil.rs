//! Shared fixtures for unit tests.

use crate::catalog::{
    Capabilities, CloudInfo, HardwareNeeds, ModelEntry, ModelVariant, PlatformSupport,
    PlatformSupportSet, Precision,
};
use crate::hardware::{
    ComputeCapability, CpuInfo, CpuTier, FormFactor, GpuInfo, GpuVendor, HardwareProfile,
    Platform, PowerState, RamInfo, RamKind, StorageInfo, StorageKind, StorageTier, ThermalState,
};
use crate::profile::{ImagePrefs, Modality, SharedQuality, UseCase, UserProfile};

pub(crate) fn variant_for(id: &str, precision: &str, min_mb: u32, rec_mb: u32) -> ModelVariant {
    let everywhere = PlatformSupport {
        supported: true,
        min_compute_capability: None,
    };
    ModelVariant {
        id: id.to_string(),
        precision: Precision::parse(precision),
        vram_min_mb: min_mb,
        vram_recommended_mb: rec_mb,
        download_size_gb: min_mb as f32 / 1024.0,
        quality_retention_percent: 100,
        platform_support: PlatformSupportSet {
            nvidia: everywhere.clone(),
            apple_mps: everywhere.clone(),
            amd_rocm: everywhere,
        },
        required_nodes: Vec::new(),
    }
}

pub(crate) fn entry_with_variants(
    id: &str,
    modality: Modality,
    variants: Vec<ModelVariant>,
) -> ModelEntry {
    let total_size_gb = variants
        .iter()
        .map(|v| v.download_size_gb)
        .fold(0.0f32, f32::max);
    ModelEntry {
        id: id.to_string(),
        family: id.to_string(),
        name: id.to_string(),
        license: Some("apache-2.0".to_string()),
        variants,
        capabilities: Capabilities {
            primary: vec![modality],
            ..Capabilities::default()
        },
        hardware: HardwareNeeds {
            total_size_gb,
            ..HardwareNeeds::default()
        },
        cloud: CloudInfo::default(),
        incompatibilities: Vec::new(),
        alternatives: Vec::new(),
        ecosystem_maturity: 0.5,
        approach_fit: 0.5,
        minimum_ram_gb: 8.0,
    }
}

pub(crate) fn nvidia_profile(
    vram_gb: f32,
    cc: (u32, u32),
    physical_cores: u32,
    ram_gb: f32,
) -> HardwareProfile {
    let cc_value = cc.0 as f32 + cc.1 as f32 / 10.0;
    HardwareProfile::build(
        Platform::NvidiaDesktop,
        GpuInfo {
            vendor: GpuVendor::Nvidia,
            name: "Test NVIDIA GPU".to_string(),
            vram_gb,
            memory_bandwidth_gbps: None,
            compute_capability: Some(ComputeCapability::new(cc.0, cc.1)),
            supports_fp8: cc_value >= 8.9,
            supports_bf16: cc_value >= 8.0,
            supports_fp4: cc_value >= 12.0,
            flash_attention: cc_value >= 8.0,
            unified_memory: false,
        },
        CpuInfo {
            model: "Test CPU".to_string(),
            physical_cores,
            logical_cores: physical_cores * 2,
            arch: "x86_64".to_string(),
            supports_avx: true,
            supports_avx2: true,
            supports_avx512: false,
            tier: CpuTier::from_physical_cores(physical_cores),
        },
        RamInfo::new(ram_gb, ram_gb, RamKind::Ddr5, Some(5600), Some(89.6)),
        StorageInfo {
            free_gb: 500.0,
            total_gb: 1000.0,
            kind: StorageKind::Nvme,
            tier: StorageTier::Fast,
            read_mbps: 3500.0,
        },
        FormFactor::desktop(),
        ThermalState::Nominal,
        PowerState::Ac,
        Vec::new(),
    )
    .expect("test profile is valid")
}

pub(crate) fn apple_profile(ram_gb: f32) -> HardwareProfile {
    HardwareProfile::build(
        Platform::AppleSilicon,
        GpuInfo {
            vendor: GpuVendor::Apple,
            name: "Apple M3 Max".to_string(),
            vram_gb: 0.0,
            memory_bandwidth_gbps: Some(400.0),
            compute_capability: None,
            supports_fp8: false,
            supports_bf16: true,
            supports_fp4: false,
            flash_attention: false,
            unified_memory: true,
        },
        CpuInfo {
            model: "Apple M3 Max".to_string(),
            physical_cores: 12,
            logical_cores: 12,
            arch: "aarch64".to_string(),
            supports_avx: false,
            supports_avx2: false,
            supports_avx512: false,
            tier: CpuTier::from_physical_cores(12),
        },
        RamInfo::new(ram_gb, ram_gb * 0.8, RamKind::Unified, None, Some(400.0)),
        StorageInfo {
            free_gb: 500.0,
            total_gb: 1000.0,
            kind: StorageKind::Nvme,
            tier: StorageTier::Fast,
            read_mbps: 3500.0,
        },
        FormFactor {
            is_laptop: true,
            power_limit_watts: None,
            reference_tdp_watts: None,
            sustained_performance_ratio: 1.0,
        },
        ThermalState::Nominal,
        PowerState::Ac,
        Vec::new(),
    )
    .expect("test profile is valid")
}

pub(crate) fn user_with_image() -> UserProfile {
    UserProfile {
        use_cases: vec![UseCase {
            id: "image_generation".to_string(),
            required_modalities: [Modality::Image].into_iter().collect(),
        }],
        shared_quality: SharedQuality::default(),
        image_prefs: Some(ImagePrefs::default()),
        video_prefs: None,
        audio_prefs: None,
        three_d_prefs: None,
        cloud_willingness: crate::profile::CloudWillingness::Hybrid,
        speed_priority: 0.5,
        technical_level: crate::profile::TechnicalLevel::Intermediate,
    }
}
