//! Fixture catalog and profiles shared by the integration tests.

use std::collections::BTreeMap;

use modelscout::catalog::{
    Capabilities, Catalog, CloudInfo, ComputeIntensity, HardwareNeeds, ModelEntry, ModelVariant,
    PlatformSupport, PlatformSupportSet, Precision,
};
use modelscout::hardware::{
    ComputeCapability, CpuInfo, CpuTier, FormFactor, GpuInfo, GpuVendor, HardwareProfile,
    Platform, PowerState, RamInfo, RamKind, StorageInfo, StorageKind, StorageTier, ThermalState,
};
use modelscout::profile::{
    CloudWillingness, ImagePrefs, Modality, SharedQuality, TechnicalLevel, UseCase, UserProfile,
    VideoPrefs,
};

pub struct VariantSpec {
    pub id: &'static str,
    pub precision: &'static str,
    pub min_mb: u32,
    pub rec_mb: u32,
    pub size_gb: f32,
    pub retention: u8,
    pub apple: bool,
    pub min_cc: Option<f32>,
}

pub fn variant(spec: VariantSpec) -> ModelVariant {
    ModelVariant {
        id: spec.id.to_string(),
        precision: Precision::parse(spec.precision),
        vram_min_mb: spec.min_mb,
        vram_recommended_mb: spec.rec_mb,
        download_size_gb: spec.size_gb,
        quality_retention_percent: spec.retention,
        platform_support: PlatformSupportSet {
            nvidia: PlatformSupport {
                supported: true,
                min_compute_capability: spec.min_cc,
            },
            apple_mps: PlatformSupport {
                supported: spec.apple,
                min_compute_capability: None,
            },
            amd_rocm: PlatformSupport {
                supported: false,
                min_compute_capability: None,
            },
        },
        required_nodes: Vec::new(),
    }
}

pub fn scores(pairs: &[(&str, f32)]) -> BTreeMap<String, f32> {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

#[allow(clippy::too_many_arguments)]
pub fn model(
    id: &str,
    family: &str,
    modalities: &[Modality],
    variants: Vec<ModelVariant>,
    capability_scores: BTreeMap<String, f32>,
    total_size_gb: f32,
    intensity: ComputeIntensity,
    cloud: bool,
) -> ModelEntry {
    ModelEntry {
        id: id.to_string(),
        family: family.to_string(),
        name: id.to_string(),
        license: Some("apache-2.0".to_string()),
        variants,
        capabilities: Capabilities {
            primary: modalities.to_vec(),
            scores: capability_scores,
            ..Capabilities::default()
        },
        hardware: HardwareNeeds {
            total_size_gb,
            compute_intensity: intensity,
            supports_cpu_offload: true,
            ram_for_offload_gb: None,
            supports_tensorrt: false,
        },
        cloud: CloudInfo {
            available: cloud,
            service: cloud.then(|| "partner-api".to_string()),
            estimated_cost_per_gen: cloud.then_some(0.08),
        },
        incompatibilities: Vec::new(),
        alternatives: Vec::new(),
        ecosystem_maturity: 0.6,
        approach_fit: 0.6,
        minimum_ram_gb: 6.0,
    }
}

/// The catalog every scenario shares: two image families, three video
/// families and one audio model, sized to mirror real-world entries.
pub fn fixture_catalog() -> Catalog {
    let mut flux = model(
        "flux_dev",
        "flux",
        &[Modality::Image],
        vec![
            variant(VariantSpec {
                id: "fp16",
                precision: "fp16",
                min_mb: 22 * 1024,
                rec_mb: 24 * 1024,
                size_gb: 23.0,
                retention: 100,
                apple: true,
                min_cc: None,
            }),
            variant(VariantSpec {
                id: "fp8",
                precision: "fp8",
                min_mb: 12 * 1024,
                rec_mb: 16 * 1024,
                size_gb: 12.0,
                retention: 97,
                apple: false,
                min_cc: Some(8.9),
            }),
            variant(VariantSpec {
                id: "q4km",
                precision: "gguf_q4_k_m",
                min_mb: 7 * 1024,
                rec_mb: 9 * 1024,
                size_gb: 6.8,
                retention: 85,
                apple: true,
                min_cc: None,
            }),
        ],
        scores(&[
            ("photorealism", 0.95),
            ("artistic_quality", 0.85),
            ("text_rendering", 0.9),
            ("generation_speed", 0.5),
            ("output_quality", 0.95),
        ]),
        24.0,
        ComputeIntensity::High,
        true,
    );
    flux.hardware.supports_tensorrt = true;
    flux.ecosystem_maturity = 0.9;

    let mut sdxl = model(
        "sdxl",
        "sdxl",
        &[Modality::Image],
        vec![
            variant(VariantSpec {
                id: "fp16",
                precision: "fp16",
                min_mb: 8 * 1024,
                rec_mb: 10 * 1024,
                size_gb: 7.5,
                retention: 100,
                apple: true,
                min_cc: None,
            }),
            variant(VariantSpec {
                id: "q8",
                precision: "gguf_q8_0",
                min_mb: 6 * 1024,
                rec_mb: 8 * 1024,
                size_gb: 5.5,
                retention: 95,
                apple: true,
                min_cc: None,
            }),
            variant(VariantSpec {
                id: "q4",
                precision: "gguf_q4_0",
                min_mb: 4 * 1024,
                rec_mb: 6 * 1024,
                size_gb: 3.8,
                retention: 82,
                apple: true,
                min_cc: None,
            }),
        ],
        scores(&[
            ("photorealism", 0.8),
            ("artistic_quality", 0.85),
            ("editability", 0.8),
            ("generation_speed", 0.7),
            ("output_quality", 0.8),
        ]),
        8.0,
        ComputeIntensity::Medium,
        false,
    );
    sdxl.ecosystem_maturity = 0.9;

    let mut hunyuan = model(
        "hunyuan_video",
        "hunyuan_video",
        &[Modality::Video],
        vec![variant(VariantSpec {
            id: "fp16",
            precision: "fp16",
            min_mb: 24 * 1024,
            rec_mb: 32 * 1024,
            size_gb: 26.0,
            retention: 100,
            apple: true,
            min_cc: None,
        })],
        scores(&[
            ("photorealism", 0.9),
            ("motion_quality", 0.9),
            ("temporal_coherence", 0.9),
            ("generation_speed", 0.2),
            ("output_quality", 0.9),
        ]),
        28.0,
        ComputeIntensity::High,
        true,
    );
    hunyuan.incompatibilities = vec!["apple_silicon".to_string()];
    hunyuan.alternatives = vec!["animatediff".to_string()];
    hunyuan.hardware.supports_cpu_offload = false;

    let animatediff = model(
        "animatediff",
        "animatediff",
        &[Modality::Video],
        vec![variant(VariantSpec {
            id: "fp16",
            precision: "fp16",
            min_mb: 6 * 1024,
            rec_mb: 8 * 1024,
            size_gb: 5.2,
            retention: 100,
            apple: true,
            min_cc: None,
        })],
        scores(&[
            ("photorealism", 0.6),
            ("motion_quality", 0.55),
            ("temporal_coherence", 0.6),
            ("generation_speed", 0.8),
            ("output_quality", 0.6),
        ]),
        6.0,
        ComputeIntensity::Medium,
        false,
    );

    let wan = model(
        "wan_22_14b",
        "wan",
        &[Modality::Video],
        vec![variant(VariantSpec {
            id: "fp16",
            precision: "fp16",
            min_mb: 16 * 1024,
            rec_mb: 20 * 1024,
            size_gb: 15.0,
            retention: 100,
            apple: true,
            min_cc: None,
        })],
        scores(&[
            ("photorealism", 0.85),
            ("motion_quality", 0.9),
            ("temporal_coherence", 0.85),
            ("generation_speed", 0.4),
            ("output_quality", 0.85),
        ]),
        16.0,
        ComputeIntensity::High,
        true,
    );

    let wan_small = model(
        "wan_ti2v_5b",
        "wan",
        &[Modality::Video],
        vec![variant(VariantSpec {
            id: "fp16",
            precision: "fp16",
            min_mb: 8 * 1024,
            rec_mb: 10 * 1024,
            size_gb: 7.0,
            retention: 100,
            apple: true,
            min_cc: None,
        })],
        scores(&[
            ("photorealism", 0.75),
            ("motion_quality", 0.7),
            ("temporal_coherence", 0.7),
            ("generation_speed", 0.6),
            ("output_quality", 0.7),
        ]),
        8.0,
        ComputeIntensity::Medium,
        false,
    );

    let musicgen = model(
        "musicgen",
        "musicgen",
        &[Modality::Audio],
        vec![variant(VariantSpec {
            id: "fp16",
            precision: "fp16",
            min_mb: 4 * 1024,
            rec_mb: 6 * 1024,
            size_gb: 4.0,
            retention: 100,
            apple: true,
            min_cc: None,
        })],
        scores(&[("output_quality", 0.7), ("generation_speed", 0.6)]),
        5.0,
        ComputeIntensity::Low,
        true,
    );

    Catalog::from_entries(vec![flux, sdxl, hunyuan, animatediff, wan, wan_small, musicgen])
        .expect("fixture catalog is valid")
}

pub fn nvidia_hardware(
    name: &str,
    vram_gb: f32,
    cc: (u32, u32),
    physical_cores: u32,
    ram_gb: f32,
    free_disk_gb: f32,
    form_factor: FormFactor,
) -> HardwareProfile {
    let cc_value = cc.0 as f32 + cc.1 as f32 / 10.0;
    let platform = if form_factor.is_laptop {
        Platform::NvidiaLaptop
    } else {
        Platform::NvidiaDesktop
    };
    HardwareProfile::build(
        platform,
        GpuInfo {
            vendor: GpuVendor::Nvidia,
            name: name.to_string(),
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
            model: "x86 test CPU".to_string(),
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
            free_gb: free_disk_gb,
            total_gb: free_disk_gb * 2.0,
            kind: StorageKind::Nvme,
            tier: StorageTier::Fast,
            read_mbps: 3500.0,
        },
        form_factor,
        ThermalState::Nominal,
        PowerState::Ac,
        Vec::new(),
    )
    .expect("test hardware is valid")
}

pub fn apple_hardware(chip: &str, ram_gb: f32, bandwidth_gbps: f32) -> HardwareProfile {
    HardwareProfile::build(
        Platform::AppleSilicon,
        GpuInfo {
            vendor: GpuVendor::Apple,
            name: chip.to_string(),
            vram_gb: 0.0,
            memory_bandwidth_gbps: Some(bandwidth_gbps),
            compute_capability: None,
            supports_fp8: false,
            supports_bf16: !chip.to_lowercase().contains("m1"),
            supports_fp4: false,
            flash_attention: false,
            unified_memory: true,
        },
        CpuInfo {
            model: chip.to_string(),
            physical_cores: 10,
            logical_cores: 10,
            arch: "aarch64".to_string(),
            supports_avx: false,
            supports_avx2: false,
            supports_avx512: false,
            tier: CpuTier::from_physical_cores(10),
        },
        RamInfo::new(ram_gb, ram_gb * 0.8, RamKind::Unified, None, Some(bandwidth_gbps)),
        StorageInfo {
            free_gb: 400.0,
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
    .expect("test hardware is valid")
}

pub fn image_user() -> UserProfile {
    UserProfile {
        use_cases: vec![UseCase {
            id: "image_generation".to_string(),
            required_modalities: [Modality::Image].into_iter().collect(),
        }],
        shared_quality: SharedQuality {
            photorealism: 5,
            artistic_stylization: 3,
            generation_speed: 3,
            output_quality: 4,
            character_consistency: 3,
        },
        image_prefs: Some(ImagePrefs {
            editability: 0.4,
            pose_control: 0.0,
            holistic_edits: 0.0,
            localized_edits: 0.0,
            style_tags: ["photorealism".to_string()].into_iter().collect(),
        }),
        video_prefs: None,
        audio_prefs: None,
        three_d_prefs: None,
        cloud_willingness: CloudWillingness::Hybrid,
        speed_priority: 0.5,
        technical_level: TechnicalLevel::Intermediate,
    }
}

pub fn image_video_user() -> UserProfile {
    let mut user = image_user();
    user.use_cases.push(UseCase {
        id: "short_clips".to_string(),
        required_modalities: [Modality::Video].into_iter().collect(),
    });
    user.video_prefs = Some(VideoPrefs {
        motion_intensity: 0.8,
        temporal_coherence: 0.8,
        duration: Default::default(),
    });
    user
}
