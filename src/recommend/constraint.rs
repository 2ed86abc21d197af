//! Layer 1: constraint satisfaction.
//!
//! Binary feasibility filter. Every candidate either passes with the best
//! variant that fits (native, offloaded, or cloud) or gets exactly one
//! structured rejection. Checks run strongest-first; VRAM failures can be
//! rescued by CPU offload, and finally by the cloud escape when the user
//! allows it.

use crate::catalog::{Catalog, ModelEntry, ModelVariant, Precision};
use crate::error::{CancelToken, CoreError};
use crate::hardware::HardwareProfile;
use crate::profile::{Modality, UserProfile};

use super::types::{ConstraintKind, ExecutionMode, PassingCandidate, RejectionReason};

/// Free disk that must remain after installing a model set.
pub const STORAGE_BUFFER_GB: f32 = 10.0;

/// Quality retention below this adds a visible caveat to the candidate.
const RETENTION_WARNING_PERCENT: u8 = 90;

/// Speed-focused users take the FP8 rendition over FP16 when both fit.
const SPEED_FP8_CUTOVER: f32 = 0.6;

/// Filter every catalog candidate for `modality` against the hardware.
pub fn filter_candidates(
    catalog: &Catalog,
    modality: Modality,
    hardware: &HardwareProfile,
    user: &UserProfile,
    cancel: &CancelToken,
) -> Result<(Vec<PassingCandidate>, Vec<RejectionReason>), CoreError> {
    cancel.check()?;

    let mut passing = Vec::new();
    let mut rejected = Vec::new();

    for (index, entry) in catalog.candidates_for(modality) {
        cancel.check()?;
        match check_entry(entry, index, hardware, user) {
            Ok(candidate) => passing.push(candidate),
            Err(rejection) => rejected.push(rejection),
        }
    }

    Ok((passing, rejected))
}

/// Run the full constraint chain for one entry.
pub(crate) fn check_entry(
    entry: &ModelEntry,
    catalog_index: usize,
    hardware: &HardwareProfile,
    user: &UserProfile,
) -> Result<PassingCandidate, RejectionReason> {
    let platform = hardware.platform;

    // 1a. Platform-level exclusions (e.g. HunyuanVideo on Apple Silicon).
    if entry.incompatible_with(platform) {
        let suggestion = if entry.alternatives.is_empty() {
            None
        } else {
            Some(format!("Consider: {}", entry.alternatives.join(", ")))
        };
        return Err(RejectionReason {
            model_id: entry.id.clone(),
            constraint: ConstraintKind::Incompat,
            detail: format!("{} is excluded on {}", entry.name, platform.id()),
            required: 0.0,
            available: 0.0,
            suggestion,
        });
    }

    // 1b. Variant-level platform support.
    let mut variants: Vec<&ModelVariant> = entry
        .variants
        .iter()
        .filter(|v| v.supported_on(platform))
        .collect();
    if variants.is_empty() {
        return Err(RejectionReason {
            model_id: entry.id.clone(),
            constraint: ConstraintKind::Platform,
            detail: format!("no variant supports {}", platform.id()),
            required: 0.0,
            available: 0.0,
            suggestion: None,
        });
    }

    // 1c. K-quants are unstable on the MPS backend.
    if platform.is_apple() {
        let before = variants.len();
        variants.retain(|v| v.precision.mps_safe());
        if variants.is_empty() && before > 0 {
            return Err(RejectionReason {
                model_id: entry.id.clone(),
                constraint: ConstraintKind::Platform,
                detail: "only K-quant GGUF variants are published; K-quants are unstable on MPS"
                    .to_string(),
                required: 0.0,
                available: 0.0,
                suggestion: Some(
                    "wait for a q8_0/q5_0/q4_0 rendition or use a native variant".to_string(),
                ),
            });
        }
    }

    // 2. Compute capability, and FP8 on hardware without FP8 units.
    let cc_available = hardware
        .gpu
        .compute_capability
        .map(|cc| cc.value())
        .unwrap_or(0.0);
    let cc_required = variants
        .iter()
        .filter_map(|v| {
            v.platform_support
                .for_platform(platform)
                .and_then(|ps| ps.min_compute_capability)
        })
        .fold(f32::INFINITY, f32::min);
    variants.retain(|v| {
        let cc_ok = v
            .platform_support
            .for_platform(platform)
            .and_then(|ps| ps.min_compute_capability)
            .map(|min| cc_available >= min)
            .unwrap_or(true);
        cc_ok && (v.precision != Precision::Fp8 || hardware.gpu.supports_fp8)
    });
    if variants.is_empty() {
        return Err(RejectionReason {
            model_id: entry.id.clone(),
            constraint: ConstraintKind::ComputeCapability,
            detail: format!(
                "needs compute capability {:.1}, device has {:.1}",
                if cc_required.is_finite() { cc_required } else { 8.9 },
                cc_available
            ),
            required: if cc_required.is_finite() { cc_required } else { 8.9 },
            available: cc_available,
            suggestion: None,
        });
    }

    // 3. VRAM: highest-quality variant whose floor fits effective VRAM.
    let effective_mb = hardware.effective_vram_mb();
    let selection = variants
        .iter()
        .find(|v| v.vram_min_mb as f32 <= effective_mb)
        .map(|v| (*v, ExecutionMode::GpuNative))
        // 4. Offload rescue.
        .or_else(|| {
            offload_selection(entry, hardware, &variants).map(|v| (v, ExecutionMode::GpuOffload))
        });

    let (mut variant, execution_mode) = match selection {
        Some(sel) => sel,
        None => {
            let min_required_gb = variants
                .iter()
                .map(|v| v.vram_min_gb())
                .fold(f32::INFINITY, f32::min);

            // 7. Cloud escape: only the VRAM rejection can be escaped.
            if entry.cloud.available && user.allows_cloud() {
                return Ok(PassingCandidate {
                    model_id: entry.id.clone(),
                    catalog_index,
                    selected_variant: None,
                    execution_mode: ExecutionMode::Cloud,
                    warnings: vec![format!(
                        "runs via {} (needs {:.1} GB VRAM locally, {:.1} GB effective available)",
                        entry.cloud.service.as_deref().unwrap_or("a cloud service"),
                        min_required_gb,
                        hardware.effective_vram_gb
                    )],
                });
            }

            return Err(vram_rejection(entry, hardware, min_required_gb));
        }
    };

    // FP8 trades a sliver of quality for a markedly faster render; users
    // leaning on speed get it when it also fits natively.
    if execution_mode == ExecutionMode::GpuNative
        && user.speed_priority >= SPEED_FP8_CUTOVER
        && variant.precision == Precision::Fp16
    {
        if let Some(fp8) = variants
            .iter()
            .find(|v| v.precision == Precision::Fp8 && v.vram_min_mb as f32 <= effective_mb)
            .copied()
        {
            variant = fp8;
        }
    }

    // 5. Storage space, with the post-install buffer.
    let storage_needed = entry.hardware.total_size_gb + STORAGE_BUFFER_GB;
    if hardware.storage.free_gb < storage_needed {
        return Err(RejectionReason {
            model_id: entry.id.clone(),
            constraint: ConstraintKind::StorageSpace,
            detail: format!(
                "needs {:.1} GB free (incl. {:.0} GB buffer), {:.1} GB available",
                storage_needed, STORAGE_BUFFER_GB, hardware.storage.free_gb
            ),
            required: storage_needed,
            available: hardware.storage.free_gb,
            suggestion: Some("free disk space or choose a smaller model set".to_string()),
        });
    }

    // 6. Absolute RAM floor declared by the entry.
    if hardware.ram.available_gb < entry.minimum_ram_gb {
        return Err(RejectionReason {
            model_id: entry.id.clone(),
            constraint: ConstraintKind::Ram,
            detail: format!(
                "needs {:.1} GB RAM available, {:.1} GB free",
                entry.minimum_ram_gb, hardware.ram.available_gb
            ),
            required: entry.minimum_ram_gb,
            available: hardware.ram.available_gb,
            suggestion: None,
        });
    }

    let mut warnings = Vec::new();
    if variant.quality_retention_percent < RETENTION_WARNING_PERCENT {
        warnings.push(format!(
            "quantized variant ({}) retains {}% quality",
            variant.precision, variant.quality_retention_percent
        ));
    }
    if hardware.platform.is_apple() && variant.precision.is_gguf() {
        warnings.push("GGUF runs via llama.cpp on Apple Silicon; throughput varies".to_string());
    }
    if execution_mode == ExecutionMode::GpuOffload {
        warnings.push(format!(
            "CPU offload active; expect ~{}x slower generation",
            offload_slowdown(hardware)
        ));
        warnings.push(format!(
            "uses up to {:.1} GB RAM for offloaded layers",
            hardware.ram.usable_for_offload_gb
        ));
    }

    Ok(PassingCandidate {
        model_id: entry.id.clone(),
        catalog_index,
        selected_variant: Some(variant.id.clone()),
        execution_mode,
        warnings,
    })
}

/// Offload preconditions and variant choice. Returns the highest-quality
/// variant that fits effective VRAM plus offload headroom, or `None` when
/// any precondition fails.
pub(crate) fn offload_selection<'a>(
    entry: &ModelEntry,
    hardware: &HardwareProfile,
    variants: &[&'a ModelVariant],
) -> Option<&'a ModelVariant> {
    if !entry.hardware.supports_cpu_offload {
        return None;
    }
    // On unified memory the RAM pool *is* the GPU pool; there is nothing
    // separate to spill into.
    if hardware.gpu.unified_memory {
        return None;
    }
    if !hardware.cpu.tier.can_host_offload() {
        return None;
    }

    let smallest_floor_gb = variants
        .iter()
        .map(|v| v.vram_min_gb())
        .fold(f32::INFINITY, f32::min);
    let ram_needed = entry
        .hardware
        .ram_for_offload_gb
        .unwrap_or(smallest_floor_gb);
    if hardware.ram.usable_for_offload_gb < ram_needed {
        return None;
    }

    // Offload is for variants that do not fit natively but do fit the
    // combined VRAM + RAM capacity.
    let effective_mb = hardware.effective_vram_mb();
    let capacity_mb = effective_mb + hardware.ram.usable_for_offload_gb * 1024.0;
    let candidate = variants
        .iter()
        .find(|v| {
            let floor = v.vram_min_mb as f32;
            floor > effective_mb && floor <= capacity_mb
        })
        .copied()?;

    // llama.cpp's offload path needs AVX2 on x86 hosts.
    if candidate.precision.is_gguf() && !hardware.cpu.supports_avx2 {
        return None;
    }

    Some(candidate)
}

/// Expected slowdown factor for offloaded execution on this CPU.
pub(crate) fn offload_slowdown(hardware: &HardwareProfile) -> u32 {
    use crate::hardware::CpuTier;
    if hardware.cpu.tier == CpuTier::High {
        5
    } else {
        10
    }
}

fn vram_rejection(
    entry: &ModelEntry,
    hardware: &HardwareProfile,
    min_required_gb: f32,
) -> RejectionReason {
    let capacity_gb = hardware.effective_vram_gb + hardware.ram.usable_for_offload_gb;
    let suggestion = if min_required_gb <= capacity_gb {
        Some(format!(
            "CPU offload not viable here; consider a more quantized variant or cloud execution \
             ({:.1} GB VRAM + {:.1} GB offload headroom)",
            hardware.effective_vram_gb, hardware.ram.usable_for_offload_gb
        ))
    } else {
        Some(format!(
            "needs a GPU with at least {:.0} GB VRAM, or cloud execution",
            min_required_gb.ceil()
        ))
    };

    RejectionReason {
        model_id: entry.id.clone(),
        constraint: ConstraintKind::Vram,
        detail: format!(
            "needs {:.1} GB VRAM, {:.1} GB effective available",
            min_required_gb, hardware.effective_vram_gb
        ),
        required: min_required_gb,
        available: hardware.effective_vram_gb,
        suggestion,
    }
}
