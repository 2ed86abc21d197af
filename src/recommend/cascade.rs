//! Resolution cascade for marginal candidates.
//!
//! When a preferred model cannot run natively (or runs poorly), rescues are
//! tried in a fixed order: quantization downgrade, CPU offload, family
//! substitution, workflow caps, cloud. The first success wins; a cascade
//! that exhausts every rung reports an actionable upgrade target.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;

use crate::catalog::{Catalog, GgufQuant, ModelEntry, ModelVariant, Precision};
use crate::hardware::HardwareProfile;
use crate::profile::UserProfile;

use super::constraint::{check_entry, offload_selection, offload_slowdown};
use super::types::{ResolutionKind, ResolutionResult};

/// Lighter stand-ins tried when a model cannot be rescued in place, keyed
/// by model id with family-level fallbacks.
pub static SUBSTITUTION_MAP: Lazy<BTreeMap<&'static str, &'static [&'static str]>> =
    Lazy::new(|| {
        let mut map: BTreeMap<&'static str, &'static [&'static str]> = BTreeMap::new();
        map.insert("wan_22_14b", &["wan_ti2v_5b", "wan_21_13b"]);
        map.insert("hunyuan_video", &["wan_ti2v_5b", "animatediff"]);
        map.insert("cogvideox", &["wan_21_13b", "animatediff"]);
        map.insert("flux_dev", &["flux_schnell", "sdxl"]);
        map.insert("flux", &["flux_schnell", "sdxl"]);
        map.insert("sdxl", &["sd15"]);
        map
    });

/// Quantization preference ladders, best quality first.
static NVIDIA_FP8_LADDER: &[Precision] = &[
    Precision::Fp16,
    Precision::Fp8,
    Precision::Gguf(GgufQuant::Q8_0),
    Precision::Gguf(GgufQuant::Q6K),
    Precision::Gguf(GgufQuant::Q5KM),
    Precision::Gguf(GgufQuant::Q4KM),
];
static APPLE_LADDER: &[Precision] = &[
    Precision::Fp16,
    Precision::Gguf(GgufQuant::Q8_0),
    Precision::Gguf(GgufQuant::Q5_0),
    Precision::Gguf(GgufQuant::Q4_0),
];
static GENERIC_LADDER: &[Precision] = &[
    Precision::Fp16,
    Precision::Gguf(GgufQuant::Q8_0),
    Precision::Gguf(GgufQuant::Q6K),
    Precision::Gguf(GgufQuant::Q5KM),
    Precision::Gguf(GgufQuant::Q4KM),
];

fn quant_ladder(hardware: &HardwareProfile) -> &'static [Precision] {
    if hardware.platform.is_apple() {
        APPLE_LADDER
    } else if hardware.platform.is_nvidia() && hardware.gpu.supports_fp8 {
        NVIDIA_FP8_LADDER
    } else {
        GENERIC_LADDER
    }
}

/// Run the cascade for one model. `current_variant` is the variant already
/// selected by Layer 1, if any; a quantization "rescue" onto the same
/// variant is a no-op and falls through to the next rung.
pub fn resolve(
    catalog: &Catalog,
    model_id: &str,
    current_variant: Option<&str>,
    hardware: &HardwareProfile,
    user: &UserProfile,
) -> ResolutionResult {
    let Some(entry) = catalog.get(model_id) else {
        return failure(model_id.to_string(), "model is not in the catalog".to_string());
    };

    // 1. Quantization downgrade.
    if let Some(variant) = try_quantization(entry, hardware) {
        if Some(variant.id.as_str()) != current_variant {
            return ResolutionResult {
                model_id: entry.id.clone(),
                viable: true,
                kind: ResolutionKind::QuantizationDowngrade,
                selected_variant: Some(variant.id.clone()),
                substituted_model_id: None,
                performance_factor: 1.0,
                quality_impact: format!(
                    "-{}% quality ({})",
                    100 - variant.quality_retention_percent.min(100),
                    quant_impact(&variant.precision)
                ),
            };
        }
    }

    // 2. CPU offload.
    let platform_variants: Vec<&ModelVariant> = entry
        .variants
        .iter()
        .filter(|v| v.supported_on(hardware.platform))
        .filter(|v| !hardware.platform.is_apple() || v.precision.mps_safe())
        .collect();
    if let Some(variant) = offload_selection(entry, hardware, &platform_variants) {
        let slowdown = offload_slowdown(hardware);
        return ResolutionResult {
            model_id: entry.id.clone(),
            viable: true,
            kind: ResolutionKind::CpuOffload,
            selected_variant: Some(variant.id.clone()),
            substituted_model_id: None,
            performance_factor: 1.0 / slowdown as f32,
            quality_impact: format!("quality unchanged; ~{slowdown}x slower than native GPU"),
        };
    }

    // 3. Family substitution: first substitute that clears Layer 1.
    for substitute_id in substitutes_for(entry) {
        let Some(index) = catalog.index_of(substitute_id) else {
            continue;
        };
        let substitute = catalog.entry_at(index);
        if let Ok(candidate) = check_entry(substitute, index, hardware, user) {
            return ResolutionResult {
                model_id: entry.id.clone(),
                viable: true,
                kind: ResolutionKind::Substitution,
                selected_variant: candidate.selected_variant,
                substituted_model_id: Some(substitute.id.clone()),
                performance_factor: 1.0,
                quality_impact: format!(
                    "{} stands in for {}; expect a different output character",
                    substitute.name, entry.name
                ),
            };
        }
    }

    // 4. Workflow caps only help a model that already runs somehow.
    let runs_somehow = platform_variants
        .iter()
        .any(|v| (v.vram_min_mb as f32) <= hardware.effective_vram_mb())
        || offload_selection(entry, hardware, &platform_variants).is_some();
    if runs_somehow {
        return ResolutionResult {
            model_id: entry.id.clone(),
            viable: true,
            kind: ResolutionKind::WorkflowOptimization,
            selected_variant: current_variant.map(str::to_string),
            substituted_model_id: None,
            performance_factor: 1.0,
            quality_impact: "cap batch size and resolution to stay inside the memory envelope"
                .to_string(),
        };
    }

    // 5. Cloud offload.
    if entry.cloud.available && user.allows_cloud() {
        let cost = entry
            .cloud
            .estimated_cost_per_gen
            .map(|c| format!(" (~${c:.2}/generation)"))
            .unwrap_or_default();
        return ResolutionResult {
            model_id: entry.id.clone(),
            viable: true,
            kind: ResolutionKind::Cloud,
            selected_variant: None,
            substituted_model_id: None,
            performance_factor: 1.0,
            quality_impact: format!(
                "runs remotely via {}{}",
                entry.cloud.service.as_deref().unwrap_or("a cloud service"),
                cost
            ),
        };
    }

    let target_gb = entry.min_vram_gb().ceil();
    failure(
        entry.id.clone(),
        format!(
            "no rescue applies; a GPU with at least {target_gb:.0} GB VRAM would run the \
             smallest variant"
        ),
    )
}

fn failure(model_id: String, message: String) -> ResolutionResult {
    ResolutionResult {
        model_id,
        viable: false,
        kind: ResolutionKind::None,
        selected_variant: None,
        substituted_model_id: None,
        performance_factor: 1.0,
        quality_impact: message,
    }
}

/// Walk the platform ladder and return the best variant that fits natively.
fn try_quantization<'a>(
    entry: &'a ModelEntry,
    hardware: &HardwareProfile,
) -> Option<&'a ModelVariant> {
    let effective_mb = hardware.effective_vram_mb();
    for precision in quant_ladder(hardware) {
        let found = entry.variants.iter().find(|v| {
            v.precision == *precision
                && v.supported_on(hardware.platform)
                && v.vram_min_mb as f32 <= effective_mb
        });
        if let Some(variant) = found {
            return Some(variant);
        }
    }
    None
}

fn substitutes_for(entry: &ModelEntry) -> &'static [&'static str] {
    SUBSTITUTION_MAP
        .get(entry.id.as_str())
        .or_else(|| SUBSTITUTION_MAP.get(entry.family.as_str()))
        .copied()
        .unwrap_or(&[])
}

fn quant_impact(precision: &Precision) -> &'static str {
    match precision {
        Precision::Fp16 => "minimal quality loss",
        Precision::Fp8 => "slight quality reduction, markedly faster",
        Precision::Gguf(GgufQuant::Q8_0) => "minor quality loss, ~40% less VRAM",
        Precision::Gguf(GgufQuant::Q6K) => "minor quality loss, ~50% less VRAM",
        Precision::Gguf(GgufQuant::Q5KM) | Precision::Gguf(GgufQuant::Q5_0) => {
            "noticeable quality loss, ~50% less VRAM"
        }
        Precision::Gguf(GgufQuant::Q4KM) | Precision::Gguf(GgufQuant::Q4_0) => {
            "significant quality loss, ~60% less VRAM"
        }
        Precision::Other(_) => "quality impact varies",
    }
}
