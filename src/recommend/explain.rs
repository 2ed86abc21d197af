//! Explanation and warning synthesis.
//!
//! Turns pipeline output into the human-readable reasoning the wizard
//! shows: a per-model summary with hardware fit and feature evidence, and
//! cross-cutting hardware warnings grouped by severity.

use crate::catalog::Catalog;
use crate::hardware::{HardwareProfile, StorageTier};
use crate::profile::UserProfile;

use super::constraint::offload_slowdown;
use super::types::{
    ConstraintKind, ExecutionMode, HardwareWarning, InstallManifest, RankedCandidate,
    RecommendationExplanation, RecommendationResult, RejectionReason, ResolutionResult, Severity,
};

/// Laptops sustaining below this ratio get an informational note.
const LAPTOP_RATIO_NOTE_BELOW: f32 = 0.8;
/// Offload headroom below this plus an offload selection is a warning.
const LOW_OFFLOAD_HEADROOM_GB: f32 = 16.0;
/// Storage note threshold for speed-focused users.
const SPEED_FOCUS_THRESHOLD: f32 = 0.7;

/// Rejections shown per explanation.
const COMPETING_REJECTIONS: usize = 3;

/// Build the explanation block for one ranked candidate.
pub fn explain_candidate(
    catalog: &Catalog,
    ranked: &RankedCandidate,
    resolution: Option<&ResolutionResult>,
    rejections: &[RejectionReason],
    hardware: &HardwareProfile,
) -> RecommendationExplanation {
    let entry = catalog.entry_at(ranked.scored.passing.catalog_index);
    let variant = ranked
        .scored
        .passing
        .selected_variant
        .as_deref()
        .and_then(|id| entry.variant(id));

    let mode_phrase = match ranked.scored.passing.execution_mode {
        ExecutionMode::GpuNative => "runs natively on your GPU",
        ExecutionMode::GpuOffload => "runs with CPU offload",
        ExecutionMode::Cloud => "runs in the cloud",
    };
    let resolution_phrase = resolution
        .filter(|r| r.viable)
        .map(|r| format!(" after {}", resolution_label(r)))
        .unwrap_or_default();
    let summary = format!(
        "{} is the top {} pick: it {}{} and matched your preferences at {:.0}%.",
        entry.name,
        ranked.scored.modality,
        mode_phrase,
        resolution_phrase,
        ranked.scored.similarity * 100.0
    );

    let hardware_note = match (variant, ranked.scored.passing.execution_mode) {
        (Some(v), ExecutionMode::GpuOffload) => format!(
            "needs {:.1} GB VRAM; {:.1} GB effective plus {:.1} GB RAM offload headroom covers \
             it at ~{}x slower throughput",
            v.vram_min_gb(),
            hardware.effective_vram_gb,
            hardware.ram.usable_for_offload_gb,
            offload_slowdown(hardware)
        ),
        (Some(v), _) => format!(
            "needs {:.1} GB VRAM ({:.1} GB recommended); {:.1} GB effective available",
            v.vram_min_gb(),
            v.vram_recommended_mb as f32 / 1024.0,
            hardware.effective_vram_gb
        ),
        (None, _) => format!(
            "no local install; {:.1} GB effective VRAM stays free for other models",
            hardware.effective_vram_gb
        ),
    };

    let resolution_note = resolution.map(|r| {
        if r.viable {
            format!("{}: {}", resolution_label(r), r.quality_impact)
        } else {
            r.quality_impact.clone()
        }
    });

    // Strongest constraint first; catalog order breaks ties (stable sort).
    let mut ordered: Vec<&RejectionReason> = rejections.iter().collect();
    ordered.sort_by_key(|r| constraint_priority(r.constraint));
    let competing_rejections = ordered
        .iter()
        .take(COMPETING_REJECTIONS)
        .map(|r| format!("{}: {}", r.model_id, r.detail))
        .collect();

    RecommendationExplanation {
        model_id: entry.id.clone(),
        summary,
        hardware_note,
        matching_features: ranked.scored.matching_features.clone(),
        missing_features: ranked.scored.missing_features.clone(),
        resolution_note,
        competing_rejections,
    }
}

/// Constraint-check priority, mirroring the order the constraint layer
/// applies its checks.
fn constraint_priority(kind: ConstraintKind) -> u8 {
    match kind {
        ConstraintKind::Incompat => 0,
        ConstraintKind::Platform => 1,
        ConstraintKind::ComputeCapability => 2,
        ConstraintKind::Vram => 3,
        ConstraintKind::StorageSpace => 4,
        ConstraintKind::Ram => 5,
        ConstraintKind::Storage => 6,
    }
}

fn resolution_label(resolution: &ResolutionResult) -> &'static str {
    use super::types::ResolutionKind;
    match resolution.kind {
        ResolutionKind::None => "no rescue",
        ResolutionKind::QuantizationDowngrade => "a quantization downgrade",
        ResolutionKind::CpuOffload => "enabling CPU offload",
        ResolutionKind::Substitution => "substituting a lighter model",
        ResolutionKind::WorkflowOptimization => "workflow caps",
        ResolutionKind::Cloud => "moving to the cloud",
    }
}

/// Cross-cutting warnings derived from the hardware, the final manifest and
/// the surviving rankings.
pub fn synthesize_warnings(
    catalog: &Catalog,
    hardware: &HardwareProfile,
    user: &UserProfile,
    manifest: &InstallManifest,
    rankings: &std::collections::BTreeMap<crate::profile::Modality, Vec<RankedCandidate>>,
) -> Vec<HardwareWarning> {
    let mut warnings = Vec::new();

    if hardware.form_factor.is_laptop
        && hardware.form_factor.sustained_performance_ratio < LAPTOP_RATIO_NOTE_BELOW
    {
        warnings.push(HardwareWarning {
            kind: "laptop_sustained".to_string(),
            severity: Severity::Info,
            title: "Laptop GPU".to_string(),
            message: format!(
                "Sustained throughput is ~{:.0}% of the desktop part; long generations will \
                 run proportionally slower.",
                hardware.form_factor.sustained_performance_ratio * 100.0
            ),
            suggestions: vec!["Keep the laptop plugged in and well ventilated".to_string()],
        });
    }

    if hardware.storage.tier == StorageTier::Slow && user.speed_priority >= SPEED_FOCUS_THRESHOLD {
        let largest_gb = manifest
            .selected
            .iter()
            .filter_map(|entry| {
                let model = catalog.get(&entry.model_id)?;
                let variant = entry.variant_id.as_deref().and_then(|id| model.variant(id))?;
                Some(variant.download_size_gb)
            })
            .fold(0.0f32, f32::max);
        let load_s = largest_gb * 1024.0 / hardware.storage.read_mbps.max(1.0);
        warnings.push(HardwareWarning {
            kind: "slow_storage".to_string(),
            severity: Severity::Warning,
            title: "Slow storage".to_string(),
            message: format!(
                "You prioritized speed but models load from an HDD-class drive; the largest \
                 selected model will take ~{load_s:.0} s to load."
            ),
            suggestions: vec!["Install models to an SSD or NVMe drive".to_string()],
        });
    }

    let mut offloaded: Vec<&str> = manifest
        .selected
        .iter()
        .filter(|e| e.execution_mode == ExecutionMode::GpuOffload)
        .map(|e| e.model_id.as_str())
        .collect();
    for ranked in rankings.values().flatten() {
        if ranked.scored.passing.execution_mode == ExecutionMode::GpuOffload
            && !offloaded.contains(&ranked.model_id())
        {
            offloaded.push(ranked.model_id());
        }
    }
    if !offloaded.is_empty() {
        let slowdown = offload_slowdown(hardware);
        warnings.push(HardwareWarning {
            kind: "cpu_offload".to_string(),
            severity: Severity::Info,
            title: "CPU offload active".to_string(),
            message: format!(
                "{} will spill layers to RAM; expect ~{}x slower generation.",
                offloaded.join(", "),
                slowdown
            ),
            suggestions: Vec::new(),
        });

        if hardware.ram.usable_for_offload_gb < LOW_OFFLOAD_HEADROOM_GB {
            warnings.push(HardwareWarning {
                kind: "low_offload_headroom".to_string(),
                severity: Severity::Warning,
                title: "Limited offload headroom".to_string(),
                message: format!(
                    "Only {:.1} GB RAM is usable for offloaded layers; close other \
                     applications before generating.",
                    hardware.ram.usable_for_offload_gb
                ),
                suggestions: vec!["Add RAM or pick a smaller variant".to_string()],
            });
        }
    }

    let gguf_selected = manifest.selected.iter().any(|e| {
        catalog
            .get(&e.model_id)
            .and_then(|model| {
                e.variant_id
                    .as_deref()
                    .and_then(|id| model.variant(id))
                    .map(|v| v.precision.is_gguf())
            })
            .unwrap_or(false)
    });
    if gguf_selected && !hardware.cpu.supports_avx2 {
        warnings.push(HardwareWarning {
            kind: "gguf_no_avx2".to_string(),
            severity: Severity::Warning,
            title: "GGUF without AVX2".to_string(),
            message: "A GGUF variant was selected but this CPU lacks AVX2; llama.cpp will fall \
                      back to much slower kernels."
                .to_string(),
            suggestions: Vec::new(),
        });
    }

    warnings
}

/// Plain-text report for the CLI.
pub fn render_text(result: &RecommendationResult, catalog: &Catalog) -> String {
    let mut out = String::new();

    out.push_str("Recommended models\n");
    out.push_str("==================\n");
    for (modality, ranked) in &result.per_modality_rankings {
        out.push_str(&format!("\n[{modality}]\n"));
        let Some(primary) = result.primary_for(*modality) else {
            out.push_str("  (no viable candidates)\n");
            continue;
        };
        out.push_str(&format!(
            "  primary: {}\n",
            catalog
                .get(primary.model_id())
                .map(|e| e.name.as_str())
                .unwrap_or(primary.model_id())
        ));
        for candidate in ranked.iter().take(3) {
            let name = catalog
                .get(candidate.model_id())
                .map(|e| e.name.as_str())
                .unwrap_or(candidate.model_id());
            out.push_str(&format!(
                "  #{} {} (score {:.3}, content {:.2})\n",
                candidate.rank, name, candidate.topsis_score, candidate.criteria.content_similarity
            ));
        }
    }

    out.push_str("\nInstall plan\n");
    out.push_str("============\n");
    for entry in &result.manifest.selected {
        out.push_str(&format!(
            "  {} [{}]{}\n",
            entry.model_id,
            match entry.execution_mode {
                ExecutionMode::GpuNative => "native",
                ExecutionMode::GpuOffload => "offload",
                ExecutionMode::Cloud => "cloud",
            },
            entry
                .variant_id
                .as_deref()
                .map(|v| format!(" variant {v}"))
                .unwrap_or_default()
        ));
    }
    out.push_str(&format!(
        "  total {:.1} GB, ~{} min install\n",
        result.manifest.total_size_gb, result.manifest.estimated_install_minutes
    ));
    if result.space_short_gb > 0.0 {
        out.push_str(&format!(
            "  disk is {:.0} GB short; cloud fallback: {}\n",
            result.space_short_gb,
            if result.cloud_fallback.is_empty() {
                "none".to_string()
            } else {
                result.cloud_fallback.join(", ")
            }
        ));
    }

    if !result.warnings.is_empty() {
        out.push_str("\nWarnings\n");
        out.push_str("========\n");
        for warning in &result.warnings {
            out.push_str(&format!(
                "  [{:?}] {}: {}\n",
                warning.severity, warning.title, warning.message
            ));
        }
    }

    for explanation in &result.reasoning {
        out.push_str(&format!("\n{}\n", explanation.summary));
        out.push_str(&format!("  {}\n", explanation.hardware_note));
        if !explanation.matching_features.is_empty() {
            out.push_str(&format!(
                "  matches: {}\n",
                explanation.matching_features.join(", ")
            ));
        }
        if !explanation.missing_features.is_empty() {
            out.push_str(&format!(
                "  missing: {}\n",
                explanation.missing_features.join(", ")
            ));
        }
        if let Some(note) = &explanation.resolution_note {
            out.push_str(&format!("  resolution: {note}\n"));
        }
    }

    out
}

/// Debug rendering incl. per-criterion weighted values; not user-facing.
pub fn render_debug(result: &RecommendationResult) -> String {
    let mut out = String::new();
    for (modality, ranked) in &result.per_modality_rankings {
        out.push_str(&format!("[{modality}]\n"));
        for candidate in ranked {
            let w = &candidate.weighted;
            out.push_str(&format!(
                "  #{} {} closeness={:.4} weighted: content={:.4} hw={:.4} speed={:.4} \
                 eco={:.4} approach={:.4}\n",
                candidate.rank,
                candidate.model_id(),
                candidate.topsis_score,
                w.content_similarity,
                w.hardware_fit,
                w.speed_fit,
                w.ecosystem_maturity,
                w.approach_fit
            ));
        }
    }
    out
}
