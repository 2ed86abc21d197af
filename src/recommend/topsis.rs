//! Layer 3: TOPSIS multi-criteria ranking.
//!
//! Standard TOPSIS over five benefit criteria: vector-normalize each
//! column, weight, take distances to the ideal and anti-ideal rows, and
//! rank by the closeness coefficient. Ties break by catalog order.

use crate::catalog::{Catalog, ComputeIntensity, ModelVariant};
use crate::error::{CancelToken, CoreError};
use crate::hardware::HardwareProfile;
use crate::profile::UserProfile;

use super::types::{CriterionScores, ExecutionMode, RankedCandidate, ScoredCandidate};

/// Criterion weights: content, hardware, speed, ecosystem, approach.
pub const DEFAULT_WEIGHTS: [f32; 5] = [0.35, 0.25, 0.15, 0.15, 0.10];
/// Weight set used when the user leans hard on speed.
pub const SPEED_PRIORITY_WEIGHTS: [f32; 5] = [0.25, 0.20, 0.30, 0.15, 0.10];
/// Speed priority at or above this switches the weight set.
pub const SPEED_PRIORITY_CUTOVER: f32 = 0.7;

/// Division-by-zero guard in the closeness coefficient.
pub const EPSILON: f32 = 1e-10;

/// Below this speed priority the speed criterion is a neutral constant.
const SPEED_NEUTRAL_BELOW: f32 = 0.3;
const SPEED_NEUTRAL_VALUE: f32 = 0.7;
/// Cloud candidates have no local load or VRAM footprint; they take
/// neutral criterion values instead.
const CLOUD_HARDWARE_FIT: f32 = 0.5;

const TENSORRT_SPEED_BONUS: f32 = 0.1;

/// Rank scored candidates for one modality pipeline.
pub fn rank_candidates(
    catalog: &Catalog,
    scored: Vec<ScoredCandidate>,
    hardware: &HardwareProfile,
    user: &UserProfile,
    cancel: &CancelToken,
) -> Result<Vec<RankedCandidate>, CoreError> {
    cancel.check()?;
    if scored.is_empty() {
        return Ok(Vec::new());
    }

    let weights = if user.speed_priority >= SPEED_PRIORITY_CUTOVER {
        SPEED_PRIORITY_WEIGHTS
    } else {
        DEFAULT_WEIGHTS
    };

    // 1. Decision matrix.
    let mut matrix: Vec<[f32; 5]> = Vec::with_capacity(scored.len());
    for candidate in &scored {
        cancel.check()?;
        let criteria = criterion_scores(catalog, candidate, hardware, user);
        matrix.push(criteria.as_array());
    }

    // 2–3. Vector-normalize each column, then weight.
    let mut norms = [0.0f32; 5];
    for row in &matrix {
        for (j, value) in row.iter().enumerate() {
            norms[j] += value * value;
        }
    }
    for norm in &mut norms {
        *norm = norm.sqrt();
    }
    let weighted: Vec<[f32; 5]> = matrix
        .iter()
        .map(|row| {
            let mut out = [0.0f32; 5];
            for j in 0..5 {
                let normalized = if norms[j] > 0.0 { row[j] / norms[j] } else { 0.0 };
                out[j] = normalized * weights[j];
            }
            out
        })
        .collect();

    // 4. Ideal and anti-ideal rows (all criteria are benefit criteria).
    let mut ideal = [f32::MIN; 5];
    let mut anti_ideal = [f32::MAX; 5];
    for row in &weighted {
        for j in 0..5 {
            ideal[j] = ideal[j].max(row[j]);
            anti_ideal[j] = anti_ideal[j].min(row[j]);
        }
    }

    // 5. Closeness coefficients.
    let mut ranked: Vec<RankedCandidate> = scored
        .into_iter()
        .zip(matrix.iter().zip(weighted.iter()))
        .map(|(candidate, (raw, row))| {
            let mut d_plus = 0.0f32;
            let mut d_minus = 0.0f32;
            for j in 0..5 {
                d_plus += (row[j] - ideal[j]).powi(2);
                d_minus += (row[j] - anti_ideal[j]).powi(2);
            }
            let closeness = d_minus.sqrt() / (d_plus.sqrt() + d_minus.sqrt() + EPSILON);

            let requires_resolution = needs_resolution(catalog, &candidate, hardware);
            RankedCandidate {
                scored: candidate,
                topsis_score: closeness,
                criteria: CriterionScores::from_array(*raw),
                weighted: CriterionScores::from_array(*row),
                rank: 0,
                requires_resolution,
            }
        })
        .collect();

    // 6. Sort descending by closeness; catalog order breaks ties.
    ranked.sort_by(|a, b| {
        b.topsis_score
            .total_cmp(&a.topsis_score)
            .then(a.scored.passing.catalog_index.cmp(&b.scored.passing.catalog_index))
    });
    for (i, candidate) in ranked.iter_mut().enumerate() {
        candidate.rank = (i + 1) as u32;
        if !(0.0..=1.0).contains(&candidate.topsis_score) {
            return Err(CoreError::invariant(format!(
                "TOPSIS score {} out of range for '{}'",
                candidate.topsis_score,
                candidate.model_id()
            )));
        }
    }

    Ok(ranked)
}

fn criterion_scores(
    catalog: &Catalog,
    candidate: &ScoredCandidate,
    hardware: &HardwareProfile,
    user: &UserProfile,
) -> CriterionScores {
    let entry = catalog.entry_at(candidate.passing.catalog_index);
    let variant = candidate
        .passing
        .selected_variant
        .as_deref()
        .and_then(|id| entry.variant(id));

    CriterionScores {
        content_similarity: candidate.similarity,
        hardware_fit: hardware_fit(variant, entry, hardware),
        speed_fit: speed_fit(variant, entry, hardware, user),
        ecosystem_maturity: entry.ecosystem_maturity.clamp(0.0, 1.0),
        approach_fit: entry.approach_fit.clamp(0.0, 1.0),
    }
}

/// Headroom of effective VRAM over the variant's envelope, degraded by the
/// MPS penalty and the chassis' sustained-throughput ratio.
fn hardware_fit(
    variant: Option<&ModelVariant>,
    entry: &crate::catalog::ModelEntry,
    hardware: &HardwareProfile,
) -> f32 {
    let Some(variant) = variant else {
        return CLOUD_HARDWARE_FIT;
    };

    let effective_mb = hardware.effective_vram_mb();
    let min = variant.vram_min_mb as f32;
    let recommended = variant.vram_recommended_mb as f32;

    let mut fit = if effective_mb >= recommended {
        1.0
    } else if recommended > min {
        (0.5 + 0.5 * (effective_mb - min) / (recommended - min)).clamp(0.0, 1.0)
    } else if effective_mb >= min {
        1.0
    } else {
        0.0
    };

    if hardware.platform.is_apple() {
        fit *= 1.0 - entry.capabilities.mps_performance_penalty.clamp(0.0, 1.0);
    }

    let ratio = hardware.form_factor.sustained_performance_ratio;
    match entry.hardware.compute_intensity {
        ComputeIntensity::High => fit *= ratio,
        ComputeIntensity::Medium => fit *= (1.0 + ratio) / 2.0,
        ComputeIntensity::Low => {}
    }

    fit
}

/// Load-time based speed score, neutral when the user does not care.
fn speed_fit(
    variant: Option<&ModelVariant>,
    entry: &crate::catalog::ModelEntry,
    hardware: &HardwareProfile,
    user: &UserProfile,
) -> f32 {
    let Some(variant) = variant else {
        // Cloud: nothing loads from local disk.
        return SPEED_NEUTRAL_VALUE;
    };
    if user.speed_priority < SPEED_NEUTRAL_BELOW {
        return SPEED_NEUTRAL_VALUE;
    }

    let load_time_s = variant.download_size_gb * 1024.0 / hardware.storage.read_mbps.max(1.0);
    let mut fit = match load_time_s {
        t if t <= 5.0 => 1.0,
        t if t <= 15.0 => 0.8,
        t if t <= 30.0 => 0.6,
        t if t <= 60.0 => 0.4,
        _ => 0.2,
    };

    if entry.hardware.supports_tensorrt && hardware.platform.is_nvidia() {
        fit = (fit + TENSORRT_SPEED_BONUS).min(1.0);
    }
    fit
}

/// Marginal picks go through the resolution cascade: anything not running
/// natively, and native fits below the recommended VRAM envelope.
fn needs_resolution(
    catalog: &Catalog,
    candidate: &ScoredCandidate,
    hardware: &HardwareProfile,
) -> bool {
    match candidate.passing.execution_mode {
        ExecutionMode::GpuOffload | ExecutionMode::Cloud => true,
        ExecutionMode::GpuNative => {
            let entry = catalog.entry_at(candidate.passing.catalog_index);
            candidate
                .passing
                .selected_variant
                .as_deref()
                .and_then(|id| entry.variant(id))
                .map(|v| hardware.effective_vram_mb() < v.vram_recommended_mb as f32)
                .unwrap_or(false)
        }
    }
}
