//! The three-layer recommendation pipeline.
//!
//! `recommend()` runs, per requested modality: the constraint filter
//! (Layer 1), content scoring (Layer 2) and TOPSIS ranking (Layer 3), then
//! the resolution cascade for marginal top picks, the space fitter, and
//! the explainer. Every stage is pure given its inputs; the same profile
//! and catalog always produce the same manifest.

pub mod cascade;
pub mod constraint;
pub mod content;
pub mod explain;
pub mod space;
pub mod topsis;
pub mod types;

pub use cascade::resolve;
pub use constraint::{filter_candidates, STORAGE_BUFFER_GB};
pub use content::score_candidates;
pub use space::{adjust_for_space, SpaceFit, SpaceItem};
pub use topsis::rank_candidates;
pub use types::*;

use std::collections::{BTreeMap, BTreeSet};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info};

use crate::catalog::Catalog;
use crate::error::{CancelToken, CoreError};
use crate::hardware::HardwareProfile;
use crate::profile::{Modality, UserProfile};

/// Ranked candidates per modality that go through the resolution cascade.
pub const RESOLUTION_TOP_K: usize = 3;

/// Assumed sustained download throughput, ~200 MB/min.
const INSTALL_MINUTES_PER_GB: f32 = 5.0;

/// Explanations generated per modality.
const EXPLAINED_PER_MODALITY: usize = 3;

/// Run the full pipeline. Pure: no state outlives the returned result.
pub fn recommend(
    user: &UserProfile,
    hardware: &HardwareProfile,
    catalog: &Catalog,
    use_case_priorities: Option<&BTreeMap<String, u32>>,
) -> Result<RecommendationResult, CoreError> {
    recommend_with_cancel(user, hardware, catalog, use_case_priorities, &CancelToken::new())
}

/// `recommend` with an external cancellation signal. Stages check the token
/// at entry and between candidates; cancellation aborts without partial
/// results.
pub fn recommend_with_cancel(
    user: &UserProfile,
    hardware: &HardwareProfile,
    catalog: &Catalog,
    use_case_priorities: Option<&BTreeMap<String, u32>>,
    cancel: &CancelToken,
) -> Result<RecommendationResult, CoreError> {
    cancel.check()?;

    let modalities = user.requested_modalities();
    info!(modalities = modalities.len(), catalog = catalog.len(), "starting recommendation run");

    let mut trace = Vec::new();
    let mut per_modality_rankings: BTreeMap<Modality, Vec<RankedCandidate>> = BTreeMap::new();
    let mut rejections_by_modality: BTreeMap<Modality, Vec<RejectionReason>> = BTreeMap::new();
    let mut resolutions: BTreeMap<String, ResolutionResult> = BTreeMap::new();
    let mut dead_end_warnings = Vec::new();

    for &modality in &modalities {
        cancel.check()?;

        let (passing, rejected) =
            constraint::filter_candidates(catalog, modality, hardware, user, cancel)?;
        trace.push(format!(
            "{modality}: layer 1 kept {} of {} candidates",
            passing.len(),
            passing.len() + rejected.len()
        ));
        debug!(%modality, passed = passing.len(), rejected = rejected.len(), "constraint layer");

        if passing.is_empty() {
            // Non-fatal dead end: surfaced per modality instead of aborting
            // the other pipelines.
            let dead_end = CoreError::NoViableCandidates { modality };
            let cloud_exists = catalog
                .candidates_for(modality)
                .iter()
                .any(|(_, entry)| entry.cloud.available);
            dead_end_warnings.push(HardwareWarning {
                kind: "no_viable_candidates".to_string(),
                severity: Severity::Error,
                title: format!("No viable {modality} models"),
                message: format!(
                    "{dead_end}: every candidate was eliminated by hardware constraints{}",
                    if cloud_exists && !user.allows_cloud() {
                        "; cloud options exist but your profile is local-only"
                    } else {
                        ""
                    }
                ),
                suggestions: vec![
                    "Review the rejection list for the blocking constraint".to_string(),
                ],
            });
            rejections_by_modality.insert(modality, rejected);
            per_modality_rankings.insert(modality, Vec::new());
            continue;
        }

        let scored = content::score_candidates(catalog, &passing, modality, user, cancel)?;
        let ranked = topsis::rank_candidates(catalog, scored, hardware, user, cancel)?;
        trace.push(format!(
            "{modality}: ranked {}, top pick {}",
            ranked.len(),
            ranked.first().map(|r| r.model_id()).unwrap_or("-")
        ));

        for candidate in ranked
            .iter()
            .take(RESOLUTION_TOP_K)
            .filter(|c| c.requires_resolution)
        {
            cancel.check()?;
            let resolution = cascade::resolve(
                catalog,
                candidate.model_id(),
                candidate.scored.passing.selected_variant.as_deref(),
                hardware,
                user,
            );
            trace.push(format!(
                "{modality}: {} resolved via {:?}",
                candidate.model_id(),
                resolution.kind
            ));
            resolutions.insert(candidate.model_id().to_string(), resolution);
        }

        rejections_by_modality.insert(modality, rejected);
        per_modality_rankings.insert(modality, ranked);
    }

    cancel.check()?;

    // Primary pick per modality, with viable resolutions applied.
    let mut selected = Vec::new();
    let mut space_items = Vec::new();
    let mut seen = BTreeSet::new();
    for (&modality, ranked) in &per_modality_rankings {
        let Some(top) = ranked.first() else { continue };

        let mut model_id = top.model_id().to_string();
        let mut variant_id = top.scored.passing.selected_variant.clone();
        let mut execution_mode = top.scored.passing.execution_mode;

        if let Some(resolution) = resolutions.get(&model_id).filter(|r| r.viable) {
            match resolution.kind {
                ResolutionKind::QuantizationDowngrade => {
                    variant_id = resolution.selected_variant.clone();
                    execution_mode = ExecutionMode::GpuNative;
                }
                ResolutionKind::CpuOffload => {
                    variant_id = resolution.selected_variant.clone();
                    execution_mode = ExecutionMode::GpuOffload;
                }
                ResolutionKind::Substitution => {
                    if let Some(index) = resolution
                        .substituted_model_id
                        .as_deref()
                        .and_then(|id| catalog.index_of(id))
                    {
                        let substitute = catalog.entry_at(index);
                        if let Ok(candidate) =
                            constraint::check_entry(substitute, index, hardware, user)
                        {
                            model_id = substitute.id.clone();
                            variant_id = candidate.selected_variant;
                            execution_mode = candidate.execution_mode;
                        }
                    }
                }
                ResolutionKind::Cloud => {
                    variant_id = None;
                    execution_mode = ExecutionMode::Cloud;
                }
                ResolutionKind::WorkflowOptimization | ResolutionKind::None => {}
            }
        }

        if !seen.insert(model_id.clone()) {
            continue;
        }

        let entry = catalog.get(&model_id);
        let size_gb = if execution_mode == ExecutionMode::Cloud {
            0.0
        } else {
            entry.map(|e| e.hardware.total_size_gb).unwrap_or(0.0)
        };
        space_items.push(SpaceItem {
            model_id: model_id.clone(),
            size_gb,
            priority: modality_priority(user, modality, use_case_priorities),
            cloud_available: entry.map(|e| e.cloud.available).unwrap_or(false),
        });
        selected.push(ManifestEntry {
            model_id,
            variant_id,
            execution_mode,
        });
    }

    let fit = space::adjust_for_space(&space_items, hardware.storage.free_gb);
    if !fit.dropped.is_empty() {
        trace.push(format!(
            "space fitter dropped {} (short {:.0} GB)",
            fit.dropped.join(", "),
            fit.space_short_gb
        ));
    }
    let kept: BTreeSet<&str> = fit.kept.iter().map(String::as_str).collect();
    let selected: Vec<ManifestEntry> = selected
        .into_iter()
        .filter(|e| kept.contains(e.model_id.as_str()))
        .collect();
    let total_size_gb: f32 = space_items
        .iter()
        .filter(|i| kept.contains(i.model_id.as_str()))
        .map(|i| i.size_gb)
        .sum();

    if !selected.is_empty()
        && total_size_gb + STORAGE_BUFFER_GB > hardware.storage.free_gb + 1e-3
    {
        return Err(CoreError::invariant(format!(
            "space fitter kept {total_size_gb:.1} GB against {:.1} GB free",
            hardware.storage.free_gb
        )));
    }

    let manifest = InstallManifest {
        selected,
        total_size_gb,
        estimated_install_minutes: (total_size_gb * INSTALL_MINUTES_PER_GB).ceil() as u32,
    };

    // Warnings: probe notes, catalog notes, cross-cutting synthesis,
    // per-modality dead ends.
    let mut warnings: Vec<HardwareWarning> = hardware
        .warnings
        .iter()
        .map(|note| HardwareWarning {
            kind: "probe_note".to_string(),
            severity: Severity::Info,
            title: "Hardware detection note".to_string(),
            message: note.clone(),
            suggestions: Vec::new(),
        })
        .collect();
    warnings.extend(catalog.load_warnings.iter().map(|note| HardwareWarning {
        kind: "catalog_note".to_string(),
        severity: Severity::Info,
        title: "Catalog note".to_string(),
        message: note.clone(),
        suggestions: Vec::new(),
    }));
    warnings.extend(explain::synthesize_warnings(
        catalog,
        hardware,
        user,
        &manifest,
        &per_modality_rankings,
    ));
    warnings.extend(dead_end_warnings);

    let mut reasoning = Vec::new();
    for (modality, ranked) in &per_modality_rankings {
        let modality_rejections = rejections_by_modality
            .get(modality)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        for candidate in ranked.iter().take(EXPLAINED_PER_MODALITY) {
            reasoning.push(explain::explain_candidate(
                catalog,
                candidate,
                resolutions.get(candidate.model_id()),
                modality_rejections,
                hardware,
            ));
        }
    }

    let rejections: Vec<RejectionReason> = rejections_by_modality
        .into_values()
        .flatten()
        .collect();

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    info!(
        selected = manifest.selected.len(),
        total_gb = manifest.total_size_gb,
        "recommendation run complete"
    );

    Ok(RecommendationResult {
        id: format!("rec-{timestamp}"),
        timestamp,
        per_modality_rankings,
        manifest,
        warnings,
        reasoning,
        rejections,
        resolutions,
        cloud_fallback: fit.cloud_fallback,
        space_short_gb: fit.space_short_gb,
        reasoning_trace: trace,
    })
}

/// Priority of a modality: the best (lowest) priority among the use cases
/// that need it, defaulting to each use case's position in the profile.
fn modality_priority(
    user: &UserProfile,
    modality: Modality,
    use_case_priorities: Option<&BTreeMap<String, u32>>,
) -> u32 {
    user.use_cases
        .iter()
        .enumerate()
        .filter(|(_, uc)| uc.required_modalities.contains(&modality))
        .map(|(position, uc)| {
            use_case_priorities
                .and_then(|p| p.get(&uc.id).copied())
                .unwrap_or(position as u32)
        })
        .min()
        .unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::UseCase;
    use crate::testutil::user_with_image;

    #[test]
    fn test_modality_priority_prefers_explicit_map() {
        let mut user = user_with_image();
        user.use_cases.push(UseCase {
            id: "clips".to_string(),
            required_modalities: [Modality::Video].into_iter().collect(),
        });

        let mut priorities = BTreeMap::new();
        priorities.insert("clips".to_string(), 0u32);

        assert_eq!(modality_priority(&user, Modality::Video, Some(&priorities)), 0);
        // Without the map, position order applies: image use case is first.
        assert_eq!(modality_priority(&user, Modality::Image, None), 0);
        assert_eq!(modality_priority(&user, Modality::Video, None), 1);
        // Unrequested modalities sort last.
        assert_eq!(modality_priority(&user, Modality::Audio, None), u32::MAX);
    }
}
