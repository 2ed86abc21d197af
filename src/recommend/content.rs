//! Layer 2: content-based scoring.
//!
//! Each modality has a scorer value that knows its dimension axes and how
//! to project user preferences and model capabilities onto them. Scorers
//! are registered in a map keyed by modality; candidates spanning several
//! requested modalities score as the mean of their per-modality cosines.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;

use crate::catalog::{Catalog, ModelEntry};
use crate::error::{CancelToken, CoreError};
use crate::profile::{Modality, UserProfile};

use super::types::{PassingCandidate, ScoredCandidate};

/// Both sides must clear this for a dimension to count as a match.
const MATCH_THRESHOLD: f32 = 0.6;
/// A demanded dimension (≥ this) the model barely serves (≤ the floor)
/// counts as missing.
const MISSING_DEMAND_THRESHOLD: f32 = 0.7;
const MISSING_SUPPLY_FLOOR: f32 = 0.3;

/// Bonus per user style tag the model also carries, and its cap.
const STYLE_TAG_BONUS: f32 = 0.05;
const STYLE_TAG_MAX_BONUS: f32 = 0.20;

/// A modality's scoring axes and vector builders.
pub trait ModalityScorer: Send + Sync {
    fn modality(&self) -> Modality;
    /// Ordered dimension names; both vectors use this order.
    fn dimensions(&self) -> &'static [&'static str];
    fn build_user_vector(&self, user: &UserProfile) -> Vec<f32>;
    fn build_model_vector(&self, entry: &ModelEntry) -> Vec<f32>;
}

struct ImageScorer;

impl ModalityScorer for ImageScorer {
    fn modality(&self) -> Modality {
        Modality::Image
    }

    fn dimensions(&self) -> &'static [&'static str] {
        &[
            "photorealism",
            "artistic_quality",
            "text_rendering",
            "editability",
            "pose_control",
            "inpainting",
            "instruction_editing",
            "character_consistency",
            "generation_speed",
        ]
    }

    fn build_user_vector(&self, user: &UserProfile) -> Vec<f32> {
        let shared = &user.shared_quality;
        let prefs = user.image_prefs.clone().unwrap_or_default();

        // Full photorealism demand only when the user also tagged the style;
        // otherwise the slider counts at half weight.
        let photorealism = if prefs.style_tags.contains("photorealism") {
            shared.photorealism_norm()
        } else {
            0.5 * shared.photorealism_norm()
        };
        let wants_text = prefs.style_tags.contains("text_rendering")
            || prefs.style_tags.contains("typography");

        vec![
            photorealism,
            shared.artistic_norm(),
            if wants_text { 1.0 } else { 0.0 },
            prefs.editability,
            if prefs.pose_control >= 0.5 { 1.0 } else { 0.0 },
            if prefs.localized_edits >= 0.5 { 1.0 } else { 0.0 },
            if prefs.holistic_edits >= 0.5 { 1.0 } else { 0.0 },
            shared.consistency_need(),
            shared.speed_norm(),
        ]
    }

    fn build_model_vector(&self, entry: &ModelEntry) -> Vec<f32> {
        self.dimensions()
            .iter()
            .map(|dim| entry.capabilities.score(dim))
            .collect()
    }
}

struct VideoScorer;

impl ModalityScorer for VideoScorer {
    fn modality(&self) -> Modality {
        Modality::Video
    }

    fn dimensions(&self) -> &'static [&'static str] {
        &[
            "photorealism",
            "artistic_quality",
            "motion_quality",
            "temporal_coherence",
            "character_consistency",
            "generation_speed",
            "output_quality",
        ]
    }

    fn build_user_vector(&self, user: &UserProfile) -> Vec<f32> {
        let shared = &user.shared_quality;
        let prefs = user.video_prefs.clone().unwrap_or_default();
        vec![
            shared.photorealism_norm(),
            shared.artistic_norm(),
            prefs.motion_intensity,
            prefs.temporal_coherence,
            shared.consistency_need(),
            shared.speed_norm(),
            shared.quality_norm(),
        ]
    }

    fn build_model_vector(&self, entry: &ModelEntry) -> Vec<f32> {
        self.dimensions()
            .iter()
            .map(|dim| entry.capabilities.score(dim))
            .collect()
    }
}

struct AudioScorer;

impl ModalityScorer for AudioScorer {
    fn modality(&self) -> Modality {
        Modality::Audio
    }

    fn dimensions(&self) -> &'static [&'static str] {
        &["output_quality", "generation_speed", "lip_sync", "voice_cloning"]
    }

    fn build_user_vector(&self, user: &UserProfile) -> Vec<f32> {
        let shared = &user.shared_quality;
        let prefs = user.audio_prefs.clone().unwrap_or_default();
        vec![
            shared.quality_norm(),
            shared.speed_norm(),
            if prefs.audio_sync_needs.contains("lip_sync") {
                1.0
            } else {
                0.0
            },
            if prefs.voice_cloning { 1.0 } else { 0.0 },
        ]
    }

    fn build_model_vector(&self, entry: &ModelEntry) -> Vec<f32> {
        self.dimensions()
            .iter()
            .map(|dim| entry.capabilities.score(dim))
            .collect()
    }
}

struct ThreeDScorer;

impl ModalityScorer for ThreeDScorer {
    fn modality(&self) -> Modality {
        Modality::ThreeD
    }

    fn dimensions(&self) -> &'static [&'static str] {
        &["photorealism", "output_quality", "generation_speed", "pbr_materials"]
    }

    fn build_user_vector(&self, user: &UserProfile) -> Vec<f32> {
        let shared = &user.shared_quality;
        let prefs = user.three_d_prefs.clone().unwrap_or_default();
        vec![
            shared.photorealism_norm(),
            shared.quality_norm(),
            shared.speed_norm(),
            if prefs.pbr_materials { 1.0 } else { 0.0 },
        ]
    }

    fn build_model_vector(&self, entry: &ModelEntry) -> Vec<f32> {
        self.dimensions()
            .iter()
            .map(|dim| entry.capabilities.score(dim))
            .collect()
    }
}

static SCORERS: Lazy<BTreeMap<Modality, Box<dyn ModalityScorer>>> = Lazy::new(|| {
    let mut scorers: BTreeMap<Modality, Box<dyn ModalityScorer>> = BTreeMap::new();
    scorers.insert(Modality::Image, Box::new(ImageScorer));
    scorers.insert(Modality::Video, Box::new(VideoScorer));
    scorers.insert(Modality::Audio, Box::new(AudioScorer));
    scorers.insert(Modality::ThreeD, Box::new(ThreeDScorer));
    scorers
});

pub fn scorer_for(modality: Modality) -> &'static dyn ModalityScorer {
    SCORERS
        .get(&modality)
        .map(|b| b.as_ref())
        .expect("every modality has a registered scorer")
}

/// Cosine similarity of two equal-length vectors. Zero-magnitude input
/// yields 0, never NaN.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut mag_a = 0.0f32;
    let mut mag_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        mag_a += x * x;
        mag_b += y * y;
    }
    if mag_a <= 0.0 || mag_b <= 0.0 {
        return 0.0;
    }
    (dot / (mag_a.sqrt() * mag_b.sqrt())).clamp(0.0, 1.0)
}

/// Score Layer-1 survivors against the user's preferences for one modality
/// pipeline.
pub fn score_candidates(
    catalog: &Catalog,
    passing: &[PassingCandidate],
    modality: Modality,
    user: &UserProfile,
    cancel: &CancelToken,
) -> Result<Vec<ScoredCandidate>, CoreError> {
    cancel.check()?;

    let requested = user.requested_modalities();
    let mut scored = Vec::with_capacity(passing.len());

    for candidate in passing {
        cancel.check()?;
        let entry = catalog.entry_at(candidate.catalog_index);

        // A multi-modality candidate scores as the mean over the requested
        // modalities it serves; the pipeline's own modality always counts.
        let mut served: Vec<Modality> = requested
            .iter()
            .copied()
            .filter(|m| entry.capabilities.serves(*m))
            .collect();
        if served.is_empty() {
            served.push(modality);
        }

        let mut sum = 0.0f32;
        for m in &served {
            let scorer = scorer_for(*m);
            let user_vec = scorer.build_user_vector(user);
            let model_vec = scorer.build_model_vector(entry);
            sum += cosine_similarity(&user_vec, &model_vec);
        }
        let mean = sum / served.len() as f32;

        let bonus = style_bonus(user, entry);
        let similarity = (mean + bonus).min(1.0);

        // Feature match/miss sets come from the pipeline's own modality.
        let scorer = scorer_for(modality);
        let user_vec = scorer.build_user_vector(user);
        let model_vec = scorer.build_model_vector(entry);
        let mut matching = Vec::new();
        let mut missing = Vec::new();
        for (i, dim) in scorer.dimensions().iter().enumerate() {
            if model_vec[i] >= MATCH_THRESHOLD && user_vec[i] >= MATCH_THRESHOLD {
                matching.push((*dim).to_string());
            }
            if user_vec[i] >= MISSING_DEMAND_THRESHOLD && model_vec[i] <= MISSING_SUPPLY_FLOOR {
                missing.push((*dim).to_string());
            }
        }

        scored.push(ScoredCandidate {
            passing: candidate.clone(),
            modality,
            similarity,
            matching_features: matching,
            missing_features: missing,
        });
    }

    Ok(scored)
}

fn style_bonus(user: &UserProfile, entry: &ModelEntry) -> f32 {
    let Some(prefs) = &user.image_prefs else {
        return 0.0;
    };
    if !entry.capabilities.serves(Modality::Image) {
        return 0.0;
    }
    let matches = prefs
        .style_tags
        .iter()
        .filter(|tag| entry.capabilities.style_tags.contains(*tag))
        .count();
    (matches as f32 * STYLE_TAG_BONUS).min(STYLE_TAG_MAX_BONUS)
}
