//! Intermediate and result types shared across the pipeline layers.
//!
//! Candidates reference catalog entries by id (plus a stable catalog index
//! for deterministic tie-breaks); nothing in the pipeline mutates the
//! catalog. The result owns its rankings and manifest.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::profile::Modality;

/// How a selected model will run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    GpuNative,
    GpuOffload,
    Cloud,
}

/// Which hard constraint eliminated a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    Vram,
    Ram,
    Storage,
    Platform,
    ComputeCapability,
    StorageSpace,
    Incompat,
}

/// Structured rejection from Layer 1. `required`/`available` carry the
/// numeric sides of the failed comparison in the constraint's natural unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectionReason {
    pub model_id: String,
    pub constraint: ConstraintKind,
    pub detail: String,
    pub required: f32,
    pub available: f32,
    #[serde(default)]
    pub suggestion: Option<String>,
}

/// A candidate that cleared Layer 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassingCandidate {
    pub model_id: String,
    /// Stable index into the catalog, used for deterministic tie-breaks.
    pub catalog_index: usize,
    /// Chosen variant id; `None` exactly when `execution_mode` is `Cloud`.
    pub selected_variant: Option<String>,
    pub execution_mode: ExecutionMode,
    /// Human-readable caveats collected while selecting the variant.
    pub warnings: Vec<String>,
}

/// Layer 2 output: content similarity within one modality pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub passing: PassingCandidate,
    pub modality: Modality,
    pub similarity: f32,
    pub matching_features: Vec<String>,
    pub missing_features: Vec<String>,
}

/// Raw criterion values, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CriterionScores {
    pub content_similarity: f32,
    pub hardware_fit: f32,
    pub speed_fit: f32,
    pub ecosystem_maturity: f32,
    pub approach_fit: f32,
}

impl CriterionScores {
    pub fn as_array(&self) -> [f32; 5] {
        [
            self.content_similarity,
            self.hardware_fit,
            self.speed_fit,
            self.ecosystem_maturity,
            self.approach_fit,
        ]
    }

    pub fn from_array(values: [f32; 5]) -> Self {
        Self {
            content_similarity: values[0],
            hardware_fit: values[1],
            speed_fit: values[2],
            ecosystem_maturity: values[3],
            approach_fit: values[4],
        }
    }
}

/// Layer 3 output: final ordering within one modality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedCandidate {
    pub scored: ScoredCandidate,
    /// TOPSIS closeness coefficient in `[0, 1]`.
    pub topsis_score: f32,
    pub criteria: CriterionScores,
    /// Criterion values after normalization and weighting, kept for the
    /// explainer's debug output.
    pub weighted: CriterionScores,
    /// 1-based dense rank.
    pub rank: u32,
    /// Marginal pick that should go through the resolution cascade.
    pub requires_resolution: bool,
}

impl RankedCandidate {
    pub fn model_id(&self) -> &str {
        &self.scored.passing.model_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionKind {
    None,
    QuantizationDowngrade,
    CpuOffload,
    Substitution,
    WorkflowOptimization,
    Cloud,
}

/// Outcome of the resolution cascade for one candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionResult {
    pub model_id: String,
    pub viable: bool,
    pub kind: ResolutionKind,
    #[serde(default)]
    pub selected_variant: Option<String>,
    #[serde(default)]
    pub substituted_model_id: Option<String>,
    /// Expected throughput relative to a native fit, `(0, 1]`.
    pub performance_factor: f32,
    pub quality_impact: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HardwareWarning {
    pub kind: String,
    pub severity: Severity,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub model_id: String,
    #[serde(default)]
    pub variant_id: Option<String>,
    pub execution_mode: ExecutionMode,
}

/// The install plan handed to the downloader.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstallManifest {
    pub selected: Vec<ManifestEntry>,
    pub total_size_gb: f32,
    pub estimated_install_minutes: u32,
}

/// Human-readable reasoning for one recommended model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationExplanation {
    pub model_id: String,
    pub summary: String,
    pub hardware_note: String,
    pub matching_features: Vec<String>,
    pub missing_features: Vec<String>,
    #[serde(default)]
    pub resolution_note: Option<String>,
    pub competing_rejections: Vec<String>,
}

/// Stable public contract returned by `recommend`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationResult {
    pub id: String,
    /// Unix seconds at completion.
    pub timestamp: u64,
    pub per_modality_rankings: BTreeMap<Modality, Vec<RankedCandidate>>,
    pub manifest: InstallManifest,
    pub warnings: Vec<HardwareWarning>,
    pub reasoning: Vec<RecommendationExplanation>,
    pub rejections: Vec<RejectionReason>,
    pub resolutions: BTreeMap<String, ResolutionResult>,
    /// Models dropped by the space fitter that can run in the cloud instead.
    pub cloud_fallback: Vec<String>,
    /// How many GB short the disk is of the full plan, 0 when everything fits.
    pub space_short_gb: f32,
    pub reasoning_trace: Vec<String>,
}

impl RecommendationResult {
    pub fn primary_for(&self, modality: Modality) -> Option<&RankedCandidate> {
        self.per_modality_rankings
            .get(&modality)
            .and_then(|ranked| ranked.first())
    }
}
