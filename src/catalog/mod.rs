//! Declarative model catalog.
//!
//! The catalog document is JSON: a list of entries, each with its variants,
//! capability scores, hardware needs and cloud availability. Unknown fields
//! are tolerated for forward compatibility; missing required fields fail the
//! load. After `load`, the catalog is immutable and shared read-only across
//! pipeline runs.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::path::Path;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CoreError;
use crate::hardware::Platform;
use crate::profile::Modality;

/// GGUF quantization level. K-quants rely on kernels that are unstable on
/// Apple's MPS backend and are filtered out there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GgufQuant {
    Q8_0,
    Q6K,
    Q5KM,
    Q5_0,
    Q4KM,
    Q4_0,
}

impl GgufQuant {
    pub fn is_k_quant(self) -> bool {
        matches!(self, GgufQuant::Q6K | GgufQuant::Q5KM | GgufQuant::Q4KM)
    }
}

/// Variant precision as a tagged union with exhaustive matching. Precisions
/// the schema does not know parse to `Other` and are reported as non-fatal
/// load warnings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Precision {
    Fp16,
    Fp8,
    Gguf(GgufQuant),
    Other(String),
}

impl Precision {
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "fp16" | "f16" => Precision::Fp16,
            "fp8" => Precision::Fp8,
            "gguf_q8" | "gguf_q8_0" | "q8_0" => Precision::Gguf(GgufQuant::Q8_0),
            "gguf_q6" | "gguf_q6_k" | "q6_k" => Precision::Gguf(GgufQuant::Q6K),
            "gguf_q5_k_m" | "q5_k_m" => Precision::Gguf(GgufQuant::Q5KM),
            "gguf_q5_0" | "q5_0" => Precision::Gguf(GgufQuant::Q5_0),
            "gguf_q4_k_m" | "q4_k_m" => Precision::Gguf(GgufQuant::Q4KM),
            "gguf_q4_0" | "q4_0" => Precision::Gguf(GgufQuant::Q4_0),
            _ => Precision::Other(raw.to_string()),
        }
    }

    pub fn is_gguf(&self) -> bool {
        matches!(self, Precision::Gguf(_))
    }

    pub fn is_k_quant(&self) -> bool {
        matches!(self, Precision::Gguf(q) if q.is_k_quant())
    }

    /// Safe to schedule on Apple's MPS backend.
    pub fn mps_safe(&self) -> bool {
        !self.is_k_quant()
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Precision::Fp16 => "fp16",
            Precision::Fp8 => "fp8",
            Precision::Gguf(GgufQuant::Q8_0) => "gguf_q8_0",
            Precision::Gguf(GgufQuant::Q6K) => "gguf_q6_k",
            Precision::Gguf(GgufQuant::Q5KM) => "gguf_q5_k_m",
            Precision::Gguf(GgufQuant::Q5_0) => "gguf_q5_0",
            Precision::Gguf(GgufQuant::Q4KM) => "gguf_q4_k_m",
            Precision::Gguf(GgufQuant::Q4_0) => "gguf_q4_0",
            Precision::Other(s) => s,
        };
        f.write_str(label)
    }
}

impl Serialize for Precision {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Precision {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if raw.trim().is_empty() {
            return Err(D::Error::custom("empty precision string"));
        }
        Ok(Precision::parse(&raw))
    }
}

/// Per-platform support declaration for a variant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlatformSupport {
    #[serde(default)]
    pub supported: bool,
    #[serde(default)]
    pub min_compute_capability: Option<f32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlatformSupportSet {
    #[serde(default)]
    pub nvidia: PlatformSupport,
    #[serde(default)]
    pub apple_mps: PlatformSupport,
    #[serde(default)]
    pub amd_rocm: PlatformSupport,
}

impl PlatformSupportSet {
    pub fn for_platform(&self, platform: Platform) -> Option<&PlatformSupport> {
        match platform {
            Platform::NvidiaDesktop | Platform::NvidiaLaptop => Some(&self.nvidia),
            Platform::AppleSilicon => Some(&self.apple_mps),
            Platform::AmdRocm => Some(&self.amd_rocm),
            Platform::CpuOnly => None,
        }
    }
}

/// One downloadable rendition of a model. Variants are listed in the
/// catalog from highest to lowest quality precision; that order is the
/// quality order everywhere downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelVariant {
    pub id: String,
    pub precision: Precision,
    pub vram_min_mb: u32,
    pub vram_recommended_mb: u32,
    pub download_size_gb: f32,
    #[serde(default = "default_retention")]
    pub quality_retention_percent: u8,
    #[serde(default)]
    pub platform_support: PlatformSupportSet,
    #[serde(default)]
    pub required_nodes: Vec<String>,
}

fn default_retention() -> u8 {
    100
}

impl ModelVariant {
    pub fn vram_min_gb(&self) -> f32 {
        self.vram_min_mb as f32 / 1024.0
    }

    pub fn supported_on(&self, platform: Platform) -> bool {
        self.platform_support
            .for_platform(platform)
            .map(|ps| ps.supported)
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Capabilities {
    /// Modalities this model serves.
    #[serde(default)]
    pub primary: Vec<Modality>,
    /// Named capability axes in `[0, 1]`, keyed by scorer dimension.
    #[serde(default)]
    pub scores: BTreeMap<String, f32>,
    #[serde(default)]
    pub style_tags: BTreeSet<String>,
    #[serde(default)]
    pub controlnet_support: BTreeSet<String>,
    #[serde(default)]
    pub video_modes: BTreeSet<String>,
    /// Throughput penalty on Apple's MPS backend, `[0, 1]`.
    #[serde(default)]
    pub mps_performance_penalty: f32,
}

impl Capabilities {
    pub fn score(&self, dimension: &str) -> f32 {
        self.scores.get(dimension).copied().unwrap_or(0.0)
    }

    pub fn serves(&self, modality: Modality) -> bool {
        self.primary.contains(&modality)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComputeIntensity {
    High,
    #[default]
    Medium,
    Low,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HardwareNeeds {
    pub total_size_gb: f32,
    #[serde(default)]
    pub compute_intensity: ComputeIntensity,
    #[serde(default = "default_true")]
    pub supports_cpu_offload: bool,
    #[serde(default)]
    pub ram_for_offload_gb: Option<f32>,
    #[serde(default)]
    pub supports_tensorrt: bool,
}

fn default_true() -> bool {
    true
}

impl Default for HardwareNeeds {
    fn default() -> Self {
        Self {
            total_size_gb: 0.0,
            compute_intensity: ComputeIntensity::Medium,
            supports_cpu_offload: true,
            ram_for_offload_gb: None,
            supports_tensorrt: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CloudInfo {
    #[serde(default)]
    pub available: bool,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub estimated_cost_per_gen: Option<f32>,
}

/// One model in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEntry {
    pub id: String,
    pub family: String,
    pub name: String,
    #[serde(default)]
    pub license: Option<String>,
    pub variants: Vec<ModelVariant>,
    #[serde(default)]
    pub capabilities: Capabilities,
    #[serde(default)]
    pub hardware: HardwareNeeds,
    #[serde(default)]
    pub cloud: CloudInfo,
    /// Platform ids this model is excluded from outright.
    #[serde(default)]
    pub incompatibilities: Vec<String>,
    /// Optional substitution hints shown when the model is excluded.
    #[serde(default)]
    pub alternatives: Vec<String>,
    #[serde(default = "default_half")]
    pub ecosystem_maturity: f32,
    #[serde(default = "default_half")]
    pub approach_fit: f32,
    #[serde(default)]
    pub minimum_ram_gb: f32,
}

fn default_half() -> f32 {
    0.5
}

impl ModelEntry {
    pub fn incompatible_with(&self, platform: Platform) -> bool {
        self.incompatibilities.iter().any(|p| p == platform.id())
    }

    pub fn variant(&self, variant_id: &str) -> Option<&ModelVariant> {
        self.variants.iter().find(|v| v.id == variant_id)
    }

    /// Smallest VRAM floor across variants, GB.
    pub fn min_vram_gb(&self) -> f32 {
        self.variants
            .iter()
            .map(|v| v.vram_min_gb())
            .fold(f32::INFINITY, f32::min)
    }
}

/// Immutable, indexed catalog.
#[derive(Debug)]
pub struct Catalog {
    entries: Vec<ModelEntry>,
    by_id: HashMap<String, usize>,
    by_modality: BTreeMap<Modality, Vec<usize>>,
    /// Non-fatal schema notes collected at load (unknown precisions).
    pub load_warnings: Vec<String>,
}

impl Catalog {
    /// Load and validate a catalog document.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| CoreError::Catalog(format!("cannot read {}: {e}", path.display())))?;
        let entries: Vec<ModelEntry> = serde_json::from_str(&raw)
            .map_err(|e| CoreError::Catalog(format!("{}: {e}", path.display())))?;
        Self::from_entries(entries)
    }

    /// Build a catalog from in-memory entries (the tests' path).
    pub fn from_entries(entries: Vec<ModelEntry>) -> Result<Self, CoreError> {
        let mut by_id = HashMap::new();
        let mut by_modality: BTreeMap<Modality, Vec<usize>> = BTreeMap::new();
        let mut load_warnings = Vec::new();

        for (index, entry) in entries.iter().enumerate() {
            if entry.variants.is_empty() {
                return Err(CoreError::Catalog(format!(
                    "model '{}' declares no variants",
                    entry.id
                )));
            }
            if by_id.insert(entry.id.clone(), index).is_some() {
                return Err(CoreError::Catalog(format!("duplicate model id '{}'", entry.id)));
            }

            let mut variant_ids = BTreeSet::new();
            for variant in &entry.variants {
                if !variant_ids.insert(&variant.id) {
                    return Err(CoreError::Catalog(format!(
                        "model '{}' has duplicate variant id '{}'",
                        entry.id, variant.id
                    )));
                }
                if variant.vram_min_mb > variant.vram_recommended_mb {
                    return Err(CoreError::Catalog(format!(
                        "variant '{}/{}' has vram_min above vram_recommended",
                        entry.id, variant.id
                    )));
                }
                if let Precision::Other(raw) = &variant.precision {
                    load_warnings.push(format!(
                        "unknown precision '{raw}' on variant '{}/{}'",
                        entry.id, variant.id
                    ));
                }
            }

            for modality in &entry.capabilities.primary {
                by_modality.entry(*modality).or_default().push(index);
            }
        }

        Ok(Self {
            entries,
            by_id,
            by_modality,
            load_warnings,
        })
    }

    /// Entries serving a modality, in catalog order, with their stable
    /// catalog indices.
    pub fn candidates_for(&self, modality: Modality) -> Vec<(usize, &ModelEntry)> {
        self.by_modality
            .get(&modality)
            .map(|indices| indices.iter().map(|&i| (i, &self.entries[i])).collect())
            .unwrap_or_default()
    }

    pub fn get(&self, model_id: &str) -> Option<&ModelEntry> {
        self.by_id.get(model_id).map(|&i| &self.entries[i])
    }

    pub fn index_of(&self, model_id: &str) -> Option<usize> {
        self.by_id.get(model_id).copied()
    }

    pub fn entry_at(&self, index: usize) -> &ModelEntry {
        &self.entries[index]
    }

    /// Variants of a model supported on a platform, highest quality first
    /// (catalog order).
    pub fn variants_of(&self, model_id: &str, platform: Platform) -> Vec<&ModelVariant> {
        self.get(model_id)
            .map(|entry| {
                entry
                    .variants
                    .iter()
                    .filter(|v| v.supported_on(platform))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModelEntry> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variant(id: &str, precision: &str, min_mb: u32, rec_mb: u32) -> ModelVariant {
        ModelVariant {
            id: id.to_string(),
            precision: Precision::parse(precision),
            vram_min_mb: min_mb,
            vram_recommended_mb: rec_mb,
            download_size_gb: min_mb as f32 / 1024.0,
            quality_retention_percent: 100,
            platform_support: PlatformSupportSet {
                nvidia: PlatformSupport {
                    supported: true,
                    min_compute_capability: None,
                },
                apple_mps: PlatformSupport {
                    supported: true,
                    min_compute_capability: None,
                },
                amd_rocm: PlatformSupport::default(),
            },
            required_nodes: Vec::new(),
        }
    }

    fn entry(id: &str, modality: Modality, variants: Vec<ModelVariant>) -> ModelEntry {
        ModelEntry {
            id: id.to_string(),
            family: id.to_string(),
            name: id.to_string(),
            license: None,
            variants,
            capabilities: Capabilities {
                primary: vec![modality],
                ..Capabilities::default()
            },
            hardware: HardwareNeeds::default(),
            cloud: CloudInfo::default(),
            incompatibilities: Vec::new(),
            alternatives: Vec::new(),
            ecosystem_maturity: 0.5,
            approach_fit: 0.5,
            minimum_ram_gb: 8.0,
        }
    }

    #[test]
    fn test_precision_parse_and_roundtrip() {
        assert_eq!(Precision::parse("fp16"), Precision::Fp16);
        assert_eq!(Precision::parse("FP8"), Precision::Fp8);
        assert_eq!(Precision::parse("gguf_q4_k_m"), Precision::Gguf(GgufQuant::Q4KM));
        assert_eq!(Precision::parse("gguf_q8"), Precision::Gguf(GgufQuant::Q8_0));
        assert!(matches!(Precision::parse("int3_exotic"), Precision::Other(_)));

        let p: Precision = serde_json::from_str("\"gguf_q5_k_m\"").unwrap();
        assert_eq!(p, Precision::Gguf(GgufQuant::Q5KM));
        assert_eq!(serde_json::to_string(&p).unwrap(), "\"gguf_q5_k_m\"");
    }

    #[test]
    fn test_k_quant_detection() {
        assert!(Precision::parse("gguf_q4_k_m").is_k_quant());
        assert!(Precision::parse("gguf_q6_k").is_k_quant());
        assert!(!Precision::parse("gguf_q4_0").is_k_quant());
        assert!(!Precision::parse("fp16").is_k_quant());
        assert!(Precision::parse("gguf_q4_0").mps_safe());
        assert!(!Precision::parse("gguf_q5_k_m").mps_safe());
    }

    #[test]
    fn test_catalog_indexing() {
        let catalog = Catalog::from_entries(vec![
            entry("alpha", Modality::Image, vec![variant("fp16", "fp16", 8000, 12000)]),
            entry("beta", Modality::Video, vec![variant("fp16", "fp16", 16000, 24000)]),
            entry("gamma", Modality::Image, vec![variant("q4", "gguf_q4_0", 4000, 6000)]),
        ])
        .unwrap();

        let images = catalog.candidates_for(Modality::Image);
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].1.id, "alpha");
        assert_eq!(images[1].1.id, "gamma");
        assert!(catalog.get("beta").is_some());
        assert!(catalog.candidates_for(Modality::Audio).is_empty());
    }

    #[test]
    fn test_catalog_rejects_empty_variants() {
        let err = Catalog::from_entries(vec![entry("empty", Modality::Image, Vec::new())])
            .unwrap_err();
        assert!(matches!(err, CoreError::Catalog(_)));
    }

    #[test]
    fn test_catalog_rejects_inverted_vram_bounds() {
        let bad = entry(
            "bad",
            Modality::Image,
            vec![variant("fp16", "fp16", 12000, 8000)],
        );
        assert!(Catalog::from_entries(vec![bad]).is_err());
    }

    #[test]
    fn test_unknown_precision_is_nonfatal_warning() {
        let odd = entry(
            "odd",
            Modality::Image,
            vec![variant("weird", "int3_exotic", 4000, 6000)],
        );
        let catalog = Catalog::from_entries(vec![odd]).unwrap();
        assert_eq!(catalog.load_warnings.len(), 1);
        assert!(catalog.load_warnings[0].contains("int3_exotic"));
    }

    #[test]
    fn test_variants_of_filters_platform() {
        let mut v_nvidia_only = variant("fp8", "fp8", 12000, 16000);
        v_nvidia_only.platform_support.apple_mps.supported = false;
        let catalog = Catalog::from_entries(vec![entry(
            "mixed",
            Modality::Image,
            vec![v_nvidia_only, variant("q4", "gguf_q4_0", 4000, 6000)],
        )])
        .unwrap();

        let apple = catalog.variants_of("mixed", Platform::AppleSilicon);
        assert_eq!(apple.len(), 1);
        assert_eq!(apple[0].id, "q4");

        let nvidia = catalog.variants_of("mixed", Platform::NvidiaDesktop);
        assert_eq!(nvidia.len(), 2);
        assert_eq!(nvidia[0].id, "fp8");
    }
}
