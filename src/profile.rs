//! User preference profile consumed by the recommendation pipeline.
//!
//! The wizard UI owns how these values are collected; the core only sees the
//! normalized result. Sliders arrive on the 1–5 scale the onboarding flow
//! uses and are normalized to `[0, 1]` via `(v - 1) / 4`.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A user-facing output domain. Candidates declare which modalities they
/// serve; users declare which they want.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    Image,
    Video,
    Audio,
    #[serde(rename = "3d")]
    ThreeD,
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Modality::Image => "image",
            Modality::Video => "video",
            Modality::Audio => "audio",
            Modality::ThreeD => "3d",
        };
        f.write_str(label)
    }
}

/// A selected use case and the modalities it needs served.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UseCase {
    pub id: String,
    pub required_modalities: BTreeSet<Modality>,
}

/// Cross-modality quality sliders, each on the onboarding 1–5 scale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedQuality {
    pub photorealism: u8,
    pub artistic_stylization: u8,
    pub generation_speed: u8,
    pub output_quality: u8,
    pub character_consistency: u8,
}

impl Default for SharedQuality {
    fn default() -> Self {
        Self {
            photorealism: 3,
            artistic_stylization: 3,
            generation_speed: 3,
            output_quality: 3,
            character_consistency: 3,
        }
    }
}

/// Normalize a 1–5 slider to `[0, 1]`. Out-of-range values clamp.
pub fn normalize_slider(value: u8) -> f32 {
    (value.clamp(1, 5) - 1) as f32 / 4.0
}

impl SharedQuality {
    pub fn photorealism_norm(&self) -> f32 {
        normalize_slider(self.photorealism)
    }

    pub fn artistic_norm(&self) -> f32 {
        normalize_slider(self.artistic_stylization)
    }

    pub fn speed_norm(&self) -> f32 {
        normalize_slider(self.generation_speed)
    }

    pub fn quality_norm(&self) -> f32 {
        normalize_slider(self.output_quality)
    }

    /// Consistency demand on the three-level scale the scorers use:
    /// the top slider stop means essential (1.0), the middle stops mean
    /// helpful (0.5), the low stops mean not needed (0.0).
    pub fn consistency_need(&self) -> f32 {
        match self.character_consistency {
            5 => 1.0,
            3 | 4 => 0.5,
            _ => 0.0,
        }
    }
}

/// Image-specific preferences; present iff the user requested `image`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImagePrefs {
    pub editability: f32,
    pub pose_control: f32,
    pub holistic_edits: f32,
    pub localized_edits: f32,
    #[serde(default)]
    pub style_tags: BTreeSet<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClipDuration {
    #[default]
    Short,
    Medium,
    Long,
}

/// Video-specific preferences; present iff the user requested `video`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VideoPrefs {
    pub motion_intensity: f32,
    pub temporal_coherence: f32,
    #[serde(default)]
    pub duration: ClipDuration,
}

/// Audio-specific preferences (extension point).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AudioPrefs {
    #[serde(default)]
    pub audio_sync_needs: BTreeSet<String>,
    #[serde(default)]
    pub voice_cloning: bool,
}

/// 3D-specific preferences (extension point).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThreeDPrefs {
    #[serde(default)]
    pub pbr_materials: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloudWillingness {
    LocalOnly,
    #[default]
    Hybrid,
    CloudPreferred,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TechnicalLevel {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

/// Everything the pipeline knows about the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub use_cases: Vec<UseCase>,
    #[serde(default)]
    pub shared_quality: SharedQuality,
    #[serde(default)]
    pub image_prefs: Option<ImagePrefs>,
    #[serde(default)]
    pub video_prefs: Option<VideoPrefs>,
    #[serde(default)]
    pub audio_prefs: Option<AudioPrefs>,
    #[serde(default)]
    pub three_d_prefs: Option<ThreeDPrefs>,
    #[serde(default)]
    pub cloud_willingness: CloudWillingness,
    /// Derived from the single speed/quality slider, already in `[0, 1]`.
    #[serde(default)]
    pub speed_priority: f32,
    #[serde(default)]
    pub technical_level: TechnicalLevel,
}

impl UserProfile {
    /// Union of modalities across all selected use cases, in stable order.
    pub fn requested_modalities(&self) -> BTreeSet<Modality> {
        self.use_cases
            .iter()
            .flat_map(|uc| uc.required_modalities.iter().copied())
            .collect()
    }

    pub fn allows_cloud(&self) -> bool {
        self.cloud_willingness != CloudWillingness::LocalOnly
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_slider() {
        assert_eq!(normalize_slider(1), 0.0);
        assert_eq!(normalize_slider(3), 0.5);
        assert_eq!(normalize_slider(5), 1.0);
        // Out-of-range values clamp instead of wrapping
        assert_eq!(normalize_slider(0), 0.0);
        assert_eq!(normalize_slider(9), 1.0);
    }

    #[test]
    fn test_consistency_need_levels() {
        let mut shared = SharedQuality::default();
        shared.character_consistency = 5;
        assert_eq!(shared.consistency_need(), 1.0);
        shared.character_consistency = 4;
        assert_eq!(shared.consistency_need(), 0.5);
        shared.character_consistency = 1;
        assert_eq!(shared.consistency_need(), 0.0);
    }

    #[test]
    fn test_requested_modalities_union() {
        let profile = UserProfile {
            use_cases: vec![
                UseCase {
                    id: "product_shots".to_string(),
                    required_modalities: [Modality::Image].into_iter().collect(),
                },
                UseCase {
                    id: "short_clips".to_string(),
                    required_modalities: [Modality::Image, Modality::Video]
                        .into_iter()
                        .collect(),
                },
            ],
            shared_quality: SharedQuality::default(),
            image_prefs: None,
            video_prefs: None,
            audio_prefs: None,
            three_d_prefs: None,
            cloud_willingness: CloudWillingness::Hybrid,
            speed_priority: 0.5,
            technical_level: TechnicalLevel::Beginner,
        };

        let modalities = profile.requested_modalities();
        assert_eq!(modalities.len(), 2);
        assert!(modalities.contains(&Modality::Image));
        assert!(modalities.contains(&Modality::Video));
    }

    #[test]
    fn test_modality_serde_labels() {
        assert_eq!(
            serde_json::to_string(&Modality::ThreeD).unwrap(),
            "\"3d\""
        );
        let m: Modality = serde_json::from_str("\"video\"").unwrap();
        assert_eq!(m, Modality::Video);
    }
}
