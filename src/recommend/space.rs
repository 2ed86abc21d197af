//! Space-constrained fitter.
//!
//! When the selected set plus the install buffer exceeds free disk, pack
//! greedily by use-case priority (lower number = more important). Dropped
//! items that can run in the cloud are kept as cloud fallbacks.

use serde::{Deserialize, Serialize};

use super::constraint::STORAGE_BUFFER_GB;

/// One selected model as the fitter sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpaceItem {
    pub model_id: String,
    pub size_gb: f32,
    /// Lower is more important.
    pub priority: u32,
    pub cloud_available: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpaceFit {
    /// Model ids that stay in the manifest, in priority order.
    pub kept: Vec<String>,
    /// Dropped ids, in drop order.
    pub dropped: Vec<String>,
    /// Subset of `dropped` that can run in the cloud instead.
    pub cloud_fallback: Vec<String>,
    /// GB the disk is short of the full plan; 0 when everything fits.
    pub space_short_gb: f32,
}

/// Pack `items` into `free_gb`, keeping the install buffer intact.
pub fn adjust_for_space(items: &[SpaceItem], free_gb: f32) -> SpaceFit {
    let desired: f32 = items.iter().map(|i| i.size_gb).sum();
    let space_short_gb = (desired + STORAGE_BUFFER_GB - free_gb).max(0.0);

    let mut ordered: Vec<&SpaceItem> = items.iter().collect();
    ordered.sort_by_key(|i| i.priority);

    let mut fit = SpaceFit {
        space_short_gb,
        ..SpaceFit::default()
    };
    let mut used = 0.0f32;
    for item in ordered {
        if used + item.size_gb + STORAGE_BUFFER_GB <= free_gb {
            used += item.size_gb;
            fit.kept.push(item.model_id.clone());
        } else {
            fit.dropped.push(item.model_id.clone());
            if item.cloud_available {
                fit.cloud_fallback.push(item.model_id.clone());
            }
        }
    }
    fit
}
