//! CLI command implementations

use std::path::Path;

use anyhow::{Context, Result};

use modelscout::catalog::Catalog;
use modelscout::hardware::{self, HardwareProfile};
use modelscout::profile::{Modality, UserProfile};
use modelscout::recommend as engine;

pub fn detect(json: bool) -> Result<()> {
    let profile = hardware::detect::detect().context("hardware detection failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&profile)?);
        return Ok(());
    }

    println!("Platform:        {}", profile.platform.id());
    println!(
        "GPU:             {} ({:.1} GB VRAM)",
        profile.gpu.name, profile.gpu.vram_gb
    );
    println!("Effective VRAM:  {:.1} GB", profile.effective_vram_gb);
    println!(
        "CPU:             {} ({} cores, tier {:?})",
        profile.cpu.model, profile.cpu.physical_cores, profile.cpu.tier
    );
    println!(
        "RAM:             {:.1} GB total, {:.1} GB usable for offload",
        profile.ram.total_gb, profile.ram.usable_for_offload_gb
    );
    println!(
        "Storage:         {:.1} GB free ({:?}, {:.0} MB/s)",
        profile.storage.free_gb, profile.storage.kind, profile.storage.read_mbps
    );
    println!("Tier:            {:?}", profile.tier);
    if profile.form_factor.is_laptop {
        println!(
            "Form factor:     laptop (sustained ratio {:.2})",
            profile.form_factor.sustained_performance_ratio
        );
    }
    for warning in &profile.warnings {
        println!("note: {warning}");
    }
    Ok(())
}

pub fn catalog(path: &Path, modality: Option<&str>) -> Result<()> {
    let catalog = Catalog::load(path).context("catalog load failed")?;

    let filter: Option<Modality> = match modality {
        Some(raw) => Some(
            serde_json::from_value(serde_json::Value::String(raw.to_string()))
                .with_context(|| format!("unknown modality '{raw}'"))?,
        ),
        None => None,
    };

    for entry in catalog.iter() {
        if let Some(m) = filter {
            if !entry.capabilities.serves(m) {
                continue;
            }
        }
        println!(
            "{} ({}): {} variants, {:.1} GB total",
            entry.id,
            entry.name,
            entry.variants.len(),
            entry.hardware.total_size_gb
        );
        for variant in &entry.variants {
            println!(
                "    {} [{}] min {:.1} GB / rec {:.1} GB",
                variant.id,
                variant.precision,
                variant.vram_min_mb as f32 / 1024.0,
                variant.vram_recommended_mb as f32 / 1024.0
            );
        }
    }
    for warning in &catalog.load_warnings {
        println!("note: {warning}");
    }
    Ok(())
}

pub fn recommend(
    catalog_path: &Path,
    profile_path: &Path,
    hardware_path: Option<&Path>,
    json: bool,
    debug_scores: bool,
) -> Result<()> {
    let catalog = Catalog::load(catalog_path).context("catalog load failed")?;

    let user: UserProfile = serde_json::from_str(
        &std::fs::read_to_string(profile_path)
            .with_context(|| format!("cannot read {}", profile_path.display()))?,
    )
    .context("user profile is not valid JSON")?;

    let hardware: HardwareProfile = match hardware_path {
        Some(path) => serde_json::from_str(
            &std::fs::read_to_string(path)
                .with_context(|| format!("cannot read {}", path.display()))?,
        )
        .context("hardware profile is not valid JSON")?,
        None => hardware::detect::detect().context("hardware detection failed")?,
    };

    let result = engine::recommend(&user, &hardware, &catalog, None)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    print!("{}", engine::explain::render_text(&result, &catalog));
    if debug_scores {
        println!("\nPer-criterion TOPSIS values");
        println!("===========================");
        print!("{}", engine::explain::render_debug(&result));
    }
    Ok(())
}
