pub mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "modelscout")]
#[command(about = "Hardware-aware generative model recommendations", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe this machine and print the normalized hardware profile
    Detect {
        /// Emit the profile as JSON
        #[arg(long)]
        json: bool,
    },
    /// Inspect a catalog file
    Catalog {
        /// Path to the catalog JSON document
        path: PathBuf,
        /// Only list models serving this modality (image, video, audio, 3d)
        #[arg(long)]
        modality: Option<String>,
    },
    /// Run the recommendation pipeline and print the plan
    Recommend {
        /// Path to the catalog JSON document
        #[arg(long)]
        catalog: PathBuf,
        /// Path to a user profile JSON document
        #[arg(long)]
        profile: PathBuf,
        /// Use a saved hardware profile instead of probing this machine
        #[arg(long)]
        hardware: Option<PathBuf>,
        /// Emit the full result as JSON
        #[arg(long)]
        json: bool,
        /// Include per-criterion TOPSIS values in the output
        #[arg(long)]
        debug_scores: bool,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Detect { json } => commands::detect(json),
        Commands::Catalog { path, modality } => commands::catalog(&path, modality.as_deref()),
        Commands::Recommend {
            catalog,
            profile,
            hardware,
            json,
            debug_scores,
        } => commands::recommend(&catalog, &profile, hardware.as_deref(), json, debug_scores),
    }
}
