mod decode;
mod geocode;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use glider_core::config::PipelineConfig;
use glider_core::paths::{MissionId, MissionPaths};
use glider_core::pipeline::{process_mission, run_new_missions};
use glider_core::recombine::{consolidate_intermediates, recombine_mission};

use decode::CsvBatchDecoder;
use geocode::FixedBasinGeocoder;

#[derive(Parser)]
#[command(name = "glider", about = "Batched glider mission processing pipeline")]
struct Cli {
    /// Pipeline configuration file.
    #[arg(long, default_value = "glider.toml")]
    config: PathBuf,

    /// Basin label applied by the stand-in geocoder.
    #[arg(long, default_value = "Baltic Proper")]
    basin: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Process one mission end-to-end.
    Process { glider: i64, mission: i64 },
    /// Process every mission on disk that the ledger has not seen.
    Scan {
        /// Reprocess missions already present in the ledger.
        #[arg(long)]
        force: bool,
    },
    /// Re-run only the recombination step from existing batch outputs.
    Recombine { glider: i64, mission: i64 },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = if cli.config.exists() {
        PipelineConfig::load(&cli.config)
            .with_context(|| format!("failed to load config {}", cli.config.display()))?
    } else {
        info!("no config at {}, using defaults", cli.config.display());
        PipelineConfig::default()
    };

    let decoder = CsvBatchDecoder;
    let geocoder = FixedBasinGeocoder { label: cli.basin };

    match cli.command {
        Command::Process { glider, mission } => {
            let mission = MissionId::new(glider, mission);
            let summary = process_mission(&config, &decoder, &geocoder, mission)?;
            info!(
                "processed {mission}: {} dives, dataset {}",
                summary.total_dives, summary.dataset_id
            );
        }
        Command::Scan { force } => {
            run_new_missions(&config, &decoder, &geocoder, force)?;
        }
        Command::Recombine { glider, mission } => {
            let mission = MissionId::new(glider, mission);
            let paths = MissionPaths::new(&config, mission);
            let num_batches = count_batch_dirs(&paths)?;
            if num_batches == 0 {
                bail!("no batch working directories found for {mission}");
            }
            info!("found {num_batches} batch directories to recombine");
            recombine_mission(&paths, num_batches, &geocoder)?;
            consolidate_intermediates(&paths, num_batches)?;
        }
    }
    Ok(())
}

fn count_batch_dirs(paths: &MissionPaths) -> Result<usize> {
    let mut count = 0;
    while paths.output_staging(count).is_dir() {
        count += 1;
    }
    Ok(count)
}
