use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{PipelineError, Result};

/// Merge the final batch into the previous one when it would hold this many
/// files or fewer. Historical constant from the batching fix for tiny final
/// batches; tunable via `min_final_batch_files` in the config file.
pub const MIN_FINAL_BATCH_FILES: usize = 3;

/// Hours added to a ledger row's `proc_time` when a mission starts
/// processing, marking the row as in flight.
pub const IN_FLIGHT_INCREMENT_HOURS: i64 = 24;

/// All filesystem roots and pipeline tunables, constructed once at process
/// start and passed down. Nothing in the pipeline reads ambient state.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Raw mission input, partitioned as `<raw_root>/SEA<glider>/M<mission>/`.
    pub raw_root: PathBuf,
    /// Processed output, same per-mission partitioning.
    pub output_root: PathBuf,
    /// Scratch space for per-batch staging directories.
    pub staging_root: PathBuf,
    /// The reprocessing ledger CSV.
    pub ledger_path: PathBuf,
    /// Input file pairs per batch; bounds peak memory per processing step.
    pub batch_size: usize,
    pub min_final_batch_files: usize,
    pub in_flight_increment_hours: i64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            raw_root: PathBuf::from("/data/data_raw/complete_mission"),
            output_root: PathBuf::from("/data/data_l0_pyglider/complete_mission"),
            staging_root: PathBuf::from("/data/tmp/subs"),
            ledger_path: PathBuf::from("/home/pipeline/reprocess.csv"),
            batch_size: 500,
            min_final_batch_files: MIN_FINAL_BATCH_FILES,
            in_flight_increment_hours: IN_FLIGHT_INCREMENT_HOURS,
        }
    }
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(PipelineError::Config(
                "batch_size must be at least 1".into(),
            ));
        }
        if self.in_flight_increment_hours <= 0 {
            return Err(PipelineError::Config(
                "in_flight_increment_hours must be positive".into(),
            ));
        }
        Ok(())
    }
}
