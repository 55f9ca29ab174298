use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars operation failed: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Glob pattern error: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("could not parse a cycle id from input file name '{file}'")]
    CycleId { file: String },

    #[error("no paired navigation/payload input files in {dir}")]
    NoPairedInputs { dir: PathBuf },

    #[error("duplicate ledger entry for glider {glider} mission {mission}")]
    DuplicateLedgerEntry { glider: i64, mission: i64 },

    #[error("missing batch product: {0}")]
    MissingProduct(String),

    #[error("Config validation failed: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
