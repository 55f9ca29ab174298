use std::path::Path;

use polars::prelude::*;
use tracing::warn;

use glider_core::error::{PipelineError, Result};
use glider_core::input::natural_sort;
use glider_core::pipeline::BatchDecoder;
use glider_core::recombine::write_parquet;

/// Boundary adapter for pre-decoded payload tables: each staged `*pld*`
/// file is a `;`-separated CSV already carrying `time`, `pressure` and
/// `dive_num` columns. Files that fail to parse are skipped and logged;
/// per-file robustness is the decoder side's concern. Each cycle's frame is
/// also dropped into the batch's rawnc directory as a Parquet intermediate.
pub struct CsvBatchDecoder;

impl BatchDecoder for CsvBatchDecoder {
    fn decode(&self, input_dir: &Path, rawnc_dir: &Path) -> Result<DataFrame> {
        let pattern = format!("{}/*pld*", input_dir.display());
        let mut files: Vec<String> = glob::glob(&pattern)?
            .filter_map(|entry| entry.ok())
            .map(|path| path.display().to_string())
            .collect();
        natural_sort(&mut files);

        let mut combined: Option<DataFrame> = None;
        for file in &files {
            let frame = match read_payload_csv(file) {
                Ok(frame) => frame,
                Err(err) => {
                    warn!("skipping unreadable payload file {file}: {err}");
                    continue;
                }
            };
            write_intermediate(rawnc_dir, file, &frame)?;
            combined = Some(match combined.take() {
                Some(mut acc) => {
                    acc.vstack_mut(&frame)?;
                    acc
                }
                None => frame,
            });
        }

        let combined = combined.ok_or_else(|| PipelineError::NoPairedInputs {
            dir: input_dir.to_path_buf(),
        })?;
        Ok(combined.sort(["time"], SortMultipleOptions::default())?)
    }
}

fn read_payload_csv(path: &str) -> Result<DataFrame> {
    let frame = CsvReadOptions::default()
        .with_has_header(true)
        .with_parse_options(CsvParseOptions::default().with_separator(b';'))
        .try_into_reader_with_file_path(Some(path.into()))?
        .finish()?;
    Ok(frame)
}

fn write_intermediate(rawnc_dir: &Path, file: &str, frame: &DataFrame) -> Result<()> {
    let stem = Path::new(file)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "cycle".to_string());
    write_parquet(&rawnc_dir.join(format!("{stem}.parquet")), frame)
}
