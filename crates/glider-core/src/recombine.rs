use std::fs;
use std::fs::File;
use std::path::{Path, PathBuf};

use polars::io::parquet::write::{ParquetCompression, ParquetWriter};
use polars::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{PipelineError, Result};
use crate::paths::MissionPaths;
use crate::pipeline::BasinGeocoder;
use crate::reconcile::fix_profile_numbers;

/// Mission-level derived attributes, written alongside the finalized
/// dataset as `mission_meta.json`.
#[derive(Debug, Clone, Serialize)]
pub struct MissionSummary {
    pub dataset_id: String,
    pub total_dives: usize,
    pub basin: Option<String>,
}

/// Concatenates per-batch Parquet products into one frame sorted by
/// `sort_key`. The bulk path scans every batch lazily and concatenates in
/// one go; if that fails (incompatible or overlapping chunk structure), a
/// slower sequential load-append-resort path takes over.
pub fn combine_batch_products(paths: &[PathBuf], sort_key: &str) -> Result<DataFrame> {
    if paths.is_empty() {
        return Err(PipelineError::MissingProduct(
            "no batch products to combine".into(),
        ));
    }
    match combine_by_scan(paths, sort_key) {
        Ok(combined) => Ok(combined),
        Err(err) => {
            warn!("bulk concatenation failed ({err}), falling back to sequential append");
            combine_sequential(paths, sort_key)
        }
    }
}

fn combine_by_scan(paths: &[PathBuf], sort_key: &str) -> Result<DataFrame> {
    let frames: Vec<LazyFrame> = paths
        .iter()
        .map(|path| LazyFrame::scan_parquet(path, ScanArgsParquet::default()))
        .collect::<PolarsResult<_>>()?;
    let combined = concat(frames, UnionArgs::default())?
        .sort([sort_key], SortMultipleOptions::default())
        .collect()?;
    Ok(combined)
}

fn combine_sequential(paths: &[PathBuf], sort_key: &str) -> Result<DataFrame> {
    let mut accumulated = read_parquet(&paths[0])?;
    for path in &paths[1..] {
        let next = read_parquet(path)?;
        accumulated.vstack_mut(&next)?;
        accumulated = accumulated.sort([sort_key], SortMultipleOptions::default())?;
    }
    Ok(accumulated)
}

pub fn read_parquet(path: &Path) -> Result<DataFrame> {
    Ok(ParquetReader::new(File::open(path)?).finish()?)
}

pub fn write_parquet(path: &Path, df: &DataFrame) -> Result<()> {
    let mut clone = df.clone();
    ParquetWriter::new(File::create(path)?)
        .with_compression(ParquetCompression::Zstd(None))
        .finish(&mut clone)?;
    Ok(())
}

/// Stitches all per-batch outputs for a mission back into single time
/// series and per-profile aggregate datasets with globally consistent,
/// monotonic profile numbering, and recomputes the mission-level metadata.
pub fn recombine_mission(
    paths: &MissionPaths,
    num_batches: usize,
    geocoder: &dyn BasinGeocoder,
) -> Result<MissionSummary> {
    info!(
        "recombining {} from {num_batches} batches",
        paths.mission
    );
    let timeseries_paths = batch_products(paths, num_batches, "timeseries");
    let mut timeseries = combine_batch_products(&timeseries_paths, "time")?;
    fix_profile_numbers(&mut timeseries, "profile_index")?;
    let summary = summarize_mission(&timeseries, paths, geocoder)?;
    write_parquet(
        &paths.timeseries_dir().join("mission_timeseries.parquet"),
        &timeseries,
    )?;
    info!("wrote mission timeseries");
    drop(timeseries);

    // The aggregate carries its own index space, so it is renumbered
    // independently of the time series.
    let grid_paths = batch_products(paths, num_batches, "gridfiles");
    let mut grid = combine_batch_products(&grid_paths, "time")?;
    fix_profile_numbers(&mut grid, "profile")?;
    write_parquet(&paths.gridfiles_dir().join("mission_grid.parquet"), &grid)?;
    info!("wrote mission grid");

    let meta = serde_json::to_vec_pretty(&summary)?;
    fs::write(paths.meta_path(), meta)?;
    Ok(summary)
}

/// Derives the mission-level attributes from the finalized time series:
/// distinct dive count and the dominant sea basin from the navigation
/// positions. A dataset without positions gets no basin label.
pub fn summarize_mission(
    timeseries: &DataFrame,
    paths: &MissionPaths,
    geocoder: &dyn BasinGeocoder,
) -> Result<MissionSummary> {
    let total_dives = timeseries
        .column("dive_num")?
        .as_materialized_series()
        .n_unique()?;
    let basin = match lon_lat(timeseries)? {
        Some((lon, lat)) => Some(geocoder.basin(&lon, &lat)?),
        None => {
            warn!("no longitude/latitude columns, skipping basin lookup");
            None
        }
    };
    Ok(MissionSummary {
        dataset_id: paths.mission.dataset_id(),
        total_dives,
        basin,
    })
}

fn lon_lat(df: &DataFrame) -> Result<Option<(Vec<f64>, Vec<f64>)>> {
    let names = df.get_column_names_str();
    if !names.contains(&"longitude") || !names.contains(&"latitude") {
        return Ok(None);
    }
    let lon = non_null_f64(df, "longitude")?;
    let lat = non_null_f64(df, "latitude")?;
    Ok(Some((lon, lat)))
}

fn non_null_f64(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    Ok(df
        .column(name)?
        .as_materialized_series()
        .cast(&DataType::Float64)?
        .f64()?
        .into_iter()
        .flatten()
        .collect())
}

/// First Parquet product under each batch working directory's `kind`
/// subdirectory, in batch order. A batch with no product is logged and
/// skipped, matching the tolerant gather in the original recombination.
fn batch_products(paths: &MissionPaths, num_batches: usize, kind: &str) -> Vec<PathBuf> {
    let mut products = Vec::with_capacity(num_batches);
    for batch in 0..num_batches {
        let pattern = format!(
            "{}/{kind}/*.parquet",
            paths.output_staging(batch).display()
        );
        let found = glob::glob(&pattern)
            .ok()
            .and_then(|mut entries| entries.find_map(|entry| entry.ok()));
        match found {
            Some(path) => products.push(path),
            None => warn!("no {kind} file in batch {batch} working directory"),
        }
    }
    products
}

/// Moves each batch's lower-level intermediates (decoded per-cycle files,
/// per-profile files) into the mission's own directories, prefixing with
/// the batch index when a name already exists, then removes the emptied
/// staging directories.
pub fn consolidate_intermediates(paths: &MissionPaths, num_batches: usize) -> Result<()> {
    info!("moving rawnc and profile files");
    for batch in 0..num_batches {
        let out_staging = paths.output_staging(batch);
        move_dir_contents(&out_staging.join("rawnc"), &paths.rawnc_dir(), batch)?;
        move_dir_contents(&out_staging.join("profiles"), &paths.profiles_dir(), batch)?;
        remove_dir_if_present(&out_staging)?;
        remove_dir_if_present(&paths.input_staging(batch))?;
    }
    Ok(())
}

fn move_dir_contents(source: &Path, dest: &Path, batch: usize) -> Result<()> {
    if !source.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(dest)?;
    for entry in fs::read_dir(source)? {
        let entry = entry?;
        let name = entry.file_name();
        let mut target = dest.join(&name);
        if target.exists() {
            target = dest.join(format!("b{batch}_{}", name.to_string_lossy()));
        }
        move_file(&entry.path(), &target)?;
    }
    Ok(())
}

fn move_file(source: &Path, target: &Path) -> Result<()> {
    // Rename when source and target share a filesystem; copy+remove otherwise.
    if fs::rename(source, target).is_err() {
        fs::copy(source, target)?;
        fs::remove_file(source)?;
    }
    Ok(())
}

fn remove_dir_if_present(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        fs::remove_dir_all(dir)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::df;

    #[test]
    fn sequential_fallback_matches_bulk_concatenation() {
        let tmp = tempfile::tempdir().unwrap();
        let batches = [
            df!["time" => [0.0, 2.0, 4.0], "pressure" => [0.0, 10.0, 0.0]].unwrap(),
            df!["time" => [1.0, 5.0], "pressure" => [5.0, 5.0]].unwrap(),
            df!["time" => [3.0], "pressure" => [7.0]].unwrap(),
        ];
        let mut paths = Vec::new();
        for (i, frame) in batches.iter().enumerate() {
            let path = tmp.path().join(format!("batch{i}.parquet"));
            write_parquet(&path, frame).unwrap();
            paths.push(path);
        }

        let bulk = combine_by_scan(&paths, "time").unwrap();
        let sequential = combine_sequential(&paths, "time").unwrap();
        assert_eq!(bulk, sequential);
        assert_eq!(bulk.height(), 6);
    }
}
