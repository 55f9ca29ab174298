use std::fs;
use std::path::Path;

use chrono::{Duration, Utc};
use polars::prelude::*;
use tracing::info;

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::input::{match_input_files, natural_sort, plan_batches, stage_batch};
use crate::ledger::Ledger;
use crate::paths::{discover_missions, MissionId, MissionPaths};
use crate::recombine::{
    consolidate_intermediates, recombine_mission, summarize_mission, write_parquet,
    MissionSummary,
};
use crate::segment::assign_profiles;

/// External decoder collaborator: turns one batch's staged raw files into a
/// time-ordered sample table with at least `time`, `pressure` and
/// `dive_num` columns. May drop per-cycle intermediate files into
/// `rawnc_dir`. Robustness to per-file corruption is its concern, not ours.
pub trait BatchDecoder {
    fn decode(&self, input_dir: &Path, rawnc_dir: &Path) -> Result<DataFrame>;
}

/// External geocoding collaborator: dominant sea-basin label for a set of
/// navigation positions. Invoked once per mission.
pub trait BasinGeocoder {
    fn basin(&self, longitude: &[f64], latitude: &[f64]) -> Result<String>;
}

/// Drives one mission end-to-end: plan batches, decode and segment each
/// batch sequentially, then recombine into the finalized mission dataset.
/// A mission that fits in a single batch is processed directly with no
/// staging or recombination step.
pub fn process_mission(
    config: &PipelineConfig,
    decoder: &dyn BatchDecoder,
    geocoder: &dyn BasinGeocoder,
    mission: MissionId,
) -> Result<MissionSummary> {
    let paths = MissionPaths::new(config, mission);
    let raw_dir = paths.raw_dir().to_path_buf();

    let mut nav_files = list_series(&raw_dir, "*gli*")?;
    let mut pld_files = list_series(&raw_dir, "*pld*")?;
    natural_sort(&mut nav_files);
    natural_sort(&mut pld_files);
    let (nav_files, pld_files) = match_input_files(nav_files, pld_files, &raw_dir)?;

    let batches = plan_batches(
        nav_files.len(),
        config.batch_size,
        config.min_final_batch_files,
    );
    info!("processing {mission} in {} batches", batches.len());
    paths.ensure_output_dirs()?;

    if batches.len() == 1 {
        let frame = decoder.decode(&raw_dir, &paths.rawnc_dir())?;
        let segmented = assign_profiles(&sort_by_time(frame)?)?;
        write_batch_products(&paths.timeseries_dir(), &paths.gridfiles_dir(), &segmented)?;
        let summary = summarize_mission(&segmented, &paths, geocoder)?;
        let meta = serde_json::to_vec_pretty(&summary)?;
        fs::write(paths.meta_path(), meta)?;
        info!("finished processing {mission} in 1 batch");
        return Ok(summary);
    }

    for (batch, range) in batches.iter().enumerate() {
        info!("started processing {mission} batch {batch}");
        let input_staging = paths.input_staging(batch);
        stage_batch(
            &input_staging,
            &nav_files[range.clone()],
            &pld_files[range.clone()],
        )?;
        let output_staging = paths.output_staging(batch);
        let rawnc_dir = output_staging.join("rawnc");
        fs::create_dir_all(&rawnc_dir)?;
        let frame = decoder.decode(&input_staging, &rawnc_dir)?;
        let segmented = assign_profiles(&sort_by_time(frame)?)?;
        write_batch_products(
            &output_staging.join("timeseries"),
            &output_staging.join("gridfiles"),
            &segmented,
        )?;
        info!("finished processing {mission} batch {batch}");
    }

    let summary = recombine_mission(&paths, batches.len(), geocoder)?;
    consolidate_intermediates(&paths, batches.len())?;
    info!("finished processing {mission} in {} batches", batches.len());
    Ok(summary)
}

/// Ledger-driven run over every mission found on disk: mark in flight,
/// process, mark complete. Strictly sequential; a failure propagates and
/// leaves the current mission's ledger row in the in-flight state for the
/// next run to pick up.
pub fn run_new_missions(
    config: &PipelineConfig,
    decoder: &dyn BatchDecoder,
    geocoder: &dyn BasinGeocoder,
    force: bool,
) -> Result<()> {
    let on_disk = discover_missions(&config.raw_root)?;
    let mut ledger = Ledger::load(&config.ledger_path)?;
    let todo = ledger.missions_to_process(&on_disk, force);
    if todo.is_empty() {
        info!("no new missions to process");
        return Ok(());
    }
    for mission in todo {
        let started_at = Utc::now();
        ledger.mark_in_flight(mission, Duration::hours(config.in_flight_increment_hours));
        ledger.save(&config.ledger_path)?;

        process_mission(config, decoder, geocoder, mission)?;

        let finished_at = Utc::now();
        ledger.mark_complete(mission, finished_at, finished_at - started_at);
        ledger.save(&config.ledger_path)?;
    }
    Ok(())
}

fn list_series(dir: &Path, pattern: &str) -> Result<Vec<String>> {
    let full = format!("{}/{pattern}", dir.display());
    Ok(glob::glob(&full)?
        .filter_map(|entry| entry.ok())
        .map(|path| path.display().to_string())
        .collect())
}

fn sort_by_time(frame: DataFrame) -> Result<DataFrame> {
    Ok(frame.sort(["time"], SortMultipleOptions::default())?)
}

/// Writes one batch's segmented time series and the per-profile aggregate
/// derived from it.
fn write_batch_products(
    timeseries_dir: &Path,
    gridfiles_dir: &Path,
    segmented: &DataFrame,
) -> Result<()> {
    fs::create_dir_all(timeseries_dir)?;
    fs::create_dir_all(gridfiles_dir)?;
    write_parquet(&timeseries_dir.join("timeseries.parquet"), segmented)?;
    let grid = grid_dataset(segmented)?;
    write_parquet(&gridfiles_dir.join("grid.parquet"), &grid)?;
    Ok(())
}

/// One row per profile, keyed by its own `profile` column (a separate index
/// space from the time series): mean time and pressure per profile.
pub fn grid_dataset(segmented: &DataFrame) -> Result<DataFrame> {
    let grid = segmented
        .clone()
        .lazy()
        .group_by([col("profile_index")])
        .agg([
            col("time").mean(),
            col("pressure").mean(),
            col("dive_num").first(),
            col("profile_direction").first(),
        ])
        .sort(["time"], SortMultipleOptions::default())
        .select([
            col("profile_index").alias("profile"),
            col("time"),
            col("pressure"),
            col("dive_num"),
            col("profile_direction"),
        ])
        .collect()?;
    Ok(grid)
}
