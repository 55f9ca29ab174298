use std::fs;
use std::path::Path;

use polars::df;
use polars::prelude::*;

use glider_core::config::PipelineConfig;
use glider_core::error::Result as CoreResult;
use glider_core::input::parse_cycle_id;
use glider_core::ledger::Ledger;
use glider_core::paths::{discover_missions, MissionId, MissionPaths};
use glider_core::pipeline::{process_mission, run_new_missions, BasinGeocoder, BatchDecoder};
use glider_core::recombine::{read_parquet, write_parquet};

/// Stand-in decoder: one synthetic dive per payload file, with the cycle id
/// as dive number and a time base that keeps cycles globally ordered.
struct SyntheticDecoder;

impl BatchDecoder for SyntheticDecoder {
    fn decode(&self, input_dir: &Path, rawnc_dir: &Path) -> CoreResult<DataFrame> {
        let pattern = format!("{}/*pld*", input_dir.display());
        let mut cycles: Vec<u64> = glob::glob(&pattern)
            .unwrap()
            .filter_map(|entry| entry.ok())
            .map(|path| parse_cycle_id(&path.display().to_string()).unwrap())
            .collect();
        cycles.sort();

        let mut combined: Option<DataFrame> = None;
        for id in &cycles {
            let time: Vec<f64> = (0..4).map(|step| *id as f64 * 100.0 + step as f64).collect();
            let cycle = df![
                "time" => time,
                "pressure" => [0.0, 5.0, 10.0, 5.0],
                "dive_num" => [*id as i64; 4],
                "longitude" => [20.0; 4],
                "latitude" => [57.0; 4],
            ]
            .unwrap();
            write_parquet(&rawnc_dir.join(format!("cycle_{id}.parquet")), &cycle)?;
            combined = Some(match combined.take() {
                Some(mut acc) => {
                    acc.vstack_mut(&cycle).unwrap();
                    acc
                }
                None => cycle,
            });
        }
        Ok(combined.expect("at least one payload file staged"))
    }
}

struct TestGeocoder;

impl BasinGeocoder for TestGeocoder {
    fn basin(&self, _longitude: &[f64], _latitude: &[f64]) -> CoreResult<String> {
        Ok("Test Basin".to_string())
    }
}

fn test_config(root: &Path, batch_size: usize) -> PipelineConfig {
    PipelineConfig {
        raw_root: root.join("raw"),
        output_root: root.join("l0"),
        staging_root: root.join("subs"),
        ledger_path: root.join("reprocess.csv"),
        batch_size,
        ..Default::default()
    }
}

fn seed_mission(config: &PipelineConfig, mission: MissionId, cycles: u64) {
    let raw = config.raw_root.join(format!(
        "SEA{}/M{}",
        mission.glider, mission.mission
    ));
    fs::create_dir_all(&raw).unwrap();
    for id in 1..=cycles {
        fs::write(raw.join(format!("sea061.gli.sub.{id}")), "nav").unwrap();
        fs::write(raw.join(format!("sea061.pld1.sub.{id}")), "pld").unwrap();
    }
}

fn column_i64(frame: &DataFrame, name: &str) -> Vec<i64> {
    frame
        .column(name)
        .unwrap()
        .as_materialized_series()
        .cast(&DataType::Int64)
        .unwrap()
        .i64()
        .unwrap()
        .into_iter()
        .flatten()
        .collect()
}

#[test]
fn batched_mission_ends_globally_monotonic() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path(), 3);
    let mission = MissionId::new(61, 10);
    // 8 cycle pairs with batch_size 3: the 2-file tail merges, leaving
    // batches of {3, 5}.
    seed_mission(&config, mission, 8);

    let summary = process_mission(&config, &SyntheticDecoder, &TestGeocoder, mission).unwrap();
    assert_eq!(summary.total_dives, 8);
    assert_eq!(summary.basin.as_deref(), Some("Test Basin"));

    let paths = MissionPaths::new(&config, mission);
    let timeseries =
        read_parquet(&paths.timeseries_dir().join("mission_timeseries.parquet")).unwrap();
    assert_eq!(timeseries.height(), 8 * 4);

    let index = column_i64(&timeseries, "profile_index");
    for pair in index.windows(2) {
        assert!(pair[1] >= pair[0], "profile index decreased: {pair:?}");
    }
    assert_eq!(index[0], 1);

    // Per-cycle intermediates from every batch ended up in the mission's
    // own rawnc directory; staging is gone.
    let rawnc_count = fs::read_dir(paths.rawnc_dir()).unwrap().count();
    assert!(rawnc_count >= 8);
    assert!(!paths.output_staging(0).exists());
    assert!(!paths.input_staging(0).exists());

    // The mission metadata sidecar is in place.
    assert!(paths.meta_path().exists());
}

#[test]
fn small_mission_processes_directly_without_staging() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path(), 50);
    let mission = MissionId::new(61, 11);
    seed_mission(&config, mission, 4);

    let summary = process_mission(&config, &SyntheticDecoder, &TestGeocoder, mission).unwrap();
    assert_eq!(summary.total_dives, 4);

    let paths = MissionPaths::new(&config, mission);
    assert!(paths.timeseries_dir().join("timeseries.parquet").exists());
    assert!(paths.gridfiles_dir().join("grid.parquet").exists());
    // No staging directories were ever created.
    assert!(!paths.input_staging(0).exists());
    assert!(!paths.output_staging(0).exists());
}

#[test]
fn ledger_skips_processed_missions_on_rescan() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path(), 50);
    let mission = MissionId::new(61, 12);
    seed_mission(&config, mission, 4);

    assert_eq!(discover_missions(&config.raw_root).unwrap(), vec![mission]);

    run_new_missions(&config, &SyntheticDecoder, &TestGeocoder, false).unwrap();
    let ledger = Ledger::load(&config.ledger_path).unwrap();
    let first_proc_time = ledger.get(mission).unwrap().proc_time;
    assert!(first_proc_time > chrono::DateTime::UNIX_EPOCH);

    // Second scan finds nothing new and leaves the row untouched.
    run_new_missions(&config, &SyntheticDecoder, &TestGeocoder, false).unwrap();
    let ledger = Ledger::load(&config.ledger_path).unwrap();
    assert_eq!(ledger.entries().len(), 1);
    assert_eq!(ledger.get(mission).unwrap().proc_time, first_proc_time);
}
