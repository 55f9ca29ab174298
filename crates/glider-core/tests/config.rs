use std::fs;

use glider_core::config::PipelineConfig;
use glider_core::error::PipelineError;

#[test]
fn partial_toml_falls_back_to_defaults() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("glider.toml");
    fs::write(
        &path,
        "raw_root = \"/tmp/raw\"\nbatch_size = 100\n",
    )
    .unwrap();

    let config = PipelineConfig::load(&path).unwrap();
    assert_eq!(config.raw_root, std::path::PathBuf::from("/tmp/raw"));
    assert_eq!(config.batch_size, 100);
    assert_eq!(config.min_final_batch_files, 3);
    assert_eq!(config.in_flight_increment_hours, 24);
}

#[test]
fn zero_batch_size_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("glider.toml");
    fs::write(&path, "batch_size = 0\n").unwrap();

    let err = PipelineConfig::load(&path).unwrap_err();
    assert!(matches!(err, PipelineError::Config(_)));
}
