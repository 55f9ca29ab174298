use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::config::PipelineConfig;
use crate::error::Result;

/// One mission of one glider. The key of every per-mission artifact,
/// including the reprocessing ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MissionId {
    pub glider: i64,
    pub mission: i64,
}

impl fmt::Display for MissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SEA{} M{}", self.glider, self.mission)
    }
}

impl MissionId {
    pub fn new(glider: i64, mission: i64) -> Self {
        Self { glider, mission }
    }

    /// `delayed_SEA045_M23` style identifier carried in the mission metadata.
    pub fn dataset_id(&self) -> String {
        format!("delayed_SEA{:03}_M{}", self.glider, self.mission)
    }
}

/// Directory layout for one mission's inputs, outputs and staging space.
#[derive(Debug, Clone)]
pub struct MissionPaths {
    pub mission: MissionId,
    raw_dir: PathBuf,
    output_dir: PathBuf,
    staging_root: PathBuf,
}

impl MissionPaths {
    pub fn new(config: &PipelineConfig, mission: MissionId) -> Self {
        let sub = format!("SEA{}/M{}", mission.glider, mission.mission);
        Self {
            mission,
            raw_dir: config.raw_root.join(&sub),
            output_dir: config.output_root.join(&sub),
            staging_root: config.staging_root.clone(),
        }
    }

    pub fn raw_dir(&self) -> &Path {
        &self.raw_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn timeseries_dir(&self) -> PathBuf {
        self.output_dir.join("timeseries")
    }

    pub fn gridfiles_dir(&self) -> PathBuf {
        self.output_dir.join("gridfiles")
    }

    pub fn rawnc_dir(&self) -> PathBuf {
        self.output_dir.join("rawnc")
    }

    pub fn profiles_dir(&self) -> PathBuf {
        self.output_dir.join("profiles")
    }

    pub fn meta_path(&self) -> PathBuf {
        self.output_dir.join("mission_meta.json")
    }

    /// Staging directory holding copies of one batch's raw input files.
    pub fn input_staging(&self, batch: usize) -> PathBuf {
        self.staging_root.join(format!(
            "raw_SEA{}_M{}_sub_{batch}",
            self.mission.glider, self.mission.mission
        ))
    }

    /// Working directory for one batch's decoded and processed outputs.
    pub fn output_staging(&self, batch: usize) -> PathBuf {
        self.staging_root.join(format!(
            "proc_SEA{}_M{}_sub_{batch}",
            self.mission.glider, self.mission.mission
        ))
    }

    pub fn ensure_output_dirs(&self) -> Result<()> {
        for dir in [
            self.timeseries_dir(),
            self.gridfiles_dir(),
            self.rawnc_dir(),
            self.profiles_dir(),
        ] {
            fs::create_dir_all(&dir)?;
        }
        Ok(())
    }
}

/// Scans the raw data root for `SEA*/M*` mission directories. Directory
/// names that do not parse are logged and skipped, not fatal.
pub fn discover_missions(raw_root: &Path) -> Result<Vec<MissionId>> {
    let pattern = format!("{}/SEA*/M*", raw_root.display());
    let mut missions = Vec::new();
    for entry in glob::glob(&pattern)?.filter_map(|entry| entry.ok()) {
        if !entry.is_dir() {
            continue;
        }
        match parse_mission_dirs(&entry) {
            Some(mission) => missions.push(mission),
            None => warn!("could not parse mission directory {}", entry.display()),
        }
    }
    missions.sort();
    Ok(missions)
}

fn parse_mission_dirs(path: &Path) -> Option<MissionId> {
    let mission_name = path.file_name()?.to_str()?;
    let glider_name = path.parent()?.file_name()?.to_str()?;
    let glider = glider_name.strip_prefix("SEA")?.parse().ok()?;
    let mission = mission_name.strip_prefix('M')?.parse().ok()?;
    Some(MissionId::new(glider, mission))
}
