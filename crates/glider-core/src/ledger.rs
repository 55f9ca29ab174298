use std::collections::HashSet;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{PipelineError, Result};
use crate::paths::MissionId;

/// One row of the reprocessing ledger. `proc_time` is the completion time
/// of the last successful run, except while a run is in flight, when it sits
/// a fixed increment ahead of the previous completion (never at "now"). An
/// external staleness watchdog uses that distinction to tell "crashed mid
/// run" apart from "finished".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub glider: i64,
    pub mission: i64,
    pub proc_time: DateTime<Utc>,
    /// Stored in the CSV `duration` column as whole seconds.
    #[serde(rename = "duration")]
    pub duration_seconds: i64,
}

impl LedgerEntry {
    pub fn mission_id(&self) -> MissionId {
        MissionId::new(self.glider, self.mission)
    }
}

/// Durable table keyed uniquely by (glider, mission), driving idempotent
/// skip/retry decisions. Read, modified in full and rewritten in full;
/// safe only under single-writer execution.
#[derive(Debug, Default)]
pub struct Ledger {
    entries: Vec<LedgerEntry>,
}

impl Ledger {
    /// Loads the ledger CSV. A missing file is an empty ledger; duplicate
    /// (glider, mission) keys are a defect and fail the load.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("no ledger at {}, starting empty", path.display());
            return Ok(Self::default());
        }
        let mut reader = csv::Reader::from_path(path)?;
        let mut entries = Vec::new();
        let mut seen = HashSet::new();
        for record in reader.deserialize() {
            let entry: LedgerEntry = record?;
            if !seen.insert((entry.glider, entry.mission)) {
                return Err(PipelineError::DuplicateLedgerEntry {
                    glider: entry.glider,
                    mission: entry.mission,
                });
            }
            entries.push(entry);
        }
        Ok(Self { entries })
    }

    /// Rewrites the whole ledger, via a temporary file and atomic rename so
    /// a crash mid-write cannot truncate it.
    pub fn save(&self, path: &Path) -> Result<()> {
        let tmp_path = path.with_extension("csv.tmp");
        {
            let mut writer = csv::Writer::from_path(&tmp_path)?;
            for entry in &self.entries {
                writer.serialize(entry)?;
            }
            writer.flush()?;
        }
        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn get(&self, mission: MissionId) -> Option<&LedgerEntry> {
        self.entries.iter().find(|e| e.mission_id() == mission)
    }

    pub fn contains(&self, mission: MissionId) -> bool {
        self.get(mission).is_some()
    }

    /// Missions on disk that the ledger has never seen (or all of them when
    /// `force` is set), in sorted order.
    pub fn missions_to_process(&self, on_disk: &[MissionId], force: bool) -> Vec<MissionId> {
        let mut todo: Vec<MissionId> = on_disk
            .iter()
            .copied()
            .filter(|mission| force || !self.contains(*mission))
            .collect();
        todo.sort();
        todo
    }

    /// First half of the two-step update protocol: advance the row's
    /// timestamp by a fixed increment before work starts, creating the row
    /// on first sight of a mission.
    pub fn mark_in_flight(&mut self, mission: MissionId, increment: Duration) {
        match self
            .entries
            .iter_mut()
            .find(|e| e.mission_id() == mission)
        {
            Some(entry) => {
                entry.proc_time += increment;
            }
            None => {
                warn!("new mission {mission}, adding ledger entry");
                self.entries.push(LedgerEntry {
                    glider: mission.glider,
                    mission: mission.mission,
                    proc_time: DateTime::UNIX_EPOCH + increment,
                    duration_seconds: 0,
                });
            }
        }
    }

    /// Second half: record the actual completion wall-clock time and the
    /// run duration once the whole pipeline has finished.
    pub fn mark_complete(
        &mut self,
        mission: MissionId,
        finished_at: DateTime<Utc>,
        duration: Duration,
    ) {
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|e| e.mission_id() == mission)
        {
            entry.proc_time = finished_at;
            entry.duration_seconds = duration.num_seconds();
        }
    }
}
