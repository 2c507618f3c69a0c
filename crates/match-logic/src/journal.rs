//! Results recording
//!
//! The match engine streams every resolved round into a [`RoundSink`].
//! [`ResultsRecorder`] is the persistent sink: it owns a run directory
//! and appends one JSON line per round, flushed and synced before the
//! next round is accepted, so an aborted run leaves a replayable prefix.
//!
//! Write failures never abort the tournament. The first failure is logged,
//! all further writes stop, and the run reports itself as incomplete.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{error, info};
use serde::{Deserialize, Serialize};

use crate::error::LeagueError;
use crate::game::{MatchResult, RoundRecord};
use crate::leaderboard::{Leaderboard, LeaderboardSnapshot};
use crate::random::SeedSalt;

pub const RAW_DIR: &str = "raw";
pub const SUMMARIES_DIR: &str = "summaries";
pub const METADATA_DIR: &str = "metadata";
pub const ROUNDS_FILE: &str = "rounds.jsonl";
pub const MATCHES_FILE: &str = "matches.jsonl";
pub const METADATA_FILE: &str = "tournament.json";
pub const SNAPSHOTS_FILE: &str = "snapshots.jsonl";
pub const LEADERBOARD_FILE: &str = "leaderboard.csv";

/// Receives tournament output as it is produced
pub trait RoundSink {
    fn record_round(&mut self, record: &RoundRecord);

    fn record_match(&mut self, _result: &MatchResult) {}

    fn record_snapshot(&mut self, _snapshot: &LeaderboardSnapshot) {}
}

/// Discards everything
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl RoundSink for NullSink {
    fn record_round(&mut self, _record: &RoundRecord) {}
}

impl RoundSink for Vec<RoundRecord> {
    fn record_round(&mut self, record: &RoundRecord) {
        self.push(record.clone());
    }
}

/// Outcome of persisting a run
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum PersistenceStatus {
    Complete,
    Disabled,
    Incomplete(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotInfo {
    pub name: String,
    pub digest: Option<String>,
}

/// Contents of `metadata/tournament.json`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub engine_version: String,
    pub seed_salt: SeedSalt,
    pub config_fingerprint: String,
    pub bots: Vec<BotInfo>,
    pub rounds_per_match: u32,
    pub matches_per_pair: u32,
    pub match_count: u32,
    /// Rounds actually played; zero until the run finishes
    pub round_count: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Absent while the run is in progress
    pub persistence: Option<PersistenceStatus>,
}

/// Append-only JSON lines file
pub struct JournalWriter {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl JournalWriter {
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, LeagueError> {
        let path = path.into();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| LeagueError::persistence(&path, e))?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    /// Write one record and make it durable before returning
    pub fn append<T: Serialize>(&mut self, record: &T) -> Result<(), LeagueError> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer
            .write_all(b"\n")
            .and_then(|_| self.writer.flush())
            .and_then(|_| self.writer.get_ref().sync_data())
            .map_err(|e| LeagueError::persistence(&self.path, e))
    }

    pub fn flush(&mut self) -> Result<(), LeagueError> {
        self.writer
            .flush()
            .map_err(|e| LeagueError::persistence(&self.path, e))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for JournalWriter {
    fn drop(&mut self) {
        if let Err(e) = self.writer.flush() {
            error!("failed to flush {}: {e}", self.path.display());
        }
    }
}

/// Which optional files a recorder writes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecorderOptions {
    pub log_raw_data: bool,
    pub log_summaries: bool,
}

impl Default for RecorderOptions {
    fn default() -> Self {
        Self {
            log_raw_data: true,
            log_summaries: true,
        }
    }
}

/// Persistent [`RoundSink`] writing the results bundle
pub struct ResultsRecorder {
    run_dir: Option<PathBuf>,
    rounds: Option<JournalWriter>,
    matches: Option<JournalWriter>,
    snapshots: Option<JournalWriter>,
    status: PersistenceStatus,
}

impl ResultsRecorder {
    /// No-op recorder for simulation runs
    pub fn disabled() -> Self {
        Self {
            run_dir: None,
            rounds: None,
            matches: None,
            snapshots: None,
            status: PersistenceStatus::Disabled,
        }
    }

    /// Recorder that could not be opened; computation goes on without it
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            status: PersistenceStatus::Incomplete(reason.into()),
            ..Self::disabled()
        }
    }

    /// Create a fresh run directory under `results_dir` and open its files.
    ///
    /// The initial metadata (no end time, no status) is written immediately.
    pub fn create(
        results_dir: &Path,
        metadata: &RunMetadata,
        options: RecorderOptions,
    ) -> Result<Self, LeagueError> {
        let run_dir = create_run_dir(results_dir, metadata.started_at)?;
        for sub in [RAW_DIR, SUMMARIES_DIR, METADATA_DIR] {
            let dir = run_dir.join(sub);
            fs::create_dir_all(&dir).map_err(|e| LeagueError::persistence(&dir, e))?;
        }

        write_json(&run_dir.join(METADATA_DIR).join(METADATA_FILE), metadata)?;

        let rounds = if options.log_raw_data {
            Some(JournalWriter::create(run_dir.join(RAW_DIR).join(ROUNDS_FILE))?)
        } else {
            None
        };
        let matches = if options.log_summaries {
            Some(JournalWriter::create(run_dir.join(SUMMARIES_DIR).join(MATCHES_FILE))?)
        } else {
            None
        };
        let snapshots = Some(JournalWriter::create(run_dir.join(METADATA_DIR).join(SNAPSHOTS_FILE))?);

        info!("recording results to {}", run_dir.display());

        Ok(Self {
            run_dir: Some(run_dir),
            rounds,
            matches,
            snapshots,
            status: PersistenceStatus::Complete,
        })
    }

    pub fn run_dir(&self) -> Option<&Path> {
        self.run_dir.as_deref()
    }

    pub fn status(&self) -> &PersistenceStatus {
        &self.status
    }

    pub fn is_enabled(&self) -> bool {
        self.run_dir.is_some() && self.status == PersistenceStatus::Complete
    }

    /// Write the summary files and close the journals.
    ///
    /// Returns the final persistence status, which is also stored in the
    /// rewritten metadata.
    pub fn finish(&mut self, metadata: &RunMetadata, leaderboard: &Leaderboard) -> PersistenceStatus {
        let Some(run_dir) = self.run_dir.clone() else {
            return self.status.clone();
        };

        for mut writer in [self.rounds.take(), self.matches.take(), self.snapshots.take()]
            .into_iter()
            .flatten()
        {
            let result = writer.flush();
            self.check(result);
        }

        if self.status == PersistenceStatus::Complete {
            let path = run_dir.join(LEADERBOARD_FILE);
            if let Err(e) = fs::write(&path, leaderboard.to_csv()) {
                self.fail(LeagueError::persistence(path, e));
            }
        }

        let mut metadata = metadata.clone();
        metadata.persistence = Some(self.status.clone());
        if let Err(e) = write_json(&run_dir.join(METADATA_DIR).join(METADATA_FILE), &metadata) {
            self.fail(e);
        }

        self.status.clone()
    }

    /// Stop writing and remember why
    fn fail(&mut self, err: LeagueError) {
        error!("persistence disabled for the rest of the run: {err}");
        self.rounds = None;
        self.matches = None;
        self.snapshots = None;
        if !matches!(self.status, PersistenceStatus::Incomplete(_)) {
            self.status = PersistenceStatus::Incomplete(err.to_string());
        }
    }

    fn check(&mut self, result: Result<(), LeagueError>) {
        if let Err(e) = result {
            self.fail(e);
        }
    }
}

impl RoundSink for ResultsRecorder {
    fn record_round(&mut self, record: &RoundRecord) {
        let result = match self.rounds.as_mut() {
            Some(writer) => writer.append(record),
            None => return,
        };
        self.check(result);
    }

    fn record_match(&mut self, result: &MatchResult) {
        let outcome = match self.matches.as_mut() {
            Some(writer) => writer.append(result),
            None => return,
        };
        self.check(outcome);
    }

    fn record_snapshot(&mut self, snapshot: &LeaderboardSnapshot) {
        let result = match self.snapshots.as_mut() {
            Some(writer) => writer.append(snapshot),
            None => return,
        };
        self.check(result);
    }
}

/// `tournament_<UTC stamp>`, suffixed `_<n>` until the name is unused
fn create_run_dir(results_dir: &Path, started_at: DateTime<Utc>) -> Result<PathBuf, LeagueError> {
    fs::create_dir_all(results_dir).map_err(|e| LeagueError::persistence(results_dir, e))?;

    let base = format!("tournament_{}", started_at.format("%Y%m%dT%H%M%SZ"));
    let mut attempt = 0u32;
    loop {
        let name = if attempt == 0 {
            base.clone()
        } else {
            format!("{base}_{attempt}")
        };
        let candidate = results_dir.join(name);
        match fs::create_dir(&candidate) {
            Ok(()) => return Ok(candidate),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
            Err(e) => return Err(LeagueError::persistence(candidate, e)),
        }
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), LeagueError> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).map_err(|e| LeagueError::persistence(path, e))
}
