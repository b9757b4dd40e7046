//! Session manager: isolated games with persist-after-apply semantics.
//!
//! Directory layout:
//!   <base_dir>/<session_id>/session.json   seed, config, snapshot interval
//!   <base_dir>/<session_id>/choices.log    append-only protobuf frames
//!   <base_dir>/<session_id>/snapshots/     snapshot_NNNNNN.json
//!
//! Apply order:
//!   1. The kernel applies the choice to a scratch copy of the engine
//!   2. The choice is appended to the log, only if step 1 succeeded
//!   3. The scratch copy becomes the live engine
//!   4. Snapshot if the interval is reached
//!
//! Concurrency: `SharedSession` serializes writers with a Mutex. No
//! global mutable state.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use ceo_engine::config::EngineConfig;
use ceo_engine::content::ContentTables;
use ceo_engine::engine::QuarterEngine;
use ceo_engine::events::{ChoiceEnvelope, PlayerChoice};
use ceo_engine::hashing::canonical_hash;
use ceo_engine::log::LogEntry;
use ceo_engine::state::GameState;
use ceo_engine::ENGINE_VERSION;
use serde::{Deserialize, Serialize};

use crate::choice_log::ChoiceLog;
use crate::error::{RuntimeError, SnapshotError};
use crate::replay;
use crate::snapshot;

pub const HEADER_FILE: &str = "session.json";
pub const LOG_FILE: &str = "choices.log";
pub const SNAPSHOT_DIR: &str = "snapshots";

/// Everything besides the choices needed to rebuild a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionHeader {
    pub engine_version: u32,
    pub seed: u64,
    pub config: EngineConfig,
    /// Take a snapshot after every N-th choice; 0 disables snapshots.
    pub snapshot_interval: u64,
}

#[derive(Debug)]
pub struct Session {
    session_id: String,
    dir: PathBuf,
    header: SessionHeader,
    engine: QuarterEngine,
    log: ChoiceLog,
}

impl Session {
    /// Start a new game in `<base_dir>/<session_id>`. Fails if a session
    /// already lives there.
    pub fn create(
        base_dir: &Path,
        session_id: &str,
        seed: u64,
        config: EngineConfig,
        content: ContentTables,
        snapshot_interval: u64,
    ) -> Result<Self, RuntimeError> {
        let dir = base_dir.join(session_id);
        let header_path = dir.join(HEADER_FILE);
        if header_path.exists() {
            return Err(RuntimeError::SessionExists(dir));
        }

        let engine = QuarterEngine::new(content, config.clone(), seed)?;
        let header = SessionHeader {
            engine_version: ENGINE_VERSION,
            seed,
            config,
            snapshot_interval,
        };
        fs::create_dir_all(&dir)?;
        fs::write(&header_path, serde_json::to_vec_pretty(&header)?)?;
        let log = ChoiceLog::open(&dir.join(LOG_FILE))?;

        tracing::info!(
            target: "ceo_runtime::session",
            session = session_id,
            seed,
            "session.created"
        );
        Ok(Self {
            session_id: session_id.to_string(),
            dir,
            header,
            engine,
            log,
        })
    }

    /// Reopen an existing session, resuming from the latest valid
    /// snapshot and replaying the choices after it.
    pub fn open(base_dir: &Path, session_id: &str, content: ContentTables) -> Result<Self, RuntimeError> {
        let dir = base_dir.join(session_id);
        let header_path = dir.join(HEADER_FILE);
        if !header_path.exists() {
            return Err(RuntimeError::NoSession(dir));
        }
        let header: SessionHeader = serde_json::from_slice(&fs::read(&header_path)?)?;
        if header.engine_version != ENGINE_VERSION {
            return Err(SnapshotError::VersionMismatch {
                found: header.engine_version,
                running: ENGINE_VERSION,
            }
            .into());
        }

        let log = ChoiceLog::open(&dir.join(LOG_FILE))?;
        let choices = log.load_all()?;
        let engine = match resume_from_snapshot(&dir.join(SNAPSHOT_DIR), &content, &choices) {
            Ok(Some(engine)) => engine,
            Ok(None) => replay::rebuild_engine(&content, &header.config, header.seed, &choices)?,
            Err(err) => {
                tracing::warn!(
                    target: "ceo_runtime::session",
                    session = session_id,
                    error = %err,
                    "snapshot.rejected; full replay"
                );
                replay::rebuild_engine(&content, &header.config, header.seed, &choices)?
            }
        };

        tracing::info!(
            target: "ceo_runtime::session",
            session = session_id,
            choices = choices.len(),
            quarter = engine.state().quarter(),
            "session.opened"
        );
        Ok(Self {
            session_id: session_id.to_string(),
            dir,
            header,
            engine,
            log,
        })
    }

    /// Apply one choice and persist it. A rejected choice is neither
    /// applied nor written.
    pub fn apply(&mut self, choice: PlayerChoice) -> Result<Vec<LogEntry>, RuntimeError> {
        let envelope = ChoiceEnvelope {
            sequence: self.engine.last_sequence() + 1,
            quarter: self.engine.state().quarter(),
            choice,
        };
        let mut next = self.engine.clone();
        let entries = next.apply_envelope(&envelope)?;
        self.log.append(&envelope)?;
        self.engine = next;

        let interval = self.header.snapshot_interval;
        if interval > 0 && envelope.sequence % interval == 0 {
            // The choice is already durable; a failed snapshot only costs
            // replay time on the next open.
            if let Err(err) = self.snapshot_now() {
                tracing::warn!(
                    target: "ceo_runtime::session",
                    session = %self.session_id,
                    sequence = envelope.sequence,
                    error = %err,
                    "snapshot.failed"
                );
            }
        }
        Ok(entries)
    }

    pub fn snapshot_now(&self) -> Result<PathBuf, RuntimeError> {
        let path = snapshot::save_snapshot(
            &self.dir.join(SNAPSHOT_DIR),
            self.engine.last_sequence(),
            self.engine.state(),
        )?;
        Ok(path)
    }

    /// Discard the live engine and rebuild it from the log alone.
    pub fn replay_full(&mut self) -> Result<String, RuntimeError> {
        let choices = self.log.load_all()?;
        self.engine = replay::rebuild_engine(
            self.engine.content(),
            &self.header.config,
            self.header.seed,
            &choices,
        )?;
        self.current_hash()
    }

    pub fn state(&self) -> &GameState {
        self.engine.state()
    }

    pub fn engine(&self) -> &QuarterEngine {
        &self.engine
    }

    pub fn header(&self) -> &SessionHeader {
        &self.header
    }

    pub fn current_hash(&self) -> Result<String, RuntimeError> {
        Ok(canonical_hash(self.engine.state())?)
    }

    pub fn current_sequence(&self) -> u64 {
        self.engine.last_sequence()
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Latest snapshot not ahead of the log, restored and caught up with the
/// remaining choices. `Ok(None)` when there is no usable snapshot.
fn resume_from_snapshot(
    snapshot_dir: &Path,
    content: &ContentTables,
    choices: &[ChoiceEnvelope],
) -> Result<Option<QuarterEngine>, RuntimeError> {
    let recorded = choices.len() as u64;
    let Some(sequence) = snapshot::list_snapshots(snapshot_dir)?
        .into_iter()
        .rev()
        .find(|&seq| seq <= recorded)
    else {
        return Ok(None);
    };
    let Some(snap) = snapshot::load_snapshot(snapshot_dir, sequence)? else {
        return Ok(None);
    };

    let state = snap.restore(content)?;
    let split = sequence as usize;
    let mut engine = QuarterEngine::from_state(content.clone(), state, choices[..split].to_vec())?;
    engine.apply_sequence(&choices[split..])?;
    Ok(Some(engine))
}

/// Thread-safe session handle.
#[derive(Debug)]
pub struct SharedSession {
    inner: Mutex<Session>,
}

impl SharedSession {
    pub fn new(session: Session) -> Self {
        Self {
            inner: Mutex::new(session),
        }
    }

    fn with<T>(&self, f: impl FnOnce(&mut Session) -> Result<T, RuntimeError>) -> Result<T, RuntimeError> {
        let mut session = self.inner.lock().map_err(|poisoned| {
            RuntimeError::Poisoned(poisoned.get_ref().session_id.clone())
        })?;
        f(&mut session)
    }

    pub fn apply(&self, choice: PlayerChoice) -> Result<Vec<LogEntry>, RuntimeError> {
        self.with(|s| s.apply(choice))
    }

    pub fn current_hash(&self) -> Result<String, RuntimeError> {
        self.with(|s| s.current_hash())
    }

    pub fn current_sequence(&self) -> Result<u64, RuntimeError> {
        self.with(|s| Ok(s.current_sequence()))
    }

    pub fn is_over(&self) -> Result<bool, RuntimeError> {
        self.with(|s| Ok(s.engine().is_over()))
    }
}
