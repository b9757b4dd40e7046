//! Snapshot layer: deterministic state snapshots on disk.
//!
//! A snapshot holds the canonical JSON of a `GameState`, its SHA-256 and
//! the choice sequence it was taken after. No timestamps.
//!
//! A snapshot that fails verification is ignored and the caller falls
//! back to a full replay.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use ceo_engine::content::ContentTables;
use ceo_engine::state::GameState;
use ceo_engine::ENGINE_VERSION;
use serde::{Deserialize, Serialize};

use crate::error::SnapshotError;
use crate::snapshot_codec::{digest_hex, encode_snapshot, restore_snapshot};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Snapshot {
    /// Sequence of the last choice applied before this snapshot.
    pub sequence: u64,
    pub canonical_json: String,
    pub hash: String,
    pub engine_version: u32,
}

impl Snapshot {
    pub fn capture(sequence: u64, state: &GameState) -> Result<Self, SnapshotError> {
        let canonical_json = encode_snapshot(state)?;
        let hash = digest_hex(canonical_json.as_bytes());
        Ok(Self {
            sequence,
            canonical_json,
            hash,
            engine_version: ENGINE_VERSION,
        })
    }

    /// Check the recorded hash and engine version.
    pub fn verify(&self) -> Result<(), SnapshotError> {
        if self.engine_version != ENGINE_VERSION {
            return Err(SnapshotError::VersionMismatch {
                found: self.engine_version,
                running: ENGINE_VERSION,
            });
        }
        let computed = digest_hex(self.canonical_json.as_bytes());
        if computed != self.hash {
            return Err(SnapshotError::HashMismatch {
                recorded: self.hash.clone(),
                computed,
            });
        }
        Ok(())
    }

    /// Verify, decode and invariant-check the captured state.
    pub fn restore(&self, content: &ContentTables) -> Result<GameState, SnapshotError> {
        self.verify()?;
        restore_snapshot(&self.canonical_json, content)
    }
}

fn snapshot_path(dir: &Path, sequence: u64) -> PathBuf {
    dir.join(format!("snapshot_{:06}.json", sequence))
}

pub fn save_snapshot(dir: &Path, sequence: u64, state: &GameState) -> Result<PathBuf, SnapshotError> {
    fs::create_dir_all(dir)?;
    let snap = Snapshot::capture(sequence, state)?;
    let content = serde_json::to_string(&snap).map_err(SnapshotError::Serialization)?;

    let path = snapshot_path(dir, sequence);
    let mut file = File::create(&path)?;
    file.write_all(content.as_bytes())?;
    file.sync_all()?;

    tracing::debug!(
        target: "ceo_runtime::snapshot",
        sequence,
        path = %path.display(),
        "snapshot.saved"
    );
    Ok(path)
}

/// `None` when no snapshot exists at `sequence`.
pub fn load_snapshot(dir: &Path, sequence: u64) -> Result<Option<Snapshot>, SnapshotError> {
    let path = snapshot_path(dir, sequence);
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&path)?;
    let snap = serde_json::from_str(&content).map_err(SnapshotError::Deserialization)?;
    Ok(Some(snap))
}

/// Sequences with a snapshot file in `dir`, ascending.
pub fn list_snapshots(dir: &Path) -> Result<Vec<u64>, SnapshotError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut sequences = Vec::new();
    for entry in fs::read_dir(dir)? {
        let name = entry?.file_name();
        let seq = name
            .to_string_lossy()
            .strip_prefix("snapshot_")
            .and_then(|s| s.strip_suffix(".json"))
            .and_then(|s| s.parse::<u64>().ok());
        if let Some(seq) = seq {
            sequences.push(seq);
        }
    }
    sequences.sort_unstable();
    Ok(sequences)
}

pub fn load_latest_snapshot(dir: &Path) -> Result<Option<Snapshot>, SnapshotError> {
    match list_snapshots(dir)?.last() {
        Some(&seq) => load_snapshot(dir, seq),
        None => Ok(None),
    }
}
