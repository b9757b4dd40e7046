//! Runtime errors. Engine rejections pass through unchanged so callers can
//! still tell a bad choice from a broken install.

use std::io;
use std::path::PathBuf;

use ceo_engine::error::{EngineError, LoadError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("i/o: {0}")]
    Io(#[from] io::Error),
    #[error("protobuf decode: {0}")]
    Decode(#[from] prost::DecodeError),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error("choice log sequence violation: expected {expected}, got {actual}")]
    SequenceViolation { expected: u64, actual: u64 },
    #[error("choice log frame {index}: {reason}")]
    CorruptFrame { index: usize, reason: String },
    #[error("choice {sequence} has no payload")]
    EmptyChoice { sequence: u64 },
    #[error("session already exists at {0:?}")]
    SessionExists(PathBuf),
    #[error("no session at {0:?}")]
    NoSession(PathBuf),
    #[error("session `{0}` lock poisoned")]
    Poisoned(String),
    #[error("determinism failure: run 1 {first}, run 2 {second}")]
    Determinism { first: String, second: String },
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),
    #[error("deserialization failed: {0}")]
    Deserialization(#[source] serde_json::Error),
    #[error("restored state rejected: {0}")]
    InvariantViolation(#[source] EngineError),
    #[error("hash mismatch: recorded {recorded}, computed {computed}")]
    HashMismatch { recorded: String, computed: String },
    #[error("snapshot written by engine v{found}, running v{running}")]
    VersionMismatch { found: u32, running: u32 },
    #[error("i/o: {0}")]
    Io(#[from] io::Error),
}
