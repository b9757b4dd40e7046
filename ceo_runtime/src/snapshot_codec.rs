//! Snapshot Codec: deterministic GameState encoder/decoder.
//!
//! Pure codec layer. No timestamps, no envelope.
//!
//! - `encode_snapshot`:  GameState → canonical JSON string
//! - `decode_snapshot`:  JSON string → GameState (strict, no defaults)
//! - `restore_snapshot`: decode + invariant validation against content
//! - `export_snapshot_to_file` / `import_snapshot_from_file`: file I/O
//! - `snapshot_hash`:    SHA-256 of the encoded JSON (lowercase hex)

use std::fs;
use std::path::Path;

use ceo_engine::content::ContentTables;
use ceo_engine::hashing::canonical_serialize;
use ceo_engine::invariants::validate_invariants;
use ceo_engine::state::GameState;

use sha2::{Digest, Sha256};

use crate::error::SnapshotError;

// ---------------------------------------------------------------------------
// Encoder / decoder
// ---------------------------------------------------------------------------

/// The kernel's canonical serialization, as a string. Identical states
/// encode to identical bytes.
pub fn encode_snapshot(state: &GameState) -> Result<String, SnapshotError> {
    let bytes = canonical_serialize(state).map_err(SnapshotError::Serialization)?;
    // serde_json only ever emits UTF-8.
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Strict decode: unknown fields and missing fields both fail. No
/// invariant validation; use `restore_snapshot` for untrusted input.
pub fn decode_snapshot(json: &str) -> Result<GameState, SnapshotError> {
    serde_json::from_str::<GameState>(json).map_err(SnapshotError::Deserialization)
}

/// Decode and validate against the content tables the state will be
/// played with.
pub fn restore_snapshot(json: &str, content: &ContentTables) -> Result<GameState, SnapshotError> {
    let state = decode_snapshot(json)?;
    validate_invariants(&state, content).map_err(SnapshotError::InvariantViolation)?;
    Ok(state)
}

// ---------------------------------------------------------------------------
// File I/O
// ---------------------------------------------------------------------------

pub fn export_snapshot_to_file(state: &GameState, path: &Path) -> Result<(), SnapshotError> {
    let json = encode_snapshot(state)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, json.as_bytes())?;
    Ok(())
}

pub fn import_snapshot_from_file(path: &Path, content: &ContentTables) -> Result<GameState, SnapshotError> {
    let json = fs::read_to_string(path)?;
    restore_snapshot(&json, content)
}

/// SHA-256 of `encode_snapshot`. Equal to the kernel's `canonical_hash`.
pub fn snapshot_hash(state: &GameState) -> Result<String, SnapshotError> {
    let json = encode_snapshot(state)?;
    Ok(digest_hex(json.as_bytes()))
}

/// Lowercase hex SHA-256.
pub fn digest_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}
