//! Quarter Engine: Canonical Hashing
//!
//! Deterministic canonical serialization + SHA-256 hashing of a
//! `GameState`. Two runs agree on the hash exactly when they agree on
//! every field.
//!
//! Rules:
//!   - engine_version first, then a fixed top-level field order
//!   - collections keep their game order (order is game state)
//!   - UTF-8 JSON, no whitespace, integers only
//!
//! The canonical bytes decode back into a `GameState`.

use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::state::GameState;
use crate::ENGINE_VERSION;

/// Canonical serialization of a game state to UTF-8 JSON bytes.
pub fn canonical_serialize(state: &GameState) -> Result<Vec<u8>, serde_json::Error> {
    let value = build_canonical_value(state)?;
    serde_json::to_vec(&value)
}

/// SHA-256 of the canonical serialization. Lowercase hex string.
pub fn canonical_hash(state: &GameState) -> Result<String, serde_json::Error> {
    let bytes = canonical_serialize(state)?;
    Ok(hex_digest(&bytes))
}

/// Lowercase hex SHA-256 of arbitrary bytes.
pub fn hex_digest(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

fn field<T: Serialize>(root: &mut Map<String, Value>, key: &str, value: &T) -> Result<(), serde_json::Error> {
    root.insert(key.to_string(), serde_json::to_value(value)?);
    Ok(())
}

/// Build the canonical value in strict field order. `serde_json::Map`
/// preserves insertion order.
fn build_canonical_value(state: &GameState) -> Result<Value, serde_json::Error> {
    let mut root = Map::new();
    // engine_version MUST be first: it is part of the state's identity.
    root.insert(
        "engine_version".to_string(),
        Value::Number(ENGINE_VERSION.into()),
    );
    field(&mut root, "seed", &state.seed)?;
    field(&mut root, "config", &state.config)?;
    field(&mut root, "turn", &state.turn)?;
    field(&mut root, "org", &state.org)?;
    field(&mut root, "ceo", &state.ceo)?;
    field(&mut root, "resources", &state.resources)?;
    field(&mut root, "deck", &state.deck)?;
    field(&mut root, "hand", &state.hand)?;
    field(&mut root, "crises", &state.crises)?;
    field(&mut root, "situations", &state.situations)?;
    field(&mut root, "objectives", &state.objectives)?;
    field(&mut root, "backlash", &state.backlash)?;
    field(&mut root, "next_crisis_serial", &state.next_crisis_serial)?;
    field(&mut root, "last_review", &state.last_review)?;
    field(&mut root, "outcome", &state.outcome)?;
    Ok(Value::Object(root))
}
