//! Replay: rebuild a game from its seed, config and choice history.
//!
//! Delegates every rule to the kernel. No cached state, no shortcuts.

use ceo_engine::config::EngineConfig;
use ceo_engine::content::ContentTables;
use ceo_engine::engine::QuarterEngine;
use ceo_engine::events::ChoiceEnvelope;
use ceo_engine::hashing::canonical_hash;
use ceo_engine::state::GameState;

use crate::error::RuntimeError;

/// Rebuild the game state from a sequence of choices.
///
/// 1. Create a fresh engine for (content, config, seed)
/// 2. Pass each choice to the kernel in order
/// 3. Return (final_state, canonical_hash)
pub fn rebuild_state(
    content: &ContentTables,
    config: &EngineConfig,
    seed: u64,
    choices: &[ChoiceEnvelope],
) -> Result<(GameState, String), RuntimeError> {
    let engine = rebuild_engine(content, config, seed, choices)?;
    let hash = canonical_hash(engine.state())?;
    Ok((engine.state().clone(), hash))
}

pub fn rebuild_hash(
    content: &ContentTables,
    config: &EngineConfig,
    seed: u64,
    choices: &[ChoiceEnvelope],
) -> Result<String, RuntimeError> {
    rebuild_state(content, config, seed, choices).map(|(_, hash)| hash)
}

pub fn rebuild_engine(
    content: &ContentTables,
    config: &EngineConfig,
    seed: u64,
    choices: &[ChoiceEnvelope],
) -> Result<QuarterEngine, RuntimeError> {
    let engine = QuarterEngine::replay(content.clone(), config.clone(), seed, choices)?;
    tracing::debug!(
        target: "ceo_runtime::replay",
        seed,
        choices = choices.len(),
        quarter = engine.state().quarter(),
        "replay.complete"
    );
    Ok(engine)
}
