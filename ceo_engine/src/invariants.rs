//! Quarter Engine: Invariant Checks
//!
//! Whole-state validation run by the engine after every accepted choice
//! and by snapshot restore. Returns the first failure as
//! `ContentError::InvariantViolation`; a failure means the engine or its
//! content is defective, never that the player did something wrong.

use std::collections::{BTreeMap, BTreeSet};

use crate::arithmetic::{METER_MAX, METER_MIN};
use crate::content::ContentTables;
use crate::error::{ContentError, EngineError};
use crate::state::{GameState, Phase};
use crate::ENGINE_VERSION;

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

pub fn validate_invariants(state: &GameState, content: &ContentTables) -> Result<(), EngineError> {
    check_engine_version(state)?;
    check_meter_range(state)?;
    check_card_conservation(state, content)?;
    check_quarter_bounds(state)?;
    check_crises(state, content)?;
    check_situations(state, content)?;
    check_phase_consistency(state)?;
    check_objectives(state, content)?;
    Ok(())
}

fn violation(check: &'static str, detail: String) -> EngineError {
    ContentError::InvariantViolation { check, detail }.into()
}

// ---------------------------------------------------------------------------
// Individual checks (private)
// ---------------------------------------------------------------------------

fn check_engine_version(state: &GameState) -> Result<(), EngineError> {
    if state.engine_version != ENGINE_VERSION {
        return Err(violation(
            "engine_version",
            format!(
                "state written by engine v{}, running v{}",
                state.engine_version, ENGINE_VERSION
            ),
        ));
    }
    Ok(())
}

fn check_meter_range(state: &GameState) -> Result<(), EngineError> {
    for (meter, value) in state.org.values() {
        if !(METER_MIN..=METER_MAX).contains(&value) {
            return Err(violation("meter_range", format!("{meter} = {value}")));
        }
    }
    Ok(())
}

/// Draw pile, discard pile and hand together hold exactly the content deck.
fn check_card_conservation(state: &GameState, content: &ContentTables) -> Result<(), EngineError> {
    let mut expected: BTreeMap<&str, usize> = BTreeMap::new();
    for id in content.cards.iter().flat_map(|c| std::iter::repeat(c.id.as_str()).take(c.copies as usize)) {
        *expected.entry(id).or_default() += 1;
    }
    let mut held: BTreeMap<&str, usize> = BTreeMap::new();
    let piles = state
        .deck
        .draw_pile()
        .iter()
        .chain(state.deck.discard_pile())
        .chain(&state.hand);
    for id in piles {
        *held.entry(id.as_str()).or_default() += 1;
    }
    if held != expected {
        return Err(violation(
            "card_conservation",
            format!(
                "holding {} card(s), content deck has {}",
                state.total_cards(),
                expected.values().sum::<usize>()
            ),
        ));
    }
    if state.hand.len() > state.config.hand_size {
        return Err(violation(
            "hand_size",
            format!("{} card(s) in a {}-card hand", state.hand.len(), state.config.hand_size),
        ));
    }
    Ok(())
}

fn check_quarter_bounds(state: &GameState) -> Result<(), EngineError> {
    let quarter = state.quarter();
    if quarter == 0 || quarter > state.config.max_quarters {
        return Err(violation(
            "quarter_bounds",
            format!("quarter {quarter} outside 1..={}", state.config.max_quarters),
        ));
    }
    Ok(())
}

fn check_crises(state: &GameState, content: &ContentTables) -> Result<(), EngineError> {
    let mut ids = BTreeSet::new();
    for crisis in &state.crises {
        if !ids.insert(crisis.id.as_str()) {
            return Err(violation("crisis_ids", format!("duplicate crisis `{}`", crisis.id)));
        }
        if content.crisis(&crisis.definition_id).is_err() {
            return Err(violation(
                "crisis_refs",
                format!("`{}` has no definition `{}`", crisis.id, crisis.definition_id),
            ));
        }
        if crisis.severity == 0 {
            return Err(violation("crisis_severity", format!("`{}` at severity 0", crisis.id)));
        }
        if crisis.deadline_turn < crisis.created_turn {
            return Err(violation(
                "crisis_deadline",
                format!(
                    "`{}` deadline {} before creation {}",
                    crisis.id, crisis.deadline_turn, crisis.created_turn
                ),
            ));
        }
    }
    Ok(())
}

fn check_situations(state: &GameState, content: &ContentTables) -> Result<(), EngineError> {
    let book = &state.situations;
    for situation in book.pending.iter().chain(&book.due).chain(&book.deferred) {
        if content.situation(&situation.situation_id).is_err() {
            return Err(violation(
                "situation_refs",
                format!("unknown situation `{}`", situation.situation_id),
            ));
        }
        if situation.scheduled_quarter < situation.queued_quarter {
            return Err(violation(
                "situation_schedule",
                format!("`{}` scheduled before it was queued", situation.situation_id),
            ));
        }
    }
    for situation in &book.deferred {
        if situation.defer_count == 0 || situation.deferred_quarter.is_none() {
            return Err(violation(
                "situation_deferral",
                format!("`{}` deferred without a deferral record", situation.situation_id),
            ));
        }
    }
    Ok(())
}

/// The Situation phase is open exactly while something is due, and the
/// active reference always names the due head.
fn check_phase_consistency(state: &GameState) -> Result<(), EngineError> {
    let due = !state.situations.due.is_empty();
    let in_situation = state.phase() == Phase::Situation;
    if due != in_situation && !state.is_over() {
        return Err(violation(
            "phase_consistency",
            format!(
                "phase {} with {} due situation(s)",
                state.phase(),
                state.situations.due.len()
            ),
        ));
    }
    let head = state.situations.head().map(|s| s.situation_id.as_str());
    let active = state.turn.active_situation.as_deref();
    if in_situation && active != head {
        return Err(violation(
            "active_situation",
            format!("active {active:?}, due head {head:?}"),
        ));
    }
    if !in_situation && active.is_some() {
        return Err(violation(
            "active_situation",
            format!("active {active:?} outside the situation phase"),
        ));
    }
    Ok(())
}

fn check_objectives(state: &GameState, content: &ContentTables) -> Result<(), EngineError> {
    if state.objectives.len() > state.config.objective_count {
        return Err(violation(
            "objective_count",
            format!(
                "{} objectives drawn, {} configured",
                state.objectives.len(),
                state.config.objective_count
            ),
        ));
    }
    for id in &state.objectives {
        if content.objective(id).is_err() {
            return Err(violation("objective_refs", format!("unknown objective `{id}`")));
        }
    }
    Ok(())
}
