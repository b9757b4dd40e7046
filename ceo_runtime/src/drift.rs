//! Drift detection: determinism verification and state comparison.
//!
//! All values are integers; a report between two identical states is
//! all zeros and empty lists.

use std::collections::BTreeSet;

use ceo_engine::config::EngineConfig;
use ceo_engine::content::ContentTables;
use ceo_engine::domain::Meter;
use ceo_engine::events::ChoiceEnvelope;
use ceo_engine::state::GameState;
use serde::Serialize;

use crate::error::RuntimeError;
use crate::replay;

/// Replay the same choices twice and require identical hashes.
pub fn verify_determinism(
    content: &ContentTables,
    config: &EngineConfig,
    seed: u64,
    choices: &[ChoiceEnvelope],
) -> Result<String, RuntimeError> {
    let first = replay::rebuild_hash(content, config, seed, choices)?;
    let second = replay::rebuild_hash(content, config, seed, choices)?;
    if first != second {
        return Err(RuntimeError::Determinism { first, second });
    }
    Ok(first)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MeterDrift {
    pub meter: Meter,
    pub a: i32,
    pub b: i32,
    pub delta: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DriftReport {
    pub quarter_a: u32,
    pub quarter_b: u32,
    pub meters: Vec<MeterDrift>,
    pub capital_delta: i64,
    pub evil_delta: i64,
    pub favorability_delta: i64,
    pub profit_delta: i64,
    pub cards_played_delta: i64,
    pub cards_gained: Vec<String>,
    pub cards_lost: Vec<String>,
    pub crises_opened: Vec<String>,
    pub crises_closed: Vec<String>,
    pub objectives_changed: bool,
    pub outcome_changed: bool,
}

impl DriftReport {
    pub fn is_empty(&self) -> bool {
        self.quarter_a == self.quarter_b
            && self.meters.is_empty()
            && self.capital_delta == 0
            && self.evil_delta == 0
            && self.favorability_delta == 0
            && self.profit_delta == 0
            && self.cards_played_delta == 0
            && self.cards_gained.is_empty()
            && self.cards_lost.is_empty()
            && self.crises_opened.is_empty()
            && self.crises_closed.is_empty()
            && !self.objectives_changed
            && !self.outcome_changed
    }
}

fn difference(a: &BTreeSet<&str>, b: &BTreeSet<&str>) -> Vec<String> {
    a.difference(b).map(|s| s.to_string()).collect()
}

/// Structured comparison of two states, `b` relative to `a`. Only meters
/// that differ are listed.
pub fn compare_states(a: &GameState, b: &GameState) -> DriftReport {
    let meters = a
        .org
        .values()
        .into_iter()
        .zip(b.org.values())
        .filter(|((_, va), (_, vb))| va != vb)
        .map(|((meter, va), (_, vb))| MeterDrift {
            meter,
            a: va,
            b: vb,
            delta: vb - va,
        })
        .collect();

    let hand_a: BTreeSet<&str> = a.hand.iter().map(String::as_str).collect();
    let hand_b: BTreeSet<&str> = b.hand.iter().map(String::as_str).collect();
    let live = |s: &GameState| -> BTreeSet<String> {
        s.crises
            .iter()
            .filter(|c| c.is_active())
            .map(|c| c.id.clone())
            .collect()
    };
    let (live_a, live_b) = (live(a), live(b));

    DriftReport {
        quarter_a: a.quarter(),
        quarter_b: b.quarter(),
        meters,
        capital_delta: b.resources.political_capital() as i64 - a.resources.political_capital() as i64,
        evil_delta: b.ceo.evil_score as i64 - a.ceo.evil_score as i64,
        favorability_delta: b.ceo.board_favorability as i64 - a.ceo.board_favorability as i64,
        profit_delta: b.ceo.total_profit - a.ceo.total_profit,
        cards_played_delta: b.ceo.cards_played as i64 - a.ceo.cards_played as i64,
        cards_gained: difference(&hand_b, &hand_a),
        cards_lost: difference(&hand_a, &hand_b),
        crises_opened: live_b.difference(&live_a).cloned().collect(),
        crises_closed: live_a.difference(&live_b).cloned().collect(),
        objectives_changed: a.objectives != b.objectives,
        outcome_changed: a.outcome != b.outcome,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ceo_engine::autoplay::play_game;
    use ceo_engine::engine::QuarterEngine;

    fn content() -> ContentTables {
        ContentTables::builtin().unwrap()
    }

    #[test]
    fn test_identical_states_have_no_drift() {
        let engine = QuarterEngine::new(content(), EngineConfig::default(), 1).unwrap();
        let report = compare_states(engine.state(), engine.state());
        assert!(report.is_empty());
    }

    #[test]
    fn test_meter_and_capital_drift() {
        let engine = QuarterEngine::new(content(), EngineConfig::default(), 1).unwrap();
        let a = engine.state().clone();
        let mut b = a.clone();
        b.org = b.org.with_meter(Meter::Morale, a.org.get(Meter::Morale) - 7);
        b.resources = b.resources.earn(3);

        let report = compare_states(&a, &b);
        assert_eq!(report.meters.len(), 1);
        assert_eq!(report.meters[0].meter, Meter::Morale);
        assert_eq!(report.meters[0].delta, -7);
        assert_eq!(report.capital_delta, 3);
        assert!(!report.is_empty());
    }

    #[test]
    fn test_verify_determinism_on_played_game() {
        let played = play_game(content(), EngineConfig::default(), 8).unwrap();
        let hash =
            verify_determinism(&content(), &EngineConfig::default(), 8, played.history()).unwrap();
        assert_eq!(hash, ceo_engine::hashing::canonical_hash(played.state()).unwrap());
    }
}
