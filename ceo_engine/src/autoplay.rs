//! Quarter Engine: Scripted Player
//!
//! A fixed, seed-free policy that always has a legal move. Drives the
//! `ceo-sim` binary and the determinism tests.

use crate::config::EngineConfig;
use crate::content::ContentTables;
use crate::domain::CardCategory;
use crate::engine::QuarterEngine;
use crate::error::EngineError;
use crate::events::PlayerChoice;
use crate::state::{GameState, Phase};

/// Upper bound on choices per quarter before the driver gives up.
const CHOICES_PER_QUARTER: u32 = 64;

/// The policy's next choice, or `None` once the game is over.
pub fn next_choice(state: &GameState, content: &ContentTables) -> Result<Option<PlayerChoice>, EngineError> {
    if state.is_over() {
        return Ok(None);
    }
    let choice = match state.phase() {
        Phase::Projects => match crisis_response(state, content)? {
            Some(choice) => choice,
            None => project_choice(state, content)?,
        },
        Phase::Situation => situation_choice(state, content)?,
        Phase::BoardMeeting => board_choice(state, content),
    };
    Ok(Some(choice))
}

/// Answer the first active crisis once per quarter with the strongest
/// response the budget allows.
fn crisis_response(state: &GameState, content: &ContentTables) -> Result<Option<PlayerChoice>, EngineError> {
    if state.turn.crisis_responses > 0 {
        return Ok(None);
    }
    let Some(crisis) = state.crises.iter().find(|c| c.is_active()) else {
        return Ok(None);
    };
    let definition = content.crisis(&crisis.definition_id)?;
    let capital = state.resources.political_capital();
    let response = definition
        .responses
        .iter()
        .filter(|r| r.cost <= capital)
        .max_by_key(|r| (r.mitigation_bonus, -r.cost));
    Ok(response.map(|r| PlayerChoice::RespondToCrisis {
        crisis_id: crisis.id.clone(),
        response_id: r.id.clone(),
    }))
}

/// Prefer cards whose affinity meter is weakest; corporate cards last.
fn project_choice(state: &GameState, content: &ContentTables) -> Result<PlayerChoice, EngineError> {
    let mut distinct: Vec<&str> = Vec::new();
    for id in &state.hand {
        if !distinct.contains(&id.as_str()) {
            distinct.push(id.as_str());
        }
    }
    let needed = state.turn.required_selection();
    if distinct.len() < needed && !state.turn.reorg_used {
        return Ok(PlayerChoice::Reorg);
    }

    let mut ranked = Vec::with_capacity(distinct.len());
    for id in distinct {
        let card = content.card(id)?;
        let corporate = card.category == CardCategory::Corporate;
        let meter = card.affinity.map(|m| state.org.get(m)).unwrap_or(50);
        ranked.push((corporate, meter, id));
    }
    ranked.sort();
    Ok(PlayerChoice::SelectProjects {
        card_ids: ranked
            .into_iter()
            .take(needed)
            .map(|(_, _, id)| id.to_string())
            .collect(),
    })
}

/// Defer minor situations when possible; otherwise pay for the best
/// affordable response.
fn situation_choice(state: &GameState, content: &ContentTables) -> Result<PlayerChoice, EngineError> {
    let head = state
        .situations
        .head()
        .ok_or(crate::error::InputError::NoActiveSituation)?;
    let definition = content.situation(&head.situation_id)?;
    if definition.severity <= 2 && head.is_deferrable(definition.severity) {
        return Ok(PlayerChoice::DeferSituation);
    }
    let capital = state.resources.political_capital();
    let response = definition
        .responses
        .iter()
        .filter(|r| r.cost <= capital)
        .max_by_key(|r| (r.mitigation_bonus, -r.cost))
        .or_else(|| definition.responses.first());
    Ok(PlayerChoice::RespondToSituation {
        response_id: response.map(|r| r.id.clone()).unwrap_or_default(),
    })
}

/// Buy the cheapest influence package while on a poor streak.
fn board_choice(state: &GameState, content: &ContentTables) -> PlayerChoice {
    let capital = state.resources.political_capital();
    let influence = if state.turn.poor_quarter_streak > 0 {
        content
            .influence_packages
            .iter()
            .filter(|p| p.cost <= capital)
            .min_by_key(|p| (p.cost, p.id.clone()))
            .map(|p| p.id.clone())
    } else {
        None
    };
    PlayerChoice::HoldBoardMeeting { influence }
}

/// Play a whole game with the scripted policy.
pub fn play_game(content: ContentTables, config: EngineConfig, seed: u64) -> Result<QuarterEngine, EngineError> {
    let limit = config.max_quarters.saturating_mul(CHOICES_PER_QUARTER);
    let mut engine = QuarterEngine::new(content, config, seed)?;
    for _ in 0..limit {
        let Some(choice) = next_choice(engine.state(), engine.content())? else {
            break;
        };
        engine.apply(choice)?;
    }
    Ok(engine)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_autoplay_finishes_game() {
        let engine = play_game(ContentTables::builtin().unwrap(), EngineConfig::default(), 42).unwrap();
        let outcome = engine.state().outcome.as_ref().unwrap();
        assert!(outcome.quarter >= 1 && outcome.quarter <= 12);
        assert_eq!(outcome.verdict.results.len(), 3);
        assert!(next_choice(engine.state(), engine.content()).unwrap().is_none());
    }

    #[test]
    fn test_autoplay_is_deterministic() {
        let a = play_game(ContentTables::builtin().unwrap(), EngineConfig::default(), 7).unwrap();
        let b = play_game(ContentTables::builtin().unwrap(), EngineConfig::default(), 7).unwrap();
        assert_eq!(a.state(), b.state());
        assert_eq!(a.history(), b.history());
        assert_eq!(a.log(), b.log());
    }
}
