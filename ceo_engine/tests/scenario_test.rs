//! End-to-end scenarios driven through the `QuarterEngine` public API.

use ceo_engine::autoplay::{next_choice, play_game};
use ceo_engine::board::TerminationReason;
use ceo_engine::config::EngineConfig;
use ceo_engine::content::ContentTables;
use ceo_engine::crisis::CrisisInstance;
use ceo_engine::domain::Meter;
use ceo_engine::engine::QuarterEngine;
use ceo_engine::error::{EngineError, InputError};
use ceo_engine::events::PlayerChoice;
use ceo_engine::log::{EventCode, LogKind};
use ceo_engine::objectives::LossCondition;
use ceo_engine::state::{Ending, GameState, Phase};

fn content() -> ContentTables {
    ContentTables::builtin().unwrap()
}

/// Rebuild an engine around a hand-edited state.
fn resume(state: GameState) -> QuarterEngine {
    QuarterEngine::from_state(content(), state, Vec::new()).unwrap()
}

fn board_meeting(state: &GameState, fines: i64) -> GameState {
    let mut s = state.clone();
    s.turn.phase = Phase::BoardMeeting;
    s.turn.fines = fines;
    s
}

fn hold_meeting() -> PlayerChoice {
    PlayerChoice::HoldBoardMeeting { influence: None }
}

fn count_events(engine: &QuarterEngine, code: EventCode) -> usize {
    engine
        .log()
        .iter()
        .filter(|e| matches!(&e.kind, LogKind::Event { code: c, .. } if *c == code))
        .count()
}

#[test]
fn full_game_reviews_every_quarter_once() {
    let engine = play_game(content(), EngineConfig::default(), 31).unwrap();
    let outcome = engine.state().outcome.clone().unwrap();
    assert_eq!(count_events(&engine, EventCode::BoardReview), outcome.quarter as usize);
    assert_eq!(count_events(&engine, EventCode::GameOver), 1);
    assert_eq!(
        engine.state().last_review.as_ref().map(|r| r.quarter),
        Some(outcome.quarter)
    );
    assert!(engine.log().iter().all(|e| e.quarter >= 1 && e.quarter <= outcome.quarter));
}

#[test]
fn finished_game_rejects_every_choice() {
    let mut engine = play_game(content(), EngineConfig::default(), 2).unwrap();
    let before = engine.state().clone();
    for choice in [
        PlayerChoice::Reorg,
        PlayerChoice::DeferSituation,
        hold_meeting(),
    ] {
        assert_eq!(
            engine.apply(choice).unwrap_err(),
            EngineError::InvalidInput(InputError::GameOver)
        );
    }
    assert_eq!(engine.state(), &before);
    assert!(next_choice(engine.state(), engine.content()).unwrap().is_none());
}

#[test]
fn invalid_input_leaves_state_unchanged() {
    let mut engine = QuarterEngine::new(content(), EngineConfig::default(), 8).unwrap();
    let before = engine.state().clone();

    let wrong_phase = engine.apply(hold_meeting()).unwrap_err();
    assert!(matches!(
        wrong_phase,
        EngineError::InvalidInput(InputError::WrongPhase { .. })
    ));

    let foreign = engine
        .apply(PlayerChoice::SelectProjects {
            card_ids: vec!["a".into(), "b".into(), "c".into()],
        })
        .unwrap_err();
    assert!(matches!(foreign, EngineError::InvalidInput(InputError::CardNotInHand(_))));

    let no_crisis = engine
        .apply(PlayerChoice::RespondToCrisis {
            crisis_id: "data_breach#1".into(),
            response_id: "press_release".into(),
        })
        .unwrap_err();
    assert!(!no_crisis.is_fatal());

    assert_eq!(engine.state(), &before);
    assert!(engine.history().is_empty());
    assert!(engine.log().is_empty());
}

#[test]
fn crisis_response_costs_capital_and_counts() {
    let engine = QuarterEngine::new(content(), EngineConfig::default(), 14).unwrap();
    let mut state = engine.state().clone();
    let definition = engine.content().crisis("data_breach").unwrap().clone();
    state
        .crises
        .push(CrisisInstance::from_definition(&definition, "data_breach#1".into(), 1));
    state.next_crisis_serial = 2;
    let capital = state.resources.political_capital();

    let mut engine = resume(state);
    engine
        .apply(PlayerChoice::RespondToCrisis {
            crisis_id: "data_breach#1".into(),
            response_id: "forensics".into(),
        })
        .unwrap();
    assert_eq!(engine.state().resources.political_capital(), capital - 4);
    assert_eq!(engine.state().turn.crisis_responses, 1);
    assert_eq!(engine.state().phase(), Phase::Projects);
    assert_eq!(count_events(&engine, EventCode::CrisisResponded), 1);
}

#[test]
fn completed_game_is_won_without_loss() {
    let mut state = QuarterEngine::new(content(), EngineConfig::default(), 6)
        .unwrap()
        .state()
        .clone();
    state.config.max_quarters = 1;
    state.config.objectives_required = Some(0);

    let mut engine = resume(board_meeting(&state, 0));
    engine.apply(hold_meeting()).unwrap();
    let outcome = engine.state().outcome.clone().unwrap();
    assert_eq!(outcome.ending, Ending::Completed);
    assert_eq!(outcome.verdict.loss, None);
    assert!(outcome.verdict.is_won);
}

#[test]
fn depleted_meter_overrides_met_objectives() {
    let mut state = QuarterEngine::new(content(), EngineConfig::default(), 6)
        .unwrap()
        .state()
        .clone();
    state.config.max_quarters = 1;
    state.config.objectives_required = Some(0);
    state.org = state.org.with_meter(Meter::Runway, 0);

    let mut engine = resume(board_meeting(&state, 0));
    engine.apply(hold_meeting()).unwrap();
    let outcome = engine.state().outcome.clone().unwrap();
    assert_eq!(outcome.ending, Ending::Collapsed { meter: Meter::Runway });
    assert_eq!(
        outcome.verdict.loss,
        Some(LossCondition::MeterDepleted { meter: Meter::Runway })
    );
    assert!(outcome.verdict.passed >= outcome.verdict.required);
    assert!(!outcome.verdict.is_won);
}

#[test]
fn three_poor_quarters_end_tenure() {
    let mut reached_third = 0;
    for seed in 1..30 {
        let mut state = QuarterEngine::new(content(), EngineConfig::default(), seed)
            .unwrap()
            .state()
            .clone();
        for _ in 0..3 {
            let mut engine = resume(board_meeting(&state, 200));
            engine.apply(hold_meeting()).unwrap();
            state = engine.state().clone();
            if state.is_over() {
                break;
            }
        }
        let outcome = state.outcome.clone().unwrap();
        assert!(matches!(outcome.ending, Ending::Terminated { .. }));
        assert_eq!(outcome.verdict.loss, Some(LossCondition::Ousted));
        if outcome.quarter == 3 {
            reached_third += 1;
            assert!(matches!(
                outcome.ending,
                Ending::Terminated {
                    reason: TerminationReason::PoorStreak { streak: 3 },
                    ..
                }
            ));
        }
    }
    assert!(reached_third > 0);
}
