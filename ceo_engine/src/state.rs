//! Quarter Engine: Game State
//!
//! The full resumable position: seed, quarter loop, meters, CEO record,
//! capital, deck and hand, crises, situations, objectives. Round-tripping
//! it through serde reproduces every later sub-stream derivation, because
//! sub-streams are keyed by (seed, quarter, purpose, context) only.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::board::{Backlash, BoardReview, TerminationReason};
use crate::config::EngineConfig;
use crate::content::ContentTables;
use crate::crisis::CrisisInstance;
use crate::deck::CardDeck;
use crate::domain::{CeoState, Meter, OrgState, ResourceState};
use crate::error::{ContentError, EngineError};
use crate::objectives::{draw_objectives, GameVerdict};
use crate::rng::{Purpose, RandomStream};
use crate::situation::SituationBook;
use crate::ENGINE_VERSION;

/// Cards a normal Projects selection must contain.
pub const PROJECT_SELECTION: usize = 3;
/// Cards a post-reorg selection must contain.
pub const REORG_SELECTION: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Projects,
    Situation,
    BoardMeeting,
}

impl Phase {
    /// The successor within a quarter. Board Meeting wraps to the next
    /// quarter's Projects.
    pub fn next(self) -> Phase {
        match self {
            Phase::Projects => Phase::Situation,
            Phase::Situation => Phase::BoardMeeting,
            Phase::BoardMeeting => Phase::Projects,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Projects => "projects",
            Phase::Situation => "situation",
            Phase::BoardMeeting => "board_meeting",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-quarter bookkeeping. Replaced wholesale each quarter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuarterLoopState {
    pub quarter: u32,
    pub phase: Phase,
    pub selected_projects: Vec<String>,
    pub reorg_used: bool,
    pub profit: i64,
    pub fines: i64,
    /// Head of the due queue while in the Situation phase.
    pub active_situation: Option<String>,
    pub poor_quarter_streak: u32,
    pub situations_resolved: u32,
    /// Crisis responses made this quarter; keys the crisis dice stream.
    pub crisis_responses: u32,
}

impl QuarterLoopState {
    pub fn first() -> Self {
        Self::starting(1, 0)
    }

    fn starting(quarter: u32, poor_quarter_streak: u32) -> Self {
        Self {
            quarter,
            phase: Phase::Projects,
            selected_projects: Vec::new(),
            reorg_used: false,
            profit: 0,
            fines: 0,
            active_situation: None,
            poor_quarter_streak,
            situations_resolved: 0,
            crisis_responses: 0,
        }
    }

    /// Fresh loop state for the following quarter. Only the poor-quarter
    /// streak carries over.
    pub fn next_quarter(&self) -> Self {
        Self::starting(self.quarter + 1, self.poor_quarter_streak)
    }

    pub fn net_profit(&self) -> i64 {
        self.profit - self.fines
    }

    /// Cards the Projects selection must contain.
    pub fn required_selection(&self) -> usize {
        if self.reorg_used {
            REORG_SELECTION
        } else {
            PROJECT_SELECTION
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Ending {
    Terminated {
        reason: TerminationReason,
        parachute: i64,
    },
    Collapsed {
        meter: Meter,
    },
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GameOutcome {
    pub quarter: u32,
    pub ending: Ending,
    pub verdict: GameVerdict,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GameState {
    pub engine_version: u32,
    pub seed: u64,
    pub config: EngineConfig,
    pub turn: QuarterLoopState,
    pub org: OrgState,
    pub ceo: CeoState,
    pub resources: ResourceState,
    pub deck: CardDeck,
    pub hand: Vec<String>,
    pub crises: Vec<CrisisInstance>,
    pub situations: SituationBook,
    pub objectives: Vec<String>,
    pub backlash: Vec<Backlash>,
    pub next_crisis_serial: u32,
    pub last_review: Option<BoardReview>,
    pub outcome: Option<GameOutcome>,
}

impl GameState {
    pub fn quarter(&self) -> u32 {
        self.turn.quarter
    }

    pub fn phase(&self) -> Phase {
        self.turn.phase
    }

    pub fn is_over(&self) -> bool {
        self.outcome.is_some()
    }

    /// Cards owned by the game: draw pile, discard pile and hand.
    pub fn total_cards(&self) -> usize {
        self.deck.total_cards() + self.hand.len()
    }
}

/// Deal the opening position for `stream`'s seed.
pub fn create_initial_state(
    content: &ContentTables,
    config: EngineConfig,
    stream: &RandomStream,
) -> Result<GameState, EngineError> {
    config.validate()?;
    let cards = content.deck_cards();
    if cards.len() < config.hand_size {
        return Err(ContentError::InsufficientCards {
            needed: config.hand_size,
            available: cards.len(),
        }
        .into());
    }

    let mut deal = stream.fork(0, Purpose::Deal, "initial");
    let deck = CardDeck::shuffled(cards, &mut deal);
    let (hand, deck) = deck.draw_many(config.hand_size, &mut deal)?;
    let objectives = draw_objectives(&content.objectives, config.objective_count, stream);

    tracing::info!(
        target: "ceo_engine::state",
        seed = stream.seed(),
        pressure = %config.pressure,
        deck = deck.total_cards() + hand.len(),
        objectives = objectives.len(),
        "game.created"
    );

    Ok(GameState {
        engine_version: ENGINE_VERSION,
        seed: stream.seed(),
        org: OrgState::uniform(config.starting_meter),
        resources: ResourceState::new(config.starting_capital),
        config,
        turn: QuarterLoopState::first(),
        ceo: CeoState::default(),
        deck,
        hand,
        crises: Vec::new(),
        situations: SituationBook::default(),
        objectives,
        backlash: Vec::new(),
        next_crisis_serial: 1,
        last_review: None,
        outcome: None,
    })
}
