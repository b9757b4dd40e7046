//! Quarter Engine: Error Taxonomy
//!
//! Three families reach the caller. Invalid input and resource exhaustion
//! leave the state untouched and the caller re-prompts. Misconfiguration
//! means the content tables and the engine disagree and the game must abort.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::state::Phase;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InputError),
    #[error("resource exhausted: {0}")]
    Exhausted(#[from] ResourceError),
    #[error("content misconfiguration: {0}")]
    Misconfiguration(#[from] ContentError),
}

impl EngineError {
    /// True when the error indicates a content/engine mismatch rather than
    /// a recoverable player mistake.
    pub fn is_fatal(&self) -> bool {
        matches!(self, EngineError::Misconfiguration(_))
    }
}

/// Player input rejected synchronously.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("expected {expected} project card(s), got {actual}")]
    SelectionCount { expected: usize, actual: usize },
    #[error("card `{0}` selected more than once")]
    DuplicateCard(String),
    #[error("card `{0}` is not in hand")]
    CardNotInHand(String),
    #[error("reorg already used in quarter {0}")]
    ReorgAlreadyUsed(u32),
    #[error("situation `{situation_id}` at severity {severity} cannot be deferred")]
    NotDeferrable { situation_id: String, severity: u8 },
    #[error("unknown response `{response_id}` for `{target_id}`")]
    UnknownResponse {
        target_id: String,
        response_id: String,
    },
    #[error("no active crisis `{0}`")]
    UnknownCrisis(String),
    #[error("unknown influence package `{0}`")]
    UnknownInfluencePackage(String),
    #[error("`{operation}` is not legal during the {phase} phase")]
    WrongPhase { operation: &'static str, phase: Phase },
    #[error("no situation is awaiting a response")]
    NoActiveSituation,
    #[error("the game is over")]
    GameOver,
    #[error("stream seed {stream} does not match game seed {state}")]
    SeedMismatch { state: u64, stream: u64 },
    #[error("sequence violation: expected {expected}, got {actual}")]
    SequenceViolation { expected: u64, actual: u64 },
}

/// A spendable resource ran out.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceError {
    #[error("insufficient political capital: need {needed}, have {available}")]
    InsufficientCapital { needed: i32, available: i32 },
    #[error("deck exhausted: draw and discard piles are both empty")]
    DeckExhausted,
}

/// Content tables and engine disagree. Never recoverable at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContentError {
    #[error("unknown card `{0}`")]
    UnknownCard(String),
    #[error("unknown crisis definition `{0}`")]
    UnknownCrisis(String),
    #[error("unknown situation `{0}`")]
    UnknownSituation(String),
    #[error("unknown objective `{0}`")]
    UnknownObjective(String),
    #[error("duplicate {table} id `{id}`")]
    DuplicateId { table: &'static str, id: String },
    #[error("invalid id {0:?}: must match [a-zA-Z0-9_-]+")]
    InvalidId(String),
    #[error("content has {available} card(s), at least {needed} required")]
    InsufficientCards { needed: usize, available: usize },
    #[error("invalid content: {0}")]
    Invalid(String),
    #[error("invariant violation: [INVARIANT:{check}] {detail}")]
    InvariantViolation { check: &'static str, detail: String },
}

/// Failure loading a content table or config file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to parse: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Invalid(#[from] ContentError),
}
