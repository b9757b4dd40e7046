#![forbid(unsafe_code)]

//! Quarter Engine: deterministic simulation kernel for the boardroom
//! survival game.
//!
//! Every quarter runs Projects -> Situation -> Board Meeting. Each phase
//! operation is a pure function of (state, player choice, random stream)
//! returning a new state plus a structured log. All randomness flows from
//! one seeded [`rng::RandomStream`] through keyed sub-streams, so a seed and
//! a choice list reproduce a game bit for bit.

/// Engine v1. Bump whenever a rule change alters replay output.
pub const ENGINE_VERSION: u32 = 1;

pub mod arithmetic;
pub mod error;
pub mod rng;
pub mod config;
pub mod domain;
pub mod deck;
pub mod outcome;
pub mod crisis;
pub mod situation;
pub mod board;
pub mod objectives;
pub mod content;
pub mod log;
pub mod events;
pub mod state;
pub mod transitions;
pub mod invariants;
pub mod hashing;
pub mod engine;
pub mod autoplay;
