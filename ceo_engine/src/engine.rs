//! Quarter Engine: Engine Façade
//!
//! Stateful wrapper around the pure transition layer. Owns the content
//! tables, the game's random stream, the current state and the history of
//! accepted choices. Rejected choices leave all four untouched.
//!
//! Per choice:
//!   1. Sequence must be exactly last + 1
//!   2. Delegate to `transitions::apply_choice`
//!   3. Validate invariants on the new state
//!   4. Store state, record the envelope, append the log

use crate::config::EngineConfig;
use crate::content::ContentTables;
use crate::error::{EngineError, InputError};
use crate::events::{ChoiceEnvelope, PlayerChoice};
use crate::invariants::validate_invariants;
use crate::log::LogEntry;
use crate::rng::RandomStream;
use crate::state::{create_initial_state, GameState};
use crate::transitions::apply_choice;

#[derive(Debug, Clone)]
pub struct QuarterEngine {
    content: ContentTables,
    stream: RandomStream,
    state: GameState,
    history: Vec<ChoiceEnvelope>,
    log: Vec<LogEntry>,
}

impl QuarterEngine {
    /// Start a new game.
    pub fn new(content: ContentTables, config: EngineConfig, seed: u64) -> Result<Self, EngineError> {
        content.validate()?;
        let stream = RandomStream::new(seed);
        let state = create_initial_state(&content, config, &stream)?;
        validate_invariants(&state, &content)?;
        Ok(Self {
            content,
            stream,
            state,
            history: Vec::new(),
            log: Vec::new(),
        })
    }

    /// Resume from a saved state. `history` is the choice list that
    /// produced it and only sets the next expected sequence number.
    pub fn from_state(
        content: ContentTables,
        state: GameState,
        history: Vec<ChoiceEnvelope>,
    ) -> Result<Self, EngineError> {
        content.validate()?;
        validate_invariants(&state, &content)?;
        Ok(Self {
            content,
            stream: RandomStream::new(state.seed),
            state,
            history,
            log: Vec::new(),
        })
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn content(&self) -> &ContentTables {
        &self.content
    }

    pub fn stream(&self) -> &RandomStream {
        &self.stream
    }

    pub fn history(&self) -> &[ChoiceEnvelope] {
        &self.history
    }

    /// Every log entry produced since this engine was built.
    pub fn log(&self) -> &[LogEntry] {
        &self.log
    }

    pub fn last_sequence(&self) -> u64 {
        self.history.last().map(|e| e.sequence).unwrap_or(0)
    }

    pub fn is_over(&self) -> bool {
        self.state.is_over()
    }

    /// Wrap `choice` in the next envelope and apply it.
    pub fn apply(&mut self, choice: PlayerChoice) -> Result<Vec<LogEntry>, EngineError> {
        let envelope = ChoiceEnvelope {
            sequence: self.last_sequence() + 1,
            quarter: self.state.quarter(),
            choice,
        };
        self.apply_envelope(&envelope)
    }

    pub fn apply_envelope(&mut self, envelope: &ChoiceEnvelope) -> Result<Vec<LogEntry>, EngineError> {
        // -- Sequence enforcement --
        let expected = self.last_sequence() + 1;
        if envelope.sequence != expected {
            return Err(InputError::SequenceViolation {
                expected,
                actual: envelope.sequence,
            }
            .into());
        }

        let transition = match apply_choice(&self.state, &envelope.choice, &self.content, &self.stream) {
            Ok(t) => t,
            Err(err) => {
                tracing::debug!(
                    target: "ceo_engine::engine",
                    sequence = envelope.sequence,
                    choice = envelope.choice.name(),
                    error = %err,
                    "choice.rejected"
                );
                return Err(err);
            }
        };
        validate_invariants(&transition.state, &self.content)?;

        self.state = transition.state;
        self.history.push(envelope.clone());
        self.log.extend(transition.log.iter().cloned());
        Ok(transition.log)
    }

    /// Apply an ordered list of envelopes, stopping at the first failure.
    pub fn apply_sequence(&mut self, envelopes: &[ChoiceEnvelope]) -> Result<&GameState, EngineError> {
        for envelope in envelopes {
            self.apply_envelope(envelope)?;
        }
        Ok(&self.state)
    }

    /// Rebuild a game from its seed, config and accepted choices.
    pub fn replay(
        content: ContentTables,
        config: EngineConfig,
        seed: u64,
        envelopes: &[ChoiceEnvelope],
    ) -> Result<Self, EngineError> {
        let mut engine = Self::new(content, config, seed)?;
        engine.apply_sequence(envelopes)?;
        Ok(engine)
    }
}
