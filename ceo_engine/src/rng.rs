//! Quarter Engine: Deterministic Random Stream
//!
//! One master seed per game. Every consumer forks a sub-stream keyed by
//! (quarter, purpose, context) instead of drawing from a shared generator,
//! so re-deriving "crisis roll for quarter 3, crisis X" never depends on
//! how many numbers other subsystems consumed earlier in the turn.
//!
//! Sub-stream seeds are the first eight bytes of
//! SHA-256(seed_le || quarter_le || purpose_tag || 0x00 || context), fed to
//! ChaCha8. Index draws go through u32 so results match across platforms.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// What a sub-stream is used for. The tag is part of the derivation key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Purpose {
    Deal,
    CardOutcome,
    SituationTrigger,
    SituationDelay,
    SituationDecay,
    SituationResurface,
    SituationRoll,
    RandomCrisis,
    CrisisRoll,
    StaffRoll,
    BoardTermination,
    Backlash,
    ObjectiveDraw,
}

impl Purpose {
    pub fn tag(self) -> &'static str {
        match self {
            Purpose::Deal => "deal",
            Purpose::CardOutcome => "card_outcome",
            Purpose::SituationTrigger => "situation_trigger",
            Purpose::SituationDelay => "situation_delay",
            Purpose::SituationDecay => "situation_decay",
            Purpose::SituationResurface => "situation_resurface",
            Purpose::SituationRoll => "situation_roll",
            Purpose::RandomCrisis => "random_crisis",
            Purpose::CrisisRoll => "crisis_roll",
            Purpose::StaffRoll => "staff_roll",
            Purpose::BoardTermination => "board_termination",
            Purpose::Backlash => "backlash",
            Purpose::ObjectiveDraw => "objective_draw",
        }
    }
}

/// Two six-sided dice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiceRoll {
    pub first: u8,
    pub second: u8,
}

impl DiceRoll {
    pub fn total(&self) -> i32 {
        self.first as i32 + self.second as i32
    }
}

/// Derive a sub-stream seed from the master seed and a context key.
pub fn derive_seed(seed: u64, quarter: u32, purpose: Purpose, context: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(seed.to_le_bytes());
    hasher.update(quarter.to_le_bytes());
    hasher.update(purpose.tag().as_bytes());
    hasher.update([0u8]);
    hasher.update(context.as_bytes());
    let digest = hasher.finalize();
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(head)
}

/// Hash-based percentile in `[0, 100)`. Used where a single stable roll is
/// needed without building a generator.
pub fn hash_percent(seed: u64, quarter: u32, purpose: Purpose, context: &str) -> u32 {
    (derive_seed(seed, quarter, purpose, context) % 100) as u32
}

/// Seeded random stream. Cloning yields an independent copy at the same
/// position.
#[derive(Debug, Clone)]
pub struct RandomStream {
    seed: u64,
    rng: ChaCha8Rng,
}

impl RandomStream {
    /// The master stream for a game.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// The master seed this stream belongs to.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Derive a sub-stream. Never advances `self`; forks always key off the
    /// master seed, so a fork of a fork equals a fork of the master.
    pub fn fork(&self, quarter: u32, purpose: Purpose, context: &str) -> RandomStream {
        let sub = derive_seed(self.seed, quarter, purpose, context);
        RandomStream {
            seed: self.seed,
            rng: ChaCha8Rng::seed_from_u64(sub),
        }
    }

    /// Uniform integer in `[0, 100)`.
    pub fn percent(&mut self) -> u32 {
        self.rng.gen_range(0..100u32)
    }

    /// True with probability `pct` percent.
    pub fn chance(&mut self, pct: u32) -> bool {
        self.percent() < pct
    }

    /// Uniform integer in `[lo, hi]`. Returns `lo` when the range is empty.
    pub fn range(&mut self, lo: i32, hi: i32) -> i32 {
        if hi <= lo {
            return lo;
        }
        self.rng.gen_range(lo..=hi)
    }

    pub fn roll_d6(&mut self) -> u8 {
        self.rng.gen_range(1..=6u8)
    }

    pub fn roll_2d6(&mut self) -> DiceRoll {
        let first = self.roll_d6();
        let second = self.roll_d6();
        DiceRoll { first, second }
    }

    /// Fisher-Yates shuffle in place.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        items.shuffle(&mut self.rng);
    }

    /// Cumulative-weight roll. `None` when every weight is zero.
    pub fn weighted_index(&mut self, weights: &[u32]) -> Option<usize> {
        let total: u32 = weights.iter().sum();
        if total == 0 {
            return None;
        }
        let mut roll = self.rng.gen_range(0..total);
        for (index, &weight) in weights.iter().enumerate() {
            if roll < weight {
                return Some(index);
            }
            roll -= weight;
        }
        None
    }

    /// Uniform pick from a slice.
    pub fn choose<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        let index = self.rng.gen_range(0..items.len() as u32) as usize;
        items.get(index)
    }
}
