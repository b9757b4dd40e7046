//! Quarter Engine: Card Outcome Resolution
//!
//! Maps a played card to Good / Expected / Bad with a weighted roll.
//!
//! Weight derivation (total always 100):
//!   1. Base weights from the card's risk level.
//!   2. Shift = affinity + pressure + evil modifiers. The shift moves weight
//!      from Bad to Good (negative shift moves it back); each is clamped to
//!      [0, 100].
//!   3. If Good + Bad exceeds 100, both are scaled by floor(x * 100 / sum).
//!   4. Expected takes the remainder, so rounding loss always lands there.
//!
//! Roll r in [0, 100): r < Good is Good, r < Good + Expected is Expected,
//! anything else is Bad.

use serde::{Deserialize, Serialize};

use crate::config::PressureLevel;
use crate::domain::{CardCategory, OrgState, OutcomeTier, PlayableCard, RiskLevel};
use crate::rng::RandomStream;

pub const TIER_TOTAL: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TierWeights {
    pub good: u32,
    pub expected: u32,
    pub bad: u32,
}

impl TierWeights {
    pub fn base(risk: RiskLevel) -> Self {
        match risk {
            RiskLevel::Low => TierWeights {
                good: 25,
                expected: 60,
                bad: 15,
            },
            RiskLevel::Medium => TierWeights {
                good: 30,
                expected: 45,
                bad: 25,
            },
            RiskLevel::High => TierWeights {
                good: 40,
                expected: 20,
                bad: 40,
            },
        }
    }

    pub fn total(&self) -> u32 {
        self.good + self.expected + self.bad
    }

    /// Move `shift` points from Bad to Good and renormalize to TIER_TOTAL.
    pub fn shifted(&self, shift: i32) -> Self {
        let total = TIER_TOTAL as i64;
        let mut good = (self.good as i64 + shift as i64).clamp(0, total);
        let mut bad = (self.bad as i64 - shift as i64).clamp(0, total);
        let sum = good + bad;
        if sum > total {
            good = good * total / sum;
            bad = bad * total / sum;
        }
        TierWeights {
            good: good as u32,
            expected: (total - good - bad) as u32,
            bad: bad as u32,
        }
    }

    pub fn tier_for_roll(&self, roll: u32) -> OutcomeTier {
        if roll < self.good {
            OutcomeTier::Good
        } else if roll < self.good + self.expected {
            OutcomeTier::Expected
        } else {
            OutcomeTier::Bad
        }
    }
}

/// Signed weight shifts feeding into a roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutcomeModifiers {
    pub affinity: i32,
    pub pressure: i32,
    pub evil: i32,
}

impl OutcomeModifiers {
    pub fn total(&self) -> i32 {
        self.affinity + self.pressure + self.evil
    }
}

/// Bonus or penalty from the state of the card's affinity meter.
pub fn affinity_shift(card: &PlayableCard, org: &OrgState) -> i32 {
    let Some(meter) = card.affinity else {
        return 0;
    };
    match org.get(meter) {
        v if v >= 70 => 15,
        v if v >= 60 => 8,
        v if v < 25 => -15,
        v if v < 40 => -8,
        _ => 0,
    }
}

pub fn pressure_shift(pressure: PressureLevel) -> i32 {
    -3 * pressure.level()
}

/// Corporate cards thrive on a ruthless CEO; everything else suffers a
/// smaller penalty from the same reputation.
pub fn evil_shift(card: &PlayableCard, evil_score: i32) -> i32 {
    let evil = evil_score.max(0);
    if card.category == CardCategory::Corporate {
        (evil / 5).min(10)
    } else {
        -(evil / 10).min(5)
    }
}

pub fn modifiers_for(
    card: &PlayableCard,
    org: &OrgState,
    pressure: PressureLevel,
    evil_score: i32,
) -> OutcomeModifiers {
    OutcomeModifiers {
        affinity: affinity_shift(card, org),
        pressure: pressure_shift(pressure),
        evil: evil_shift(card, evil_score),
    }
}

/// The resolved tier plus everything needed to audit it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CardOutcome {
    pub card_id: String,
    pub tier: OutcomeTier,
    pub weights: TierWeights,
    pub modifiers: OutcomeModifiers,
    pub roll: u32,
}

pub fn resolve_card_outcome(
    card: &PlayableCard,
    org: &OrgState,
    pressure: PressureLevel,
    evil_score: i32,
    rng: &mut RandomStream,
) -> CardOutcome {
    let modifiers = modifiers_for(card, org, pressure, evil_score);
    let weights = TierWeights::base(card.risk).shifted(modifiers.total());
    let roll = rng.percent();
    let tier = weights.tier_for_roll(roll);

    tracing::debug!(
        target: "ceo_engine::outcome",
        card = %card.id,
        good = weights.good,
        expected = weights.expected,
        bad = weights.bad,
        roll,
        tier = %tier,
        "card.resolved"
    );

    CardOutcome {
        card_id: card.id.clone(),
        tier,
        weights,
        modifiers,
        roll,
    }
}
