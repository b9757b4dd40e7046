//! Quarter Engine: Board Review
//!
//! Score = 50 + profit band + meter bands + favorability band + influence,
//! clamped to [0, 100]. Ratings: A >= 80, B >= 60, C >= 40, D >= 20, F.
//!
//! Employment: three poor (D/F) quarters in a row end the tenure outright.
//! Otherwise an F rolls a termination chance that grows as the score sinks
//! below 20 (30..90%), and a D on probation (prior poor streak) rolls a
//! smaller one (10..40%).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::arithmetic::{checked_add, checked_mul, clamp_percent};
use crate::config::PressureLevel;
use crate::domain::{CeoState, Meter, OrgState, ResourceState};
use crate::rng::{hash_percent, Purpose, RandomStream};

pub const BASE_SCORE: i32 = 50;
pub const F_THRESHOLD: i32 = 20;
pub const FORCED_TERMINATION_STREAK: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Rating {
    A,
    B,
    C,
    D,
    F,
}

impl Rating {
    pub fn from_score(score: i32) -> Self {
        match score {
            s if s >= 80 => Rating::A,
            s if s >= 60 => Rating::B,
            s if s >= 40 => Rating::C,
            s if s >= F_THRESHOLD => Rating::D,
            _ => Rating::F,
        }
    }

    pub fn is_poor(self) -> bool {
        matches!(self, Rating::D | Rating::F)
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            Rating::A => "A",
            Rating::B => "B",
            Rating::C => "C",
            Rating::D => "D",
            Rating::F => "F",
        };
        f.write_str(letter)
    }
}

/// Paid with political capital at a board meeting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InfluencePackage {
    pub id: String,
    pub name: String,
    pub cost: i32,
    pub score_bonus: i32,
    #[serde(default)]
    pub backlash_chance: u32,
    #[serde(default)]
    pub backlash_penalty: i32,
}

/// A deferred favorability hit from an influence package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Backlash {
    pub package_id: String,
    pub due_quarter: u32,
    pub favorability_penalty: i32,
}

// ── Scoring ────────────────────────────────────────────────────────

pub fn profit_contribution(net_profit: i64, pressure: PressureLevel) -> i32 {
    let target = pressure.profit_target();
    match net_profit {
        n if n >= target * 2 => 30,
        n if n >= target => 20,
        n if n >= target / 2 => 10,
        n if n >= 0 => 0,
        n if n >= -target => -15,
        _ => -30,
    }
}

pub fn meter_weight(meter: Meter) -> i32 {
    match meter {
        Meter::Alignment => 10,
        Meter::Runway => 8,
        Meter::Delivery | Meter::Morale | Meter::Governance => 5,
    }
}

pub fn meter_contribution(meter: Meter, value: i32) -> i32 {
    match value {
        v if v >= 70 => meter_weight(meter),
        v if v < 30 => -meter_weight(meter),
        _ => 0,
    }
}

pub fn favorability_contribution(favorability: i32) -> i32 {
    match favorability {
        f if f >= 10 => 5,
        f if f <= -10 => -5,
        _ => 0,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScoreBreakdown {
    pub base: i32,
    pub profit: i32,
    pub meters: i32,
    pub favorability: i32,
    pub influence: i32,
    pub raw: i32,
    pub score: i32,
}

pub fn score_quarter(
    net_profit: i64,
    org: &OrgState,
    favorability: i32,
    pressure: PressureLevel,
    influence: Option<&InfluencePackage>,
) -> ScoreBreakdown {
    let profit = profit_contribution(net_profit, pressure);
    let meters = org
        .values()
        .iter()
        .map(|&(m, v)| meter_contribution(m, v))
        .sum();
    let favorability = favorability_contribution(favorability);
    let influence = influence.map(|p| p.score_bonus).unwrap_or(0);
    let raw = BASE_SCORE + profit + meters + favorability + influence;
    ScoreBreakdown {
        base: BASE_SCORE,
        profit,
        meters,
        favorability,
        influence,
        raw,
        score: raw.clamp(0, 100),
    }
}

// ── Employment decision ────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TerminationReason {
    PoorStreak { streak: u32 },
    FailingGrade { chance: u32, roll: u32 },
    Probation { chance: u32, roll: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum BoardDecision {
    Retain,
    Terminate { reason: TerminationReason },
}

impl BoardDecision {
    pub fn is_termination(&self) -> bool {
        matches!(self, BoardDecision::Terminate { .. })
    }
}

/// Termination chance (percent) for a non-streak rating, if any applies.
pub fn termination_chance(rating: Rating, score: i32, prior_streak: u32) -> Option<u32> {
    match rating {
        Rating::F => Some(clamp_percent(30 + 3 * (F_THRESHOLD - score), 30, 90)),
        Rating::D if prior_streak >= 1 => {
            Some(clamp_percent(10 * (prior_streak as i32 + 1), 10, 40))
        }
        _ => None,
    }
}

/// Decide retention. Returns the decision and the updated poor streak.
pub fn decide_employment(
    rating: Rating,
    score: i32,
    prior_streak: u32,
    stream: &RandomStream,
    quarter: u32,
) -> (BoardDecision, u32) {
    let streak = if rating.is_poor() { prior_streak + 1 } else { 0 };
    if streak >= FORCED_TERMINATION_STREAK {
        let reason = TerminationReason::PoorStreak { streak };
        return (BoardDecision::Terminate { reason }, streak);
    }

    let Some(chance) = termination_chance(rating, score, prior_streak) else {
        return (BoardDecision::Retain, streak);
    };
    let roll = stream
        .fork(quarter, Purpose::BoardTermination, "")
        .percent();
    if roll >= chance {
        return (BoardDecision::Retain, streak);
    }
    let reason = if rating == Rating::F {
        TerminationReason::FailingGrade { chance, roll }
    } else {
        TerminationReason::Probation { chance, roll }
    };
    (BoardDecision::Terminate { reason }, streak)
}

/// Severance paid on termination.
pub fn golden_parachute(ceo: &CeoState, resources: &ResourceState) -> i64 {
    let tenure = checked_mul(1000, ceo.tenure as i64);
    let capital = checked_mul(50, resources.political_capital() as i64);
    let evil = checked_mul(10, ceo.evil_score.max(0) as i64);
    let cards = checked_mul(5, ceo.cards_played as i64);
    checked_add(checked_add(tenure, capital), checked_add(evil, cards))
}

/// Hash-keyed backlash roll for an influence purchase.
pub fn backlash_triggered(seed: u64, quarter: u32, package: &InfluencePackage) -> bool {
    package.backlash_chance > 0
        && hash_percent(seed, quarter, Purpose::Backlash, &package.id) < package.backlash_chance
}

/// Everything the board concluded in one meeting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BoardReview {
    pub quarter: u32,
    pub gross_profit: i64,
    pub fines: i64,
    pub net_profit: i64,
    pub breakdown: ScoreBreakdown,
    pub rating: Rating,
    pub decision: BoardDecision,
    pub poor_streak: u32,
    pub influence: Option<String>,
    pub backlash_scheduled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn package(chance: u32) -> InfluencePackage {
        InfluencePackage {
            id: "golf_weekend".into(),
            name: "Golf weekend".into(),
            cost: 4,
            score_bonus: 10,
            backlash_chance: chance,
            backlash_penalty: 6,
        }
    }

    #[test]
    fn test_rating_thresholds() {
        assert_eq!(Rating::from_score(80), Rating::A);
        assert_eq!(Rating::from_score(79), Rating::B);
        assert_eq!(Rating::from_score(60), Rating::B);
        assert_eq!(Rating::from_score(40), Rating::C);
        assert_eq!(Rating::from_score(20), Rating::D);
        assert_eq!(Rating::from_score(19), Rating::F);
    }

    #[test]
    fn test_profit_bands() {
        let p = PressureLevel::Normal;
        assert_eq!(profit_contribution(200, p), 30);
        assert_eq!(profit_contribution(100, p), 20);
        assert_eq!(profit_contribution(50, p), 10);
        assert_eq!(profit_contribution(0, p), 0);
        assert_eq!(profit_contribution(-100, p), -15);
        assert_eq!(profit_contribution(-101, p), -30);
    }

    #[test]
    fn test_meter_weights() {
        assert_eq!(meter_contribution(Meter::Alignment, 75), 10);
        assert_eq!(meter_contribution(Meter::Runway, 10), -8);
        assert_eq!(meter_contribution(Meter::Morale, 50), 0);
        assert_eq!(meter_contribution(Meter::Delivery, 29), -5);
    }

    #[test]
    fn test_score_breakdown_adds_up() {
        let org = OrgState::new(70, 50, 50, 75, 20);
        let breakdown = score_quarter(120, &org, 12, PressureLevel::Normal, Some(&package(0)));
        assert_eq!(breakdown.profit, 20);
        assert_eq!(breakdown.meters, 5 + 10 - 8);
        assert_eq!(breakdown.favorability, 5);
        assert_eq!(breakdown.influence, 10);
        assert_eq!(breakdown.raw, 50 + 20 + 7 + 5 + 10);
        assert_eq!(breakdown.score, 92);
    }

    #[test]
    fn test_score_clamped() {
        let org = OrgState::uniform(0);
        let breakdown = score_quarter(-10_000, &org, -50, PressureLevel::Brutal, None);
        assert!(breakdown.raw < 0);
        assert_eq!(breakdown.score, 0);
    }

    #[test]
    fn test_third_poor_quarter_forces_termination() {
        let stream = RandomStream::new(1);
        for score in [20, 25, 39, 0, 15] {
            let rating = Rating::from_score(score);
            let (decision, streak) = decide_employment(rating, score, 2, &stream, 7);
            assert_eq!(streak, 3);
            assert_eq!(
                decision,
                BoardDecision::Terminate {
                    reason: TerminationReason::PoorStreak { streak: 3 }
                }
            );
        }
    }

    #[test]
    fn test_good_rating_resets_streak() {
        let stream = RandomStream::new(1);
        let (decision, streak) = decide_employment(Rating::C, 45, 2, &stream, 7);
        assert_eq!(decision, BoardDecision::Retain);
        assert_eq!(streak, 0);
    }

    #[test]
    fn test_termination_chance_bands() {
        assert_eq!(termination_chance(Rating::F, 19, 0), Some(33));
        assert_eq!(termination_chance(Rating::F, 0, 0), Some(90));
        assert_eq!(termination_chance(Rating::F, 20, 0), Some(30));
        assert_eq!(termination_chance(Rating::D, 25, 0), None);
        assert_eq!(termination_chance(Rating::D, 25, 1), Some(20));
        assert_eq!(termination_chance(Rating::D, 25, 5), Some(40));
        assert_eq!(termination_chance(Rating::B, 65, 2), None);
    }

    #[test]
    fn test_failing_grade_terminates_at_roughly_its_chance() {
        let mut fired = 0;
        for seed in 0..1000 {
            let (decision, _) = decide_employment(Rating::F, 0, 0, &RandomStream::new(seed), 1);
            if decision.is_termination() {
                fired += 1;
            }
        }
        assert!((820..=970).contains(&fired), "fired {fired}");
    }

    #[test]
    fn test_golden_parachute() {
        let ceo = CeoState {
            tenure: 4,
            evil_score: 20,
            cards_played: 12,
            ..CeoState::default()
        };
        assert_eq!(golden_parachute(&ceo, &ResourceState::new(6)), 4000 + 300 + 200 + 60);
        let saint = CeoState {
            evil_score: -30,
            ..CeoState::default()
        };
        assert_eq!(golden_parachute(&saint, &ResourceState::new(0)), 0);
    }

    #[test]
    fn test_backlash_deterministic() {
        assert!(!backlash_triggered(1, 1, &package(0)));
        assert!(backlash_triggered(1, 1, &package(100)));
        let p = package(50);
        assert_eq!(backlash_triggered(9, 3, &p), backlash_triggered(9, 3, &p));
    }
}
