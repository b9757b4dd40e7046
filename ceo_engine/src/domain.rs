//! Quarter Engine: Core Domain Types
//!
//! Organization meters, political capital, the CEO record and the card
//! definitions the content tables supply. Every state value is immutable;
//! "mutators" return a new value.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::arithmetic::{checked_add, clamp_meter};
use crate::error::{EngineError, ResourceError};

// ── Meters ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Meter {
    Delivery,
    Morale,
    Governance,
    Alignment,
    Runway,
}

impl Meter {
    pub const ALL: [Meter; 5] = [
        Meter::Delivery,
        Meter::Morale,
        Meter::Governance,
        Meter::Alignment,
        Meter::Runway,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Meter::Delivery => "delivery",
            Meter::Morale => "morale",
            Meter::Governance => "governance",
            Meter::Alignment => "alignment",
            Meter::Runway => "runway",
        }
    }
}

impl fmt::Display for Meter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A signed change to one meter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MeterImpact {
    pub meter: Meter,
    pub delta: i32,
}

/// Five organizational health meters, each in `[0, 100]`.
///
/// The clamp runs on every construction path, including deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "MeterValues")]
pub struct OrgState {
    delivery: i32,
    morale: i32,
    governance: i32,
    alignment: i32,
    runway: i32,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct MeterValues {
    delivery: i32,
    morale: i32,
    governance: i32,
    alignment: i32,
    runway: i32,
}

impl From<MeterValues> for OrgState {
    fn from(v: MeterValues) -> Self {
        OrgState::new(v.delivery, v.morale, v.governance, v.alignment, v.runway)
    }
}

impl OrgState {
    pub fn new(delivery: i32, morale: i32, governance: i32, alignment: i32, runway: i32) -> Self {
        Self {
            delivery: clamp_meter(delivery as i64),
            morale: clamp_meter(morale as i64),
            governance: clamp_meter(governance as i64),
            alignment: clamp_meter(alignment as i64),
            runway: clamp_meter(runway as i64),
        }
    }

    /// Every meter at the same value.
    pub fn uniform(value: i32) -> Self {
        Self::new(value, value, value, value, value)
    }

    pub fn get(&self, meter: Meter) -> i32 {
        match meter {
            Meter::Delivery => self.delivery,
            Meter::Morale => self.morale,
            Meter::Governance => self.governance,
            Meter::Alignment => self.alignment,
            Meter::Runway => self.runway,
        }
    }

    /// New state with `delta` applied to one meter, clamped.
    pub fn with_meter_change(&self, meter: Meter, delta: i32) -> Self {
        let value = clamp_meter(self.get(meter) as i64 + delta as i64);
        self.with_meter(meter, value)
    }

    /// New state with one meter set outright, clamped.
    pub fn with_meter(&self, meter: Meter, value: i32) -> Self {
        let value = clamp_meter(value as i64);
        let mut next = self.clone();
        match meter {
            Meter::Delivery => next.delivery = value,
            Meter::Morale => next.morale = value,
            Meter::Governance => next.governance = value,
            Meter::Alignment => next.alignment = value,
            Meter::Runway => next.runway = value,
        }
        next
    }

    /// Apply a list of impacts, each scaled by `factor`, in order.
    pub fn with_impacts(&self, impacts: &[MeterImpact], factor: i32) -> Self {
        impacts.iter().fold(self.clone(), |org, impact| {
            org.with_meter_change(impact.meter, impact.delta.saturating_mul(factor))
        })
    }

    /// `(meter, value)` pairs in canonical meter order.
    pub fn values(&self) -> [(Meter, i32); 5] {
        Meter::ALL.map(|m| (m, self.get(m)))
    }

    /// First meter driven to zero, if any.
    pub fn depleted(&self) -> Option<Meter> {
        Meter::ALL.into_iter().find(|&m| self.get(m) == 0)
    }

    /// Number of meters at or above `threshold`.
    pub fn count_at_least(&self, threshold: i32) -> usize {
        Meter::ALL.iter().filter(|&&m| self.get(m) >= threshold).count()
    }
}

// ── Political capital ──────────────────────────────────────────────

/// Non-negative political capital balance. A negative balance in stored
/// state fails to deserialize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ResourceValues")]
pub struct ResourceState {
    political_capital: i32,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ResourceValues {
    political_capital: i32,
}

impl TryFrom<ResourceValues> for ResourceState {
    type Error = String;

    fn try_from(v: ResourceValues) -> Result<Self, Self::Error> {
        if v.political_capital < 0 {
            return Err(format!("political_capital {} is negative", v.political_capital));
        }
        Ok(Self {
            political_capital: v.political_capital,
        })
    }
}

impl ResourceState {
    pub fn new(political_capital: i32) -> Self {
        Self {
            political_capital: political_capital.max(0),
        }
    }

    pub fn political_capital(&self) -> i32 {
        self.political_capital
    }

    /// Spend capital, failing without change when the balance is short.
    pub fn spend(&self, amount: i32) -> Result<Self, EngineError> {
        let amount = amount.max(0);
        if amount > self.political_capital {
            return Err(ResourceError::InsufficientCapital {
                needed: amount,
                available: self.political_capital,
            }
            .into());
        }
        Ok(Self::new(self.political_capital - amount))
    }

    pub fn earn(&self, amount: i32) -> Self {
        Self::new(self.political_capital.saturating_add(amount.max(0)))
    }

    /// End-of-quarter accrual: one base point, plus one per meter at 60+,
    /// plus one more per meter at 80+.
    pub fn accrual_for(org: &OrgState) -> i32 {
        1 + org.count_at_least(60) as i32 + org.count_at_least(80) as i32
    }
}

// ── CEO ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmploymentStatus {
    Active,
    Ousted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CeoState {
    pub bonus: i64,
    pub total_profit: i64,
    pub evil_score: i32,
    pub board_favorability: i32,
    pub tenure: u32,
    pub cards_played: u32,
    pub status: EmploymentStatus,
}

impl Default for CeoState {
    fn default() -> Self {
        Self {
            bonus: 0,
            total_profit: 0,
            evil_score: 0,
            board_favorability: 0,
            tenure: 0,
            cards_played: 0,
            status: EmploymentStatus::Active,
        }
    }
}

impl CeoState {
    pub fn with_evil_delta(&self, delta: i32) -> Self {
        Self {
            evil_score: self.evil_score.saturating_add(delta),
            ..self.clone()
        }
    }

    pub fn with_favorability_delta(&self, delta: i32) -> Self {
        Self {
            board_favorability: self.board_favorability.saturating_add(delta),
            ..self.clone()
        }
    }

    pub fn with_card_played(&self) -> Self {
        Self {
            cards_played: self.cards_played + 1,
            ..self.clone()
        }
    }

    /// Book a quarter's net profit; a tenth of any gain goes to the bonus.
    pub fn with_quarter_result(&self, net_profit: i64) -> Self {
        Self {
            total_profit: checked_add(self.total_profit, net_profit),
            bonus: checked_add(self.bonus, net_profit.max(0) / 10),
            ..self.clone()
        }
    }

    pub fn with_tenure_increment(&self) -> Self {
        Self {
            tenure: self.tenure + 1,
            ..self.clone()
        }
    }

    /// Ousted with a golden parachute added to the bonus.
    pub fn ousted(&self, parachute: i64) -> Self {
        Self {
            status: EmploymentStatus::Ousted,
            bonus: checked_add(self.bonus, parachute),
            ..self.clone()
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == EmploymentStatus::Active
    }
}

// ── Outcomes and effects ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeTier {
    Good,
    Expected,
    Bad,
}

impl OutcomeTier {
    pub fn as_str(self) -> &'static str {
        match self {
            OutcomeTier::Good => "good",
            OutcomeTier::Expected => "expected",
            OutcomeTier::Bad => "bad",
        }
    }
}

impl fmt::Display for OutcomeTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single consequence of an outcome tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Effect {
    Meter { meter: Meter, delta: i32 },
    Profit { amount: i64 },
    Fine { amount: i64 },
}

/// Effects for each of the three tiers.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutcomeProfile {
    #[serde(default)]
    pub good: Vec<Effect>,
    #[serde(default)]
    pub expected: Vec<Effect>,
    #[serde(default)]
    pub bad: Vec<Effect>,
}

impl OutcomeProfile {
    pub fn for_tier(&self, tier: OutcomeTier) -> &[Effect] {
        match tier {
            OutcomeTier::Good => &self.good,
            OutcomeTier::Expected => &self.expected,
            OutcomeTier::Bad => &self.bad,
        }
    }
}

// ── Cards ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardCategory {
    Action,
    Response,
    Corporate,
    Email,
    Revenue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    #[default]
    Medium,
    High,
}

/// Static card definition. Referenced by id, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlayableCard {
    pub id: String,
    pub name: String,
    pub category: CardCategory,
    pub outcomes: OutcomeProfile,
    #[serde(default)]
    pub affinity: Option<Meter>,
    #[serde(default)]
    pub risk: RiskLevel,
    #[serde(default)]
    pub corporate_intensity: u8,
    #[serde(default = "default_copies")]
    pub copies: u8,
}

fn default_copies() -> u8 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meters_clamped_on_construction() {
        let org = OrgState::new(-20, 150, 50, 100, 0);
        assert_eq!(org.get(Meter::Delivery), 0);
        assert_eq!(org.get(Meter::Morale), 100);
        assert_eq!(org.get(Meter::Governance), 50);
    }

    #[test]
    fn test_meter_change_clamped_for_all_deltas() {
        for start in [0, 1, 37, 99, 100] {
            for delta in [i32::MIN, -1000, -101, -1, 0, 1, 101, 1000, i32::MAX] {
                let org = OrgState::uniform(start).with_meter_change(Meter::Runway, delta);
                let value = org.get(Meter::Runway);
                assert!((0..=100).contains(&value), "start={start} delta={delta}");
            }
        }
    }

    #[test]
    fn test_meter_change_returns_new_value() {
        let before = OrgState::uniform(50);
        let after = before.with_meter_change(Meter::Morale, 7);
        assert_eq!(before.get(Meter::Morale), 50);
        assert_eq!(after.get(Meter::Morale), 57);
    }

    #[test]
    fn test_deserialize_clamps() {
        let org: OrgState = serde_json::from_str(
            r#"{"delivery":400,"morale":-3,"governance":10,"alignment":20,"runway":30}"#,
        )
        .unwrap();
        assert_eq!(org.get(Meter::Delivery), 100);
        assert_eq!(org.get(Meter::Morale), 0);
    }

    #[test]
    fn test_impacts_scale() {
        let impacts = [MeterImpact {
            meter: Meter::Runway,
            delta: -4,
        }];
        let org = OrgState::uniform(50).with_impacts(&impacts, 2);
        assert_eq!(org.get(Meter::Runway), 42);
    }

    #[test]
    fn test_depleted_finds_zero_meter() {
        assert_eq!(OrgState::uniform(10).depleted(), None);
        let org = OrgState::uniform(10).with_meter(Meter::Morale, 0);
        assert_eq!(org.depleted(), Some(Meter::Morale));
    }

    #[test]
    fn test_spend_insufficient_leaves_balance() {
        let pc = ResourceState::new(3);
        let err = pc.spend(5).unwrap_err();
        assert_eq!(
            err,
            EngineError::Exhausted(ResourceError::InsufficientCapital {
                needed: 5,
                available: 3
            })
        );
        assert_eq!(pc.political_capital(), 3);
        assert_eq!(pc.spend(3).unwrap().political_capital(), 0);
    }

    #[test]
    fn test_negative_capital_rejected_on_load() {
        let err = serde_json::from_str::<ResourceState>(r#"{"political_capital":-5}"#).unwrap_err();
        assert!(err.to_string().contains("negative"), "{err}");
        let pc: ResourceState = serde_json::from_str(r#"{"political_capital":4}"#).unwrap();
        assert_eq!(pc.political_capital(), 4);
    }

    #[test]
    fn test_accrual_counts_healthy_meters() {
        assert_eq!(ResourceState::accrual_for(&OrgState::uniform(50)), 1);
        assert_eq!(ResourceState::accrual_for(&OrgState::uniform(65)), 6);
        assert_eq!(ResourceState::accrual_for(&OrgState::uniform(85)), 11);
    }

    #[test]
    fn test_quarter_result_bonus_only_on_gain() {
        let ceo = CeoState::default().with_quarter_result(250);
        assert_eq!(ceo.bonus, 25);
        let ceo = ceo.with_quarter_result(-100);
        assert_eq!(ceo.bonus, 25);
        assert_eq!(ceo.total_profit, 150);
    }

    #[test]
    fn test_effect_json_shape() {
        let effect: Effect =
            serde_json::from_str(r#"{"type":"meter","meter":"morale","delta":-3}"#).unwrap();
        assert_eq!(
            effect,
            Effect::Meter {
                meter: Meter::Morale,
                delta: -3
            }
        );
    }
}
