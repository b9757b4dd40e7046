//! Quarter Engine: Crisis Lifecycle & Resolution
//!
//! Active -> {Mitigated, Escalated, Expired}. Active is the only
//! non-terminal status. Instances live in a plain ordered Vec and are
//! addressed by instance id; nothing holds a reference to a crisis.
//!
//! A player response rolls 2d6 and adds the response's mitigation bonus,
//! an alignment bonus (+1 at Alignment >= 60, -1 below 30) and a severity
//! penalty (-(severity - 3) above severity 3). 10+ is Good, 6+ Expected,
//! anything lower Bad. A Good roll paid for below the crisis's minimum
//! full-mitigation spend is downgraded to Expected before anything else
//! reads the tier.

use serde::{Deserialize, Serialize};

use crate::domain::{Meter, MeterImpact, OrgState, OutcomeTier};
use crate::rng::{DiceRoll, Purpose, RandomStream};

pub const GOOD_ROLL: i32 = 10;
pub const EXPECTED_ROLL: i32 = 6;
pub const SEVERITY_PENALTY_FLOOR: u8 = 3;

// ── Definitions (static content) ───────────────────────────────────

/// What a resolved tier does to the crisis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum CrisisOperation {
    Mitigate,
    ReduceSeverity { amount: u8 },
    ExtendDeadline { quarters: u32 },
    Escalate,
    NoOp,
}

fn default_on_good() -> CrisisOperation {
    CrisisOperation::Mitigate
}

fn default_on_expected() -> CrisisOperation {
    CrisisOperation::ReduceSeverity { amount: 1 }
}

fn default_on_bad() -> CrisisOperation {
    CrisisOperation::Escalate
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CrisisResponse {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub cost: i32,
    #[serde(default)]
    pub mitigation_bonus: i32,
    #[serde(default = "default_on_good")]
    pub on_good: CrisisOperation,
    #[serde(default = "default_on_expected")]
    pub on_expected: CrisisOperation,
    #[serde(default = "default_on_bad")]
    pub on_bad: CrisisOperation,
}

impl CrisisResponse {
    pub fn operation_for(&self, tier: OutcomeTier) -> CrisisOperation {
        match tier {
            OutcomeTier::Good => self.on_good,
            OutcomeTier::Expected => self.on_expected,
            OutcomeTier::Bad => self.on_bad,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CrisisDefinition {
    pub id: String,
    pub name: String,
    pub severity: u8,
    /// Quarters from creation until the deadline.
    pub duration: u32,
    #[serde(default)]
    pub impact: Vec<MeterImpact>,
    #[serde(default)]
    pub min_full_mitigation_spend: Option<i32>,
    pub responses: Vec<CrisisResponse>,
    /// Situation queued when inept staff botch a non-Good response.
    #[serde(default)]
    pub side_effect: Option<String>,
}

impl CrisisDefinition {
    pub fn response(&self, response_id: &str) -> Option<&CrisisResponse> {
        self.responses.iter().find(|r| r.id == response_id)
    }
}

// ── Instances (runtime state) ──────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrisisStatus {
    Active,
    Mitigated,
    Escalated,
    Expired,
}

impl CrisisStatus {
    pub fn is_terminal(self) -> bool {
        self != CrisisStatus::Active
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CrisisInstance {
    pub id: String,
    pub definition_id: String,
    pub severity: u8,
    pub created_turn: u32,
    pub deadline_turn: u32,
    pub impact: Vec<MeterImpact>,
    pub status: CrisisStatus,
    pub min_full_mitigation_spend: Option<i32>,
}

impl CrisisInstance {
    pub fn from_definition(definition: &CrisisDefinition, instance_id: String, turn: u32) -> Self {
        Self {
            id: instance_id,
            definition_id: definition.id.clone(),
            severity: definition.severity.max(1),
            created_turn: turn,
            deadline_turn: turn + definition.duration,
            impact: definition.impact.clone(),
            status: CrisisStatus::Active,
            min_full_mitigation_spend: definition.min_full_mitigation_spend,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == CrisisStatus::Active
    }

    /// True once `turn` is past the deadline.
    pub fn is_overdue(&self, turn: u32) -> bool {
        turn > self.deadline_turn
    }

    pub fn with_extended_deadline(&self, quarters: u32) -> Self {
        Self {
            deadline_turn: self.deadline_turn + quarters,
            ..self.clone()
        }
    }

    /// Severity never drops below 1.
    pub fn with_reduced_severity(&self, amount: u8) -> Self {
        Self {
            severity: self.severity.saturating_sub(amount).max(1),
            ..self.clone()
        }
    }

    pub fn mitigated(&self) -> Self {
        self.with_status(CrisisStatus::Mitigated)
    }

    pub fn escalated(&self) -> Self {
        Self {
            severity: self.severity.saturating_add(1),
            status: CrisisStatus::Escalated,
            ..self.clone()
        }
    }

    pub fn expired(&self) -> Self {
        self.with_status(CrisisStatus::Expired)
    }

    fn with_status(&self, status: CrisisStatus) -> Self {
        Self {
            status,
            ..self.clone()
        }
    }

    pub fn apply(&self, operation: CrisisOperation) -> Self {
        match operation {
            CrisisOperation::Mitigate => self.mitigated(),
            CrisisOperation::ReduceSeverity { amount } => self.with_reduced_severity(amount),
            CrisisOperation::ExtendDeadline { quarters } => self.with_extended_deadline(quarters),
            CrisisOperation::Escalate => self.escalated(),
            CrisisOperation::NoOp => self.clone(),
        }
    }

    /// Impact on one meter, zero when the crisis does not touch it.
    pub fn impact_on(&self, meter: Meter) -> i32 {
        self.impact
            .iter()
            .filter(|i| i.meter == meter)
            .map(|i| i.delta)
            .sum()
    }
}

// ── Collection helpers ─────────────────────────────────────────────

pub fn find<'a>(crises: &'a [CrisisInstance], id: &str) -> Option<&'a CrisisInstance> {
    crises.iter().find(|c| c.id == id)
}

/// Swap in an updated instance by id, keeping order.
pub fn replace(crises: &[CrisisInstance], updated: &CrisisInstance) -> Vec<CrisisInstance> {
    crises
        .iter()
        .map(|c| {
            if c.id == updated.id {
                updated.clone()
            } else {
                c.clone()
            }
        })
        .collect()
}

/// Expire every overdue active crisis. Returns the updated collection and
/// the crises that expired on this sweep.
pub fn process_deadlines(
    crises: &[CrisisInstance],
    turn: u32,
) -> (Vec<CrisisInstance>, Vec<CrisisInstance>) {
    let mut expired = Vec::new();
    let updated = crises
        .iter()
        .map(|c| {
            if c.is_active() && c.is_overdue(turn) {
                let e = c.expired();
                expired.push(e.clone());
                e
            } else {
                c.clone()
            }
        })
        .collect();
    (updated, expired)
}

/// Drop every crisis in a terminal status.
pub fn cleanup(crises: &[CrisisInstance]) -> Vec<CrisisInstance> {
    crises.iter().filter(|c| c.is_active()).cloned().collect()
}

// ── Dice resolution ────────────────────────────────────────────────

pub fn alignment_bonus(org: &OrgState) -> i32 {
    match org.get(Meter::Alignment) {
        v if v >= 60 => 1,
        v if v < 30 => -1,
        _ => 0,
    }
}

pub fn severity_penalty(severity: u8) -> i32 {
    if severity > SEVERITY_PENALTY_FLOOR {
        -(severity as i32 - SEVERITY_PENALTY_FLOOR as i32)
    } else {
        0
    }
}

pub fn tier_for_roll(modified_roll: i32) -> OutcomeTier {
    if modified_roll >= GOOD_ROLL {
        OutcomeTier::Good
    } else if modified_roll >= EXPECTED_ROLL {
        OutcomeTier::Expected
    } else {
        OutcomeTier::Bad
    }
}

/// A modified 2d6 roll and its tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiceResolution {
    pub roll: DiceRoll,
    pub mitigation_bonus: i32,
    pub alignment_bonus: i32,
    pub severity_penalty: i32,
    pub modified_roll: i32,
    pub tier: OutcomeTier,
}

/// Pure dice arithmetic, shared by crisis and situation responses.
pub fn resolve_dice(
    roll: DiceRoll,
    mitigation_bonus: i32,
    org: &OrgState,
    severity: u8,
) -> DiceResolution {
    let alignment = alignment_bonus(org);
    let penalty = severity_penalty(severity);
    let modified_roll = roll.total() + mitigation_bonus + alignment + penalty;
    DiceResolution {
        roll,
        mitigation_bonus,
        alignment_bonus: alignment,
        severity_penalty: penalty,
        modified_roll,
        tier: tier_for_roll(modified_roll),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaffQuality {
    Good,
    Meh,
    Inept,
}

impl StaffQuality {
    pub fn from_roll(roll: u32) -> Self {
        match roll {
            r if r >= 70 => StaffQuality::Good,
            r if r >= 25 => StaffQuality::Meh,
            _ => StaffQuality::Inept,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CrisisResolution {
    pub crisis_id: String,
    pub response_id: String,
    pub dice: DiceResolution,
    /// True when a Good roll was cut to Expected by the spend floor.
    pub downgraded: bool,
    pub tier: OutcomeTier,
    pub staff_roll: u32,
    pub staff: StaffQuality,
    pub side_effect: Option<String>,
    pub operation: CrisisOperation,
    pub crisis: CrisisInstance,
}

/// Apply the spend floor: cheap fixes cannot fully resolve severe crises.
pub fn apply_spend_floor(tier: OutcomeTier, cost: i32, min_spend: Option<i32>) -> (OutcomeTier, bool) {
    match (tier, min_spend) {
        (OutcomeTier::Good, Some(min)) if cost < min => (OutcomeTier::Expected, true),
        _ => (tier, false),
    }
}

/// Resolve a player's response to an active crisis.
///
/// The dice and staff rolls come from independent sub-streams keyed by
/// (quarter, crisis instance, response, attempt).
pub fn resolve_crisis_response(
    crisis: &CrisisInstance,
    definition: &CrisisDefinition,
    response: &CrisisResponse,
    org: &OrgState,
    stream: &RandomStream,
    quarter: u32,
    attempt: u32,
) -> CrisisResolution {
    let context = format!("{}:{}:{}", crisis.id, response.id, attempt);
    let roll = stream
        .fork(quarter, Purpose::CrisisRoll, &context)
        .roll_2d6();
    let dice = resolve_dice(roll, response.mitigation_bonus, org, crisis.severity);
    let (tier, downgraded) =
        apply_spend_floor(dice.tier, response.cost, crisis.min_full_mitigation_spend);

    let staff_roll = stream.fork(quarter, Purpose::StaffRoll, &context).percent();
    let staff = StaffQuality::from_roll(staff_roll);
    let side_effect = if staff == StaffQuality::Inept && tier != OutcomeTier::Good {
        definition.side_effect.clone()
    } else {
        None
    };

    let operation = response.operation_for(tier);
    let updated = crisis.apply(operation);

    tracing::debug!(
        target: "ceo_engine::crisis",
        crisis = %crisis.id,
        response = %response.id,
        dice = roll.total(),
        modified = dice.modified_roll,
        tier = %tier,
        downgraded,
        ?staff,
        "crisis.resolved"
    );

    CrisisResolution {
        crisis_id: crisis.id.clone(),
        response_id: response.id.clone(),
        dice,
        downgraded,
        tier,
        staff_roll,
        staff,
        side_effect,
        operation,
        crisis: updated,
    }
}
