//! Quarter Engine: Objectives & Final Verdict
//!
//! Objectives are drawn once at game start and evaluated exactly once,
//! when the game ends. A loss condition (CEO ousted, or any meter at zero)
//! always overrides the objective count.

use serde::{Deserialize, Serialize};

use crate::domain::{CeoState, Meter, OrgState, ResourceState};
use crate::rng::{Purpose, RandomStream};

/// Predicate over the final position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ObjectiveCondition {
    MeterAtLeast { meter: Meter, threshold: i32 },
    MeterAtMost { meter: Meter, threshold: i32 },
    AllMetersAtLeast { threshold: i32 },
    EvilAtMost { threshold: i32 },
    CapitalAtLeast { threshold: i32 },
    ProfitAtLeast { threshold: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ObjectiveDefinition {
    pub id: String,
    pub name: String,
    pub condition: ObjectiveCondition,
}

/// Everything an objective may look at.
#[derive(Debug, Clone, Copy)]
pub struct FinalPosition<'a> {
    pub org: &'a OrgState,
    pub ceo: &'a CeoState,
    pub resources: &'a ResourceState,
}

impl ObjectiveCondition {
    /// The value the condition compares against its threshold.
    pub fn observe(&self, position: &FinalPosition<'_>) -> i64 {
        match self {
            ObjectiveCondition::MeterAtLeast { meter, .. }
            | ObjectiveCondition::MeterAtMost { meter, .. } => position.org.get(*meter) as i64,
            ObjectiveCondition::AllMetersAtLeast { .. } => position
                .org
                .values()
                .iter()
                .map(|&(_, v)| v as i64)
                .min()
                .unwrap_or(0),
            ObjectiveCondition::EvilAtMost { .. } => position.ceo.evil_score as i64,
            ObjectiveCondition::CapitalAtLeast { .. } => {
                position.resources.political_capital() as i64
            }
            ObjectiveCondition::ProfitAtLeast { .. } => position.ceo.total_profit,
        }
    }

    pub fn is_met(&self, position: &FinalPosition<'_>) -> bool {
        let observed = self.observe(position);
        match self {
            ObjectiveCondition::MeterAtLeast { threshold, .. }
            | ObjectiveCondition::AllMetersAtLeast { threshold }
            | ObjectiveCondition::CapitalAtLeast { threshold } => observed >= *threshold as i64,
            ObjectiveCondition::MeterAtMost { threshold, .. }
            | ObjectiveCondition::EvilAtMost { threshold } => observed <= *threshold as i64,
            ObjectiveCondition::ProfitAtLeast { threshold } => observed >= *threshold,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ObjectiveResult {
    pub objective_id: String,
    pub passed: bool,
    pub observed: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LossCondition {
    Ousted,
    MeterDepleted { meter: Meter },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GameVerdict {
    pub results: Vec<ObjectiveResult>,
    pub passed: usize,
    pub required: usize,
    pub loss: Option<LossCondition>,
    pub is_won: bool,
}

pub fn evaluate_objectives(
    objectives: &[&ObjectiveDefinition],
    position: &FinalPosition<'_>,
) -> Vec<ObjectiveResult> {
    objectives
        .iter()
        .map(|o| ObjectiveResult {
            objective_id: o.id.clone(),
            passed: o.condition.is_met(position),
            observed: o.condition.observe(position),
        })
        .collect()
}

/// Ousting takes precedence over a depleted meter.
pub fn detect_loss(position: &FinalPosition<'_>) -> Option<LossCondition> {
    if !position.ceo.is_active() {
        return Some(LossCondition::Ousted);
    }
    position
        .org
        .depleted()
        .map(|meter| LossCondition::MeterDepleted { meter })
}

pub fn verdict(
    results: Vec<ObjectiveResult>,
    required: usize,
    loss: Option<LossCondition>,
) -> GameVerdict {
    let passed = results.iter().filter(|r| r.passed).count();
    let is_won = loss.is_none() && passed >= required;
    GameVerdict {
        results,
        passed,
        required,
        loss,
        is_won,
    }
}

/// Draw `count` objective ids. The pool is sorted first so content order
/// does not leak into the draw.
pub fn draw_objectives(
    definitions: &[ObjectiveDefinition],
    count: usize,
    stream: &RandomStream,
) -> Vec<String> {
    let mut pool: Vec<String> = definitions.iter().map(|o| o.id.clone()).collect();
    pool.sort_unstable();
    stream
        .fork(0, Purpose::ObjectiveDraw, "")
        .shuffle(&mut pool);
    pool.truncate(count);
    pool
}

#[cfg(test)]
mod tests {
    use super::*;

    fn objective(id: &str, condition: ObjectiveCondition) -> ObjectiveDefinition {
        ObjectiveDefinition {
            id: id.into(),
            name: id.into(),
            condition,
        }
    }

    fn pool() -> Vec<ObjectiveDefinition> {
        vec![
            objective(
                "strong_delivery",
                ObjectiveCondition::MeterAtLeast {
                    meter: Meter::Delivery,
                    threshold: 60,
                },
            ),
            objective(
                "clean_hands",
                ObjectiveCondition::EvilAtMost { threshold: 10 },
            ),
            objective(
                "balanced_org",
                ObjectiveCondition::AllMetersAtLeast { threshold: 40 },
            ),
        ]
    }

    #[test]
    fn test_conditions_read_final_position() {
        let org = OrgState::uniform(50).with_meter(Meter::Delivery, 65);
        let ceo = CeoState {
            evil_score: 25,
            ..CeoState::default()
        };
        let resources = ResourceState::new(3);
        let position = FinalPosition {
            org: &org,
            ceo: &ceo,
            resources: &resources,
        };
        let defs = pool();
        let refs: Vec<&ObjectiveDefinition> = defs.iter().collect();
        let results = evaluate_objectives(&refs, &position);
        assert_eq!(
            results.iter().map(|r| r.passed).collect::<Vec<_>>(),
            vec![true, false, true]
        );
        assert_eq!(results[1].observed, 25);
        assert_eq!(results[2].observed, 50);
    }

    #[test]
    fn test_loss_overrides_win() {
        let results = vec![
            ObjectiveResult {
                objective_id: "a".into(),
                passed: true,
                observed: 1,
            },
            ObjectiveResult {
                objective_id: "b".into(),
                passed: true,
                observed: 1,
            },
        ];
        let won = verdict(results.clone(), 2, None);
        assert!(won.is_won);
        for loss in [
            LossCondition::Ousted,
            LossCondition::MeterDepleted {
                meter: Meter::Runway,
            },
        ] {
            let v = verdict(results.clone(), 2, Some(loss));
            assert_eq!(v.passed, 2);
            assert!(!v.is_won);
        }
    }

    #[test]
    fn test_detect_loss() {
        let org = OrgState::uniform(40).with_meter(Meter::Morale, 0);
        let ceo = CeoState::default();
        let resources = ResourceState::new(0);
        let position = FinalPosition {
            org: &org,
            ceo: &ceo,
            resources: &resources,
        };
        assert_eq!(
            detect_loss(&position),
            Some(LossCondition::MeterDepleted {
                meter: Meter::Morale
            })
        );

        let ousted = ceo.ousted(0);
        let position = FinalPosition {
            ceo: &ousted,
            ..position
        };
        assert_eq!(detect_loss(&position), Some(LossCondition::Ousted));
    }

    #[test]
    fn test_draw_ignores_content_order() {
        let defs = pool();
        let mut reversed = pool();
        reversed.reverse();
        let stream = RandomStream::new(11);
        let a = draw_objectives(&defs, 2, &stream);
        assert_eq!(a, draw_objectives(&reversed, 2, &stream));
        assert_eq!(a.len(), 2);
        assert_eq!(draw_objectives(&defs, 10, &stream).len(), 3);
    }
}
