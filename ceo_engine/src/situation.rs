//! Quarter Engine: Situation Scheduling & Decay
//!
//! Situations are lighter than crises: queued by card outcomes (or drawn at
//! random), optionally delayed, and faded if they wait too long.
//!
//! Lifecycle of a `PendingSituation`:
//!   pending --(scheduled quarter, decay roll survives)--> due
//!   pending --(decay roll fails)--> fizzled (removed)
//!   due --respond--> resolved (removed)
//!   due --defer--> deferred (defer_count + 1)
//!   deferred --(30% per quarter)--> due, severity +1 per deferral
//!   deferred --(4 quarters without resurfacing)--> faded (removed)

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{OutcomeProfile, OutcomeTier};
use crate::rng::{Purpose, RandomStream};

pub const MAX_SEVERITY: u8 = 5;
/// Situations at or above this severity feed the random crisis-tier draw.
pub const CRISIS_TIER_SEVERITY: u8 = 4;
pub const RESURFACE_CHANCE: u32 = 30;
pub const MAX_DEFERRED_QUARTERS: u32 = 4;
pub const RANDOM_CRISIS_CHANCE: u32 = 33;
/// Delay roll weights: [no trigger, 0q, 1q, 2q, 3q].
pub const DELAY_WEIGHTS: [u32; 5] = [3, 8, 5, 3, 1];

// ── Definitions ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SituationResponse {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub cost: i32,
    #[serde(default)]
    pub mitigation_bonus: i32,
    #[serde(default)]
    pub outcomes: OutcomeProfile,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SituationDefinition {
    pub id: String,
    pub title: String,
    pub severity: u8,
    pub responses: Vec<SituationResponse>,
    /// Crisis instantiated when a response lands Bad.
    #[serde(default)]
    pub crisis_id: Option<String>,
}

impl SituationDefinition {
    pub fn response(&self, response_id: &str) -> Option<&SituationResponse> {
        self.responses.iter().find(|r| r.id == response_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierFilter {
    #[default]
    Any,
    Good,
    Expected,
    Bad,
}

impl TierFilter {
    pub fn matches(self, tier: OutcomeTier) -> bool {
        match self {
            TierFilter::Any => true,
            TierFilter::Good => tier == OutcomeTier::Good,
            TierFilter::Expected => tier == OutcomeTier::Expected,
            TierFilter::Bad => tier == OutcomeTier::Bad,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SituationTrigger {
    pub situation_id: String,
    #[serde(default)]
    pub tier: TierFilter,
    pub weight: u32,
}

/// Card id -> weighted triggers, with a fallback pool for every other card.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TriggerTable {
    #[serde(default)]
    pub by_card: BTreeMap<String, Vec<SituationTrigger>>,
    #[serde(default)]
    pub fallback: Vec<SituationTrigger>,
}

impl TriggerTable {
    pub fn triggers_for(&self, card_id: &str) -> &[SituationTrigger] {
        self.by_card
            .get(card_id)
            .map(Vec::as_slice)
            .unwrap_or(self.fallback.as_slice())
    }

    pub fn all(&self) -> impl Iterator<Item = &SituationTrigger> {
        self.by_card.values().flatten().chain(self.fallback.iter())
    }
}

// ── Pending instances ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SituationOrigin {
    Card { card_id: String },
    Random,
    SideEffect { crisis_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PendingSituation {
    pub situation_id: String,
    pub origin: SituationOrigin,
    pub queued_quarter: u32,
    pub scheduled_quarter: u32,
    pub defer_count: u32,
    pub deferred_quarter: Option<u32>,
}

impl PendingSituation {
    pub fn new(situation_id: &str, origin: SituationOrigin, queued: u32, delay: u32) -> Self {
        Self {
            situation_id: situation_id.to_string(),
            origin,
            queued_quarter: queued,
            scheduled_quarter: queued + delay,
            defer_count: 0,
            deferred_quarter: None,
        }
    }

    pub fn quarters_waiting(&self) -> u32 {
        self.scheduled_quarter.saturating_sub(self.queued_quarter)
    }

    /// Base severity raised once per prior deferral, capped.
    pub fn effective_severity(&self, base: u8) -> u8 {
        let raised = base as u32 + self.defer_count;
        raised.min(MAX_SEVERITY as u32) as u8
    }

    pub fn is_deferrable(&self, base: u8) -> bool {
        self.effective_severity(base) < MAX_SEVERITY
    }

    /// Sub-stream context for this item's own rolls. Built from the item
    /// alone, never from its position among other situations.
    pub fn roll_key(&self) -> String {
        let origin = match &self.origin {
            SituationOrigin::Card { card_id } => format!("card={}", card_id),
            SituationOrigin::Random => "random".to_string(),
            SituationOrigin::SideEffect { crisis_id } => format!("side_effect={}", crisis_id),
        };
        let deferred = self
            .deferred_quarter
            .map_or_else(|| "-".to_string(), |q| q.to_string());
        format!(
            "{}:{}:{}:{}:{}:{}",
            self.situation_id, origin, self.queued_quarter, self.scheduled_quarter, self.defer_count, deferred
        )
    }
}

/// Scheduled, due and deferred situations. All plain ordered lists.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SituationBook {
    pub pending: Vec<PendingSituation>,
    pub due: Vec<PendingSituation>,
    pub deferred: Vec<PendingSituation>,
}

impl SituationBook {
    pub fn scheduled(&self, situation: PendingSituation) -> Self {
        let mut next = self.clone();
        next.pending.push(situation);
        next
    }

    pub fn head(&self) -> Option<&PendingSituation> {
        self.due.first()
    }

    /// Remove the head of the due queue.
    pub fn without_head(&self) -> Self {
        let mut next = self.clone();
        if !next.due.is_empty() {
            next.due.remove(0);
        }
        next
    }

    /// Move the due head into the deferred list.
    pub fn with_head_deferred(&self, quarter: u32) -> Self {
        let mut next = self.clone();
        if next.due.is_empty() {
            return next;
        }
        let mut head = next.due.remove(0);
        head.defer_count += 1;
        head.deferred_quarter = Some(quarter);
        next.deferred.push(head);
        next
    }
}

// ── Rolls ──────────────────────────────────────────────────────────

/// Chance (percent) that a situation which waited `quarters_waiting`
/// quarters still fires. Never increases with waiting time.
pub fn fire_probability(quarters_waiting: u32) -> u32 {
    let mut p = 100u32;
    for _ in 0..quarters_waiting {
        p = p * 3 / 4;
        if p == 0 {
            break;
        }
    }
    p
}

/// Roll for a situation triggered by a resolved card. `slot` is the card's
/// position in the selection, so two plays of one card key separately.
pub fn roll_trigger(
    table: &TriggerTable,
    card_id: &str,
    tier: OutcomeTier,
    quarter: u32,
    slot: usize,
    stream: &RandomStream,
) -> Option<PendingSituation> {
    let context = format!("{}:{}", slot, card_id);

    let candidates: Vec<&SituationTrigger> = table
        .triggers_for(card_id)
        .iter()
        .filter(|t| t.tier.matches(tier))
        .collect();
    let weights: Vec<u32> = candidates.iter().map(|t| t.weight).collect();
    let chosen = stream
        .fork(quarter, Purpose::SituationTrigger, &context)
        .weighted_index(&weights)?;

    let delay_bucket = stream
        .fork(quarter, Purpose::SituationDelay, &context)
        .weighted_index(&DELAY_WEIGHTS)?;
    if delay_bucket == 0 {
        return None;
    }
    let delay = (delay_bucket - 1) as u32;

    let trigger = candidates[chosen];
    Some(PendingSituation::new(
        &trigger.situation_id,
        SituationOrigin::Card {
            card_id: card_id.to_string(),
        },
        quarter,
        delay,
    ))
}

/// Decay roll for a situation reaching its scheduled quarter.
pub fn survives_decay(situation: &PendingSituation, quarter: u32, stream: &RandomStream) -> bool {
    let waiting = situation.quarters_waiting();
    if waiting == 0 {
        return true;
    }
    stream
        .fork(quarter, Purpose::SituationDecay, &situation.roll_key())
        .chance(fire_probability(waiting))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeferredFate {
    Resurfaced(PendingSituation),
    Faded(PendingSituation),
}

/// Age the deferred list by one quarter: each deferral from an earlier
/// quarter may resurface (due now, waiting zero) or fade out.
pub fn sweep_deferred(
    book: &SituationBook,
    quarter: u32,
    stream: &RandomStream,
) -> (SituationBook, Vec<DeferredFate>) {
    let mut next = book.clone();
    next.deferred.clear();
    let mut fates = Vec::new();

    for situation in &book.deferred {
        let deferred_at = situation.deferred_quarter.unwrap_or(situation.queued_quarter);
        let age = quarter.saturating_sub(deferred_at);
        if age == 0 {
            next.deferred.push(situation.clone());
            continue;
        }
        let resurfaced = stream
            .fork(quarter, Purpose::SituationResurface, &situation.roll_key())
            .chance(RESURFACE_CHANCE);
        if resurfaced {
            let revived = PendingSituation {
                queued_quarter: quarter,
                scheduled_quarter: quarter,
                deferred_quarter: None,
                ..situation.clone()
            };
            next.pending.push(revived.clone());
            fates.push(DeferredFate::Resurfaced(revived));
        } else if age >= MAX_DEFERRED_QUARTERS {
            fates.push(DeferredFate::Faded(situation.clone()));
        } else {
            next.deferred.push(situation.clone());
        }
    }
    (next, fates)
}

/// Independent once-per-quarter draw of a crisis-tier situation.
pub fn draw_random_crisis(
    situations: &[SituationDefinition],
    quarter: u32,
    stream: &RandomStream,
) -> Option<PendingSituation> {
    let mut rng = stream.fork(quarter, Purpose::RandomCrisis, "");
    if !rng.chance(RANDOM_CRISIS_CHANCE) {
        return None;
    }
    let mut pool: Vec<&str> = situations
        .iter()
        .filter(|s| s.severity >= CRISIS_TIER_SEVERITY)
        .map(|s| s.id.as_str())
        .collect();
    pool.sort_unstable();
    let id = rng.choose(&pool)?;
    Some(PendingSituation::new(id, SituationOrigin::Random, quarter, 0))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DueCheck {
    Due(PendingSituation),
    Fizzled(PendingSituation),
}

/// Move every pending situation scheduled on or before `quarter` through
/// its decay roll. Survivors join the due queue in pending order.
pub fn collect_due(
    book: &SituationBook,
    quarter: u32,
    stream: &RandomStream,
) -> (SituationBook, Vec<DueCheck>) {
    let mut next = book.clone();
    next.pending.clear();
    let mut checks = Vec::new();

    for situation in &book.pending {
        if situation.scheduled_quarter > quarter {
            next.pending.push(situation.clone());
        } else if survives_decay(situation, quarter, stream) {
            next.due.push(situation.clone());
            checks.push(DueCheck::Due(situation.clone()));
        } else {
            checks.push(DueCheck::Fizzled(situation.clone()));
        }
    }
    (next, checks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trigger(id: &str, tier: TierFilter, weight: u32) -> SituationTrigger {
        SituationTrigger {
            situation_id: id.into(),
            tier,
            weight,
        }
    }

    fn definition(id: &str, severity: u8) -> SituationDefinition {
        SituationDefinition {
            id: id.into(),
            title: id.into(),
            severity,
            responses: Vec::new(),
            crisis_id: None,
        }
    }

    #[test]
    fn test_fire_probability_monotonic() {
        assert_eq!(fire_probability(0), 100);
        for k in 0..30 {
            assert!(fire_probability(k + 1) <= fire_probability(k));
        }
        assert!(fire_probability(1) < fire_probability(0));
        assert!(fire_probability(3) < fire_probability(2));
    }

    #[test]
    fn test_decay_monotonic_over_trials() {
        let mut fired = Vec::new();
        for k in 0..5u32 {
            let mut count = 0;
            for seed in 0..400u64 {
                let stream = RandomStream::new(seed);
                let s = PendingSituation::new("rumor", SituationOrigin::Random, 1, k);
                if survives_decay(&s, 1 + k, &stream) {
                    count += 1;
                }
            }
            fired.push(count);
        }
        assert_eq!(fired[0], 400);
        for k in 0..4 {
            assert!(fired[k + 1] <= fired[k], "{fired:?}");
        }
    }

    #[test]
    fn test_no_trigger_rate_near_three_in_twenty() {
        let table = TriggerTable {
            by_card: BTreeMap::new(),
            fallback: vec![trigger("rumor", TierFilter::Any, 1)],
        };
        let stream = RandomStream::new(5);
        let mut none = 0;
        let trials = 2000;
        for q in 0..trials {
            if roll_trigger(&table, "memo", OutcomeTier::Expected, q, 0, &stream).is_none() {
                none += 1;
            }
        }
        // 15% expected; allow a wide band.
        assert!((200..=400).contains(&none), "no-trigger count {none}");
    }

    #[test]
    fn test_trigger_respects_tier_filter() {
        let mut by_card = BTreeMap::new();
        by_card.insert(
            "layoffs".to_string(),
            vec![
                trigger("walkout", TierFilter::Bad, 5),
                trigger("praise", TierFilter::Good, 5),
            ],
        );
        let table = TriggerTable {
            by_card,
            fallback: Vec::new(),
        };
        let stream = RandomStream::new(9);
        for q in 0..200 {
            if let Some(p) = roll_trigger(&table, "layoffs", OutcomeTier::Bad, q, 0, &stream) {
                assert_eq!(p.situation_id, "walkout");
                assert!(p.scheduled_quarter >= q && p.scheduled_quarter <= q + 3);
            }
            assert!(roll_trigger(&table, "layoffs", OutcomeTier::Expected, q, 0, &stream).is_none());
        }
    }

    #[test]
    fn test_defer_and_effective_severity() {
        let book = SituationBook {
            due: vec![PendingSituation::new("audit", SituationOrigin::Random, 2, 0)],
            ..SituationBook::default()
        };
        let book = book.with_head_deferred(2);
        assert!(book.due.is_empty());
        let deferred = &book.deferred[0];
        assert_eq!(deferred.defer_count, 1);
        assert_eq!(deferred.deferred_quarter, Some(2));
        assert_eq!(deferred.effective_severity(3), 4);
        assert!(deferred.is_deferrable(3));
        assert!(!deferred.is_deferrable(4));
        assert_eq!(deferred.effective_severity(5), 5);
    }

    #[test]
    fn test_deferred_not_swept_same_quarter() {
        let mut s = PendingSituation::new("audit", SituationOrigin::Random, 2, 0);
        s.defer_count = 1;
        s.deferred_quarter = Some(2);
        let book = SituationBook {
            deferred: vec![s],
            ..SituationBook::default()
        };
        let (next, fates) = sweep_deferred(&book, 2, &RandomStream::new(1));
        assert!(fates.is_empty());
        assert_eq!(next.deferred.len(), 1);
    }

    #[test]
    fn test_deferred_fades_by_fourth_quarter() {
        for seed in 0..100 {
            let stream = RandomStream::new(seed);
            let mut s = PendingSituation::new("audit", SituationOrigin::Random, 1, 0);
            s.defer_count = 1;
            s.deferred_quarter = Some(1);
            let mut book = SituationBook {
                deferred: vec![s],
                ..SituationBook::default()
            };
            let mut resolved = false;
            for quarter in 2..=5 {
                let (next, fates) = sweep_deferred(&book, quarter, &stream);
                book = next;
                if let Some(fate) = fates.first() {
                    match fate {
                        DeferredFate::Resurfaced(p) => {
                            assert_eq!(p.scheduled_quarter, quarter);
                            assert_eq!(p.quarters_waiting(), 0);
                            assert_eq!(book.pending.len(), 1);
                        }
                        DeferredFate::Faded(_) => assert_eq!(quarter, 5),
                    }
                    resolved = true;
                    break;
                }
            }
            assert!(resolved, "seed {seed} never resurfaced or faded");
            assert!(book.deferred.is_empty());
        }
    }

    #[test]
    fn test_random_crisis_draws_only_high_severity() {
        let defs = vec![
            definition("coffee_shortage", 1),
            definition("regulator_raid", 4),
            definition("ceo_scandal", 5),
        ];
        let stream = RandomStream::new(12);
        let mut hits = 0;
        for quarter in 0..300 {
            if let Some(p) = draw_random_crisis(&defs, quarter, &stream) {
                assert_ne!(p.situation_id, "coffee_shortage");
                assert_eq!(p.origin, SituationOrigin::Random);
                hits += 1;
            }
        }
        assert!((60..=140).contains(&hits), "hits {hits}");
    }

    #[test]
    fn test_collect_due_keeps_future_items() {
        let book = SituationBook {
            pending: vec![
                PendingSituation::new("now", SituationOrigin::Random, 3, 0),
                PendingSituation::new("later", SituationOrigin::Random, 3, 2),
            ],
            ..SituationBook::default()
        };
        let (next, checks) = collect_due(&book, 3, &RandomStream::new(0));
        assert_eq!(checks, vec![DueCheck::Due(book.pending[0].clone())]);
        assert_eq!(next.due.len(), 1);
        assert_eq!(next.pending[0].situation_id, "later");
    }
    #[test]
    fn test_decay_roll_ignores_unrelated_pending_items() {
        let rumor = PendingSituation::new("rumor", SituationOrigin::Random, 1, 3);
        let other = PendingSituation::new(
            "other",
            SituationOrigin::Card {
                card_id: "memo".into(),
            },
            4,
            2,
        );
        for seed in 0..200u64 {
            let stream = RandomStream::new(seed);
            let alone = SituationBook {
                pending: vec![rumor.clone()],
                ..SituationBook::default()
            };
            let crowded = SituationBook {
                pending: vec![other.clone(), rumor.clone()],
                ..SituationBook::default()
            };
            let (_, a) = collect_due(&alone, 4, &stream);
            let (_, b) = collect_due(&crowded, 4, &stream);
            assert_eq!(a, b, "seed {seed}");
        }
    }

    #[test]
    fn test_resurface_roll_ignores_unrelated_deferrals() {
        let mut audit = PendingSituation::new("audit", SituationOrigin::Random, 1, 0);
        audit.defer_count = 1;
        audit.deferred_quarter = Some(1);
        let mut leak = PendingSituation::new("leak", SituationOrigin::Random, 2, 0);
        leak.defer_count = 1;
        leak.deferred_quarter = Some(2);
        for seed in 0..200u64 {
            let stream = RandomStream::new(seed);
            let alone = SituationBook {
                deferred: vec![audit.clone()],
                ..SituationBook::default()
            };
            let crowded = SituationBook {
                deferred: vec![leak.clone(), audit.clone()],
                ..SituationBook::default()
            };
            let (_, a) = sweep_deferred(&alone, 3, &stream);
            let (_, b) = sweep_deferred(&crowded, 3, &stream);
            let audit_fate = |fates: &[DeferredFate]| {
                fates
                    .iter()
                    .find(|f| match f {
                        DeferredFate::Resurfaced(p) | DeferredFate::Faded(p) => p.situation_id == "audit",
                    })
                    .cloned()
            };
            assert_eq!(audit_fate(&a[..]), audit_fate(&b[..]), "seed {seed}");
        }
    }

    #[test]
    fn test_roll_key_distinguishes_origin_and_deferral() {
        let random = PendingSituation::new("rumor", SituationOrigin::Random, 1, 1);
        let carded = PendingSituation::new(
            "rumor",
            SituationOrigin::Card {
                card_id: "memo".into(),
            },
            1,
            1,
        );
        assert_ne!(random.roll_key(), carded.roll_key());
        let mut deferred = random.clone();
        deferred.defer_count = 1;
        deferred.deferred_quarter = Some(2);
        assert_ne!(random.roll_key(), deferred.roll_key());
        assert_eq!(random.roll_key(), random.clone().roll_key());
    }
}
