//! Quarter Engine: Phase Transitions
//!
//! Every state change lives here. Each operation takes the current state,
//! a player choice and the game's random stream, and returns a new state
//! plus the log entries it produced. The input state is never touched:
//! operations work on a clone and every fallible check runs before the
//! clone is returned, so a rejected choice leaves nothing behind.
//!
//! Quarter flow:
//!   Projects      select 3 cards (or reorg, then select 1); crisis
//!                 responses allowed
//!   Situation     one due situation per call; skipped when none is due;
//!                 crisis responses allowed
//!   Board Meeting deadlines, ongoing impacts, review, employment
//!                 decision, profit and capital, then next quarter or end

use std::collections::BTreeSet;

use crate::arithmetic::{ceil_div, checked_add, checked_mul};
use crate::board::{
    backlash_triggered, decide_employment, golden_parachute, score_quarter, Backlash,
    BoardDecision, BoardReview, InfluencePackage, Rating,
};
use crate::content::ContentTables;
use crate::crisis::{self, resolve_crisis_response, resolve_dice, CrisisInstance, CrisisStatus};
use crate::domain::{CardCategory, Effect, OutcomeTier, ResourceState};
use crate::error::{EngineError, InputError};
use crate::events::PlayerChoice;
use crate::log::{EventCode, Journal, LogEntry};
use crate::objectives::{detect_loss, evaluate_objectives, verdict, FinalPosition};
use crate::outcome::resolve_card_outcome;
use crate::rng::{Purpose, RandomStream};
use crate::situation::{
    collect_due, draw_random_crisis, roll_trigger, sweep_deferred, DeferredFate, DueCheck,
    PendingSituation, SituationOrigin,
};
use crate::state::{Ending, GameOutcome, GameState, Phase};

/// Fine charged per severity point when a crisis escalates.
pub const ESCALATION_FINE_PER_SEVERITY: i64 = 5;
/// Impact multiplier for a crisis that blows its deadline.
pub const EXPIRY_IMPACT_FACTOR: i32 = 2;

/// A new state and what happened on the way there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub state: GameState,
    pub log: Vec<LogEntry>,
}

// ---------------------------------------------------------------------------
// Public dispatcher
// ---------------------------------------------------------------------------

pub fn apply_choice(
    state: &GameState,
    choice: &PlayerChoice,
    content: &ContentTables,
    stream: &RandomStream,
) -> Result<Transition, EngineError> {
    match choice {
        PlayerChoice::SelectProjects { card_ids } => {
            select_projects(state, card_ids, content, stream)
        }
        PlayerChoice::Reorg => reorg(state, stream),
        PlayerChoice::RespondToCrisis {
            crisis_id,
            response_id,
        } => respond_to_crisis(state, crisis_id, response_id, content, stream),
        PlayerChoice::RespondToSituation { response_id } => {
            respond_to_situation(state, response_id, content, stream)
        }
        PlayerChoice::DeferSituation => defer_situation(state, content, stream),
        PlayerChoice::HoldBoardMeeting { influence } => {
            resolve_board_meeting(state, influence.as_deref(), content, stream)
        }
    }
}

// ---------------------------------------------------------------------------
// Guards
// ---------------------------------------------------------------------------

fn guard(
    state: &GameState,
    stream: &RandomStream,
    operation: &'static str,
    allowed: &[Phase],
) -> Result<(), EngineError> {
    if state.is_over() {
        return Err(InputError::GameOver.into());
    }
    if state.seed != stream.seed() {
        return Err(InputError::SeedMismatch {
            state: state.seed,
            stream: stream.seed(),
        }
        .into());
    }
    if !allowed.contains(&state.phase()) {
        return Err(InputError::WrongPhase {
            operation,
            phase: state.phase(),
        }
        .into());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Projects
// ---------------------------------------------------------------------------

/// Play the selected cards in order, then open the Situation phase.
pub fn select_projects(
    state: &GameState,
    card_ids: &[String],
    content: &ContentTables,
    stream: &RandomStream,
) -> Result<Transition, EngineError> {
    guard(state, stream, "select_projects", &[Phase::Projects])?;

    let expected = state.turn.required_selection();
    if card_ids.len() != expected {
        return Err(InputError::SelectionCount {
            expected,
            actual: card_ids.len(),
        }
        .into());
    }
    let mut seen = BTreeSet::new();
    for id in card_ids {
        if !seen.insert(id.as_str()) {
            return Err(InputError::DuplicateCard(id.clone()).into());
        }
        if !state.hand.contains(id) {
            return Err(InputError::CardNotInHand(id.clone()).into());
        }
    }

    let quarter = state.quarter();
    let pressure = state.config.pressure;
    let mut next = state.clone();
    let mut journal = Journal::new(quarter, Phase::Projects);

    for (slot, card_id) in card_ids.iter().enumerate() {
        let card = content.card(card_id)?;
        let mut rng = stream.fork(quarter, Purpose::CardOutcome, &format!("{slot}:{card_id}"));
        let outcome = resolve_card_outcome(card, &next.org, pressure, next.ceo.evil_score, &mut rng);
        journal.outcome(card_id, outcome.tier);

        apply_effects(&mut next, card.outcomes.for_tier(outcome.tier), &mut journal);

        if card.category == CardCategory::Corporate && card.corporate_intensity > 0 {
            let intensity = card.corporate_intensity as i32;
            let favorability = if outcome.tier == OutcomeTier::Bad {
                -intensity
            } else {
                ceil_div(intensity, 2)
            };
            next.ceo = next
                .ceo
                .with_evil_delta(intensity)
                .with_favorability_delta(favorability);
            journal.event(
                EventCode::CorporateConduct,
                format!("{card_id}: evil +{intensity}, favorability {favorability:+}"),
            );
        }
        next.ceo = next.ceo.with_card_played();

        if let Some(pending) =
            roll_trigger(&content.triggers, card_id, outcome.tier, quarter, slot, stream)
        {
            content.situation(&pending.situation_id)?;
            journal.event(
                EventCode::SituationQueued,
                format!(
                    "{} from {card_id}, due quarter {}",
                    pending.situation_id, pending.scheduled_quarter
                ),
            );
            next.situations = next.situations.scheduled(pending);
        }
    }

    for id in card_ids {
        if let Some(pos) = next.hand.iter().position(|h| h == id) {
            next.hand.remove(pos);
        }
    }
    next.deck = next.deck.discard_multiple(card_ids);
    next.turn.selected_projects = card_ids.to_vec();

    enter_situation_phase(&mut next, content, stream, &mut journal)?;
    Ok(Transition {
        state: next,
        log: journal.into_entries(),
    })
}

/// Discard the hand, draw a fresh one, and drop the selection to one card.
pub fn reorg(state: &GameState, stream: &RandomStream) -> Result<Transition, EngineError> {
    guard(state, stream, "reorg", &[Phase::Projects])?;
    let quarter = state.quarter();
    if state.turn.reorg_used {
        return Err(InputError::ReorgAlreadyUsed(quarter).into());
    }

    let mut next = state.clone();
    let mut journal = Journal::new(quarter, Phase::Projects);
    let mut rng = stream.fork(quarter, Purpose::Deal, "reorg");
    let deck = next.deck.discard_multiple(&next.hand);
    let (hand, deck) = deck.draw_many(next.config.hand_size, &mut rng)?;

    journal.event(
        EventCode::Reorg,
        format!("discarded {} card(s)", next.hand.len()),
    );
    journal.event(EventCode::HandDealt, hand.join(","));
    next.deck = deck;
    next.hand = hand;
    next.turn.reorg_used = true;

    tracing::info!(target: "ceo_engine::transitions", quarter, "projects.reorg");
    Ok(Transition {
        state: next,
        log: journal.into_entries(),
    })
}

fn apply_effects(next: &mut GameState, effects: &[Effect], journal: &mut Journal) {
    let before = next.org.clone();
    for effect in effects {
        match effect {
            Effect::Meter { meter, delta } => {
                next.org = next.org.with_meter_change(*meter, *delta);
            }
            Effect::Profit { amount } => {
                next.turn.profit = checked_add(next.turn.profit, *amount);
            }
            Effect::Fine { amount } => {
                next.turn.fines = checked_add(next.turn.fines, *amount);
            }
        }
    }
    journal.meter_changes(&before, &next.org);
}

/// Age deferrals, draw the random crisis-tier situation, then run every
/// situation scheduled for this quarter through its decay roll. Skips
/// straight to the Board Meeting when nothing is due.
fn enter_situation_phase(
    next: &mut GameState,
    content: &ContentTables,
    stream: &RandomStream,
    journal: &mut Journal,
) -> Result<(), EngineError> {
    let quarter = next.quarter();

    let (book, fates) = sweep_deferred(&next.situations, quarter, stream);
    for fate in fates {
        match fate {
            DeferredFate::Resurfaced(s) => journal.event(
                EventCode::SituationResurfaced,
                format!("{} (deferred {}x)", s.situation_id, s.defer_count),
            ),
            DeferredFate::Faded(s) => journal.event(EventCode::SituationFaded, s.situation_id),
        }
    }

    let book = match draw_random_crisis(&content.situations, quarter, stream) {
        Some(pending) => {
            journal.event(EventCode::RandomCrisisDrawn, pending.situation_id.clone());
            book.scheduled(pending)
        }
        None => book,
    };

    let (book, checks) = collect_due(&book, quarter, stream);
    for check in checks {
        match check {
            DueCheck::Due(s) => {
                content.situation(&s.situation_id)?;
                journal.event(EventCode::SituationDue, s.situation_id);
            }
            DueCheck::Fizzled(s) => journal.event(EventCode::SituationFizzled, s.situation_id),
        }
    }
    next.situations = book;

    advance_within_situation(next);
    tracing::info!(
        target: "ceo_engine::transitions",
        quarter,
        phase = %next.phase(),
        due = next.situations.due.len(),
        "phase.entered"
    );
    Ok(())
}

/// Point at the next due situation, or move on to the Board Meeting.
fn advance_within_situation(next: &mut GameState) {
    match next.situations.head() {
        Some(head) => {
            next.turn.active_situation = Some(head.situation_id.clone());
            next.turn.phase = Phase::Situation;
        }
        None => {
            next.turn.active_situation = None;
            next.turn.phase = Phase::BoardMeeting;
        }
    }
}

// ---------------------------------------------------------------------------
// Crises
// ---------------------------------------------------------------------------

/// Pay for a response to an active crisis and roll it. Does not advance
/// the phase.
pub fn respond_to_crisis(
    state: &GameState,
    crisis_id: &str,
    response_id: &str,
    content: &ContentTables,
    stream: &RandomStream,
) -> Result<Transition, EngineError> {
    guard(
        state,
        stream,
        "respond_to_crisis",
        &[Phase::Projects, Phase::Situation],
    )?;
    let crisis = crisis::find(&state.crises, crisis_id)
        .filter(|c| c.is_active())
        .ok_or_else(|| InputError::UnknownCrisis(crisis_id.to_string()))?;
    let definition = content.crisis(&crisis.definition_id)?;
    let response = definition
        .response(response_id)
        .ok_or_else(|| InputError::UnknownResponse {
            target_id: crisis_id.to_string(),
            response_id: response_id.to_string(),
        })?;
    let resources = state.resources.spend(response.cost)?;

    let quarter = state.quarter();
    let mut next = state.clone();
    let mut journal = Journal::new(quarter, state.phase());
    next.resources = resources;
    if response.cost > 0 {
        journal.event(
            EventCode::CapitalSpent,
            format!("{} on {crisis_id}/{response_id}", response.cost),
        );
    }

    let resolution = resolve_crisis_response(
        crisis,
        definition,
        response,
        &next.org,
        stream,
        quarter,
        next.turn.crisis_responses,
    );
    next.turn.crisis_responses += 1;
    journal.outcome(crisis_id, resolution.tier);
    journal.event(
        EventCode::CrisisResponded,
        format!(
            "{crisis_id}/{response_id}: rolled {} -> {}{}, staff {:?}",
            resolution.dice.roll.total(),
            resolution.dice.modified_roll,
            if resolution.downgraded { " (downgraded)" } else { "" },
            resolution.staff
        ),
    );

    if resolution.crisis.status == CrisisStatus::Escalated {
        escalate(&mut next, &resolution.crisis, &mut journal);
    }
    next.crises = crisis::replace(&next.crises, &resolution.crisis);

    if let Some(situation_id) = &resolution.side_effect {
        content.situation(situation_id)?;
        let origin = SituationOrigin::SideEffect {
            crisis_id: crisis_id.to_string(),
        };
        next.situations = next
            .situations
            .scheduled(PendingSituation::new(situation_id, origin, quarter, 0));
        journal.event(
            EventCode::SideEffectQueued,
            format!("{situation_id} after inept handling of {crisis_id}"),
        );
    }

    Ok(Transition {
        state: next,
        log: journal.into_entries(),
    })
}

/// Escalation lands immediately: one round of impact plus a fine.
fn escalate(next: &mut GameState, crisis: &CrisisInstance, journal: &mut Journal) {
    let before = next.org.clone();
    next.org = next.org.with_impacts(&crisis.impact, 1);
    let fine = checked_mul(ESCALATION_FINE_PER_SEVERITY, crisis.severity as i64);
    next.turn.fines = checked_add(next.turn.fines, fine);
    journal.event(
        EventCode::CrisisEscalated,
        format!("{} to severity {}, fined {fine}", crisis.id, crisis.severity),
    );
    journal.meter_changes(&before, &next.org);
}

fn spawn_crisis(
    next: &mut GameState,
    content: &ContentTables,
    definition_id: &str,
    journal: &mut Journal,
) -> Result<(), EngineError> {
    let definition = content.crisis(definition_id)?;
    let instance_id = format!("{}#{}", definition.id, next.next_crisis_serial);
    next.next_crisis_serial += 1;
    let instance = CrisisInstance::from_definition(definition, instance_id, next.quarter());
    journal.event(
        EventCode::CrisisSpawned,
        format!(
            "{} severity {}, deadline quarter {}",
            instance.id, instance.severity, instance.deadline_turn
        ),
    );
    next.crises.push(instance);
    Ok(())
}

// ---------------------------------------------------------------------------
// Situation
// ---------------------------------------------------------------------------

/// Answer the situation at the head of the due queue.
pub fn respond_to_situation(
    state: &GameState,
    response_id: &str,
    content: &ContentTables,
    stream: &RandomStream,
) -> Result<Transition, EngineError> {
    guard(state, stream, "respond_to_situation", &[Phase::Situation])?;
    let head = state
        .situations
        .head()
        .ok_or(InputError::NoActiveSituation)?;
    let definition = content.situation(&head.situation_id)?;
    let response = definition
        .response(response_id)
        .ok_or_else(|| InputError::UnknownResponse {
            target_id: head.situation_id.clone(),
            response_id: response_id.to_string(),
        })?;
    let resources: ResourceState = state.resources.spend(response.cost)?;

    let quarter = state.quarter();
    let mut next = state.clone();
    let mut journal = Journal::new(quarter, Phase::Situation);
    next.resources = resources;

    let severity = head.effective_severity(definition.severity);
    let context = format!(
        "{}:{}:{}",
        state.turn.situations_resolved, head.situation_id, response_id
    );
    let roll = stream
        .fork(quarter, Purpose::SituationRoll, &context)
        .roll_2d6();
    let dice = resolve_dice(roll, response.mitigation_bonus, &next.org, severity);
    tracing::debug!(
        target: "ceo_engine::transitions",
        situation = %head.situation_id,
        response = response_id,
        severity,
        modified = dice.modified_roll,
        tier = %dice.tier,
        "situation.resolved"
    );

    journal.outcome(&head.situation_id, dice.tier);
    apply_effects(&mut next, response.outcomes.for_tier(dice.tier), &mut journal);
    if dice.tier == OutcomeTier::Bad {
        if let Some(crisis_id) = &definition.crisis_id {
            spawn_crisis(&mut next, content, crisis_id, &mut journal)?;
        }
    }
    journal.event(
        EventCode::SituationResolved,
        format!("{} via {response_id} at severity {severity}", head.situation_id),
    );

    next.situations = next.situations.without_head();
    next.turn.situations_resolved += 1;
    advance_within_situation(&mut next);
    Ok(Transition {
        state: next,
        log: journal.into_entries(),
    })
}

/// Push the head situation into the deferred list. Illegal at max severity.
pub fn defer_situation(
    state: &GameState,
    content: &ContentTables,
    stream: &RandomStream,
) -> Result<Transition, EngineError> {
    guard(state, stream, "defer_situation", &[Phase::Situation])?;
    let head = state
        .situations
        .head()
        .ok_or(InputError::NoActiveSituation)?;
    let definition = content.situation(&head.situation_id)?;
    if !head.is_deferrable(definition.severity) {
        return Err(InputError::NotDeferrable {
            situation_id: head.situation_id.clone(),
            severity: head.effective_severity(definition.severity),
        }
        .into());
    }

    let quarter = state.quarter();
    let mut next = state.clone();
    let mut journal = Journal::new(quarter, Phase::Situation);
    journal.event(
        EventCode::SituationDeferred,
        format!("{} (deferral {})", head.situation_id, head.defer_count + 1),
    );
    next.situations = next.situations.with_head_deferred(quarter);
    advance_within_situation(&mut next);
    Ok(Transition {
        state: next,
        log: journal.into_entries(),
    })
}

// ---------------------------------------------------------------------------
// Board Meeting
// ---------------------------------------------------------------------------

/// Close the quarter: crisis upkeep, review, employment decision, books,
/// then either the next quarter or the end of the game.
pub fn resolve_board_meeting(
    state: &GameState,
    influence: Option<&str>,
    content: &ContentTables,
    stream: &RandomStream,
) -> Result<Transition, EngineError> {
    guard(state, stream, "hold_board_meeting", &[Phase::BoardMeeting])?;
    let package: Option<&InfluencePackage> = match influence {
        Some(id) => Some(
            content
                .influence_package(id)
                .ok_or_else(|| InputError::UnknownInfluencePackage(id.to_string()))?,
        ),
        None => None,
    };
    let resources = match package {
        Some(p) => state.resources.spend(p.cost)?,
        None => state.resources.clone(),
    };

    let quarter = state.quarter();
    let mut next = state.clone();
    let mut journal = Journal::new(quarter, Phase::BoardMeeting);
    next.resources = resources;
    if let Some(p) = package {
        journal.event(
            EventCode::InfluencePurchased,
            format!("{} for {} capital", p.id, p.cost),
        );
    }

    // -- crisis upkeep --
    let before = next.org.clone();
    let (crises, expired) = crisis::process_deadlines(&next.crises, quarter);
    for crisis in &expired {
        next.org = next.org.with_impacts(&crisis.impact, EXPIRY_IMPACT_FACTOR);
        journal.event(EventCode::CrisisExpired, crisis.id.clone());
    }
    for crisis in crises.iter().filter(|c| c.is_active()) {
        next.org = next.org.with_impacts(&crisis.impact, 1);
        journal.event(EventCode::CrisisImpact, crisis.id.clone());
    }
    next.crises = crisis::cleanup(&crises);
    journal.meter_changes(&before, &next.org);

    // -- backlash from earlier influence --
    let (due, later): (Vec<Backlash>, Vec<Backlash>) = next
        .backlash
        .iter()
        .cloned()
        .partition(|b| b.due_quarter <= quarter);
    for b in &due {
        next.ceo = next.ceo.with_favorability_delta(-b.favorability_penalty);
        journal.event(
            EventCode::BacklashApplied,
            format!("{}: favorability -{}", b.package_id, b.favorability_penalty),
        );
    }
    next.backlash = later;

    // -- review --
    let net_profit = next.turn.net_profit();
    let breakdown = score_quarter(
        net_profit,
        &next.org,
        next.ceo.board_favorability,
        next.config.pressure,
        package,
    );
    let rating = Rating::from_score(breakdown.score);

    let mut backlash_scheduled = false;
    if let Some(p) = package {
        if backlash_triggered(next.seed, quarter, p) {
            backlash_scheduled = true;
            next.backlash.push(Backlash {
                package_id: p.id.clone(),
                due_quarter: quarter + 1,
                favorability_penalty: p.backlash_penalty,
            });
            journal.event(EventCode::BacklashScheduled, p.id.clone());
        }
    }

    let (decision, streak) = decide_employment(
        rating,
        breakdown.score,
        next.turn.poor_quarter_streak,
        stream,
        quarter,
    );
    next.turn.poor_quarter_streak = streak;

    // -- books --
    next.ceo = next.ceo.with_quarter_result(net_profit).with_tenure_increment();
    journal.event(
        EventCode::ProfitBooked,
        format!(
            "gross {} fines {} net {net_profit}",
            next.turn.profit, next.turn.fines
        ),
    );
    let accrual = ResourceState::accrual_for(&next.org);
    next.resources = next.resources.earn(accrual);
    journal.event(EventCode::CapitalEarned, accrual.to_string());

    journal.event(
        EventCode::BoardReview,
        format!("score {} rating {rating}", breakdown.score),
    );
    tracing::info!(
        target: "ceo_engine::transitions",
        quarter,
        score = breakdown.score,
        %rating,
        streak,
        terminated = decision.is_termination(),
        "board.reviewed"
    );

    next.last_review = Some(BoardReview {
        quarter,
        gross_profit: next.turn.profit,
        fines: next.turn.fines,
        net_profit,
        breakdown,
        rating,
        decision: decision.clone(),
        poor_streak: streak,
        influence: package.map(|p| p.id.clone()),
        backlash_scheduled,
    });

    // -- branch --
    let ending = match decision {
        BoardDecision::Terminate { reason } => {
            let parachute = golden_parachute(&next.ceo, &next.resources);
            next.ceo = next.ceo.ousted(parachute);
            journal.event(
                EventCode::Terminated,
                format!("{reason:?}, parachute {parachute}"),
            );
            Some(Ending::Terminated { reason, parachute })
        }
        BoardDecision::Retain => {
            journal.event(EventCode::Retained, format!("rating {rating}"));
            if let Some(meter) = next.org.depleted() {
                Some(Ending::Collapsed { meter })
            } else if quarter >= next.config.max_quarters {
                Some(Ending::Completed)
            } else {
                None
            }
        }
    };

    match ending {
        Some(ending) => finish_game(&mut next, ending, content, &mut journal)?,
        None => start_next_quarter(&mut next, stream, &mut journal)?,
    }
    Ok(Transition {
        state: next,
        log: journal.into_entries(),
    })
}

fn start_next_quarter(
    next: &mut GameState,
    stream: &RandomStream,
    journal: &mut Journal,
) -> Result<(), EngineError> {
    next.turn = next.turn.next_quarter();
    let missing = next.config.hand_size.saturating_sub(next.hand.len());
    let mut rng = stream.fork(next.quarter(), Purpose::Deal, "refill");
    let (drawn, deck) = next.deck.draw_many(missing, &mut rng)?;
    journal.event(EventCode::HandDealt, drawn.join(","));
    next.deck = deck;
    next.hand.extend(drawn);
    Ok(())
}

/// Evaluate objectives once and seal the game.
fn finish_game(
    next: &mut GameState,
    ending: Ending,
    content: &ContentTables,
    journal: &mut Journal,
) -> Result<(), EngineError> {
    let definitions = next
        .objectives
        .iter()
        .map(|id| content.objective(id))
        .collect::<Result<Vec<_>, _>>()?;
    let position = FinalPosition {
        org: &next.org,
        ceo: &next.ceo,
        resources: &next.resources,
    };
    let results = evaluate_objectives(&definitions, &position);
    let loss = detect_loss(&position);
    let required = next.config.required_objectives(definitions.len());
    let verdict = verdict(results, required, loss);

    journal.event(
        EventCode::GameOver,
        format!(
            "{}/{} objectives, won: {}",
            verdict.passed, verdict.required, verdict.is_won
        ),
    );
    tracing::info!(
        target: "ceo_engine::transitions",
        quarter = next.quarter(),
        ending = ?ending,
        passed = verdict.passed,
        won = verdict.is_won,
        "game.over"
    );
    next.outcome = Some(GameOutcome {
        quarter: next.quarter(),
        ending,
        verdict,
    });
    Ok(())
}
