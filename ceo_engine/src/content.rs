//! Quarter Engine: Content Tables
//!
//! Static, behavior-free data supplied by the content collaborator: cards,
//! crisis and situation definitions, the trigger table, objectives and
//! influence packages. Validated once at load; after that an unresolved id
//! is an engine defect and surfaces as `ContentError`.

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::arithmetic::validate_id;
use crate::board::InfluencePackage;
use crate::crisis::CrisisDefinition;
use crate::domain::PlayableCard;
use crate::error::{ContentError, LoadError};
use crate::objectives::ObjectiveDefinition;
use crate::situation::{SituationDefinition, TriggerTable, MAX_SEVERITY};

pub const CONTENT_ENV_VAR: &str = "CEO_ENGINE_CONTENT";

/// Smallest deck that can satisfy a three-card selection.
pub const MIN_DECK_CARDS: usize = 3;

const BUILTIN_CONTENT: &str = include_str!("data/default_content.json");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContentTables {
    pub cards: Vec<PlayableCard>,
    pub crises: Vec<CrisisDefinition>,
    pub situations: Vec<SituationDefinition>,
    #[serde(default)]
    pub triggers: TriggerTable,
    #[serde(default)]
    pub objectives: Vec<ObjectiveDefinition>,
    #[serde(default)]
    pub influence_packages: Vec<InfluencePackage>,
}

impl ContentTables {
    // ── Loading ────────────────────────────────────────────────────

    pub fn from_json_str(data: &str) -> Result<Self, LoadError> {
        let tables: ContentTables = serde_json::from_str(data)?;
        tables.validate()?;
        Ok(tables)
    }

    pub fn from_path(path: &Path) -> Result<Self, LoadError> {
        let contents = fs::read_to_string(path).map_err(|source| LoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    /// The table compiled into the crate.
    pub fn builtin() -> Result<Self, LoadError> {
        Self::from_json_str(BUILTIN_CONTENT)
    }

    /// `CEO_ENGINE_CONTENT` when set, the built-in table otherwise. A broken
    /// override is an error, never a silent fall-back.
    pub fn load_from_env() -> Result<Self, LoadError> {
        match env::var(CONTENT_ENV_VAR).ok().map(PathBuf::from) {
            Some(path) => {
                tracing::info!(
                    target: "ceo_engine::content",
                    path = %path.display(),
                    "content.override"
                );
                Self::from_path(&path)
            }
            None => Self::builtin(),
        }
    }

    // ── Lookups ────────────────────────────────────────────────────

    pub fn card(&self, id: &str) -> Result<&PlayableCard, ContentError> {
        self.cards
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| ContentError::UnknownCard(id.to_string()))
    }

    pub fn crisis(&self, id: &str) -> Result<&CrisisDefinition, ContentError> {
        self.crises
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| ContentError::UnknownCrisis(id.to_string()))
    }

    pub fn situation(&self, id: &str) -> Result<&SituationDefinition, ContentError> {
        self.situations
            .iter()
            .find(|s| s.id == id)
            .ok_or_else(|| ContentError::UnknownSituation(id.to_string()))
    }

    pub fn objective(&self, id: &str) -> Result<&ObjectiveDefinition, ContentError> {
        self.objectives
            .iter()
            .find(|o| o.id == id)
            .ok_or_else(|| ContentError::UnknownObjective(id.to_string()))
    }

    /// Unknown packages are a player mistake, not a content defect.
    pub fn influence_package(&self, id: &str) -> Option<&InfluencePackage> {
        self.influence_packages.iter().find(|p| p.id == id)
    }

    /// Every physical card in the deck, copies expanded, in content order.
    pub fn deck_cards(&self) -> Vec<String> {
        self.cards
            .iter()
            .flat_map(|c| std::iter::repeat(c.id.clone()).take(c.copies as usize))
            .collect()
    }

    // ── Validation ─────────────────────────────────────────────────

    pub fn validate(&self) -> Result<(), ContentError> {
        unique_ids("card", self.cards.iter().map(|c| c.id.as_str()))?;
        unique_ids("crisis", self.crises.iter().map(|c| c.id.as_str()))?;
        unique_ids("situation", self.situations.iter().map(|s| s.id.as_str()))?;
        unique_ids("objective", self.objectives.iter().map(|o| o.id.as_str()))?;
        unique_ids(
            "influence_package",
            self.influence_packages.iter().map(|p| p.id.as_str()),
        )?;

        if self.objectives.is_empty() {
            return Err(ContentError::Invalid("objective pool is empty".into()));
        }

        let available = self.deck_cards().len();
        if available < MIN_DECK_CARDS {
            return Err(ContentError::InsufficientCards {
                needed: MIN_DECK_CARDS,
                available,
            });
        }

        for crisis in &self.crises {
            if crisis.severity == 0 {
                return Err(ContentError::Invalid(format!(
                    "crisis `{}` has severity 0",
                    crisis.id
                )));
            }
            check_responses("crisis", &crisis.id, crisis.responses.iter().map(|r| (r.id.as_str(), r.cost)))?;
            if let Some(side_effect) = &crisis.side_effect {
                self.situation(side_effect)?;
            }
        }

        for situation in &self.situations {
            if situation.severity == 0 || situation.severity > MAX_SEVERITY {
                return Err(ContentError::Invalid(format!(
                    "situation `{}` severity {} outside 1..={}",
                    situation.id, situation.severity, MAX_SEVERITY
                )));
            }
            check_responses(
                "situation",
                &situation.id,
                situation.responses.iter().map(|r| (r.id.as_str(), r.cost)),
            )?;
            if let Some(crisis_id) = &situation.crisis_id {
                self.crisis(crisis_id)?;
            }
        }

        for card_id in self.triggers.by_card.keys() {
            self.card(card_id)?;
        }
        for trigger in self.triggers.all() {
            self.situation(&trigger.situation_id)?;
        }

        for package in &self.influence_packages {
            if package.cost < 0 || package.backlash_chance > 100 {
                return Err(ContentError::Invalid(format!(
                    "influence package `{}` has cost {} / backlash chance {}",
                    package.id, package.cost, package.backlash_chance
                )));
            }
        }
        Ok(())
    }
}

fn unique_ids<'a>(
    table: &'static str,
    ids: impl Iterator<Item = &'a str>,
) -> Result<(), ContentError> {
    let mut seen = BTreeSet::new();
    for id in ids {
        validate_id(id)?;
        if !seen.insert(id) {
            return Err(ContentError::DuplicateId {
                table,
                id: id.to_string(),
            });
        }
    }
    Ok(())
}

/// Responses need unique ids and at least one free option, so a player with
/// no capital can always answer.
fn check_responses<'a>(
    table: &'static str,
    owner: &str,
    responses: impl Iterator<Item = (&'a str, i32)>,
) -> Result<(), ContentError> {
    let mut seen = BTreeSet::new();
    let mut has_free = false;
    for (id, cost) in responses {
        validate_id(id)?;
        if !seen.insert(id) {
            return Err(ContentError::DuplicateId {
                table,
                id: format!("{owner}/{id}"),
            });
        }
        if cost < 0 {
            return Err(ContentError::Invalid(format!(
                "{table} `{owner}` response `{id}` has negative cost"
            )));
        }
        has_free |= cost == 0;
    }
    if !has_free {
        return Err(ContentError::Invalid(format!(
            "{table} `{owner}` has no zero-cost response"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_content_is_valid() {
        let content = ContentTables::builtin().unwrap();
        assert!(content.deck_cards().len() >= 10);
        assert!(content.objectives.len() >= 3);
        assert!(content
            .situations
            .iter()
            .any(|s| s.severity >= crate::situation::CRISIS_TIER_SEVERITY));
        assert!(content.situations.iter().any(|s| s.severity == MAX_SEVERITY));
    }

    #[test]
    fn test_copies_expand_deck() {
        let content = ContentTables::builtin().unwrap();
        let expected: usize = content.cards.iter().map(|c| c.copies as usize).sum();
        assert_eq!(content.deck_cards().len(), expected);
    }

    #[test]
    fn test_unresolved_trigger_rejected() {
        let mut content = ContentTables::builtin().unwrap();
        content.triggers.fallback.push(crate::situation::SituationTrigger {
            situation_id: "ghost_situation".into(),
            tier: Default::default(),
            weight: 1,
        });
        assert_eq!(
            content.validate(),
            Err(ContentError::UnknownSituation("ghost_situation".into()))
        );
    }

    #[test]
    fn test_duplicate_card_rejected() {
        let mut content = ContentTables::builtin().unwrap();
        let dup = content.cards[0].clone();
        content.cards.push(dup);
        assert!(matches!(
            content.validate(),
            Err(ContentError::DuplicateId { table: "card", .. })
        ));
    }

    #[test]
    fn test_tiny_deck_rejected() {
        let mut content = ContentTables::builtin().unwrap();
        content.triggers.by_card.clear();
        content.cards.truncate(1);
        content.cards[0].copies = 2;
        assert_eq!(
            content.validate(),
            Err(ContentError::InsufficientCards {
                needed: 3,
                available: 2
            })
        );
    }

    #[test]
    fn test_empty_objective_pool_rejected() {
        let mut content = ContentTables::builtin().unwrap();
        content.objectives.clear();
        assert!(matches!(content.validate(), Err(ContentError::Invalid(_))));
    }

    #[test]
    fn test_lookup_errors_are_misconfiguration() {
        let content = ContentTables::builtin().unwrap();
        assert_eq!(
            content.situation("nope"),
            Err(ContentError::UnknownSituation("nope".into()))
        );
        assert!(content.influence_package("nope").is_none());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = ContentTables::from_json_str(r#"{"cards":[],"crises":[],"situations":[],"extra":1}"#);
        assert!(matches!(err, Err(LoadError::Parse(_))));
    }
}
