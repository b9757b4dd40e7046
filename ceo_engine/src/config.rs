//! Quarter Engine: Configuration
//!
//! Difficulty and game-length knobs. Loaded from JSON; an override path
//! comes from `CEO_ENGINE_CONFIG`, and a broken override falls back to the
//! built-in defaults with a warning.

use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ContentError, LoadError};

pub const CONFIG_ENV_VAR: &str = "CEO_ENGINE_CONFIG";

/// Difficulty scaling: raises the profit bar and tilts card outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PressureLevel {
    Low,
    #[default]
    Normal,
    High,
    Brutal,
}

impl PressureLevel {
    /// Numeric level, 0 (Low) through 3 (Brutal).
    pub fn level(self) -> i32 {
        match self {
            PressureLevel::Low => 0,
            PressureLevel::Normal => 1,
            PressureLevel::High => 2,
            PressureLevel::Brutal => 3,
        }
    }

    /// Net quarterly profit the board expects.
    pub fn profit_target(self) -> i64 {
        match self {
            PressureLevel::Low => 50,
            PressureLevel::Normal => 100,
            PressureLevel::High => 150,
            PressureLevel::Brutal => 200,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PressureLevel::Low => "low",
            PressureLevel::Normal => "normal",
            PressureLevel::High => "high",
            PressureLevel::Brutal => "brutal",
        }
    }
}

impl fmt::Display for PressureLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    #[serde(default)]
    pub pressure: PressureLevel,
    #[serde(default = "default_max_quarters")]
    pub max_quarters: u32,
    #[serde(default = "default_hand_size")]
    pub hand_size: usize,
    #[serde(default = "default_starting_meter")]
    pub starting_meter: i32,
    #[serde(default = "default_starting_capital")]
    pub starting_capital: i32,
    #[serde(default = "default_objective_count")]
    pub objective_count: usize,
    /// Objectives that must pass to win. `None` means a strict majority.
    #[serde(default)]
    pub objectives_required: Option<usize>,
}

fn default_max_quarters() -> u32 {
    12
}

fn default_hand_size() -> usize {
    5
}

fn default_starting_meter() -> i32 {
    50
}

fn default_starting_capital() -> i32 {
    10
}

fn default_objective_count() -> usize {
    3
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pressure: PressureLevel::default(),
            max_quarters: default_max_quarters(),
            hand_size: default_hand_size(),
            starting_meter: default_starting_meter(),
            starting_capital: default_starting_capital(),
            objective_count: default_objective_count(),
            objectives_required: None,
        }
    }
}

impl EngineConfig {
    /// Objectives needed for a win out of `drawn`. Never more than were
    /// drawn, on either path.
    pub fn required_objectives(&self, drawn: usize) -> usize {
        let wanted = self.objectives_required.unwrap_or(drawn / 2 + 1);
        wanted.min(drawn)
    }

    pub fn validate(&self) -> Result<(), ContentError> {
        if self.max_quarters == 0 {
            return Err(ContentError::Invalid("max_quarters must be at least 1".into()));
        }
        if self.hand_size < 3 {
            return Err(ContentError::Invalid(format!(
                "hand_size {} cannot hold a three-card selection",
                self.hand_size
            )));
        }
        if !(0..=100).contains(&self.starting_meter) {
            return Err(ContentError::Invalid(format!(
                "starting_meter {} outside [0,100]",
                self.starting_meter
            )));
        }
        if self.starting_capital < 0 {
            return Err(ContentError::Invalid("starting_capital must be non-negative".into()));
        }
        if self.objective_count == 0 {
            return Err(ContentError::Invalid("objective_count must be at least 1".into()));
        }
        Ok(())
    }

    pub fn from_json_str(data: &str) -> Result<Self, LoadError> {
        let config: EngineConfig = serde_json::from_str(data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, LoadError> {
        let contents = fs::read_to_string(path).map_err(|source| LoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    /// Config from `CEO_ENGINE_CONFIG` when set and valid, defaults otherwise.
    pub fn load_from_env() -> Self {
        let Some(path) = env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from) else {
            return Self::default();
        };
        match Self::from_path(&path) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(
                    target: "ceo_engine::config",
                    path = %path.display(),
                    error = %err,
                    "config.load_failed"
                );
                Self::default()
            }
        }
    }
}
