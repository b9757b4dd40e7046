//! Quarter Engine: Player Choices
//!
//! Choices are pure data. They carry intent only and contain no
//! transition logic. The envelope adds the sequence number the engine
//! façade enforces and the quarter the choice was made in.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlayerChoice {
    /// Play cards from hand: three normally, one after a reorg.
    SelectProjects { card_ids: Vec<String> },
    /// Discard the hand and redraw. Once per quarter, Projects only.
    Reorg,
    RespondToCrisis {
        crisis_id: String,
        response_id: String,
    },
    RespondToSituation { response_id: String },
    DeferSituation,
    HoldBoardMeeting {
        #[serde(default)]
        influence: Option<String>,
    },
}

impl PlayerChoice {
    pub fn name(&self) -> &'static str {
        match self {
            PlayerChoice::SelectProjects { .. } => "select_projects",
            PlayerChoice::Reorg => "reorg",
            PlayerChoice::RespondToCrisis { .. } => "respond_to_crisis",
            PlayerChoice::RespondToSituation { .. } => "respond_to_situation",
            PlayerChoice::DeferSituation => "defer_situation",
            PlayerChoice::HoldBoardMeeting { .. } => "hold_board_meeting",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChoiceEnvelope {
    pub sequence: u64,
    pub quarter: u32,
    pub choice: PlayerChoice,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_choice_json_shape() {
        let choice = PlayerChoice::RespondToCrisis {
            crisis_id: "data_breach#1".into(),
            response_id: "forensics".into(),
        };
        let json = serde_json::to_string(&choice).unwrap();
        assert_eq!(
            json,
            r#"{"kind":"respond_to_crisis","crisis_id":"data_breach#1","response_id":"forensics"}"#
        );
        let back: PlayerChoice = serde_json::from_str(&json).unwrap();
        assert_eq!(back, choice);
    }

    #[test]
    fn test_board_meeting_influence_optional() {
        let choice: PlayerChoice = serde_json::from_str(r#"{"kind":"hold_board_meeting"}"#).unwrap();
        assert_eq!(choice, PlayerChoice::HoldBoardMeeting { influence: None });
        assert_eq!(choice.name(), "hold_board_meeting");
    }
}
