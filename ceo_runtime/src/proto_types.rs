//! Hand-written protobuf types for the choice log.
//!
//! Uses prost derive macros for encode/decode without prost-build.
//! Field numbers are part of the on-disk format and never change.
//!
//! ```text
//! message ChoiceEnvelope {
//!   uint64 sequence = 1;
//!   uint32 quarter  = 2;
//!   Choice choice   = 3;
//! }
//! message Choice {
//!   oneof kind {
//!     SelectProjects     select_projects      = 1;
//!     Reorg              reorg                = 2;
//!     RespondToCrisis    respond_to_crisis    = 3;
//!     RespondToSituation respond_to_situation = 4;
//!     DeferSituation     defer_situation      = 5;
//!     HoldBoardMeeting   hold_board_meeting   = 6;
//!   }
//! }
//! ```

use prost::Message;

// ── Envelope ───────────────────────────────────────────────────

#[derive(Clone, PartialEq, Message)]
pub struct ProtoChoiceEnvelope {
    #[prost(uint64, tag = "1")]
    pub sequence: u64,
    #[prost(uint32, tag = "2")]
    pub quarter: u32,
    #[prost(message, optional, tag = "3")]
    pub choice: Option<ProtoChoice>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ProtoChoice {
    #[prost(oneof = "ChoiceKind", tags = "1, 2, 3, 4, 5, 6")]
    pub kind: Option<ChoiceKind>,
}

#[derive(Clone, PartialEq, prost::Oneof)]
pub enum ChoiceKind {
    #[prost(message, tag = "1")]
    SelectProjects(SelectProjects),
    #[prost(message, tag = "2")]
    Reorg(Reorg),
    #[prost(message, tag = "3")]
    RespondToCrisis(RespondToCrisis),
    #[prost(message, tag = "4")]
    RespondToSituation(RespondToSituation),
    #[prost(message, tag = "5")]
    DeferSituation(DeferSituation),
    #[prost(message, tag = "6")]
    HoldBoardMeeting(HoldBoardMeeting),
}

// ── Choices ────────────────────────────────────────────────────

#[derive(Clone, PartialEq, Message)]
pub struct SelectProjects {
    #[prost(string, repeated, tag = "1")]
    pub card_ids: Vec<String>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Reorg {}

#[derive(Clone, PartialEq, Message)]
pub struct RespondToCrisis {
    #[prost(string, tag = "1")]
    pub crisis_id: String,
    #[prost(string, tag = "2")]
    pub response_id: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct RespondToSituation {
    #[prost(string, tag = "1")]
    pub response_id: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct DeferSituation {}

#[derive(Clone, PartialEq, Message)]
pub struct HoldBoardMeeting {
    #[prost(string, optional, tag = "1")]
    pub influence: Option<String>,
}
