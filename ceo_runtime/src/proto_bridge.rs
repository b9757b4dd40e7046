//! Proto ↔ kernel conversion for choice envelopes.
//!
//! Encoding is total. Decoding fails only when the oneof payload is
//! missing, which means the frame came from a newer or broken writer.

use ceo_engine::events::{ChoiceEnvelope, PlayerChoice};

use crate::error::RuntimeError;
use crate::proto_types::*;

pub fn choice_to_proto(envelope: &ChoiceEnvelope) -> ProtoChoiceEnvelope {
    let kind = match &envelope.choice {
        PlayerChoice::SelectProjects { card_ids } => ChoiceKind::SelectProjects(SelectProjects {
            card_ids: card_ids.clone(),
        }),
        PlayerChoice::Reorg => ChoiceKind::Reorg(Reorg {}),
        PlayerChoice::RespondToCrisis {
            crisis_id,
            response_id,
        } => ChoiceKind::RespondToCrisis(RespondToCrisis {
            crisis_id: crisis_id.clone(),
            response_id: response_id.clone(),
        }),
        PlayerChoice::RespondToSituation { response_id } => {
            ChoiceKind::RespondToSituation(RespondToSituation {
                response_id: response_id.clone(),
            })
        }
        PlayerChoice::DeferSituation => ChoiceKind::DeferSituation(DeferSituation {}),
        PlayerChoice::HoldBoardMeeting { influence } => {
            ChoiceKind::HoldBoardMeeting(HoldBoardMeeting {
                influence: influence.clone(),
            })
        }
    };

    ProtoChoiceEnvelope {
        sequence: envelope.sequence,
        quarter: envelope.quarter,
        choice: Some(ProtoChoice { kind: Some(kind) }),
    }
}

pub fn proto_to_choice(proto: &ProtoChoiceEnvelope) -> Result<ChoiceEnvelope, RuntimeError> {
    let kind = proto
        .choice
        .as_ref()
        .and_then(|c| c.kind.as_ref())
        .ok_or(RuntimeError::EmptyChoice {
            sequence: proto.sequence,
        })?;

    let choice = match kind {
        ChoiceKind::SelectProjects(sp) => PlayerChoice::SelectProjects {
            card_ids: sp.card_ids.clone(),
        },
        ChoiceKind::Reorg(_) => PlayerChoice::Reorg,
        ChoiceKind::RespondToCrisis(rc) => PlayerChoice::RespondToCrisis {
            crisis_id: rc.crisis_id.clone(),
            response_id: rc.response_id.clone(),
        },
        ChoiceKind::RespondToSituation(rs) => PlayerChoice::RespondToSituation {
            response_id: rs.response_id.clone(),
        },
        ChoiceKind::DeferSituation(_) => PlayerChoice::DeferSituation,
        ChoiceKind::HoldBoardMeeting(hb) => PlayerChoice::HoldBoardMeeting {
            influence: hb.influence.clone(),
        },
    };

    Ok(ChoiceEnvelope {
        sequence: proto.sequence,
        quarter: proto.quarter,
        choice,
    })
}
