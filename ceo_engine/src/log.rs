//! Quarter Engine: Structured Play Log
//!
//! Every phase operation returns the entries it produced. The log is data
//! for the presentation layer to render; it is never read back by the
//! simulation.

use serde::{Deserialize, Serialize};

use crate::domain::{Meter, OrgState, OutcomeTier};
use crate::state::Phase;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCode {
    HandDealt,
    Reorg,
    CorporateConduct,
    SituationQueued,
    SituationDue,
    SituationFizzled,
    SituationResurfaced,
    SituationFaded,
    SituationDeferred,
    SituationResolved,
    RandomCrisisDrawn,
    CrisisSpawned,
    CrisisResponded,
    CrisisEscalated,
    CrisisExpired,
    CrisisImpact,
    SideEffectQueued,
    CapitalSpent,
    CapitalEarned,
    InfluencePurchased,
    BacklashScheduled,
    BacklashApplied,
    BoardReview,
    Retained,
    Terminated,
    ProfitBooked,
    GameOver,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LogKind {
    Info { message: String },
    MeterChange { meter: Meter, before: i32, after: i32 },
    Event { code: EventCode, detail: String },
    Outcome { source_id: String, tier: OutcomeTier },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub quarter: u32,
    pub phase: Phase,
    #[serde(flatten)]
    pub kind: LogKind,
}

/// Collects entries for one phase operation.
#[derive(Debug, Clone)]
pub struct Journal {
    quarter: u32,
    phase: Phase,
    entries: Vec<LogEntry>,
}

impl Journal {
    pub fn new(quarter: u32, phase: Phase) -> Self {
        Self {
            quarter,
            phase,
            entries: Vec::new(),
        }
    }

    fn push(&mut self, kind: LogKind) {
        self.entries.push(LogEntry {
            quarter: self.quarter,
            phase: self.phase,
            kind,
        });
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(LogKind::Info {
            message: message.into(),
        });
    }

    pub fn event(&mut self, code: EventCode, detail: impl Into<String>) {
        self.push(LogKind::Event {
            code,
            detail: detail.into(),
        });
    }

    pub fn outcome(&mut self, source_id: &str, tier: OutcomeTier) {
        self.push(LogKind::Outcome {
            source_id: source_id.to_string(),
            tier,
        });
    }

    /// One entry per meter whose value differs between the two states.
    pub fn meter_changes(&mut self, before: &OrgState, after: &OrgState) {
        for meter in Meter::ALL {
            let (b, a) = (before.get(meter), after.get(meter));
            if b != a {
                self.push(LogKind::MeterChange {
                    meter,
                    before: b,
                    after: a,
                });
            }
        }
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<LogEntry> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meter_changes_only_logs_differences() {
        let before = OrgState::uniform(50);
        let after = before
            .with_meter_change(Meter::Morale, 5)
            .with_meter_change(Meter::Runway, -3);
        let mut journal = Journal::new(2, Phase::Projects);
        journal.meter_changes(&before, &after);
        let entries = journal.into_entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(
            entries[0].kind,
            LogKind::MeterChange {
                meter: Meter::Morale,
                before: 50,
                after: 55
            }
        );
    }

    #[test]
    fn test_entry_json_shape() {
        let mut journal = Journal::new(1, Phase::BoardMeeting);
        journal.event(EventCode::Retained, "rating B");
        let json = serde_json::to_string(&journal.entries()[0]).unwrap();
        assert_eq!(
            json,
            r#"{"quarter":1,"phase":"board_meeting","kind":"event","code":"retained","detail":"rating B"}"#
        );
    }
}
