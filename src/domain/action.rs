use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use super::{Amount, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Resources handed out to the subject
    Credit,
    /// Resources handed back by the subject
    Debit,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Credit => "credit",
            ActionKind::Debit => "debit",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "credit" => Some(ActionKind::Credit),
            "debit" => Some(ActionKind::Debit),
            _ => None,
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One entry of the audit log. Actions are immutable and never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// Insertion order, assigned by the ledger service
    pub sequence: u64,
    /// Member who performed the action
    pub issuer_id: UserId,
    /// Member the resources were handed to or taken back from
    pub subject_id: UserId,
    pub kind: ActionKind,
    /// Always positive
    pub amount: Amount,
    /// Truncated to whole seconds
    pub when: DateTime<Utc>,
}

impl Action {
    /// Create a new action. The sequence number must be assigned by the service.
    pub fn new(
        issuer_id: UserId,
        subject_id: UserId,
        kind: ActionKind,
        amount: Amount,
        when: DateTime<Utc>,
    ) -> Self {
        assert!(amount > 0, "Action amount must be positive");
        Self {
            sequence: 0,
            issuer_id,
            subject_id,
            kind,
            amount,
            when: when.trunc_subsecs(0),
        }
    }

    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    /// Returns true if the member took part in this action, either side.
    pub fn involves(&self, member: UserId) -> bool {
        self.issuer_id == member || self.subject_id == member
    }

    /// Human-readable timestamp as shown in status reports, marked as UTC.
    pub fn when_display(&self) -> String {
        self.when.format("%Y-%m-%d %H:%M:%S UTC").to_string()
    }
}
