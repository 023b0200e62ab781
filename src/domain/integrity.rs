use std::collections::BTreeSet;

use super::{Action, Amount, Lendings, UserId, replay_balances};

/// A subject whose stored lending disagrees with the action log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceMismatch {
    pub subject_id: UserId,
    pub recorded: Amount,
    pub replayed: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityReport {
    pub lending_count: usize,
    pub action_count: usize,
    pub has_sequence_gaps: bool,
    pub has_duplicate_sequences: bool,
    pub invalid_amounts: usize,
    /// Credits that would push a balance past the largest amount
    pub overflowing_credits: usize,
    pub settled_lendings: usize,
    pub mismatches: Vec<BalanceMismatch>,
}

impl IntegrityReport {
    pub fn is_healthy(&self) -> bool {
        !self.has_sequence_gaps
            && !self.has_duplicate_sequences
            && self.invalid_amounts == 0
            && self.overflowing_credits == 0
            && self.settled_lendings == 0
            && self.mismatches.is_empty()
    }
}

/// Cross-check stored lendings against a replay of the action log.
pub fn build_integrity_report(lendings: &Lendings, actions: &[Action]) -> IntegrityReport {
    let sequences: BTreeSet<u64> = actions.iter().map(|a| a.sequence).collect();
    let has_duplicate_sequences = sequences.len() != actions.len();
    let has_sequence_gaps = match (sequences.first(), sequences.last()) {
        (Some(min), Some(max)) => max - min != (sequences.len() - 1) as u64,
        _ => false,
    };

    let replay = replay_balances(actions);
    let replayed = &replay.balances;
    let subjects: BTreeSet<UserId> = lendings.keys().chain(replayed.keys()).copied().collect();
    let mismatches = subjects
        .into_iter()
        .filter_map(|subject_id| {
            let recorded = lendings.get(&subject_id).map(|l| l.borrowed).unwrap_or(0);
            let replayed = replayed.get(&subject_id).copied().unwrap_or(0);
            (recorded != replayed).then_some(BalanceMismatch {
                subject_id,
                recorded,
                replayed,
            })
        })
        .collect();

    IntegrityReport {
        lending_count: lendings.len(),
        action_count: actions.len(),
        has_sequence_gaps,
        has_duplicate_sequences,
        invalid_amounts: actions.iter().filter(|a| a.amount <= 0).count(),
        overflowing_credits: replay.overflowing.len(),
        settled_lendings: lendings.values().filter(|l| l.is_settled()).count(),
        mismatches,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::domain::{ActionKind, Lending, Member, apply_credit};

    #[test]
    fn test_consistent_ledger_is_healthy() {
        let mut lendings = Lendings::new();
        apply_credit(&mut lendings, &Member::new(2, "Bo"), 5).unwrap();
        let actions = vec![Action::new(1, 2, ActionKind::Credit, 5, Utc::now()).with_sequence(1)];

        let report = build_integrity_report(&lendings, &actions);
        assert!(report.is_healthy());
        assert_eq!(report.lending_count, 1);
        assert_eq!(report.action_count, 1);
    }

    #[test]
    fn test_detects_mismatch_and_gaps() {
        let mut lendings = Lendings::new();
        lendings.insert(2, Lending::new(&Member::new(2, "Bo"), 9));
        let actions = vec![
            Action::new(1, 2, ActionKind::Credit, 5, Utc::now()).with_sequence(1),
            Action::new(1, 2, ActionKind::Credit, 1, Utc::now()).with_sequence(3),
        ];

        let report = build_integrity_report(&lendings, &actions);
        assert!(!report.is_healthy());
        assert!(report.has_sequence_gaps);
        assert_eq!(
            report.mismatches,
            vec![BalanceMismatch {
                subject_id: 2,
                recorded: 9,
                replayed: 6,
            }]
        );
    }

    #[test]
    fn test_overflowing_log_is_reported() {
        let mut lendings = Lendings::new();
        lendings.insert(2, Lending::new(&Member::new(2, "Bo"), Amount::MAX));
        let actions = vec![
            Action::new(1, 2, ActionKind::Credit, Amount::MAX, Utc::now()).with_sequence(1),
            Action::new(1, 2, ActionKind::Credit, 1, Utc::now()).with_sequence(2),
        ];

        let report = build_integrity_report(&lendings, &actions);
        assert_eq!(report.overflowing_credits, 1);
        assert!(report.mismatches.is_empty());
        assert!(!report.is_healthy());
    }

    #[test]
    fn test_extreme_sequences_do_not_overflow() {
        let actions = vec![
            Action::new(1, 2, ActionKind::Credit, 1, Utc::now()).with_sequence(0),
            Action::new(1, 2, ActionKind::Credit, 1, Utc::now()).with_sequence(u64::MAX),
        ];

        let report = build_integrity_report(&Lendings::new(), &actions);
        assert!(report.has_sequence_gaps);
    }

    #[test]
    fn test_empty_ledger_is_healthy() {
        assert!(build_integrity_report(&Lendings::new(), &[]).is_healthy());
    }
}
