use std::collections::BTreeMap;

use super::{Action, ActionKind, Amount, Lending, Member, UserId};

/// Current lendings keyed by subject id.
pub type Lendings = BTreeMap<UserId, Lending>;

/// Add `amount` to the subject's lending, creating it if needed.
/// Returns the new total. Lendings are left untouched when the total would
/// not fit in an [`Amount`].
pub fn apply_credit(
    lendings: &mut Lendings,
    subject: &Member,
    amount: Amount,
) -> Result<Amount, CreditError> {
    let total = balance_of(lendings, subject.id)
        .checked_add(amount)
        .ok_or(CreditError::Overflow)?;

    let lending = lendings
        .entry(subject.id)
        .or_insert_with(|| Lending::new(subject, 0));
    lending.subject_name = subject.name.clone();
    lending.borrowed = total;
    Ok(total)
}

/// Take `amount` back from the subject. A lending that drops to zero or below
/// is removed and the returned total is 0.
pub fn apply_debit(
    lendings: &mut Lendings,
    subject_id: UserId,
    amount: Amount,
) -> Result<Amount, DebitError> {
    let lending = lendings
        .get_mut(&subject_id)
        .ok_or(DebitError::NeverBorrowed)?;
    lending.borrowed = lending.borrowed.saturating_sub(amount);

    if lending.is_settled() {
        lendings.remove(&subject_id);
        return Ok(0);
    }
    Ok(lending.borrowed)
}

/// Outstanding amount for a subject, 0 when there is no lending.
pub fn balance_of(lendings: &Lendings, subject_id: UserId) -> Amount {
    lendings.get(&subject_id).map(|l| l.borrowed).unwrap_or(0)
}

/// Select the newest `limit` actions, optionally restricted to those a member
/// took part in. Newest first; same-second actions are ordered by descending
/// sequence.
pub fn recent_actions(actions: &[Action], member: Option<UserId>, limit: usize) -> Vec<&Action> {
    let mut selected: Vec<&Action> = actions
        .iter()
        .filter(|action| member.is_none_or(|id| action.involves(id)))
        .collect();
    selected.sort_by(|a, b| {
        b.when
            .cmp(&a.when)
            .then_with(|| b.sequence.cmp(&a.sequence))
    });
    selected.truncate(limit);
    selected
}

/// Outcome of replaying an action log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Replay {
    pub balances: BTreeMap<UserId, Amount>,
    /// Sequences of credits that would have overflowed a balance; they are
    /// skipped, as the service would have rejected them.
    pub overflowing: Vec<u64>,
}

/// Rebuild the outstanding amounts by replaying the action log in sequence
/// order under the same rules the service applies.
/// Debits for subjects without a lending are ignored.
pub fn replay_balances(actions: &[Action]) -> Replay {
    let mut ordered: Vec<&Action> = actions.iter().collect();
    ordered.sort_by_key(|action| action.sequence);

    let mut replay = Replay::default();
    for action in ordered {
        match action.kind {
            ActionKind::Credit => {
                let balance = replay.balances.entry(action.subject_id).or_insert(0);
                match balance.checked_add(action.amount) {
                    Some(total) => *balance = total,
                    None => replay.overflowing.push(action.sequence),
                }
            }
            ActionKind::Debit => {
                if let Some(balance) = replay.balances.get_mut(&action.subject_id) {
                    *balance = balance.saturating_sub(action.amount);
                    if *balance <= 0 {
                        replay.balances.remove(&action.subject_id);
                    }
                }
            }
        }
    }
    replay
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreditError {
    /// The new total does not fit in an [`Amount`]
    Overflow,
}

impl std::fmt::Display for CreditError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CreditError::Overflow => write!(f, "balance would exceed {}", Amount::MAX),
        }
    }
}

impl std::error::Error for CreditError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebitError {
    NeverBorrowed,
}

impl std::fmt::Display for DebitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DebitError::NeverBorrowed => write!(f, "subject never borrowed anything"),
        }
    }
}

impl std::error::Error for DebitError {}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;

    fn member(id: UserId) -> Member {
        Member::new(id, format!("user{}", id))
    }

    fn action(
        sequence: u64,
        issuer: UserId,
        subject: UserId,
        kind: ActionKind,
        secs: i64,
    ) -> Action {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Action::new(issuer, subject, kind, 1, base + Duration::seconds(secs))
            .with_sequence(sequence)
    }

    #[test]
    fn test_credit_creates_lending() {
        let mut lendings = Lendings::new();
        assert_eq!(apply_credit(&mut lendings, &member(2), 5), Ok(5));
        assert_eq!(balance_of(&lendings, 2), 5);
    }

    #[test]
    fn test_credit_accumulates_and_refreshes_name() {
        let mut lendings = Lendings::new();
        apply_credit(&mut lendings, &member(2), 5).unwrap();
        let total = apply_credit(&mut lendings, &Member::new(2, "renamed"), 3);

        assert_eq!(total, Ok(8));
        assert_eq!(lendings[&2].subject_name, "renamed");
    }

    #[test]
    fn test_debit_without_lending() {
        let mut lendings = Lendings::new();
        assert_eq!(
            apply_debit(&mut lendings, 3, 4),
            Err(DebitError::NeverBorrowed)
        );
        assert!(lendings.is_empty());
    }

    #[test]
    fn test_debit_partial() {
        let mut lendings = Lendings::new();
        apply_credit(&mut lendings, &member(2), 5).unwrap();
        assert_eq!(apply_debit(&mut lendings, 2, 2), Ok(3));
        assert_eq!(balance_of(&lendings, 2), 3);
    }

    #[test]
    fn test_debit_to_zero_removes_lending() {
        let mut lendings = Lendings::new();
        apply_credit(&mut lendings, &member(2), 5).unwrap();
        assert_eq!(apply_debit(&mut lendings, 2, 5), Ok(0));
        assert!(!lendings.contains_key(&2));
    }

    #[test]
    fn test_debit_below_zero_removes_lending() {
        let mut lendings = Lendings::new();
        apply_credit(&mut lendings, &member(2), 5).unwrap();
        assert_eq!(apply_debit(&mut lendings, 2, 9), Ok(0));
        assert_eq!(balance_of(&lendings, 2), 0);
    }

    #[test]
    fn test_recent_actions_newest_first_with_limit() {
        let actions = vec![
            action(1, 1, 2, ActionKind::Credit, 0),
            action(2, 1, 3, ActionKind::Credit, 10),
            action(3, 1, 2, ActionKind::Debit, 20),
        ];

        let recent = recent_actions(&actions, None, 2);
        let sequences: Vec<u64> = recent.iter().map(|a| a.sequence).collect();
        assert_eq!(sequences, vec![3, 2]);
    }

    #[test]
    fn test_recent_actions_for_member_includes_issuer_side() {
        let actions = vec![
            action(1, 1, 2, ActionKind::Credit, 0),
            action(2, 3, 4, ActionKind::Credit, 10),
            action(3, 2, 5, ActionKind::Credit, 20),
        ];

        let recent = recent_actions(&actions, Some(2), 10);
        let sequences: Vec<u64> = recent.iter().map(|a| a.sequence).collect();
        assert_eq!(sequences, vec![3, 1]);
    }

    #[test]
    fn test_recent_actions_same_second_ordered_by_sequence() {
        let actions = vec![
            action(1, 1, 2, ActionKind::Credit, 5),
            action(2, 1, 2, ActionKind::Credit, 5),
            action(3, 1, 2, ActionKind::Credit, 5),
        ];

        let recent = recent_actions(&actions, None, 3);
        let sequences: Vec<u64> = recent.iter().map(|a| a.sequence).collect();
        assert_eq!(sequences, vec![3, 2, 1]);
    }

    #[test]
    fn test_recent_actions_zero_limit() {
        let actions = vec![action(1, 1, 2, ActionKind::Credit, 0)];
        assert!(recent_actions(&actions, None, 0).is_empty());
    }

    #[test]
    fn test_replay_matches_incremental_updates() {
        let base = Utc::now();
        let actions = vec![
            Action::new(1, 2, ActionKind::Credit, 5, base).with_sequence(1),
            Action::new(1, 2, ActionKind::Credit, 3, base).with_sequence(2),
            Action::new(1, 3, ActionKind::Credit, 4, base).with_sequence(3),
            Action::new(1, 3, ActionKind::Debit, 4, base).with_sequence(4),
            Action::new(1, 9, ActionKind::Debit, 2, base).with_sequence(5),
        ];

        let replay = replay_balances(&actions);
        assert_eq!(replay.balances.get(&2), Some(&8));
        assert_eq!(replay.balances.get(&3), None);
        assert_eq!(replay.balances.get(&9), None);
        assert!(replay.overflowing.is_empty());
    }

    #[test]
    fn test_credit_overflow_is_rejected() {
        let mut lendings = Lendings::new();
        assert_eq!(
            apply_credit(&mut lendings, &member(2), Amount::MAX),
            Ok(Amount::MAX)
        );

        assert_eq!(
            apply_credit(&mut lendings, &Member::new(2, "renamed"), 1),
            Err(CreditError::Overflow)
        );
        assert_eq!(balance_of(&lendings, 2), Amount::MAX);
        assert_eq!(lendings[&2].subject_name, "user2");
    }

    #[test]
    fn test_replay_skips_overflowing_credit() {
        let base = Utc::now();
        let actions = vec![
            Action::new(1, 2, ActionKind::Credit, Amount::MAX, base).with_sequence(1),
            Action::new(1, 2, ActionKind::Credit, 1, base).with_sequence(2),
            Action::new(1, 2, ActionKind::Debit, 5, base).with_sequence(3),
        ];

        let replay = replay_balances(&actions);
        assert_eq!(replay.balances.get(&2), Some(&(Amount::MAX - 5)));
        assert_eq!(replay.overflowing, vec![2]);
    }
}
