use serde::{Deserialize, Serialize};

use super::{Amount, Member, UserId};

/// Outstanding loan of a single member.
/// Only members holding a positive amount have a record; a missing record
/// reads as zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lending {
    pub subject_id: UserId,
    /// Display name at the time of the last credit
    pub subject_name: String,
    pub borrowed: Amount,
}

impl Lending {
    pub fn new(subject: &Member, borrowed: Amount) -> Self {
        Self {
            subject_id: subject.id,
            subject_name: subject.name.clone(),
            borrowed,
        }
    }

    /// A lending that reached zero (or below) must be removed.
    pub fn is_settled(&self) -> bool {
        self.borrowed <= 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_lending() {
        let lending = Lending::new(&Member::new(7, "Carol"), 5);
        assert_eq!(lending.subject_id, 7);
        assert_eq!(lending.subject_name, "Carol");
        assert_eq!(lending.borrowed, 5);
        assert!(!lending.is_settled());
    }

    #[test]
    fn test_settled_lending() {
        let mut lending = Lending::new(&Member::new(7, "Carol"), 5);
        lending.borrowed -= 5;
        assert!(lending.is_settled());
        lending.borrowed -= 1;
        assert!(lending.is_settled());
    }
}
