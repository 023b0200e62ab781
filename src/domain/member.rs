use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Chat-platform user id. Zero is never a valid user.
pub type UserId = u64;

/// A chat user resolved to a stable id and the display name known at the time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Member {
    pub id: UserId,
    pub name: String,
}

impl Member {
    pub fn new(id: UserId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    /// Returns true if the member carries a usable identity.
    pub fn is_valid(&self) -> bool {
        self.id != 0 && !self.name.trim().is_empty()
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Parses `id:name` or a bare `id` (the name then defaults to the id).
impl FromStr for Member {
    type Err = ParseMemberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (id_part, name_part) = match s.split_once(':') {
            Some((id, name)) => (id.trim(), Some(name.trim())),
            None => (s.trim(), None),
        };

        let id: UserId = id_part
            .parse()
            .map_err(|_| ParseMemberError::InvalidId(id_part.to_string()))?;
        if id == 0 {
            return Err(ParseMemberError::InvalidId(id_part.to_string()));
        }

        let name = match name_part {
            Some("") => return Err(ParseMemberError::EmptyName),
            Some(name) => name.to_string(),
            None => id.to_string(),
        };

        Ok(Member { id, name })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseMemberError {
    InvalidId(String),
    EmptyName,
}

impl fmt::Display for ParseMemberError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseMemberError::InvalidId(id) => write!(f, "invalid user id '{}'", id),
            ParseMemberError::EmptyName => write!(f, "user name must not be empty"),
        }
    }
}

impl std::error::Error for ParseMemberError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_member_with_name() {
        let member: Member = "42:Alice".parse().unwrap();
        assert_eq!(member, Member::new(42, "Alice"));
    }

    #[test]
    fn test_parse_member_bare_id() {
        let member: Member = "1001".parse().unwrap();
        assert_eq!(member.id, 1001);
        assert_eq!(member.name, "1001");
    }

    #[test]
    fn test_parse_member_invalid() {
        assert!("abc:Alice".parse::<Member>().is_err());
        assert!("0:Nobody".parse::<Member>().is_err());
        assert_eq!(
            "7:".parse::<Member>(),
            Err(ParseMemberError::EmptyName)
        );
    }

    #[test]
    fn test_member_validity() {
        assert!(Member::new(1, "Bob").is_valid());
        assert!(!Member::new(0, "Bob").is_valid());
        assert!(!Member::new(1, "  ").is_valid());
    }
}
