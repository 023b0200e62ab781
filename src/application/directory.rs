use std::collections::HashMap;
use std::sync::RwLock;

use crate::domain::{Member, UserId};

/// Looks up the current display name of a chat member.
/// Members who left the group resolve to `None`.
pub trait MemberDirectory: Send + Sync {
    fn name_of(&self, id: UserId) -> Option<String>;
}

/// In-memory directory, filled as members are seen.
#[derive(Debug, Default)]
pub struct StaticDirectory {
    names: RwLock<HashMap<UserId, String>>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_members(members: impl IntoIterator<Item = Member>) -> Self {
        let directory = Self::new();
        for member in members {
            directory.insert(member);
        }
        directory
    }

    /// Record (or rename) a member.
    pub fn insert(&self, member: Member) {
        let mut names = self.names.write().unwrap_or_else(|e| e.into_inner());
        names.insert(member.id, member.name);
    }

    pub fn member(&self, id: UserId) -> Option<Member> {
        self.name_of(id).map(|name| Member::new(id, name))
    }
}

impl MemberDirectory for StaticDirectory {
    fn name_of(&self, id: UserId) -> Option<String> {
        let names = self.names.read().unwrap_or_else(|e| e.into_inner());
        names.get(&id).cloned()
    }
}

/// A directory that knows nobody; every name falls back to stored data.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDirectory;

impl MemberDirectory for NoDirectory {
    fn name_of(&self, _id: UserId) -> Option<String> {
        None
    }
}
