mod json;
mod sqlite;

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{Action, Lendings};

pub use json::JsonStore;
pub use sqlite::SqliteStore;

/// SQL migration for the initial schema
pub const MIGRATION_001_INITIAL: &str = include_str!("migrations/001_initial.sql");

/// Everything the ledger persists, loaded and saved as a whole.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub lendings: Lendings,
    #[serde(default)]
    pub actions: Vec<Action>,
}

impl Snapshot {
    /// Sequence number for the next action to append.
    pub fn next_sequence(&self) -> u64 {
        self.actions
            .iter()
            .map(|action| action.sequence)
            .max()
            .unwrap_or(0)
            + 1
    }
}

/// Persistence port: the whole ledger is read and written in one piece.
#[async_trait]
pub trait Store: Send + Sync {
    async fn load(&self) -> Result<Snapshot>;

    async fn save(&self, snapshot: &Snapshot) -> Result<()>;

    /// Short description for log lines, e.g. `json:excavator.json`.
    fn describe(&self) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Json,
    Sqlite,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Json => "json",
            Backend::Sqlite => "sqlite",
        }
    }

    /// Pick a backend from the file extension; anything that isn't a SQLite
    /// database is treated as a JSON document.
    pub fn infer(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("db" | "sqlite" | "sqlite3") => Backend::Sqlite,
            _ => Backend::Json,
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Open the store at `path`, inferring the backend when none is given.
pub async fn open(path: &Path, backend: Option<Backend>) -> Result<Box<dyn Store>> {
    match backend.unwrap_or_else(|| Backend::infer(path)) {
        Backend::Json => Ok(Box::new(JsonStore::new(path))),
        Backend::Sqlite => Ok(Box::new(SqliteStore::open(path).await?)),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::domain::ActionKind;

    #[test]
    fn test_infer_backend() {
        assert_eq!(Backend::infer(Path::new("ledger.json")), Backend::Json);
        assert_eq!(Backend::infer(Path::new("ledger")), Backend::Json);
        assert_eq!(Backend::infer(Path::new("data/ledger.db")), Backend::Sqlite);
        assert_eq!(Backend::infer(Path::new("ledger.sqlite3")), Backend::Sqlite);
    }

    #[test]
    fn test_next_sequence() {
        let mut snapshot = Snapshot::default();
        assert_eq!(snapshot.next_sequence(), 1);

        snapshot
            .actions
            .push(Action::new(1, 2, ActionKind::Credit, 5, Utc::now()).with_sequence(7));
        assert_eq!(snapshot.next_sequence(), 8);
    }
}
