use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::domain::{Action, ActionKind, Lending, UserId};

use super::{MIGRATION_001_INITIAL, Snapshot, Store};

/// SQLite-backed alternative to the JSON document.
/// `save` replaces both tables inside a single transaction.
pub struct SqliteStore {
    pool: SqlitePool,
    path: PathBuf,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path` and run migrations.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let database_url = format!("sqlite:{}?mode=rwc", path.display());
        let pool = SqlitePool::connect(&database_url)
            .await
            .context("Failed to connect to database")?;

        let store = Self { pool, path };
        store.migrate().await?;
        Ok(store)
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    fn row_to_lending(row: &sqlx::sqlite::SqliteRow) -> Result<Lending> {
        Ok(Lending {
            subject_id: from_db_id(row.get("subject_id"))?,
            subject_name: row.get("subject_name"),
            borrowed: row.get("borrowed"),
        })
    }

    fn row_to_action(row: &sqlx::sqlite::SqliteRow) -> Result<Action> {
        let kind_str: String = row.get("kind");
        let occurred_at_str: String = row.get("occurred_at");
        let sequence: i64 = row.get("sequence");

        Ok(Action {
            sequence: u64::try_from(sequence).context("Invalid action sequence")?,
            issuer_id: from_db_id(row.get("issuer_id"))?,
            subject_id: from_db_id(row.get("subject_id"))?,
            kind: ActionKind::from_str(&kind_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid action kind: {}", kind_str))?,
            amount: row.get("amount"),
            when: DateTime::parse_from_rfc3339(&occurred_at_str)
                .context("Invalid occurred_at timestamp")?
                .with_timezone(&Utc),
        })
    }
}

fn to_db_id(id: UserId) -> Result<i64> {
    i64::try_from(id).with_context(|| format!("User id {} does not fit in SQLite", id))
}

fn from_db_id(id: i64) -> Result<UserId> {
    UserId::try_from(id).with_context(|| format!("Invalid user id {}", id))
}

#[async_trait]
impl Store for SqliteStore {
    async fn load(&self) -> Result<Snapshot> {
        let lending_rows = sqlx::query(
            r#"
            SELECT subject_id, subject_name, borrowed
            FROM lendings
            ORDER BY subject_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list lendings")?;

        let action_rows = sqlx::query(
            r#"
            SELECT sequence, issuer_id, subject_id, kind, amount, occurred_at
            FROM actions
            ORDER BY sequence
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list actions")?;

        let mut snapshot = Snapshot::default();
        for row in &lending_rows {
            let lending = Self::row_to_lending(row)?;
            snapshot.lendings.insert(lending.subject_id, lending);
        }
        snapshot.actions = action_rows
            .iter()
            .map(Self::row_to_action)
            .collect::<Result<_>>()?;
        Ok(snapshot)
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;

        sqlx::query("DELETE FROM lendings")
            .execute(&mut *tx)
            .await
            .context("Failed to clear lendings")?;
        sqlx::query("DELETE FROM actions")
            .execute(&mut *tx)
            .await
            .context("Failed to clear actions")?;

        for lending in snapshot.lendings.values() {
            sqlx::query(
                r#"
                INSERT INTO lendings (subject_id, subject_name, borrowed)
                VALUES (?, ?, ?)
                "#,
            )
            .bind(to_db_id(lending.subject_id)?)
            .bind(&lending.subject_name)
            .bind(lending.borrowed)
            .execute(&mut *tx)
            .await
            .context("Failed to save lending")?;
        }

        for action in &snapshot.actions {
            let sequence =
                i64::try_from(action.sequence).context("Action sequence does not fit in SQLite")?;
            sqlx::query(
                r#"
                INSERT INTO actions (sequence, issuer_id, subject_id, kind, amount, occurred_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(sequence)
            .bind(to_db_id(action.issuer_id)?)
            .bind(to_db_id(action.subject_id)?)
            .bind(action.kind.as_str())
            .bind(action.amount)
            .bind(action.when.to_rfc3339())
            .execute(&mut *tx)
            .await
            .context("Failed to save action")?;
        }

        tx.commit().await.context("Failed to commit ledger")?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("sqlite:{}", self.path.display())
    }
}
