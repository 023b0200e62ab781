// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use excavator::application::{LedgerService, LedgerSettings};
use excavator::domain::Member;
use excavator::storage::{JsonStore, Snapshot, Store};
use tempfile::TempDir;

/// Helper to create a test service backed by a JSON file in a temporary directory
pub async fn test_service() -> Result<(LedgerService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let store = JsonStore::new(temp_dir.path().join("ledger.json"));
    let service = LedgerService::open(Box::new(store), LedgerSettings::default()).await?;
    Ok((service, temp_dir))
}

pub fn ann() -> Member {
    Member::new(1, "Ann")
}

pub fn bo() -> Member {
    Member::new(2, "Bo")
}

pub fn cy() -> Member {
    Member::new(3, "Cy")
}

/// Store that loads empty and refuses every save.
pub struct FailingStore;

#[async_trait]
impl Store for FailingStore {
    async fn load(&self) -> Result<Snapshot> {
        Ok(Snapshot::default())
    }

    async fn save(&self, _snapshot: &Snapshot) -> Result<()> {
        anyhow::bail!("disk full")
    }

    fn describe(&self) -> String {
        "failing store".to_string()
    }
}

/// Store whose saves take longer than any reasonable time limit.
pub struct SlowStore {
    pub delay: Duration,
}

#[async_trait]
impl Store for SlowStore {
    async fn load(&self) -> Result<Snapshot> {
        Ok(Snapshot::default())
    }

    async fn save(&self, _snapshot: &Snapshot) -> Result<()> {
        tokio::time::sleep(self.delay).await;
        Ok(())
    }

    fn describe(&self) -> String {
        "slow store".to_string()
    }
}

pub fn shared(service: LedgerService) -> Arc<LedgerService> {
    Arc::new(service)
}

/// Channel remembering everything sent to it.
#[derive(Default)]
pub struct RecordingChannel {
    sent: std::sync::Mutex<Vec<String>>,
}

impl RecordingChannel {
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.sent.lock().unwrap())
    }
}

#[async_trait]
impl excavator::bot::Channel for RecordingChannel {
    fn name(&self) -> &str {
        "general"
    }

    async fn send(&self, text: &str) -> Result<()> {
        self.sent.lock().unwrap().push(text.to_string());
        Ok(())
    }
}
