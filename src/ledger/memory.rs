// src/ledger/memory.rs
use std::collections::HashMap;

use tokio::sync::RwLock;

use super::{SeenItemsLedger, SeenRecord};
use crate::error::PersistenceError;

/// Process-local ledger. Nothing survives a restart; intended for tests and
/// for embedders that persist the snapshot themselves.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    records: RwLock<HashMap<String, SeenRecord>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed records before the first cycle.
    pub fn with_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = (String, SeenRecord)>,
    {
        Self {
            records: RwLock::new(records.into_iter().collect()),
        }
    }

    pub async fn snapshot(&self) -> HashMap<String, SeenRecord> {
        self.records.read().await.clone()
    }
}

#[async_trait::async_trait]
impl SeenItemsLedger for MemoryLedger {
    async fn get(&self, entity_id: &str) -> SeenRecord {
        self.records
            .read()
            .await
            .get(entity_id)
            .cloned()
            .unwrap_or_default()
    }

    async fn put(&self, entity_id: &str, record: SeenRecord) -> Result<(), PersistenceError> {
        self.records
            .write()
            .await
            .insert(entity_id.to_string(), record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn absent_entity_reads_as_empty() {
        let ledger = MemoryLedger::new();
        assert!(ledger.get("nobody").await.is_empty());
    }

    #[tokio::test]
    async fn put_replaces_previous_record() {
        let ledger = MemoryLedger::new();
        ledger.put("c", SeenRecord::from_ids(["a"])).await.unwrap();
        ledger.put("c", SeenRecord::from_ids(["b"])).await.unwrap();
        assert_eq!(ledger.get("c").await.ids(), &["b"]);
    }
}
