// src/ledger/mod.rs
//! # Seen-items ledger
//! Durable mapping `entity id -> SeenRecord`: which item ids were already
//! notified on. This is the only state that survives between poll cycles.
//!
//! Records keep ids in insertion order (oldest first) so retention can drop
//! the oldest ids when the configured bound is exceeded.

pub mod file;
pub mod memory;

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PersistenceError;
use crate::model::Item;

pub use file::FileLedger;
pub use memory::MemoryLedger;

/// Per-entity persisted state.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeenRecord {
    /// Notified-on (or first-poll acknowledged) item ids, oldest first.
    #[serde(default)]
    ids: Vec<String>,
    /// Newest publish time ever seen for this entity. Informational only;
    /// publish times are not trusted for novelty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_published: Option<DateTime<Utc>>,
    /// False only for the placeholder returned when nothing is stored yet.
    /// Anything read back from storage was written by a completed poll.
    #[serde(skip_serializing, default = "stored_record")]
    initialized: bool,
}

fn stored_record() -> bool {
    true
}

impl SeenRecord {
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut rec = Self {
            initialized: true,
            ..Self::default()
        };
        let mut uniq = HashSet::new();
        for id in ids {
            let id = id.into();
            if uniq.insert(id.clone()) {
                rec.ids.push(id);
            }
        }
        rec
    }

    /// `false` means this entity was never polled successfully: first poll.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|x| x == id)
    }

    pub fn last_published(&self) -> Option<DateTime<Utc>> {
        self.last_published
    }

    /// Lookup set for novelty checks over many items.
    pub fn id_set(&self) -> HashSet<&str> {
        self.ids.iter().map(String::as_str).collect()
    }

    /// Merge the ids of a complete fetch and apply retention.
    ///
    /// Ids from `fetched` are moved to the newest end; older retained ids are
    /// evicted first. The effective bound is `max(max_ids, fetched.len())`, so
    /// no id that is currently being served by the source is ever dropped.
    pub fn merge_fetched(&mut self, fetched: &[Item], max_ids: usize) {
        let current: HashSet<&str> = fetched.iter().map(|it| it.id.as_str()).collect();

        let mut merged: Vec<String> = self
            .ids
            .drain(..)
            .filter(|id| !current.contains(id.as_str()))
            .collect();
        let mut pushed = HashSet::new();
        for it in fetched {
            if pushed.insert(it.id.as_str()) {
                merged.push(it.id.clone());
            }
        }

        let cap = max_ids.max(pushed.len());
        if merged.len() > cap {
            let excess = merged.len() - cap;
            merged.drain(0..excess);
        }
        self.ids = merged;
        self.initialized = true;

        let newest = fetched.iter().filter_map(|it| it.published).max();
        self.last_published = match (self.last_published, newest) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
    }
}

/// Storage contract for seen records.
///
/// Implementations must allow concurrent `put` calls for distinct entity ids
/// without one write blocking or clobbering another.
#[async_trait::async_trait]
pub trait SeenItemsLedger: Send + Sync {
    /// Stored record, or an empty one when absent or unreadable. Never fails.
    async fn get(&self, entity_id: &str) -> SeenRecord;

    /// Replace the stored record. An error means "not committed".
    async fn put(&self, entity_id: &str, record: SeenRecord) -> Result<(), PersistenceError>;
}
