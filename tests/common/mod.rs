// tests/common/mod.rs
// Shared test doubles for the poll-cycle integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use stream_notifier::error::{FetchError, PersistenceError};
use stream_notifier::ledger::{MemoryLedger, SeenItemsLedger, SeenRecord};
use stream_notifier::notify::{Channel, NotificationPayload, NotificationSink};
use stream_notifier::subscriptions::StaticSubscriptions;
use stream_notifier::{ContentFetcher, Entity, Item, PollCycle};

pub fn items(ids: &[&str]) -> Vec<Item> {
    ids.iter()
        .map(|id| Item::new(*id, format!("title {id}")))
        .collect()
}

pub fn entity(id: &str) -> Entity {
    Entity::new(id, format!("Channel {id}"))
}

enum Script {
    Items(Vec<Item>),
    Fail,
    Slow(Duration, Vec<Item>),
}

/// Fetcher whose answer per entity can be changed between runs.
#[derive(Default)]
pub struct ScriptedFetcher {
    scripts: Mutex<HashMap<String, Script>>,
    pub calls: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn serve(&self, entity_id: &str, ids: &[&str]) {
        self.serve_items(entity_id, items(ids));
    }

    pub fn serve_items(&self, entity_id: &str, items: Vec<Item>) {
        self.scripts
            .lock()
            .insert(entity_id.to_string(), Script::Items(items));
    }

    pub fn fail(&self, entity_id: &str) {
        self.scripts.lock().insert(entity_id.to_string(), Script::Fail);
    }

    pub fn slow(&self, entity_id: &str, delay: Duration, ids: &[&str]) {
        self.scripts
            .lock()
            .insert(entity_id.to_string(), Script::Slow(delay, items(ids)));
    }
}

#[async_trait]
impl ContentFetcher for ScriptedFetcher {
    async fn fetch(&self, entity_id: &str) -> Result<Vec<Item>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (delay, out) = match self.scripts.lock().get(entity_id) {
            Some(Script::Items(v)) => (None, Ok(v.clone())),
            Some(Script::Slow(d, v)) => (Some(*d), Ok(v.clone())),
            Some(Script::Fail) | None => (
                None,
                Err(FetchError::new(entity_id, anyhow::anyhow!("connection reset"))),
            ),
        };
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
        out
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Sink that remembers every notification.
#[derive(Default)]
pub struct RecordingSink {
    pub sent: Mutex<Vec<(Channel, NotificationPayload)>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn ids(&self) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .map(|(_, p)| p.deep_link_id.clone())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().len()
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn notify(&self, channel: Channel, payload: &NotificationPayload) {
        self.sent.lock().push((channel, payload.clone()));
    }
}

/// Memory ledger whose writes can be made to fail per entity.
#[derive(Default)]
pub struct FlakyLedger {
    inner: MemoryLedger,
    failing: Mutex<HashSet<String>>,
    pub puts: AtomicUsize,
}

impl FlakyLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_puts_for(&self, entity_id: &str) {
        self.failing.lock().insert(entity_id.to_string());
    }

    pub fn heal(&self) {
        self.failing.lock().clear();
    }
}

#[async_trait]
impl SeenItemsLedger for FlakyLedger {
    async fn get(&self, entity_id: &str) -> SeenRecord {
        self.inner.get(entity_id).await
    }

    async fn put(&self, entity_id: &str, record: SeenRecord) -> Result<(), PersistenceError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().contains(entity_id) {
            return Err(PersistenceError::new(
                entity_id,
                anyhow::anyhow!("disk full"),
            ));
        }
        self.inner.put(entity_id, record).await
    }
}

pub fn poll_cycle(
    entities: Vec<Entity>,
    ledger: Arc<dyn SeenItemsLedger>,
    fetcher: Arc<dyn ContentFetcher>,
    sink: Arc<dyn NotificationSink>,
) -> PollCycle {
    PollCycle::new(
        Arc::new(StaticSubscriptions::new(entities)),
        ledger,
        fetcher,
        sink,
    )
}
