// src/lib.rs
// Public library surface for the binaries, integration tests and embedders.

pub mod api;
pub mod config;
pub mod error;
pub mod fetch;
pub mod ledger;
pub mod metrics;
pub mod model;
pub mod network;
pub mod notify;
pub mod poll;
pub mod scheduler;
pub mod subscriptions;

// ---- Re-exports for stable public API ----
pub use crate::error::{ConfigurationError, FetchError, PersistenceError};
pub use crate::fetch::ContentFetcher;
pub use crate::ledger::{SeenItemsLedger, SeenRecord};
pub use crate::model::{Entity, Item};
pub use crate::notify::{Channel, NotificationPayload, NotificationSink};
pub use crate::poll::{PollCycle, PollReport, PollSettings};
pub use crate::scheduler::{ExistingPolicy, HostScheduler, ScheduleConfig};
pub use crate::subscriptions::SubscriptionStore;

use std::sync::Arc;

use tracing::info;

use crate::config::AppConfig;
use crate::ledger::FileLedger;
use crate::subscriptions::FileSubscriptionStore;

/// Wire the production collaborators described by `cfg` around `sink`:
/// file-backed subscriptions and ledger plus the configured HTTP fetcher.
pub fn build_poll_cycle(cfg: &AppConfig, sink: Arc<dyn NotificationSink>) -> anyhow::Result<PollCycle> {
    let settings = cfg.poll_settings()?;
    let fetcher = fetch::from_config(&cfg.fetcher)?;
    info!(
        fetcher = fetcher.name(),
        base_url = %cfg.fetcher.base_url,
        ledger_dir = %cfg.storage.ledger_dir.display(),
        subscriptions = %cfg.storage.subscriptions_path.display(),
        "poll cycle wired"
    );
    Ok(PollCycle::new(
        Arc::new(FileSubscriptionStore::new(&cfg.storage.subscriptions_path)),
        Arc::new(FileLedger::new(&cfg.storage.ledger_dir)),
        fetcher,
        sink,
    )
    .with_settings(settings))
}
