// tests/poll_timestamps.rs
//
// Publish times come from the source and are not trusted: they order
// notifications but never decide novelty. Runs with production defaults.
mod common;

use chrono::{DateTime, TimeZone, Utc};
use common::{entity, RecordingSink, ScriptedFetcher};
use std::sync::Arc;
use stream_notifier::ledger::{MemoryLedger, SeenItemsLedger};
use stream_notifier::subscriptions::StaticSubscriptions;
use stream_notifier::{Item, PollCycle, PollSettings};

fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
}

fn item(id: &str, published: DateTime<Utc>) -> Item {
    Item::new(id, format!("title {id}")).published_at(published)
}

fn default_cycle(
    ledger: Arc<MemoryLedger>,
    fetcher: Arc<ScriptedFetcher>,
    sink: Arc<RecordingSink>,
) -> PollCycle {
    PollCycle::new(
        Arc::new(StaticSubscriptions::new(vec![entity("UC1")])),
        ledger,
        fetcher,
        sink,
    )
    .with_settings(PollSettings::default())
}

#[tokio::test]
async fn future_dated_item_does_not_hide_later_uploads() {
    let ledger = Arc::new(MemoryLedger::new());
    let fetcher = ScriptedFetcher::new();
    let sink = RecordingSink::new();
    let cycle = default_cycle(ledger.clone(), fetcher.clone(), sink.clone());

    fetcher.serve_items("UC1", vec![item("old", at(2099, 1, 1))]);
    cycle.run().await;

    fetcher.serve_items(
        "UC1",
        vec![item("old", at(2099, 1, 1)), item("brand_new", at(2024, 6, 1))],
    );
    let report = cycle.run().await;

    assert_eq!(report.notified, 1);
    assert_eq!(sink.ids(), vec!["brand_new"]);
    assert!(ledger.get("UC1").await.contains("brand_new"));
}

#[tokio::test]
async fn backdated_upload_made_public_late_is_notified() {
    let ledger = Arc::new(MemoryLedger::new());
    let fetcher = ScriptedFetcher::new();
    let sink = RecordingSink::new();
    let cycle = default_cycle(ledger, fetcher.clone(), sink.clone());

    fetcher.serve_items(
        "UC1",
        vec![item("v2", at(2024, 6, 10)), item("v1", at(2024, 6, 1))],
    );
    cycle.run().await;

    // keeps its original publish time, months behind everything seen so far
    fetcher.serve_items(
        "UC1",
        vec![
            item("v3", at(2024, 6, 20)),
            item("v2", at(2024, 6, 10)),
            item("v1", at(2024, 6, 1)),
            item("archived", at(2023, 1, 15)),
        ],
    );
    cycle.run().await;

    // oldest first
    assert_eq!(sink.ids(), vec!["archived", "v3"]);
}
