// tests/poll_dedup.rs
mod common;

use common::{entity, poll_cycle, RecordingSink, ScriptedFetcher};
use std::sync::Arc;
use stream_notifier::ledger::{FileLedger, MemoryLedger, SeenItemsLedger, SeenRecord};
use stream_notifier::notify::Channel;

#[tokio::test]
async fn exactly_the_new_item_is_notified() {
    let ledger = Arc::new(MemoryLedger::with_records([(
        "UC1".to_string(),
        SeenRecord::from_ids(["i1", "i2"]),
    )]));
    let fetcher = ScriptedFetcher::new();
    fetcher.serve("UC1", &["i1", "i2", "i3"]);
    let sink = RecordingSink::new();

    poll_cycle(vec![entity("UC1")], ledger.clone(), fetcher, sink.clone())
        .run()
        .await;

    assert_eq!(sink.ids(), vec!["i3"]);
    let sent = sink.sent.lock();
    let (channel, payload) = &sent[0];
    assert_eq!(*channel, Channel::Update);
    assert_eq!(payload.title, "Channel UC1");
    assert_eq!(payload.body, "title i3");
    drop(sent);

    let mut ids = ledger.get("UC1").await.ids().to_vec();
    ids.sort();
    assert_eq!(ids, vec!["i1", "i2", "i3"]);
}

#[tokio::test]
async fn identical_fetch_twice_yields_nothing_new() {
    let ledger = Arc::new(MemoryLedger::with_records([(
        "UC1".to_string(),
        SeenRecord::from_ids(["i1"]),
    )]));
    let fetcher = ScriptedFetcher::new();
    fetcher.serve("UC1", &["i1", "i2"]);
    let sink = RecordingSink::new();
    let cycle = poll_cycle(vec![entity("UC1")], ledger, fetcher, sink.clone());

    cycle.run().await;
    assert_eq!(sink.ids(), vec!["i2"]);

    sink.clear();
    let report = cycle.run().await;
    assert_eq!(sink.count(), 0);
    assert_eq!(report.notified, 0);
}

#[tokio::test]
async fn duplicate_ids_in_one_fetch_notify_once() {
    let ledger = Arc::new(MemoryLedger::with_records([(
        "UC1".to_string(),
        SeenRecord::from_ids(["old"]),
    )]));
    let fetcher = ScriptedFetcher::new();
    fetcher.serve("UC1", &["new", "old", "new"]);
    let sink = RecordingSink::new();

    poll_cycle(vec![entity("UC1")], ledger, fetcher, sink.clone())
        .run()
        .await;
    assert_eq!(sink.ids(), vec!["new"]);
}

#[tokio::test]
async fn seen_marks_survive_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = ScriptedFetcher::new();
    let sink = RecordingSink::new();

    // "process 1": first poll, then one new upload
    {
        let cycle = poll_cycle(
            vec![entity("UC1")],
            Arc::new(FileLedger::new(dir.path())),
            fetcher.clone(),
            sink.clone(),
        );
        fetcher.serve("UC1", &["a", "b"]);
        cycle.run().await;
        fetcher.serve("UC1", &["a", "b", "c"]);
        cycle.run().await;
    }
    assert_eq!(sink.ids(), vec!["c"]);

    // "process 2": fresh instances over the same directory
    sink.clear();
    let cycle = poll_cycle(
        vec![entity("UC1")],
        Arc::new(FileLedger::new(dir.path())),
        fetcher.clone(),
        sink.clone(),
    );
    let report = cycle.run().await;
    assert_eq!(report.first_polls, 0);
    assert_eq!(sink.count(), 0);

    fetcher.serve("UC1", &["a", "b", "c", "d"]);
    cycle.run().await;
    assert_eq!(sink.ids(), vec!["d"]);
}
