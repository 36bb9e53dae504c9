// tests/poll_persistence_failure.rs
mod common;

use common::{entity, poll_cycle, FlakyLedger, RecordingSink, ScriptedFetcher};
use stream_notifier::ledger::{SeenItemsLedger, SeenRecord};

#[tokio::test]
async fn failed_commit_renotifies_instead_of_losing() {
    let ledger = FlakyLedger::new();
    ledger
        .put("UC1", SeenRecord::from_ids(["i1"]))
        .await
        .unwrap();
    ledger.fail_puts_for("UC1");

    let fetcher = ScriptedFetcher::new();
    fetcher.serve("UC1", &["i1", "i2"]);
    let sink = RecordingSink::new();
    let cycle = poll_cycle(vec![entity("UC1")], ledger.clone(), fetcher, sink.clone());

    let r1 = cycle.run().await;
    assert_eq!(r1.persist_errors, 1);
    assert_eq!(r1.notified, 1);
    assert_eq!(sink.ids(), vec!["i2"]);
    // the old record is still what is stored
    assert_eq!(ledger.get("UC1").await.ids(), &["i1"]);

    // same fetch again: i2 was never acknowledged, so it is announced again
    let r2 = cycle.run().await;
    assert_eq!(r2.persist_errors, 1);
    assert_eq!(sink.ids(), vec!["i2", "i2"]);

    // once storage recovers the duplicate stops
    ledger.heal();
    cycle.run().await;
    sink.clear();
    cycle.run().await;
    assert_eq!(sink.count(), 0);
    assert!(ledger.get("UC1").await.contains("i2"));
}

#[tokio::test]
async fn write_failure_is_contained_to_its_entity() {
    let ledger = FlakyLedger::new();
    ledger.put("A", SeenRecord::from_ids(["a1"])).await.unwrap();
    ledger.put("B", SeenRecord::from_ids(["b1"])).await.unwrap();
    ledger.fail_puts_for("A");

    let fetcher = ScriptedFetcher::new();
    fetcher.serve("A", &["a1", "a2"]);
    fetcher.serve("B", &["b1", "b2"]);
    let sink = RecordingSink::new();

    let report = poll_cycle(
        vec![entity("A"), entity("B")],
        ledger.clone(),
        fetcher,
        sink.clone(),
    )
    .run()
    .await;

    assert_eq!(report.persist_errors, 1);
    let mut ids = sink.ids();
    ids.sort();
    assert_eq!(ids, vec!["a2", "b2"]);
    assert!(ledger.get("B").await.contains("b2"));
    assert!(!ledger.get("A").await.contains("a2"));
}
