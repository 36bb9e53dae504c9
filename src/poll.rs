// src/poll.rs
//! # Poll cycle
//! One bounded pass over every subscribed entity:
//! fetch -> load seen record -> partition new/known -> notify -> persist.
//!
//! Per entity the steps are strictly sequential and the final `put` is the
//! only commit point. Entities are independent of each other and may run in
//! parallel (bounded by `max_concurrent`). Nothing that goes wrong for one
//! entity escapes the cycle; the worst outcome is a duplicate notification
//! on the next run, never a lost one.
//!
//! First-poll policy: an entity that has never been polled successfully gets
//! all its current items recorded as seen without any notification, so
//! following a channel does not flood the user with its back-catalog.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use once_cell::sync::OnceCell;
use serde::Serialize;
use tokio::sync::{watch, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tokio::time::Instant;

use crate::fetch::ContentFetcher;
use crate::ledger::SeenItemsLedger;
use crate::model::{dedup_items, Entity, Item};
use crate::notify::{Channel, NotificationPayload, NotificationSink};
use crate::scheduler::PeriodicJob;
use crate::subscriptions::SubscriptionStore;

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(describe_metrics);
}

/// Describe every poll series on the currently installed recorder.
pub(crate) fn describe_metrics() {
    describe_counter!("poll_runs_total", "Completed poll cycles.");
    describe_counter!("poll_entities_total", "Entities attempted across cycles.");
    describe_counter!("poll_fetch_errors_total", "Per-entity fetch failures.");
    describe_counter!(
        "poll_persist_errors_total",
        "Per-entity ledger write failures (items stay unacknowledged)."
    );
    describe_counter!("poll_notifications_total", "Notifications dispatched.");
    describe_counter!(
        "poll_first_polls_total",
        "Entities recorded silently on their first poll."
    );
    describe_counter!("poll_deferred_total", "Entities deferred by the run deadline.");
    describe_histogram!("poll_run_ms", "Poll cycle wall time in milliseconds.");
    describe_gauge!("poll_last_run_ts", "Unix ts when the last poll cycle finished.");
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSettings {
    /// Retention bound of each seen record.
    pub max_seen_per_entity: usize,
    /// Entities processed in parallel.
    pub max_concurrent: usize,
    /// Host deadline for one run; unreached entities are deferred.
    pub run_deadline: Option<Duration>,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            max_seen_per_entity: 500,
            max_concurrent: 4,
            run_deadline: None,
        }
    }
}

/// What happened to a single entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityOutcome {
    /// Never polled before: `recorded` ids stored, nothing notified.
    FirstPoll { recorded: usize },
    /// Regular pass, committed.
    Polled { fetched: usize, notified: usize },
    FetchFailed,
    /// Notifications went out but the record was not committed.
    PersistFailed { fetched: usize, notified: usize },
}

/// Summary of one run, for logs and the status endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PollReport {
    pub started_at: Option<DateTime<Utc>>,
    pub duration_ms: u64,
    pub entities: usize,
    pub fetched: usize,
    pub notified: usize,
    pub first_polls: usize,
    pub fetch_errors: usize,
    pub persist_errors: usize,
    pub deferred: usize,
    /// Entity tasks that died unexpectedly (panic).
    pub crashed: usize,
    pub subscriptions_unavailable: bool,
}

impl PollReport {
    fn tally(&mut self, res: Result<EntityOutcome, JoinError>) {
        match res {
            Ok(EntityOutcome::FirstPoll { recorded }) => {
                self.first_polls += 1;
                self.fetched += recorded;
            }
            Ok(EntityOutcome::Polled { fetched, notified }) => {
                self.fetched += fetched;
                self.notified += notified;
            }
            Ok(EntityOutcome::FetchFailed) => self.fetch_errors += 1,
            Ok(EntityOutcome::PersistFailed { fetched, notified }) => {
                self.persist_errors += 1;
                self.fetched += fetched;
                self.notified += notified;
            }
            Err(e) if e.is_cancelled() => self.deferred += 1,
            Err(e) => {
                tracing::error!(target: "poll", error = %e, "entity task crashed");
                self.crashed += 1;
            }
        }
    }
}

/// The orchestrator. Holds only its collaborators; every run starts from
/// whatever the ledger says.
#[derive(Clone)]
pub struct PollCycle {
    subscriptions: Arc<dyn SubscriptionStore>,
    ledger: Arc<dyn SeenItemsLedger>,
    fetcher: Arc<dyn ContentFetcher>,
    sink: Arc<dyn NotificationSink>,
    settings: PollSettings,
    reports: Arc<watch::Sender<Option<PollReport>>>,
}

impl PollCycle {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionStore>,
        ledger: Arc<dyn SeenItemsLedger>,
        fetcher: Arc<dyn ContentFetcher>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            subscriptions,
            ledger,
            fetcher,
            sink,
            settings: PollSettings::default(),
            reports: Arc::new(tx),
        }
    }

    pub fn with_settings(mut self, settings: PollSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &PollSettings {
        &self.settings
    }

    /// Receiver that always holds the report of the latest finished run.
    pub fn reports(&self) -> watch::Receiver<Option<PollReport>> {
        self.reports.subscribe()
    }

    /// Run one cycle, honoring the configured deadline if any.
    pub async fn run(&self) -> PollReport {
        let deadline = self.settings.run_deadline.map(|d| Instant::now() + d);
        self.run_until(deadline).await
    }

    /// Run one cycle that must stop at `deadline` (host-imposed budget).
    pub async fn run_with_deadline(&self, budget: Duration) -> PollReport {
        self.run_until(Some(Instant::now() + budget)).await
    }

    async fn run_until(&self, deadline: Option<Instant>) -> PollReport {
        ensure_metrics_described();
        let t0 = Instant::now();
        let mut report = PollReport {
            started_at: Some(Utc::now()),
            ..PollReport::default()
        };

        let entities = match self.subscriptions.list_entities().await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(target: "poll", error = ?e, "subscriptions unavailable; skipping cycle");
                report.subscriptions_unavailable = true;
                return self.finish(report, t0);
            }
        };
        report.entities = entities.len();
        counter!("poll_entities_total").increment(entities.len() as u64);

        let permits = Arc::new(Semaphore::new(self.settings.max_concurrent.max(1)));
        let mut tasks = JoinSet::new();
        for entity in entities {
            let this = self.clone();
            let permits = permits.clone();
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await;
                this.poll_entity(&entity).await
            });
        }

        let completed = match deadline {
            None => {
                drain(&mut tasks, &mut report).await;
                true
            }
            Some(at) => tokio::time::timeout_at(at, drain(&mut tasks, &mut report))
                .await
                .is_ok(),
        };
        if !completed {
            tracing::warn!(
                target: "poll",
                pending = tasks.len(),
                "run deadline reached; deferring remaining entities"
            );
            tasks.abort_all();
            drain(&mut tasks, &mut report).await;
            counter!("poll_deferred_total").increment(report.deferred as u64);
        }

        self.finish(report, t0)
    }

    fn finish(&self, mut report: PollReport, t0: Instant) -> PollReport {
        let elapsed = t0.elapsed();
        report.duration_ms = elapsed.as_millis() as u64;

        counter!("poll_runs_total").increment(1);
        histogram!("poll_run_ms").record(elapsed.as_secs_f64() * 1_000.0);
        gauge!("poll_last_run_ts").set(Utc::now().timestamp() as f64);

        tracing::info!(
            target: "poll",
            entities = report.entities,
            fetched = report.fetched,
            notified = report.notified,
            first_polls = report.first_polls,
            fetch_errors = report.fetch_errors,
            persist_errors = report.persist_errors,
            deferred = report.deferred,
            duration_ms = report.duration_ms,
            "poll cycle finished"
        );
        self.reports.send_replace(Some(report.clone()));
        report
    }

    /// Steps 1-6 for a single entity. Never panics on I/O failures.
    pub async fn poll_entity(&self, entity: &Entity) -> EntityOutcome {
        let fetched = match self.fetcher.fetch(&entity.id).await {
            Ok(items) => dedup_items(items),
            Err(e) => {
                tracing::warn!(target: "poll", entity = %entity.id, error = %e, "fetch failed; skipping");
                counter!("poll_fetch_errors_total").increment(1);
                return EntityOutcome::FetchFailed;
            }
        };

        let mut record = self.ledger.get(&entity.id).await;
        let max_seen = self.settings.max_seen_per_entity;

        if !record.is_initialized() {
            record.merge_fetched(&fetched, max_seen);
            return match self.ledger.put(&entity.id, record).await {
                Ok(()) => {
                    tracing::info!(
                        target: "poll",
                        entity = %entity.id,
                        recorded = fetched.len(),
                        "first poll; recorded without notifying"
                    );
                    counter!("poll_first_polls_total").increment(1);
                    EntityOutcome::FirstPoll {
                        recorded: fetched.len(),
                    }
                }
                Err(e) => {
                    tracing::warn!(target: "poll", entity = %entity.id, error = %e, "first-poll record not committed");
                    counter!("poll_persist_errors_total").increment(1);
                    EntityOutcome::PersistFailed {
                        fetched: fetched.len(),
                        notified: 0,
                    }
                }
            };
        }

        let fresh = self.partition_new(&record, &fetched);
        for item in &fresh {
            let payload = NotificationPayload::for_item(entity, item);
            self.sink.notify(Channel::Update, &payload).await;
        }
        let notified = fresh.len();
        counter!("poll_notifications_total").increment(notified as u64);

        record.merge_fetched(&fetched, max_seen);
        match self.ledger.put(&entity.id, record).await {
            Ok(()) => {
                tracing::debug!(
                    target: "poll",
                    entity = %entity.id,
                    fetched = fetched.len(),
                    notified,
                    "entity polled"
                );
                EntityOutcome::Polled {
                    fetched: fetched.len(),
                    notified,
                }
            }
            Err(e) => {
                tracing::warn!(
                    target: "poll",
                    entity = %entity.id,
                    notified,
                    error = %e,
                    "seen record not committed; items will be re-evaluated next cycle"
                );
                counter!("poll_persist_errors_total").increment(1);
                EntityOutcome::PersistFailed {
                    fetched: fetched.len(),
                    notified,
                }
            }
        }
    }

    /// Items whose id is not recorded, oldest first. Publish times only order
    /// the result; they never make an unseen id count as known.
    fn partition_new<'a>(
        &self,
        record: &crate::ledger::SeenRecord,
        fetched: &'a [Item],
    ) -> Vec<&'a Item> {
        let seen = record.id_set();
        let mut fresh: Vec<&Item> = fetched
            .iter()
            .filter(|it| !seen.contains(it.id.as_str()))
            .collect();
        fresh.sort_by_key(|it| it.published);
        fresh
    }
}

async fn drain(tasks: &mut JoinSet<EntityOutcome>, report: &mut PollReport) {
    while let Some(res) = tasks.join_next().await {
        report.tally(res);
    }
}

#[async_trait::async_trait]
impl PeriodicJob for PollCycle {
    async fn run_once(&self) {
        self.run().await;
    }
}
