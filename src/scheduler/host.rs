// src/scheduler/host.rs
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::{
    ExistingPolicy, HostScheduler, PeriodicJob, Registration, RegistrationOutcome, ScheduleConfig,
};
use crate::error::ConfigurationError;
use crate::network::NetworkMonitor;

struct Entry {
    registration: Registration,
    handle: JoinHandle<()>,
}

/// In-process host: one tokio task per registered job.
///
/// Each task runs its job sequentially, so runs of one job never overlap,
/// and two run starts are always at least `minimum_interval` apart. When the
/// schedule requires network, a trigger waits (re-checking every `recheck`)
/// until the monitor reports connectivity.
///
/// `register` spawns onto the current tokio runtime and must be called from
/// within one.
pub struct TokioScheduler {
    network: Arc<dyn NetworkMonitor>,
    recheck: Duration,
    entries: Mutex<HashMap<String, Entry>>,
    next_generation: AtomicU64,
}

impl TokioScheduler {
    pub fn new(network: Arc<dyn NetworkMonitor>, recheck: Duration) -> Self {
        Self {
            network,
            recheck: recheck.max(Duration::from_millis(10)),
            entries: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(1),
        }
    }

    pub fn registration(&self, name: &str) -> Option<Registration> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .get(name)
            .filter(|e| !e.handle.is_finished())
            .map(|e| e.registration.clone())
    }

    /// Number of live schedules.
    pub fn active(&self) -> usize {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.values().filter(|e| !e.handle.is_finished()).count()
    }
}

impl HostScheduler for TokioScheduler {
    fn register(
        &self,
        name: &str,
        config: ScheduleConfig,
        job: Arc<dyn PeriodicJob>,
    ) -> Result<Registration, ConfigurationError> {
        if name.trim().is_empty() {
            return Err(ConfigurationError::EmptyJobName);
        }
        config.validate()?;

        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let mut outcome = RegistrationOutcome::Created;
        if let Some(existing) = entries.get(name) {
            if !existing.handle.is_finished() {
                match config.existing_policy {
                    ExistingPolicy::Keep => {
                        tracing::debug!(job = name, "schedule exists; keeping it");
                        return Ok(Registration {
                            outcome: RegistrationOutcome::Kept,
                            ..existing.registration.clone()
                        });
                    }
                    ExistingPolicy::Replace => {
                        existing.handle.abort();
                        outcome = RegistrationOutcome::Replaced;
                    }
                }
            }
        }

        // A replaced run is cancelled, not stopped; the new drive waits for it
        // to unwind before its first trigger.
        let previous = match outcome {
            RegistrationOutcome::Replaced => entries.remove(name).map(|e| e.handle),
            _ => None,
        };

        let registration = Registration {
            name: name.to_string(),
            generation: self.next_generation.fetch_add(1, Ordering::Relaxed),
            config,
            outcome,
        };
        let handle = tokio::spawn(drive(
            name.to_string(),
            job,
            config,
            self.network.clone(),
            self.recheck,
            previous,
        ));
        entries.insert(
            name.to_string(),
            Entry {
                registration: registration.clone(),
                handle,
            },
        );
        Ok(registration)
    }

    fn cancel(&self, name: &str) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.remove(name) {
            Some(e) => {
                e.handle.abort();
                true
            }
            None => false,
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        let entries = self.entries.get_mut().unwrap_or_else(|e| e.into_inner());
        for e in entries.values() {
            e.handle.abort();
        }
    }
}

async fn drive(
    name: String,
    job: Arc<dyn PeriodicJob>,
    config: ScheduleConfig,
    network: Arc<dyn NetworkMonitor>,
    recheck: Duration,
    previous: Option<JoinHandle<()>>,
) {
    if let Some(prev) = previous {
        let _ = prev.await;
    }
    loop {
        if config.requires_network {
            wait_for_network(&name, network.as_ref(), recheck).await;
        }
        let started = Instant::now();
        tracing::debug!(job = %name, "trigger");
        job.run_once().await;
        tokio::time::sleep_until(started + config.minimum_interval).await;
    }
}

async fn wait_for_network(name: &str, network: &dyn NetworkMonitor, recheck: Duration) {
    let mut deferred = false;
    while !network.is_available().await {
        if !deferred {
            tracing::info!(job = name, "network unavailable; trigger deferred");
            deferred = true;
        }
        tokio::time::sleep(recheck).await;
    }
    if deferred {
        tracing::info!(job = name, "network back; running deferred trigger");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::AlwaysOnline;
    use std::sync::atomic::AtomicUsize;

    struct Counter(AtomicUsize);

    #[async_trait::async_trait]
    impl PeriodicJob for Counter {
        async fn run_once(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn runs_are_spaced_by_minimum_interval() {
        let host = TokioScheduler::new(Arc::new(AlwaysOnline), Duration::from_secs(60));
        let job = Arc::new(Counter(AtomicUsize::new(0)));
        let cfg = ScheduleConfig {
            requires_network: false,
            ..ScheduleConfig::default()
        };
        host.register("job", cfg, job.clone()).unwrap();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(job.0.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(30 * 60)).await;
        assert_eq!(job.0.load(Ordering::SeqCst), 2);
    }

    struct Exclusive {
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    struct Leave<'a>(&'a AtomicUsize);

    impl Drop for Leave<'_> {
        fn drop(&mut self) {
            self.0.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[async_trait::async_trait]
    impl PeriodicJob for Exclusive {
        async fn run_once(&self) {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            let _leave = Leave(&self.active);
            tokio::time::sleep(Duration::from_secs(600)).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn replaced_run_unwinds_before_the_new_one_starts() {
        let host = TokioScheduler::new(Arc::new(AlwaysOnline), Duration::from_secs(60));
        let job = Arc::new(Exclusive {
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let cfg = ScheduleConfig {
            requires_network: false,
            existing_policy: ExistingPolicy::Replace,
            ..ScheduleConfig::default()
        };
        host.register("job", cfg, job.clone()).unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(job.active.load(Ordering::SeqCst), 1);

        let reg = host.register("job", cfg, job.clone()).unwrap();
        assert_eq!(reg.outcome, RegistrationOutcome::Replaced);
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(job.active.load(Ordering::SeqCst), 1);
        assert_eq!(job.peak.load(Ordering::SeqCst), 1);
        assert_eq!(host.active(), 1);
    }

    #[tokio::test]
    async fn empty_name_is_rejected() {
        let host = TokioScheduler::new(Arc::new(AlwaysOnline), Duration::from_secs(1));
        let job = Arc::new(Counter(AtomicUsize::new(0)));
        assert_eq!(
            host.register(" ", ScheduleConfig::default(), job).unwrap_err(),
            ConfigurationError::EmptyJobName
        );
    }
}
