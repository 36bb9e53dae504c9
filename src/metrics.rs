use anyhow::{Context, Result};
use metrics::gauge;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::poll::PollSettings;
use crate::scheduler::ScheduleConfig;

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder, describe the poll series and
    /// publish the static configuration gauges. Fails if a recorder is
    /// already installed.
    pub fn init(schedule: &ScheduleConfig, poll: &PollSettings) -> Result<Self> {
        // Default buckets avoid API differences across crate versions.
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;

        // A run may already have described its series on the no-op recorder.
        crate::poll::describe_metrics();

        gauge!("poll_min_interval_secs").set(schedule.minimum_interval.as_secs() as f64);
        gauge!("poll_max_seen_per_entity").set(poll.max_seen_per_entity as f64);

        Ok(Self { handle })
    }
}
