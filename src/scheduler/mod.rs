// src/scheduler/mod.rs
//! # Scheduler binding
//! The engine never runs its own timer. It hands a [`PeriodicJob`] and a
//! declarative [`ScheduleConfig`] to a [`HostScheduler`], which decides when
//! to trigger it. [`TokioScheduler`] is the in-process host used by the
//! daemon binary.

pub mod host;

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::error::ConfigurationError;
use crate::poll::PollCycle;

pub use host::TokioScheduler;

/// Registration name of the polling job.
pub const POLL_JOB_NAME: &str = "notification_worker";

/// Lower bound accepted for `minimum_interval` (periodic work floor).
pub const MIN_INTERVAL: Duration = Duration::from_secs(15 * 60);
/// Upper bound accepted for `minimum_interval`.
pub const MAX_INTERVAL: Duration = Duration::from_secs(7 * 24 * 3600);

/// What to do when a job with the same name is already registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExistingPolicy {
    /// Leave the existing schedule untouched.
    #[default]
    Keep,
    /// Cancel the existing schedule and install the new one.
    Replace,
}

impl FromStr for ExistingPolicy {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keep" => Ok(Self::Keep),
            "replace" => Ok(Self::Replace),
            _ => Err(ConfigurationError::UnknownPolicy(s.to_string())),
        }
    }
}

/// Cadence and constraints declared to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScheduleConfig {
    pub minimum_interval: Duration,
    pub requires_network: bool,
    pub existing_policy: ExistingPolicy,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            minimum_interval: Duration::from_secs(30 * 60),
            requires_network: true,
            existing_policy: ExistingPolicy::Keep,
        }
    }
}

impl ScheduleConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.minimum_interval < MIN_INTERVAL {
            return Err(ConfigurationError::IntervalTooShort {
                given_secs: self.minimum_interval.as_secs(),
                floor_secs: MIN_INTERVAL.as_secs(),
            });
        }
        if self.minimum_interval > MAX_INTERVAL {
            return Err(ConfigurationError::IntervalTooLong {
                given_secs: self.minimum_interval.as_secs(),
                ceiling_secs: MAX_INTERVAL.as_secs(),
            });
        }
        Ok(())
    }
}

/// Entry point the host invokes on every trigger.
#[async_trait::async_trait]
pub trait PeriodicJob: Send + Sync + 'static {
    async fn run_once(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationOutcome {
    Created,
    Kept,
    Replaced,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Registration {
    pub name: String,
    /// Distinguishes successive schedules installed under the same name.
    pub generation: u64,
    pub config: ScheduleConfig,
    pub outcome: RegistrationOutcome,
}

/// Host-side periodic trigger.
pub trait HostScheduler: Send + Sync {
    fn register(
        &self,
        name: &str,
        config: ScheduleConfig,
        job: Arc<dyn PeriodicJob>,
    ) -> Result<Registration, ConfigurationError>;

    /// Stop a schedule. Returns `false` when nothing was registered.
    fn cancel(&self, name: &str) -> bool;
}

/// Register the poll cycle under [`POLL_JOB_NAME`].
pub fn bind_poll_cycle(
    host: &dyn HostScheduler,
    cycle: Arc<PollCycle>,
    config: ScheduleConfig,
) -> Result<Registration, ConfigurationError> {
    let reg = host.register(POLL_JOB_NAME, config, cycle)?;
    tracing::info!(
        job = %reg.name,
        generation = reg.generation,
        outcome = ?reg.outcome,
        interval_secs = config.minimum_interval.as_secs(),
        requires_network = config.requires_network,
        "poll cycle bound to scheduler"
    );
    Ok(reg)
}
