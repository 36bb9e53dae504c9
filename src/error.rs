// src/error.rs
//! Error taxonomy of the polling engine.
//!
//! `FetchError` and `PersistenceError` are scoped to a single entity and are
//! contained inside a poll cycle. `ConfigurationError` is fatal at start-up
//! and surfaces to whoever embeds the engine.

use thiserror::Error;

/// Fetching the current items of one entity failed (network or parse).
#[derive(Debug, Error)]
#[error("fetch failed for entity {entity_id}: {cause:#}")]
pub struct FetchError {
    pub entity_id: String,
    #[source]
    pub cause: anyhow::Error,
}

impl FetchError {
    pub fn new(entity_id: impl Into<String>, cause: impl Into<anyhow::Error>) -> Self {
        Self {
            entity_id: entity_id.into(),
            cause: cause.into(),
        }
    }
}

/// Writing a seen record failed; the record counts as not committed.
#[derive(Debug, Error)]
#[error("persisting seen record for entity {entity_id} failed: {cause:#}")]
pub struct PersistenceError {
    pub entity_id: String,
    #[source]
    pub cause: anyhow::Error,
}

impl PersistenceError {
    pub fn new(entity_id: impl Into<String>, cause: impl Into<anyhow::Error>) -> Self {
        Self {
            entity_id: entity_id.into(),
            cause: cause.into(),
        }
    }
}

/// Malformed scheduler registration or application configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("minimum interval {given_secs}s is below the floor of {floor_secs}s")]
    IntervalTooShort { given_secs: u64, floor_secs: u64 },

    #[error("minimum interval {given_secs}s exceeds the ceiling of {ceiling_secs}s")]
    IntervalTooLong { given_secs: u64, ceiling_secs: u64 },

    #[error("unknown existing-registration policy: {0:?} (expected \"keep\" or \"replace\")")]
    UnknownPolicy(String),

    #[error("job name must not be empty")]
    EmptyJobName,

    #[error("invalid value for `{field}`: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}
