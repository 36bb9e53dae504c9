// src/subscriptions.rs
use anyhow::{anyhow, Context, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::model::Entity;

/// Followed entities. Read-only from the engine's point of view.
#[async_trait::async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn list_entities(&self) -> Result<Vec<Entity>>;
}

/// Fixed list, for tests and embedders that own the subscription list.
#[derive(Debug, Clone, Default)]
pub struct StaticSubscriptions {
    entities: Vec<Entity>,
}

impl StaticSubscriptions {
    pub fn new(entities: Vec<Entity>) -> Self {
        Self {
            entities: clean_entities(entities),
        }
    }
}

#[async_trait::async_trait]
impl SubscriptionStore for StaticSubscriptions {
    async fn list_entities(&self) -> Result<Vec<Entity>> {
        Ok(self.entities.clone())
    }
}

/// Subscriptions kept in a TOML or JSON file, re-read on every call so edits
/// are picked up by the next cycle. A missing file means "no subscriptions".
///
/// TOML:
/// ```toml
/// [[channel]]
/// id = "UC..."
/// name = "Some channel"
/// ```
/// JSON: `[{"id": "UC...", "name": "Some channel"}]`
#[derive(Debug, Clone)]
pub struct FileSubscriptionStore {
    path: PathBuf,
}

impl FileSubscriptionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl SubscriptionStore for FileSubscriptionStore {
    async fn list_entities(&self) -> Result<Vec<Entity>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no subscriptions file");
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("reading subscriptions from {}", self.path.display()))
            }
        };
        let ext = self
            .path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        parse_subscriptions(&content, &ext)
    }
}

fn parse_subscriptions(s: &str, hint_ext: &str) -> Result<Vec<Entity>> {
    // Try TOML first if hinted or content looks like toml.
    let try_toml = hint_ext == "toml" || s.contains("[[channel]]");
    if try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    if let Ok(v) = parse_json(s) {
        return Ok(v);
    }
    if !try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    Err(anyhow!("unsupported subscriptions format"))
}

fn parse_toml(s: &str) -> Result<Vec<Entity>> {
    #[derive(serde::Deserialize)]
    struct TomlSubs {
        #[serde(default)]
        channel: Vec<Entity>,
    }
    let v: TomlSubs = toml::from_str(s)?;
    Ok(clean_entities(v.channel))
}

fn parse_json(s: &str) -> Result<Vec<Entity>> {
    let v: Vec<Entity> = serde_json::from_str(s)?;
    Ok(clean_entities(v))
}

/// Trim ids, drop blank ones, keep the first entry per id.
fn clean_entities(items: Vec<Entity>) -> Vec<Entity> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(items.len());
    for mut it in items {
        it.id = it.id.trim().to_string();
        if it.id.is_empty() || !seen.insert(it.id.clone()) {
            continue;
        }
        it.name = it.name.trim().to_string();
        out.push(it);
    }
    out
}
