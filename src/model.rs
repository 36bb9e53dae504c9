// src/model.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A followed content source (a channel).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Entity {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

impl Entity {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    /// Name for display; falls back to the id when the name is blank.
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

/// One published stream/video belonging to an [`Entity`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Item {
    pub id: String, // unique within the entity
    pub published: Option<DateTime<Utc>>,
    pub title: String,
    pub thumbnail: Option<String>,
}

impl Item {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            published: None,
            title: title.into(),
            thumbnail: None,
        }
    }

    pub fn published_at(mut self, ts: DateTime<Utc>) -> Self {
        self.published = Some(ts);
        self
    }

    pub fn with_thumbnail(mut self, url: impl Into<String>) -> Self {
        self.thumbnail = Some(url.into());
        self
    }
}

/// Drop items without an id and collapse repeated ids (first occurrence wins).
pub fn dedup_items(items: Vec<Item>) -> Vec<Item> {
    let mut seen = std::collections::HashSet::new();
    items
        .into_iter()
        .filter(|it| !it.id.trim().is_empty())
        .filter(|it| seen.insert(it.id.clone()))
        .collect()
}
