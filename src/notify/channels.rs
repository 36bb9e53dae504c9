// src/notify/channels.rs
use std::collections::HashMap;
use std::sync::Mutex;

use serde::Serialize;

use super::Channel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Importance {
    None,
    Low,
    Default,
    High,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationChannel {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub importance: Importance,
}

/// Channels known to the display side. Registering twice is a no-op.
#[derive(Debug, Default)]
pub struct ChannelRegistry {
    channels: Mutex<HashMap<&'static str, NotificationChannel>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` only when the channel was not registered before.
    pub fn ensure(&self, channel: &NotificationChannel) -> bool {
        let mut map = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        if map.contains_key(channel.id) {
            return false;
        }
        map.insert(channel.id, channel.clone());
        true
    }

    pub fn get(&self, id: &str) -> Option<NotificationChannel> {
        let map = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        map.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.channels.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One-time start-up step: register every channel the process posts to.
/// Returns how many channels were newly registered.
pub fn setup_channels(registry: &ChannelRegistry) -> usize {
    let mut created = 0;
    for ch in [Channel::Update] {
        let d = ch.descriptor();
        if registry.ensure(&d) {
            tracing::debug!(channel = d.id, "notification channel registered");
            created += 1;
        }
    }
    created
}
