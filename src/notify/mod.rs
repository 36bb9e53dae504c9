// src/notify/mod.rs
//! Notification sinks.
//!
//! The engine talks to a [`NotificationSink`], which is infallible from its
//! point of view. Concrete transports implement the fallible [`Notifier`]
//! and are fanned out by [`NotifierMux`], which logs and swallows errors.

pub mod channels;
pub mod discord;
pub mod email;
pub mod slack;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;

use crate::model::{Entity, Item};

pub use channels::{setup_channels, ChannelRegistry, Importance, NotificationChannel};
pub use discord::DiscordNotifier;
pub use email::EmailNotifier;
pub use slack::SlackNotifier;

/// Logical notification channel. Only the update channel is used by polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Update,
}

impl Channel {
    pub fn descriptor(self) -> NotificationChannel {
        match self {
            Channel::Update => NotificationChannel {
                id: "notification_worker",
                name: "Notification Worker",
                description: "Shows a notification when new streams are available.",
                importance: Importance::Default,
            },
        }
    }
}

/// What the user sees for one new item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
    pub thumbnail_ref: Option<String>,
    /// Opaque id the client uses to open the item.
    pub deep_link_id: String,
}

impl NotificationPayload {
    /// Channel name as title, item title as body.
    pub fn for_item(entity: &Entity, item: &Item) -> Self {
        let body = if item.title.is_empty() {
            "New stream available".to_string()
        } else {
            item.title.clone()
        };
        Self {
            title: entity.display_name().to_string(),
            body,
            thumbnail_ref: item.thumbnail.clone(),
            deep_link_id: item.id.clone(),
        }
    }

    /// Full link when a base such as `https://piped.video/watch?v=` is known.
    pub fn link(&self, base: Option<&str>) -> Option<String> {
        base.map(|b| format!("{b}{}", self.deep_link_id))
    }
}

/// Display side of the engine. Must not fail towards the caller.
#[async_trait::async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, channel: Channel, payload: &NotificationPayload);
}

/// A single transport that can fail (webhook, SMTP, ...).
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, channel: &NotificationChannel, payload: &NotificationPayload) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Writes notifications to the log. Always on.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, channel: &NotificationChannel, payload: &NotificationPayload) -> Result<()> {
        match channel.importance {
            Importance::None | Importance::Low => tracing::debug!(
                target: "notify",
                channel = channel.id,
                title = %payload.title,
                body = %payload.body,
                id = %payload.deep_link_id,
                "notification"
            ),
            Importance::Default | Importance::High => tracing::info!(
                target: "notify",
                channel = channel.id,
                title = %payload.title,
                body = %payload.body,
                id = %payload.deep_link_id,
                "notification"
            ),
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Fan-out over every configured transport. Each `send` is bounded by
/// `send_timeout` so a hung transport cannot hold up the poll cycle.
pub struct NotifierMux {
    registry: Arc<ChannelRegistry>,
    notifiers: Vec<Box<dyn Notifier>>,
    send_timeout: Duration,
}

impl NotifierMux {
    pub fn new(registry: Arc<ChannelRegistry>) -> Self {
        Self {
            registry,
            notifiers: Vec::new(),
            send_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    pub fn with(mut self, notifier: impl Notifier + 'static) -> Self {
        self.notifiers.push(Box::new(notifier));
        self
    }

    /// Log transport plus whatever the environment configures:
    /// `DISCORD_WEBHOOK_URL`, `SLACK_WEBHOOK_URL`, `SMTP_HOST` (+ user/pass/from/to).
    /// `NOTIFY_LINK_BASE` is prepended to deep-link ids in webhook messages.
    pub fn from_env(registry: Arc<ChannelRegistry>) -> Self {
        let link_base = std::env::var("NOTIFY_LINK_BASE").ok();
        let mut mux = Self::new(registry).with(LogNotifier);

        if let Ok(url) = std::env::var("DISCORD_WEBHOOK_URL") {
            mux = mux.with(DiscordNotifier::new(url).with_link_base(link_base.clone()));
        }
        if let Ok(url) = std::env::var("SLACK_WEBHOOK_URL") {
            mux = mux.with(SlackNotifier::new(url).with_link_base(link_base.clone()));
        }
        if std::env::var("SMTP_HOST").is_ok() {
            match EmailNotifier::from_env() {
                Ok(email) => mux = mux.with(email),
                Err(e) => tracing::warn!(error = ?e, "email notifier disabled"),
            }
        }
        mux
    }

    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }
}

#[async_trait::async_trait]
impl NotificationSink for NotifierMux {
    async fn notify(&self, channel: Channel, payload: &NotificationPayload) {
        let descriptor = channel.descriptor();
        if self.registry.ensure(&descriptor) {
            tracing::warn!(channel = descriptor.id, "channel used before setup; registered now");
        }
        for n in &self.notifiers {
            match tokio::time::timeout(self.send_timeout, n.send(&descriptor, payload)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(error = ?e, notifier = n.name(), "notification delivery failed");
                }
                Err(_) => tracing::warn!(
                    notifier = n.name(),
                    timeout_ms = self.send_timeout.as_millis() as u64,
                    "notification delivery timed out"
                ),
            }
        }
    }
}
