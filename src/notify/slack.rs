use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;

use super::{NotificationChannel, NotificationPayload, Notifier};

pub struct SlackNotifier {
    webhook_url: String,
    client: Client,
    timeout: Duration,
    link_base: Option<String>,
}

impl SlackNotifier {
    pub fn new(url: String) -> Self {
        Self {
            webhook_url: url,
            client: Client::new(),
            timeout: Duration::from_secs(5),
            link_base: None,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_link_base(mut self, base: Option<String>) -> Self {
        self.link_base = base;
        self
    }

    fn text(&self, payload: &NotificationPayload) -> String {
        match payload.link(self.link_base.as_deref()) {
            Some(link) => format!("*{}*\n<{}|{}>", payload.title, link, payload.body),
            None => format!("*{}*\n{}", payload.title, payload.body),
        }
    }
}

#[async_trait::async_trait]
impl Notifier for SlackNotifier {
    async fn send(&self, _channel: &NotificationChannel, payload: &NotificationPayload) -> Result<()> {
        let body = serde_json::json!({ "text": self.text(payload) });

        self.client
            .post(&self.webhook_url)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .context("slack post")?
            .error_for_status()
            .context("slack non-2xx")?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "slack"
    }
}
