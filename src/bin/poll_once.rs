//! Run a single poll cycle with the configured collaborators and print the
//! report. Handy for cron-style hosts and for checking a config by hand.
//!
//! `--log-only` skips webhook/email notifiers and only logs notifications.

use std::sync::Arc;

use stream_notifier::config::AppConfig;
use stream_notifier::notify::{setup_channels, ChannelRegistry, LogNotifier, NotifierMux};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_target(false).init();

    let log_only = std::env::args().any(|a| a == "--log-only");
    let cfg = AppConfig::load_default()?;

    let registry = Arc::new(ChannelRegistry::new());
    setup_channels(&registry);
    let sink = if log_only {
        NotifierMux::new(registry).with(LogNotifier)
    } else {
        NotifierMux::from_env(registry)
    };

    let cycle = stream_notifier::build_poll_cycle(&cfg, Arc::new(sink))?;
    let report = cycle.run().await;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
