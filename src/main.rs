//! stream-notifier daemon entrypoint.
//! Loads config, registers notification channels once, binds the poll cycle
//! to the in-process scheduler and optionally serves the status endpoint.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use stream_notifier::api::{self, AppState};
use stream_notifier::config::AppConfig;
use stream_notifier::metrics::Metrics;
use stream_notifier::network::{AlwaysOnline, NetworkMonitor, TcpProbe};
use stream_notifier::notify::{setup_channels, ChannelRegistry, NotifierMux};
use stream_notifier::scheduler::{bind_poll_cycle, TokioScheduler};

/// Compact human logs by default; `LOG_FORMAT=json` for structured output.
/// Filter from `RUST_LOG`, falling back to `stream_notifier=info,warn`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("stream_notifier=info,poll=info,notify=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .ok()
        .is_some_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::load_default().context("loading configuration")?;
    let schedule = cfg.schedule_config()?;
    let settings = cfg.poll_settings()?;

    // Channels are registered once per process, independent of polling.
    let registry = Arc::new(ChannelRegistry::new());
    let created = setup_channels(&registry);
    tracing::info!(created, "notification channels ready");

    let sink = Arc::new(NotifierMux::from_env(registry.clone()));
    tracing::info!(notifiers = sink.len(), "notifier mux ready");

    let cycle = Arc::new(stream_notifier::build_poll_cycle(&cfg, sink)?);

    let network: Arc<dyn NetworkMonitor> = if schedule.requires_network {
        Arc::new(TcpProbe::new(
            cfg.network.probe_addr.clone(),
            Duration::from_millis(cfg.network.probe_timeout_ms),
        ))
    } else {
        Arc::new(AlwaysOnline)
    };

    // The recorder must be in place before the first trigger fires, or the
    // metric descriptions land on the no-op recorder.
    let metrics = if cfg.http.metrics_addr.is_some() {
        match Metrics::init(&schedule, &settings) {
            Ok(m) => Some(m.handle),
            Err(e) => {
                tracing::warn!(error = ?e, "metrics disabled");
                None
            }
        }
    } else {
        None
    };

    let host = TokioScheduler::new(network, Duration::from_secs(cfg.network.recheck_secs));
    let registration = bind_poll_cycle(&host, cycle.clone(), schedule)?;

    if let Some(addr) = cfg.http.metrics_addr.as_deref() {
        let state = AppState {
            reports: cycle.reports(),
            registration: Some(registration),
            metrics,
        };
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("binding status server on {addr}"))?;
        tracing::info!(%addr, "status server listening");
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, api::create_router(state)).await {
                tracing::error!(error = ?e, "status server stopped");
            }
        });
    }

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    tracing::info!("shutting down");
    drop(host);
    Ok(())
}
