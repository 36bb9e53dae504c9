// src/fetch/mod.rs
pub mod atom;
pub mod piped;

use std::sync::Arc;

use once_cell::sync::OnceCell;
use regex::Regex;

use crate::config::{FetcherConfig, FetcherKind};
use crate::error::FetchError;
use crate::model::Item;

pub use atom::AtomFeedFetcher;
pub use piped::PipedFetcher;

/// Source of the currently published items of one entity.
///
/// No ordering is promised; callers must not assume newest-first.
#[async_trait::async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, entity_id: &str) -> Result<Vec<Item>, FetchError>;
    fn name(&self) -> &'static str;
}

/// Build the HTTP-backed fetcher selected in config.
pub fn from_config(cfg: &FetcherConfig) -> anyhow::Result<Arc<dyn ContentFetcher>> {
    let timeout = std::time::Duration::from_secs(cfg.timeout_secs);
    Ok(match cfg.kind {
        FetcherKind::Atom => Arc::new(AtomFeedFetcher::from_url(&cfg.base_url, timeout)?),
        FetcherKind::Piped => Arc::new(PipedFetcher::from_url(&cfg.base_url, timeout)?),
    })
}

/// Normalize a title for display: decode entities, strip tags, collapse
/// whitespace, cap length.
pub fn normalize_title(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    if out.chars().count() > 300 {
        out = out.chars().take(300).collect();
    }
    out
}

pub(crate) fn http_client(timeout: std::time::Duration) -> anyhow::Result<reqwest::Client> {
    use anyhow::Context;
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("stream-notifier/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("building http client")
}
