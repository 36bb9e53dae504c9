// src/fetch/piped.rs
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::Deserialize;

use super::{http_client, normalize_title, ContentFetcher};
use crate::error::FetchError;
use crate::model::{dedup_items, Item};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PipedChannel {
    #[serde(default)]
    related_streams: Vec<PipedStream>,
}

#[derive(Debug, Deserialize)]
struct PipedStream {
    url: String,
    #[serde(default)]
    title: String,
    thumbnail: Option<String>,
    /// Epoch milliseconds; `-1` when unknown.
    uploaded: Option<i64>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

/// Piped API client (`GET {base}/channel/{id}`).
pub struct PipedFetcher {
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http {
        base_url: reqwest::Url,
        client: reqwest::Client,
    },
}

impl PipedFetcher {
    pub fn from_fixture(json: &str) -> Self {
        Self {
            mode: Mode::Fixture(json.to_string()),
        }
    }

    pub fn from_url(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            mode: Mode::Http {
                base_url: reqwest::Url::parse(base_url)
                    .with_context(|| format!("invalid piped base url {base_url:?}"))?,
                client: http_client(timeout)?,
            },
        })
    }

    async fn fetch_body(&self, entity_id: &str) -> Result<String> {
        match &self.mode {
            Mode::Fixture(s) => Ok(s.clone()),
            Mode::Http { base_url, client } => client
                .get(channel_url(base_url, entity_id)?)
                .send()
                .await
                .context("piped http get()")?
                .error_for_status()
                .context("piped non-2xx")?
                .text()
                .await
                .context("piped http .text()"),
        }
    }
}

#[async_trait]
impl ContentFetcher for PipedFetcher {
    async fn fetch(&self, entity_id: &str) -> Result<Vec<Item>, FetchError> {
        let body = self
            .fetch_body(entity_id)
            .await
            .map_err(|e| FetchError::new(entity_id, e))?;
        parse_channel(&body).map_err(|e| FetchError::new(entity_id, e))
    }

    fn name(&self) -> &'static str {
        "piped"
    }
}

/// `{base}/channel/{id}`, with the id escaped as a single path segment.
pub(crate) fn channel_url(base: &reqwest::Url, entity_id: &str) -> Result<reqwest::Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| anyhow::anyhow!("piped base url {base} cannot carry a path"))?
        .pop_if_empty()
        .push("channel")
        .push(entity_id);
    Ok(url)
}

/// Parse a Piped channel response into items.
pub fn parse_channel(json: &str) -> Result<Vec<Item>> {
    let ch: PipedChannel = serde_json::from_str(json).context("parsing piped channel json")?;
    let items = ch
        .related_streams
        .into_iter()
        .filter(|s| s.kind.as_deref().map_or(true, |k| k == "stream"))
        .filter_map(|s| {
            let id = video_id_from_url(&s.url)?;
            Some(Item {
                id,
                published: s
                    .uploaded
                    .filter(|ms| *ms > 0)
                    .and_then(DateTime::<Utc>::from_timestamp_millis),
                title: normalize_title(&s.title),
                thumbnail: s.thumbnail.filter(|t| !t.is_empty()),
            })
        })
        .collect();
    Ok(dedup_items(items))
}

/// `/watch?v=ID` -> `ID`; otherwise the last path segment (`/shorts/ID`).
fn video_id_from_url(url: &str) -> Option<String> {
    static RE_V: OnceCell<Regex> = OnceCell::new();
    let re = RE_V.get_or_init(|| Regex::new(r"[?&]v=([^&#]+)").unwrap());
    if let Some(c) = re.captures(url) {
        return Some(c[1].to_string());
    }
    let path = url.split(['?', '#']).next().unwrap_or_default();
    path.rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_ids_from_urls() {
        assert_eq!(video_id_from_url("/watch?v=abc123").as_deref(), Some("abc123"));
        assert_eq!(
            video_id_from_url("/watch?list=x&v=abc123&t=5").as_deref(),
            Some("abc123")
        );
        assert_eq!(video_id_from_url("/shorts/xyz").as_deref(), Some("xyz"));
        assert_eq!(video_id_from_url("/"), None);
    }

    #[test]
    fn parses_streams_and_skips_non_streams() {
        let json = r#"{
            "id": "UC1",
            "name": "Chan",
            "relatedStreams": [
                {"url": "/watch?v=v1", "type": "stream", "title": "One", "thumbnail": "https://t/1.jpg", "uploaded": 1714564800000},
                {"url": "/playlist?list=PL1", "type": "playlist", "title": "Pl"},
                {"url": "/watch?v=v2", "title": "Two", "uploaded": -1},
                {"url": "/watch?v=v1", "type": "stream", "title": "One again"}
            ]
        }"#;
        let items = parse_channel(json).unwrap();
        let ids: Vec<_> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["v1", "v2"]);
        assert_eq!(items[0].published.map(|t| t.timestamp()), Some(1_714_564_800));
        assert_eq!(items[1].published, None);
    }

    #[test]
    fn channel_ids_stay_one_path_segment() {
        let base = reqwest::Url::parse("https://piped.example/api/").unwrap();
        assert_eq!(
            channel_url(&base, "UCabc").unwrap().as_str(),
            "https://piped.example/api/channel/UCabc"
        );

        let url = channel_url(&base, "a/b?c#d").unwrap();
        assert_eq!(url.as_str(), "https://piped.example/api/channel/a%2Fb%3Fc%23d");
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);
    }

    #[test]
    fn rejects_unusable_base_urls() {
        assert!(PipedFetcher::from_url("not a url", Duration::from_secs(1)).is_err());
        let base = reqwest::Url::parse("mailto:someone@example.com").unwrap();
        assert!(channel_url(&base, "UCabc").is_err());
    }

    #[test]
    fn error_bodies_fail_to_parse() {
        assert!(parse_channel("<html>502</html>").is_err());
    }
}
