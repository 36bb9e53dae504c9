// src/fetch/atom.rs
//! Channel uploads feed in Atom format (the `feeds/videos.xml` endpoint).
//!
//! Parsed with the quick-xml pull reader on local names, so the `yt:` and
//! `media:` prefixes do not matter.

use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::histogram;
use quick_xml::events::Event;
use quick_xml::Reader;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use super::{http_client, normalize_title, ContentFetcher};
use crate::error::FetchError;
use crate::model::{dedup_items, Item};

pub struct AtomFeedFetcher {
    mode: Mode,
}

enum Mode {
    // Same document for every entity; used by tests and the demo binary.
    Fixture(String),
    Http {
        base_url: String,
        client: reqwest::Client,
    },
}

impl AtomFeedFetcher {
    pub fn from_fixture(xml: &str) -> Self {
        Self {
            mode: Mode::Fixture(xml.to_string()),
        }
    }

    pub fn from_url(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            mode: Mode::Http {
                base_url: base_url.trim_end_matches('/').to_string(),
                client: http_client(timeout)?,
            },
        })
    }

    async fn fetch_body(&self, entity_id: &str) -> Result<String> {
        match &self.mode {
            Mode::Fixture(s) => Ok(s.clone()),
            Mode::Http { base_url, client } => {
                let url = format!("{base_url}/feeds/videos.xml");
                client
                    .get(&url)
                    .query(&[("channel_id", entity_id)])
                    .send()
                    .await
                    .context("atom http get()")?
                    .error_for_status()
                    .context("atom non-2xx")?
                    .text()
                    .await
                    .context("atom http .text()")
            }
        }
    }
}

#[async_trait]
impl ContentFetcher for AtomFeedFetcher {
    async fn fetch(&self, entity_id: &str) -> Result<Vec<Item>, FetchError> {
        let body = self
            .fetch_body(entity_id)
            .await
            .map_err(|e| FetchError::new(entity_id, e))?;
        let t0 = Instant::now();
        let items = parse_feed(&body).map_err(|e| FetchError::new(entity_id, e))?;
        histogram!("fetch_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        Ok(items)
    }

    fn name(&self) -> &'static str {
        "atom"
    }
}

#[derive(Default)]
struct EntryBuf {
    video_id: Option<String>,
    atom_id: Option<String>,
    title: Option<String>,
    published: Option<String>,
    thumbnail: Option<String>,
}

impl EntryBuf {
    fn into_item(self) -> Option<Item> {
        let id = self
            .video_id
            .or_else(|| self.atom_id.map(|s| s.rsplit(':').next().unwrap_or(&s).to_string()))?;
        Some(Item {
            id: id.trim().to_string(),
            published: self.published.as_deref().and_then(parse_rfc3339),
            title: normalize_title(self.title.as_deref().unwrap_or_default()),
            thumbnail: self.thumbnail,
        })
    }
}

/// Parse an Atom document into items. Entries without any id are skipped.
pub fn parse_feed(xml: &str) -> Result<Vec<Item>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut items = Vec::new();
    let mut entry: Option<EntryBuf> = None;
    let mut current: Vec<u8> = Vec::new();
    let mut saw_feed = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.local_name().as_ref().to_vec();
                match name.as_slice() {
                    b"feed" => saw_feed = true,
                    b"entry" => entry = Some(EntryBuf::default()),
                    _ => {}
                }
                current = name;
            }
            Ok(Event::Empty(e)) => {
                if let (Some(buf), b"thumbnail") = (entry.as_mut(), e.local_name().as_ref()) {
                    for attr in e.attributes().flatten() {
                        if attr.key.local_name().as_ref() == b"url" && buf.thumbnail.is_none() {
                            buf.thumbnail = Some(attr.unescape_value()?.into_owned());
                        }
                    }
                }
            }
            Ok(Event::Text(t)) => {
                if let Some(buf) = entry.as_mut() {
                    let text = t.unescape()?.into_owned();
                    assign_text(buf, &current, text);
                }
            }
            Ok(Event::CData(c)) => {
                if let Some(buf) = entry.as_mut() {
                    let text = String::from_utf8_lossy(&c).into_owned();
                    assign_text(buf, &current, text);
                }
            }
            Ok(Event::End(e)) => {
                if e.local_name().as_ref() == b"entry" {
                    if let Some(it) = entry.take().and_then(EntryBuf::into_item) {
                        items.push(it);
                    }
                }
                current.clear();
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(anyhow!(
                    "atom parse error at byte {}: {e}",
                    reader.buffer_position()
                ))
            }
        }
    }

    if !saw_feed {
        return Err(anyhow!("document has no <feed> root"));
    }
    Ok(dedup_items(items))
}

fn assign_text(buf: &mut EntryBuf, element: &[u8], text: String) {
    match element {
        b"videoId" => buf.video_id = Some(text),
        b"id" => buf.atom_id = Some(text),
        // media:title duplicates the entry title; keep the first one
        b"title" if buf.title.is_none() => buf.title = Some(text),
        b"published" => buf.published = Some(text),
        _ => {}
    }
}

fn parse_rfc3339(ts: &str) -> Option<DateTime<Utc>> {
    let dt = OffsetDateTime::parse(ts.trim(), &Rfc3339).ok()?;
    DateTime::from_timestamp(dt.unix_timestamp(), dt.nanosecond())
}
