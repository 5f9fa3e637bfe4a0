// src/feed.rs
use crate::episode::Episode;
use crate::errors::RadioError;
use crate::fetch::Fetcher;
use chrono::{DateTime, Utc};
use log::{debug, info};
use regex::Regex;
use rss::{Channel, Item};
use std::sync::{Arc, LazyLock};
use url::Url;

static COLON_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+):").expect("valid colon number pattern"));
static HASH_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#(\d+)").expect("valid hash number pattern"));
static COLON_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+:\s*").expect("valid colon prefix pattern"));
static HASH_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#\d+\s*").expect("valid hash prefix pattern"));
static FIRST_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<item\b.*?</item>").expect("valid item pattern"));
static ENCLOSURE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<enclosure\b[^>]*>").expect("valid enclosure pattern"));
static URL_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\burl\s*=\s*["']([^"']*)["']"#).expect("valid url pattern"));
static TYPE_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\btype\s*=\s*["']([^"']*)["']"#).expect("valid type pattern"));

/// Picks the latest episode out of a podcast feed.
pub struct FeedParser {
    fetcher: Arc<dyn Fetcher>,
}

impl FeedParser {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher }
    }

    pub async fn latest_episode(&self, feed_url: &str) -> Result<Episode, RadioError> {
        info!("FeedParser: fetching feed {}", feed_url);
        let content: String = self.fetcher.fetch(feed_url).await?;
        debug!("FeedParser: feed fetched, length: {}", content.len());
        let episode = parse_latest_episode(&content)?;
        info!("FeedParser: latest episode of {} is '{}'", feed_url, episode.title());
        Ok(episode)
    }
}

/// The first `<item>` of the document is the latest episode.
pub fn parse_latest_episode(content: &str) -> Result<Episode, RadioError> {
    let channel: Channel = Channel::read_from(content.as_bytes())
        .map_err(|e| RadioError::NoStreamFound(format!("malformed feed: {}", e)))?;

    let item: &Item = channel
        .items()
        .first()
        .ok_or_else(|| RadioError::NoStreamFound("feed has no episodes".to_string()))?;

    let raw_title: &str = item
        .title()
        .map(str::trim)
        .ok_or_else(|| RadioError::NoStreamFound("latest episode has no title".to_string()))?;
    let (number, title) = split_episode_number(raw_title);

    // `rss` keeps only the last <enclosure> of an item; fall back to the raw
    // first item when that one is not audio.
    let raw_audio_url: String = match item.enclosure() {
        Some(enclosure) if enclosure.mime_type().starts_with("audio/") => {
            enclosure.url().to_string()
        }
        _ => first_audio_enclosure(content).ok_or_else(|| {
            RadioError::NoStreamFound("latest episode has no audio enclosure".to_string())
        })?,
    };
    let audio_url: Url = Url::parse(raw_audio_url.trim()).map_err(|e| {
        RadioError::NoStreamFound(format!("bad enclosure url '{}': {}", raw_audio_url, e))
    })?;

    let published: Option<DateTime<Utc>> = item
        .pub_date()
        .and_then(|s| DateTime::parse_from_rfc2822(s).ok())
        .map(|dt| dt.with_timezone(&Utc));

    Ok(Episode::new(title, number, audio_url, published))
}

/// url of the first `audio/*` enclosure inside the first `<item>` block.
fn first_audio_enclosure(content: &str) -> Option<String> {
    let item: &str = FIRST_ITEM.find(content)?.as_str();
    ENCLOSURE_TAG.find_iter(item).find_map(|tag| {
        let tag: &str = tag.as_str();
        let mime_type = TYPE_ATTR.captures(tag)?;
        if !mime_type[1].trim().starts_with("audio/") {
            return None;
        }
        let url = URL_ATTR.captures(tag)?;
        Some(url[1].replace("&amp;", "&"))
    })
}

/// Splits a leading episode number off a feed title.
///
/// `"928: Title"` and `"#928 Title"` both give `(Some("928"), "Title")`. The
/// colon form is tried first and whichever form matches also decides which
/// prefix gets stripped. A `#n` later in the title yields the number but
/// leaves the title as is.
pub fn split_episode_number(raw_title: &str) -> (Option<String>, String) {
    if let Some(caps) = COLON_NUMBER.captures(raw_title) {
        let title = COLON_PREFIX.replace(raw_title, "").into_owned();
        return (Some(caps[1].to_string()), title);
    }
    if let Some(caps) = HASH_NUMBER.captures(raw_title) {
        let title = HASH_PREFIX.replace(raw_title, "").into_owned();
        return (Some(caps[1].to_string()), title);
    }
    (None, raw_title.to_string())
}
