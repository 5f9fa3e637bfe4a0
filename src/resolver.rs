// src/resolver.rs
use crate::config::EndpointsConfig;
use crate::errors::RadioError;
use crate::fetch::Fetcher;
use crate::station::{Station, StreamSource};
use log::{debug, info, warn};
use serde::Deserialize;
use std::sync::Arc;
use url::Url;

pub const BBS_STREAM_URL: &str = "https://bbslive.clouducs.com/bbsradio-live/livestream/playlist.m3u8";
pub const YTN_STREAM_URL: &str =
    "https://radiolive.ytn.co.kr/radio/_definst_/20211118_fmlive/playlist.m3u8";
pub const ARIRANG_STREAM_URL: &str =
    "https://amdlive-ch01-ctnd-com.akamaized.net/arirang_1ch/smil:arirang_1ch.smil/playlist.m3u8";

/// MBC's "all that music" channel has its own fixed lookup.
const MBC_ALL_THAT_MUSIC: &str = "chm";
const MBC_ALL_THAT_MUSIC_PATH: &str = "/aacplay.ashx?agent=webapp&channel=chm";

#[derive(Debug, Deserialize)]
struct KbsChannelResponse {
    #[serde(default)]
    channel_item: Vec<KbsChannelItem>,
}

#[derive(Debug, Deserialize)]
struct KbsChannelItem {
    service_url: Option<String>,
}

/// Turns a station's locator into a URL the player can open directly.
pub struct StreamResolver {
    fetcher: Arc<dyn Fetcher>,
    endpoints: EndpointsConfig,
}

impl StreamResolver {
    pub fn new(fetcher: Arc<dyn Fetcher>, endpoints: EndpointsConfig) -> Self {
        Self { fetcher, endpoints }
    }

    pub async fn resolve(&self, station: &Station) -> Result<Url, RadioError> {
        let source: StreamSource = station.source()?;
        debug!("Resolver: {} -> {:?}", station.name(), source);

        let resolved: Result<Url, RadioError> = match source {
            StreamSource::Kbs { channel_code } => self.kbs_stream(&channel_code).await,
            StreamSource::Mbc { channel } => self.mbc_stream(&channel).await,
            StreamSource::Sbs { channel } => self.sbs_stream(&channel).await,
            StreamSource::Bbs => parse_stream_url(BBS_STREAM_URL),
            StreamSource::Ytn => parse_stream_url(YTN_STREAM_URL),
            StreamSource::Arirang => parse_stream_url(ARIRANG_STREAM_URL),
            StreamSource::Direct(url) => Ok(url),
        };

        match &resolved {
            Ok(url) => info!("Resolver: stream for '{}' is {}", station.name(), url),
            Err(e) => warn!("Resolver: no stream for '{}': {}", station.name(), e),
        }
        resolved
    }

    pub fn kbs_lookup_url(&self, channel_code: &str) -> String {
        format!(
            "{}/api/v1/landing/live/channel_code/{}",
            self.endpoints.kbs_api.trim_end_matches('/'),
            channel_code
        )
    }

    pub fn mbc_lookup_url(&self, channel: &str) -> String {
        let base = self.endpoints.mbc_stream.trim_end_matches('/');
        if channel == MBC_ALL_THAT_MUSIC {
            return format!("{}{}", base, MBC_ALL_THAT_MUSIC_PATH);
        }
        format!("{}/aacplay.ashx?agent=webapp&channel={}", base, channel)
    }

    pub fn sbs_lookup_url(&self, channel: &str) -> String {
        format!(
            "{}/play-api/1.0/livestream/{}pc/{}fm?protocol=hls&ssl=Y",
            self.endpoints.sbs_api.trim_end_matches('/'),
            channel,
            channel
        )
    }

    async fn kbs_stream(&self, channel_code: &str) -> Result<Url, RadioError> {
        let body: String = self.fetcher.fetch(&self.kbs_lookup_url(channel_code)).await?;
        let response: KbsChannelResponse = serde_json::from_str(&body).map_err(|e| {
            RadioError::NoStreamFound(format!("KBS channel {} lookup: {}", channel_code, e))
        })?;

        let service_url: String = response
            .channel_item
            .into_iter()
            .next()
            .and_then(|item| item.service_url)
            .ok_or_else(|| {
                RadioError::NoStreamFound(format!("KBS channel {} has no service_url", channel_code))
            })?;
        parse_stream_url(&service_url)
    }

    async fn mbc_stream(&self, channel: &str) -> Result<Url, RadioError> {
        let body: String = self.fetcher.fetch(&self.mbc_lookup_url(channel)).await?;
        plain_text_stream(&body, &format!("MBC channel {}", channel))
    }

    async fn sbs_stream(&self, channel: &str) -> Result<Url, RadioError> {
        let body: String = self.fetcher.fetch(&self.sbs_lookup_url(channel)).await?;
        plain_text_stream(&body, &format!("SBS channel {}", channel))
    }
}

fn plain_text_stream(body: &str, what: &str) -> Result<Url, RadioError> {
    let trimmed: &str = body.trim();
    if trimmed.is_empty() {
        return Err(RadioError::NoStreamFound(format!("{} returned an empty body", what)));
    }
    parse_stream_url(trimmed)
}

fn parse_stream_url(raw: &str) -> Result<Url, RadioError> {
    Url::parse(raw).map_err(|e| RadioError::InvalidUrl(format!("{}: {}", raw, e)))
}
