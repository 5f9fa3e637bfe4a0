// src/station.rs
use crate::errors::RadioError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use url::Url;

static NEXT_STATION_ID: AtomicU64 = AtomicU64::new(1);

// === STATION STRUCTURES ===
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StationId(u64);

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Korean,
    International,
    Podcast,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Korean, Category::International, Category::Podcast];

    pub fn label(&self) -> &'static str {
        match self {
            Category::Korean => "Korean",
            Category::International => "International",
            Category::Podcast => "Podcast",
        }
    }

    /// User-facing message for a failed resolution of a station in this category.
    pub fn connection_failed_message(&self, station_name: &str) -> String {
        match self {
            Category::Korean => format!("Korean radio connection failed: {}", station_name),
            Category::International => {
                format!("International radio connection failed: {}", station_name)
            }
            Category::Podcast => format!("Podcast load failed: {}", station_name),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A catalog entry. Immutable once built; shared as `Arc<Station>`.
///
/// Equality is identity: two stations with the same name and url built
/// separately are different stations.
#[derive(Debug, Clone)]
pub struct Station {
    id: StationId,
    name: String,
    url: String,
    category: Category,
}

impl PartialEq for Station {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Station {}

impl Station {
    pub fn new(name: &str, url: &str, category: Category) -> Self {
        let id = StationId(NEXT_STATION_ID.fetch_add(1, Ordering::Relaxed));
        Self { id, name: name.to_string(), url: url.to_string(), category }
    }

    pub fn id(&self) -> StationId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn source(&self) -> Result<StreamSource, RadioError> {
        StreamSource::parse(&self.url)
    }
}

impl fmt::Display for Station {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] {}", self.name, self.category, self.url)
    }
}

// === STREAM SOURCES ===

/// Where a station's audio comes from, parsed from its catalog locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamSource {
    Kbs { channel_code: String },
    Mbc { channel: String },
    Sbs { channel: String },
    Bbs,
    Ytn,
    Arirang,
    Direct(Url),
}

impl StreamSource {
    pub fn parse(locator: &str) -> Result<Self, RadioError> {
        let locator = locator.trim();
        let Some((scheme, rest)) = locator.split_once("://") else {
            return Err(RadioError::InvalidUrl(locator.to_string()));
        };

        let identifier = |rest: &str| -> Result<String, RadioError> {
            if rest.is_empty() {
                Err(RadioError::InvalidUrl(format!("missing channel in '{}'", locator)))
            } else {
                Ok(rest.to_string())
            }
        };

        match scheme {
            "kbs" => Ok(StreamSource::Kbs { channel_code: identifier(rest)? }),
            "mbc" => Ok(StreamSource::Mbc { channel: identifier(rest)? }),
            "sbs" => Ok(StreamSource::Sbs { channel: identifier(rest)? }),
            "bbs" => Ok(StreamSource::Bbs),
            "ytn" => Ok(StreamSource::Ytn),
            "arirang" => Ok(StreamSource::Arirang),
            "http" | "https" => Url::parse(locator)
                .map(StreamSource::Direct)
                .map_err(|e| RadioError::InvalidUrl(format!("{}: {}", locator, e))),
            _ => Err(RadioError::InvalidUrl(locator.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_broadcaster_schemes() {
        assert_eq!(
            StreamSource::parse("kbs://21").unwrap(),
            StreamSource::Kbs { channel_code: "21".to_string() }
        );
        assert_eq!(
            StreamSource::parse("mbc://chm").unwrap(),
            StreamSource::Mbc { channel: "chm".to_string() }
        );
        assert_eq!(
            StreamSource::parse("sbs://power").unwrap(),
            StreamSource::Sbs { channel: "power".to_string() }
        );
        assert_eq!(StreamSource::parse("bbs://main").unwrap(), StreamSource::Bbs);
        assert_eq!(StreamSource::parse("ytn://anything").unwrap(), StreamSource::Ytn);
        assert_eq!(StreamSource::parse("arirang://main").unwrap(), StreamSource::Arirang);
    }

    #[test]
    fn test_parse_literal_url() {
        let source = StreamSource::parse("https://n35a-e2.revma.ihrhls.com/zc181").unwrap();
        match source {
            StreamSource::Direct(url) => assert_eq!(url.host_str(), Some("n35a-e2.revma.ihrhls.com")),
            other => panic!("expected direct source, got {:?}", other),
        }
    }

    // SAD PATHS

    #[test]
    fn test_parse_rejects_unknown_and_malformed() {
        assert!(matches!(StreamSource::parse("ebs://fm"), Err(RadioError::InvalidUrl(_))));
        assert!(matches!(StreamSource::parse("not a url"), Err(RadioError::InvalidUrl(_))));
        assert!(matches!(StreamSource::parse("kbs://"), Err(RadioError::InvalidUrl(_))));
        assert!(matches!(StreamSource::parse("https://"), Err(RadioError::InvalidUrl(_))));
    }

    #[test]
    fn test_station_identity() {
        let a = Station::new("KBS 1라디오", "kbs://21", Category::Korean);
        let b = Station::new("KBS 1라디오", "kbs://21", Category::Korean);
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_ne!(a.id(), b.id());
    }
}
