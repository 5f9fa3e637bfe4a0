// src/catalog.rs
use crate::errors::ConfigError;
use crate::station::{Category, Station};
use log::info;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// One `[[station]]` table of a catalog file.
#[derive(Debug, Clone, Deserialize)]
pub struct StationEntry {
    pub name: String,
    pub url: String,
    pub category: Category,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default, rename = "station")]
    stations: Vec<StationEntry>,
}

const BUILTIN: &[(&str, &str, Category)] = &[
    // KBS
    ("KBS 1라디오", "kbs://21", Category::Korean),
    ("KBS 2라디오 해피FM", "kbs://22", Category::Korean),
    ("KBS 3라디오 쿨FM", "kbs://23", Category::Korean),
    ("KBS 클래식FM", "kbs://24", Category::Korean),
    // MBC
    ("MBC 표준FM", "mbc://sfm", Category::Korean),
    ("MBC FM4U", "mbc://mfm", Category::Korean),
    ("MBC 올댓뮤직", "mbc://chm", Category::Korean),
    // SBS
    ("SBS 러브FM", "sbs://love", Category::Korean),
    ("SBS 파워FM", "sbs://power", Category::Korean),
    // Other broadcasters
    ("BBS 불교방송", "bbs://main", Category::Korean),
    ("YTN 라디오", "ytn://main", Category::Korean),
    ("Arirang Radio", "arirang://main", Category::Korean),
    // International
    ("KISS FM 106.1", "https://n35a-e2.revma.ihrhls.com/zc181", Category::International),
    ("STAR 102.1", "https://n10a-e2.revma.ihrhls.com/zc2815", Category::International),
    ("The New MiX 102.9", "https://n10a-e2.revma.ihrhls.com/zc2237", Category::International),
    // Podcasts
    ("Developer Voices", "https://feeds.zencastr.com/f/oSn1i316.rss", Category::Podcast),
    ("Syntax", "https://feed.syntax.fm/rss", Category::Podcast),
];

/// The stations the app offers, in display order.
#[derive(Debug, Clone)]
pub struct Catalog {
    stations: Vec<Arc<Station>>,
}

impl Catalog {
    pub fn builtin() -> Self {
        let entries: Vec<StationEntry> = BUILTIN
            .iter()
            .map(|(name, url, category)| StationEntry {
                name: name.to_string(),
                url: url.to_string(),
                category: *category,
            })
            .collect();
        Self { stations: entries.iter().map(build_station).collect() }
    }

    /// Builds a catalog, rejecting entries whose locator cannot be resolved.
    pub fn from_entries(entries: Vec<StationEntry>) -> Result<Self, ConfigError> {
        let mut stations: Vec<Arc<Station>> = Vec::with_capacity(entries.len());
        for entry in &entries {
            let station = build_station(entry);
            station.source().map_err(|source| ConfigError::InvalidStation {
                name: entry.name.clone(),
                source,
            })?;
            stations.push(station);
        }
        Ok(Self { stations })
    }

    pub fn from_toml(content: &str, origin: &Path) -> Result<Self, ConfigError> {
        let file: CatalogFile = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: origin.display().to_string(),
            source,
        })?;
        Self::from_entries(file.stations)
    }

    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::builtin());
        };
        let content: String = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let catalog = Self::from_toml(&content, path)?;
        info!("Catalog: loaded {} stations from {}", catalog.len(), path.display());
        Ok(catalog)
    }

    pub fn stations(&self) -> &[Arc<Station>] {
        &self.stations
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    pub fn in_category(&self, category: Category) -> impl Iterator<Item = &Arc<Station>> {
        self.stations.iter().filter(move |s| s.category() == category)
    }

    /// Case-insensitive lookup by display name.
    pub fn find(&self, name: &str) -> Option<&Arc<Station>> {
        let needle: String = name.trim().to_lowercase();
        self.stations.iter().find(|s| s.name().to_lowercase() == needle)
    }
}

fn build_station(entry: &StationEntry) -> Arc<Station> {
    Arc::new(Station::new(&entry.name, &entry.url, entry.category))
}
