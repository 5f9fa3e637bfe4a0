// src/config.rs
use crate::errors::ConfigError;
use log::{debug, info};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const APP_NAME: &str = "radiobar";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub endpoints: EndpointsConfig,
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// No timeout unless set; a hung request keeps its play attempt loading.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Base URLs of the broadcaster lookup APIs.
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointsConfig {
    #[serde(default = "default_kbs_api")]
    pub kbs_api: String,
    #[serde(default = "default_mbc_stream")]
    pub mbc_stream: String,
    #[serde(default = "default_sbs_api")]
    pub sbs_api: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlayerConfig {
    #[serde(default = "default_mpv_binary")]
    pub mpv_binary: PathBuf,
    #[serde(default = "default_volume")]
    pub default_volume: f32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogConfig {
    /// TOML file of `[[station]]` entries; the built-in catalog when absent.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_file")]
    pub file: PathBuf,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { user_agent: default_user_agent(), timeout_secs: None }
    }
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            kbs_api: default_kbs_api(),
            mbc_stream: default_mbc_stream(),
            sbs_api: default_sbs_api(),
        }
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self { mpv_binary: default_mpv_binary(), default_volume: default_volume() }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: default_log_level(), file: default_log_file() }
    }
}

fn default_user_agent() -> String {
    format!("{}/{}", APP_NAME, env!("CARGO_PKG_VERSION"))
}

fn default_kbs_api() -> String {
    "https://cfpwwwapi.kbs.co.kr".to_string()
}

fn default_mbc_stream() -> String {
    "https://sminiplay.imbc.com".to_string()
}

fn default_sbs_api() -> String {
    "https://apis.sbs.co.kr".to_string()
}

fn default_mpv_binary() -> PathBuf {
    PathBuf::from("mpv")
}

fn default_volume() -> f32 {
    0.5
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
        .join(format!("{}.log", APP_NAME))
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_NAME).join("config.toml"))
}

impl Config {
    /// Loads `path`, or the default location when `None`. A missing file
    /// yields the defaults; a malformed one is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path.map(Path::to_path_buf).or_else(default_config_path) else {
            debug!("Config: no config directory on this platform, using defaults");
            return Ok(Config::default());
        };

        if !path.exists() {
            debug!("Config: {} not found, using defaults", path.display());
            return Ok(Config::default());
        }

        let content: String = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = Config::from_toml(&content, &path)?;
        info!("Config: loaded {}", path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: origin.display().to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let content = r#"
            [endpoints]
            kbs_api = "http://localhost:8080"

            [player]
            default_volume = 0.8
        "#;
        let config = Config::from_toml(content, Path::new("test.toml")).unwrap();

        assert_eq!(config.endpoints.kbs_api, "http://localhost:8080");
        assert_eq!(config.endpoints.mbc_stream, "https://sminiplay.imbc.com");
        assert_eq!(config.player.default_volume, 0.8);
        assert_eq!(config.player.mpv_binary, PathBuf::from("mpv"));
        assert_eq!(config.http.timeout_secs, None);
        assert!(config.catalog.path.is_none());
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = Config::load(Some(Path::new("/definitely/not/here/config.toml"))).unwrap();
        assert_eq!(config.log.level, "info");
        assert_eq!(config.endpoints.sbs_api, "https://apis.sbs.co.kr");
    }

    // SAD PATHS

    #[test]
    fn test_malformed_config() {
        let result = Config::from_toml("[player\nmpv_binary = 3", Path::new("bad.toml"));
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }
}
