// errors.rs
use thiserror::Error;

/// Failures that can end a play attempt. These are the only errors that cross
/// the resolver/feed boundary into the session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RadioError {
    #[error("Invalid stream URL: {0}")]
    InvalidUrl(String),

    #[error("No stream found: {0}")]
    NoStreamFound(String),

    #[error("Playback failed: {0}")]
    PlaybackFailed(String),
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Request to {url} failed with status: {status}")]
    Status { url: String, status: reqwest::StatusCode },

    #[error("Request failed: {0}")]
    Failed(String),
}

// Transport problems are reported to the session as "no stream", never raw.
impl From<FetchError> for RadioError {
    fn from(err: FetchError) -> Self {
        RadioError::NoStreamFound(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid catalog entry '{name}': {source}")]
    InvalidStation {
        name: String,
        #[source]
        source: RadioError,
    },
}
