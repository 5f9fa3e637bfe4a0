// src/episode.rs
use chrono::{DateTime, Utc};
use std::fmt;
use url::Url;

// === EPISODE STRUCTURES ===

/// The latest installment of a podcast feed, as picked for playback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Episode {
    title: String,
    number: Option<String>,
    audio_url: Url,
    published: Option<DateTime<Utc>>,
}

impl Episode {
    pub fn new(
        title: String,
        number: Option<String>,
        audio_url: Url,
        published: Option<DateTime<Utc>>,
    ) -> Self {
        Self { title, number, audio_url, published }
    }

    /// Title with any leading episode-number prefix removed.
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn number(&self) -> Option<&str> {
        self.number.as_deref()
    }

    pub fn audio_url(&self) -> &Url {
        &self.audio_url
    }

    pub fn published(&self) -> Option<DateTime<Utc>> {
        self.published
    }

    /// Title as shown to the listener, e.g. "#928 Some Episode".
    pub fn display_title(&self) -> String {
        match &self.number {
            Some(number) => format!("#{} {}", number, self.title),
            None => self.title.clone(),
        }
    }
}

impl fmt::Display for Episode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Title    : {}", self.title)?;
        if let Some(number) = &self.number {
            writeln!(f, "Number   : {}", number)?;
        }
        if let Some(published) = &self.published {
            writeln!(f, "Published: {}", published)?;
        }
        write!(f, "Audio URL: {}", self.audio_url)
    }
}
