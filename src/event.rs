// src/event.rs
use crate::episode::Episode;
use crate::errors::RadioError;
use crate::player::ProviderEvent;
use url::Url;

/// Identifies one play attempt. Bumped by every `play` and `stop`.
pub type Generation = u64;

/// What a play attempt resolved to.
#[derive(Debug, Clone)]
pub enum Resolution {
    Stream(Url),
    Episode(Episode),
}

impl Resolution {
    pub fn media_url(&self) -> &Url {
        match self {
            Resolution::Stream(url) => url,
            Resolution::Episode(episode) => episode.audio_url(),
        }
    }
}

/// Messages sent back to the session by the tasks it spawned.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A resolution task finished, successfully or not.
    Resolved { generation: Generation, outcome: Result<Resolution, RadioError> },

    /// The player reported a status change.
    Provider { generation: Generation, event: ProviderEvent },

    /// Time to sample playback position (podcasts only).
    ProgressTick { generation: Generation },
}

impl SessionEvent {
    pub fn generation(&self) -> Generation {
        match self {
            SessionEvent::Resolved { generation, .. }
            | SessionEvent::Provider { generation, .. }
            | SessionEvent::ProgressTick { generation } => *generation,
        }
    }
}
