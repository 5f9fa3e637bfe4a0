// src/player/mod.rs
#[cfg(unix)]
pub mod mpv;

use crate::errors::RadioError;
use crate::event::{Generation, SessionEvent};
use log::trace;
use tokio::sync::mpsc;
use url::Url;

/// Status notifications raised by a player after `load`.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderEvent {
    /// The media is open and can start.
    ReadyToPlay,
    /// The media could not be opened.
    Failed(String),
    Playing,
    Paused,
    /// Waiting for data.
    Buffering,
    /// Playback broke off after it had started.
    Interrupted(String),
    /// The last requested seek has landed.
    SeekCompleted,
}

/// Sink a player reports through. Tags every event with the play attempt the
/// player was loaded for, so events from a replaced player are ignored.
#[derive(Debug, Clone)]
pub struct ProviderEvents {
    generation: Generation,
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl ProviderEvents {
    pub fn new(generation: Generation, tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn emit(&self, event: ProviderEvent) {
        trace!("Player: gen {} emits {:?}", self.generation, event);
        // The session is gone when this fails; nothing left to tell.
        let _ = self.tx.send(SessionEvent::Provider { generation: self.generation, event });
    }
}

/// One loaded media item. Dropping it tears playback down.
pub trait MediaPlayer: Send {
    fn play(&mut self);
    fn pause(&mut self);
    /// `volume` is in [0, 1].
    fn set_volume(&mut self, volume: f32);
    /// Requests a seek; completion is reported as `ProviderEvent::SeekCompleted`.
    fn seek(&mut self, seconds: f64);
    /// Current position in seconds.
    fn position(&self) -> f64;
    /// Length in seconds, when known.
    fn duration(&self) -> Option<f64>;
}

/// Creates players. The session owns exactly one player at a time.
pub trait PlayerBackend: Send + Sync {
    fn load(&self, url: &Url, events: ProviderEvents) -> Result<Box<dyn MediaPlayer>, RadioError>;
}
