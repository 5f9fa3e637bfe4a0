//! mpv player backend, driven over mpv's JSON IPC socket.
//!
//! Every `load` spawns its own mpv process:
//!
//! ```text
//!   MpvBackend::load()
//!         │
//!         ├── mpv --idle=yes --input-ipc-server=<socket>
//!         └── driver task ── observe properties, loadfile (paused)
//!                ├── MpvCommand from MpvPlayer   → socket
//!                └── events / property-changes   → ProviderEvent
//! ```
//!
//! Dropping the `MpvPlayer` aborts the driver and kills the process.
use super::{MediaPlayer, PlayerBackend, ProviderEvent, ProviderEvents};
use crate::errors::RadioError;
use log::{debug, info, warn};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use url::Url;

// ── observation property IDs ──────────────────────────────────────────────────

const OBS_PAUSE: u64 = 1;
const OBS_PAUSED_FOR_CACHE: u64 = 2;
const OBS_TIME_POS: u64 = 3;
const OBS_DURATION: u64 = 4;

const SOCKET_WAIT_ATTEMPTS: u32 = 50;
const SOCKET_WAIT_STEP: Duration = Duration::from_millis(100);

#[derive(Debug, Default, Clone, Copy)]
struct Timeline {
    position: f64,
    duration: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
enum MpvCommand {
    SetPause(bool),
    SetVolume(f32),
    Seek(f64),
}

impl MpvCommand {
    fn to_json(&self) -> Value {
        match self {
            MpvCommand::SetPause(paused) => json!(["set_property", "pause", paused]),
            MpvCommand::SetVolume(volume) => {
                json!(["set_property", "volume", (volume * 100.0).clamp(0.0, 100.0)])
            }
            MpvCommand::Seek(secs) => json!(["seek", secs, "absolute"]),
        }
    }
}

// ── backend ───────────────────────────────────────────────────────────────────

pub struct MpvBackend {
    binary: PathBuf,
    socket_dir: PathBuf,
}

impl MpvBackend {
    pub fn new(binary: PathBuf) -> Self {
        Self { binary, socket_dir: std::env::temp_dir() }
    }

    fn socket_path(&self, generation: u64) -> PathBuf {
        self.socket_dir.join(format!("radiobar-mpv-{}-{}.sock", std::process::id(), generation))
    }
}

impl PlayerBackend for MpvBackend {
    fn load(&self, url: &Url, events: ProviderEvents) -> Result<Box<dyn MediaPlayer>, RadioError> {
        let socket_path: PathBuf = self.socket_path(events.generation());
        let _ = std::fs::remove_file(&socket_path);

        info!("mpv: spawning {} for {}", self.binary.display(), url);
        let child: Child = Command::new(&self.binary)
            .arg("--no-video")
            .arg("--idle=yes")
            .arg("--quiet")
            .arg(format!("--input-ipc-server={}", socket_path.display()))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                RadioError::PlaybackFailed(format!("cannot start {}: {}", self.binary.display(), e))
            })?;

        let timeline: Arc<Mutex<Timeline>> = Arc::new(Mutex::new(Timeline::default()));
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let driver: JoinHandle<()> = tokio::spawn(drive(
            socket_path.clone(),
            url.clone(),
            commands_rx,
            events,
            timeline.clone(),
        ));

        Ok(Box::new(MpvPlayer { child, driver, commands: commands_tx, timeline, socket_path }))
    }
}

// ── player ────────────────────────────────────────────────────────────────────

pub struct MpvPlayer {
    child: Child,
    driver: JoinHandle<()>,
    commands: mpsc::UnboundedSender<MpvCommand>,
    timeline: Arc<Mutex<Timeline>>,
    socket_path: PathBuf,
}

impl MpvPlayer {
    fn send(&self, command: MpvCommand) {
        if self.commands.send(command).is_err() {
            debug!("mpv: driver gone, command dropped");
        }
    }

    fn timeline(&self) -> Timeline {
        self.timeline.lock().map(|t| *t).unwrap_or_default()
    }
}

impl MediaPlayer for MpvPlayer {
    fn play(&mut self) {
        self.send(MpvCommand::SetPause(false));
    }

    fn pause(&mut self) {
        self.send(MpvCommand::SetPause(true));
    }

    fn set_volume(&mut self, volume: f32) {
        self.send(MpvCommand::SetVolume(volume));
    }

    fn seek(&mut self, seconds: f64) {
        self.send(MpvCommand::Seek(seconds));
    }

    fn position(&self) -> f64 {
        self.timeline().position
    }

    fn duration(&self) -> Option<f64> {
        self.timeline().duration
    }
}

impl Drop for MpvPlayer {
    fn drop(&mut self) {
        self.driver.abort();
        let _ = self.child.start_kill();
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

// ── driver task ───────────────────────────────────────────────────────────────

async fn drive(
    socket_path: PathBuf,
    url: Url,
    mut commands: mpsc::UnboundedReceiver<MpvCommand>,
    events: ProviderEvents,
    timeline: Arc<Mutex<Timeline>>,
) {
    let stream: UnixStream = match connect(&socket_path).await {
        Ok(stream) => stream,
        Err(reason) => {
            events.emit(ProviderEvent::Failed(reason));
            return;
        }
    };
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    // Start paused: the session decides when to play once the file is open.
    let setup: [Value; 6] = [
        json!(["observe_property", OBS_PAUSE, "pause"]),
        json!(["observe_property", OBS_PAUSED_FOR_CACHE, "paused-for-cache"]),
        json!(["observe_property", OBS_TIME_POS, "time-pos"]),
        json!(["observe_property", OBS_DURATION, "duration"]),
        json!(["set_property", "pause", true]),
        json!(["loadfile", url.as_str()]),
    ];
    for command in &setup {
        if let Err(e) = write_command(&mut write_half, command).await {
            events.emit(ProviderEvent::Failed(format!("mpv IPC write failed: {}", e)));
            return;
        }
    }

    let mut tracker = EventTracker::default();
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if let Some(event) = tracker.on_message(&line, &timeline) {
                        events.emit(event);
                    }
                }
                Ok(None) => {
                    debug!("mpv: IPC connection closed");
                    events.emit(tracker.on_disconnect());
                    break;
                }
                Err(e) => {
                    warn!("mpv: IPC read error: {}", e);
                    events.emit(tracker.on_disconnect());
                    break;
                }
            },
            command = commands.recv() => match command {
                Some(command) => {
                    if matches!(command, MpvCommand::Seek(_)) {
                        tracker.seeking = true;
                    }
                    if let Err(e) = write_command(&mut write_half, &command.to_json()).await {
                        warn!("mpv: IPC write error: {}", e);
                        events.emit(tracker.on_disconnect());
                        break;
                    }
                }
                None => break,
            },
        }
    }
    debug!("mpv: driver exiting");
}

async fn connect(socket_path: &Path) -> Result<UnixStream, String> {
    for _ in 0..SOCKET_WAIT_ATTEMPTS {
        if socket_path.exists() {
            match UnixStream::connect(socket_path).await {
                Ok(stream) => {
                    debug!("mpv: connected to {}", socket_path.display());
                    return Ok(stream);
                }
                Err(e) => debug!("mpv: socket not ready yet: {}", e),
            }
        }
        tokio::time::sleep(SOCKET_WAIT_STEP).await;
    }
    Err(format!("mpv IPC socket {} did not appear", socket_path.display()))
}

async fn write_command<W>(writer: &mut W, command: &Value) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut line: String = json!({ "command": command }).to_string();
    line.push('\n');
    writer.write_all(line.as_bytes()).await
}

// ── mpv message → provider event ──────────────────────────────────────────────

#[derive(Debug, Default)]
struct EventTracker {
    loaded: bool,
    seeking: bool,
    paused: bool,
}

impl EventTracker {
    fn on_message(&mut self, line: &str, timeline: &Mutex<Timeline>) -> Option<ProviderEvent> {
        let value: Value = serde_json::from_str(line.trim()).ok()?;
        // Command replies carry no "event" key.
        match value.get("event")?.as_str()? {
            "file-loaded" => {
                self.loaded = true;
                Some(ProviderEvent::ReadyToPlay)
            }
            "end-file" => self.on_end_file(&value),
            "playback-restart" if self.seeking => {
                self.seeking = false;
                Some(ProviderEvent::SeekCompleted)
            }
            "property-change" => self.on_property_change(&value, timeline),
            _ => None,
        }
    }

    fn on_end_file(&mut self, value: &Value) -> Option<ProviderEvent> {
        match value.get("reason").and_then(Value::as_str) {
            Some("error") => {
                let reason: String = value
                    .get("file_error")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
                    .to_string();
                if self.loaded {
                    Some(ProviderEvent::Interrupted(reason))
                } else {
                    Some(ProviderEvent::Failed(reason))
                }
            }
            Some("eof") if self.loaded => Some(ProviderEvent::Paused),
            _ => None,
        }
    }

    fn on_property_change(
        &mut self,
        value: &Value,
        timeline: &Mutex<Timeline>,
    ) -> Option<ProviderEvent> {
        let id: u64 = value.get("id")?.as_u64()?;
        let data: &Value = value.get("data").unwrap_or(&Value::Null);
        match id {
            OBS_TIME_POS => {
                if let (Some(position), Ok(mut timeline)) = (data.as_f64(), timeline.lock()) {
                    timeline.position = position;
                }
                None
            }
            OBS_DURATION => {
                if let Ok(mut timeline) = timeline.lock() {
                    timeline.duration = data.as_f64();
                }
                None
            }
            OBS_PAUSE => {
                self.paused = data.as_bool()?;
                // mpv reports the initial value on observe; only report once open.
                if !self.loaded {
                    return None;
                }
                Some(if self.paused { ProviderEvent::Paused } else { ProviderEvent::Playing })
            }
            OBS_PAUSED_FOR_CACHE if self.loaded => match data.as_bool()? {
                true => Some(ProviderEvent::Buffering),
                false if !self.paused => Some(ProviderEvent::Playing),
                false => None,
            },
            _ => None,
        }
    }

    fn on_disconnect(&self) -> ProviderEvent {
        if self.loaded {
            ProviderEvent::Interrupted("mpv exited".to_string())
        } else {
            ProviderEvent::Failed("mpv exited before the stream opened".to_string())
        }
    }
}
