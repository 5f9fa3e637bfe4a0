// src/session.rs
use crate::episode::Episode;
use crate::errors::RadioError;
use crate::event::{Generation, Resolution, SessionEvent};
use crate::feed::FeedParser;
use crate::player::{MediaPlayer, PlayerBackend, ProviderEvent, ProviderEvents};
use crate::resolver::StreamResolver;
use crate::station::{Category, Station};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// How often the playback position of an episode is sampled.
pub const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackPhase {
    Idle,
    Loading,
    Playing,
    Paused,
    Error,
}

/// Everything a UI needs to render the session. Published on every change.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub is_playing: bool,
    pub is_loading: bool,
    pub error_message: Option<String>,
    pub current_station: Option<Arc<Station>>,
    /// Only set for podcast stations.
    pub current_episode: Option<Episode>,
    pub volume: f32,
    pub current_time: f64,
    pub duration: f64,
    pub progress: f64,
}

impl SessionState {
    pub fn new(volume: f32) -> Self {
        Self {
            is_playing: false,
            is_loading: false,
            error_message: None,
            current_station: None,
            current_episode: None,
            volume,
            current_time: 0.0,
            duration: 0.0,
            progress: 0.0,
        }
    }

    pub fn phase(&self) -> PlaybackPhase {
        if self.error_message.is_some() {
            PlaybackPhase::Error
        } else if self.current_station.is_none() {
            PlaybackPhase::Idle
        } else if self.is_loading {
            PlaybackPhase::Loading
        } else if self.is_playing {
            PlaybackPhase::Playing
        } else {
            PlaybackPhase::Paused
        }
    }

    fn reset_timeline(&mut self) {
        self.current_time = 0.0;
        self.duration = 0.0;
        self.progress = 0.0;
    }
}

/// `current_time / duration` in [0, 1]; 0 while the duration is unknown.
pub fn compute_progress(current_time: f64, duration: f64) -> f64 {
    if duration > 0.0 { (current_time / duration).clamp(0.0, 1.0) } else { 0.0 }
}

#[derive(Debug, Clone)]
pub enum SessionCommand {
    Play(Arc<Station>),
    TogglePlayPause,
    Stop,
    SetVolume(f32),
    Seek(f64),
}

/// The single playback session. Owned by one task; everything it spawns
/// reports back through `SessionEvent`s tagged with the play attempt's
/// generation, and events from superseded attempts are dropped.
pub struct Session {
    resolver: Arc<StreamResolver>,
    feeds: Arc<FeedParser>,
    backend: Arc<dyn PlayerBackend>,
    player: Option<Box<dyn MediaPlayer>>,
    generation: Generation,
    state: SessionState,
    state_tx: watch::Sender<SessionState>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
    progress_ticker: Option<JoinHandle<()>>,
    // (target seconds, progress) of the seek the player is working on
    pending_seek: Option<(f64, f64)>,
}

impl Session {
    pub fn new(
        resolver: Arc<StreamResolver>,
        feeds: Arc<FeedParser>,
        backend: Arc<dyn PlayerBackend>,
        volume: f32,
    ) -> Self {
        let state = SessionState::new(volume.clamp(0.0, 1.0));
        let (state_tx, _) = watch::channel(state.clone());
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            resolver,
            feeds,
            backend,
            player: None,
            generation: 0,
            state,
            state_tx,
            events_tx,
            events_rx,
            progress_ticker: None,
            pending_seek: None,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    // ================================== Transport controls =======================================

    pub fn play(&mut self, station: Arc<Station>) {
        info!("Session: play '{}' ({})", station.name(), station.category());
        self.clear();
        let generation: Generation = self.generation;

        self.state.current_station = Some(station.clone());
        self.state.is_loading = true;
        self.publish();

        let resolver: Arc<StreamResolver> = self.resolver.clone();
        let feeds: Arc<FeedParser> = self.feeds.clone();
        let events_tx = self.events_tx.clone();
        tokio::spawn(async move {
            let outcome: Result<Resolution, RadioError> = match station.category() {
                Category::Podcast => {
                    feeds.latest_episode(station.url()).await.map(Resolution::Episode)
                }
                Category::Korean | Category::International => {
                    resolver.resolve(&station).await.map(Resolution::Stream)
                }
            };
            // A closed channel means the session is gone.
            let _ = events_tx.send(SessionEvent::Resolved { generation, outcome });
        });
    }

    pub fn stop(&mut self) {
        if self.state.current_station.is_some() {
            info!("Session: stop");
        }
        self.clear();
        self.publish();
    }

    pub fn toggle_play_pause(&mut self) {
        let Some(player) = self.player.as_mut() else {
            debug!("Session: play/pause ignored, no player");
            return;
        };
        if self.state.is_playing {
            player.pause();
            self.state.is_playing = false;
        } else {
            player.play();
            self.state.is_playing = true;
            self.state.is_loading = false;
        }
        self.publish();
    }

    pub fn set_volume(&mut self, volume: f32) {
        if volume.is_nan() {
            warn!("Session: ignoring NaN volume");
            return;
        }
        let volume: f32 = volume.clamp(0.0, 1.0);
        self.state.volume = volume;
        if let Some(player) = self.player.as_mut() {
            player.set_volume(volume);
        }
        self.publish();
    }

    /// Seeks to `progress` (0 to 1) of the current episode. Does nothing
    /// without a player or while the duration is unknown.
    pub fn seek(&mut self, progress: f64) {
        let duration: f64 = self.state.duration;
        let Some(player) = self.player.as_mut() else {
            return;
        };
        if !(duration > 0.0) || progress.is_nan() {
            debug!("Session: seek ignored, duration {}", duration);
            return;
        }
        let progress: f64 = progress.clamp(0.0, 1.0);
        let target: f64 = progress * duration;
        debug!("Session: seek to {:.1}s of {:.1}s", target, duration);
        self.pending_seek = Some((target, progress));
        player.seek(target);
    }

    pub fn apply(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Play(station) => self.play(station),
            SessionCommand::TogglePlayPause => self.toggle_play_pause(),
            SessionCommand::Stop => self.stop(),
            SessionCommand::SetVolume(volume) => self.set_volume(volume),
            SessionCommand::Seek(progress) => self.seek(progress),
        }
    }

    // ==================================== Event handling =========================================

    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events_rx.recv().await
    }

    pub fn handle_event(&mut self, event: SessionEvent) {
        if event.generation() != self.generation {
            debug!(
                "Session: dropping event from gen {} (current gen {})",
                event.generation(),
                self.generation
            );
            return;
        }
        match event {
            SessionEvent::Resolved { outcome, .. } => self.on_resolved(outcome),
            SessionEvent::Provider { event, .. } => self.on_provider_event(event),
            SessionEvent::ProgressTick { .. } => self.sample_progress(),
        }
        self.publish();
    }

    fn on_resolved(&mut self, outcome: Result<Resolution, RadioError>) {
        let Some(station) = self.state.current_station.clone() else {
            return;
        };
        let resolution: Resolution = match outcome {
            Ok(resolution) => resolution,
            Err(e) => {
                warn!("Session: resolving '{}' failed: {}", station.name(), e);
                self.fail(station.category().connection_failed_message(station.name()));
                return;
            }
        };

        info!("Session: loading {} for '{}'", resolution.media_url(), station.name());
        let events = ProviderEvents::new(self.generation, self.events_tx.clone());
        match self.backend.load(resolution.media_url(), events) {
            Ok(mut player) => {
                player.set_volume(self.state.volume);
                self.player = Some(player);
            }
            Err(e) => {
                error!("Session: player could not load '{}': {}", station.name(), e);
                self.fail(format!("Failed to load station: {}", station.name()));
                return;
            }
        }

        if let Resolution::Episode(episode) = resolution {
            self.state.current_episode = Some(episode);
            self.start_progress_tracking();
        }
    }

    fn on_provider_event(&mut self, event: ProviderEvent) {
        let station_name: String =
            self.state.current_station.as_ref().map(|s| s.name().to_string()).unwrap_or_default();

        match event {
            ProviderEvent::ReadyToPlay => {
                info!("Session: ready to play '{}'", station_name);
                if let Some(player) = self.player.as_mut() {
                    player.play();
                }
                self.state.is_playing = true;
                self.state.is_loading = false;
            }
            ProviderEvent::Failed(reason) => {
                warn!("Session: player failed for '{}': {}", station_name, reason);
                self.fail(format!("Failed to load station: {}", station_name));
            }
            ProviderEvent::Playing => {
                self.state.is_playing = true;
                self.state.is_loading = false;
                self.state.error_message = None;
            }
            ProviderEvent::Paused => {
                self.state.is_playing = false;
                self.state.is_loading = false;
            }
            ProviderEvent::Buffering => {
                self.state.is_loading = true;
                self.state.is_playing = false;
            }
            ProviderEvent::Interrupted(reason) => {
                warn!("Session: playback of '{}' interrupted: {}", station_name, reason);
                self.fail(format!("Playback error: {}", reason));
            }
            ProviderEvent::SeekCompleted => {
                if let Some((time, progress)) = self.pending_seek.take() {
                    self.state.current_time = time;
                    self.state.progress = progress;
                }
            }
        }
    }

    fn sample_progress(&mut self) {
        let Some(player) = self.player.as_ref() else {
            return;
        };
        let current_time: f64 = player.position();
        let duration: f64 = player.duration().filter(|d| d.is_finite()).unwrap_or(0.0);
        self.state.current_time = current_time;
        self.state.duration = duration;
        self.state.progress = compute_progress(current_time, duration);
    }

    fn start_progress_tracking(&mut self) {
        let generation: Generation = self.generation;
        let events_tx = self.events_tx.clone();
        self.progress_ticker = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(PROGRESS_INTERVAL);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if events_tx.send(SessionEvent::ProgressTick { generation }).is_err() {
                    break;
                }
            }
        }));
    }

    // ======================================= Internals ===========================================

    /// Ends the current attempt: nothing it spawned can touch the state again.
    fn teardown(&mut self) {
        self.generation += 1;
        if let Some(ticker) = self.progress_ticker.take() {
            ticker.abort();
        }
        if self.player.take().is_some() {
            debug!("Session: player torn down");
        }
        self.pending_seek = None;
    }

    fn clear(&mut self) {
        self.teardown();
        self.state.current_station = None;
        self.state.current_episode = None;
        self.state.is_playing = false;
        self.state.is_loading = false;
        self.state.error_message = None;
        self.state.reset_timeline();
    }

    /// Terminal failure of the current attempt: only the message survives.
    fn fail(&mut self, message: String) {
        self.clear();
        self.state.error_message = Some(message);
    }

    fn publish(&self) {
        self.state_tx.send_if_modified(|published| {
            if *published == self.state {
                false
            } else {
                *published = self.state.clone();
                true
            }
        });
    }

    // ===================================== Task driver ===========================================

    pub async fn run(mut self, mut commands: mpsc::UnboundedReceiver<SessionCommand>) {
        info!("Session: running");
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.apply(command),
                    None => break,
                },
                Some(event) = self.events_rx.recv() => self.handle_event(event),
            }
        }
        self.stop();
        info!("Session: all handles dropped, shutting down");
    }

    /// Moves the session onto its own task and returns the handle to drive it.
    pub fn spawn(self) -> (SessionHandle, JoinHandle<()>) {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let handle = SessionHandle::new(commands_tx, self.subscribe());
        let task: JoinHandle<()> = tokio::spawn(self.run(commands_rx));
        (handle, task)
    }
}

/// Cloneable front of a running session: commands in, state snapshots out.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<SessionCommand>,
    state: watch::Receiver<SessionState>,
}

impl SessionHandle {
    pub fn new(
        commands: mpsc::UnboundedSender<SessionCommand>,
        state: watch::Receiver<SessionState>,
    ) -> Self {
        Self { commands, state }
    }

    pub fn play(&self, station: Arc<Station>) {
        self.send(SessionCommand::Play(station));
    }

    pub fn toggle_play_pause(&self) {
        self.send(SessionCommand::TogglePlayPause);
    }

    pub fn stop(&self) {
        self.send(SessionCommand::Stop);
    }

    pub fn set_volume(&self, volume: f32) {
        self.send(SessionCommand::SetVolume(volume));
    }

    pub fn seek(&self, progress: f64) {
        self.send(SessionCommand::Seek(progress));
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    fn send(&self, command: SessionCommand) {
        if self.commands.send(command).is_err() {
            warn!("SessionHandle: session has shut down, command dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EndpointsConfig;
    use crate::fetch::FakeFetcher;
    use std::sync::Mutex;
    use url::Url;

    const MBC_SFM_LOOKUP: &str = "https://sminiplay.imbc.com/aacplay.ashx?agent=webapp&channel=sfm";
    const MBC_MFM_LOOKUP: &str = "https://sminiplay.imbc.com/aacplay.ashx?agent=webapp&channel=mfm";
    const FEED_URL: &str = "https://feeds.example.com/show.rss";
    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
        <rss version="2.0"><channel>
            <title>Show</title><link>https://example.com</link><description>d</description>
            <item>
                <title>#928 Some Episode</title>
                <enclosure url="https://cdn.example.com/928.mp3" length="1" type="audio/mpeg"/>
            </item>
        </channel></rss>"#;

    #[derive(Debug, Clone, PartialEq)]
    enum PlayerCall {
        Load(String),
        Play,
        Pause,
        Volume(f32),
        Seek(f64),
    }

    struct FakePlayer {
        calls: Arc<Mutex<Vec<PlayerCall>>>,
        position: f64,
        duration: Option<f64>,
        events: ProviderEvents,
    }

    impl MediaPlayer for FakePlayer {
        fn play(&mut self) {
            self.calls.lock().unwrap().push(PlayerCall::Play);
        }

        fn pause(&mut self) {
            self.calls.lock().unwrap().push(PlayerCall::Pause);
        }

        fn set_volume(&mut self, volume: f32) {
            self.calls.lock().unwrap().push(PlayerCall::Volume(volume));
        }

        fn seek(&mut self, seconds: f64) {
            self.calls.lock().unwrap().push(PlayerCall::Seek(seconds));
            self.position = seconds;
            self.events.emit(ProviderEvent::SeekCompleted);
        }

        fn position(&self) -> f64 {
            self.position
        }

        fn duration(&self) -> Option<f64> {
            self.duration
        }
    }

    #[derive(Default)]
    struct FakeBackend {
        calls: Arc<Mutex<Vec<PlayerCall>>>,
        sinks: Mutex<Vec<ProviderEvents>>,
        duration: Option<f64>,
        refuse: bool,
    }

    impl FakeBackend {
        fn calls(&self) -> Vec<PlayerCall> {
            self.calls.lock().unwrap().clone()
        }

        fn loads(&self) -> Vec<String> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    PlayerCall::Load(url) => Some(url),
                    _ => None,
                })
                .collect()
        }

        fn emit(&self, event: ProviderEvent) {
            self.sinks.lock().unwrap().last().expect("a loaded player").emit(event);
        }
    }

    impl PlayerBackend for FakeBackend {
        fn load(
            &self,
            url: &Url,
            events: ProviderEvents,
        ) -> Result<Box<dyn MediaPlayer>, RadioError> {
            if self.refuse {
                return Err(RadioError::PlaybackFailed("no audio device".to_string()));
            }
            self.calls.lock().unwrap().push(PlayerCall::Load(url.to_string()));
            self.sinks.lock().unwrap().push(events.clone());
            Ok(Box::new(FakePlayer {
                calls: self.calls.clone(),
                position: 0.0,
                duration: self.duration,
                events,
            }))
        }
    }

    fn session_with(fetcher: FakeFetcher, backend: Arc<FakeBackend>) -> Session {
        let fetcher = Arc::new(fetcher);
        let resolver = Arc::new(StreamResolver::new(fetcher.clone(), EndpointsConfig::default()));
        let feeds = Arc::new(FeedParser::new(fetcher));
        Session::new(resolver, feeds, backend, 0.5)
    }

    fn mbc_fetcher() -> FakeFetcher {
        FakeFetcher::new()
            .with_response(MBC_SFM_LOOKUP, "https://mbc.example/sfm.m3u8")
            .with_response(MBC_MFM_LOOKUP, "https://mbc.example/mfm.m3u8")
    }

    fn station(name: &str, url: &str, category: Category) -> Arc<Station> {
        Arc::new(Station::new(name, url, category))
    }

    /// Applies events until none arrive for a little while.
    async fn pump(session: &mut Session) {
        while let Ok(Some(event)) =
            tokio::time::timeout(Duration::from_millis(150), session.next_event()).await
        {
            session.handle_event(event);
        }
    }

    #[tokio::test]
    async fn test_play_resolves_loads_and_starts() {
        let backend = Arc::new(FakeBackend::default());
        let mut session = session_with(mbc_fetcher(), backend.clone());
        let sfm = station("MBC Standard FM", "mbc://sfm", Category::Korean);

        session.play(sfm.clone());
        assert!(session.state().is_loading);
        assert!(!session.state().is_playing);
        assert_eq!(session.state().phase(), PlaybackPhase::Loading);
        assert_eq!(session.state().current_station.as_ref(), Some(&sfm));

        pump(&mut session).await;
        assert_eq!(
            backend.calls(),
            vec![PlayerCall::Load("https://mbc.example/sfm.m3u8".to_string()), PlayerCall::Volume(0.5)]
        );
        assert!(session.state().is_loading);

        backend.emit(ProviderEvent::ReadyToPlay);
        pump(&mut session).await;
        assert_eq!(backend.calls().last(), Some(&PlayerCall::Play));
        assert!(session.state().is_playing);
        assert!(!session.state().is_loading);
        assert_eq!(session.state().phase(), PlaybackPhase::Playing);
        assert!(session.state().current_episode.is_none());
    }

    #[tokio::test]
    async fn test_resolution_failure_reports_station() {
        let backend = Arc::new(FakeBackend::default());
        let mut session = session_with(FakeFetcher::new(), backend.clone());

        session.play(station("MBC FM4U", "mbc://mfm", Category::Korean));
        pump(&mut session).await;

        let state = session.state();
        assert_eq!(state.error_message.as_deref(), Some("Korean radio connection failed: MBC FM4U"));
        assert!(!state.is_loading);
        assert!(!state.is_playing);
        assert_eq!(state.phase(), PlaybackPhase::Error);
        assert!(state.current_station.is_none());
        assert!(backend.loads().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_feed_reports_podcast() {
        let backend = Arc::new(FakeBackend::default());
        let mut session = session_with(FakeFetcher::new(), backend.clone());

        session.play(station("Show", FEED_URL, Category::Podcast));
        pump(&mut session).await;

        let state = session.state();
        assert_eq!(state.error_message.as_deref(), Some("Podcast load failed: Show"));
        assert!(state.current_station.is_none());
        assert!(state.current_episode.is_none());
        assert!(!state.is_loading && !state.is_playing);
        assert!(backend.loads().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_locator_reports_station() {
        let backend = Arc::new(FakeBackend::default());
        let mut session = session_with(FakeFetcher::new(), backend.clone());

        session.play(station("Nowhere", "ebs://fm", Category::International));
        pump(&mut session).await;

        assert_eq!(
            session.state().error_message.as_deref(),
            Some("International radio connection failed: Nowhere")
        );
    }

    #[tokio::test]
    async fn test_backend_refusal_is_a_failure() {
        let backend = Arc::new(FakeBackend { refuse: true, ..FakeBackend::default() });
        let mut session = session_with(mbc_fetcher(), backend);

        session.play(station("MBC Standard FM", "mbc://sfm", Category::Korean));
        pump(&mut session).await;

        assert_eq!(
            session.state().error_message.as_deref(),
            Some("Failed to load station: MBC Standard FM")
        );
        assert!(!session.state().is_loading);
    }

    #[tokio::test]
    async fn test_newer_play_wins_over_late_resolution() {
        let fetcher = mbc_fetcher().with_delay(MBC_SFM_LOOKUP, Duration::from_millis(80));
        let backend = Arc::new(FakeBackend::default());
        let mut session = session_with(fetcher, backend.clone());
        let slow = station("MBC Standard FM", "mbc://sfm", Category::Korean);
        let fast = station("MBC FM4U", "mbc://mfm", Category::Korean);

        session.play(slow);
        session.play(fast.clone());
        pump(&mut session).await;

        assert_eq!(session.state().current_station.as_ref(), Some(&fast));
        assert_eq!(backend.loads(), vec!["https://mbc.example/mfm.m3u8".to_string()]);
    }

    #[tokio::test]
    async fn test_newer_play_wins_over_late_feed() {
        let fetcher = mbc_fetcher()
            .with_response(FEED_URL, FEED)
            .with_delay(FEED_URL, Duration::from_millis(80));
        let backend = Arc::new(FakeBackend { duration: Some(200.0), ..FakeBackend::default() });
        let mut session = session_with(fetcher, backend.clone());
        let sfm = station("MBC Standard FM", "mbc://sfm", Category::Korean);

        session.play(station("Show", FEED_URL, Category::Podcast));
        session.play(sfm.clone());
        pump(&mut session).await;

        let state = session.state();
        assert_eq!(state.current_station.as_ref(), Some(&sfm));
        assert!(state.current_episode.is_none());
        assert_eq!(state.duration, 0.0);
        assert_eq!(backend.loads(), vec!["https://mbc.example/sfm.m3u8".to_string()]);
    }

    #[tokio::test]
    async fn test_stale_events_are_dropped() {
        let backend = Arc::new(FakeBackend::default());
        let mut session = session_with(mbc_fetcher(), backend.clone());

        session.play(station("MBC Standard FM", "mbc://sfm", Category::Korean));
        let stale: Generation = session.generation();
        session.stop();
        let before = session.state().clone();

        session.handle_event(SessionEvent::Resolved {
            generation: stale,
            outcome: Ok(Resolution::Stream(Url::parse("https://mbc.example/sfm.m3u8").unwrap())),
        });
        session.handle_event(SessionEvent::Provider {
            generation: stale,
            event: ProviderEvent::Playing,
        });
        pump(&mut session).await;

        assert_eq!(session.state(), &before);
        assert!(backend.loads().is_empty());
    }

    #[tokio::test]
    async fn test_stop_when_idle_changes_nothing() {
        let backend = Arc::new(FakeBackend::default());
        let mut session = session_with(FakeFetcher::new(), backend);
        let rx = session.subscribe();
        let before = session.state().clone();

        session.stop();
        session.stop();

        assert_eq!(session.state(), &before);
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_stop_resets_everything() {
        let backend = Arc::new(FakeBackend { duration: Some(200.0), ..FakeBackend::default() });
        let fetcher = FakeFetcher::new().with_response(FEED_URL, FEED);
        let mut session = session_with(fetcher, backend.clone());

        session.play(station("Show", FEED_URL, Category::Podcast));
        pump(&mut session).await;
        backend.emit(ProviderEvent::ReadyToPlay);
        pump(&mut session).await;
        assert!(session.state().current_episode.is_some());

        session.stop();

        let state = session.state();
        assert_eq!(state.phase(), PlaybackPhase::Idle);
        assert!(state.current_station.is_none());
        assert!(state.current_episode.is_none());
        assert!(!state.is_playing && !state.is_loading);
        assert_eq!((state.current_time, state.duration, state.progress), (0.0, 0.0, 0.0));

        // The player is gone: toggling has nothing to act on.
        let calls_before = backend.calls().len();
        session.toggle_play_pause();
        assert_eq!(backend.calls().len(), calls_before);
    }

    #[tokio::test]
    async fn test_podcast_episode_progress_and_seek() {
        let backend = Arc::new(FakeBackend { duration: Some(200.0), ..FakeBackend::default() });
        let fetcher = FakeFetcher::new().with_response(FEED_URL, FEED);
        let mut session = session_with(fetcher, backend.clone());

        session.play(station("Show", FEED_URL, Category::Podcast));
        pump(&mut session).await;

        let episode = session.state().current_episode.clone().expect("episode loaded");
        assert_eq!(episode.title(), "Some Episode");
        assert_eq!(episode.number(), Some("928"));
        assert_eq!(backend.loads(), vec!["https://cdn.example.com/928.mp3".to_string()]);
        assert_eq!(session.state().duration, 200.0);

        session.seek(0.5);
        pump(&mut session).await;

        assert!(backend.calls().contains(&PlayerCall::Seek(100.0)));
        assert_eq!(session.state().current_time, 100.0);
        assert_eq!(session.state().progress, 0.5);
    }

    #[tokio::test]
    async fn test_seek_without_duration_is_noop() {
        let backend = Arc::new(FakeBackend::default());
        let mut session = session_with(mbc_fetcher(), backend.clone());

        session.seek(0.5);

        session.play(station("MBC Standard FM", "mbc://sfm", Category::Korean));
        pump(&mut session).await;
        let before = session.state().clone();
        session.seek(0.5);
        pump(&mut session).await;

        assert_eq!(session.state(), &before);
        assert!(!backend.calls().iter().any(|c| matches!(c, PlayerCall::Seek(_))));
    }

    #[tokio::test]
    async fn test_set_volume() {
        let backend = Arc::new(FakeBackend::default());
        let mut session = session_with(mbc_fetcher(), backend.clone());

        session.set_volume(0.3);
        assert_eq!(session.state().volume, 0.3);

        session.play(station("MBC Standard FM", "mbc://sfm", Category::Korean));
        pump(&mut session).await;
        assert!(backend.calls().contains(&PlayerCall::Volume(0.3)));

        session.set_volume(0.7);
        assert_eq!(backend.calls().last(), Some(&PlayerCall::Volume(0.7)));

        session.set_volume(1.7);
        assert_eq!(session.state().volume, 1.0);
        session.set_volume(f32::NAN);
        assert_eq!(session.state().volume, 1.0);
    }

    #[tokio::test]
    async fn test_provider_status_transitions() {
        let backend = Arc::new(FakeBackend::default());
        let mut session = session_with(mbc_fetcher(), backend.clone());
        session.play(station("MBC Standard FM", "mbc://sfm", Category::Korean));
        pump(&mut session).await;

        backend.emit(ProviderEvent::Playing);
        pump(&mut session).await;
        assert_eq!(session.state().phase(), PlaybackPhase::Playing);

        backend.emit(ProviderEvent::Buffering);
        pump(&mut session).await;
        assert!(session.state().is_loading);
        assert!(!session.state().is_playing);

        backend.emit(ProviderEvent::Paused);
        pump(&mut session).await;
        assert_eq!(session.state().phase(), PlaybackPhase::Paused);

        backend.emit(ProviderEvent::Interrupted("stream stalled".to_string()));
        // Anything the dead player still had queued must not revive the attempt.
        backend.emit(ProviderEvent::Playing);
        pump(&mut session).await;
        let state = session.state();
        assert_eq!(state.error_message.as_deref(), Some("Playback error: stream stalled"));
        assert!(!state.is_playing && !state.is_loading);
        assert!(state.current_station.is_none());
    }

    #[tokio::test]
    async fn test_provider_failure_names_station() {
        let backend = Arc::new(FakeBackend::default());
        let mut session = session_with(mbc_fetcher(), backend.clone());
        session.play(station("MBC Standard FM", "mbc://sfm", Category::Korean));
        pump(&mut session).await;

        backend.emit(ProviderEvent::Failed("404".to_string()));
        pump(&mut session).await;

        assert_eq!(
            session.state().error_message.as_deref(),
            Some("Failed to load station: MBC Standard FM")
        );
        assert_eq!(session.state().phase(), PlaybackPhase::Error);
        assert!(session.state().current_station.is_none());

        // The next play starts clean.
        session.play(station("MBC FM4U", "mbc://mfm", Category::Korean));
        assert!(session.state().error_message.is_none());
        assert_eq!(session.state().phase(), PlaybackPhase::Loading);
    }

    #[tokio::test]
    async fn test_toggle_play_pause() {
        let backend = Arc::new(FakeBackend::default());
        let mut session = session_with(mbc_fetcher(), backend.clone());

        session.toggle_play_pause();
        assert!(backend.calls().is_empty());

        session.play(station("MBC Standard FM", "mbc://sfm", Category::Korean));
        pump(&mut session).await;
        backend.emit(ProviderEvent::ReadyToPlay);
        pump(&mut session).await;

        session.toggle_play_pause();
        assert_eq!(backend.calls().last(), Some(&PlayerCall::Pause));
        assert!(!session.state().is_playing);

        session.toggle_play_pause();
        assert_eq!(backend.calls().last(), Some(&PlayerCall::Play));
        assert!(session.state().is_playing);
    }

    #[tokio::test]
    async fn test_handle_drives_spawned_session() {
        let backend = Arc::new(FakeBackend::default());
        let session = session_with(mbc_fetcher(), backend.clone());
        let (handle, _task) = session.spawn();
        let mut rx = handle.subscribe();
        let sfm = station("MBC Standard FM", "mbc://sfm", Category::Korean);

        handle.set_volume(0.3);
        handle.play(sfm.clone());
        tokio::time::timeout(
            Duration::from_secs(2),
            rx.wait_for(|s| s.current_station.as_ref() == Some(&sfm) && s.volume == 0.3),
        )
        .await
        .expect("state published")
        .expect("session alive");

        tokio::time::timeout(Duration::from_secs(2), async {
            while backend.loads().is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("stream loaded");

        handle.stop();
        tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|s| s.current_station.is_none()))
            .await
            .expect("stop published")
            .expect("session alive");
        assert_eq!(handle.snapshot().phase(), PlaybackPhase::Idle);
    }

    #[test]
    fn test_compute_progress() {
        assert_eq!(compute_progress(50.0, 200.0), 0.25);
        assert_eq!(compute_progress(10.0, 0.0), 0.0);
        assert_eq!(compute_progress(10.0, -1.0), 0.0);
        assert_eq!(compute_progress(300.0, 200.0), 1.0);
    }
}
