// src/app.rs
use crate::session::{PlaybackPhase, SessionHandle, SessionState};
use crate::station::{Category, Station};
use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use log::{debug, info};
use ratatui::{Terminal, backend::Backend};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

pub const VOLUME_STEP: f32 = 0.1;
pub const SEEK_STEP: f64 = 0.05;

pub struct App {
    pub should_quit: bool,
    stations: Vec<Arc<Station>>,
    /// `None` shows every category.
    pub filter: Option<Category>,
    /// Index into `visible_stations()`.
    pub selected_index: Option<usize>,
    /// Latest state published by the session.
    pub playback: SessionState,
    /// The station last handed to the session, kept for retries.
    last_requested: Option<Arc<Station>>,
    session: SessionHandle,
    state_rx: watch::Receiver<SessionState>,
}

impl App {
    pub fn new(stations: Vec<Arc<Station>>, session: SessionHandle) -> App {
        let state_rx: watch::Receiver<SessionState> = session.subscribe();
        let playback: SessionState = state_rx.borrow().clone();
        let mut app = App {
            should_quit: false,
            stations,
            filter: None,
            selected_index: None,
            playback,
            last_requested: None,
            session,
            state_rx,
        };
        app.select_initial_item();
        app
    }

    /// Pulls the newest session state, if it changed since the last call.
    pub fn refresh(&mut self) -> bool {
        // An error means the session is gone; keep showing the last state.
        if !self.state_rx.has_changed().unwrap_or(false) {
            return false;
        }
        self.playback = self.state_rx.borrow_and_update().clone();
        true
    }

    // ==================================== Station list ===========================================

    pub fn visible_stations(&self) -> Vec<&Arc<Station>> {
        self.stations
            .iter()
            .filter(|s| self.filter.is_none_or(|category| s.category() == category))
            .collect()
    }

    pub fn selected_station(&self) -> Option<Arc<Station>> {
        let index: usize = self.selected_index?;
        self.visible_stations().get(index).map(|s| Arc::clone(s))
    }

    fn select_initial_item(&mut self) {
        self.selected_index = if self.visible_stations().is_empty() { None } else { Some(0) };
    }

    pub fn select_next_station(&mut self) {
        let len: usize = self.visible_stations().len();
        if len == 0 {
            self.selected_index = None;
            return;
        }
        self.selected_index = Some(self.selected_index.map_or(0, |i| (i + 1) % len));
    }

    pub fn select_prev_station(&mut self) {
        let len: usize = self.visible_stations().len();
        if len == 0 {
            self.selected_index = None;
            return;
        }
        self.selected_index = Some(self.selected_index.map_or(len - 1, |i| (i + len - 1) % len));
    }

    /// All, Korean, International, Podcast, then back to All.
    pub fn next_filter(&mut self) {
        self.filter = match self.filter {
            None => Some(Category::ALL[0]),
            Some(current) => {
                let position: usize = Category::ALL.iter().position(|c| *c == current).unwrap_or(0);
                Category::ALL.get(position + 1).copied()
            }
        };
        self.select_initial_item();
    }

    pub fn prev_filter(&mut self) {
        self.filter = match self.filter {
            None => Category::ALL.last().copied(),
            Some(current) => {
                let position: usize = Category::ALL.iter().position(|c| *c == current).unwrap_or(0);
                position.checked_sub(1).map(|p| Category::ALL[p])
            }
        };
        self.select_initial_item();
    }

    pub fn filter_label(&self) -> &'static str {
        self.filter.map_or("All", |c| c.label())
    }

    // ================================== Transport controls =======================================

    pub fn play_selected(&mut self) {
        if let Some(station) = self.selected_station() {
            info!("App: play '{}'", station.name());
            self.play(station);
        }
    }

    fn play(&mut self, station: Arc<Station>) {
        self.last_requested = Some(station.clone());
        self.session.play(station);
    }

    /// Space: pause/resume the running station. After a failure, start the
    /// last requested station again; when idle, the selected one.
    pub fn toggle_play_pause(&mut self) {
        match self.playback.phase() {
            PlaybackPhase::Idle => self.play_selected(),
            PlaybackPhase::Error => match self.last_requested.clone() {
                Some(station) => {
                    info!("App: retry '{}'", station.name());
                    self.play(station);
                }
                None => self.play_selected(),
            },
            PlaybackPhase::Loading | PlaybackPhase::Playing | PlaybackPhase::Paused => {
                self.session.toggle_play_pause();
            }
        }
    }

    pub fn stop(&mut self) {
        self.session.stop();
    }

    pub fn change_volume(&mut self, delta: f32) {
        let volume: f32 = (self.playback.volume + delta).clamp(0.0, 1.0);
        // Assume it lands so repeated presses accumulate before the next refresh.
        self.playback.volume = volume;
        self.session.set_volume(volume);
    }

    pub fn seek_by(&mut self, delta: f64) {
        if self.playback.current_episode.is_none() || self.playback.duration <= 0.0 {
            debug!("App: seek ignored, nothing seekable");
            return;
        }
        let progress: f64 = (self.playback.progress + delta).clamp(0.0, 1.0);
        self.playback.progress = progress;
        self.session.seek(progress);
    }

    // --- Key Handler ---
    pub fn on_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Down => self.select_next_station(),
            KeyCode::Up => self.select_prev_station(),
            KeyCode::Enter => self.play_selected(),
            KeyCode::Char(' ') => self.toggle_play_pause(),
            KeyCode::Char('s') => self.stop(),
            KeyCode::Char('+') | KeyCode::Char('=') => self.change_volume(VOLUME_STEP),
            KeyCode::Char('-') => self.change_volume(-VOLUME_STEP),
            KeyCode::Right => self.seek_by(SEEK_STEP),
            KeyCode::Left => self.seek_by(-SEEK_STEP),
            KeyCode::Tab => self.next_filter(),
            KeyCode::BackTab => self.prev_filter(),
            _ => {}
        }
    }
}

pub fn start_ui(mut app: App) -> Result<()> {
    // Set up the terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app_loop(&mut terminal, &mut app);

    // Restore the terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if res.is_ok() {
        app.stop();
    }
    res
}

pub fn run_app_loop<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    while !app.should_quit {
        app.refresh();
        terminal.draw(|f| crate::ui::ui(f, app))?;

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key_event) = event::read()? {
                if key_event.kind == KeyEventKind::Press {
                    app.on_key(key_event.code);
                }
            }
        }
    }

    Ok(())
}
