// src/ui.rs
use crate::app::App;
use crate::session::{PlaybackPhase, SessionState};
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, List, ListItem, ListState, Paragraph, Wrap},
};
use std::rc::Rc;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const ELLIPSIS: char = '…';

/// Cuts `text` to at most `max_width` terminal columns, ending in an ellipsis
/// when something was dropped. Korean syllables take two columns each.
pub fn truncate_to_width(text: &str, max_width: usize) -> String {
    if text.width() <= max_width {
        return text.to_string();
    }
    if max_width == 0 {
        return String::new();
    }
    let budget: usize = max_width - 1; // room for the ellipsis
    let mut used: usize = 0;
    let mut out: String = String::new();
    for c in text.chars() {
        let w: usize = c.width().unwrap_or(0);
        if used + w > budget {
            break;
        }
        used += w;
        out.push(c);
    }
    out.push(ELLIPSIS);
    out
}

/// `m:ss`, or `h:mm:ss` from an hour up.
pub fn format_time(seconds: f64) -> String {
    let total: u64 = if seconds.is_finite() && seconds > 0.0 { seconds as u64 } else { 0 };
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 { format!("{}:{:02}:{:02}", h, m, s) } else { format!("{}:{:02}", m, s) }
}

fn status_label(state: &SessionState) -> (&'static str, Color) {
    match state.phase() {
        PlaybackPhase::Idle => ("■ Stopped", Color::DarkGray),
        PlaybackPhase::Loading => ("… Loading", Color::Yellow),
        PlaybackPhase::Playing => ("▶ Playing", Color::LightGreen),
        PlaybackPhase::Paused => ("⏸ Paused", Color::Cyan),
        PlaybackPhase::Error => ("✖ Error", Color::Red),
    }
}

pub struct LayoutChunks {
    pub player_chunk: Rect,
    pub progress_chunk: Rect,
    pub stations_chunk: Rect,
    pub details_chunk: Rect,
    pub hint_chunk: Rect,
}

pub fn compute_layout(frame_size: Rect) -> LayoutChunks {
    let main_chunks: Rc<[Rect]> = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5),
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(frame_size);

    let content_columns: Rc<[Rect]> = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(main_chunks[2]);

    LayoutChunks {
        player_chunk: main_chunks[0],
        progress_chunk: main_chunks[1],
        stations_chunk: content_columns[0],
        details_chunk: content_columns[1],
        hint_chunk: main_chunks[3],
    }
}

pub fn ui(f: &mut Frame, app: &App) {
    let layout_chunks: LayoutChunks = compute_layout(f.size());
    let state: &SessionState = &app.playback;

    let default_style: Style = Style::default().fg(Color::White);
    let selected_item_style: Style =
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD);
    let playing_item_style: Style = Style::default().fg(Color::LightGreen);

    // =================================== Player Panel ============================================
    let inner_width: usize = layout_chunks.player_chunk.width.saturating_sub(2) as usize;
    let (status_text, status_color) = status_label(state);
    let player_title: &str = if state.current_station.is_some() { "Now Playing" } else { "Not Playing" };

    let mut player_lines: Vec<Line> = Vec::new();
    match &state.current_station {
        Some(station) => {
            player_lines.push(Line::from(Span::styled(
                truncate_to_width(station.name(), inner_width),
                Style::default().fg(Color::LightGreen).add_modifier(Modifier::BOLD),
            )));
            let secondary: String = match &state.current_episode {
                Some(episode) => episode.display_title(),
                None => station.category().label().to_string(),
            };
            player_lines.push(Line::from(truncate_to_width(&secondary, inner_width)));
        }
        None => {
            player_lines.push(Line::from(" "));
            player_lines.push(Line::from(" "));
        }
    }
    let status_line: Line = match &state.error_message {
        Some(message) => Line::from(vec![
            Span::styled(status_text, Style::default().fg(status_color)),
            Span::raw("  "),
            Span::styled(
                truncate_to_width(message, inner_width.saturating_sub(status_text.width() + 2)),
                Style::default().fg(Color::Red),
            ),
        ]),
        None => Line::from(vec![
            Span::styled(status_text, Style::default().fg(status_color)),
            Span::raw(format!("  Vol {:>3}%", (state.volume * 100.0).round() as u32)),
        ]),
    };
    player_lines.push(status_line);

    let player_widget: Paragraph = Paragraph::new(player_lines).block(
        Block::default()
            .title(player_title)
            .borders(Borders::ALL)
            .style(Style::default().fg(Color::Green)),
    );
    f.render_widget(player_widget, layout_chunks.player_chunk);

    // ================================== Progress Gauge ===========================================
    let (ratio, progress_label): (f64, String) = if state.duration > 0.0 && state.progress.is_finite() {
        (
            state.progress.clamp(0.0, 1.0),
            format!("{} / {}", format_time(state.current_time), format_time(state.duration)),
        )
    } else if state.current_episode.is_some() {
        (0.0, "--:-- / --:--".to_string())
    } else if state.current_station.is_some() {
        (0.0, "LIVE".to_string())
    } else {
        (0.0, String::new())
    };
    let gauge_widget: Gauge = Gauge::default()
        .block(Block::default().title("Progress").borders(Borders::ALL))
        .gauge_style(Style::default().fg(Color::Cyan).bg(Color::Black))
        .ratio(ratio)
        .label(progress_label);
    f.render_widget(gauge_widget, layout_chunks.progress_chunk);

    // ================================== Stations Panel (Left) ====================================
    let list_width: usize = layout_chunks.stations_chunk.width.saturating_sub(5) as usize;
    let playing_station = state.current_station.as_ref();
    let station_items: Vec<ListItem> = app
        .visible_stations()
        .into_iter()
        .enumerate()
        .map(|(i, station)| {
            let is_current: bool = playing_station == Some(station);
            let marker: &str = if is_current { "♪ " } else { "  " };
            let label: String = format!("{}{}", marker, truncate_to_width(station.name(), list_width));
            let style: Style = if Some(i) == app.selected_index {
                selected_item_style
            } else if is_current {
                playing_item_style
            } else {
                default_style
            };
            ListItem::new(label).style(style)
        })
        .collect();

    let stations_block: Block = Block::default()
        .title(format!("Stations [{}]", app.filter_label()))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    let stations_widget: List = List::new(station_items)
        .block(stations_block)
        .highlight_style(selected_item_style)
        .highlight_symbol(">");
    let mut list_state: ListState = ListState::default();
    list_state.select(app.selected_index);
    f.render_stateful_widget(stations_widget, layout_chunks.stations_chunk, &mut list_state);

    // ================================== Details Panel (Right) =====================================
    let details_lines: Vec<Line> = match app.selected_station() {
        Some(station) => {
            let mut lines: Vec<Line> = vec![
                Line::from(Span::styled(
                    station.name().to_string(),
                    Style::default().add_modifier(Modifier::BOLD),
                )),
                Line::from(format!("Category: {}", station.category())),
                Line::from(format!("Source:   {}", station.url())),
            ];
            if let Some(episode) = state.current_episode.as_ref().filter(|_| playing_station == Some(&station)) {
                lines.push(Line::from(""));
                lines.push(Line::from(format!("Latest:   {}", episode.display_title())));
                if let Some(published) = episode.published() {
                    lines.push(Line::from(format!("Released: {}", published.format("%Y-%m-%d"))));
                }
            }
            lines
        }
        None => vec![Line::from("No stations in this category.")],
    };
    let details_widget: Paragraph = Paragraph::new(details_lines)
        .wrap(Wrap { trim: true })
        .style(default_style)
        .block(Block::default().title("Details").borders(Borders::ALL));
    f.render_widget(details_widget, layout_chunks.details_chunk);

    // =============================== Hint Bar Panel (Bottom) =====================================
    let hint_text: &str = "[↑/↓] Select | [Enter] Play | [Space] Play/Pause | [S] Stop | [+/-] Volume | [←/→] Seek | [Tab] Filter | [Q] Quit";
    let hint_widget: Paragraph = Paragraph::new(hint_text)
        .style(Style::default().fg(Color::DarkGray))
        .alignment(Alignment::Center);
    f.render_widget(hint_widget, layout_chunks.hint_chunk);
}
