//! Transport bar rendering.
//!
//! Displays play/stop buttons, the progress bar with elapsed and total
//! time, the loaded song and bank, and status messages.

use crate::app::App;
use crate::audio::{PresetBank, TransportState};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Gauge, Paragraph};
use ratatui::Frame;

/// Screen areas of the transport controls.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransportRegions {
    pub play: Rect,
    pub stop: Rect,
    pub progress: Rect,
}

/// Renders the transport bar at the top of the screen.
///
/// # Returns
///
/// The button and progress bar areas for mouse hit testing.
pub fn render_transport(frame: &mut Frame, area: Rect, app: &App) -> TransportRegions {
    let block = Block::default()
        .title(" Transport ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Gray));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1)])
        .split(inner);

    let controls = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(12), // Play/pause
            Constraint::Length(10), // Stop
            Constraint::Length(16), // Time
            Constraint::Min(20),    // Song, bank and status
        ])
        .split(rows[0]);

    let loaded = app.mixer.is_loaded();
    let dim = Style::default().fg(Color::DarkGray);

    let play = match app.transport_state() {
        TransportState::Playing => Span::styled(
            " [||] PAUSE",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
        TransportState::Paused | TransportState::Stopped => Span::styled(
            " [>] PLAY",
            if loaded {
                Style::default()
                    .fg(Color::Green)
                    .add_modifier(Modifier::BOLD)
            } else {
                dim
            },
        ),
    };
    frame.render_widget(Paragraph::new(Line::from(play)), controls[0]);

    let stop_style = if loaded {
        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)
    } else {
        dim
    };
    frame.render_widget(
        Paragraph::new(Line::from(Span::styled("[.] STOP", stop_style))),
        controls[1],
    );

    frame.render_widget(
        Paragraph::new(Line::from(Span::styled(
            app.time_label(),
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ))),
        controls[2],
    );

    let info = if let Some((msg, _)) = &app.status_message {
        Line::from(Span::styled(
            msg.as_str(),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::ITALIC),
        ))
    } else {
        let song = app
            .mixer
            .song()
            .map(|s| s.name.clone())
            .unwrap_or_else(|| "No song".to_string());
        let bank = app
            .bank()
            .map(|b| b.name().to_string())
            .unwrap_or_else(|| "built-in instruments".to_string());
        Line::from(vec![
            Span::styled(song, Style::default().fg(Color::Cyan)),
            Span::styled("  |  ", dim),
            Span::styled(bank, Style::default().fg(Color::Magenta)),
        ])
    };
    frame.render_widget(Paragraph::new(info), controls[3]);

    let (position, duration) = app.progress();
    let ratio = if duration > 0.0 {
        (position / duration).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let gauge = Gauge::default()
        .gauge_style(Style::default().fg(if loaded { Color::Cyan } else { Color::DarkGray }))
        .ratio(ratio)
        .label("");
    frame.render_widget(gauge, rows[1]);

    TransportRegions {
        play: controls[0],
        stop: controls[1],
        progress: rows[1],
    }
}
