//! Terminal user interface components.
//!
//! This module renders the transport bar, the mixer strips and the
//! dialog overlays, and records control positions for mouse hit testing.

mod dialogs;
mod mixer;
mod transport;

use crate::app::{App, LayoutRegions};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

pub use dialogs::{render_alert, render_file_browser, render_help, render_loading};
pub use mixer::render_mixer;
pub use transport::render_transport;

/// Renders the complete UI and updates layout regions.
///
/// The layout is divided into:
/// - Top: transport controls and progress bar
/// - Center: mixer strips
/// - Bottom: key hints
pub fn render(frame: &mut Frame, app: &mut App) {
    let size = frame.area();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4), // Transport
            Constraint::Min(12),   // Mixer
            Constraint::Length(1), // Key hints
        ])
        .split(size);

    let transport = render_transport(frame, chunks[0], app);
    let strips = render_mixer(frame, chunks[1], app);
    render_hints(frame, chunks[2]);

    app.update_layout(LayoutRegions {
        play_button: transport.play,
        stop_button: transport.stop,
        progress: transport.progress,
        strips,
    });

    // Overlays, topmost last
    render_file_browser(frame, app);
    render_help(frame, app);
    render_loading(frame, app);
    render_alert(frame, app);
}

fn render_hints(frame: &mut Frame, area: Rect) {
    let key = Style::default().fg(Color::Yellow);
    let text = Style::default().fg(Color::DarkGray);
    let hints = [
        ("Space", "play"),
        (".", "stop"),
        ("m/s", "mute/solo"),
        ("Up/Dn", "fader"),
        ("</>", "instrument"),
        ("o", "open"),
        ("?", "help"),
        ("q", "quit"),
    ];
    let spans: Vec<Span> = hints
        .iter()
        .flat_map(|(k, d)| {
            [
                Span::styled(format!(" {}", k), key),
                Span::styled(format!(" {} ", d), text),
            ]
        })
        .collect();
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Helper function to center a rectangle within another rectangle.
pub fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
