//! Dialog overlays: file browser, alerts, loading indicator and help.

use crate::app::App;
use crate::ingest::FileKind;
use ratatui::layout::{Alignment, Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap};
use ratatui::Frame;
use std::path::Path;

use super::centered_rect;

/// Truncates a path string to fit within max_width, adding "..." prefix if needed.
#[inline]
fn truncate_path(path_str: &str, max_width: usize) -> String {
    let len = path_str.chars().count();
    if len > max_width && max_width > 3 {
        let tail: String = path_str.chars().skip(len - (max_width - 3)).collect();
        format!("...{}", tail)
    } else {
        path_str.to_string()
    }
}

#[inline]
fn path_display_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("?")
        .to_string()
}

/// Renders the file browser dialog overlay.
pub fn render_file_browser(frame: &mut Frame, app: &App) {
    if !app.file_browser.open {
        return;
    }

    let area = centered_rect(60, 70, frame.area());
    frame.render_widget(Clear, area);

    let block = Block::default()
        .title(" Open MIDI / SoundFont ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Current path
            Constraint::Length(1), // Separator
            Constraint::Min(5),    // File list
            Constraint::Length(1), // Instructions
        ])
        .split(inner);

    let path_str = app.file_browser.current_dir.display().to_string();
    let max_width = chunks[0].width.saturating_sub(2) as usize;
    frame.render_widget(
        Paragraph::new(Span::styled(
            truncate_path(&path_str, max_width),
            Style::default().fg(Color::Cyan),
        )),
        chunks[0],
    );

    let visible_height = chunks[2].height as usize;
    let start_idx = app.file_browser.scroll.min(app.file_browser.entries.len());
    let end_idx = (start_idx + visible_height).min(app.file_browser.entries.len());

    let items: Vec<ListItem> = app.file_browser.entries[start_idx..end_idx]
        .iter()
        .enumerate()
        .map(|(i, path)| {
            let is_selected = start_idx + i == app.file_browser.selected;

            let (icon, name, style) = if path.as_path() == Path::new("..") {
                (
                    "[..]",
                    "Parent Directory".to_string(),
                    Style::default().fg(Color::Blue),
                )
            } else if path.is_dir() {
                (
                    "[D]",
                    path_display_name(path),
                    Style::default().fg(Color::Blue),
                )
            } else {
                let (icon, color) = match FileKind::from_path(path) {
                    Some(FileKind::SoundFont) => ("[S]", Color::Yellow),
                    _ => ("[M]", Color::Magenta),
                };
                (icon, path_display_name(path), Style::default().fg(color))
            };

            let display_style = if is_selected {
                style.add_modifier(Modifier::REVERSED)
            } else {
                style
            };

            ListItem::new(Line::from(vec![
                Span::styled(format!("{} ", icon), Style::default().fg(Color::DarkGray)),
                Span::styled(name, display_style),
            ]))
        })
        .collect();

    frame.render_widget(List::new(items), chunks[2]);

    frame.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled("[Up/Down]", Style::default().fg(Color::Yellow)),
            Span::styled(" Navigate  ", Style::default().fg(Color::DarkGray)),
            Span::styled("[Enter]", Style::default().fg(Color::Yellow)),
            Span::styled(" Open  ", Style::default().fg(Color::DarkGray)),
            Span::styled("[Esc]", Style::default().fg(Color::Yellow)),
            Span::styled(" Cancel", Style::default().fg(Color::DarkGray)),
        ])),
        chunks[3],
    );
}

/// Renders the blocking alert, if one is pending.
pub fn render_alert(frame: &mut Frame, app: &App) {
    let Some(message) = &app.alert else {
        return;
    };

    let area = centered_rect(50, 25, frame.area());
    frame.render_widget(Clear, area);

    let block = Block::default()
        .title(" Alert ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(1)])
        .split(inner);

    frame.render_widget(
        Paragraph::new(Span::styled(
            message.as_str(),
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true }),
        chunks[0],
    );
    frame.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled("[Enter]", Style::default().fg(Color::Yellow)),
            Span::styled(" OK", Style::default().fg(Color::DarkGray)),
        ]))
        .alignment(Alignment::Center),
        chunks[1],
    );
}

/// Renders the loading indicator while a file load is queued.
pub fn render_loading(frame: &mut Frame, app: &App) {
    let Some(path) = &app.pending_load else {
        return;
    };

    let area = centered_rect(40, 15, frame.area());
    frame.render_widget(Clear, area);
    let block = Block::default()
        .title(" Loading ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    frame.render_widget(
        Paragraph::new(vec![
            Line::from(Span::styled(
                "Loading...",
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(
                path_display_name(path),
                Style::default().fg(Color::DarkGray),
            )),
        ])
        .alignment(Alignment::Center),
        inner,
    );
}

/// Key binding entry for the help display.
struct KeyBinding {
    key: &'static str,
    description: &'static str,
}

const BINDINGS: &[KeyBinding] = &[
    KeyBinding {
        key: "Space",
        description: "Play / Pause",
    },
    KeyBinding {
        key: ". / Esc",
        description: "Stop (back to start)",
    },
    KeyBinding {
        key: "Left / Right",
        description: "Seek back / forward",
    },
    KeyBinding {
        key: "Tab / h / l",
        description: "Select track",
    },
    KeyBinding {
        key: "Up / Down",
        description: "Fader +/- 0.5 dB",
    },
    KeyBinding {
        key: "PgUp / PgDn",
        description: "Fader +/- 6 dB",
    },
    KeyBinding {
        key: "m",
        description: "Mute track",
    },
    KeyBinding {
        key: "s",
        description: "Solo track",
    },
    KeyBinding {
        key: "< / >",
        description: "Previous / next instrument",
    },
    KeyBinding {
        key: "o",
        description: "Open MIDI file or SoundFont",
    },
    KeyBinding {
        key: "?",
        description: "Toggle this help",
    },
    KeyBinding {
        key: "q",
        description: "Quit",
    },
];

/// Renders the help overlay.
pub fn render_help(frame: &mut Frame, app: &App) {
    if !app.show_help {
        return;
    }

    let area = centered_rect(50, 60, frame.area());
    frame.render_widget(Clear, area);
    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let mut lines: Vec<Line> = BINDINGS
        .iter()
        .map(|b| {
            Line::from(vec![
                Span::styled(
                    format!("{:>14}  ", b.key),
                    Style::default().fg(Color::Yellow),
                ),
                Span::styled(b.description, Style::default().fg(Color::White)),
            ])
        })
        .collect();
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Mouse: click buttons, drag faders, click the progress bar to seek",
        Style::default().fg(Color::DarkGray),
    )));
    lines.push(Line::from(Span::styled(
        "Drop or paste a file path to load it",
        Style::default().fg(Color::DarkGray),
    )));

    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), inner);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_path() {
        assert_eq!(truncate_path("/a/b", 10), "/a/b");
        assert_eq!(truncate_path("/home/user/music", 10), "...r/music");
    }
}
