//! Mixer strip rendering.
//!
//! Each playable track gets a vertical strip: label, activity light,
//! fader, mute and solo buttons, and the instrument selector. Strips
//! scroll horizontally to keep the selected one visible.

use crate::app::{App, StripRegions};
use crate::mixer::{fader_fraction, Strip};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

/// Width of one strip in columns, borders included.
pub const STRIP_WIDTH: u16 = 18;

/// Truncates text to `width` characters, marking the cut with `~`.
pub fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    if width == 0 {
        return String::new();
    }
    let mut out: String = text.chars().take(width - 1).collect();
    out.push('~');
    out
}

/// First strip to show so that `selected` is visible.
pub fn first_visible(count: usize, selected: usize, fit: usize) -> usize {
    if fit == 0 || count <= fit {
        return 0;
    }
    let selected = selected.min(count - 1);
    if selected < fit {
        0
    } else {
        (selected + 1 - fit).min(count - fit)
    }
}

/// Rows of a vertical fader, top first: `true` where the bar is filled.
pub fn fader_rows(fraction: f32, height: usize) -> Vec<bool> {
    if height == 0 {
        return Vec::new();
    }
    let filled = (fraction.clamp(0.0, 1.0) * height as f32).round() as usize;
    (0..height).map(|row| row >= height - filled).collect()
}

/// Renders all strips, or the drop hint when no song is loaded.
///
/// # Returns
///
/// The areas of each rendered strip's controls for mouse hit testing.
pub fn render_mixer(frame: &mut Frame, area: Rect, app: &App) -> Vec<StripRegions> {
    let block = Block::default()
        .title(" Mixer ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Gray));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if app.mixer.is_empty() {
        let hint = vec![
            Line::from(""),
            Line::from(Span::styled(
                "Drop a MIDI file here",
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(
                "or press o to open one (.mid, .midi, .sf2)",
                Style::default().fg(Color::DarkGray),
            )),
        ];
        frame.render_widget(
            Paragraph::new(hint).alignment(ratatui::layout::Alignment::Center),
            inner,
        );
        return Vec::new();
    }

    let entries: Vec<_> = app.mixer.entries().collect();
    let fit = (inner.width / STRIP_WIDTH).max(1) as usize;
    let start = first_visible(entries.len(), app.selected, fit);

    let mut regions = Vec::new();
    for (slot, entry) in entries.iter().skip(start).take(fit).enumerate() {
        let strip_area = Rect {
            x: inner.x + slot as u16 * STRIP_WIDTH,
            y: inner.y,
            width: STRIP_WIDTH.min(inner.width),
            height: inner.height,
        };
        let selected = start + slot == app.selected;
        let mut region = render_strip(frame, strip_area, &entry.strip, entry.index, selected);
        region.track = entry.index;
        regions.push(region);
    }
    regions
}

/// Renders a single strip.
fn render_strip(
    frame: &mut Frame,
    area: Rect,
    strip: &Strip,
    index: usize,
    selected: bool,
) -> StripRegions {
    let width = area.width.saturating_sub(2) as usize;
    let border = if selected { Color::Cyan } else { Color::DarkGray };
    let title_style = if strip.silenced {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default().fg(Color::White).add_modifier(Modifier::BOLD)
    };
    let block = Block::default()
        .title(Span::styled(truncate(&strip.label, width), title_style))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Track number and name
            Constraint::Length(1), // LED
            Constraint::Min(3),    // Fader
            Constraint::Length(1), // dB value
            Constraint::Length(1), // Mute/solo
            Constraint::Length(1), // Instrument selector
        ])
        .split(inner);

    let subtitle = if strip.subtitle.is_empty() {
        format!("#{}", index + 1)
    } else {
        format!("#{} {}", index + 1, strip.subtitle)
    };
    frame.render_widget(
        Paragraph::new(Span::styled(
            truncate(&subtitle, width),
            Style::default().fg(Color::DarkGray),
        )),
        rows[0],
    );

    let led = if strip.led {
        Span::styled("●", Style::default().fg(Color::LightGreen))
    } else {
        Span::styled("○", Style::default().fg(Color::DarkGray))
    };
    frame.render_widget(
        Paragraph::new(Line::from(led)).alignment(ratatui::layout::Alignment::Center),
        rows[1],
    );

    // Fader column, centered in the strip
    let fader = Rect {
        x: rows[2].x + rows[2].width.saturating_sub(3) / 2,
        y: rows[2].y,
        width: 3.min(rows[2].width),
        height: rows[2].height,
    };
    let fader_color = if strip.silenced {
        Color::DarkGray
    } else {
        Color::Green
    };
    let lines: Vec<Line> = fader_rows(fader_fraction(strip.fader_db), fader.height as usize)
        .into_iter()
        .map(|filled| {
            if filled {
                Line::from(Span::styled("███", Style::default().fg(fader_color)))
            } else {
                Line::from(Span::styled(" │ ", Style::default().fg(Color::DarkGray)))
            }
        })
        .collect();
    frame.render_widget(Paragraph::new(lines), fader);

    frame.render_widget(
        Paragraph::new(Span::styled(
            strip.fader_text(),
            Style::default().fg(Color::White),
        ))
        .alignment(ratatui::layout::Alignment::Center),
        rows[3],
    );

    let button_row = rows[4];
    let mute = Rect {
        x: button_row.x + 1,
        y: button_row.y,
        width: 3.min(button_row.width),
        height: 1,
    };
    let solo = Rect {
        x: button_row.x + 5,
        y: button_row.y,
        width: 3.min(button_row.width.saturating_sub(5)),
        height: 1,
    };
    let button = |label: &'static str, active: bool, color: Color| {
        if active {
            Span::styled(
                label,
                Style::default()
                    .fg(Color::Black)
                    .bg(color)
                    .add_modifier(Modifier::BOLD),
            )
        } else {
            Span::styled(label, Style::default().fg(color))
        }
    };
    frame.render_widget(
        Paragraph::new(button("[M]", strip.mute_active, Color::Red)),
        mute,
    );
    frame.render_widget(
        Paragraph::new(button("[S]", strip.solo_active, Color::Yellow)),
        solo,
    );

    let selector = rows[5];
    let option = strip.selected_option().unwrap_or("-");
    frame.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled("<", Style::default().fg(Color::DarkGray)),
            Span::styled(
                truncate(option, width.saturating_sub(2)),
                Style::default().fg(Color::Magenta),
            ),
            Span::styled(">", Style::default().fg(Color::DarkGray)),
        ])),
        selector,
    );

    StripRegions {
        track: index,
        area,
        fader,
        mute,
        solo,
        selector,
    }
}
