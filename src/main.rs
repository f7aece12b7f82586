//! midimix - A terminal MIDI file player with a per-track mixer.
//!
//! Load a standard MIDI file and every track with notes gets a mixer strip
//! with a volume fader, mute and solo buttons and an instrument selector.
//! Instruments come from a small built-in synth table, or from the presets
//! of a SoundFont bank when one is loaded.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- song.mid                 # Play with built-in instruments
//! cargo run -- song.mid -sf bank.sf2    # Use SoundFont presets
//! ```
//!
//! Press `?` for help with keyboard shortcuts.

use midimix::app::App;
use midimix::audio::{AudioEngine, SAMPLE_RATE};
use midimix::config::{CliOptions, Settings, USAGE};
use midimix::ui;

use anyhow::{Context, Result};
use crossterm::event::{
    self, DisableBracketedPaste, DisableMouseCapture, EnableBracketedPaste, EnableMouseCapture,
    Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent,
    MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use std::fs::File;
use std::io::{self, Stdout};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Main entry point.
fn main() -> Result<()> {
    // Parse CLI options first (before any terminal setup)
    let cli = CliOptions::parse()?;
    if cli.help {
        eprintln!("{}", USAGE);
        return Ok(());
    }

    init_logging(&cli)?;

    let settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };

    let audio = if cli.no_audio {
        AudioEngine::offline(SAMPLE_RATE)
    } else {
        AudioEngine::new().context("Failed to initialize audio output")?
    };

    let mut app = App::new(audio, settings);

    // CLI SoundFont takes priority over the settings file
    let soundfont = cli.soundfont.clone().or_else(|| app.settings.soundfont.clone());
    if let Some(path) = soundfont {
        app.load_soundfont(&path);
    }
    if let Some(path) = &cli.midi {
        app.load_midi(path);
    }

    let mut terminal = setup_terminal().context("Failed to setup terminal")?;

    // Run main loop
    let result = run_app(&mut terminal, &mut app);

    // Restore terminal
    restore_terminal(&mut terminal).context("Failed to restore terminal")?;

    // Handle any errors from the main loop
    result
}

/// Initializes logging. The terminal belongs to the UI, so logs go to the
/// `--log` file or nowhere.
fn init_logging(cli: &CliOptions) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env();
    match &cli.log {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(io::sink)
                .init();
        }
    }
    Ok(())
}

/// Sets up the terminal for TUI rendering.
fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(
        stdout,
        EnterAlternateScreen,
        EnableMouseCapture,
        EnableBracketedPaste
    )
    .context("Failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend).context("Failed to create terminal")?;
    Ok(terminal)
}

/// Restores the terminal to its original state.
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode().context("Failed to disable raw mode")?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture,
        DisableBracketedPaste
    )
    .context("Failed to leave alternate screen")?;
    terminal.show_cursor().context("Failed to show cursor")?;
    Ok(())
}

/// Main application loop.
fn run_app(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> Result<()> {
    let mut last_frame = Instant::now();
    loop {
        terminal.draw(|frame| ui::render(frame, app))?;

        // A queued load runs after the frame that shows the loading overlay
        if app.is_loading() {
            app.process_pending_load();
            last_frame = Instant::now();
            continue;
        }

        // Without a device nothing pulls samples, so advance by wall clock
        let now = Instant::now();
        app.audio.advance(now - last_frame);
        last_frame = now;

        app.tick();

        // Handle events with a short timeout to keep progress and LEDs moving
        if event::poll(Duration::from_millis(16))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => handle_key(app, key),
                Event::Mouse(mouse) => handle_mouse(app, mouse),
                Event::Paste(text) => app.handle_paste(&text),
                _ => {}
            }
        }

        if app.should_quit {
            break;
        }
    }

    app.audio.stop();
    Ok(())
}

/// Handles a key press.
fn handle_key(app: &mut App, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    // Alert is modal: any key dismisses it
    if app.alert.is_some() {
        app.dismiss_alert();
        return;
    }

    if app.show_help {
        app.show_help = false;
        return;
    }

    if app.file_browser.open {
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => app.file_browser_up(),
            KeyCode::Down | KeyCode::Char('j') => app.file_browser_down(),
            KeyCode::Enter => app.file_browser_select(),
            KeyCode::Esc => app.file_browser_cancel(),
            _ => {}
        }
        return;
    }

    let step = app.settings.seek_step_secs;
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Char('?') => app.show_help = true,
        KeyCode::Char('o') => app.open_file_browser(),

        // Transport
        KeyCode::Char(' ') => app.toggle_playback(),
        KeyCode::Char('.') | KeyCode::Esc => app.stop_playback(),
        KeyCode::Left => app.seek_by(-step),
        KeyCode::Right => app.seek_by(step),

        // Track selection
        KeyCode::Tab | KeyCode::Char('l') => app.select_step(1),
        KeyCode::BackTab | KeyCode::Char('h') => app.select_step(-1),

        // Strip controls
        KeyCode::Up => app.fader_up_selected(false),
        KeyCode::Down => app.fader_down_selected(false),
        KeyCode::PageUp => app.fader_up_selected(true),
        KeyCode::PageDown => app.fader_down_selected(true),
        KeyCode::Char('m') => app.toggle_mute_selected(),
        KeyCode::Char('s') => app.toggle_solo_selected(),
        KeyCode::Char('<') | KeyCode::Char(',') => app.cycle_instrument_selected(-1),
        KeyCode::Char('>') => app.cycle_instrument_selected(1),
        _ => {}
    }
}

/// Handles a mouse event.
fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    if app.alert.is_some() {
        if let MouseEventKind::Down(_) = mouse.kind {
            app.dismiss_alert();
        }
        return;
    }
    if app.file_browser.open || app.show_help {
        return;
    }

    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => app.handle_click(mouse.column, mouse.row),
        MouseEventKind::Drag(MouseButton::Left) => app.handle_drag(mouse.column, mouse.row),
        MouseEventKind::Up(MouseButton::Left) => app.handle_release(),
        _ => {}
    }
}
