mod app;
mod audio;
mod config;
mod drums;
mod sample;
mod sequencer;
mod tempo;
mod track;
mod ui;

#[cfg(test)]
mod test_support;

use std::fs::File;
use std::path::PathBuf;
use std::{io, time::{Duration, Instant}};

use anyhow::{Context, Result};
use app::App;
use config::Config;
use crossterm::{
    event::{
        self, DisableFocusChange, EnableFocusChange, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers, KeyboardEnhancementFlags, PopKeyboardEnhancementFlags,
        PushKeyboardEnhancementFlags,
    },
    execute,
    terminal::{
        disable_raw_mode, enable_raw_mode, supports_keyboard_enhancement, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
};
use ratatui::{backend::CrosstermBackend, Terminal};
use sequencer::Sequencer;
use tempo::TempoSlider;

/// Input is polled in short slices so ticks stay close to their deadline.
const POLL_INTERVAL: Duration = Duration::from_millis(4);
const FRAME_INTERVAL: Duration = Duration::from_millis(16);

struct Args {
    config: Option<PathBuf>,
    verbose: bool,
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    Args {
        config: args
            .iter()
            .position(|a| a == "--config")
            .and_then(|i| args.get(i + 1))
            .map(PathBuf::from),
        verbose: args.iter().any(|a| a == "--verbose" || a == "-v"),
    }
}

fn init_logging(verbose: bool) -> Result<()> {
    use simplelog::{LevelFilter, WriteLogger};

    let log_level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };

    let log_path = config::app_dir()
        .map(|d| d.join("stepkit.log"))
        .unwrap_or_else(|| PathBuf::from("stepkit.log"));
    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let log_file = File::create(&log_path)
        .or_else(|_| File::create("stepkit.log"))
        .with_context(|| format!("cannot create log file {}", log_path.display()))?;

    WriteLogger::init(log_level, simplelog::Config::default(), log_file).context("logger already set")?;
    log::info!("stepkit starting (log level: {:?})", log_level);
    Ok(())
}

fn main() {
    if let Err(e) = try_main() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<()> {
    let args = parse_args();
    init_logging(args.verbose)?;

    // Everything that can fail at startup happens before the terminal is taken.
    let config = Config::load(args.config.as_deref())?;
    let tracks = config.build_tracks()?;
    let mut audio = audio::start_audio(tracks.len())?;
    audio.preload(tracks.iter().flat_map(|t| t.sounds.iter().map(|s| &s.source)));
    log::info!("kit: {} tracks, {} bpm", tracks.len(), config.bpm);

    let kit = Sequencer::new(config.bpm, tracks);
    let tempo = TempoSlider::new(config.bpm, config.bpm_min, config.bpm_max, config.bpm_step);
    let mut app = App::new(kit, tempo, Box::new(audio));

    enable_raw_mode()?;
    let mut stdout = io::stdout();

    let enhanced = supports_keyboard_enhancement().unwrap_or(false);
    if enhanced {
        execute!(stdout, EnterAlternateScreen, EnableFocusChange,
            PushKeyboardEnhancementFlags(
                KeyboardEnhancementFlags::REPORT_EVENT_TYPES
                    | KeyboardEnhancementFlags::REPORT_ALL_KEYS_AS_ESCAPE_CODES))?;
    } else {
        execute!(stdout, EnterAlternateScreen, EnableFocusChange)?;
    }

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    let result = run(&mut terminal, &mut app, enhanced);

    disable_raw_mode()?;
    if enhanced {
        execute!(terminal.backend_mut(), PopKeyboardEnhancementFlags, DisableFocusChange, LeaveAlternateScreen)?;
    } else {
        execute!(terminal.backend_mut(), DisableFocusChange, LeaveAlternateScreen)?;
    }
    terminal.show_cursor()?;
    log::info!("stepkit exiting");
    result
}

fn run(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App, enhanced: bool) -> Result<()> {
    let mut last_update = Instant::now();
    let mut last_frame: Option<Instant> = None;

    loop {
        if last_frame.map_or(true, |t| t.elapsed() >= FRAME_INTERVAL) {
            terminal.draw(|f| ui::draw(f, app, enhanced))?;
            last_frame = Some(Instant::now());
        }

        if event::poll(POLL_INTERVAL)? {
            handle_event(app, event::read()?);
        }

        if !enhanced { app.tick_fallback_release(); }
        let now = Instant::now();
        app.update(now - last_update);
        last_update = now;

        if app.should_quit { break; }
    }
    Ok(())
}

fn handle_event(app: &mut App, event: Event) {
    match event {
        Event::Key(key) => handle_key(app, key),
        // A release can be lost while the window is unfocused.
        Event::FocusLost => app.tempo_release(),
        _ => {}
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // ── Key release (enhanced mode only) ──────────────────────────────────
    if key.kind == KeyEventKind::Release {
        if tempo_delta(key.code).is_some() { app.tempo_release(); }
        return;
    }

    // ── Key repeat: drags and cursor movement only ────────────────────────
    if key.kind == KeyEventKind::Repeat {
        match key.code {
            KeyCode::Up    => app.track_up(),
            KeyCode::Down  => app.track_down(),
            KeyCode::Left  => app.step_left(),
            KeyCode::Right => app.step_right(),
            code => if let Some(d) = tempo_delta(code) { app.tempo_drag(d) },
        }
        return;
    }

    // ── Key press ─────────────────────────────────────────────────────────
    match key.code {
        KeyCode::Esc => app.should_quit = true,
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => app.should_quit = true,

        KeyCode::Char('p') | KeyCode::Enter => app.toggle_play(),

        KeyCode::Up    => app.track_up(),
        KeyCode::Down  => app.track_down(),
        KeyCode::Left  => app.step_left(),
        KeyCode::Right => app.step_right(),

        KeyCode::Char(' ') => app.toggle_pad(),
        KeyCode::Char(c @ '1'..='8') => app.toggle_pad_at(c as usize - '1' as usize),

        KeyCode::Char('m') => app.toggle_mute(),
        KeyCode::Char('s') => app.next_sound(),
        KeyCode::Char('S') => app.prev_sound(),

        code => if let Some(d) = tempo_delta(code) { app.tempo_drag(d) },
    }
}

fn tempo_delta(code: KeyCode) -> Option<i32> {
    match code {
        KeyCode::Char('+') | KeyCode::Char('=') => Some(1),
        KeyCode::Char('-') | KeyCode::Char('_') => Some(-1),
        KeyCode::PageUp   => Some(10),
        KeyCode::PageDown => Some(-10),
        _ => None,
    }
}
