use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph, Wrap},
    Frame,
};

use crate::app::App;
use crate::track::{Track, STEPS};

// ── Top-level routing ─────────────────────────────────────────────────────────

pub fn draw(f: &mut Frame, app: &App, enhanced: bool) {
    let area = f.area();
    let grid_height = app.kit.tracks.len() as u16 + 4;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),           // title + play button  chunks[0]
            Constraint::Length(3),           // tempo slider          chunks[1]
            Constraint::Length(grid_height), // pad grid              chunks[2]
            Constraint::Length(3),           // status                chunks[3]
            Constraint::Min(0),              // help                  chunks[4]
        ])
        .split(area);

    draw_title(f, chunks[0], app, enhanced);
    draw_tempo(f, chunks[1], app);
    draw_grid(f, chunks[2], app);
    draw_status(f, chunks[3], app);
    draw_help(f, chunks[4], enhanced);
}

// ── Title bar ─────────────────────────────────────────────────────────────────

fn draw_title(f: &mut Frame, area: Rect, app: &App, enhanced: bool) {
    let running = app.kit.is_running();
    let button = format!(" {} ", app.play_label());
    let button_style = if running {
        Style::default().fg(Color::Black).bg(Color::Green).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::White).bg(Color::DarkGray).add_modifier(Modifier::BOLD)
    };
    let kb_mode = if enhanced { "enhanced" } else { "fallback" };

    let line = Line::from(vec![
        Span::styled(" stepkit ", Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD)),
        Span::raw("  "),
        Span::styled(button, button_style),
        Span::raw("  "),
        Span::styled(format!("keys: {kb_mode}"), Style::default().fg(Color::DarkGray)),
    ]);
    let block = Block::default().borders(Borders::ALL);
    f.render_widget(Paragraph::new(line).block(block), area);
}

// ── Tempo slider ──────────────────────────────────────────────────────────────

fn draw_tempo(f: &mut Frame, area: Rect, app: &App) {
    let slider = &app.tempo;
    let label_style = if slider.is_dragging() {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
    };
    let label = match app.kit.interval() {
        Some(iv) => format!("{} BPM · {} ms/step", slider.value, iv.as_millis()),
        None => format!("{} BPM", slider.value),
    };
    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title(" Tempo "))
        .gauge_style(Style::default().fg(Color::Cyan).bg(Color::Black))
        .ratio(slider.ratio().clamp(0.0, 1.0))
        .label(Span::styled(label, label_style));
    f.render_widget(gauge, area);
}

// ── Pad grid ──────────────────────────────────────────────────────────────────

fn draw_grid(f: &mut Frame, area: Rect, app: &App) {
    let playing = app.kit.is_running();
    let current = app.kit.last_step();
    let name_width = app.kit.tracks.iter().map(|t| t.name.len()).max().unwrap_or(0).max(5);
    let sound_width = app
        .kit
        .tracks
        .iter()
        .filter_map(|t| t.selected_sound().map(|s| s.label.len()))
        .max()
        .unwrap_or(0);

    let mut lines: Vec<Line> = Vec::new();

    // Step header
    {
        let pad = " ".repeat(name_width + sound_width + 7);
        let mut s = vec![Span::raw(pad)];
        for i in 0..STEPS {
            let is_ph = playing && current == Some(i);
            let sty = if is_ph { Style::default().fg(Color::Green).add_modifier(Modifier::BOLD) }
                      else     { Style::default().fg(Color::DarkGray) };
            s.push(Span::styled(format!(" {:^3}", i + 1), sty));
        }
        lines.push(Line::from(s));
    }

    for (ti, track) in app.kit.tracks.iter().enumerate() {
        lines.push(track_row(track, ti == app.sel_track, app.sel_step, name_width, sound_width));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Pads — [↑↓] Track  [←→] Step  [Space/1-8] Toggle  [m] Mute  [s/S] Sound ");
    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn track_row<'a>(track: &'a Track, is_selected: bool, sel_step: usize, name_width: usize, sound_width: usize) -> Line<'a> {
    let muted = track.is_muted();
    let track_color = track_color(track.id);
    let name_style = if is_selected && !muted {
        Style::default().fg(track_color).add_modifier(Modifier::BOLD)
    } else if is_selected {
        Style::default().fg(Color::DarkGray).add_modifier(Modifier::BOLD)
    } else if muted {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default().fg(track_color)
    };
    let mute_char = if muted { 'M' } else { '·' };
    let sound = track.selected_sound().map(|s| s.label.as_str()).unwrap_or("-");

    let mut row: Vec<Span> = vec![
        Span::styled(format!(" {:name_width$}", track.name), name_style),
        Span::styled("[", Style::default().fg(Color::DarkGray)),
        Span::styled(mute_char.to_string(), Style::default().fg(if muted { Color::Red } else { Color::DarkGray })),
        Span::styled("] ", Style::default().fg(Color::DarkGray)),
        Span::styled(format!("{sound:sound_width$}"), Style::default().fg(Color::Gray)),
        Span::styled(" │", Style::default().fg(Color::DarkGray)),
    ];

    for i in 0..STEPS {
        let active = track.is_active(i);
        let pulse = track.pulse_level(i);
        let is_cu = is_selected && i == sel_step;

        let glyph = if active { "■" } else { "·" };
        let mut sty = if pulse > 0.5 {
            Style::default().fg(Color::Black).bg(if active { track_color } else { Color::Gray })
        } else if pulse > 0.0 {
            Style::default().fg(if active { Color::White } else { Color::Gray })
        } else if active {
            Style::default().fg(track_color)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        if active {
            sty = sty.add_modifier(Modifier::BOLD);
        }
        if is_cu {
            sty = sty.add_modifier(Modifier::REVERSED);
        }
        row.push(Span::raw(" "));
        row.push(Span::styled(format!(" {glyph} "), sty));
    }

    Line::from(row)
}

fn track_color(id: usize) -> Color {
    const PALETTE: [Color; 6] =
        [Color::Red, Color::Yellow, Color::Cyan, Color::Magenta, Color::Green, Color::Blue];
    PALETTE[id % PALETTE.len()]
}

// ── Status / help ─────────────────────────────────────────────────────────────

fn draw_status(f: &mut Frame, area: Rect, app: &App) {
    let line = Line::from(vec![
        Span::styled(" ", Style::default()),
        Span::styled(app.status_msg.clone(), Style::default().fg(Color::White)),
    ]);
    let block = Block::default().borders(Borders::ALL).title(" Status ");
    f.render_widget(Paragraph::new(line).block(block), area);
}

fn draw_help(f: &mut Frame, area: Rect, enhanced: bool) {
    let release = if enhanced {
        "release key to apply"
    } else {
        "applies after a short pause"
    };
    let dim = Style::default().fg(Color::DarkGray);
    let key = Style::default().fg(Color::Cyan);
    let lines = vec![
        Line::from(vec![
            Span::styled(" [p/Enter]", key), Span::styled(" Play/Stop   ", dim),
            Span::styled("[+/-] [PgUp/PgDn]", key), Span::styled(format!(" Tempo ({release})   "), dim),
            Span::styled("[Esc]", key), Span::styled(" Quit", dim),
        ]),
    ];
    f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), area);
}
