use std::time::{Duration, Instant};

use crate::audio::AudioOut;
use crate::sequencer::Sequencer;
use crate::tempo::{TempoSlider, FALLBACK_RELEASE_THRESHOLD};
use crate::track::STEPS;

// ── App state ─────────────────────────────────────────────────────────────────

/// Wires key events to the kit.  Everything the view draws is read from here.
pub struct App {
    pub kit:        Sequencer,
    pub tempo:      TempoSlider,
    pub sel_track:  usize,
    pub sel_step:   usize,
    pub status_msg: String,
    pub should_quit: bool,
    audio: Box<dyn AudioOut>,
}

impl App {
    pub fn new(kit: Sequencer, tempo: TempoSlider, audio: Box<dyn AudioOut>) -> Self {
        Self {
            kit,
            tempo,
            sel_track:  0,
            sel_step:   0,
            status_msg: "Ready".to_string(),
            should_quit: false,
            audio,
        }
    }

    // ── Frame update ──────────────────────────────────────────────────────

    /// Run due ticks, animate pads and pick up playback errors.
    pub fn update(&mut self, dt: Duration) {
        self.kit.poll(self.audio.as_mut());
        for track in &mut self.kit.tracks {
            track.advance_pulses(dt);
        }
        if let Some(err) = self.audio.take_error() {
            self.status_msg = err;
        }
    }

    // ── Cursor ────────────────────────────────────────────────────────────

    pub fn track_up(&mut self) {
        let n = self.kit.tracks.len();
        self.sel_track = if self.sel_track == 0 { n - 1 } else { self.sel_track - 1 };
    }

    pub fn track_down(&mut self) {
        let n = self.kit.tracks.len();
        self.sel_track = (self.sel_track + 1) % n;
    }

    pub fn step_left(&mut self) {
        self.sel_step = if self.sel_step == 0 { STEPS - 1 } else { self.sel_step - 1 };
    }

    pub fn step_right(&mut self) {
        self.sel_step = (self.sel_step + 1) % STEPS;
    }

    // ── Pads ──────────────────────────────────────────────────────────────

    pub fn toggle_pad(&mut self) {
        let step = self.sel_step;
        self.toggle_pad_at(step);
    }

    /// Number keys 1–8 hit the pads of the selected track directly.
    pub fn toggle_pad_at(&mut self, step: usize) {
        let Some(track) = self.kit.tracks.get_mut(self.sel_track) else { return };
        track.toggle_step(step);
        if step < STEPS {
            self.sel_step = step;
        }
    }

    // ── Per-track controls ────────────────────────────────────────────────

    pub fn toggle_mute(&mut self) {
        let Some(track) = self.kit.tracks.get_mut(self.sel_track) else { return };
        track.toggle_mute(self.audio.as_mut());
        self.status_msg = if track.is_muted() {
            format!("{} muted", track.name)
        } else {
            format!("{} unmuted", track.name)
        };
    }

    pub fn next_sound(&mut self) {
        let Some(track) = self.kit.tracks.get_mut(self.sel_track) else { return };
        if let Some(label) = track.next_sound().map(|s| s.label.clone()) {
            self.status_msg = format!("{}: {} ({})", track.name, label, track.source());
        }
    }

    pub fn prev_sound(&mut self) {
        let Some(track) = self.kit.tracks.get_mut(self.sel_track) else { return };
        if let Some(label) = track.prev_sound().map(|s| s.label.clone()) {
            self.status_msg = format!("{}: {} ({})", track.name, label, track.source());
        }
    }

    // ── Transport ─────────────────────────────────────────────────────────

    pub fn toggle_play(&mut self) {
        let running = self.kit.toggle_running();
        self.status_msg = if running { "Playing".to_string() } else { "Stopped".to_string() };
    }

    /// Label of the play/stop button for the current state.
    pub fn play_label(&self) -> &'static str {
        if self.kit.is_running() { "Stop" } else { "Play" }
    }

    // ── Tempo ─────────────────────────────────────────────────────────────

    /// Live drag: only the displayed number changes.
    pub fn tempo_drag(&mut self, delta: i32) {
        self.tempo.drag(delta);
        self.status_msg = format!("Tempo: {} (release to apply)", self.tempo.value);
    }

    /// Commit the dragged value to the sequencer.
    pub fn tempo_release(&mut self) {
        if let Some(bpm) = self.tempo.release() {
            self.kit.set_tempo(bpm);
            self.status_msg = format!("Tempo: {} BPM", self.kit.bpm());
        }
    }

    /// Fallback keyboards never report releases; commit after a quiet spell.
    pub fn tick_fallback_release(&mut self) {
        if self.tempo.is_stale(Instant::now(), FALLBACK_RELEASE_THRESHOLD) {
            self.tempo_release();
        }
    }
}
