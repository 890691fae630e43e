use std::time::Duration;

use crate::audio::AudioOut;
use crate::sample::SoundSource;

/// Pattern length; fixed for the whole kit.
pub const STEPS: usize = 8;

/// One direction of the pad pulse; it plays forward then back.
pub const PULSE_HALF: Duration = Duration::from_millis(300);
pub const PULSE_LEN: Duration = Duration::from_millis(600);

// ── Pulse ─────────────────────────────────────────────────────────────────────

/// Brief highlight drawn on the pad at the playing step.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Pulse {
    elapsed: Option<Duration>,
}

impl Pulse {
    /// Start the pulse.  A pulse already running is left alone until it is
    /// cleared.
    pub fn trigger(&mut self) {
        if self.elapsed.is_none() {
            self.elapsed = Some(Duration::ZERO);
        }
    }

    /// Returns `true` once the animation has run its full length.
    pub fn advance(&mut self, dt: Duration) -> bool {
        match self.elapsed.as_mut() {
            Some(e) => {
                *e += dt;
                *e >= PULSE_LEN
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.elapsed = None;
    }

    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.elapsed.is_some()
    }

    /// Ease-in-out brightness in [0, 1].
    pub fn level(&self) -> f32 {
        let Some(e) = self.elapsed else { return 0.0 };
        let t = e.as_secs_f32() / PULSE_HALF.as_secs_f32();
        let x = if t < 1.0 { t } else if t < 2.0 { 2.0 - t } else { 0.0 };
        x * x * (3.0 - 2.0 * x)
    }
}

// ── Track ─────────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, Default)]
pub struct Pad {
    pub active: bool,
    pub pulse: Pulse,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SoundOption {
    pub label: String,
    pub source: SoundSource,
}

/// One instrument lane: a sound, its 8-step pattern, and a mute switch.
pub struct Track {
    pub id: usize,
    pub name: String,
    pub pads: [Pad; STEPS],
    pub sounds: Vec<SoundOption>,
    selected: usize,
    source: SoundSource,
    muted: bool,
}

impl Track {
    /// `sounds` must not be empty; config validation guarantees it.
    pub fn new(id: usize, name: impl Into<String>, sounds: Vec<SoundOption>, selected: usize) -> Self {
        let selected = selected.min(sounds.len().saturating_sub(1));
        let source = sounds
            .get(selected)
            .map(|s| s.source.clone())
            .unwrap_or_else(|| SoundSource::File(Default::default()));
        Self {
            id,
            name: name.into(),
            pads: [Pad::default(); STEPS],
            sounds,
            selected,
            source,
            muted: false,
        }
    }

    /// Pulse the pad at `step` and, if it is active, restart the sound.
    pub fn render_step(&mut self, step: usize, out: &mut dyn AudioOut) {
        let volume = self.volume();
        let Some(pad) = self.pads.get_mut(step) else { return };
        pad.pulse.trigger();
        if pad.active {
            out.play(self.id, &self.source, volume);
        }
    }

    pub fn toggle_step(&mut self, step: usize) {
        if let Some(pad) = self.pads.get_mut(step) {
            pad.active = !pad.active;
        }
    }

    pub fn is_active(&self, step: usize) -> bool {
        self.pads.get(step).is_some_and(|p| p.active)
    }

    /// Used from the next `render_step` on; a hit already sounding keeps going.
    pub fn set_source(&mut self, source: SoundSource) {
        self.source = source;
    }

    pub fn source(&self) -> &SoundSource {
        &self.source
    }

    pub fn select_sound(&mut self, index: usize) -> Option<&SoundOption> {
        let source = self.sounds.get(index)?.source.clone();
        self.selected = index;
        self.set_source(source);
        self.sounds.get(index)
    }

    pub fn next_sound(&mut self) -> Option<&SoundOption> {
        let n = self.sounds.len();
        if n == 0 { return None; }
        self.select_sound((self.selected + 1) % n)
    }

    pub fn prev_sound(&mut self) -> Option<&SoundOption> {
        let n = self.sounds.len();
        if n == 0 { return None; }
        self.select_sound(if self.selected == 0 { n - 1 } else { self.selected - 1 })
    }

    pub fn selected_sound(&self) -> Option<&SoundOption> {
        self.sounds.get(self.selected)
    }

    pub fn set_muted(&mut self, muted: bool, out: &mut dyn AudioOut) {
        self.muted = muted;
        out.set_volume(self.id, self.volume());
    }

    pub fn toggle_mute(&mut self, out: &mut dyn AudioOut) {
        self.set_muted(!self.muted, out);
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn volume(&self) -> f32 {
        if self.muted { 0.0 } else { 1.0 }
    }

    /// Run pad animations forward, clearing any that finished so the next
    /// pass over that step can pulse again.
    pub fn advance_pulses(&mut self, dt: Duration) {
        for pad in &mut self.pads {
            if pad.pulse.advance(dt) {
                pad.pulse.clear();
            }
        }
    }

    pub fn pulse_level(&self, step: usize) -> f32 {
        self.pads.get(step).map_or(0.0, |p| p.pulse.level())
    }
}
