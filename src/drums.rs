use std::f32::consts::PI;

use crate::sample::SampleBuffer;

// ── Drum kind ─────────────────────────────────────────────────────────────────

/// Built-in synthesized one-shots, addressable from config as `synth:<slug>`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DrumKind {
    Kick,
    Snare,
    ClosedHat,
    OpenHat,
    Clap,
    LowTom,
    MidTom,
    HighTom,
}

impl DrumKind {
    pub const ALL: [DrumKind; 8] = [
        DrumKind::Kick,
        DrumKind::Snare,
        DrumKind::ClosedHat,
        DrumKind::OpenHat,
        DrumKind::Clap,
        DrumKind::LowTom,
        DrumKind::MidTom,
        DrumKind::HighTom,
    ];

    pub fn slug(self) -> &'static str {
        match self {
            Self::Kick      => "kick",
            Self::Snare     => "snare",
            Self::ClosedHat => "closed-hat",
            Self::OpenHat   => "open-hat",
            Self::Clap      => "clap",
            Self::LowTom    => "low-tom",
            Self::MidTom    => "mid-tom",
            Self::HighTom   => "high-tom",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.slug() == slug)
    }

    /// Maximum duration (seconds) – rendering stops after this.
    fn duration(self) -> f32 {
        match self {
            Self::Kick      => 0.50,
            Self::Snare     => 0.20,
            Self::ClosedHat => 0.06,
            Self::OpenHat   => 0.38,
            Self::Clap      => 0.22,
            Self::LowTom    => 0.62,
            Self::MidTom    => 0.42,
            Self::HighTom   => 0.30,
        }
    }

    /// Noise seed, fixed per voice so a rendered hit is reproducible.
    fn seed(self) -> u32 {
        0xBEEF_CAFE_u32.wrapping_add((self as u32).wrapping_mul(0x9E37_79B9))
    }

    /// Render the whole hit once, so it can be replayed like any loaded sample.
    pub fn render(self, sample_rate: u32) -> SampleBuffer {
        let mut voice = DrumVoice::new(self, sample_rate as f32, self.seed());
        let mut data = Vec::with_capacity(voice.dur_samples as usize);
        while !voice.is_finished() {
            data.push(voice.next_sample());
        }
        SampleBuffer { data }
    }
}

// ── Noise ─────────────────────────────────────────────────────────────────────

/// Fast XOR-shift PRNG.  Returns values uniformly in [-1, 1].
#[inline(always)]
fn xorshift(state: &mut u32) -> f32 {
    *state ^= *state << 13;
    *state ^= *state >> 17;
    *state ^= *state << 5;
    (*state as i32 as f32) * (1.0 / i32::MAX as f32)
}

// ── Single drum voice ─────────────────────────────────────────────────────────

/// One synthesized hit.  Generates samples until its fixed duration runs out.
struct DrumVoice {
    kind: DrumKind,
    sample_pos: u64,
    dur_samples: u64,
    /// Phase accumulator for tonal components (0..1 normalised).
    phase: f32,
    noise: u32,
    sample_rate: f32,
}

impl DrumVoice {
    fn new(kind: DrumKind, sample_rate: f32, seed: u32) -> Self {
        Self {
            kind,
            sample_pos: 0,
            dur_samples: (kind.duration() * sample_rate).ceil() as u64,
            phase: 0.0,
            noise: seed | 1, // xorshift must never be 0
            sample_rate,
        }
    }

    #[inline]
    fn is_finished(&self) -> bool {
        self.sample_pos >= self.dur_samples
    }

    fn next_sample(&mut self) -> f32 {
        if self.is_finished() {
            return 0.0;
        }
        let t = self.sample_pos as f32 / self.sample_rate;
        let raw = match self.kind {
            DrumKind::Kick      => self.kick(t),
            DrumKind::Snare     => self.snare(t),
            DrumKind::ClosedHat => self.closed_hat(t),
            DrumKind::OpenHat   => self.open_hat(t),
            DrumKind::Clap      => self.clap(t),
            DrumKind::LowTom    => self.tom(t, 110.0,  52.0, 0.55),
            DrumKind::MidTom    => self.tom(t, 195.0,  90.0, 0.38),
            DrumKind::HighTom   => self.tom(t, 275.0, 140.0, 0.26),
        };
        self.sample_pos += 1;
        (raw * 0.85).clamp(-1.0, 1.0)
    }

    // ── Synthesis helpers ─────────────────────────────────────────────────

    #[inline]
    fn noise(&mut self) -> f32 {
        xorshift(&mut self.noise)
    }

    /// Advance the phase accumulator and return a sine value.
    #[inline]
    fn sine(&mut self, freq: f32) -> f32 {
        self.phase += freq / self.sample_rate;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }
        (self.phase * 2.0 * PI).sin()
    }

    // ── Individual drum synthesisers ──────────────────────────────────────

    fn kick(&mut self, t: f32) -> f32 {
        // Exponential pitch sweep 150 → 50 Hz, fast transient click
        let freq = 50.0 + 100.0 * (-t * 32.0_f32).exp();
        let tone = self.sine(freq);
        let amp  = (-t * 11.0_f32).exp();
        let click = if t < 0.004 { self.noise() * 0.38 } else { 0.0 };
        (tone * 0.88 + click) * amp
    }

    fn snare(&mut self, t: f32) -> f32 {
        let noise = self.noise();
        let tone  = self.sine(195.0);
        let amp   = (-t * 24.0_f32).exp();
        (noise * 0.72 + tone * 0.28) * amp
    }

    fn closed_hat(&mut self, t: f32) -> f32 {
        self.noise() * (-t * 85.0_f32).exp()
    }

    fn open_hat(&mut self, t: f32) -> f32 {
        self.noise() * (-t * 8.5_f32).exp()
    }

    fn clap(&mut self, t: f32) -> f32 {
        let noise = self.noise();
        let t_ms  = t * 1000.0;
        // Three staggered bursts, then a decaying body
        let burst = if      t_ms <  4.0 { 1.00 }
                    else if t_ms <  9.0 { 0.00 }
                    else if t_ms < 13.0 { 0.82 }
                    else if t_ms < 17.0 { 0.00 }
                    else if t_ms < 21.0 { 0.62 }
                    else                { 0.00 };
        let body = if t > 0.024 { (-(t - 0.024) * 22.0_f32).exp() * 0.42 } else { 0.0 };
        noise * (burst + body)
    }

    fn tom(&mut self, t: f32, start_hz: f32, end_hz: f32, decay_s: f32) -> f32 {
        let freq  = end_hz + (start_hz - end_hz) * (-t * 22.0_f32).exp();
        let tone  = self.sine(freq);
        let noise = self.noise();
        let amp   = (-t / decay_s).exp();
        (tone * 0.80 + noise * 0.20) * amp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs_round_trip() {
        for kind in DrumKind::ALL {
            assert_eq!(DrumKind::from_slug(kind.slug()), Some(kind));
        }
        assert_eq!(DrumKind::from_slug("cowbell"), None);
    }

    #[test]
    fn render_length_follows_duration() {
        let buf = DrumKind::Kick.render(44_100);
        assert_eq!(buf.data.len(), (0.50_f32 * 44_100.0).ceil() as usize);
        let hat = DrumKind::ClosedHat.render(48_000);
        assert_eq!(hat.data.len(), (0.06_f32 * 48_000.0).ceil() as usize);
    }

    #[test]
    fn rendered_hits_are_audible_and_bounded() {
        for kind in DrumKind::ALL {
            let buf = kind.render(22_050);
            let peak = buf.data.iter().fold(0.0f32, |m, s| m.max(s.abs()));
            assert!(peak > 0.01, "{} is silent", kind.slug());
            assert!(peak <= 1.0);
        }
    }

    #[test]
    fn every_voice_gets_its_own_seed() {
        let mut seeds: Vec<u32> = DrumKind::ALL.iter().map(|k| k.seed()).collect();
        assert_ne!(seeds[0], 0);
        seeds.sort_unstable();
        seeds.dedup();
        assert_eq!(seeds.len(), DrumKind::ALL.len());
        // Late voices in the list must render without overflowing the seed math.
        assert!(!DrumKind::HighTom.render(8_000).data.is_empty());
    }

    #[test]
    fn render_is_deterministic() {
        let a = DrumKind::Snare.render(22_050);
        let b = DrumKind::Snare.render(22_050);
        assert_eq!(a.data, b.data);
    }
}
