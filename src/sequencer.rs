use std::time::{Duration, Instant};

use crate::audio::AudioOut;
use crate::track::{Track, STEPS};

pub const DEFAULT_BPM: u32 = 150;

/// Tick spacing for `bpm`: `(60 / bpm) * 1000` ms, kept to the microsecond.
pub fn interval_for(bpm: u32) -> Duration {
    Duration::from_micros((60_000_000.0 / bpm.max(1) as f64).round() as u64)
}

// ── Timer ─────────────────────────────────────────────────────────────────────

/// A live periodic timer on a fixed phase.  Dropping it cancels it.
pub struct Ticker {
    interval: Duration,
    generation: u64,
    next: Instant,
}

impl Ticker {
    fn every(interval: Duration, generation: u64, now: Instant) -> Self {
        Self { interval, generation, next: now + interval }
    }

    /// Whether a tick is due at `now`.  A stalled loop gets one tick, not a
    /// burst; the missed deadlines are skipped and the phase is kept.
    fn due(&mut self, now: Instant) -> usize {
        if now < self.next {
            return 0;
        }
        let behind = (now - self.next).as_nanos() / self.interval.as_nanos().max(1);
        let skipped = u32::try_from(behind).unwrap_or(u32::MAX);
        self.next += self.interval * skipped.saturating_add(1);
        1
    }
}

pub enum Transport {
    Stopped,
    Running(Ticker),
}

// ── Sequencer ─────────────────────────────────────────────────────────────────

/// Shared clock for the kit: owns the tempo, the step counter and the tracks.
///
/// The step index only ever grows; stopping and starting keeps it, so the
/// pattern resumes from where it was (modulo `STEPS`).
pub struct Sequencer {
    pub tracks: Vec<Track>,
    bpm: u32,
    index: u64,
    transport: Transport,
    generation: u64,
    last_step: Option<usize>,
}

impl Sequencer {
    pub fn new(bpm: u32, tracks: Vec<Track>) -> Self {
        Self {
            tracks,
            bpm: bpm.max(1),
            index: 0,
            transport: Transport::Stopped,
            generation: 0,
            last_step: None,
        }
    }

    /// Render the current step on every track, then advance.
    pub fn tick(&mut self, out: &mut dyn AudioOut) -> usize {
        let step = (self.index % STEPS as u64) as usize;
        for track in &mut self.tracks {
            track.render_step(step, out);
        }
        self.index += 1;
        self.last_step = Some(step);
        log::debug!(target: "sequencer", "tick {} -> step {step}", self.index - 1);
        step
    }

    /// Run the timer: `tick` once if its deadline has passed.
    pub fn poll(&mut self, out: &mut dyn AudioOut) -> usize {
        self.poll_at(Instant::now(), out)
    }

    fn poll_at(&mut self, now: Instant, out: &mut dyn AudioOut) -> usize {
        let due = match &mut self.transport {
            Transport::Running(ticker) => ticker.due(now),
            Transport::Stopped => 0,
        };
        for _ in 0..due {
            self.tick(out);
        }
        due
    }

    /// Start if stopped, stop if running.  Returns whether it is now running.
    pub fn toggle_running(&mut self) -> bool {
        self.toggle_running_at(Instant::now())
    }

    fn toggle_running_at(&mut self, now: Instant) -> bool {
        match self.transport {
            Transport::Stopped => self.start_at(now),
            Transport::Running(_) => self.stop(),
        }
        self.is_running()
    }

    /// Store the tempo; a running timer is replaced at the new interval.
    pub fn set_tempo(&mut self, bpm: u32) {
        self.set_tempo_at(bpm, Instant::now());
    }

    fn set_tempo_at(&mut self, bpm: u32, now: Instant) {
        self.bpm = bpm.max(1);
        log::info!(target: "sequencer", "tempo {} bpm", self.bpm);
        if self.is_running() {
            self.start_at(now);
        }
    }

    /// The first tick lands one interval after `now`.
    fn start_at(&mut self, now: Instant) {
        self.generation += 1;
        let interval = interval_for(self.bpm);
        // Assigning drops the previous ticker, if any.
        self.transport = Transport::Running(Ticker::every(interval, self.generation, now));
        log::info!(target: "sequencer", "running every {interval:?} (timer #{})", self.generation);
    }

    fn stop(&mut self) {
        self.transport = Transport::Stopped;
        log::info!(target: "sequencer", "stopped at index {}", self.index);
    }

    pub fn is_running(&self) -> bool {
        matches!(self.transport, Transport::Running(_))
    }

    pub fn bpm(&self) -> u32 {
        self.bpm
    }

    #[cfg(test)]
    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn last_step(&self) -> Option<usize> {
        self.last_step
    }

    /// Interval of the live timer; `None` while stopped.
    pub fn interval(&self) -> Option<Duration> {
        match &self.transport {
            Transport::Running(t) => Some(t.interval),
            Transport::Stopped => None,
        }
    }

    /// Id of the live timer; each start hands out a fresh one.
    #[cfg(test)]
    pub fn generation(&self) -> Option<u64> {
        match &self.transport {
            Transport::Running(t) => Some(t.generation),
            Transport::Stopped => None,
        }
    }
}
