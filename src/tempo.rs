use std::time::{Duration, Instant};

/// Without key-release events a drag counts as released after this much quiet.
pub const FALLBACK_RELEASE_THRESHOLD: Duration = Duration::from_millis(600);

/// The tempo control.  Dragging only moves the displayed number; the
/// sequencer sees the value once the drag is released.
#[derive(Clone, Debug)]
pub struct TempoSlider {
    pub value: u32,
    pub min: u32,
    pub max: u32,
    pub step: u32,
    pending: bool,
    last_drag: Option<Instant>,
}

impl TempoSlider {
    pub fn new(value: u32, min: u32, max: u32, step: u32) -> Self {
        Self {
            value: value.clamp(min, max),
            min,
            max,
            step: step.max(1),
            pending: false,
            last_drag: None,
        }
    }

    /// Move by `delta` notches.
    pub fn drag(&mut self, delta: i32) {
        let moved = self.value as i64 + delta as i64 * self.step as i64;
        self.value = moved.clamp(self.min as i64, self.max as i64) as u32;
        self.pending = true;
        self.last_drag = Some(Instant::now());
    }

    /// Finish the drag, handing back the value to commit.
    pub fn release(&mut self) -> Option<u32> {
        self.last_drag = None;
        std::mem::take(&mut self.pending).then_some(self.value)
    }

    pub fn is_dragging(&self) -> bool {
        self.pending
    }

    pub fn is_stale(&self, now: Instant, threshold: Duration) -> bool {
        self.pending
            && self
                .last_drag
                .map_or(true, |t| now.saturating_duration_since(t) >= threshold)
    }

    /// Position within the range, for the gauge.
    pub fn ratio(&self) -> f64 {
        if self.max <= self.min {
            return 1.0;
        }
        (self.value - self.min) as f64 / (self.max - self.min) as f64
    }
}
