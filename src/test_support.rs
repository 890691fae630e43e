use std::cell::RefCell;
use std::rc::Rc;

use crate::audio::AudioOut;
use crate::sample::SoundSource;

#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    Play(usize, SoundSource, f32),
    Volume(usize, f32),
}

/// Audio host stand-in that remembers what it was asked to do.
#[derive(Default)]
pub struct Recorder {
    pub calls: Vec<Call>,
    pub errors: Vec<String>,
}

impl AudioOut for Recorder {
    fn play(&mut self, track: usize, source: &SoundSource, volume: f32) {
        self.calls.push(Call::Play(track, source.clone(), volume));
    }

    fn set_volume(&mut self, track: usize, volume: f32) {
        self.calls.push(Call::Volume(track, volume));
    }

    fn take_error(&mut self) -> Option<String> {
        self.errors.pop()
    }
}

/// A `Recorder` the test keeps a handle to after boxing it into an `App`.
#[derive(Clone, Default)]
pub struct Shared(Rc<RefCell<Recorder>>);

impl Shared {
    pub fn calls(&self) -> Vec<Call> {
        self.0.borrow().calls.clone()
    }

    pub fn push_error(&self, msg: &str) {
        self.0.borrow_mut().errors.push(msg.to_string());
    }
}

impl AudioOut for Shared {
    fn play(&mut self, track: usize, source: &SoundSource, volume: f32) {
        self.0.borrow_mut().play(track, source, volume);
    }

    fn set_volume(&mut self, track: usize, volume: f32) {
        self.0.borrow_mut().set_volume(track, volume);
    }

    fn take_error(&mut self) -> Option<String> {
        self.0.borrow_mut().take_error()
    }
}
