use std::sync::Arc;

use anyhow::Context;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender};

use crate::sample::{SampleBank, SampleBuffer, SoundSource};

const COMMAND_QUEUE: usize = 1024;

// ── Track-facing seam ─────────────────────────────────────────────────────────

/// What a track needs from the audio host.  Calls are fire-and-forget;
/// failures come back later through `take_error`.
pub trait AudioOut {
    /// Restart `track`'s lane from the top with `source`.
    fn play(&mut self, track: usize, source: &SoundSource, volume: f32);
    /// Change a lane's volume, including any hit still ringing.
    fn set_volume(&mut self, track: usize, volume: f32);
    fn take_error(&mut self) -> Option<String> {
        None
    }
}

#[derive(Clone, Debug)]
pub enum AudioCommand {
    Play { track: usize, buffer: Arc<SampleBuffer>, volume: f32 },
    SetVolume { track: usize, volume: f32 },
}

// ── Mixer (audio thread) ──────────────────────────────────────────────────────

struct Voice {
    buffer: Arc<SampleBuffer>,
    pos: usize,
}

struct Lane {
    voice: Option<Voice>,
    volume: f32,
}

/// One lane per track, at most one sounding voice per lane.
pub struct Mixer {
    lanes: Vec<Lane>,
}

impl Mixer {
    pub fn new(tracks: usize) -> Self {
        Self {
            lanes: (0..tracks).map(|_| Lane { voice: None, volume: 1.0 }).collect(),
        }
    }

    pub fn handle_cmd(&mut self, cmd: AudioCommand) {
        match cmd {
            AudioCommand::Play { track, buffer, volume } => {
                if let Some(lane) = self.lanes.get_mut(track) {
                    lane.volume = volume;
                    lane.voice = Some(Voice { buffer, pos: 0 });
                }
            }
            AudioCommand::SetVolume { track, volume } => {
                if let Some(lane) = self.lanes.get_mut(track) {
                    lane.volume = volume;
                }
            }
        }
    }

    /// Fill an interleaved block, writing the mono mix to every channel.
    pub fn render(&mut self, out: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        for frame in out.chunks_mut(channels) {
            let mut mix = 0.0f32;
            for lane in &mut self.lanes {
                let Some(voice) = lane.voice.as_mut() else { continue };
                match voice.buffer.data.get(voice.pos) {
                    Some(s) => {
                        mix += s * lane.volume;
                        voice.pos += 1;
                    }
                    None => lane.voice = None,
                }
            }
            frame.fill(mix.clamp(-1.0, 1.0));
        }
    }

    #[cfg(test)]
    fn is_sounding(&self, track: usize) -> bool {
        self.lanes.get(track).is_some_and(|l| l.voice.is_some())
    }
}

// ── Handle (main thread) ──────────────────────────────────────────────────────

/// Owns the output stream; dropping it silences the kit.
pub struct AudioHandle {
    tx: Sender<AudioCommand>,
    bank: SampleBank,
    errors: Vec<String>,
    _stream: cpal::Stream,
}

impl AudioHandle {
    /// Decode every sound the kit can select before playback starts.
    pub fn preload<'a>(&mut self, sources: impl IntoIterator<Item = &'a SoundSource>) -> usize {
        self.bank.preload(sources)
    }

    fn send(&self, cmd: AudioCommand) {
        if self.tx.try_send(cmd).is_err() {
            log::warn!(target: "audio", "command queue full, dropping command");
        }
    }
}

impl AudioOut for AudioHandle {
    fn play(&mut self, track: usize, source: &SoundSource, volume: f32) {
        match self.bank.get(source) {
            Ok(buffer) => self.send(AudioCommand::Play { track, buffer, volume }),
            Err(e) => {
                log::warn!(target: "audio", "track {track}: cannot play {source}: {e:#}");
                self.errors.push(format!("Cannot play {source}: {e}"));
            }
        }
    }

    fn set_volume(&mut self, track: usize, volume: f32) {
        self.send(AudioCommand::SetVolume { track, volume });
    }

    fn take_error(&mut self) -> Option<String> {
        self.errors.pop()
    }
}

pub fn start_audio(tracks: usize) -> anyhow::Result<AudioHandle> {
    let (tx, rx) = crossbeam_channel::bounded::<AudioCommand>(COMMAND_QUEUE);

    let host = cpal::default_host();
    let device = host.default_output_device().context("no default output device")?;
    let config = device.default_output_config().context("no default output config")?;

    let sample_rate = config.sample_rate().0;
    let channels = config.channels() as usize;
    log::info!(
        target: "audio",
        "output: {} @ {sample_rate} Hz, {channels} ch, {:?}",
        device.name().unwrap_or_else(|_| "unknown".into()),
        config.sample_format(),
    );

    let stream = match config.sample_format() {
        cpal::SampleFormat::F32 => build_output_stream(&device, &config.into(), rx, tracks, channels)?,
        other => anyhow::bail!("unsupported sample format {other:?} (only f32 output is supported)"),
    };
    stream.play().context("failed to start output stream")?;

    Ok(AudioHandle {
        tx,
        bank: SampleBank::new(sample_rate),
        errors: Vec::new(),
        _stream: stream,
    })
}

fn build_output_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    rx: Receiver<AudioCommand>,
    tracks: usize,
    channels: usize,
) -> anyhow::Result<cpal::Stream> {
    let mut mixer = Mixer::new(tracks);
    let err_fn = |err| log::error!(target: "audio", "output stream error: {err}");

    let stream = device.build_output_stream(
        config,
        move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
            while let Ok(cmd) = rx.try_recv() {
                mixer.handle_cmd(cmd);
            }
            mixer.render(data, channels);
        },
        err_fn,
        None,
    )?;
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buf(data: &[f32]) -> Arc<SampleBuffer> {
        Arc::new(SampleBuffer { data: data.to_vec() })
    }

    #[test]
    fn play_writes_every_channel() {
        let mut m = Mixer::new(1);
        m.handle_cmd(AudioCommand::Play { track: 0, buffer: buf(&[0.5, 0.25]), volume: 1.0 });
        let mut out = [0.0; 6];
        m.render(&mut out, 2);
        assert_eq!(out, [0.5, 0.5, 0.25, 0.25, 0.0, 0.0]);
        assert!(!m.is_sounding(0));
    }

    #[test]
    fn retrigger_restarts_instead_of_queueing() {
        let mut m = Mixer::new(1);
        let hit = buf(&[0.1, 0.2, 0.3]);
        m.handle_cmd(AudioCommand::Play { track: 0, buffer: Arc::clone(&hit), volume: 1.0 });
        let mut out = [0.0; 2];
        m.render(&mut out, 1);
        assert_eq!(out, [0.1, 0.2]);

        m.handle_cmd(AudioCommand::Play { track: 0, buffer: hit, volume: 1.0 });
        let mut out = [0.0; 4];
        m.render(&mut out, 1);
        assert_eq!(out, [0.1, 0.2, 0.3, 0.0]);
    }

    #[test]
    fn volume_change_reaches_ringing_voice() {
        let mut m = Mixer::new(2);
        m.handle_cmd(AudioCommand::Play { track: 1, buffer: buf(&[0.5; 4]), volume: 1.0 });
        let mut out = [0.0; 2];
        m.render(&mut out, 1);
        assert_eq!(out, [0.5, 0.5]);

        m.handle_cmd(AudioCommand::SetVolume { track: 1, volume: 0.0 });
        m.render(&mut out, 1);
        assert_eq!(out, [0.0, 0.0]);
        assert!(m.is_sounding(1));
    }

    #[test]
    fn lanes_sum_and_clip() {
        let mut m = Mixer::new(3);
        for track in 0..3 {
            m.handle_cmd(AudioCommand::Play { track, buffer: buf(&[0.6]), volume: 1.0 });
        }
        let mut out = [0.0; 1];
        m.render(&mut out, 1);
        assert_eq!(out, [1.0]);
    }

    #[test]
    fn unknown_lane_is_ignored() {
        let mut m = Mixer::new(1);
        m.handle_cmd(AudioCommand::Play { track: 5, buffer: buf(&[1.0]), volume: 1.0 });
        m.handle_cmd(AudioCommand::SetVolume { track: 5, volume: 0.0 });
        let mut out = [0.0; 1];
        m.render(&mut out, 1);
        assert_eq!(out, [0.0]);
    }
}
