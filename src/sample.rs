use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{anyhow, Context};

use crate::drums::DrumKind;

const SYNTH_PREFIX: &str = "synth:";

// ── Sound source ──────────────────────────────────────────────────────────────

/// Where a track's sound comes from: a built-in voice or a WAV on disk.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SoundSource {
    Synth(DrumKind),
    File(PathBuf),
}

impl FromStr for SoundSource {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let s = s.trim();
        if let Some(slug) = s.strip_prefix(SYNTH_PREFIX) {
            return DrumKind::from_slug(slug)
                .map(SoundSource::Synth)
                .ok_or_else(|| anyhow!("unknown synth voice `{slug}`"));
        }
        if s.is_empty() {
            anyhow::bail!("empty sound source");
        }
        // File existence is checked when the sound is first played.
        Ok(SoundSource::File(PathBuf::from(s)))
    }
}

impl fmt::Display for SoundSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SoundSource::Synth(kind) => write!(f, "{SYNTH_PREFIX}{}", kind.slug()),
            SoundSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

// ── Sample buffer ─────────────────────────────────────────────────────────────

/// Decoded mono audio at the output device's rate.
#[derive(Clone, Debug, Default)]
pub struct SampleBuffer {
    pub data: Vec<f32>,
}

impl SampleBuffer {
    /// Load a WAV file, downmix to mono and resample to `target_rate`.
    pub fn load_wav(path: &Path, target_rate: u32) -> anyhow::Result<Self> {
        let mut reader = hound::WavReader::open(path)
            .with_context(|| format!("cannot open {}", path.display()))?;
        let spec = reader.spec();

        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<Result<Vec<_>, _>>()?,
            hound::SampleFormat::Int => {
                let max = (1i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|x| x as f32 / max))
                    .collect::<Result<Vec<_>, _>>()?
            }
        };

        let channels = spec.channels.max(1) as usize;
        let mono: Vec<f32> = if channels == 1 {
            samples
        } else {
            samples
                .chunks_exact(channels)
                .map(|c| c.iter().sum::<f32>() / channels as f32)
                .collect()
        };

        Ok(Self { data: resample_linear(&mono, spec.sample_rate, target_rate) })
    }
}

fn resample_linear(data: &[f32], source_rate: u32, target_rate: u32) -> Vec<f32> {
    if source_rate == target_rate || data.is_empty() {
        return data.to_vec();
    }
    let ratio = target_rate as f64 / source_rate as f64;
    let out_len = (data.len() as f64 * ratio).ceil() as usize;
    let last = data.len() - 1;

    (0..out_len)
        .map(|i| {
            let src_pos = i as f64 / ratio;
            let idx = src_pos.floor() as usize;
            if idx >= last {
                return data[last];
            }
            let frac = (src_pos - idx as f64) as f32;
            data[idx] * (1.0 - frac) + data[idx + 1] * frac
        })
        .collect()
}

// ── Sample bank ───────────────────────────────────────────────────────────────

/// Resolves sources into shared buffers, decoding each one at most once.
pub struct SampleBank {
    sample_rate: u32,
    loaded: HashMap<SoundSource, Arc<SampleBuffer>>,
    failed: HashMap<SoundSource, String>,
}

impl SampleBank {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate, loaded: HashMap::new(), failed: HashMap::new() }
    }

    /// Decode every source up front so playback never waits on the disk.
    /// Failures are kept and reported when the source is played.  Returns
    /// how many sources are ready.
    pub fn preload<'a>(&mut self, sources: impl IntoIterator<Item = &'a SoundSource>) -> usize {
        for source in sources {
            if let Err(e) = self.get(source) {
                log::warn!(target: "audio", "preload: {e:#}");
            }
        }
        log::info!(
            target: "audio",
            "sample bank: {} ready, {} failed",
            self.loaded.len(),
            self.failed.len()
        );
        self.loaded.len()
    }

    pub fn get(&mut self, source: &SoundSource) -> anyhow::Result<Arc<SampleBuffer>> {
        if let Some(buf) = self.loaded.get(source) {
            return Ok(Arc::clone(buf));
        }
        if let Some(msg) = self.failed.get(source) {
            anyhow::bail!("{msg}");
        }

        let result = match source {
            SoundSource::Synth(kind) => Ok(kind.render(self.sample_rate)),
            SoundSource::File(path) => SampleBuffer::load_wav(path, self.sample_rate),
        };
        match result {
            Ok(buf) => {
                log::debug!(target: "audio", "loaded {source} ({} frames)", buf.data.len());
                let buf = Arc::new(buf);
                self.loaded.insert(source.clone(), Arc::clone(&buf));
                Ok(buf)
            }
            Err(e) => {
                self.failed.insert(source.clone(), format!("{e:#}"));
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &Path, rate: u32, channels: u16, frames: &[i16]) {
        let spec = hound::WavSpec {
            channels,
            sample_rate: rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut w = hound::WavWriter::create(path, spec).unwrap();
        for &s in frames {
            w.write_sample(s).unwrap();
        }
        w.finalize().unwrap();
    }

    #[test]
    fn parses_synth_and_file_sources() {
        assert_eq!("synth:kick".parse::<SoundSource>().unwrap(), SoundSource::Synth(DrumKind::Kick));
        assert_eq!(
            "samples/kick-808.wav".parse::<SoundSource>().unwrap(),
            SoundSource::File(PathBuf::from("samples/kick-808.wav"))
        );
        assert!("synth:cowbell".parse::<SoundSource>().is_err());
        assert!("  ".parse::<SoundSource>().is_err());
    }

    #[test]
    fn display_matches_config_syntax() {
        assert_eq!(SoundSource::Synth(DrumKind::OpenHat).to_string(), "synth:open-hat");
        let src: SoundSource = "synth:low-tom".parse().unwrap();
        assert_eq!(src.to_string().parse::<SoundSource>().unwrap(), src);
    }

    #[test]
    fn resample_doubles_length_and_interpolates() {
        let out = resample_linear(&[0.0, 1.0], 22_050, 44_100);
        assert_eq!(out.len(), 4);
        assert_eq!(out[0], 0.0);
        assert!((out[1] - 0.5).abs() < 1e-6);
        assert_eq!(out[3], 1.0);
    }

    #[test]
    fn load_wav_downmixes_stereo() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hit.wav");
        write_wav(&path, 44_100, 2, &[16384, 0, -16384, -16384]);

        let buf = SampleBuffer::load_wav(&path, 44_100).unwrap();
        assert_eq!(buf.data.len(), 2);
        assert!((buf.data[0] - 0.25).abs() < 1e-4);
        assert!((buf.data[1] + 0.5).abs() < 1e-4);
    }

    #[test]
    fn bank_caches_loaded_buffers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snare.wav");
        write_wav(&path, 22_050, 1, &[1000; 100]);

        let mut bank = SampleBank::new(44_100);
        let src = SoundSource::File(path.clone());
        let a = bank.get(&src).unwrap();
        assert_eq!(a.data.len(), 200);

        std::fs::remove_file(&path).unwrap();
        let b = bank.get(&src).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn bank_defers_and_remembers_bad_sources() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.wav");
        let mut bank = SampleBank::new(44_100);
        let src = SoundSource::File(path.clone());
        assert!(bank.get(&src).is_err());

        let first = format!("{:#}", bank.get(&src).unwrap_err());

        // Appearing later does not matter; the failure is sticky.
        write_wav(&path, 44_100, 1, &[0; 10]);
        assert_eq!(format!("{:#}", bank.get(&src).unwrap_err()), first);
    }

    #[test]
    fn preloaded_sources_play_without_decoding() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("rim.wav");
        write_wav(&good, 44_100, 1, &[2000; 50]);
        let good = SoundSource::File(good);
        let bad = SoundSource::File(dir.path().join("absent.wav"));
        let synth = SoundSource::Synth(DrumKind::Kick);

        let mut bank = SampleBank::new(44_100);
        assert_eq!(bank.preload([&good, &bad, &synth, &good]), 2);
        let warm = bank.get(&good).unwrap();
        let kick = bank.get(&synth).unwrap();

        // Gone from disk: a decode would now fail, so any hit comes from the cache.
        std::fs::remove_dir_all(dir.path()).unwrap();
        assert!(Arc::ptr_eq(&bank.get(&good).unwrap(), &warm));
        assert!(Arc::ptr_eq(&bank.get(&synth).unwrap(), &kick));

        // The failure is held back until the source is played.
        let err = format!("{:#}", bank.get(&bad).unwrap_err());
        assert!(err.contains("absent.wav"), "{err}");
    }

    #[test]
    fn bank_renders_synth_voices() {
        let mut bank = SampleBank::new(22_050);
        let buf = bank.get(&SoundSource::Synth(DrumKind::Clap)).unwrap();
        assert!(!buf.data.is_empty());
    }
}
