use std::path::{Path, PathBuf};

use anyhow::{ensure, Context};
use serde::Deserialize;

use crate::sample::SoundSource;
use crate::sequencer::DEFAULT_BPM;
use crate::track::{SoundOption, Track};

const DEFAULT_CONFIG: &str = include_str!("../config.toml");

#[derive(Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    tempo: TempoConfig,
    tracks: Option<Vec<TrackConfig>>,
}

#[derive(Deserialize, Default)]
struct TempoConfig {
    bpm: Option<u32>,
    min: Option<u32>,
    max: Option<u32>,
    step: Option<u32>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct TrackConfig {
    pub name: String,
    #[serde(default)]
    pub selected: usize,
    pub sounds: Vec<SoundConfig>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct SoundConfig {
    pub label: String,
    pub source: String,
}

#[derive(Debug)]
pub struct Config {
    pub bpm: u32,
    pub bpm_min: u32,
    pub bpm_max: u32,
    pub bpm_step: u32,
    pub tracks: Vec<TrackConfig>,
}

impl Config {
    /// Embedded defaults, overlaid with the user's file.  An explicit
    /// `path` must load; the default location is optional and a broken file
    /// there is only logged.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let user = match path {
            Some(p) => {
                let text = std::fs::read_to_string(p)
                    .with_context(|| format!("cannot read config {}", p.display()))?;
                let file = toml::from_str::<ConfigFile>(&text)
                    .with_context(|| format!("malformed config {}", p.display()))?;
                Some(file)
            }
            None => user_config_path().filter(|p| p.exists()).and_then(|p| read_optional(&p)),
        };
        Self::merged(user)
    }

    /// The embedded kit alone, ignoring any user file.
    #[cfg(test)]
    pub fn defaults() -> anyhow::Result<Self> {
        Self::merged(None)
    }

    fn merged(user: Option<ConfigFile>) -> anyhow::Result<Self> {
        let mut base: ConfigFile =
            toml::from_str(DEFAULT_CONFIG).context("embedded config.toml is malformed")?;
        if let Some(user) = user {
            merge_tempo(&mut base.tempo, user.tempo);
            if user.tracks.is_some() {
                base.tracks = user.tracks;
            }
        }

        let config = Config {
            bpm: base.tempo.bpm.unwrap_or(DEFAULT_BPM),
            bpm_min: base.tempo.min.unwrap_or(40),
            bpm_max: base.tempo.max.unwrap_or(300),
            bpm_step: base.tempo.step.unwrap_or(1),
            tracks: base.tracks.unwrap_or_default(),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        ensure!(self.bpm_min >= 1, "tempo.min must be at least 1");
        ensure!(
            self.bpm_min <= self.bpm && self.bpm <= self.bpm_max,
            "tempo.bpm {} is outside {}..={}",
            self.bpm, self.bpm_min, self.bpm_max
        );
        ensure!(!self.tracks.is_empty(), "no tracks configured");
        for t in &self.tracks {
            ensure!(!t.sounds.is_empty(), "track `{}` has no sounds", t.name);
            ensure!(
                t.selected < t.sounds.len(),
                "track `{}` selects sound {} of {}",
                t.name, t.selected, t.sounds.len()
            );
            for s in &t.sounds {
                s.source
                    .parse::<SoundSource>()
                    .with_context(|| format!("track `{}`, sound `{}`", t.name, s.label))?;
            }
        }
        Ok(())
    }

    /// Build the kit's tracks in config order.
    pub fn build_tracks(&self) -> anyhow::Result<Vec<Track>> {
        self.tracks
            .iter()
            .enumerate()
            .map(|(id, t)| -> anyhow::Result<Track> {
                let sounds = t
                    .sounds
                    .iter()
                    .map(|s| -> anyhow::Result<SoundOption> {
                        Ok(SoundOption { label: s.label.clone(), source: s.source.parse()? })
                    })
                    .collect::<anyhow::Result<Vec<_>>>()?;
                Ok(Track::new(id, t.name.clone(), sounds, t.selected))
            })
            .collect()
    }
}

fn merge_tempo(base: &mut TempoConfig, user: TempoConfig) {
    if user.bpm.is_some() { base.bpm = user.bpm; }
    if user.min.is_some() { base.min = user.min; }
    if user.max.is_some() { base.max = user.max; }
    if user.step.is_some() { base.step = user.step; }
}

fn read_optional(path: &Path) -> Option<ConfigFile> {
    match std::fs::read_to_string(path) {
        Ok(text) => match toml::from_str::<ConfigFile>(&text) {
            Ok(file) => Some(file),
            Err(e) => {
                log::warn!(target: "config", "ignoring malformed config {}: {}", path.display(), e);
                None
            }
        },
        Err(e) => {
            log::warn!(target: "config", "could not read config {}: {}", path.display(), e);
            None
        }
    }
}

pub fn app_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("stepkit"))
}

fn user_config_path() -> Option<PathBuf> {
    app_dir().map(|d| d.join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drums::DrumKind;

    fn parse(text: &str) -> ConfigFile {
        toml::from_str(text).unwrap()
    }

    #[test]
    fn defaults_describe_the_three_track_kit() {
        let c = Config::merged(None).unwrap();
        assert_eq!(c.bpm, 150);
        assert_eq!((c.bpm_min, c.bpm_max, c.bpm_step), (40, 300, 1));
        let names: Vec<&str> = c.tracks.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Kick", "Snare", "Hi-hat"]);

        let tracks = c.build_tracks().unwrap();
        assert_eq!(tracks[0].id, 0);
        assert_eq!(tracks[2].id, 2);
        assert_eq!(tracks[0].source(), &SoundSource::Synth(DrumKind::Kick));
        assert_eq!(tracks[2].source(), &SoundSource::Synth(DrumKind::ClosedHat));
    }

    #[test]
    fn user_tempo_keys_merge_individually() {
        let c = Config::merged(Some(parse("[tempo]\nbpm = 96\n"))).unwrap();
        assert_eq!(c.bpm, 96);
        assert_eq!(c.bpm_max, 300);
        assert_eq!(c.tracks.len(), 3);
    }

    #[test]
    fn user_tracks_replace_the_kit() {
        let user = parse(
            r#"
            [[tracks]]
            name = "Perc"
            selected = 1
            sounds = [
                { label = "Clap", source = "synth:clap" },
                { label = "Rim", source = "kit/rim.wav" },
            ]
            "#,
        );
        let c = Config::merged(Some(user)).unwrap();
        let tracks = c.build_tracks().unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].source(), &SoundSource::File(PathBuf::from("kit/rim.wav")));
    }

    #[test]
    fn rejects_bpm_outside_range() {
        let err = Config::merged(Some(parse("[tempo]\nbpm = 20\n"))).unwrap_err();
        assert!(err.to_string().contains("outside"));
        assert!(Config::merged(Some(parse("[tempo]\nmin = 0\nbpm = 1\n"))).is_err());
    }

    #[test]
    fn rejects_broken_tracks() {
        assert!(Config::merged(Some(parse("tracks = []\n"))).is_err());
        assert!(Config::merged(Some(parse("[[tracks]]\nname = \"A\"\nsounds = []\n"))).is_err());
        let bad_select = r#"
            [[tracks]]
            name = "A"
            selected = 3
            sounds = [{ label = "x", source = "synth:kick" }]
        "#;
        assert!(Config::merged(Some(parse(bad_select))).is_err());
        let bad_voice = r#"
            [[tracks]]
            name = "A"
            sounds = [{ label = "x", source = "synth:cowbell" }]
        "#;
        assert!(Config::merged(Some(parse(bad_voice))).is_err());
    }

    #[test]
    fn explicit_path_must_load() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(Config::load(Some(&missing)).is_err());

        let path = dir.path().join("kit.toml");
        std::fs::write(&path, "[tempo]\nbpm = 128\n").unwrap();
        assert_eq!(Config::load(Some(&path)).unwrap().bpm, 128);

        std::fs::write(&path, "[tempo\n").unwrap();
        assert!(Config::load(Some(&path)).is_err());
    }
}
