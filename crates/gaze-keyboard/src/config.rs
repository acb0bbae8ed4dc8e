//! Configuration for the gaze keyboard
//!
//! Loaded from TOML. Every field has a default, so an empty file (or no file at
//! all) yields the stock tuning: 0.6 s dwell, 0.45 s scan cadence, 1.5 s
//! calibration dwell over five targets, and a ±0.06 center band.

use crate::calibration::{CalibrationSampling, CalibrationTarget};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// Range accepted for dwell time changes made from the settings screen.
pub const SETTINGS_DWELL_RANGE: std::ops::RangeInclusive<f32> = 0.5..=1.5;
pub const SPEECH_RATE_RANGE: std::ops::RangeInclusive<u32> = 100..=250;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub profile: ProfileConfig,
    pub typing: TypingConfig,
    pub calibration: CalibrationConfig,
    pub gaze: GazeConfig,
    pub speech: SpeechConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    /// Tags every observation handed to the persistence collaborator
    pub user_id: String,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            user_id: "default".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypingConfig {
    /// Seconds a key must stay locked before it is confirmed
    pub dwell_time: f32,
    /// Seconds between automatic cursor advances
    pub scan_speed: f32,
    /// Number of symbols in group A (LEFT); the rest form group B
    pub split: usize,
}

impl Default for TypingConfig {
    fn default() -> Self {
        Self {
            dwell_time: 0.6,
            scan_speed: 0.45,
            split: 14,
        }
    }
}

impl TypingConfig {
    pub fn dwell(&self) -> Duration {
        secs(self.dwell_time)
    }

    pub fn scan_interval(&self) -> Duration {
        secs(self.scan_speed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Seconds of valid fixation required per target
    pub dwell: f32,
    pub targets: Vec<CalibrationTarget>,
    pub sampling: CalibrationSampling,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            dwell: 1.5,
            targets: CalibrationTarget::FIVE_POINT.to_vec(),
            sampling: CalibrationSampling::Average,
        }
    }
}

impl CalibrationConfig {
    pub fn dwell_duration(&self) -> Duration {
        secs(self.dwell)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GazeConfig {
    /// Half-width of the CENTER band around the calibrated ratio
    pub zone_threshold: f32,
}

impl Default for GazeConfig {
    fn default() -> Self {
        Self {
            zone_threshold: 0.06,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    pub enabled: bool,
    /// Words per minute
    pub rate: u32,
    pub volume: f32,
    /// Voice names handed to the speech program; `voice_index` picks one
    pub voices: Vec<String>,
    pub voice_index: usize,
}

impl SpeechConfig {
    /// Selected voice, or `None` to use the program's default
    pub fn voice_name(&self) -> Option<&str> {
        self.voices.get(self.voice_index).map(String::as_str)
    }
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rate: 170,
            volume: 1.0,
            voices: Vec::new(),
            voice_index: 0,
        }
    }
}

/// Partial update coming from the settings screen
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsUpdate {
    pub dwell_time: Option<f32>,
    pub rate: Option<u32>,
    pub volume: Option<f32>,
    pub voice_index: Option<usize>,
}

impl Config {
    /// Load and validate a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        positive_secs("typing.dwell_time", self.typing.dwell_time)?;
        positive_secs("typing.scan_speed", self.typing.scan_speed)?;
        positive_secs("calibration.dwell", self.calibration.dwell)?;

        if !(1..=26).contains(&self.typing.split) {
            return Err(ConfigError::invalid(
                "typing.split",
                format!("{} is outside 1..=26", self.typing.split),
            ));
        }

        let threshold = self.gaze.zone_threshold;
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(ConfigError::invalid(
                "gaze.zone_threshold",
                format!("{threshold} must be finite and non-negative"),
            ));
        }

        let targets = &self.calibration.targets;
        if targets.is_empty() {
            return Err(ConfigError::invalid("calibration.targets", "no targets"));
        }
        if !targets.contains(&CalibrationTarget::Center) {
            return Err(ConfigError::invalid(
                "calibration.targets",
                "sequence must include `center`",
            ));
        }
        let mut seen = HashSet::new();
        for target in targets {
            if !seen.insert(*target) {
                return Err(ConfigError::invalid(
                    "calibration.targets",
                    format!("`{}` listed twice", target.as_str()),
                ));
            }
        }

        if !SPEECH_RATE_RANGE.contains(&self.speech.rate) {
            return Err(ConfigError::invalid(
                "speech.rate",
                format!("{} is outside 100..=250", self.speech.rate),
            ));
        }
        if !(0.0..=1.0).contains(&self.speech.volume) {
            return Err(ConfigError::invalid(
                "speech.volume",
                format!("{} is outside 0.0..=1.0", self.speech.volume),
            ));
        }

        let voices = &self.speech.voices;
        if !voices.is_empty() && self.speech.voice_index >= voices.len() {
            return Err(ConfigError::invalid(
                "speech.voice_index",
                format!("{} but only {} voices", self.speech.voice_index, voices.len()),
            ));
        }

        Ok(())
    }

    /// Apply a settings-screen update, returning the new validated config
    pub fn with_settings(&self, update: &SettingsUpdate) -> Result<Self, ConfigError> {
        let mut next = self.clone();

        if let Some(dwell) = update.dwell_time {
            if !SETTINGS_DWELL_RANGE.contains(&dwell) {
                return Err(ConfigError::invalid(
                    "typing.dwell_time",
                    format!("{dwell} is outside 0.5..=1.5"),
                ));
            }
            next.typing.dwell_time = dwell;
        }
        if let Some(rate) = update.rate {
            next.speech.rate = rate;
        }
        if let Some(volume) = update.volume {
            next.speech.volume = volume;
        }
        if let Some(voice) = update.voice_index {
            next.speech.voice_index = voice;
        }

        next.validate()?;
        Ok(next)
    }
}

fn positive_secs(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && secs(value) >= Duration::from_millis(1) {
        Ok(())
    } else {
        Err(ConfigError::invalid(
            field,
            format!("{value} must be at least 0.001 seconds"),
        ))
    }
}

/// Seconds to a whole-millisecond `Duration`, so 0.45 is exactly 450 ms
fn secs(value: f32) -> Duration {
    let millis = (f64::from(value) * 1000.0).round();
    if millis.is_finite() && millis > 0.0 {
        Duration::from_millis(millis as u64)
    } else {
        Duration::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_document_uses_defaults() {
        let config = Config::from_toml_str("").expect("parse");
        assert_eq!(config, Config::default());
        assert_eq!(config.typing.dwell(), Duration::from_millis(600));
        assert_eq!(config.typing.scan_interval(), Duration::from_millis(450));
        assert_eq!(config.calibration.dwell_duration(), Duration::from_millis(1500));
        assert_eq!(config.calibration.targets.len(), 5);
    }

    #[test]
    fn partial_document_overrides_fields() {
        let config = Config::from_toml_str(
            r#"
            [typing]
            dwell_time = 0.8

            [calibration]
            targets = ["center", "left", "right"]
            sampling = "instant"
            "#,
        )
        .expect("parse");

        assert!((config.typing.dwell_time - 0.8).abs() < 1e-6);
        assert!((config.typing.scan_speed - 0.45).abs() < 1e-6);
        assert_eq!(
            config.calibration.targets,
            vec![
                CalibrationTarget::Center,
                CalibrationTarget::Left,
                CalibrationTarget::Right
            ]
        );
        assert_eq!(config.calibration.sampling, CalibrationSampling::Instant);
    }

    #[test]
    fn rejects_targets_without_center() {
        let err = Config::from_toml_str(
            r#"
            [calibration]
            targets = ["left", "right"]
            "#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "calibration.targets",
                ..
            }
        ));
    }

    #[test]
    fn rejects_duplicate_targets() {
        let err = Config::from_toml_str(
            r#"
            [calibration]
            targets = ["center", "left", "center"]
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("listed twice"));
    }

    #[test]
    fn rejects_non_positive_durations() {
        let err = Config::from_toml_str("[typing]\nscan_speed = 0.0\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "typing.scan_speed",
                ..
            }
        ));
    }

    #[test]
    fn rejects_unknown_target_name() {
        let err = Config::from_toml_str("[calibration]\ntargets = [\"middle\"]\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn settings_update_is_range_checked() {
        let config = Config::default();

        let next = config
            .with_settings(&SettingsUpdate {
                dwell_time: Some(1.2),
                rate: Some(200),
                ..Default::default()
            })
            .expect("valid update");
        assert!((next.typing.dwell_time - 1.2).abs() < 1e-6);
        assert_eq!(next.speech.rate, 200);

        assert!(config
            .with_settings(&SettingsUpdate {
                dwell_time: Some(2.0),
                ..Default::default()
            })
            .is_err());
        assert!(config
            .with_settings(&SettingsUpdate {
                volume: Some(1.5),
                ..Default::default()
            })
            .is_err());
    }

    #[test]
    fn voice_index_selects_from_voice_list() {
        let mut config = Config::from_toml_str(
            "[speech]\nvoices = [\"en-us\", \"en+f3\"]\nvoice_index = 1",
        )
        .expect("parse");
        assert_eq!(config.speech.voice_name(), Some("en+f3"));

        config = config
            .with_settings(&SettingsUpdate {
                voice_index: Some(0),
                ..Default::default()
            })
            .expect("apply");
        assert_eq!(config.speech.voice_name(), Some("en-us"));

        assert!(config
            .with_settings(&SettingsUpdate {
                voice_index: Some(2),
                ..Default::default()
            })
            .is_err());
        assert_eq!(Config::default().speech.voice_name(), None);
    }

    #[test]
    fn load_reads_file_and_reports_missing_path() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(file, "[profile]\nuser_id = \"alice\"").expect("write");
        let config = Config::load(file.path()).expect("load");
        assert_eq!(config.profile.user_id, "alice");

        let err = Config::load("/nonexistent/gaze-keyboard.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn default_config_round_trips_through_toml() {
        let text = Config::default().to_toml_string().expect("serialize");
        let parsed = Config::from_toml_str(&text).expect("parse");
        assert_eq!(parsed, Config::default());
    }
}
