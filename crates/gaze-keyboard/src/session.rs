//! Session aggregate and application state
//!
//! `Session` owns everything that changes while the keyboard runs: the
//! validated config, the calibration controller and its published result,
//! the scan state and the text buffer. It is driven by `tick` once per frame
//! and by explicit user commands in between ticks.

use crate::calibration::{
    CalibrationController, CalibrationResult, CalibrationTarget, TargetSample, TickOutcome,
};
use crate::clock::fraction;
use crate::config::{Config, SettingsUpdate};
use crate::error::{ConfigError, SessionError};
use crate::layout::{KeyboardLayout, KeySymbol};
use crate::scan::{ConfirmedKey, ScanSelector, ScanState};
use crate::speech::{SpeakRequest, VoiceSettings};
use crate::types::{GazeSample, LandmarkFrame, Zone};
use crate::vision::GazeClassifier;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppState {
    Calibrating,
    Ready,
    Typing,
    Paused,
    Settings { previous: Box<AppState> },
}

impl AppState {
    pub fn kind(&self) -> StateKind {
        match self {
            Self::Calibrating => StateKind::Calibrating,
            Self::Ready => StateKind::Ready,
            Self::Typing => StateKind::Typing,
            Self::Paused => StateKind::Paused,
            Self::Settings { .. } => StateKind::Settings,
        }
    }
}

/// Fieldless view of `AppState` for reports and errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateKind {
    Calibrating,
    Ready,
    Typing,
    Paused,
    Settings,
}

impl StateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Calibrating => "calibrating",
            Self::Ready => "ready",
            Self::Typing => "typing",
            Self::Paused => "paused",
            Self::Settings => "settings",
        }
    }
}

impl std::fmt::Display for StateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Explicit user actions (on-screen buttons, remote control)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "kebab-case")]
pub enum UserCommand {
    StartTyping,
    StopTyping,
    OpenSettings,
    CloseSettings,
    ApplySettings(SettingsUpdate),
    Recalibrate,
    ClearText,
    SpeakText,
}

impl UserCommand {
    /// Parse a bare command name; settings updates need the JSON form
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "start-typing" => Some(Self::StartTyping),
            "stop-typing" => Some(Self::StopTyping),
            "open-settings" => Some(Self::OpenSettings),
            "close-settings" => Some(Self::CloseSettings),
            "recalibrate" => Some(Self::Recalibrate),
            "clear-text" => Some(Self::ClearText),
            "speak-text" => Some(Self::SpeakText),
            _ => None,
        }
    }
}

/// Append-only log of confirmed characters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextBuffer {
    text: String,
}

impl TextBuffer {
    pub fn push(&mut self, ch: char) {
        self.text.push(ch);
    }

    pub fn clear(&mut self) {
        self.text.clear();
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Gaze input for one tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GazeStatus {
    Tracked(GazeSample),
    NoFace,
    /// Face present but the ratio could not be computed
    Indeterminate,
}

impl GazeStatus {
    pub fn sample(&self) -> Option<GazeSample> {
        match self {
            Self::Tracked(sample) => Some(*sample),
            _ => None,
        }
    }
}

/// Read-only record for the persistence collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Observation {
    CalibrationSample {
        user_id: String,
        target: CalibrationTarget,
        ratio: f32,
        at_ms: u64,
    },
    KeyPress {
        user_id: String,
        zone: Zone,
        key: String,
        ratio: f32,
        at_ms: u64,
    },
}

/// What the renderer needs to draw the fixation dot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationView {
    pub target: CalibrationTarget,
    pub progress: f32,
    pub position: (f32, f32),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub state: StateKind,
    pub gaze: GazeStatus,
    /// Zone classified this tick; `None` when there was no usable gaze
    pub zone: Option<Zone>,
    pub highlighted: Option<KeySymbol>,
    pub progress: f32,
    pub confirmed: Option<ConfirmedKey>,
    pub calibration: Option<CalibrationView>,
    pub instruction: String,
    pub speech: Option<SpeakRequest>,
    pub observations: Vec<Observation>,
}

impl TickReport {
    fn new(state: StateKind, gaze: GazeStatus) -> Self {
        Self {
            state,
            gaze,
            zone: None,
            highlighted: None,
            progress: 0.0,
            confirmed: None,
            calibration: None,
            instruction: String::new(),
            speech: None,
            observations: Vec::new(),
        }
    }
}

pub struct Session {
    config: Config,
    classifier: GazeClassifier,
    selector: ScanSelector,
    calibration: CalibrationController,
    result: Option<Arc<CalibrationResult>>,
    scan: ScanState,
    text: TextBuffer,
    state: AppState,
}

impl Session {
    /// New session, starting in calibration
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut calibration = CalibrationController::new(&config.calibration);
        calibration.start();
        log::info!(
            "Session for {} starting calibration over {} targets",
            config.profile.user_id,
            calibration.targets().len()
        );

        Ok(Self {
            classifier: GazeClassifier::new(config.gaze.zone_threshold),
            selector: ScanSelector::from_config(&config.typing),
            calibration,
            result: None,
            scan: ScanState::default(),
            text: TextBuffer::default(),
            state: AppState::Calibrating,
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn state_kind(&self) -> StateKind {
        self.state.kind()
    }

    pub fn text(&self) -> &str {
        self.text.as_str()
    }

    pub fn scan_state(&self) -> &ScanState {
        &self.scan
    }

    pub fn layout(&self) -> &KeyboardLayout {
        self.selector.layout()
    }

    pub fn calibration_result(&self) -> Option<Arc<CalibrationResult>> {
        self.result.clone()
    }

    pub fn instruction(&self) -> String {
        match &self.state {
            AppState::Calibrating => self.calibration.current_instruction(),
            AppState::Ready => "Calibration finished - start typing when ready".to_string(),
            AppState::Typing => "Look left or right to scan, look center to rest".to_string(),
            AppState::Paused => "Typing paused".to_string(),
            AppState::Settings { .. } => "Settings".to_string(),
        }
    }

    /// Advance one frame. `frame` is `None` when no face was detected.
    pub fn tick(&mut self, frame: Option<&LandmarkFrame>, now: Duration) -> TickReport {
        let gaze = match frame {
            None => GazeStatus::NoFace,
            Some(frame) => match self.classifier.sample(&frame.landmarks, frame.frame_width) {
                Ok(sample) => GazeStatus::Tracked(sample),
                Err(e) => {
                    log::debug!("Indeterminate gaze: {e}");
                    GazeStatus::Indeterminate
                }
            },
        };

        let mut report = TickReport::new(self.state.kind(), gaze);
        match self.state {
            AppState::Calibrating => self.tick_calibration(&mut report, now),
            AppState::Typing => self.tick_typing(&mut report, now),
            AppState::Ready | AppState::Paused | AppState::Settings { .. } => {}
        }

        report.state = self.state.kind();
        report.instruction = self.instruction();
        report
    }

    fn tick_calibration(&mut self, report: &mut TickReport, now: Duration) {
        let Some(sample) = report.gaze.sample() else {
            log::debug!("Calibration held: {:?}", report.gaze);
            self.calibration.hold(now);
            if let Some(target) = self.calibration.current_target() {
                report.calibration = Some(CalibrationView {
                    target,
                    progress: self.calibration.progress(now),
                    position: target.screen_position(),
                });
                report.progress = self.calibration.progress(now);
            }
            return;
        };

        match self.calibration.tick(sample, now) {
            TickOutcome::StillCalibrating { target, progress } => {
                report.calibration = Some(CalibrationView {
                    target,
                    progress,
                    position: target.screen_position(),
                });
                report.progress = progress;
            }
            TickOutcome::TargetCompleted { sample, next } => {
                report.observations.push(self.calibration_observation(&sample, now));
                report.calibration = Some(CalibrationView {
                    target: next,
                    progress: 0.0,
                    position: next.screen_position(),
                });
            }
            TickOutcome::Finished { captured, result } => {
                if let Some(sample) = captured {
                    report.observations.push(self.calibration_observation(&sample, now));
                }
                self.result = Some(result);
                self.state = AppState::Ready;
                log::info!("Calibration finished, ready to type");
            }
        }
    }

    fn tick_typing(&mut self, report: &mut TickReport, now: Duration) {
        let Some(calibration) = self.result.clone() else {
            log::warn!("Typing without a calibration result, returning to calibration");
            self.recalibrate();
            return;
        };

        let Some(sample) = report.gaze.sample() else {
            self.selector.hold(&mut self.scan, now);
            report.highlighted = self.layout().zone_symbol(self.scan.zone, self.scan.scan_index);
            report.progress = self
                .scan
                .dwell_elapsed(now)
                .map(|elapsed| fraction(elapsed, self.selector.dwell_time()))
                .unwrap_or(0.0);
            return;
        };

        let zone = self.classifier.classify(sample.ratio, &calibration);
        let tick = self.selector.tick(&mut self.scan, zone, now);

        report.zone = Some(zone);
        report.highlighted = tick.highlighted;
        report.progress = tick.progress;

        if let Some(key) = tick.confirmed {
            log::info!("Confirmed {} ({})", key.symbol, key.zone);
            self.text.push(key.text);
            if self.config.speech.enabled {
                report.speech = Some(self.speech_request(key.spoken.clone()));
            }
            report.observations.push(Observation::KeyPress {
                user_id: self.config.profile.user_id.clone(),
                zone: key.zone,
                key: key.symbol.label(),
                ratio: sample.ratio,
                at_ms: now.as_millis() as u64,
            });
            report.confirmed = Some(key);
        }
    }

    fn calibration_observation(&self, sample: &TargetSample, now: Duration) -> Observation {
        Observation::CalibrationSample {
            user_id: self.config.profile.user_id.clone(),
            target: sample.target,
            ratio: sample.ratio,
            at_ms: now.as_millis() as u64,
        }
    }

    pub fn start_typing(&mut self) -> Result<(), SessionError> {
        match self.state {
            AppState::Ready | AppState::Paused => {
                self.scan.reset();
                self.state = AppState::Typing;
                log::info!("Typing started");
                Ok(())
            }
            AppState::Typing => Ok(()),
            _ => Err(self.invalid("start typing")),
        }
    }

    pub fn stop_typing(&mut self) -> Result<(), SessionError> {
        match self.state {
            AppState::Typing => {
                self.scan.release_lock();
                self.state = AppState::Paused;
                log::info!("Typing paused");
                Ok(())
            }
            AppState::Paused => Ok(()),
            _ => Err(self.invalid("stop typing")),
        }
    }

    pub fn open_settings(&mut self) {
        if matches!(self.state, AppState::Settings { .. }) {
            return;
        }
        self.scan.release_lock();
        if self.state == AppState::Calibrating {
            self.calibration.suspend();
        }
        let previous = std::mem::replace(&mut self.state, AppState::Ready);
        log::info!("Settings opened from {}", previous.kind());
        self.state = AppState::Settings {
            previous: Box::new(previous),
        };
    }

    pub fn close_settings(&mut self) -> Result<(), SessionError> {
        let AppState::Settings { previous } = &self.state else {
            return Err(self.invalid("close settings"));
        };
        let previous = (**previous).clone();
        if previous == AppState::Typing {
            self.scan.reset();
        }
        log::info!("Settings closed, back to {}", previous.kind());
        self.state = previous;
        Ok(())
    }

    /// Swap in a new config built from a settings update
    pub fn apply_settings(&mut self, update: &SettingsUpdate) -> Result<(), SessionError> {
        let next = self.config.with_settings(update)?;
        self.selector = ScanSelector::from_config(&next.typing);
        self.config = next;
        log::info!(
            "Settings applied: dwell {:.2}s, speech rate {}, volume {:.2}",
            self.config.typing.dwell_time,
            self.config.speech.rate,
            self.config.speech.volume
        );
        Ok(())
    }

    /// Cancel any pending selection, discard calibration and start over.
    /// Allowed from every state.
    pub fn recalibrate(&mut self) {
        if let Some(key) = self.scan.locked_key {
            log::info!("Recalibration cancels pending {key}");
        }
        self.scan.release_lock();
        self.scan.reset();
        self.result = None;
        self.calibration.start();
        self.state = AppState::Calibrating;
        log::info!("Recalibration started");
    }

    pub fn clear_text(&mut self) {
        self.text.clear();
    }

    /// Speak the whole buffer; nothing when blank or speech is off
    pub fn speak_text(&self) -> Option<SpeakRequest> {
        if !self.config.speech.enabled || self.text.is_blank() {
            return None;
        }
        Some(self.speech_request(self.text.as_str()))
    }

    /// Request voiced with the speech settings currently in force
    fn speech_request(&self, text: impl Into<String>) -> SpeakRequest {
        SpeakRequest::new(text, VoiceSettings::from_config(&self.config.speech))
    }

    pub fn apply_command(&mut self, command: UserCommand) -> Result<Option<SpeakRequest>, SessionError> {
        match command {
            UserCommand::StartTyping => self.start_typing()?,
            UserCommand::StopTyping => self.stop_typing()?,
            UserCommand::OpenSettings => self.open_settings(),
            UserCommand::CloseSettings => self.close_settings()?,
            UserCommand::ApplySettings(update) => self.apply_settings(&update)?,
            UserCommand::Recalibrate => self.recalibrate(),
            UserCommand::ClearText => self.clear_text(),
            UserCommand::SpeakText => return Ok(self.speak_text()),
        }
        Ok(None)
    }

    fn invalid(&self, action: &'static str) -> SessionError {
        SessionError::InvalidTransition {
            from: self.state.kind(),
            action,
        }
    }
}
