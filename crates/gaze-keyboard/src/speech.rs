//! Speech dispatch
//!
//! The core only produces `SpeakRequest` values. Playback belongs to the
//! speech collaborator, which runs on its own thread behind an unbounded
//! channel so the tick loop never waits on it. Utterances are not cancelled
//! when newer ones arrive; they simply queue.
//!
//! Every request carries the voice settings in force when it was made, so
//! changes from the settings screen reach the worker with the next utterance.

use crate::config::SpeechConfig;
use crossbeam_channel::{unbounded, Receiver, SendError, Sender};
use serde::{Deserialize, Serialize};
use std::process::{Command, Stdio};
use std::thread::JoinHandle;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceSettings {
    /// Words per minute
    pub rate: u32,
    /// 0.0..=1.0
    pub volume: f32,
    pub voice: Option<String>,
}

impl VoiceSettings {
    pub fn from_config(config: &SpeechConfig) -> Self {
        Self {
            rate: config.rate,
            volume: config.volume,
            voice: config.voice_name().map(str::to_string),
        }
    }

    /// espeak-style flags: `-s` rate, `-a` amplitude (0..=200), `-v` voice
    pub fn program_args(&self) -> Vec<String> {
        let amplitude = (self.volume.clamp(0.0, 1.0) * 200.0).round() as u32;
        let mut args = vec![
            "-s".to_string(),
            self.rate.to_string(),
            "-a".to_string(),
            amplitude.to_string(),
        ];
        if let Some(voice) = &self.voice {
            args.push("-v".to_string());
            args.push(voice.clone());
        }
        args
    }
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self::from_config(&SpeechConfig::default())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakRequest {
    pub text: String,
    pub voice: VoiceSettings,
}

impl SpeakRequest {
    pub fn new(text: impl Into<String>, voice: VoiceSettings) -> Self {
        Self {
            text: text.into(),
            voice,
        }
    }
}

/// Sending half handed to the runtime
#[derive(Debug, Clone)]
pub struct SpeechQueue {
    tx: Sender<SpeakRequest>,
}

impl SpeechQueue {
    /// Hand off without blocking; a closed worker only costs a warning
    pub fn dispatch(&self, request: SpeakRequest) {
        if let Err(SendError(req)) = self.tx.send(request) {
            log::warn!("Speech worker gone, dropping utterance {:?}", req.text);
        }
    }
}

pub fn speech_channel() -> (SpeechQueue, Receiver<SpeakRequest>) {
    let (tx, rx) = unbounded();
    (SpeechQueue { tx }, rx)
}

/// Run `speak` for every request on a dedicated thread
pub fn spawn_speech_worker<F>(mut speak: F) -> std::io::Result<(SpeechQueue, JoinHandle<()>)>
where
    F: FnMut(SpeakRequest) + Send + 'static,
{
    let (queue, rx) = speech_channel();
    let handle = std::thread::Builder::new()
        .name("speech".to_string())
        .spawn(move || {
            for request in rx {
                speak(request);
            }
            log::debug!("Speech worker exiting");
        })?;
    Ok((queue, handle))
}

/// Speak through an external program such as `espeak-ng`
pub fn command_voice(program: String) -> impl FnMut(SpeakRequest) + Send {
    move |request: SpeakRequest| {
        let status = Command::new(&program)
            .args(request.voice.program_args())
            .arg(&request.text)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        match status {
            Ok(status) if status.success() => {}
            Ok(status) => log::warn!("{program} exited with {status}"),
            Err(e) => log::warn!("Failed to run {program}: {e}"),
        }
    }
}

/// Fallback voice that only logs
pub fn log_voice(request: SpeakRequest) {
    log::info!("Speak: {} (rate {})", request.text, request.voice.rate);
}
