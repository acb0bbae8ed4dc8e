//! # RayOS Gaze Keyboard
//!
//! A scanning on-screen keyboard driven by horizontal eye gaze. Looking left
//! or right steps a cursor through one half of the alphabet, holding the gaze
//! on a highlighted key types it, and looking at the center rests.
//!
//! The crate is the decision core: gaze classification, calibration, the
//! scan/dwell selector and the session state machine. Face-mesh detection,
//! drawing and text-to-speech are collaborators reached through the UDP
//! landmark feed, the `Frontend` trait and the speech queue.

pub mod calibration;
pub mod clock;
pub mod config;
pub mod error;
pub mod frontend;
pub mod layout;
pub mod scan;
pub mod session;
pub mod speech;
pub mod types;
pub mod vision;

pub use calibration::{CalibrationController, CalibrationResult, CalibrationTarget};
pub use clock::SessionClock;
pub use config::Config;
pub use error::{ConfigError, GazeError, SessionError};
pub use frontend::{Frontend, LogFrontend};
pub use layout::{KeyboardLayout, KeySymbol};
pub use scan::{ConfirmedKey, ScanSelector, ScanState};
pub use session::{AppState, Observation, Session, StateKind, TickReport, UserCommand};
pub use speech::{SpeakRequest, SpeechQueue, VoiceSettings};
pub use types::*;
pub use vision::{FeedSlot, GazeClassifier, SharedFeedSlot};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;

/// Driver cadence, roughly one camera frame
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(30);

/// Feed frames older than this count as "no face"
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_millis(200);

/// Runtime that owns a session and drives it at a fixed cadence
pub struct GazeKeyboard<F: Frontend> {
    session: Session,
    feed: SharedFeedSlot,
    commands_tx: Sender<UserCommand>,
    commands: Receiver<UserCommand>,
    speech: Option<SpeechQueue>,
    frontend: F,
    tick_interval: Duration,
    stale_after: Duration,
}

impl<F: Frontend> GazeKeyboard<F> {
    pub fn new(session: Session, frontend: F) -> Self {
        let (commands_tx, commands) = crossbeam_channel::unbounded();
        Self {
            session,
            feed: Arc::new(Mutex::new(FeedSlot::default())),
            commands_tx,
            commands,
            speech: None,
            frontend,
            tick_interval: DEFAULT_TICK_INTERVAL,
            stale_after: DEFAULT_STALE_AFTER,
        }
    }

    pub fn with_speech(mut self, queue: SpeechQueue) -> Self {
        self.speech = Some(queue);
        self
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn with_stale_after(mut self, max_age: Duration) -> Self {
        self.stale_after = max_age;
        self
    }

    /// Slot the landmark listener writes into
    pub fn feed_slot(&self) -> SharedFeedSlot {
        Arc::clone(&self.feed)
    }

    pub fn command_sender(&self) -> Sender<UserCommand> {
        self.commands_tx.clone()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn frontend(&self) -> &F {
        &self.frontend
    }

    /// One driver iteration at `now` (time since the runtime started)
    pub fn step(&mut self, now: Duration) -> TickReport {
        for command in self.commands.try_iter() {
            log::debug!("Command: {command:?}");
            match self.session.apply_command(command) {
                Ok(Some(request)) => self.speak(request),
                Ok(None) => {}
                Err(e) => log::warn!("Command rejected: {e}"),
            }
        }

        let frame = self
            .feed
            .lock()
            .fresh(Instant::now(), self.stale_after)
            .cloned();

        let report = self.session.tick(frame.as_ref(), now);
        if let Some(request) = &report.speech {
            self.speak(request.clone());
        }

        self.frontend.render(&report);
        for observation in &report.observations {
            self.frontend.record(observation);
        }
        report
    }

    fn speak(&self, request: SpeakRequest) {
        match &self.speech {
            Some(queue) => queue.dispatch(request),
            None => log::debug!("No speech collaborator, skipping {:?}", request.text),
        }
    }

    /// Tick until a shutdown signal arrives
    pub async fn run(&mut self, mut shutdown: tokio::sync::mpsc::Receiver<()>) -> anyhow::Result<()> {
        log::info!(
            "Gaze keyboard running: tick {:?}, user {}",
            self.tick_interval,
            self.session.config().profile.user_id
        );

        let started = Instant::now();
        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.step(started.elapsed());
                }
                _ = shutdown.recv() => {
                    log::info!("Gaze keyboard stopping");
                    break;
                }
            }
        }

        if !self.session.text().is_empty() {
            log::info!("Final text: {:?}", self.session.text());
        }
        Ok(())
    }
}
