//! Rendering and persistence seam
//!
//! The on-screen keyboard, the fixation dot and the observation store live
//! outside this crate. They receive each `TickReport` and every
//! `Observation` through `Frontend`.

use crate::layout::KeySymbol;
use crate::session::{Observation, StateKind, TickReport};

pub trait Frontend {
    fn render(&mut self, report: &TickReport);

    fn record(&mut self, observation: &Observation);
}

/// Headless frontend: state changes and confirmed keys go to the log,
/// observations optionally to stdout as JSON lines
#[derive(Debug, Default)]
pub struct LogFrontend {
    emit_events: bool,
    last_state: Option<StateKind>,
    last_highlight: Option<KeySymbol>,
}

impl LogFrontend {
    pub fn new(emit_events: bool) -> Self {
        Self {
            emit_events,
            ..Self::default()
        }
    }
}

impl Frontend for LogFrontend {
    fn render(&mut self, report: &TickReport) {
        if self.last_state != Some(report.state) {
            log::info!("[{}] {}", report.state, report.instruction);
            self.last_state = Some(report.state);
        }

        if let Some(view) = &report.calibration {
            log::trace!("Calibrating {} {:.0}%", view.target, view.progress * 100.0);
        }

        if report.highlighted != self.last_highlight {
            if let Some(key) = report.highlighted {
                log::debug!("Highlight {key}");
            }
            self.last_highlight = report.highlighted;
        }

        if let Some(key) = &report.confirmed {
            log::info!("Typed {} ({})", key.symbol, key.zone);
        }
    }

    fn record(&mut self, observation: &Observation) {
        if !self.emit_events {
            log::debug!("Observation: {observation:?}");
            return;
        }
        match serde_json::to_string(observation) {
            Ok(line) => println!("{line}"),
            Err(e) => log::warn!("Failed to encode observation: {e}"),
        }
    }
}
