//! Scanning selector - zone-driven cursor with dwell-to-confirm
//!
//! While the user looks LEFT or RIGHT the cursor steps through that zone's
//! key group every `scan_speed`. A highlighted key is locked and, once it has
//! stayed locked for `dwell_time`, confirmed. Scanning is paused while a key
//! is locked, and looking CENTER always cancels the lock.
//!
//! Entering a scan zone restarts the scan clock and disarms locking until the
//! cursor has stepped once in that zone, so a glance into a zone never
//! commits to whatever key the cursor happened to be resting on.

use crate::clock::{fraction, SessionClock};
use crate::config::TypingConfig;
use crate::layout::{KeyboardLayout, KeySymbol};
use crate::types::Zone;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A key accepted by dwell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmedKey {
    pub symbol: KeySymbol,
    pub zone: Zone,
    /// Character for the text buffer
    pub text: char,
    /// Utterance for the speech collaborator
    pub spoken: String,
}

impl ConfirmedKey {
    fn new(symbol: KeySymbol, zone: Zone) -> Self {
        Self {
            symbol,
            zone,
            text: symbol.text(),
            spoken: symbol.spoken(),
        }
    }
}

/// Per-tick result handed to the renderer
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScanTick {
    pub highlighted: Option<KeySymbol>,
    /// Dwell fraction of the locked key, 0.0 when nothing is locked
    pub progress: f32,
    pub confirmed: Option<ConfirmedKey>,
    /// The cursor moved on its own this tick
    pub advanced: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanState {
    pub scan_index: usize,
    pub zone: Zone,
    pub locked_key: Option<KeySymbol>,
    armed: bool,
    dwell: SessionClock,
    scan: SessionClock,
    last_tick: Option<Duration>,
}

impl Default for ScanState {
    fn default() -> Self {
        Self {
            scan_index: 0,
            zone: Zone::Center,
            locked_key: None,
            armed: false,
            dwell: SessionClock::new(),
            scan: SessionClock::new(),
            last_tick: None,
        }
    }
}

impl ScanState {
    /// Drop the lock and its dwell timer without confirming anything
    pub fn release_lock(&mut self) {
        if let Some(key) = self.locked_key.take() {
            log::debug!("Released lock on {key}");
        }
        self.dwell.reset();
    }

    /// Fresh state: index 0, CENTER, no lock, timers unset
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Whether the dwell timer is running
    pub fn is_dwelling(&self) -> bool {
        self.dwell.is_set()
    }

    pub fn dwell_elapsed(&self, now: Duration) -> Option<Duration> {
        self.dwell.elapsed(now)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanSelector {
    dwell_time: Duration,
    scan_speed: Duration,
    layout: KeyboardLayout,
}

impl ScanSelector {
    pub fn new(dwell_time: Duration, scan_speed: Duration, layout: KeyboardLayout) -> Self {
        Self {
            dwell_time,
            scan_speed,
            layout,
        }
    }

    pub fn from_config(config: &TypingConfig) -> Self {
        Self::new(
            config.dwell(),
            config.scan_interval(),
            KeyboardLayout::with_split(config.split),
        )
    }

    pub fn layout(&self) -> &KeyboardLayout {
        &self.layout
    }

    pub fn dwell_time(&self) -> Duration {
        self.dwell_time
    }

    pub fn scan_speed(&self) -> Duration {
        self.scan_speed
    }

    /// Freeze dwell and scan timers for a tick with no usable gaze.
    /// Lock, index and zone stay exactly as they were.
    pub fn hold(&self, state: &mut ScanState, now: Duration) {
        let at = state.last_tick.unwrap_or(now);
        state.dwell.hold(at);
        state.scan.hold(at);
    }

    pub fn tick(&self, state: &mut ScanState, zone: Zone, now: Duration) -> ScanTick {
        state.dwell.resume(now);
        state.scan.resume(now);
        state.last_tick = Some(now);

        if zone != state.zone {
            state.release_lock();
            state.armed = false;
            if zone == Zone::Center {
                state.scan.reset();
            } else {
                state.scan.start(now);
            }
            log::debug!("Gaze zone {} -> {}", state.zone, zone);
            state.zone = zone;
        }

        let Some(group) = zone.scan_group() else {
            // rest position
            state.release_lock();
            return ScanTick::default();
        };
        let group_size = self.layout.group_size(group);

        let mut advanced = false;
        if state.locked_key.is_none() {
            let due = state
                .scan
                .elapsed(now)
                .map_or(false, |elapsed| elapsed > self.scan_speed);
            if due {
                state.scan_index = (state.scan_index + 1) % group_size;
                state.scan.start(now);
                state.armed = true;
                advanced = true;
                log::debug!("Scan advanced to index {}", state.scan_index);
            }
        }

        let active = self.layout.symbol_at(group, state.scan_index);

        if !state.armed {
            return ScanTick {
                highlighted: Some(active),
                progress: 0.0,
                confirmed: None,
                advanced,
            };
        }

        if state.locked_key != Some(active) {
            state.release_lock();
            state.locked_key = Some(active);
            state.dwell.start(now);
            log::debug!("Locked {active}");
        }

        let elapsed = state.dwell.elapsed(now).unwrap_or_default();
        if elapsed < self.dwell_time {
            return ScanTick {
                highlighted: Some(active),
                progress: fraction(elapsed, self.dwell_time),
                confirmed: None,
                advanced,
            };
        }

        state.release_lock();
        state.scan_index = (state.scan_index + 1) % group_size;
        state.scan.start(now);

        ScanTick {
            highlighted: Some(self.layout.symbol_at(group, state.scan_index)),
            progress: 0.0,
            confirmed: Some(ConfirmedKey::new(active, zone)),
            advanced,
        }
    }
}

impl Default for ScanSelector {
    fn default() -> Self {
        Self::from_config(&TypingConfig::default())
    }
}
