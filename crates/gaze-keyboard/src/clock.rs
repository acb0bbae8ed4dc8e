//! Dwell and scan timing
//!
//! `SessionClock` measures "time since this state was entered". An unset clock
//! has no elapsed time at all, which callers must not confuse with zero.
//! Holding the clock freezes its reading while the face is lost; resuming
//! moves the reference forward by the gap so only valid time is counted.

use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionClock {
    reference: Option<Duration>,
    held_at: Option<Duration>,
}

impl SessionClock {
    pub const fn new() -> Self {
        Self {
            reference: None,
            held_at: None,
        }
    }

    /// Record `now` as the reference instant (restarting if already set)
    pub fn start(&mut self, now: Duration) {
        self.reference = Some(now);
        self.held_at = None;
    }

    pub fn reset(&mut self) {
        self.reference = None;
        self.held_at = None;
    }

    pub fn is_set(&self) -> bool {
        self.reference.is_some()
    }

    pub fn is_held(&self) -> bool {
        self.held_at.is_some()
    }

    /// Time since `start`, or `None` if the clock has not begun
    pub fn elapsed(&self, now: Duration) -> Option<Duration> {
        let reference = self.reference?;
        let until = self.held_at.unwrap_or(now);
        Some(until.saturating_sub(reference))
    }

    /// Freeze the reading as of `at`. No-op when unset or already held.
    pub fn hold(&mut self, at: Duration) {
        if self.reference.is_some() && self.held_at.is_none() {
            self.held_at = Some(at);
        }
    }

    /// Continue counting from `now`, skipping the held gap
    pub fn resume(&mut self, now: Duration) {
        if let (Some(reference), Some(held_at)) = (self.reference, self.held_at.take()) {
            let gap = now.saturating_sub(held_at);
            self.reference = Some(reference + gap);
        }
    }
}

/// `elapsed / threshold` clamped to [0, 1]
pub fn fraction(elapsed: Duration, threshold: Duration) -> f32 {
    if threshold.is_zero() {
        return 1.0;
    }
    (elapsed.as_secs_f32() / threshold.as_secs_f32()).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn unset_clock_has_no_elapsed_time() {
        let clock = SessionClock::new();
        assert!(!clock.is_set());
        assert_eq!(clock.elapsed(ms(500)), None);
    }

    #[test]
    fn elapsed_counts_from_start() {
        let mut clock = SessionClock::new();
        clock.start(ms(100));
        assert_eq!(clock.elapsed(ms(100)), Some(ms(0)));
        assert_eq!(clock.elapsed(ms(350)), Some(ms(250)));
        // time going backwards never underflows
        assert_eq!(clock.elapsed(ms(50)), Some(ms(0)));

        clock.reset();
        assert_eq!(clock.elapsed(ms(400)), None);
    }

    #[test]
    fn hold_freezes_and_resume_skips_gap() {
        let mut clock = SessionClock::new();
        clock.start(ms(0));
        clock.hold(ms(300));
        assert!(clock.is_held());
        assert_eq!(clock.elapsed(ms(900)), Some(ms(300)));

        // a second hold keeps the first freeze point
        clock.hold(ms(600));
        clock.resume(ms(1000));
        assert!(!clock.is_held());
        assert_eq!(clock.elapsed(ms(1000)), Some(ms(300)));
        assert_eq!(clock.elapsed(ms(1200)), Some(ms(500)));
    }

    #[test]
    fn hold_on_unset_clock_is_ignored() {
        let mut clock = SessionClock::new();
        clock.hold(ms(10));
        clock.resume(ms(500));
        assert!(!clock.is_set());
        clock.start(ms(500));
        assert_eq!(clock.elapsed(ms(520)), Some(ms(20)));
    }

    #[test]
    fn fraction_is_clamped() {
        assert_eq!(fraction(ms(0), ms(600)), 0.0);
        assert!((fraction(ms(300), ms(600)) - 0.5).abs() < 1e-6);
        assert_eq!(fraction(ms(900), ms(600)), 1.0);
    }
}
