//! Calibration - derives the user's neutral gaze ratio
//!
//! The user fixates a fixed sequence of targets. Each target needs
//! `calibration.dwell` seconds of valid samples; frames without a usable face
//! pause the dwell rather than resetting it. When the last target is captured
//! the controller publishes an immutable `CalibrationResult`.

use crate::clock::{fraction, SessionClock};
use crate::config::CalibrationConfig;
use crate::types::GazeSample;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// A fixation point shown during calibration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CalibrationTarget {
    Center,
    Left,
    Right,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl CalibrationTarget {
    pub const FIVE_POINT: [CalibrationTarget; 5] = [
        Self::Center,
        Self::TopLeft,
        Self::TopRight,
        Self::BottomLeft,
        Self::BottomRight,
    ];

    pub const THREE_POINT: [CalibrationTarget; 3] = [Self::Center, Self::Left, Self::Right];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Center => "center",
            Self::Left => "left",
            Self::Right => "right",
            Self::TopLeft => "top-left",
            Self::TopRight => "top-right",
            Self::BottomLeft => "bottom-left",
            Self::BottomRight => "bottom-right",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "center" => Some(Self::Center),
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            "top-left" => Some(Self::TopLeft),
            "top-right" => Some(Self::TopRight),
            "bottom-left" => Some(Self::BottomLeft),
            "bottom-right" => Some(Self::BottomRight),
            _ => None,
        }
    }

    /// Horizontal placement: -1 left, 0 center, +1 right
    pub fn horizontal(&self) -> f32 {
        match self {
            Self::Center => 0.0,
            Self::Left | Self::TopLeft | Self::BottomLeft => -1.0,
            Self::Right | Self::TopRight | Self::BottomRight => 1.0,
        }
    }

    /// Where the renderer should draw the dot, in normalized frame coordinates
    pub fn screen_position(&self) -> (f32, f32) {
        const MARGIN: f32 = 0.1;
        match self {
            Self::Center => (0.5, 0.5),
            Self::Left => (MARGIN, 0.5),
            Self::Right => (1.0 - MARGIN, 0.5),
            Self::TopLeft => (MARGIN, MARGIN),
            Self::TopRight => (1.0 - MARGIN, MARGIN),
            Self::BottomLeft => (MARGIN, 1.0 - MARGIN),
            Self::BottomRight => (1.0 - MARGIN, 1.0 - MARGIN),
        }
    }
}

impl std::fmt::Display for CalibrationTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a target's representative ratio is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalibrationSampling {
    /// Mean of every valid sample seen during the dwell
    Average,
    /// The sample on the tick the dwell completed
    Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetSample {
    pub target: CalibrationTarget,
    pub ratio: f32,
    pub sample_count: usize,
}

/// `offset = slope * ratio + intercept`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearFit {
    pub slope: f32,
    pub intercept: f32,
}

impl LinearFit {
    /// Least-squares line through `(x, y)` points. `None` if x has no spread.
    pub fn fit(points: &[(f32, f32)]) -> Option<Self> {
        if points.len() < 2 {
            return None;
        }
        let n = points.len() as f32;
        let mean_x = points.iter().map(|p| p.0).sum::<f32>() / n;
        let mean_y = points.iter().map(|p| p.1).sum::<f32>() / n;

        let mut sxx = 0.0;
        let mut sxy = 0.0;
        for (x, y) in points {
            sxx += (x - mean_x) * (x - mean_x);
            sxy += (x - mean_x) * (y - mean_y);
        }
        if sxx <= f32::EPSILON {
            return None;
        }

        let slope = sxy / sxx;
        Some(Self {
            slope,
            intercept: mean_y - slope * mean_x,
        })
    }

    pub fn apply(&self, x: f32) -> f32 {
        self.slope * x + self.intercept
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationResult {
    pub center_ratio: f32,
    pub samples: Vec<TargetSample>,
    /// Ratio to horizontal target position, when the targets allow a fit
    pub horizontal: Option<LinearFit>,
}

impl CalibrationResult {
    /// Result with only a neutral ratio, no per-target data
    pub fn centered(center_ratio: f32) -> Self {
        Self {
            center_ratio,
            samples: Vec::new(),
            horizontal: None,
        }
    }

    fn from_samples(samples: Vec<TargetSample>) -> Option<Self> {
        let center_ratio = samples
            .iter()
            .find(|s| s.target == CalibrationTarget::Center)?
            .ratio;

        let first = samples[0].target.horizontal();
        let spread = samples.iter().any(|s| s.target.horizontal() != first);
        let horizontal = if spread {
            let points: Vec<(f32, f32)> = samples
                .iter()
                .map(|s| (s.ratio, s.target.horizontal()))
                .collect();
            LinearFit::fit(&points)
        } else {
            None
        };

        Some(Self {
            center_ratio,
            samples,
            horizontal,
        })
    }

    pub fn sample_for(&self, target: CalibrationTarget) -> Option<&TargetSample> {
        self.samples.iter().find(|s| s.target == target)
    }

    /// Estimated horizontal position (-1 left .. +1 right) for a ratio
    pub fn horizontal_offset(&self, ratio: f32) -> Option<f32> {
        self.horizontal.map(|fit| fit.apply(ratio))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    StillCalibrating {
        target: CalibrationTarget,
        progress: f32,
    },
    TargetCompleted {
        sample: TargetSample,
        next: CalibrationTarget,
    },
    /// `captured` is the final target's sample on the completing tick, `None` afterwards
    Finished {
        captured: Option<TargetSample>,
        result: Arc<CalibrationResult>,
    },
}

pub struct CalibrationController {
    targets: Vec<CalibrationTarget>,
    dwell: Duration,
    sampling: CalibrationSampling,
    step: usize,
    clock: SessionClock,
    last_valid: Option<Duration>,
    ratio_sum: f32,
    ratio_count: usize,
    captured: Vec<TargetSample>,
    result: Option<Arc<CalibrationResult>>,
}

impl CalibrationController {
    pub fn new(config: &CalibrationConfig) -> Self {
        let mut targets = config.targets.clone();
        if !targets.contains(&CalibrationTarget::Center) {
            log::warn!("Calibration sequence has no center target, prepending one");
            targets.insert(0, CalibrationTarget::Center);
        }

        Self {
            targets,
            dwell: config.dwell_duration(),
            sampling: config.sampling,
            step: 0,
            clock: SessionClock::new(),
            last_valid: None,
            ratio_sum: 0.0,
            ratio_count: 0,
            captured: Vec::new(),
            result: None,
        }
    }

    /// Back to the first target with the dwell timer unset; drops any previous result
    pub fn start(&mut self) {
        self.step = 0;
        self.clock.reset();
        self.last_valid = None;
        self.reset_accumulator();
        self.captured.clear();
        self.result = None;
    }

    pub fn targets(&self) -> &[CalibrationTarget] {
        &self.targets
    }

    pub fn current_target(&self) -> Option<CalibrationTarget> {
        if self.result.is_some() {
            return None;
        }
        self.targets.get(self.step).copied()
    }

    pub fn is_done(&self) -> bool {
        self.result.is_some()
    }

    pub fn result(&self) -> Option<Arc<CalibrationResult>> {
        self.result.clone()
    }

    pub fn current_instruction(&self) -> String {
        match self.current_target() {
            Some(target) => format!("Look at the {} dot", target.as_str().to_uppercase()),
            None => "Calibration complete".to_string(),
        }
    }

    /// Dwell fraction for the current target
    pub fn progress(&self, now: Duration) -> f32 {
        self.clock
            .elapsed(now)
            .map(|elapsed| fraction(elapsed, self.dwell))
            .unwrap_or(0.0)
    }

    /// Pause the dwell: no usable sample this tick
    pub fn hold(&mut self, now: Duration) {
        self.clock.hold(self.last_valid.unwrap_or(now));
    }

    /// Freeze the dwell at the last valid sample while calibration is not
    /// being ticked at all (settings screen). The next `tick` skips the gap.
    pub fn suspend(&mut self) {
        if let Some(at) = self.last_valid {
            self.clock.hold(at);
        }
    }

    pub fn tick(&mut self, sample: GazeSample, now: Duration) -> TickOutcome {
        if let Some(result) = &self.result {
            return TickOutcome::Finished {
                captured: None,
                result: Arc::clone(result),
            };
        }

        let target = self.targets[self.step];

        self.clock.resume(now);
        if !self.clock.is_set() {
            self.clock.start(now);
        }
        self.last_valid = Some(now);

        self.ratio_sum += sample.ratio;
        self.ratio_count += 1;

        let elapsed = self.clock.elapsed(now).unwrap_or_default();
        if elapsed < self.dwell {
            return TickOutcome::StillCalibrating {
                target,
                progress: fraction(elapsed, self.dwell),
            };
        }

        let captured = match self.sampling {
            CalibrationSampling::Average => TargetSample {
                target,
                ratio: self.ratio_sum / self.ratio_count as f32,
                sample_count: self.ratio_count,
            },
            CalibrationSampling::Instant => TargetSample {
                target,
                ratio: sample.ratio,
                sample_count: 1,
            },
        };
        log::info!(
            "Calibration target {} captured: ratio {:.4} over {} samples",
            target,
            captured.ratio,
            captured.sample_count
        );

        self.captured.push(captured);
        self.step += 1;
        self.clock.reset();
        self.last_valid = None;
        self.reset_accumulator();

        if let Some(next) = self.targets.get(self.step).copied() {
            return TickOutcome::TargetCompleted {
                sample: captured,
                next,
            };
        }

        match CalibrationResult::from_samples(self.captured.clone()) {
            Some(result) => {
                log::info!(
                    "Calibration finished: center ratio {:.4}, horizontal fit {:?}",
                    result.center_ratio,
                    result.horizontal
                );
                let result = Arc::new(result);
                self.result = Some(Arc::clone(&result));
                TickOutcome::Finished {
                    captured: Some(captured),
                    result,
                }
            }
            None => {
                log::warn!("Calibration produced no center sample, restarting");
                self.start();
                TickOutcome::StillCalibrating {
                    target: self.targets[0],
                    progress: 0.0,
                }
            }
        }
    }

    fn reset_accumulator(&mut self) {
        self.ratio_sum = 0.0;
        self.ratio_count = 0;
    }
}
