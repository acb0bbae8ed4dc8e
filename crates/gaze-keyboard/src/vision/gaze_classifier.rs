//! Iris-ratio gaze classification
//!
//! The ratio is the mean horizontal position of the four iris landmarks,
//! measured from the outer eye corner and normalized by the corner-to-corner
//! distance. Landmark detection itself happens upstream; this module only
//! turns a landmark set into a number and the number into a zone.

use crate::calibration::CalibrationResult;
use crate::error::GazeError;
use crate::types::{GazeSample, Landmarks, Zone};

/// Outer corner of the tracked eye
pub const LEFT_CORNER: usize = 33;
/// Inner corner of the tracked eye
pub const RIGHT_CORNER: usize = 133;
/// Iris contour points (refined mesh only)
pub const IRIS_POINTS: [usize; 4] = [468, 469, 470, 471];

pub const DEFAULT_ZONE_THRESHOLD: f32 = 0.06;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GazeClassifier {
    threshold: f32,
}

impl Default for GazeClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_ZONE_THRESHOLD)
    }
}

impl GazeClassifier {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn sample(&self, landmarks: &Landmarks, frame_width: f32) -> Result<GazeSample, GazeError> {
        iris_ratio(landmarks, frame_width).map(|ratio| GazeSample { ratio })
    }

    pub fn classify(&self, ratio: f32, calibration: &CalibrationResult) -> Zone {
        classify(ratio, calibration, self.threshold)
    }
}

/// `(iris_x - left_x) / (right_x - left_x)` in pixel space
pub fn iris_ratio(landmarks: &Landmarks, frame_width: f32) -> Result<f32, GazeError> {
    if !frame_width.is_finite() || frame_width <= 0.0 {
        return Err(GazeError::NonFinite);
    }

    let x_at = |index: usize| -> Result<f32, GazeError> {
        let point = landmarks
            .get(index)
            .ok_or(GazeError::MissingLandmark { index })?;
        let x = point.x * frame_width;
        if x.is_finite() {
            Ok(x)
        } else {
            Err(GazeError::NonFinite)
        }
    };

    let left = x_at(LEFT_CORNER)?;
    let right = x_at(RIGHT_CORNER)?;

    let mut iris_sum = 0.0;
    for index in IRIS_POINTS {
        iris_sum += x_at(index)?;
    }
    let iris = iris_sum / IRIS_POINTS.len() as f32;

    let width = right - left;
    let scale = left.abs().max(right.abs()).max(1.0);
    if width.abs() <= f32::EPSILON * scale {
        return Err(GazeError::DegenerateEye { left, right });
    }

    let ratio = (iris - left) / width;
    if ratio.is_finite() {
        Ok(ratio)
    } else {
        Err(GazeError::NonFinite)
    }
}

/// Band around the calibrated center is inclusive on both edges.
pub fn classify(ratio: f32, calibration: &CalibrationResult, threshold: f32) -> Zone {
    let center = calibration.center_ratio;
    if ratio < center - threshold {
        Zone::Left
    } else if ratio > center + threshold {
        Zone::Right
    } else {
        Zone::Center
    }
}
