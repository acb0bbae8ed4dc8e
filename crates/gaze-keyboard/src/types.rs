//! Core data types for the gaze keyboard

use serde::{Deserialize, Serialize};

/// A single face-mesh landmark in normalized frame coordinates (0.0-1.0)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Landmarks for one detected face, indexed like the refined 478-point face mesh
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Landmarks {
    pub points: Vec<Landmark>,
}

impl Landmarks {
    pub fn new(points: Vec<Landmark>) -> Self {
        Self { points }
    }

    pub fn get(&self, index: usize) -> Option<Landmark> {
        self.points.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// One frame delivered by the landmark collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandmarkFrame {
    pub landmarks: Landmarks,
    /// Width of the source frame in pixels
    pub frame_width: f32,
}

/// Horizontal iris position normalized against the eye corners
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GazeSample {
    pub ratio: f32,
}

/// Discretized horizontal gaze direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Zone {
    Left,
    Center,
    Right,
}

impl Zone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Center => "center",
            Self::Right => "right",
        }
    }

    /// Keyboard group scanned while gazing into this zone. CENTER is the rest position.
    pub fn scan_group(&self) -> Option<ScanGroup> {
        match self {
            Self::Left => Some(ScanGroup::A),
            Self::Right => Some(ScanGroup::B),
            Self::Center => None,
        }
    }
}

impl std::fmt::Display for Zone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the two keyboard partitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanGroup {
    /// Scanned while looking left
    A,
    /// Scanned while looking right
    B,
}
