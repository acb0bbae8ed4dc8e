//! Error types for the gaze keyboard core

use crate::session::StateKind;
use std::path::PathBuf;

/// Why a frame could not be turned into an iris ratio
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GazeError {
    #[error("landmark {index} missing from face mesh")]
    MissingLandmark { index: usize },

    #[error("eye corners coincide (left={left}, right={right}); ratio is indeterminate")]
    DegenerateEye { left: f32, right: f32 },

    #[error("non-finite landmark coordinate or frame width")]
    NonFinite,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("cannot {action} while {from}")]
    InvalidTransition { from: StateKind, action: &'static str },

    #[error(transparent)]
    Config(#[from] ConfigError),
}
