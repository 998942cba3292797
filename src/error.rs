//! Error types for motion matching operations.
//!
//! Configuration problems are fatal and surface from constructors. Problems
//! met while ticking a controller are logged and recovered from instead.

use thiserror::Error;

/// Main error type for motion matching operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MotionMatchingError {
    /// Configuration validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A configured dimension does not match the feature layout.
    #[error("Dimension mismatch: layout expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Controller weights differ from the weights the index was built with.
    #[error("Feature weights differ from the weights used to build the index")]
    WeightMismatch,

    /// A feature contains NaN or infinite values.
    #[error("Degenerate feature: {context}")]
    DegenerateFeature { context: String },

    /// A pose references a clip that was never registered.
    #[error("Unknown animation: {0}")]
    UnknownAnimation(String),

    /// Two poses share the same clip and frame.
    #[error("Duplicate frame {frame_index} in animation {animation_id}")]
    DuplicateFrame {
        animation_id: String,
        frame_index: usize,
    },

    /// The database holds no poses.
    #[error("Motion database is empty")]
    EmptyDatabase,
}

/// Result type alias for motion matching operations.
pub type Result<T> = std::result::Result<T, MotionMatchingError>;

impl MotionMatchingError {
    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a dimension mismatch error.
    #[must_use]
    pub const fn dimension_mismatch(expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch { expected, actual }
    }

    /// Create a degenerate feature error.
    #[must_use]
    pub fn degenerate_feature(context: impl Into<String>) -> Self {
        Self::DegenerateFeature {
            context: context.into(),
        }
    }

    /// Create an unknown animation error.
    #[must_use]
    pub fn unknown_animation(id: impl Into<String>) -> Self {
        Self::UnknownAnimation(id.into())
    }

    /// Create a duplicate frame error.
    #[must_use]
    pub fn duplicate_frame(animation_id: impl Into<String>, frame_index: usize) -> Self {
        Self::DuplicateFrame {
            animation_id: animation_id.into(),
            frame_index,
        }
    }
}
