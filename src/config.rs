//! Configuration for the motion matching controller.
//!
//! This module provides [`FeatureWeights`], the per-channel multipliers used
//! when encoding feature vectors, and [`MotionMatchingConfig`], which
//! centralizes all tunable runtime parameters.
//!
//! # Example
//!
//! ```
//! use motion_matching::MotionMatchingConfig;
//!
//! // Use default configuration
//! let config = MotionMatchingConfig::default();
//! assert!(config.validate().is_ok());
//!
//! // Use the locomotion preset with a longer blend
//! let config = MotionMatchingConfig::locomotion().with_blend_time(0.3);
//! assert_eq!(config.blend_time, 0.3);
//! ```

use crate::error::{MotionMatchingError, Result};
use crate::feature::TRAJECTORY_POINTS;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Per-channel weights applied to the encoded feature vector.
///
/// The same weights must be used to build the index and to query it.
/// Hands, root velocity and root angular velocity are always encoded
/// with weight 1.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FeatureWeights {
    /// Weight for the left foot position.
    pub left_foot_position: f64,
    /// Weight for the right foot position.
    pub right_foot_position: f64,
    /// Weight for the left foot velocity.
    pub left_foot_velocity: f64,
    /// Weight for the right foot velocity.
    pub right_foot_velocity: f64,
    /// Weight for the hip position.
    pub hip_position: f64,
    /// Weight for the hip velocity.
    pub hip_velocity: f64,
    /// Weight for trajectory positions.
    pub trajectory: f64,
    /// Weight for trajectory facing directions.
    pub facing: f64,
}

impl Default for FeatureWeights {
    fn default() -> Self {
        Self {
            left_foot_position: 1.0,
            right_foot_position: 1.0,
            left_foot_velocity: 0.5,
            right_foot_velocity: 0.5,
            hip_position: 0.8,
            hip_velocity: 0.3,
            trajectory: 1.5,
            facing: 1.0,
        }
    }
}

impl FeatureWeights {
    /// Weights that treat every channel equally.
    #[must_use]
    pub const fn uniform() -> Self {
        Self {
            left_foot_position: 1.0,
            right_foot_position: 1.0,
            left_foot_velocity: 1.0,
            right_foot_velocity: 1.0,
            hip_position: 1.0,
            hip_velocity: 1.0,
            trajectory: 1.0,
            facing: 1.0,
        }
    }

    /// Weights tuned for ground locomotion, favouring trajectory and facing.
    #[must_use]
    pub const fn locomotion() -> Self {
        Self {
            left_foot_position: 1.0,
            right_foot_position: 1.0,
            left_foot_velocity: 0.8,
            right_foot_velocity: 0.8,
            hip_position: 0.5,
            hip_velocity: 0.5,
            trajectory: 2.0,
            facing: 1.5,
        }
    }

    fn channels(&self) -> [(&'static str, f64); 8] {
        [
            ("left_foot_position", self.left_foot_position),
            ("right_foot_position", self.right_foot_position),
            ("left_foot_velocity", self.left_foot_velocity),
            ("right_foot_velocity", self.right_foot_velocity),
            ("hip_position", self.hip_position),
            ("hip_velocity", self.hip_velocity),
            ("trajectory", self.trajectory),
            ("facing", self.facing),
        ]
    }

    /// Validate the weights.
    ///
    /// # Errors
    ///
    /// Returns an error if any weight is negative or not finite.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in self.channels() {
            if !value.is_finite() || value < 0.0 {
                return Err(MotionMatchingError::invalid_config(format!(
                    "feature weight {name} must be finite and non-negative, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Runtime configuration for [`MotionMatchingController`](crate::MotionMatchingController).
///
/// # Timing Parameters
///
/// - `min_time_between_searches`: debounce between index queries (seconds).
/// - `blend_time`: inertialization window after a clip switch (seconds).
/// - `trajectory_prediction_time`: horizon of the predicted path (seconds).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MotionMatchingConfig {
    /// Weights used when encoding features.
    pub feature_weights: FeatureWeights,

    /// Minimum time between two index searches.
    pub min_time_between_searches: f64,

    /// Duration of the inertialization blend.
    pub blend_time: f64,

    /// Time horizon covered by the predicted trajectory.
    pub trajectory_prediction_time: f64,

    /// Number of predicted trajectory points. Must match the feature layout.
    pub trajectory_point_count: usize,

    /// Whether foot locking runs after blending.
    pub foot_locking_enabled: bool,

    /// Whether root motion is extracted and accumulated.
    pub root_motion_enabled: bool,
}

impl Default for MotionMatchingConfig {
    fn default() -> Self {
        Self {
            feature_weights: FeatureWeights::default(),
            min_time_between_searches: 0.1,
            blend_time: 0.2,
            trajectory_prediction_time: 1.0,
            trajectory_point_count: TRAJECTORY_POINTS,
            foot_locking_enabled: true,
            root_motion_enabled: true,
        }
    }
}

impl MotionMatchingConfig {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Preset for ground locomotion (walk/run/strafe/turn libraries).
    #[must_use]
    pub fn locomotion() -> Self {
        Self {
            feature_weights: FeatureWeights::locomotion(),
            ..Self::default()
        }
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a weight or timing parameter is out of range, or
    /// if the trajectory point count does not match the feature layout.
    pub fn validate(&self) -> Result<()> {
        self.feature_weights.validate()?;

        if !self.min_time_between_searches.is_finite() || self.min_time_between_searches < 0.0 {
            return Err(MotionMatchingError::invalid_config(
                "min_time_between_searches must be non-negative",
            ));
        }
        if !self.blend_time.is_finite() || self.blend_time < 0.0 {
            return Err(MotionMatchingError::invalid_config(
                "blend_time must be non-negative",
            ));
        }
        if !self.trajectory_prediction_time.is_finite() || self.trajectory_prediction_time <= 0.0 {
            return Err(MotionMatchingError::invalid_config(
                "trajectory_prediction_time must be positive",
            ));
        }
        if self.trajectory_point_count != TRAJECTORY_POINTS {
            return Err(MotionMatchingError::dimension_mismatch(
                TRAJECTORY_POINTS,
                self.trajectory_point_count,
            ));
        }
        Ok(())
    }

    /// Set the feature weights.
    #[must_use]
    pub fn with_feature_weights(mut self, weights: FeatureWeights) -> Self {
        self.feature_weights = weights;
        self
    }

    /// Set the search debounce interval.
    #[must_use]
    pub const fn with_min_time_between_searches(mut self, seconds: f64) -> Self {
        self.min_time_between_searches = seconds;
        self
    }

    /// Set the inertialization blend time.
    #[must_use]
    pub const fn with_blend_time(mut self, seconds: f64) -> Self {
        self.blend_time = seconds;
        self
    }

    /// Set the trajectory prediction horizon.
    #[must_use]
    pub const fn with_trajectory_prediction_time(mut self, seconds: f64) -> Self {
        self.trajectory_prediction_time = seconds;
        self
    }

    /// Enable/disable foot locking.
    #[must_use]
    pub const fn with_foot_locking(mut self, enabled: bool) -> Self {
        self.foot_locking_enabled = enabled;
        self
    }

    /// Enable/disable root motion.
    #[must_use]
    pub const fn with_root_motion(mut self, enabled: bool) -> Self {
        self.root_motion_enabled = enabled;
        self
    }
}
