//! Motion feature data structures and the feature-vector encoder.
//!
//! This module defines [`PoseFeature`], [`TrajectoryPoint`] and
//! [`MotionFeature`], plus [`encode_feature`], the only place where the
//! weighted feature layout is defined. Index construction and queries both
//! go through it, so the two can never disagree on channel order.
//!
//! # Feature Layout (version 1, 53D)
//!
//! | Index | Feature | Dims | Weight |
//! |-------|---------|------|--------|
//! | 0:3 | left foot position | 3 | `left_foot_position` |
//! | 3:6 | right foot position | 3 | `right_foot_position` |
//! | 6:9 | left hand position | 3 | 1 |
//! | 9:12 | right hand position | 3 | 1 |
//! | 12:15 | hip position | 3 | `hip_position` |
//! | 15:18 | left foot velocity | 3 | `left_foot_velocity` |
//! | 18:21 | right foot velocity | 3 | `right_foot_velocity` |
//! | 21:24 | hip velocity | 3 | `hip_velocity` |
//! | 24:27 | root velocity | 3 | 1 |
//! | 27 | root angular velocity | 1 | 1 |
//! | 28:53 | trajectory, 5 × (xyz, facing xy) | 25 | `trajectory` / `facing` |

use std::collections::BTreeSet;
use std::ops::Range;

use nalgebra::{Vector2, Vector3};

use crate::config::FeatureWeights;
use crate::error::{MotionMatchingError, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Version of the feature layout produced by [`encode_feature`].
pub const FEATURE_LAYOUT_VERSION: u32 = 1;

/// Number of trajectory points in the encoded layout.
pub const TRAJECTORY_POINTS: usize = 5;

/// Values per encoded trajectory point (position xyz + facing xy).
const TRAJECTORY_POINT_DIM: usize = 5;

/// Dimensionality of an encoded feature vector.
pub const FEATURE_DIM: usize = 28 + TRAJECTORY_POINTS * TRAJECTORY_POINT_DIM;

/// Encoded positions (feet, hands, hip).
pub const POSE_BAND: Range<usize> = 0..15;

/// Encoded velocities (feet, hip, root, root yaw rate).
pub const VELOCITY_BAND: Range<usize> = 15..28;

/// Encoded trajectory positions and facings.
pub const TRAJECTORY_BAND: Range<usize> = 28..FEATURE_DIM;

/// A weighted, fixed-layout feature vector.
pub type FeatureVector = [f64; FEATURE_DIM];

/// Per-sample pose snapshot, in root space.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PoseFeature {
    /// Left foot position.
    pub left_foot_position: Vector3<f64>,
    /// Right foot position.
    pub right_foot_position: Vector3<f64>,
    /// Left hand position.
    pub left_hand_position: Vector3<f64>,
    /// Right hand position.
    pub right_hand_position: Vector3<f64>,
    /// Hip position.
    pub hip_position: Vector3<f64>,
    /// Left foot velocity.
    pub left_foot_velocity: Vector3<f64>,
    /// Right foot velocity.
    pub right_foot_velocity: Vector3<f64>,
    /// Hip velocity.
    pub hip_velocity: Vector3<f64>,
    /// Root linear velocity.
    pub root_velocity: Vector3<f64>,
    /// Root yaw rate (radians per second).
    pub root_angular_velocity: f64,
}

impl Default for PoseFeature {
    fn default() -> Self {
        Self {
            left_foot_position: Vector3::zeros(),
            right_foot_position: Vector3::zeros(),
            left_hand_position: Vector3::zeros(),
            right_hand_position: Vector3::zeros(),
            hip_position: Vector3::zeros(),
            left_foot_velocity: Vector3::zeros(),
            right_foot_velocity: Vector3::zeros(),
            hip_velocity: Vector3::zeros(),
            root_velocity: Vector3::zeros(),
            root_angular_velocity: 0.0,
        }
    }
}

impl PoseFeature {
    fn vectors(&self) -> [(&'static str, &Vector3<f64>); 9] {
        [
            ("left_foot_position", &self.left_foot_position),
            ("right_foot_position", &self.right_foot_position),
            ("left_hand_position", &self.left_hand_position),
            ("right_hand_position", &self.right_hand_position),
            ("hip_position", &self.hip_position),
            ("left_foot_velocity", &self.left_foot_velocity),
            ("right_foot_velocity", &self.right_foot_velocity),
            ("hip_velocity", &self.hip_velocity),
            ("root_velocity", &self.root_velocity),
        ]
    }

    /// Check that every component is finite.
    ///
    /// # Errors
    ///
    /// Returns [`MotionMatchingError::DegenerateFeature`] naming the first
    /// non-finite channel.
    pub fn validate(&self) -> Result<()> {
        for (name, v) in self.vectors() {
            if !v.iter().all(|c| c.is_finite()) {
                return Err(MotionMatchingError::degenerate_feature(format!(
                    "{name} is not finite"
                )));
            }
        }
        if !self.root_angular_velocity.is_finite() {
            return Err(MotionMatchingError::degenerate_feature(
                "root_angular_velocity is not finite",
            ));
        }
        Ok(())
    }
}

/// A past or future sample of the root path.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrajectoryPoint {
    /// Root position relative to the current root.
    pub position: Vector3<f64>,
    /// Planar facing direction `(x, z)`.
    pub facing: Vector2<f64>,
    /// Time offset in seconds.
    pub time: f64,
}

impl TrajectoryPoint {
    /// Create a trajectory point.
    #[must_use]
    pub const fn new(position: Vector3<f64>, facing: Vector2<f64>, time: f64) -> Self {
        Self {
            position,
            facing,
            time,
        }
    }

    fn is_finite(&self) -> bool {
        self.position.iter().all(|c| c.is_finite())
            && self.facing.iter().all(|c| c.is_finite())
            && self.time.is_finite()
    }
}

/// Pose plus short-term trajectory, with tags used for filtering.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MotionFeature {
    /// Pose snapshot.
    pub pose: PoseFeature,
    /// Trajectory samples; only the first [`TRAJECTORY_POINTS`] are encoded.
    pub trajectory: Vec<TrajectoryPoint>,
    /// Tags such as `"walk"` or `"jump"`.
    pub tags: BTreeSet<String>,
}

impl MotionFeature {
    /// Create a feature without tags.
    #[must_use]
    pub fn new(pose: PoseFeature, trajectory: Vec<TrajectoryPoint>) -> Self {
        Self {
            pose,
            trajectory,
            tags: BTreeSet::new(),
        }
    }

    /// Add tags to the feature.
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Whether this feature passes a tag filter.
    ///
    /// An empty filter accepts everything; otherwise at least one tag must
    /// be shared.
    #[must_use]
    pub fn matches_tags(&self, filter: &BTreeSet<String>) -> bool {
        filter.is_empty() || filter.iter().any(|tag| self.tags.contains(tag))
    }

    /// Check that the pose and the encoded trajectory points are finite.
    ///
    /// # Errors
    ///
    /// Returns [`MotionMatchingError::DegenerateFeature`] on NaN or infinity.
    pub fn validate(&self) -> Result<()> {
        self.pose.validate()?;
        for (i, point) in self.trajectory.iter().take(TRAJECTORY_POINTS).enumerate() {
            if !point.is_finite() {
                return Err(MotionMatchingError::degenerate_feature(format!(
                    "trajectory point {i} is not finite"
                )));
            }
        }
        Ok(())
    }
}

/// Encode a feature into the weighted layout (version [`FEATURE_LAYOUT_VERSION`]).
///
/// Missing trajectory points encode as zeros; points beyond
/// [`TRAJECTORY_POINTS`] are ignored.
#[must_use]
pub fn encode_feature(feature: &MotionFeature, weights: &FeatureWeights) -> FeatureVector {
    let mut out = [0.0; FEATURE_DIM];
    let mut cursor = 0;

    let mut push3 = |out: &mut FeatureVector, v: &Vector3<f64>, w: f64| {
        out[cursor] = v.x * w;
        out[cursor + 1] = v.y * w;
        out[cursor + 2] = v.z * w;
        cursor += 3;
    };

    let pose = &feature.pose;
    push3(&mut out, &pose.left_foot_position, weights.left_foot_position);
    push3(&mut out, &pose.right_foot_position, weights.right_foot_position);
    push3(&mut out, &pose.left_hand_position, 1.0);
    push3(&mut out, &pose.right_hand_position, 1.0);
    push3(&mut out, &pose.hip_position, weights.hip_position);

    push3(&mut out, &pose.left_foot_velocity, weights.left_foot_velocity);
    push3(&mut out, &pose.right_foot_velocity, weights.right_foot_velocity);
    push3(&mut out, &pose.hip_velocity, weights.hip_velocity);
    push3(&mut out, &pose.root_velocity, 1.0);

    out[VELOCITY_BAND.end - 1] = pose.root_angular_velocity;

    for (i, point) in feature.trajectory.iter().take(TRAJECTORY_POINTS).enumerate() {
        let base = TRAJECTORY_BAND.start + i * TRAJECTORY_POINT_DIM;
        out[base] = point.position.x * weights.trajectory;
        out[base + 1] = point.position.y * weights.trajectory;
        out[base + 2] = point.position.z * weights.trajectory;
        out[base + 3] = point.facing.x * weights.facing;
        out[base + 4] = point.facing.y * weights.facing;
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample_feature() -> MotionFeature {
        let pose = PoseFeature {
            left_foot_position: Vector3::new(-0.1, 0.0, 0.2),
            right_foot_position: Vector3::new(0.1, 0.05, -0.2),
            left_hand_position: Vector3::new(-0.3, 0.9, 0.1),
            right_hand_position: Vector3::new(0.3, 0.9, -0.1),
            hip_position: Vector3::new(0.0, 1.0, 0.0),
            left_foot_velocity: Vector3::new(0.0, 0.0, 1.4),
            right_foot_velocity: Vector3::new(0.0, 0.1, -0.4),
            hip_velocity: Vector3::new(0.0, 0.0, 1.2),
            root_velocity: Vector3::new(0.0, 0.0, 1.4),
            root_angular_velocity: 0.25,
        };
        let trajectory = (0..TRAJECTORY_POINTS)
            .map(|i| {
                let t = (i + 1) as f64 * 0.2;
                TrajectoryPoint::new(Vector3::new(0.0, 0.0, 1.4 * t), Vector2::new(0.0, 1.0), t)
            })
            .collect();
        MotionFeature::new(pose, trajectory).with_tags(["walk"])
    }

    #[test]
    fn test_layout_dimensions() {
        assert_eq!(FEATURE_DIM, 53);
        assert_eq!(POSE_BAND.end, VELOCITY_BAND.start);
        assert_eq!(VELOCITY_BAND.end, TRAJECTORY_BAND.start);
        assert_eq!(TRAJECTORY_BAND.end, FEATURE_DIM);
    }

    #[test]
    fn test_weights_applied_per_channel() {
        let feature = sample_feature();
        let weights = FeatureWeights::default();
        let v = encode_feature(&feature, &weights);

        assert_relative_eq!(v[2], 0.2 * weights.left_foot_position);
        // Hands are unweighted.
        assert_relative_eq!(v[7], 0.9);
        assert_relative_eq!(v[13], 1.0 * weights.hip_position);
        assert_relative_eq!(v[17], 1.4 * weights.left_foot_velocity);
        assert_relative_eq!(v[27], 0.25);
        assert_relative_eq!(v[28 + 2], 0.28 * weights.trajectory, epsilon = 1e-12);
        assert_relative_eq!(v[28 + 4], 1.0 * weights.facing);
    }

    #[test]
    fn test_short_trajectory_pads_with_zeros() {
        let mut feature = sample_feature();
        feature.trajectory.truncate(2);
        let v = encode_feature(&feature, &FeatureWeights::uniform());
        assert!(v[28 + 2 * 5..].iter().all(|&x| x == 0.0));
        assert!(v[28..28 + 10].iter().any(|&x| x != 0.0));
    }

    #[test]
    fn test_encoding_is_bit_identical() {
        let feature = sample_feature();
        let weights = FeatureWeights::locomotion();
        let a = encode_feature(&feature, &weights);
        let b = encode_feature(&feature.clone(), &weights.clone());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.to_bits(), y.to_bits());
        }
    }

    #[test]
    fn test_validate_rejects_non_finite() {
        let mut feature = sample_feature();
        assert!(feature.validate().is_ok());

        feature.pose.hip_velocity.y = f64::NAN;
        assert!(matches!(
            feature.validate(),
            Err(MotionMatchingError::DegenerateFeature { .. })
        ));

        let mut feature = sample_feature();
        feature.trajectory[3].facing.x = f64::INFINITY;
        assert!(feature.validate().is_err());
    }

    #[test]
    fn test_tag_filter() {
        let feature = sample_feature();
        let mut filter = BTreeSet::new();
        assert!(feature.matches_tags(&filter));

        filter.insert("jump".to_string());
        assert!(!feature.matches_tags(&filter));

        filter.insert("walk".to_string());
        assert!(feature.matches_tags(&filter));
    }
}
