//! Inertialization blending.
//!
//! When playback jumps to a different clip, the pose pops. Instead of
//! crossfading two streams, the blender records the per-bone offset between
//! the outgoing and incoming pose and fades it out with a critically damped
//! decay.
//!
//! Starting a new blend while one is running replaces the stored offsets;
//! there is no blend queue.
//!
//! # Example
//!
//! ```
//! use motion_matching::inertialization::inertialize_decay;
//!
//! assert_eq!(inertialize_decay(0.0, 0.2), 1.0);
//! assert!(inertialize_decay(0.2, 0.2) < 1e-3);
//! ```

use std::collections::BTreeMap;

use nalgebra::{UnitQuaternion, Vector3};

use crate::database::BoneTransforms;
use crate::math::slerp;

/// Damping frequency of the decay, in units of the normalized blend time.
pub const DECAY_OMEGA: f64 = 10.0;

/// Critically damped decay `(1 + ωu)·e^(−ωu)` with `u = elapsed / duration`.
///
/// Equals 1 at the start, is non-increasing, and reaches about `5e-4` at
/// `elapsed == duration`.
#[must_use]
pub fn inertialize_decay(elapsed: f64, duration: f64) -> f64 {
    if duration <= 0.0 {
        return 0.0;
    }
    let u = (elapsed / duration).max(0.0);
    let x = DECAY_OMEGA * u;
    (1.0 + x) * (-x).exp()
}

/// Measured velocity of a bone at blend start.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoneVelocity {
    /// Linear velocity.
    pub linear: Vector3<f64>,
    /// Angular velocity (axis scaled by rate).
    pub angular: Vector3<f64>,
}

/// Per-bone velocities keyed by bone name.
pub type BoneVelocities = BTreeMap<String, BoneVelocity>;

/// Offset captured for one bone at blend start.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoneOffset {
    /// `current − target` position.
    pub position: Vector3<f64>,
    /// `current · target⁻¹` rotation.
    pub rotation: UnitQuaternion<f64>,
    /// Bone velocity when the blend started. Kept for hosts and diagnostics;
    /// the decay curve is closed-form and does not read it.
    pub velocity: BoneVelocity,
}

/// Decaying per-bone offsets applied after a clip switch.
#[derive(Debug, Clone, Default)]
pub struct InertializationBlender {
    offsets: BTreeMap<String, BoneOffset>,
    elapsed: f64,
    duration: f64,
    blending: bool,
}

impl InertializationBlender {
    /// Create an idle blender.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture offsets between `current` and `target` and start decaying them.
    ///
    /// Only bones present in both maps get an offset. A non-positive
    /// `duration` cancels any running blend.
    pub fn start_blend(
        &mut self,
        current: &BoneTransforms,
        target: &BoneTransforms,
        velocities: &BoneVelocities,
        duration: f64,
    ) {
        self.offsets.clear();
        self.elapsed = 0.0;
        self.duration = duration;

        if duration <= 0.0 {
            self.blending = false;
            return;
        }

        for (bone, from) in current {
            let Some(to) = target.get(bone) else {
                continue;
            };
            self.offsets.insert(
                bone.clone(),
                BoneOffset {
                    position: from.position - to.position,
                    rotation: from.rotation * to.rotation.inverse(),
                    velocity: velocities.get(bone).copied().unwrap_or_default(),
                },
            );
        }

        self.blending = true;
    }

    /// Advance the blend timer; clears the offsets once the blend is over.
    pub fn update(&mut self, dt: f64) {
        if !self.blending {
            return;
        }

        self.elapsed += dt.max(0.0);

        if self.elapsed >= self.duration {
            self.blending = false;
            self.offsets.clear();
        }
    }

    /// Current decay factor (0 when idle).
    #[must_use]
    pub fn decay(&self) -> f64 {
        if !self.blending {
            return 0.0;
        }
        inertialize_decay(self.elapsed, self.duration)
    }

    /// Apply the decayed position offset of `bone`.
    #[must_use]
    pub fn apply_to_position(&self, bone: &str, position: &Vector3<f64>) -> Vector3<f64> {
        if !self.blending {
            return *position;
        }
        match self.offsets.get(bone) {
            Some(offset) => position + offset.position * self.decay(),
            None => *position,
        }
    }

    /// Apply the decayed rotation offset of `bone`.
    ///
    /// The offset is slerped toward identity by `1 − decay` and composed on
    /// the left, mirroring how it was captured.
    #[must_use]
    pub fn apply_to_rotation(&self, bone: &str, rotation: &UnitQuaternion<f64>) -> UnitQuaternion<f64> {
        if !self.blending {
            return *rotation;
        }
        match self.offsets.get(bone) {
            Some(offset) => {
                let faded = slerp(&offset.rotation, &UnitQuaternion::identity(), 1.0 - self.decay());
                faded * rotation
            }
            None => *rotation,
        }
    }

    /// Apply offsets to every bone of a pose.
    #[must_use]
    pub fn apply(&self, pose: &BoneTransforms) -> BoneTransforms {
        if !self.blending {
            return pose.clone();
        }
        pose.iter()
            .map(|(bone, transform)| {
                let mut corrected = *transform;
                corrected.position = self.apply_to_position(bone, &transform.position);
                corrected.rotation = self.apply_to_rotation(bone, &transform.rotation);
                (bone.clone(), corrected)
            })
            .collect()
    }

    /// Whether a blend is running.
    #[must_use]
    pub const fn is_blending(&self) -> bool {
        self.blending
    }

    /// Fraction of the blend window elapsed, in `[0, 1]`.
    #[must_use]
    pub fn progress(&self) -> f64 {
        if !self.blending || self.duration <= 0.0 {
            return 1.0;
        }
        (self.elapsed / self.duration).clamp(0.0, 1.0)
    }

    /// Stored offset of a bone, if blending.
    #[must_use]
    pub fn offset(&self, bone: &str) -> Option<&BoneOffset> {
        self.offsets.get(bone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::BoneTransform;
    use crate::math::yaw_rotation;
    use approx::assert_relative_eq;

    fn pose(x: f64, yaw: f64) -> BoneTransforms {
        let mut bones = BoneTransforms::new();
        bones.insert(
            "Hips".to_string(),
            BoneTransform::new(Vector3::new(x, 1.0, 0.0), yaw_rotation(yaw)),
        );
        bones.insert("Head".to_string(), BoneTransform::at(Vector3::new(x, 1.7, 0.0)));
        bones
    }

    #[test]
    fn test_decay_bounds() {
        let duration = 0.2;
        assert_relative_eq!(inertialize_decay(0.0, duration), 1.0);
        assert!(inertialize_decay(duration, duration) < 1e-3);

        let mut previous = 1.0;
        for i in 0..=200 {
            let t = duration * f64::from(i) / 200.0;
            let d = inertialize_decay(t, duration);
            assert!(d <= previous + 1e-15);
            assert!(d >= 0.0);
            previous = d;
        }
    }

    #[test]
    fn test_start_reproduces_current_pose() {
        let current = pose(1.0, 0.4);
        let target = pose(0.0, 0.0);
        let mut blender = InertializationBlender::new();
        blender.start_blend(&current, &target, &BoneVelocities::new(), 0.2);
        assert!(blender.is_blending());

        let hips = &target["Hips"];
        let p = blender.apply_to_position("Hips", &hips.position);
        let q = blender.apply_to_rotation("Hips", &hips.rotation);
        assert_relative_eq!(p.x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(q.angle_to(&current["Hips"].rotation), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_offsets_decay_and_clear() {
        let mut blender = InertializationBlender::new();
        blender.start_blend(&pose(1.0, 0.0), &pose(0.0, 0.0), &BoneVelocities::new(), 0.2);

        blender.update(0.1);
        let mid = blender.apply_to_position("Hips", &Vector3::new(0.0, 1.0, 0.0));
        assert!(mid.x > 0.0 && mid.x < 1.0);
        assert_relative_eq!(blender.progress(), 0.5, epsilon = 1e-12);

        blender.update(0.1);
        assert!(!blender.is_blending());
        assert!(blender.offset("Hips").is_none());
        let after = blender.apply_to_position("Hips", &Vector3::new(0.0, 1.0, 0.0));
        assert_relative_eq!(after.x, 0.0);
    }

    #[test]
    fn test_only_shared_bones_get_offsets() {
        let mut current = pose(1.0, 0.0);
        current.insert("Tail".to_string(), BoneTransform::default());
        let mut velocities = BoneVelocities::new();
        velocities.insert(
            "Hips".to_string(),
            BoneVelocity {
                linear: Vector3::new(2.0, 0.0, 0.0),
                angular: Vector3::zeros(),
            },
        );

        let mut blender = InertializationBlender::new();
        blender.start_blend(&current, &pose(0.0, 0.0), &velocities, 0.2);
        assert!(blender.offset("Tail").is_none());
        assert_relative_eq!(blender.offset("Hips").unwrap().velocity.linear.x, 2.0);
        assert_eq!(blender.offset("Head").unwrap().velocity, BoneVelocity::default());

        let tail = Vector3::new(3.0, 0.0, 0.0);
        assert_eq!(blender.apply_to_position("Tail", &tail), tail);
    }

    #[test]
    fn test_restart_overwrites_offsets() {
        let mut blender = InertializationBlender::new();
        blender.start_blend(&pose(1.0, 0.0), &pose(0.0, 0.0), &BoneVelocities::new(), 0.2);
        blender.update(0.05);

        blender.start_blend(&pose(0.5, 0.0), &pose(2.0, 0.0), &BoneVelocities::new(), 0.3);
        assert_relative_eq!(blender.offset("Hips").unwrap().position.x, -1.5);
        assert_relative_eq!(blender.progress(), 0.0);
    }

    #[test]
    fn test_zero_duration_does_not_blend() {
        let mut blender = InertializationBlender::new();
        blender.start_blend(&pose(1.0, 0.0), &pose(0.0, 0.0), &BoneVelocities::new(), 0.0);
        assert!(!blender.is_blending());
        let target = pose(0.0, 0.0);
        assert_eq!(blender.apply(&target), target);
    }

    #[test]
    fn test_recorded_velocity_does_not_shape_decay() {
        let current = pose(1.0, 0.4);
        let target = pose(0.0, 0.0);
        let mut moving = BoneVelocities::new();
        moving.insert(
            "Hips".to_string(),
            BoneVelocity {
                linear: Vector3::new(3.0, 0.0, -2.0),
                angular: Vector3::new(0.0, 4.0, 0.0),
            },
        );

        let mut still = InertializationBlender::new();
        let mut fast = InertializationBlender::new();
        still.start_blend(&current, &target, &BoneVelocities::new(), 0.2);
        fast.start_blend(&current, &target, &moving, 0.2);
        assert_relative_eq!(fast.offset("Hips").unwrap().velocity.linear.x, 3.0);

        for _ in 0..4 {
            still.update(0.03);
            fast.update(0.03);
            assert_eq!(still.apply(&target), fast.apply(&target));
        }
    }
}
