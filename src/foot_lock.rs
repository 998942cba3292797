//! Contact-velocity foot locking.
//!
//! Each foot runs an independent hysteresis machine:
//!
//! ```text
//! Free --(speed < lock_threshold)--> Locked
//! Locked --(speed > unlock_threshold or drift > max_lock_distance)--> Unlocking
//! Unlocking --(unlock_progress >= 1)--> Free
//! ```
//!
//! While locked the foot is pinned to the anchor captured at lock time.
//! While unlocking it blends from the anchor back to the live pose.

use nalgebra::{UnitQuaternion, Vector3};

use crate::database::BoneTransform;
use crate::math::{lerp, slerp};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Thresholds for the foot lock machine.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FootLockSettings {
    /// Speed below which a free foot locks.
    pub lock_threshold: f64,
    /// Speed above which a locked foot starts unlocking.
    pub unlock_threshold: f64,
    /// Drift from the anchor that forces an unlock.
    pub max_lock_distance: f64,
    /// Unlock progress gained per second.
    pub unlock_rate: f64,
}

impl Default for FootLockSettings {
    fn default() -> Self {
        Self {
            lock_threshold: 0.1,
            unlock_threshold: 0.3,
            max_lock_distance: 0.3,
            unlock_rate: 5.0,
        }
    }
}

/// Which foot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Foot {
    /// Left foot.
    Left,
    /// Right foot.
    Right,
}

/// Observable phase of a foot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FootLockPhase {
    /// Live pose passes through.
    #[default]
    Free,
    /// Pinned to the anchor.
    Locked,
    /// Blending from the anchor back to the live pose.
    Unlocking,
}

/// Per-foot lock state.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FootLockState {
    /// Whether the foot is anchored (locked or unlocking).
    pub locked: bool,
    /// Anchor position.
    pub lock_position: Vector3<f64>,
    /// Anchor rotation.
    pub lock_rotation: UnitQuaternion<f64>,
    /// Blend from anchor (0) to live pose (1).
    pub unlock_progress: f64,
}

impl Default for FootLockState {
    fn default() -> Self {
        Self {
            locked: false,
            lock_position: Vector3::zeros(),
            lock_rotation: UnitQuaternion::identity(),
            unlock_progress: 1.0,
        }
    }
}

impl FootLockState {
    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> FootLockPhase {
        if !self.locked {
            FootLockPhase::Free
        } else if self.unlock_progress > 0.0 {
            FootLockPhase::Unlocking
        } else {
            FootLockPhase::Locked
        }
    }

    /// Force the foot free.
    pub fn reset(&mut self) {
        self.locked = false;
        self.unlock_progress = 1.0;
    }

    /// Advance one tick and return the output transform for this foot.
    pub fn update(
        &mut self,
        settings: &FootLockSettings,
        input: &FootInput,
        dt: f64,
    ) -> BoneTransform {
        let speed = input.velocity.norm();

        if !self.locked {
            if speed < settings.lock_threshold {
                self.locked = true;
                self.lock_position = input.position;
                self.lock_rotation = input.rotation;
                self.unlock_progress = 0.0;
            }
            return BoneTransform::new(input.position, input.rotation);
        }

        let drift = (input.position - self.lock_position).norm();
        let unlocking = self.unlock_progress > 0.0;
        if unlocking || speed > settings.unlock_threshold || drift > settings.max_lock_distance {
            self.unlock_progress += dt.max(0.0) * settings.unlock_rate;

            if self.unlock_progress >= 1.0 {
                self.locked = false;
                self.unlock_progress = 1.0;
                return BoneTransform::new(input.position, input.rotation);
            }
        }

        let t = self.unlock_progress;
        BoneTransform::new(
            lerp(&self.lock_position, &input.position, t),
            slerp(&self.lock_rotation, &input.rotation, t),
        )
    }
}

/// Live kinematics of one foot for a tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FootInput {
    /// Foot position.
    pub position: Vector3<f64>,
    /// Foot velocity.
    pub velocity: Vector3<f64>,
    /// Foot rotation.
    pub rotation: UnitQuaternion<f64>,
}

impl FootInput {
    /// Create a foot input.
    #[must_use]
    pub const fn new(
        position: Vector3<f64>,
        velocity: Vector3<f64>,
        rotation: UnitQuaternion<f64>,
    ) -> Self {
        Self {
            position,
            velocity,
            rotation,
        }
    }

    /// Build from a bone transform and a velocity.
    #[must_use]
    pub const fn from_transform(transform: &BoneTransform, velocity: Vector3<f64>) -> Self {
        Self::new(transform.position, velocity, transform.rotation)
    }
}

/// Output of a two-foot update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FootLockOutput {
    /// Left foot transform.
    pub left: BoneTransform,
    /// Right foot transform.
    pub right: BoneTransform,
}

/// Foot locking for both feet.
#[derive(Debug, Clone, Default)]
pub struct FootLocker {
    settings: FootLockSettings,
    left: FootLockState,
    right: FootLockState,
}

impl FootLocker {
    /// Create a locker with custom settings.
    #[must_use]
    pub fn new(settings: FootLockSettings) -> Self {
        Self {
            settings,
            left: FootLockState::default(),
            right: FootLockState::default(),
        }
    }

    /// Advance both feet one tick.
    pub fn update(&mut self, left: &FootInput, right: &FootInput, dt: f64) -> FootLockOutput {
        FootLockOutput {
            left: self.left.update(&self.settings, left, dt),
            right: self.right.update(&self.settings, right, dt),
        }
    }

    /// Advance a single foot one tick.
    pub fn update_foot(&mut self, foot: Foot, input: &FootInput, dt: f64) -> BoneTransform {
        let settings = self.settings;
        self.state_mut(foot).update(&settings, input, dt)
    }

    /// Release both feet, e.g. after a teleport or respawn.
    pub fn reset(&mut self) {
        self.left.reset();
        self.right.reset();
    }

    /// State of one foot.
    #[must_use]
    pub const fn state(&self, foot: Foot) -> &FootLockState {
        match foot {
            Foot::Left => &self.left,
            Foot::Right => &self.right,
        }
    }

    fn state_mut(&mut self, foot: Foot) -> &mut FootLockState {
        match foot {
            Foot::Left => &mut self.left,
            Foot::Right => &mut self.right,
        }
    }

    /// Phase of one foot.
    #[must_use]
    pub fn phase(&self, foot: Foot) -> FootLockPhase {
        self.state(foot).phase()
    }

    /// Active settings.
    #[must_use]
    pub const fn settings(&self) -> &FootLockSettings {
        &self.settings
    }
}
