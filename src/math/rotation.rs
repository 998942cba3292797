//! Rotation and interpolation helpers.
//!
//! The crate is Y-up: yaw is the rotation about +Y, and a yaw of zero faces
//! +Z. Planar facing vectors are stored as `(x, z)` pairs.
//!
//! # Example
//!
//! ```
//! use motion_matching::math::{facing_from_yaw, yaw_of, yaw_rotation};
//!
//! let q = yaw_rotation(0.5);
//! assert!((yaw_of(&q) - 0.5).abs() < 1e-12);
//!
//! let facing = facing_from_yaw(0.0);
//! assert_eq!((facing.x, facing.y), (0.0, 1.0));
//! ```

use nalgebra::{UnitQuaternion, Vector2, Vector3};

/// Tolerance below which a vector is treated as zero length.
pub const LENGTH_EPS: f64 = 1e-9;

/// Spherical interpolation that never panics.
///
/// `nalgebra`'s `slerp` panics when the two rotations are nearly identical
/// or exactly opposite; those cases fall back to normalized lerp, which is
/// indistinguishable there.
#[inline]
#[must_use]
pub fn slerp(from: &UnitQuaternion<f64>, to: &UnitQuaternion<f64>, t: f64) -> UnitQuaternion<f64> {
    from.try_slerp(to, t, 1.0e-9)
        .unwrap_or_else(|| from.nlerp(to, t))
}

/// Linear interpolation between two points.
#[inline]
#[must_use]
pub fn lerp(from: &Vector3<f64>, to: &Vector3<f64>, t: f64) -> Vector3<f64> {
    from + (to - from) * t
}

/// Rotation of `angle` radians about the +Y axis.
#[inline]
#[must_use]
pub fn yaw_rotation(angle: f64) -> UnitQuaternion<f64> {
    UnitQuaternion::from_axis_angle(&Vector3::y_axis(), angle)
}

/// Yaw angle of a rotation, measured from +Z towards +X.
#[must_use]
pub fn yaw_of(rotation: &UnitQuaternion<f64>) -> f64 {
    let forward = rotation * Vector3::z();
    if forward.x.abs() < LENGTH_EPS && forward.z.abs() < LENGTH_EPS {
        // Looking straight up or down.
        return 0.0;
    }
    forward.x.atan2(forward.z)
}

/// Planar facing direction for a yaw angle.
#[inline]
#[must_use]
pub fn facing_from_yaw(yaw: f64) -> Vector2<f64> {
    Vector2::new(yaw.sin(), yaw.cos())
}

/// Normalize a planar direction, or return `fallback` when it has no length.
#[inline]
#[must_use]
pub fn normalize_or(direction: &Vector2<f64>, fallback: Vector2<f64>) -> Vector2<f64> {
    direction.try_normalize(LENGTH_EPS).unwrap_or(fallback)
}

/// Angular velocity (axis scaled by rate) that turns `previous` into `current` over `dt`.
#[must_use]
pub fn angular_velocity(
    previous: &UnitQuaternion<f64>,
    current: &UnitQuaternion<f64>,
    dt: f64,
) -> Vector3<f64> {
    if dt <= 0.0 {
        return Vector3::zeros();
    }
    let delta = current * previous.inverse();
    delta.scaled_axis() / dt
}
