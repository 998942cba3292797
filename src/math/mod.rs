//! Mathematical utilities for motion matching.
//!
//! This module provides:
//! - [`rotation`]: safe slerp, yaw extraction and planar facing helpers

pub mod rotation;

pub use rotation::{
    angular_velocity, facing_from_yaw, lerp, normalize_or, slerp, yaw_of, yaw_rotation,
    LENGTH_EPS,
};
