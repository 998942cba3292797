//! Motion Matching Library
//!
//! Runtime core of a motion matching locomotion system.
//!
//! Given a library of pre-processed animation samples, the controller picks,
//! at a fixed cadence, the sample whose pose and future trajectory best match
//! the character's current pose and the trajectory implied by player input.
//! Clip switches are smoothed by inertialization, and feet are pinned to the
//! ground while in contact.
//!
//! # Features
//!
//! - **Single encoder**: One versioned 53D feature layout shared by index and queries
//! - **k-d tree search**: Balanced tree with branch-and-bound k-nearest queries and tag filters
//! - **Trajectory prediction**: Bounded-acceleration forward simulation from stick input
//! - **Inertialization**: Critically damped per-bone offset decay on clip switches
//! - **Foot locking**: Hysteresis lock/unlock per foot
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//!
//! use motion_matching::{
//!     AnimationClip, AnimationPoseData, LocomotionInput, MotionDatabase, MotionFeature,
//!     MotionIndex, MotionMatchingConfig, MotionMatchingController,
//! };
//! use nalgebra::Vector2;
//!
//! let mut builder = MotionDatabase::builder();
//! builder.add_clip(AnimationClip::new("idle", 1.0, 30.0).with_tags(["idle"]))?;
//! builder.add_pose(AnimationPoseData::new("idle", 0, 0.0, MotionFeature::default()))?;
//!
//! let config = MotionMatchingConfig::default();
//! let index = MotionIndex::build(Arc::new(builder.build()), config.feature_weights.clone())?;
//! let mut controller = MotionMatchingController::new(Arc::new(index), config)?;
//!
//! let input = LocomotionInput::new(Vector2::new(0.0, 1.0), 0.0, 5.0);
//! let frame = controller.update(1.0 / 60.0, &input);
//! assert_eq!(frame.animation_id.as_deref(), Some("idle"));
//! # Ok::<(), motion_matching::MotionMatchingError>(())
//! ```
//!
//! # Presets
//!
//! ```
//! use motion_matching::{FeatureWeights, MotionMatchingConfig};
//!
//! let default_config = MotionMatchingConfig::default();
//! let locomotion_config = MotionMatchingConfig::locomotion();
//! let uniform = FeatureWeights::uniform();
//! ```

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

pub mod config;
pub mod controller;
pub mod database;
pub mod distance;
pub mod error;
pub mod feature;
pub mod foot_lock;
pub mod index;
pub mod inertialization;
pub mod math;
pub mod trajectory;

// Re-exports for convenient access
pub use config::{FeatureWeights, MotionMatchingConfig};
pub use controller::{LocomotionInput, MotionFrame, MotionMatchingController, RootMotionDelta};
pub use database::{
    bones, AnimationClip, AnimationPoseData, BoneTransform, BoneTransforms, DatabaseStats,
    MotionDatabase, MotionDatabaseBuilder,
};
pub use distance::{
    compute_feature_costs, feature_distance, linear_search, squared_distance, FeatureCosts,
    MatchResult,
};
pub use error::{MotionMatchingError, Result};
pub use feature::{
    encode_feature, FeatureVector, MotionFeature, PoseFeature, TrajectoryPoint, FEATURE_DIM,
    FEATURE_LAYOUT_VERSION, TRAJECTORY_POINTS,
};
pub use foot_lock::{Foot, FootInput, FootLockOutput, FootLockPhase, FootLockSettings, FootLockState, FootLocker};
pub use index::MotionIndex;
pub use inertialization::{
    inertialize_decay, BoneOffset, BoneVelocities, BoneVelocity, InertializationBlender,
};
pub use trajectory::TrajectoryPredictor;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
