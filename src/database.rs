//! Read-only motion database.
//!
//! A [`MotionDatabase`] is assembled once through [`MotionDatabaseBuilder`]
//! from samples produced by an offline feature-extraction pipeline, then
//! shared (usually behind an `Arc`) by the index and every controller.
//!
//! # Example
//!
//! ```
//! use motion_matching::{AnimationClip, AnimationPoseData, MotionDatabase, MotionFeature};
//!
//! let mut builder = MotionDatabase::builder();
//! builder.add_clip(AnimationClip::new("idle", 1.0, 30.0).with_tags(["idle"]))?;
//! builder.add_pose(AnimationPoseData::new("idle", 0, 0.0, MotionFeature::default()))?;
//! let database = builder.build();
//!
//! assert_eq!(database.len(), 1);
//! assert_eq!(database.stats().tags, vec!["idle".to_string()]);
//! # Ok::<(), motion_matching::MotionMatchingError>(())
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap};

use nalgebra::{UnitQuaternion, Vector3};

use crate::error::{MotionMatchingError, Result};
use crate::feature::MotionFeature;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Well-known bone names read by the controller.
pub mod bones {
    /// Pelvis / hip bone.
    pub const HIPS: &str = "Hips";
    /// Left foot bone.
    pub const LEFT_FOOT: &str = "LeftFoot";
    /// Right foot bone.
    pub const RIGHT_FOOT: &str = "RightFoot";
    /// Left hand bone.
    pub const LEFT_HAND: &str = "LeftHand";
    /// Right hand bone.
    pub const RIGHT_HAND: &str = "RightHand";
}

/// Position and rotation of a single bone.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BoneTransform {
    /// Bone position.
    pub position: Vector3<f64>,
    /// Bone rotation.
    pub rotation: UnitQuaternion<f64>,
}

impl BoneTransform {
    /// Create a bone transform.
    #[must_use]
    pub const fn new(position: Vector3<f64>, rotation: UnitQuaternion<f64>) -> Self {
        Self { position, rotation }
    }

    /// A bone at `position` with identity rotation.
    #[must_use]
    pub fn at(position: Vector3<f64>) -> Self {
        Self::new(position, UnitQuaternion::identity())
    }
}

impl Default for BoneTransform {
    fn default() -> Self {
        Self::at(Vector3::zeros())
    }
}

/// Flat bone-name → transform mapping. Hierarchy resolution is left to the renderer.
pub type BoneTransforms = BTreeMap<String, BoneTransform>;

/// Clip metadata.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AnimationClip {
    /// Unique clip identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Length in seconds.
    pub duration: f64,
    /// Sampling rate in frames per second.
    pub frame_rate: f64,
    /// Whether playback wraps at the end.
    pub looping: bool,
    /// Tags inherited by every pose of the clip.
    pub tags: BTreeSet<String>,
    /// Whether the clip carries root motion. Clips without it leave the
    /// character's root in place.
    pub has_root_motion: bool,
}

impl AnimationClip {
    /// Create a looping clip without tags or root motion.
    #[must_use]
    pub fn new(id: impl Into<String>, duration: f64, frame_rate: f64) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            duration,
            frame_rate,
            looping: true,
            tags: BTreeSet::new(),
            has_root_motion: false,
        }
    }

    /// Set the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set whether the clip loops.
    #[must_use]
    pub fn with_looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// Add tags to the clip.
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Mark the clip as carrying root motion.
    #[must_use]
    pub fn with_root_motion(mut self, has_root_motion: bool) -> Self {
        self.has_root_motion = has_root_motion;
        self
    }

    /// Frame index sampled at `time` seconds into the clip.
    #[must_use]
    pub fn frame_at(&self, time: f64) -> usize {
        if time <= 0.0 {
            return 0;
        }
        (time * self.frame_rate).floor() as usize
    }

    fn validate(&self) -> Result<()> {
        if !self.duration.is_finite() || self.duration <= 0.0 {
            return Err(MotionMatchingError::invalid_config(format!(
                "clip {} must have a positive duration",
                self.id
            )));
        }
        if !self.frame_rate.is_finite() || self.frame_rate <= 0.0 {
            return Err(MotionMatchingError::invalid_config(format!(
                "clip {} must have a positive frame rate",
                self.id
            )));
        }
        Ok(())
    }
}

/// One indexed animation sample.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AnimationPoseData {
    /// Clip this sample belongs to.
    pub animation_id: String,
    /// Frame within the clip.
    pub frame_index: usize,
    /// Time within the clip, in seconds.
    pub time: f64,
    /// Precomputed matching feature.
    pub feature: MotionFeature,
    /// Root position at this frame.
    pub root_position: Vector3<f64>,
    /// Root rotation at this frame.
    pub root_rotation: UnitQuaternion<f64>,
    /// Local bone transforms at this frame.
    pub bone_transforms: BoneTransforms,
}

impl AnimationPoseData {
    /// Create a sample with an identity root and no bones.
    #[must_use]
    pub fn new(
        animation_id: impl Into<String>,
        frame_index: usize,
        time: f64,
        feature: MotionFeature,
    ) -> Self {
        Self {
            animation_id: animation_id.into(),
            frame_index,
            time,
            feature,
            root_position: Vector3::zeros(),
            root_rotation: UnitQuaternion::identity(),
            bone_transforms: BoneTransforms::new(),
        }
    }

    /// Set the root transform.
    #[must_use]
    pub fn with_root(mut self, position: Vector3<f64>, rotation: UnitQuaternion<f64>) -> Self {
        self.root_position = position;
        self.root_rotation = rotation;
        self
    }

    /// Add or replace a bone transform.
    #[must_use]
    pub fn with_bone(mut self, name: impl Into<String>, transform: BoneTransform) -> Self {
        self.bone_transforms.insert(name.into(), transform);
        self
    }

    /// Replace all bone transforms.
    #[must_use]
    pub fn with_bones(mut self, bones: BoneTransforms) -> Self {
        self.bone_transforms = bones;
        self
    }
}

/// Summary of a database's contents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseStats {
    /// Number of registered clips.
    pub animation_count: usize,
    /// Number of indexed poses.
    pub pose_count: usize,
    /// Every tag present on at least one pose, sorted.
    pub tags: Vec<String>,
}

/// Immutable collection of animation samples and clip metadata.
#[derive(Debug, Clone, Default)]
pub struct MotionDatabase {
    poses: Vec<AnimationPoseData>,
    animations: BTreeMap<String, AnimationClip>,
    frame_lookup: HashMap<(String, usize), usize>,
}

impl MotionDatabase {
    /// Start building a database.
    #[must_use]
    pub fn builder() -> MotionDatabaseBuilder {
        MotionDatabaseBuilder::default()
    }

    /// Number of poses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.poses.len()
    }

    /// Whether the database holds no poses.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }

    /// Fail if the database holds no poses.
    ///
    /// # Errors
    ///
    /// Returns [`MotionMatchingError::EmptyDatabase`].
    pub fn ensure_not_empty(&self) -> Result<()> {
        if self.is_empty() {
            return Err(MotionMatchingError::EmptyDatabase);
        }
        Ok(())
    }

    /// All poses, in insertion order.
    #[must_use]
    pub fn poses(&self) -> &[AnimationPoseData] {
        &self.poses
    }

    /// Pose at `index`.
    #[must_use]
    pub fn pose(&self, index: usize) -> Option<&AnimationPoseData> {
        self.poses.get(index)
    }

    /// Clip metadata by id.
    #[must_use]
    pub fn clip(&self, id: &str) -> Option<&AnimationClip> {
        self.animations.get(id)
    }

    /// Iterate over all clips, sorted by id.
    pub fn clips(&self) -> impl Iterator<Item = &AnimationClip> {
        self.animations.values()
    }

    /// Index of the pose sampled at `frame_index` of `animation_id`.
    #[must_use]
    pub fn pose_index_at_frame(&self, animation_id: &str, frame_index: usize) -> Option<usize> {
        self.frame_lookup
            .get(&(animation_id.to_string(), frame_index))
            .copied()
    }

    /// Pose sampled at `frame_index` of `animation_id`.
    #[must_use]
    pub fn pose_at_frame(&self, animation_id: &str, frame_index: usize) -> Option<&AnimationPoseData> {
        self.pose_index_at_frame(animation_id, frame_index)
            .and_then(|i| self.poses.get(i))
    }

    /// Summary counts and tag set.
    #[must_use]
    pub fn stats(&self) -> DatabaseStats {
        let tags: BTreeSet<&String> = self
            .poses
            .iter()
            .flat_map(|pose| pose.feature.tags.iter())
            .collect();

        DatabaseStats {
            animation_count: self.animations.len(),
            pose_count: self.poses.len(),
            tags: tags.into_iter().cloned().collect(),
        }
    }
}

/// Builder for [`MotionDatabase`].
///
/// Clips must be registered before their poses. Each pose inherits its
/// clip's tags.
#[derive(Debug, Default)]
pub struct MotionDatabaseBuilder {
    database: MotionDatabase,
}

impl MotionDatabaseBuilder {
    /// Register a clip. Re-registering an id replaces its metadata.
    ///
    /// # Errors
    ///
    /// Returns an error if the duration or frame rate is not positive.
    pub fn add_clip(&mut self, clip: AnimationClip) -> Result<&mut Self> {
        clip.validate()?;
        self.database.animations.insert(clip.id.clone(), clip);
        Ok(self)
    }

    /// Add a pose and return its index.
    ///
    /// # Errors
    ///
    /// Returns an error if the clip is unknown, the frame is already
    /// present, or the feature contains non-finite values.
    pub fn add_pose(&mut self, mut pose: AnimationPoseData) -> Result<usize> {
        let clip = self
            .database
            .animations
            .get(&pose.animation_id)
            .ok_or_else(|| MotionMatchingError::unknown_animation(&pose.animation_id))?;

        pose.feature.validate().map_err(|err| match err {
            MotionMatchingError::DegenerateFeature { context } => {
                MotionMatchingError::degenerate_feature(format!(
                    "{} frame {}: {context}",
                    pose.animation_id, pose.frame_index
                ))
            }
            other => other,
        })?;

        let key = (pose.animation_id.clone(), pose.frame_index);
        if self.database.frame_lookup.contains_key(&key) {
            return Err(MotionMatchingError::duplicate_frame(
                &pose.animation_id,
                pose.frame_index,
            ));
        }

        pose.feature.tags.extend(clip.tags.iter().cloned());

        let index = self.database.poses.len();
        self.database.frame_lookup.insert(key, index);
        self.database.poses.push(pose);
        Ok(index)
    }

    /// Number of poses added so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.database.poses.len()
    }

    /// Whether no poses were added yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.database.poses.is_empty()
    }

    /// Finish building.
    #[must_use]
    pub fn build(self) -> MotionDatabase {
        self.database
    }
}
