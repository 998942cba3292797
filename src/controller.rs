//! Per-character motion matching controller.
//!
//! [`MotionMatchingController`] owns all per-character state (playback
//! position, blend offsets, foot locks, root transform) and shares the
//! immutable [`MotionIndex`] with every other character.
//!
//! Each call to [`MotionMatchingController::update`] runs one tick:
//!
//! 1. advance playback and the running blend
//! 2. predict the trajectory from the stick input
//! 3. search the index when the search interval has elapsed
//! 4. switch clips through an inertialization blend
//! 5. apply root motion, then lock feet against the moved root
//!
//! A tick never fails. Empty results and degenerate queries are logged and
//! the current pose is held.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use motion_matching::{
//!     AnimationClip, AnimationPoseData, FeatureWeights, LocomotionInput, MotionDatabase,
//!     MotionFeature, MotionIndex, MotionMatchingConfig, MotionMatchingController,
//! };
//!
//! let mut builder = MotionDatabase::builder();
//! builder.add_clip(AnimationClip::new("idle", 1.0, 30.0))?;
//! builder.add_pose(AnimationPoseData::new("idle", 0, 0.0, MotionFeature::default()))?;
//! let index = MotionIndex::build(Arc::new(builder.build()), FeatureWeights::default())?;
//!
//! let mut controller =
//!     MotionMatchingController::new(Arc::new(index), MotionMatchingConfig::default())?;
//! let frame = controller.update(1.0 / 60.0, &LocomotionInput::idle());
//! assert_eq!(frame.animation_id.as_deref(), Some("idle"));
//! # Ok::<(), motion_matching::MotionMatchingError>(())
//! ```

use std::collections::BTreeSet;
use std::sync::Arc;

use nalgebra::{UnitQuaternion, Vector2, Vector3};

use crate::config::MotionMatchingConfig;
use crate::database::{bones, AnimationPoseData, BoneTransform, BoneTransforms};
use crate::distance::FeatureCosts;
use crate::error::{MotionMatchingError, Result};
use crate::feature::{MotionFeature, PoseFeature};
use crate::foot_lock::{FootInput, FootLockSettings, FootLocker};
use crate::index::MotionIndex;
use crate::inertialization::{BoneVelocities, BoneVelocity, InertializationBlender};
use crate::math::{angular_velocity, yaw_rotation};
use crate::trajectory::TrajectoryPredictor;

/// Stick input for one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct LocomotionInput {
    /// Desired planar direction (`x → x`, `y → z`).
    pub direction: Vector2<f64>,
    /// Stick deflection in `[0, 1]`.
    pub magnitude: f64,
    /// Speed at full deflection.
    pub max_speed: f64,
    /// Restrict matches to poses carrying any of these tags. Empty means no filter.
    pub tags: BTreeSet<String>,
}

impl LocomotionInput {
    /// Create an input without a tag filter.
    #[must_use]
    pub fn new(direction: Vector2<f64>, magnitude: f64, max_speed: f64) -> Self {
        Self {
            direction,
            magnitude,
            max_speed,
            tags: BTreeSet::new(),
        }
    }

    /// Released stick.
    #[must_use]
    pub fn idle() -> Self {
        Self::new(Vector2::new(0.0, 1.0), 0.0, 0.0)
    }

    /// Add tags to the filter.
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }
}

/// Root displacement produced during one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RootMotionDelta {
    /// World-space translation.
    pub translation: Vector3<f64>,
    /// Yaw rotation.
    pub rotation: UnitQuaternion<f64>,
}

/// Output of one controller tick.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionFrame {
    /// Corrected local bone transforms.
    pub bone_transforms: BoneTransforms,
    /// Root position after root motion.
    pub root_position: Vector3<f64>,
    /// Root rotation after root motion.
    pub root_rotation: UnitQuaternion<f64>,
    /// Root displacement of this tick, when root motion is enabled and a clip plays.
    pub root_motion: Option<RootMotionDelta>,
    /// Playing clip, if any.
    pub animation_id: Option<String>,
    /// Playing frame within the clip.
    pub frame_index: usize,
}

/// What is currently being played.
#[derive(Debug, Clone)]
struct Playback {
    pose_index: usize,
    animation_id: String,
    frame_index: usize,
    time: f64,
}

/// Motion matching controller for a single character.
#[derive(Debug)]
pub struct MotionMatchingController {
    /// Shared pose index.
    index: Arc<MotionIndex>,

    config: MotionMatchingConfig,
    predictor: TrajectoryPredictor,
    blender: InertializationBlender,
    foot_locker: FootLocker,

    /// Current clip and time, `None` before the first match.
    playback: Option<Playback>,

    /// Seconds since the last search.
    time_since_search: f64,

    root_position: Vector3<f64>,
    root_rotation: UnitQuaternion<f64>,

    /// Bone transforms emitted by the previous tick.
    last_bones: BoneTransforms,

    /// Per-bone velocities measured from emitted transforms.
    bone_velocities: BoneVelocities,

    last_match_costs: Option<FeatureCosts>,

    /// Set after an empty search has been reported.
    empty_warned: bool,
}

impl MotionMatchingController {
    /// Create a controller over a shared index.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, or
    /// [`MotionMatchingError::WeightMismatch`] if its feature weights differ
    /// from the ones the index was built with.
    pub fn new(index: Arc<MotionIndex>, config: MotionMatchingConfig) -> Result<Self> {
        config.validate()?;
        if config.feature_weights != *index.weights() {
            return Err(MotionMatchingError::WeightMismatch);
        }

        Ok(Self {
            predictor: TrajectoryPredictor::from_config(&config),
            blender: InertializationBlender::new(),
            foot_locker: FootLocker::default(),
            playback: None,
            time_since_search: f64::INFINITY,
            root_position: Vector3::zeros(),
            root_rotation: UnitQuaternion::identity(),
            last_bones: BoneTransforms::new(),
            bone_velocities: BoneVelocities::new(),
            last_match_costs: None,
            empty_warned: false,
            index,
            config,
        })
    }

    /// Replace the foot lock thresholds. Resets both feet.
    #[must_use]
    pub fn with_foot_lock_settings(mut self, settings: FootLockSettings) -> Self {
        self.foot_locker = FootLocker::new(settings);
        self
    }

    /// Replace the trajectory predictor.
    #[must_use]
    pub fn with_predictor(mut self, predictor: TrajectoryPredictor) -> Self {
        self.predictor = predictor;
        self
    }

    /// Advance the character by `dt` seconds.
    pub fn update(&mut self, dt: f64, input: &LocomotionInput) -> MotionFrame {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        let index = Arc::clone(&self.index);
        let database = index.database();

        let force_search = self.advance_playback(dt);
        self.blender.update(dt);
        self.time_since_search += dt;

        if force_search || self.time_since_search >= self.config.min_time_between_searches {
            self.time_since_search = 0.0;
            self.search(input, force_search);
        }

        let Some(playing) = self
            .playback
            .as_ref()
            .and_then(|playback| database.pose(playback.pose_index))
        else {
            return self.held_frame();
        };

        let clip_has_root_motion = database
            .clip(&playing.animation_id)
            .is_some_and(|clip| clip.has_root_motion);
        let root_motion = if self.config.root_motion_enabled && clip_has_root_motion {
            Some(self.apply_root_motion(&playing.feature.pose, dt))
        } else {
            None
        };

        let mut bone_transforms = self.blender.apply(&playing.bone_transforms);

        // Feet are anchored against the root after this tick's motion.
        if self.config.foot_locking_enabled {
            self.lock_feet(playing, &mut bone_transforms, dt);
        }

        self.measure_bone_velocities(&bone_transforms, dt);
        self.last_bones.clone_from(&bone_transforms);

        MotionFrame {
            bone_transforms,
            root_position: self.root_position,
            root_rotation: self.root_rotation,
            root_motion,
            animation_id: Some(playing.animation_id.clone()),
            frame_index: playing.frame_index,
        }
    }

    /// Move playback forward. Returns `true` when a non-looping clip has ended.
    fn advance_playback(&mut self, dt: f64) -> bool {
        let database = self.index.database();
        let Some(playback) = self.playback.as_mut() else {
            return false;
        };
        let Some(clip) = database.clip(&playback.animation_id) else {
            return false;
        };

        playback.time += dt;
        let mut finished = false;
        if playback.time >= clip.duration {
            if clip.looping {
                playback.time %= clip.duration;
            } else {
                playback.time = clip.duration;
                finished = true;
            }
        }

        let frame_index = clip.frame_at(playback.time);
        if let Some(pose_index) = database.pose_index_at_frame(&playback.animation_id, frame_index) {
            playback.pose_index = pose_index;
            playback.frame_index = frame_index;
        }

        finished
    }

    fn search(&mut self, input: &LocomotionInput, force_switch: bool) {
        let index = Arc::clone(&self.index);
        let database = index.database();

        let playing = self
            .playback
            .as_ref()
            .and_then(|playback| database.pose(playback.pose_index));
        let query = self.build_query(playing, input);

        let results = match index.find_nearest(&query, 1, &input.tags) {
            Ok(results) => results,
            Err(err) => {
                log::error!("motion search failed, holding pose: {err}");
                return;
            }
        };

        let Some(best) = results.first() else {
            if !self.empty_warned {
                log::warn!(
                    "motion search returned no candidates ({} poses, tags {:?}), holding pose",
                    database.len(),
                    input.tags
                );
                self.empty_warned = true;
            }
            return;
        };
        self.empty_warned = false;
        self.last_match_costs = Some(best.feature_costs);

        let same_frame = self.playback.as_ref().is_some_and(|playback| {
            playback.animation_id == best.pose.animation_id
                && playback.frame_index == best.pose.frame_index
        });
        if same_frame && !force_switch {
            return;
        }

        if self.playback.is_some() {
            self.blender.start_blend(
                &self.last_bones,
                &best.pose.bone_transforms,
                &self.bone_velocities,
                self.config.blend_time,
            );
        }

        log::debug!(
            "switching to {} frame {} (cost {:.4})",
            best.pose.animation_id,
            best.pose.frame_index,
            best.cost
        );

        self.playback = Some(Playback {
            pose_index: best.pose_index,
            animation_id: best.pose.animation_id.clone(),
            frame_index: best.pose.frame_index,
            time: best.pose.time,
        });
    }

    /// Query = playing pose + trajectory predicted in root space.
    ///
    /// Stored features are root-relative, so the predicted path starts at the
    /// origin facing `+Z` and the world stick direction is turned into the
    /// character's frame.
    fn build_query(&self, playing: Option<&AnimationPoseData>, input: &LocomotionInput) -> MotionFeature {
        let pose = playing.map_or_else(PoseFeature::default, |p| p.feature.pose.clone());
        let direction = self.root_rotation.inverse() * Vector3::new(input.direction.x, 0.0, input.direction.y);

        let trajectory = self.predictor.predict_from_input(
            &Vector3::zeros(),
            &pose.root_velocity,
            0.0,
            &Vector2::new(direction.x, direction.z),
            input.magnitude,
            input.max_speed,
        );

        MotionFeature::new(pose, trajectory)
    }

    /// Lock feet in world space around the current root, then hand the
    /// result back in root space.
    fn lock_feet(&mut self, playing: &AnimationPoseData, bone_transforms: &mut BoneTransforms, dt: f64) {
        let (Some(left), Some(right)) = (
            bone_transforms.get(bones::LEFT_FOOT),
            bone_transforms.get(bones::RIGHT_FOOT),
        ) else {
            return;
        };

        let pose = &playing.feature.pose;
        let left = self.foot_to_world(left, &pose.left_foot_velocity);
        let right = self.foot_to_world(right, &pose.right_foot_velocity);
        let locked = self.foot_locker.update(&left, &right, dt);

        bone_transforms.insert(bones::LEFT_FOOT.to_string(), self.foot_to_root(&locked.left));
        bone_transforms.insert(bones::RIGHT_FOOT.to_string(), self.foot_to_root(&locked.right));
    }

    fn foot_to_world(&self, local: &BoneTransform, velocity: &Vector3<f64>) -> FootInput {
        let world = BoneTransform::new(
            self.root_position + self.root_rotation * local.position,
            self.root_rotation * local.rotation,
        );
        FootInput::from_transform(&world, self.root_rotation * velocity)
    }

    fn foot_to_root(&self, world: &BoneTransform) -> BoneTransform {
        let inverse = self.root_rotation.inverse();
        BoneTransform::new(inverse * (world.position - self.root_position), inverse * world.rotation)
    }

    fn measure_bone_velocities(&mut self, bone_transforms: &BoneTransforms, dt: f64) {
        if dt <= 0.0 {
            return;
        }
        self.bone_velocities = bone_transforms
            .iter()
            .filter_map(|(bone, current)| {
                let previous = self.last_bones.get(bone)?;
                Some((
                    bone.clone(),
                    BoneVelocity {
                        linear: (current.position - previous.position) / dt,
                        angular: angular_velocity(&previous.rotation, &current.rotation, dt),
                    },
                ))
            })
            .collect();
    }

    fn apply_root_motion(&mut self, pose: &PoseFeature, dt: f64) -> RootMotionDelta {
        let delta = RootMotionDelta {
            translation: self.root_rotation * pose.root_velocity * dt,
            rotation: yaw_rotation(pose.root_angular_velocity * dt),
        };
        self.root_position += delta.translation;
        self.root_rotation = delta.rotation * self.root_rotation;
        delta
    }

    fn held_frame(&self) -> MotionFrame {
        MotionFrame {
            bone_transforms: self.last_bones.clone(),
            root_position: self.root_position,
            root_rotation: self.root_rotation,
            root_motion: None,
            animation_id: None,
            frame_index: 0,
        }
    }

    /// Place the character, e.g. on spawn.
    pub fn set_root_transform(&mut self, position: Vector3<f64>, rotation: UnitQuaternion<f64>) {
        self.root_position = position;
        self.root_rotation = rotation;
    }

    /// Release both feet, e.g. after a teleport.
    pub fn reset_foot_locks(&mut self) {
        self.foot_locker.reset();
    }

    /// Playing clip id.
    #[must_use]
    pub fn current_animation(&self) -> Option<&str> {
        self.playback.as_ref().map(|p| p.animation_id.as_str())
    }

    /// Playing frame index.
    #[must_use]
    pub fn current_frame(&self) -> Option<usize> {
        self.playback.as_ref().map(|p| p.frame_index)
    }

    /// Playback time within the current clip.
    #[must_use]
    pub fn playback_time(&self) -> Option<f64> {
        self.playback.as_ref().map(|p| p.time)
    }

    /// Whether an inertialization blend is running.
    #[must_use]
    pub const fn is_blending(&self) -> bool {
        self.blender.is_blending()
    }

    /// Cost breakdown of the most recent successful search.
    #[must_use]
    pub const fn last_match_costs(&self) -> Option<&FeatureCosts> {
        self.last_match_costs.as_ref()
    }

    /// Root position.
    #[must_use]
    pub const fn root_position(&self) -> &Vector3<f64> {
        &self.root_position
    }

    /// Root rotation.
    #[must_use]
    pub const fn root_rotation(&self) -> &UnitQuaternion<f64> {
        &self.root_rotation
    }

    /// Foot locking state.
    #[must_use]
    pub const fn foot_locker(&self) -> &FootLocker {
        &self.foot_locker
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &MotionMatchingConfig {
        &self.config
    }

    /// Shared index.
    #[must_use]
    pub fn index(&self) -> &Arc<MotionIndex> {
        &self.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FeatureWeights;
    use crate::database::{AnimationClip, BoneTransform, MotionDatabase};
    use crate::feature::TrajectoryPoint;
    use crate::foot_lock::{Foot, FootLockPhase};
    use crate::math::yaw_of;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    const DT: f64 = 0.1;

    fn moving_feature(speed: f64) -> MotionFeature {
        let pose = PoseFeature {
            root_velocity: Vector3::new(0.0, 0.0, speed),
            ..PoseFeature::default()
        };
        let trajectory = (1..=5)
            .map(|i| {
                let t = f64::from(i) * 0.2;
                TrajectoryPoint::new(Vector3::new(0.0, 0.0, speed * t), Vector2::new(0.0, 1.0), t)
            })
            .collect();
        MotionFeature::new(pose, trajectory)
    }

    fn skeleton(hip_height: f64) -> BoneTransforms {
        let mut transforms = BoneTransforms::new();
        transforms.insert(bones::HIPS.to_string(), BoneTransform::at(Vector3::new(0.0, hip_height, 0.0)));
        transforms.insert(bones::LEFT_FOOT.to_string(), BoneTransform::at(Vector3::new(-0.1, 0.0, 0.0)));
        transforms.insert(bones::RIGHT_FOOT.to_string(), BoneTransform::at(Vector3::new(0.1, 0.0, 0.0)));
        transforms
    }

    fn database() -> Arc<MotionDatabase> {
        let mut builder = MotionDatabase::builder();
        for (id, speed, hip) in [("idle", 0.0, 1.0), ("run", 5.0, 0.9)] {
            builder
                .add_clip(AnimationClip::new(id, 1.0, 1.0).with_tags([id]).with_root_motion(true))
                .unwrap();
            builder
                .add_pose(AnimationPoseData::new(id, 0, 0.0, moving_feature(speed)).with_bones(skeleton(hip)))
                .unwrap();
        }
        Arc::new(builder.build())
    }

    fn controller(config: MotionMatchingConfig) -> MotionMatchingController {
        let index = MotionIndex::build(database(), config.feature_weights.clone()).unwrap();
        MotionMatchingController::new(Arc::new(index), config).unwrap()
    }

    fn run_input() -> LocomotionInput {
        LocomotionInput::new(Vector2::new(0.0, 1.0), 1.0, 5.0)
    }

    #[test]
    fn test_rejects_weight_mismatch() {
        let index = MotionIndex::build(database(), FeatureWeights::default()).unwrap();
        let config = MotionMatchingConfig::locomotion();
        let err = MotionMatchingController::new(Arc::new(index), config).unwrap_err();
        assert_eq!(err, MotionMatchingError::WeightMismatch);
    }

    #[test]
    fn test_rejects_invalid_config() {
        let index = MotionIndex::build(database(), FeatureWeights::default()).unwrap();
        let config = MotionMatchingConfig::default().with_blend_time(f64::NAN);
        assert!(MotionMatchingController::new(Arc::new(index), config).is_err());
    }

    #[test]
    fn test_first_tick_plays_idle() {
        let mut controller = controller(MotionMatchingConfig::default());
        assert!(controller.current_animation().is_none());

        let frame = controller.update(DT, &LocomotionInput::idle());
        assert_eq!(frame.animation_id.as_deref(), Some("idle"));
        assert_eq!(controller.current_frame(), Some(0));
        assert!(!controller.is_blending());
        assert!(controller.last_match_costs().is_some());
        assert_relative_eq!(frame.bone_transforms[bones::HIPS].position.y, 1.0);
    }

    #[test]
    fn test_switch_starts_blend_from_emitted_pose() {
        let mut controller = controller(MotionMatchingConfig::default().with_foot_locking(false));
        controller.update(DT, &LocomotionInput::idle());

        let frame = controller.update(DT, &run_input());
        assert_eq!(frame.animation_id.as_deref(), Some("run"));
        assert!(controller.is_blending());
        // Blend starts at the previously emitted hip height.
        assert_relative_eq!(frame.bone_transforms[bones::HIPS].position.y, 1.0, epsilon = 1e-12);

        let mut last = frame;
        for _ in 0..3 {
            last = controller.update(DT, &run_input());
        }
        assert!(!controller.is_blending());
        assert_relative_eq!(last.bone_transforms[bones::HIPS].position.y, 0.9, epsilon = 1e-12);
    }

    #[test]
    fn test_tag_filter_restricts_clip() {
        let mut controller = controller(MotionMatchingConfig::default());
        let frame = controller.update(DT, &LocomotionInput::idle().with_tags(["run"]));
        assert_eq!(frame.animation_id.as_deref(), Some("run"));
    }

    #[test]
    fn test_unmatched_tags_hold_pose() {
        let mut controller = controller(MotionMatchingConfig::default());
        controller.update(DT, &LocomotionInput::idle());
        for _ in 0..5 {
            let frame = controller.update(DT, &LocomotionInput::idle().with_tags(["swim"]));
            assert_eq!(frame.animation_id.as_deref(), Some("idle"));
        }
    }

    #[test]
    fn test_degenerate_input_holds_pose() {
        let mut controller = controller(MotionMatchingConfig::default());
        controller.update(DT, &LocomotionInput::idle());
        let bad = LocomotionInput::new(Vector2::new(f64::NAN, 1.0), 1.0, 5.0);
        let frame = controller.update(DT, &bad);
        assert_eq!(frame.animation_id.as_deref(), Some("idle"));
    }

    #[test]
    fn test_empty_database_emits_nothing() {
        let index =
            MotionIndex::build(Arc::new(MotionDatabase::default()), FeatureWeights::default()).unwrap();
        let mut controller =
            MotionMatchingController::new(Arc::new(index), MotionMatchingConfig::default()).unwrap();
        for _ in 0..3 {
            let frame = controller.update(DT, &run_input());
            assert!(frame.animation_id.is_none());
            assert!(frame.bone_transforms.is_empty());
            assert!(frame.root_motion.is_none());
        }
    }

    #[test]
    fn test_root_motion_accumulates() {
        let mut controller = controller(MotionMatchingConfig::default());
        controller.set_root_transform(Vector3::new(1.0, 0.0, 0.0), UnitQuaternion::identity());
        for _ in 0..20 {
            controller.update(DT, &run_input());
        }
        assert_eq!(controller.current_animation(), Some("run"));

        let frame = controller.update(DT, &run_input());
        let delta = frame.root_motion.unwrap();
        assert_relative_eq!(delta.translation.z, 0.5, epsilon = 1e-12);
        assert_relative_eq!(frame.root_position.x, 1.0, epsilon = 1e-12);
        assert!(frame.root_position.z > 5.0);
    }

    #[test]
    fn test_root_motion_disabled() {
        let mut controller = controller(MotionMatchingConfig::default().with_root_motion(false));
        for _ in 0..5 {
            let frame = controller.update(DT, &run_input());
            assert!(frame.root_motion.is_none());
            assert_relative_eq!(frame.root_position.norm(), 0.0);
        }
    }

    #[test]
    fn test_clip_without_root_motion_keeps_root() {
        let mut builder = MotionDatabase::builder();
        builder.add_clip(AnimationClip::new("treadmill", 1.0, 1.0)).unwrap();
        builder
            .add_pose(AnimationPoseData::new("treadmill", 0, 0.0, moving_feature(5.0)))
            .unwrap();
        let index = MotionIndex::build(Arc::new(builder.build()), FeatureWeights::default()).unwrap();
        let mut controller =
            MotionMatchingController::new(Arc::new(index), MotionMatchingConfig::default()).unwrap();

        for _ in 0..5 {
            let frame = controller.update(DT, &run_input());
            assert_eq!(frame.animation_id.as_deref(), Some("treadmill"));
            assert!(frame.root_motion.is_none());
            assert_relative_eq!(frame.root_position.norm(), 0.0);
        }
    }

    /// Straight ahead along +Z versus sideways along +X, both facing +Z.
    fn heading_controller(yaw: f64) -> MotionMatchingController {
        let mut builder = MotionDatabase::builder();
        for (id, heading) in [("run_forward", Vector3::z()), ("strafe_right", Vector3::x())] {
            builder.add_clip(AnimationClip::new(id, 1.0, 1.0)).unwrap();
            let pose = PoseFeature {
                root_velocity: heading * 5.0,
                ..PoseFeature::default()
            };
            let trajectory = (1..=5)
                .map(|i| {
                    let t = f64::from(i) * 0.2;
                    TrajectoryPoint::new(heading * 5.0 * t, Vector2::new(0.0, 1.0), t)
                })
                .collect();
            builder
                .add_pose(AnimationPoseData::new(id, 0, 0.0, MotionFeature::new(pose, trajectory)))
                .unwrap();
        }
        let index = MotionIndex::build(Arc::new(builder.build()), FeatureWeights::default()).unwrap();
        let mut controller =
            MotionMatchingController::new(Arc::new(index), MotionMatchingConfig::default()).unwrap();
        controller.set_root_transform(Vector3::zeros(), yaw_rotation(yaw));
        controller
    }

    #[test]
    fn test_query_follows_character_heading() {
        // Pushing the stick along the character's facing is "forward" at any yaw.
        let cases = [(0.0, Vector2::new(0.0, 1.0)), (FRAC_PI_2, Vector2::new(1.0, 0.0))];
        for (yaw, stick) in cases {
            let mut controller = heading_controller(yaw);
            let input = LocomotionInput::new(stick, 1.0, 5.0);
            for _ in 0..5 {
                let frame = controller.update(DT, &input);
                assert_eq!(frame.animation_id.as_deref(), Some("run_forward"), "yaw {yaw}");
            }
            assert_relative_eq!(yaw_of(controller.root_rotation()), yaw, epsilon = 1e-12);
        }

        // Sideways relative to the character picks the strafe.
        let mut controller = heading_controller(FRAC_PI_2);
        let frame = controller.update(DT, &LocomotionInput::new(Vector2::new(0.0, -1.0), 1.0, 5.0));
        assert_eq!(frame.animation_id.as_deref(), Some("strafe_right"));
    }

    #[test]
    fn test_locked_foot_holds_world_position() {
        let mut builder = MotionDatabase::builder();
        builder
            .add_clip(AnimationClip::new("creep", 1.0, 1.0).with_root_motion(true))
            .unwrap();
        builder
            .add_pose(AnimationPoseData::new("creep", 0, 0.0, moving_feature(0.5)).with_bones(skeleton(1.0)))
            .unwrap();
        let index = MotionIndex::build(Arc::new(builder.build()), FeatureWeights::default()).unwrap();
        let mut controller =
            MotionMatchingController::new(Arc::new(index), MotionMatchingConfig::default()).unwrap();

        let dt = 1.0 / 30.0;
        let input = LocomotionInput::idle();
        let mut anchor = None;
        let mut released = false;
        let mut locked_ticks = 0;
        for _ in 0..30 {
            let frame = controller.update(dt, &input);
            let foot = &frame.bone_transforms[bones::LEFT_FOOT];
            let world = frame.root_position + frame.root_rotation * foot.position;

            match controller.foot_locker().phase(Foot::Left) {
                FootLockPhase::Locked if !released => {
                    let anchor = *anchor.get_or_insert(world);
                    assert_relative_eq!(world, anchor, epsilon = 1e-9);
                    locked_ticks += 1;
                }
                FootLockPhase::Unlocking => released = true,
                _ => {}
            }
        }

        // The root walked away, so drift eventually released the foot.
        assert!(locked_ticks > 10);
        assert!(released);
        assert!(controller.root_position().z > 0.4);
    }

    #[test]
    fn test_idle_feet_lock_and_reset() {
        let mut controller = controller(MotionMatchingConfig::default());
        controller.update(DT, &LocomotionInput::idle());
        assert_eq!(controller.foot_locker().phase(Foot::Left), FootLockPhase::Locked);

        controller.reset_foot_locks();
        assert_eq!(controller.foot_locker().phase(Foot::Left), FootLockPhase::Free);
    }

    #[test]
    fn test_finished_clip_forces_search() {
        let mut builder = MotionDatabase::builder();
        builder
            .add_clip(AnimationClip::new("wave", 0.5, 10.0).with_looping(false))
            .unwrap();
        builder
            .add_pose(AnimationPoseData::new("wave", 0, 0.0, moving_feature(0.0)))
            .unwrap();
        let index = MotionIndex::build(Arc::new(builder.build()), FeatureWeights::default()).unwrap();
        let config = MotionMatchingConfig::default().with_min_time_between_searches(100.0);
        let mut controller = MotionMatchingController::new(Arc::new(index), config).unwrap();

        controller.update(0.125, &LocomotionInput::idle());
        assert_relative_eq!(controller.playback_time().unwrap(), 0.0);
        for _ in 0..3 {
            controller.update(0.125, &LocomotionInput::idle());
        }
        assert_relative_eq!(controller.playback_time().unwrap(), 0.375);

        // Reaching the end restarts from the matched pose.
        controller.update(0.125, &LocomotionInput::idle());
        assert_relative_eq!(controller.playback_time().unwrap(), 0.0);
    }
}
