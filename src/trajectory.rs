//! Short-horizon trajectory prediction.
//!
//! [`TrajectoryPredictor`] forward-simulates the root with bounded
//! acceleration and turn rate, producing the trajectory half of the query
//! feature.

use nalgebra::{Vector2, Vector3};

use crate::config::MotionMatchingConfig;
use crate::feature::{TrajectoryPoint, TRAJECTORY_POINTS};
use crate::math::{facing_from_yaw, normalize_or};

/// Default linear acceleration toward the desired velocity (units/s²).
pub const DEFAULT_ACCELERATION: f64 = 10.0;

/// Default turn speed toward the desired facing (per second).
pub const DEFAULT_TURN_SPEED: f64 = 5.0;

/// Input magnitude below which the current facing is held.
pub const INPUT_DEADZONE: f64 = 0.1;

/// Velocity differences smaller than this are left alone.
const VELOCITY_EPS: f64 = 0.01;

/// Facing used when no direction can be derived.
fn forward() -> Vector2<f64> {
    Vector2::new(0.0, 1.0)
}

/// Forward-Euler trajectory predictor.
#[derive(Debug, Clone, PartialEq)]
pub struct TrajectoryPredictor {
    /// Time horizon covered by the prediction.
    pub prediction_time: f64,
    /// Number of predicted points.
    pub point_count: usize,
    /// Maximum change of velocity per second.
    pub acceleration: f64,
    /// Maximum change of the facing vector per second.
    pub turn_speed: f64,
}

impl Default for TrajectoryPredictor {
    fn default() -> Self {
        Self::new(1.0, TRAJECTORY_POINTS)
    }
}

impl TrajectoryPredictor {
    /// Create a predictor with default acceleration and turn speed.
    #[must_use]
    pub const fn new(prediction_time: f64, point_count: usize) -> Self {
        Self {
            prediction_time,
            point_count,
            acceleration: DEFAULT_ACCELERATION,
            turn_speed: DEFAULT_TURN_SPEED,
        }
    }

    /// Create a predictor matching a controller configuration.
    #[must_use]
    pub const fn from_config(config: &MotionMatchingConfig) -> Self {
        Self::new(config.trajectory_prediction_time, config.trajectory_point_count)
    }

    /// Set acceleration and turn speed.
    #[must_use]
    pub const fn with_limits(mut self, acceleration: f64, turn_speed: f64) -> Self {
        self.acceleration = acceleration;
        self.turn_speed = turn_speed;
        self
    }

    /// Time between two predicted points.
    #[must_use]
    pub fn step(&self) -> f64 {
        if self.point_count == 0 {
            return 0.0;
        }
        self.prediction_time / self.point_count as f64
    }

    /// Predict `point_count` evenly spaced future samples.
    ///
    /// Each step moves the velocity toward `desired_velocity` by at most
    /// `acceleration * dt` without overshooting, integrates the position
    /// with the new velocity, and turns the facing toward `desired_facing`
    /// by at most `turn_speed * dt`. Every returned facing is unit length.
    #[must_use]
    pub fn predict(
        &self,
        current_position: &Vector3<f64>,
        current_velocity: &Vector3<f64>,
        current_facing: &Vector2<f64>,
        desired_velocity: &Vector3<f64>,
        desired_facing: &Vector2<f64>,
    ) -> Vec<TrajectoryPoint> {
        let dt = self.step();
        let max_dv = self.acceleration * dt;
        let max_turn = self.turn_speed * dt;

        let mut position = *current_position;
        let mut velocity = *current_velocity;
        let mut facing = normalize_or(current_facing, forward());
        let target_facing = normalize_or(desired_facing, facing);

        let mut points = Vec::with_capacity(self.point_count);
        for i in 0..self.point_count {
            let dv = desired_velocity - velocity;
            let dv_len = dv.norm();
            if dv_len > VELOCITY_EPS {
                velocity += dv * (max_dv.min(dv_len) / dv_len);
            }

            position += velocity * dt;

            let mut turn = target_facing - facing;
            let turn_len = turn.norm();
            if turn_len > max_turn {
                turn *= max_turn / turn_len;
            }
            facing = normalize_or(&(facing + turn), facing);

            points.push(TrajectoryPoint::new(position, facing, (i + 1) as f64 * dt));
        }

        points
    }

    /// Predict from a 2D stick input.
    ///
    /// The input direction maps to the XZ plane (`x → x`, `y → z`). Below
    /// [`INPUT_DEADZONE`] the desired facing is the current yaw's facing, so
    /// a released stick never collapses the facing toward zero.
    #[must_use]
    pub fn predict_from_input(
        &self,
        current_position: &Vector3<f64>,
        current_velocity: &Vector3<f64>,
        current_yaw: f64,
        input_direction: &Vector2<f64>,
        input_magnitude: f64,
        max_speed: f64,
    ) -> Vec<TrajectoryPoint> {
        let scale = input_magnitude * max_speed;
        let desired_velocity = Vector3::new(input_direction.x * scale, 0.0, input_direction.y * scale);

        let current_facing = facing_from_yaw(current_yaw);
        let desired_facing = if input_magnitude > INPUT_DEADZONE {
            normalize_or(input_direction, current_facing)
        } else {
            current_facing
        };

        self.predict(
            current_position,
            current_velocity,
            &current_facing,
            &desired_velocity,
            &desired_facing,
        )
    }
}
