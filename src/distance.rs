//! Distance and cost functions for encoded feature vectors.
//!
//! This module provides the weighted Euclidean metric used by the index,
//! the per-band [`FeatureCosts`] breakdown, and [`linear_search`], a
//! brute-force ranking with the same contract as
//! [`MotionIndex::find_nearest`](crate::MotionIndex::find_nearest).

use std::collections::BTreeSet;
use std::ops::Range;

use crate::config::FeatureWeights;
use crate::database::{AnimationPoseData, MotionDatabase};
use crate::error::Result;
use crate::feature::{
    encode_feature, FeatureVector, MotionFeature, POSE_BAND, TRAJECTORY_BAND, VELOCITY_BAND,
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Cost breakdown between a query and a candidate, per feature band.
///
/// Each band is the square root of that band's sum of squared differences,
/// so `total² = pose² + velocity² + trajectory²`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FeatureCosts {
    /// Position channels (feet, hands, hip).
    pub pose: f64,
    /// Velocity channels (feet, hip, root, yaw rate).
    pub velocity: f64,
    /// Trajectory positions and facings.
    pub trajectory: f64,
    /// Full weighted Euclidean distance.
    pub total: f64,
}

/// A single nearest-neighbour result.
#[derive(Debug, Clone, Copy)]
pub struct MatchResult<'a> {
    /// The matched pose.
    pub pose: &'a AnimationPoseData,
    /// Index of the pose in its database.
    pub pose_index: usize,
    /// Weighted Euclidean distance to the query.
    pub cost: f64,
    /// Per-band cost breakdown.
    pub feature_costs: FeatureCosts,
}

#[inline]
fn band_squared(a: &FeatureVector, b: &FeatureVector, band: Range<usize>) -> f64 {
    a[band.clone()]
        .iter()
        .zip(b[band].iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum()
}

/// Squared weighted Euclidean distance between two encoded vectors.
#[must_use]
pub fn squared_distance(a: &FeatureVector, b: &FeatureVector) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Weighted Euclidean distance between two encoded vectors.
#[must_use]
pub fn feature_distance(a: &FeatureVector, b: &FeatureVector) -> f64 {
    squared_distance(a, b).sqrt()
}

/// Compute the per-band cost breakdown between two encoded vectors.
#[must_use]
pub fn compute_feature_costs(query: &FeatureVector, target: &FeatureVector) -> FeatureCosts {
    let pose = band_squared(query, target, POSE_BAND);
    let velocity = band_squared(query, target, VELOCITY_BAND);
    let trajectory = band_squared(query, target, TRAJECTORY_BAND);

    FeatureCosts {
        pose: pose.sqrt(),
        velocity: velocity.sqrt(),
        trajectory: trajectory.sqrt(),
        total: (pose + velocity + trajectory).sqrt(),
    }
}

/// Rank every pose in `database` against `query` by brute force.
///
/// Returns at most `k` results in ascending distance, honouring the same
/// tag filter as the index. Equal distances keep database order.
///
/// # Errors
///
/// Returns [`DegenerateFeature`](crate::MotionMatchingError::DegenerateFeature)
/// if the query contains non-finite values.
pub fn linear_search<'a>(
    database: &'a MotionDatabase,
    weights: &FeatureWeights,
    query: &MotionFeature,
    k: usize,
    tags: &BTreeSet<String>,
) -> Result<Vec<MatchResult<'a>>> {
    query.validate()?;
    let encoded_query = encode_feature(query, weights);

    let mut ranked: Vec<MatchResult<'a>> = database
        .poses()
        .iter()
        .enumerate()
        .filter(|(_, pose)| pose.feature.matches_tags(tags))
        .map(|(pose_index, pose)| {
            let encoded = encode_feature(&pose.feature, weights);
            MatchResult {
                pose,
                pose_index,
                cost: feature_distance(&encoded_query, &encoded),
                feature_costs: compute_feature_costs(&encoded_query, &encoded),
            }
        })
        .collect();

    ranked.sort_by(|a, b| a.cost.total_cmp(&b.cost));
    ranked.truncate(k);
    Ok(ranked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::FEATURE_DIM;
    use approx::assert_relative_eq;

    fn vector_with(index: usize, value: f64) -> FeatureVector {
        let mut v = [0.0; FEATURE_DIM];
        v[index] = value;
        v
    }

    #[test]
    fn test_self_distance_zero() {
        let v = vector_with(4, 2.5);
        assert_relative_eq!(feature_distance(&v, &v), 0.0);
    }

    #[test]
    fn test_distance_symmetry() {
        let a = vector_with(3, 1.0);
        let b = vector_with(40, -2.0);
        assert_relative_eq!(feature_distance(&a, &b), feature_distance(&b, &a));
        assert_relative_eq!(feature_distance(&a, &b), 5.0_f64.sqrt());
    }

    #[test]
    fn test_costs_split_by_band() {
        let zero = [0.0; FEATURE_DIM];
        let mut target = [0.0; FEATURE_DIM];
        target[1] = 3.0; // pose
        target[20] = 4.0; // velocity
        target[27] = 12.0; // yaw rate, still velocity
        target[50] = 5.0; // trajectory

        let costs = compute_feature_costs(&zero, &target);
        assert_relative_eq!(costs.pose, 3.0);
        assert_relative_eq!(costs.velocity, (16.0_f64 + 144.0).sqrt());
        assert_relative_eq!(costs.trajectory, 5.0);
        assert_relative_eq!(
            costs.total * costs.total,
            costs.pose.powi(2) + costs.velocity.powi(2) + costs.trajectory.powi(2),
            epsilon = 1e-9
        );
        assert_relative_eq!(costs.total, feature_distance(&zero, &target));
    }
}
