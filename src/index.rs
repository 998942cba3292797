//! Balanced k-d tree over weighted feature vectors.
//!
//! [`MotionIndex::build`] encodes every pose of a [`MotionDatabase`] once and
//! partitions them around the median of a cycling split axis. The finished
//! index is immutable and can be shared across threads.
//!
//! # Search
//!
//! Queries use branch-and-bound descent: the half-space containing the query
//! is visited first, and the other half only when fewer than `k` results are
//! held or the splitting plane is closer than the worst kept result.
//!
//! With a tag filter, a node whose pose carries none of the requested tags is
//! skipped as a candidate, but both of its subtrees are still searched.
//! Pruning across such a node could drop valid tagged matches.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::config::FeatureWeights;
use crate::database::MotionDatabase;
use crate::distance::{compute_feature_costs, feature_distance, MatchResult};
use crate::error::{MotionMatchingError, Result};
use crate::feature::{encode_feature, FeatureVector, MotionFeature, FEATURE_DIM};

#[derive(Debug, Clone)]
struct KdNode {
    pose_index: usize,
    vector: FeatureVector,
    split_axis: usize,
    left: Option<usize>,
    right: Option<usize>,
}

/// Candidate kept during a search.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    node: usize,
    distance: f64,
}

/// Immutable nearest-neighbour index over a motion database.
#[derive(Debug, Clone)]
pub struct MotionIndex {
    database: Arc<MotionDatabase>,
    weights: FeatureWeights,
    nodes: Vec<KdNode>,
    root: Option<usize>,
    depth: usize,
}

impl MotionIndex {
    /// Build the index.
    ///
    /// # Errors
    ///
    /// Returns an error if the weights are invalid or any pose feature is
    /// not finite.
    pub fn build(database: Arc<MotionDatabase>, weights: FeatureWeights) -> Result<Self> {
        weights.validate()?;

        let mut encoded: Vec<(usize, FeatureVector)> = Vec::with_capacity(database.len());
        for (pose_index, pose) in database.poses().iter().enumerate() {
            pose.feature.validate()?;
            encoded.push((pose_index, encode_feature(&pose.feature, &weights)));
        }

        let mut index = Self {
            database,
            weights,
            nodes: Vec::with_capacity(encoded.len()),
            root: None,
            depth: 0,
        };
        index.root = index.build_subtree(&mut encoded, 0);

        log::debug!(
            "built motion index: {} poses, depth {}",
            index.nodes.len(),
            index.depth
        );

        Ok(index)
    }

    fn build_subtree(&mut self, items: &mut [(usize, FeatureVector)], depth: usize) -> Option<usize> {
        if items.is_empty() {
            return None;
        }
        self.depth = self.depth.max(depth + 1);

        let axis = depth % FEATURE_DIM;
        items.sort_by(|a, b| a.1[axis].total_cmp(&b.1[axis]).then(a.0.cmp(&b.0)));

        let median = items.len() / 2;
        let (pose_index, vector) = items[median];

        let node = self.nodes.len();
        self.nodes.push(KdNode {
            pose_index,
            vector,
            split_axis: axis,
            left: None,
            right: None,
        });

        let (lower, rest) = items.split_at_mut(median);
        let left = self.build_subtree(lower, depth + 1);
        let right = self.build_subtree(&mut rest[1..], depth + 1);
        self.nodes[node].left = left;
        self.nodes[node].right = right;

        Some(node)
    }

    /// Find the `k` poses nearest to `query`, in ascending distance.
    ///
    /// An empty `tags` set disables filtering. Returns an empty list when the
    /// database is empty, `k` is zero, or no pose carries a requested tag.
    ///
    /// # Errors
    ///
    /// Returns [`MotionMatchingError::DegenerateFeature`] if the query
    /// contains non-finite values.
    pub fn find_nearest(
        &self,
        query: &MotionFeature,
        k: usize,
        tags: &BTreeSet<String>,
    ) -> Result<Vec<MatchResult<'_>>> {
        query.validate()?;

        let Some(root) = self.root else {
            return Ok(Vec::new());
        };
        if k == 0 {
            return Ok(Vec::new());
        }

        let encoded = encode_feature(query, &self.weights);
        let mut results: Vec<Candidate> = Vec::with_capacity(k + 1);
        self.search(Some(root), &encoded, k, tags, &mut results);

        Ok(results
            .into_iter()
            .map(|candidate| {
                let node = &self.nodes[candidate.node];
                MatchResult {
                    pose: &self.database.poses()[node.pose_index],
                    pose_index: node.pose_index,
                    cost: candidate.distance,
                    feature_costs: compute_feature_costs(&encoded, &node.vector),
                }
            })
            .collect())
    }

    fn search(
        &self,
        node: Option<usize>,
        query: &FeatureVector,
        k: usize,
        tags: &BTreeSet<String>,
        results: &mut Vec<Candidate>,
    ) {
        let Some(node_id) = node else {
            return;
        };
        let node = &self.nodes[node_id];

        let pose = &self.database.poses()[node.pose_index];
        if !pose.feature.matches_tags(tags) {
            self.search(node.left, query, k, tags, results);
            self.search(node.right, query, k, tags, results);
            return;
        }

        let distance = feature_distance(query, &node.vector);
        insert_candidate(
            results,
            Candidate {
                node: node_id,
                distance,
            },
            k,
        );

        let diff = query[node.split_axis] - node.vector[node.split_axis];
        let (near, far) = if diff < 0.0 {
            (node.left, node.right)
        } else {
            (node.right, node.left)
        };

        self.search(near, query, k, tags, results);

        let worst = results.last().map_or(f64::INFINITY, |c| c.distance);
        if results.len() < k || diff.abs() < worst {
            self.search(far, query, k, tags, results);
        }
    }

    /// Number of indexed poses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the index holds no poses.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Depth of the tree (0 when empty).
    #[must_use]
    pub const fn depth(&self) -> usize {
        self.depth
    }

    /// Weights the index was built with.
    #[must_use]
    pub const fn weights(&self) -> &FeatureWeights {
        &self.weights
    }

    /// The indexed database.
    #[must_use]
    pub fn database(&self) -> &Arc<MotionDatabase> {
        &self.database
    }
}

/// Insert into an ascending list capped at `k`. Ties keep the earlier entry first.
fn insert_candidate(results: &mut Vec<Candidate>, candidate: Candidate, k: usize) {
    if results.len() >= k {
        match results.last() {
            Some(worst) if candidate.distance < worst.distance => {
                results.pop();
            }
            _ => return,
        }
    }
    let position = results.partition_point(|c| c.distance <= candidate.distance);
    results.insert(position, candidate);
}
