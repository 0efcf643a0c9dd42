//! Spatial indexing for neighbor candidate queries.
//!
//! The index only narrows which pairs the engine visits. Every rule still
//! recomputes the exact distance, and candidates are returned in ascending
//! index order, so results match the all-pairs path bit for bit.

use glam::Vec3;
use kdtree::distance::squared_euclidean;
use kdtree::{ErrorKind as KdTreeError, KdTree};

use super::agent::AgentPool;

/// Type alias for the 3D k-d tree over agent positions.
pub type Tree3D = KdTree<f32, usize, [f32; 3]>;

/// Relative padding on query radii so float rounding never drops a pair the
/// exact distance test would accept.
const RADIUS_PADDING: f32 = 1.0e-4;

/// K-d tree over the positions of one tick.
pub struct SpatialIndex {
    tree: Tree3D,
}

impl SpatialIndex {
    /// Builds an index over every agent position.
    ///
    /// # Returns
    ///
    /// The index, or an error if a position is non-finite.
    pub fn build(agents: &AgentPool) -> Result<Self, KdTreeError> {
        let mut tree = KdTree::with_capacity(3, agents.len().max(1));
        for (index, agent) in agents.iter().enumerate() {
            tree.add(agent.position.to_array(), index)?;
        }
        Ok(Self { tree })
    }

    /// Indices of agents within `radius` of `pos`, sorted ascending, excluding `skip`.
    ///
    /// # Arguments
    ///
    /// * `pos` - Center position for the query
    /// * `radius` - Search radius (squared and padded internally)
    /// * `skip` - Index to leave out, usually the querying agent
    pub fn neighbors(&self, pos: Vec3, radius: f32, skip: usize) -> Vec<usize> {
        let padded = radius * (1.0 + RADIUS_PADDING) + RADIUS_PADDING;
        let mut found: Vec<usize> = self
            .tree
            .within(&pos.to_array(), padded * padded, &squared_euclidean)
            .unwrap_or_default()
            .into_iter()
            .map(|(_, &index)| index)
            .filter(|&index| index != skip)
            .collect();
        found.sort_unstable();
        found
    }
}
