//! Spatial-hash-backed partitioner
//!
//! The alternative broad phase: every staged object becomes an entry in the
//! hierarchical spatial hash. Entries are owned here, keyed by their stage
//! node, and the hash itself only ever sees ids — removing an object always
//! tears its entry down before it is dropped.

use std::collections::HashMap;

use log::warn;

use crate::scene::{Frustum, AABB};
use crate::scene::{GeometryNode, LightId};
use crate::spatial::partitioner::{
    Partitioner, PartitionerError, StageNode, StagedWrite, StagedWriteQueue, WriteOperation,
};
use crate::spatial::spatial_hash::{SpatialHash, SpatialHashEntry};

/// Partitioner implementation over the hierarchical spatial hash
#[derive(Debug, Default)]
pub struct SpatialHashPartitioner {
    hash: SpatialHash<StageNode>,
    entries: HashMap<StageNode, SpatialHashEntry>,
    staged: StagedWriteQueue,
}

impl SpatialHashPartitioner {
    /// Create an empty spatial hash partitioner
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of objects currently indexed
    pub fn object_count(&self) -> usize {
        self.entries.len()
    }

    fn add(&mut self, node: StageNode, bounds: AABB) {
        let entry = self.entries.entry(node).or_default();
        self.hash.insert_object_for_box(bounds, node, entry);
    }

    fn update(&mut self, node: StageNode, bounds: AABB) {
        match self.entries.get_mut(&node) {
            Some(entry) => self.hash.update_object_for_box(bounds, node, entry),
            None => warn!("ignoring update for unknown object {node:?}"),
        }
    }

    fn remove(&mut self, node: StageNode) {
        if let Some(mut entry) = self.entries.remove(&node) {
            self.hash.remove_object(node, &mut entry);
        }
    }
}

impl Partitioner for SpatialHashPartitioner {
    fn write_queue(&self) -> &StagedWriteQueue {
        &self.staged
    }

    fn apply_staged_write(&mut self, write: StagedWrite) -> Result<(), PartitionerError> {
        let bounds = || {
            write.new_bounds.ok_or(PartitionerError::MissingBounds {
                operation: write.operation,
                node: write.node,
            })
        };

        match write.operation {
            WriteOperation::Add => self.add(write.node, bounds()?),
            WriteOperation::Update => self.update(write.node, bounds()?),
            WriteOperation::Remove => self.remove(write.node),
        }

        Ok(())
    }

    fn lights_and_geometry_visible_from(
        &self,
        frustum: &Frustum,
    ) -> (Vec<LightId>, Vec<GeometryNode>) {
        let visible = self.hash.find_objects_within_frustum(frustum, |node| {
            self.entries
                .get(node)
                .and_then(|entry| entry.hash_aabb().copied())
        });

        let mut lights = Vec::new();
        let mut geometry = Vec::new();
        for node in visible {
            match node {
                StageNode::Light(id) => lights.push(id),
                StageNode::Actor(id) => geometry.push(GeometryNode::Actor(id)),
                StageNode::ParticleSystem(id) => geometry.push(GeometryNode::ParticleSystem(id)),
                StageNode::Geom(id) => geometry.push(GeometryNode::Geom(id)),
            }
        }

        (lights, geometry)
    }
}
