//! The partitioner contract consumed by the scene manager
//!
//! Scene mutations are staged: callers push add/update/remove operations
//! from anywhere, and the frame-owning thread drains them with a single
//! `apply_writes` call before visibility queries run. The mutex guards the
//! staging queue only — the index structures themselves are single-threaded
//! with respect to the frame.

use std::sync::Mutex;

use thiserror::Error;

use crate::scene::{Frustum, AABB};
use crate::scene::{ActorId, GeomId, GeometryNode, LightId, ParticleSystemId};
use crate::spatial::octree::OctreeError;

/// What a staged write does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOperation {
    /// Start indexing an object
    Add,
    /// Move or resize an already indexed object
    Update,
    /// Stop indexing an object
    Remove,
}

/// The kind of scene node a staged write refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageNodeKind {
    /// A dynamic actor
    Actor,
    /// A light
    Light,
    /// Static level geometry
    Geom,
    /// A particle system
    ParticleSystem,
}

/// A typed reference to the scene node a staged write targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StageNode {
    /// A dynamic actor
    Actor(ActorId),
    /// A light
    Light(LightId),
    /// Static level geometry
    Geom(GeomId),
    /// A particle system
    ParticleSystem(ParticleSystemId),
}

impl StageNode {
    /// The kind tag of this node reference
    pub fn kind(&self) -> StageNodeKind {
        match self {
            Self::Actor(_) => StageNodeKind::Actor,
            Self::Light(_) => StageNodeKind::Light,
            Self::Geom(_) => StageNodeKind::Geom,
            Self::ParticleSystem(_) => StageNodeKind::ParticleSystem,
        }
    }
}

/// One queued scene mutation
#[derive(Debug, Clone, Copy)]
pub struct StagedWrite {
    /// What to do
    pub operation: WriteOperation,
    /// Which node to do it to
    pub node: StageNode,
    /// The node's bounds; present for adds and updates
    pub new_bounds: Option<AABB>,
}

/// Errors surfaced when staged writes are applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PartitionerError {
    /// The underlying octree rejected the write
    #[error("octree rejected staged write: {0}")]
    Octree(#[from] OctreeError),

    /// An add or update carried no bounds
    #[error("staged {operation:?} for {node:?} carried no bounds")]
    MissingBounds {
        /// The staged operation
        operation: WriteOperation,
        /// The node the write referred to
        node: StageNode,
    },
}

/// Thread-safe queue of staged writes
///
/// Writers push under the lock; the frame owner drains the whole queue in
/// FIFO order when applying.
#[derive(Debug, Default)]
pub struct StagedWriteQueue {
    writes: Mutex<Vec<StagedWrite>>,
}

impl StagedWriteQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a write for the next `apply_writes`
    pub fn push(&self, write: StagedWrite) {
        self.writes.lock().unwrap().push(write);
    }

    /// Take every queued write, oldest first
    pub fn drain(&self) -> Vec<StagedWrite> {
        std::mem::take(&mut *self.writes.lock().unwrap())
    }

    /// Number of writes waiting to be applied
    pub fn len(&self) -> usize {
        self.writes.lock().unwrap().len()
    }

    /// True when nothing is queued
    pub fn is_empty(&self) -> bool {
        self.writes.lock().unwrap().is_empty()
    }
}

/// A spatial index that answers "what is visible from this camera"
///
/// Mutations are staged through the shared queue and applied on the frame
/// edge; the visibility query runs only after writes have been applied.
pub trait Partitioner: Send + Sync {
    /// The staging queue mutations are pushed through
    fn write_queue(&self) -> &StagedWriteQueue;

    /// Apply one drained write to the underlying index
    fn apply_staged_write(&mut self, write: StagedWrite) -> Result<(), PartitionerError>;

    /// Everything potentially visible from a frustum: lights first,
    /// geometry-producing nodes second. Never fails; unknown or empty
    /// worlds yield empty lists
    fn lights_and_geometry_visible_from(
        &self,
        frustum: &Frustum,
    ) -> (Vec<LightId>, Vec<GeometryNode>);

    /// Drain the staging queue and apply every write in order
    ///
    /// Stops at the first failing write; anything staged after the failure
    /// stays applied-side untouched but is no longer queued.
    fn apply_writes(&mut self) -> Result<(), PartitionerError> {
        for write in self.write_queue().drain() {
            self.apply_staged_write(write)?;
        }
        Ok(())
    }

    /// Stage an actor addition
    fn add_actor(&self, id: ActorId, bounds: AABB) {
        self.write_queue().push(StagedWrite {
            operation: WriteOperation::Add,
            node: StageNode::Actor(id),
            new_bounds: Some(bounds),
        });
    }

    /// Stage an actor bounds update
    fn update_actor(&self, id: ActorId, bounds: AABB) {
        self.write_queue().push(StagedWrite {
            operation: WriteOperation::Update,
            node: StageNode::Actor(id),
            new_bounds: Some(bounds),
        });
    }

    /// Stage an actor removal
    fn remove_actor(&self, id: ActorId) {
        self.write_queue().push(StagedWrite {
            operation: WriteOperation::Remove,
            node: StageNode::Actor(id),
            new_bounds: None,
        });
    }

    /// Stage a light addition
    fn add_light(&self, id: LightId, bounds: AABB) {
        self.write_queue().push(StagedWrite {
            operation: WriteOperation::Add,
            node: StageNode::Light(id),
            new_bounds: Some(bounds),
        });
    }

    /// Stage a light bounds update
    fn update_light(&self, id: LightId, bounds: AABB) {
        self.write_queue().push(StagedWrite {
            operation: WriteOperation::Update,
            node: StageNode::Light(id),
            new_bounds: Some(bounds),
        });
    }

    /// Stage a light removal
    fn remove_light(&self, id: LightId) {
        self.write_queue().push(StagedWrite {
            operation: WriteOperation::Remove,
            node: StageNode::Light(id),
            new_bounds: None,
        });
    }

    /// Stage a particle system addition
    fn add_particle_system(&self, id: ParticleSystemId, bounds: AABB) {
        self.write_queue().push(StagedWrite {
            operation: WriteOperation::Add,
            node: StageNode::ParticleSystem(id),
            new_bounds: Some(bounds),
        });
    }

    /// Stage a particle system bounds update
    fn update_particle_system(&self, id: ParticleSystemId, bounds: AABB) {
        self.write_queue().push(StagedWrite {
            operation: WriteOperation::Update,
            node: StageNode::ParticleSystem(id),
            new_bounds: Some(bounds),
        });
    }

    /// Stage a particle system removal
    fn remove_particle_system(&self, id: ParticleSystemId) {
        self.write_queue().push(StagedWrite {
            operation: WriteOperation::Remove,
            node: StageNode::ParticleSystem(id),
            new_bounds: None,
        });
    }

    /// Stage a geom addition (geoms are static and never update)
    fn add_geom(&self, id: GeomId, bounds: AABB) {
        self.write_queue().push(StagedWrite {
            operation: WriteOperation::Add,
            node: StageNode::Geom(id),
            new_bounds: Some(bounds),
        });
    }

    /// Stage a geom removal
    fn remove_geom(&self, id: GeomId) {
        self.write_queue().push(StagedWrite {
            operation: WriteOperation::Remove,
            node: StageNode::Geom(id),
            new_bounds: None,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;

    #[test]
    fn test_queue_drains_in_fifo_order() {
        let queue = StagedWriteQueue::new();
        let bounds = AABB::from_center_extents(Vec3::zeros(), Vec3::new(1.0, 1.0, 1.0));

        for id in 0..3 {
            queue.push(StagedWrite {
                operation: WriteOperation::Add,
                node: StageNode::Actor(ActorId(id)),
                new_bounds: Some(bounds),
            });
        }

        assert_eq!(queue.len(), 3);
        let drained = queue.drain();
        assert!(queue.is_empty());

        let ids: Vec<StageNode> = drained.iter().map(|write| write.node).collect();
        assert_eq!(
            ids,
            vec![
                StageNode::Actor(ActorId(0)),
                StageNode::Actor(ActorId(1)),
                StageNode::Actor(ActorId(2)),
            ]
        );
    }

    #[test]
    fn test_stage_node_kind_tags() {
        assert_eq!(StageNode::Actor(ActorId(1)).kind(), StageNodeKind::Actor);
        assert_eq!(StageNode::Light(LightId(1)).kind(), StageNodeKind::Light);
        assert_eq!(StageNode::Geom(GeomId(1)).kind(), StageNodeKind::Geom);
        assert_eq!(
            StageNode::ParticleSystem(ParticleSystemId(1)).kind(),
            StageNodeKind::ParticleSystem
        );
    }
}
