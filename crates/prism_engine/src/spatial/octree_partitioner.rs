//! Octree-backed partitioner
//!
//! Routes staged writes into the dynamic octree and answers visibility
//! queries by walking the tree against the camera frustum. Geoms are not
//! indexed by the octree; they are tracked in a side set and always
//! reported visible.

use std::collections::HashSet;

use log::warn;

use crate::scene::Frustum;
use crate::scene::{GeomId, GeometryNode, LightId};
use crate::spatial::octree::Octree;
use crate::spatial::partitioner::{
    Partitioner, PartitionerError, StageNode, StagedWrite, StagedWriteQueue, WriteOperation,
};

/// Partitioner implementation over the dynamic sparse octree
#[derive(Debug, Default)]
pub struct OctreePartitioner {
    octree: Octree,
    geoms: HashSet<GeomId>,
    staged: StagedWriteQueue,
}

impl OctreePartitioner {
    /// Create a partitioner with a default octree
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a partitioner around an already configured octree
    pub fn with_octree(octree: Octree) -> Self {
        Self {
            octree,
            geoms: HashSet::new(),
            staged: StagedWriteQueue::new(),
        }
    }

    /// The underlying octree
    pub fn octree(&self) -> &Octree {
        &self.octree
    }
}

impl Partitioner for OctreePartitioner {
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

        match (write.operation, write.node) {
            (WriteOperation::Add, StageNode::Actor(id)) => {
                self.octree.insert_actor(id, bounds()?)?;
            }
            (WriteOperation::Update, StageNode::Actor(id)) => {
                // The octree has no in-place move; re-file from scratch
                self.octree.remove_actor(id);
                self.octree.insert_actor(id, bounds()?)?;
            }
            (WriteOperation::Remove, StageNode::Actor(id)) => {
                self.octree.remove_actor(id);
            }
            (WriteOperation::Add, StageNode::Light(id)) => {
                self.octree.insert_light(id, bounds()?)?;
            }
            (WriteOperation::Update, StageNode::Light(id)) => {
                self.octree.remove_light(id);
                self.octree.insert_light(id, bounds()?)?;
            }
            (WriteOperation::Remove, StageNode::Light(id)) => {
                self.octree.remove_light(id);
            }
            (WriteOperation::Add, StageNode::ParticleSystem(id)) => {
                self.octree.insert_particle_system(id, bounds()?)?;
            }
            (WriteOperation::Update, StageNode::ParticleSystem(id)) => {
                self.octree.remove_particle_system(id);
                self.octree.insert_particle_system(id, bounds()?)?;
            }
            (WriteOperation::Remove, StageNode::ParticleSystem(id)) => {
                self.octree.remove_particle_system(id);
            }
            (WriteOperation::Add, StageNode::Geom(id)) => {
                self.geoms.insert(id);
            }
            (WriteOperation::Remove, StageNode::Geom(id)) => {
                self.geoms.remove(&id);
            }
            (WriteOperation::Update, StageNode::Geom(id)) => {
                // Geoms are static; an update is a caller mistake but not
                // worth failing the frame over
                warn!("ignoring update for static geom {id:?}");
            }
        }

        Ok(())
    }

    fn lights_and_geometry_visible_from(
        &self,
        frustum: &Frustum,
    ) -> (Vec<LightId>, Vec<GeometryNode>) {
        let mut lights = Vec::new();
        let mut geometry = Vec::new();

        self.octree.traverse_visible(frustum, &mut |node| {
            let data = node.data();
            lights.extend(data.lights.keys().copied());
            geometry.extend(data.actors.keys().map(|id| GeometryNode::Actor(*id)));
            geometry.extend(
                data.particle_systems
                    .keys()
                    .map(|id| GeometryNode::ParticleSystem(*id)),
            );
        });

        // Geoms sit outside the octree and are always candidates; the
        // per-geom culler narrows them down afterwards
        geometry.extend(self.geoms.iter().map(|id| GeometryNode::Geom(*id)));

        (lights, geometry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Mat4, Mat4Ext, Vec3};
    use crate::scene::AABB;
    use crate::scene::{ActorId, ParticleSystemId};

    fn world_bounds() -> AABB {
        AABB::from_center_extents(Vec3::zeros(), Vec3::new(50.0, 50.0, 50.0))
    }

    fn looking_at_origin() -> Frustum {
        let proj = Mat4::perspective(std::f32::consts::FRAC_PI_2, 1.0, 0.1, 200.0);
        let view = Mat4::look_at(
            Vec3::new(0.0, 0.0, 40.0),
            Vec3::zeros(),
            Vec3::new(0.0, 1.0, 0.0),
        );
        Frustum::from_matrix(&(proj * view))
    }

    #[test]
    fn test_writes_are_invisible_until_applied() {
        let mut partitioner = OctreePartitioner::new();
        partitioner.add_actor(ActorId(0), world_bounds());
        partitioner.add_light(
            LightId(1),
            AABB::from_center_extents(Vec3::zeros(), Vec3::new(2.0, 2.0, 2.0)),
        );

        let (lights, geometry) = partitioner.lights_and_geometry_visible_from(&looking_at_origin());
        assert!(lights.is_empty());
        assert!(geometry.is_empty());

        partitioner.apply_writes().unwrap();

        let (lights, geometry) = partitioner.lights_and_geometry_visible_from(&looking_at_origin());
        assert_eq!(lights, vec![LightId(1)]);
        assert!(geometry.contains(&GeometryNode::Actor(ActorId(0))));
    }

    #[test]
    fn test_update_moves_an_actor_out_of_view() {
        let mut partitioner = OctreePartitioner::new();
        partitioner.add_actor(ActorId(0), world_bounds());
        partitioner.add_actor(
            ActorId(1),
            AABB::from_center_extents(Vec3::zeros(), Vec3::new(1.0, 1.0, 1.0)),
        );
        partitioner.apply_writes().unwrap();

        // Move the small actor behind the camera
        partitioner.update_actor(
            ActorId(1),
            AABB::from_center_extents(Vec3::new(0.0, 0.0, 45.0), Vec3::new(1.0, 1.0, 1.0)),
        );
        partitioner.apply_writes().unwrap();

        let (_, geometry) = partitioner.lights_and_geometry_visible_from(&looking_at_origin());
        assert!(!geometry.contains(&GeometryNode::Actor(ActorId(1))));
    }

    #[test]
    fn test_remove_takes_objects_out_of_results() {
        let mut partitioner = OctreePartitioner::new();
        partitioner.add_actor(ActorId(0), world_bounds());
        partitioner.add_particle_system(
            ParticleSystemId(5),
            AABB::from_center_extents(Vec3::new(1.0, 1.0, 1.0), Vec3::new(0.5, 0.5, 0.5)),
        );
        partitioner.apply_writes().unwrap();

        partitioner.remove_particle_system(ParticleSystemId(5));
        partitioner.apply_writes().unwrap();

        let (_, geometry) = partitioner.lights_and_geometry_visible_from(&looking_at_origin());
        assert!(!geometry.contains(&GeometryNode::ParticleSystem(ParticleSystemId(5))));
    }

    #[test]
    fn test_geoms_are_always_candidates() {
        let mut partitioner = OctreePartitioner::new();
        partitioner.add_geom(GeomId(3), world_bounds());
        partitioner.apply_writes().unwrap();

        let (_, geometry) = partitioner.lights_and_geometry_visible_from(&looking_at_origin());
        assert_eq!(geometry, vec![GeometryNode::Geom(GeomId(3))]);
    }

    #[test]
    fn test_failed_write_surfaces_to_caller() {
        let mut partitioner = OctreePartitioner::new();
        partitioner.add_actor(
            ActorId(0),
            AABB::from_center_extents(Vec3::zeros(), Vec3::new(1.0, 1.0, 1.0)),
        );
        partitioner.apply_writes().unwrap();

        // Second actor does not fit the root volume fixed by the first
        partitioner.add_actor(ActorId(1), world_bounds());
        assert!(partitioner.apply_writes().is_err());
    }
}
