//! Scene Manager - owns the partitioner and the camera registry
//!
//! The bridge between the object model above this crate and the spatial
//! index below it: scene mutations are forwarded to the partitioner's
//! staging queue, flushed once per frame, and visibility queries are issued
//! by camera id. The resulting identifier lists feed whatever render-queue
//! builder the application uses.

use std::collections::HashMap;

use log::{debug, trace};

use crate::scene::camera::Camera;
use crate::scene::bounds::AABB;
use crate::scene::objects::{ActorId, CameraId, GeomId, GeometryNode, LightId, ParticleSystemId};
use crate::spatial::partitioner::{Partitioner, PartitionerError};

/// Coordinates staged scene writes and per-camera visibility queries
pub struct SceneManager {
    partitioner: Box<dyn Partitioner>,
    cameras: HashMap<CameraId, Camera>,
    next_camera_id: u32,
}

impl SceneManager {
    /// Create a scene manager around a partitioner implementation
    pub fn new(partitioner: Box<dyn Partitioner>) -> Self {
        Self {
            partitioner,
            cameras: HashMap::new(),
            next_camera_id: 0,
        }
    }

    /// Register a camera and get its id
    pub fn add_camera(&mut self, camera: Camera) -> CameraId {
        let id = CameraId(self.next_camera_id);
        self.next_camera_id += 1;
        self.cameras.insert(id, camera);
        debug!("registered camera {id:?}");
        id
    }

    /// Look up a registered camera
    pub fn camera(&self, id: CameraId) -> Option<&Camera> {
        self.cameras.get(&id)
    }

    /// Mutable access to a registered camera
    pub fn camera_mut(&mut self, id: CameraId) -> Option<&mut Camera> {
        self.cameras.get_mut(&id)
    }

    /// Unregister a camera
    pub fn remove_camera(&mut self, id: CameraId) {
        self.cameras.remove(&id);
    }

    /// The partitioner behind this manager
    pub fn partitioner(&self) -> &dyn Partitioner {
        self.partitioner.as_ref()
    }

    /// Stage an actor addition
    pub fn add_actor(&self, id: ActorId, bounds: AABB) {
        self.partitioner.add_actor(id, bounds);
    }

    /// Stage an actor bounds update
    pub fn update_actor(&self, id: ActorId, bounds: AABB) {
        self.partitioner.update_actor(id, bounds);
    }

    /// Stage an actor removal
    pub fn remove_actor(&self, id: ActorId) {
        self.partitioner.remove_actor(id);
    }

    /// Stage a light addition
    pub fn add_light(&self, id: LightId, bounds: AABB) {
        self.partitioner.add_light(id, bounds);
    }

    /// Stage a light bounds update
    pub fn update_light(&self, id: LightId, bounds: AABB) {
        self.partitioner.update_light(id, bounds);
    }

    /// Stage a light removal
    pub fn remove_light(&self, id: LightId) {
        self.partitioner.remove_light(id);
    }

    /// Stage a particle system addition
    pub fn add_particle_system(&self, id: ParticleSystemId, bounds: AABB) {
        self.partitioner.add_particle_system(id, bounds);
    }

    /// Stage a particle system bounds update
    pub fn update_particle_system(&self, id: ParticleSystemId, bounds: AABB) {
        self.partitioner.update_particle_system(id, bounds);
    }

    /// Stage a particle system removal
    pub fn remove_particle_system(&self, id: ParticleSystemId) {
        self.partitioner.remove_particle_system(id);
    }

    /// Stage a geom addition
    pub fn add_geom(&self, id: GeomId, bounds: AABB) {
        self.partitioner.add_geom(id, bounds);
    }

    /// Stage a geom removal
    pub fn remove_geom(&self, id: GeomId) {
        self.partitioner.remove_geom(id);
    }

    /// Flush every staged write into the index (call once per frame,
    /// before issuing visibility queries)
    pub fn apply_writes(&mut self) -> Result<(), PartitionerError> {
        self.partitioner.apply_writes()
    }

    /// Everything potentially visible from a camera
    ///
    /// Unknown camera ids yield empty lists; visibility queries never fail.
    pub fn visible_lights_and_geometry(
        &self,
        camera_id: CameraId,
    ) -> (Vec<LightId>, Vec<GeometryNode>) {
        let Some(camera) = self.cameras.get(&camera_id) else {
            trace!("visibility query for unknown camera {camera_id:?}");
            return (Vec::new(), Vec::new());
        };

        self.partitioner
            .lights_and_geometry_visible_from(camera.frustum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use crate::spatial::hash_partitioner::SpatialHashPartitioner;
    use crate::spatial::octree_partitioner::OctreePartitioner;

    fn origin_camera() -> Camera {
        let mut camera = Camera::perspective(std::f32::consts::FRAC_PI_2, 1.0, 0.1, 200.0);
        camera.look_at(Vec3::new(0.0, 0.0, 40.0), Vec3::zeros(), Vec3::new(0.0, 1.0, 0.0));
        camera
    }

    fn build_scene(manager: &mut SceneManager) -> CameraId {
        manager.add_actor(
            ActorId(1),
            AABB::from_center_extents(Vec3::zeros(), Vec3::new(20.0, 20.0, 20.0)),
        );
        manager.add_light(
            LightId(1),
            AABB::from_center_extents(Vec3::new(2.0, 2.0, 0.0), Vec3::new(1.0, 1.0, 1.0)),
        );
        manager.apply_writes().unwrap();
        manager.add_camera(origin_camera())
    }

    #[test]
    fn test_visibility_by_camera_id_with_either_partitioner() {
        for partitioner in [
            Box::new(OctreePartitioner::new()) as Box<dyn Partitioner>,
            Box::new(SpatialHashPartitioner::new()) as Box<dyn Partitioner>,
        ] {
            let mut manager = SceneManager::new(partitioner);
            let camera_id = build_scene(&mut manager);

            let (lights, geometry) = manager.visible_lights_and_geometry(camera_id);
            assert_eq!(lights, vec![LightId(1)]);
            assert!(geometry.contains(&GeometryNode::Actor(ActorId(1))));
        }
    }

    #[test]
    fn test_unknown_camera_yields_empty_results() {
        let mut manager = SceneManager::new(Box::new(SpatialHashPartitioner::new()));
        build_scene(&mut manager);

        let (lights, geometry) = manager.visible_lights_and_geometry(CameraId(99));
        assert!(lights.is_empty());
        assert!(geometry.is_empty());
    }
}
