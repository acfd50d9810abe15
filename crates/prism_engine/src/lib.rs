//! # Prism Engine
//!
//! Spatial partitioning and visibility culling for 3D scenes.
//!
//! Every frame, an engine needs to answer "which objects are potentially
//! visible from this camera" without testing the whole scene. Prism
//! provides the pieces that answer it:
//!
//! - **Dynamic octree**: a sparse, hash-addressed octree over moving
//!   actors, lights and particle systems with policy-driven subdivision
//! - **Hierarchical spatial hash**: an alternative broad-phase index with
//!   different memory/query trade-offs
//! - **Static geometry octree**: per-mesh triangle bucketing by material
//!   for frustum-limited render-list generation
//! - **Partitioner contract**: staged add/update/remove writes and a
//!   per-camera visibility query, implemented by both broad phases
//!
//! ## Quick Start
//!
//! ```rust
//! use prism_engine::prelude::*;
//!
//! let config = CullingConfig::default();
//! let mut scene = SceneManager::new(config.create_partitioner());
//!
//! scene.add_actor(
//!     ActorId(1),
//!     AABB::from_center_extents(Vec3::zeros(), Vec3::new(10.0, 10.0, 10.0)),
//! );
//! scene.apply_writes()?;
//!
//! let mut camera = Camera::perspective(std::f32::consts::FRAC_PI_2, 16.0 / 9.0, 0.1, 100.0);
//! camera.look_at(Vec3::new(0.0, 0.0, 30.0), Vec3::zeros(), Vec3::new(0.0, 1.0, 0.0));
//! let camera_id = scene.add_camera(camera);
//!
//! let (_lights, geometry) = scene.visible_lights_and_geometry(camera_id);
//! assert!(geometry.contains(&GeometryNode::Actor(ActorId(1))));
//! # Ok::<(), prism_engine::spatial::PartitionerError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod foundation;
pub mod scene;
pub mod spatial;

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        config::{Config, CullingConfig, PartitionerKind},
        foundation::math::{Mat4, Mat4Ext, Vec3},
        scene::{
            ActorId, Camera, CameraId, Frustum, GeomId, GeometryNode, LightId, MaterialId,
            MeshData, ParticleSystemId, SceneManager, SubMesh, AABB,
        },
        spatial::{GeomCuller, OctreePartitioner, Partitioner, SpatialHashPartitioner},
    };
}
