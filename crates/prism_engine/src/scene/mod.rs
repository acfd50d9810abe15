//! Scene-facing types for the partitioning subsystem
//!
//! Bounding volumes, cameras, object identifiers, mesh geometry data and
//! the scene manager that ties the partitioner to the rest of an engine.

mod bounds;
mod camera;
mod geometry;
mod objects;
mod scene_manager;

pub use bounds::{Frustum, Plane, AABB};
pub use camera::Camera;
pub use geometry::{MaterialId, MeshData, SubMesh};
pub use objects::{ActorId, CameraId, GeomId, GeometryNode, LightId, ParticleSystemId};
pub use scene_manager::SceneManager;
