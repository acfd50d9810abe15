//! Scene object identifiers
//!
//! The partitioning subsystem never owns scene objects; it indexes them by
//! stable identifier and cached bounding volume. Identifiers are plain
//! newtypes handed out by whatever object model sits above this crate.

/// Identifier for an actor (a renderable, movable scene object)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ActorId(pub u32);

/// Identifier for a light
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LightId(pub u32);

/// Identifier for a particle system
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ParticleSystemId(pub u32);

/// Identifier for a geom (a chunk of static level geometry)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GeomId(pub u32);

/// Identifier for a camera registered with the scene manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CameraId(pub u32);

/// A geometry-producing scene node returned from visibility queries
///
/// Lights are reported separately; everything else that can put triangles
/// on screen is one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GeometryNode {
    /// A dynamic actor
    Actor(ActorId),
    /// A particle system
    ParticleSystem(ParticleSystemId),
    /// Static level geometry
    Geom(GeomId),
}
