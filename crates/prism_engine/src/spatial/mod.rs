//! Spatial partitioning and visibility culling
//!
//! The broad phase of rendering: every frame the engine asks "which
//! objects are potentially visible from this camera" and these structures
//! answer without testing the whole scene. Two interchangeable partitioner
//! implementations cover moving objects — a dynamic sparse octree and a
//! hierarchical spatial hash — while the static geometry octree culls
//! within a single compiled mesh.

pub mod geom_culler;
pub mod hash_key;
pub mod hash_partitioner;
pub mod octree;
pub mod octree_partitioner;
pub mod partitioner;
pub mod spatial_hash;

pub use geom_culler::{CullerNode, CullerOctree, GeomCuller, GeomRenderable};
pub use hash_key::{make_hash, make_key, GridHash, Key};
pub use hash_partitioner::SpatialHashPartitioner;
pub use octree::{
    AlwaysSplitMerge, Octree, OctreeError, OctreeNode, OctreeNodeKey, SplitMergePolicy,
};
pub use octree_partitioner::OctreePartitioner;
pub use partitioner::{
    Partitioner, PartitionerError, StageNode, StageNodeKind, StagedWrite, StagedWriteQueue,
    WriteOperation,
};
pub use spatial_hash::{SpatialHash, SpatialHashEntry};
