//! Mesh geometry data consumed by the static geometry culler
//!
//! A deliberately small data model: vertex positions plus per-material
//! triangle index lists. Loaders and GPU upload live elsewhere; the culler
//! only needs positions to bucket triangles and indices to emit batches.

use crate::foundation::math::Vec3;
use crate::scene::bounds::AABB;

/// Identifier for a material
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MaterialId(pub u32);

/// A run of triangles sharing one material
#[derive(Debug, Clone)]
pub struct SubMesh {
    /// Material applied to every triangle in this submesh
    pub material_id: MaterialId,
    /// Triangle list indices into the parent mesh's positions
    pub indices: Vec<u32>,
}

impl SubMesh {
    /// Create a submesh from a triangle index list
    ///
    /// Debug-asserts that the index count is a multiple of three.
    pub fn new(material_id: MaterialId, indices: Vec<u32>) -> Self {
        debug_assert!(
            indices.len() % 3 == 0,
            "submesh indices must form whole triangles"
        );
        Self {
            material_id,
            indices,
        }
    }

    /// Iterate the triangles of this submesh as index triples
    pub fn triangles(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        self.indices.chunks_exact(3).map(|t| [t[0], t[1], t[2]])
    }

    /// Number of triangles in this submesh
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Position-only mesh data
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    /// Vertex positions
    pub positions: Vec<Vec3>,
    /// Per-material triangle runs
    pub submeshes: Vec<SubMesh>,
}

impl MeshData {
    /// Create mesh data from positions and submeshes
    pub fn new(positions: Vec<Vec3>, submeshes: Vec<SubMesh>) -> Self {
        Self {
            positions,
            submeshes,
        }
    }

    /// Bounding box of all vertex positions
    pub fn aabb(&self) -> AABB {
        AABB::from_points(&self.positions)
    }

    /// Total triangle count across all submeshes
    pub fn triangle_count(&self) -> usize {
        self.submeshes.iter().map(SubMesh::triangle_count).sum()
    }
}
