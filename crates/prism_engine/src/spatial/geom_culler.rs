//! Static geometry octree for per-mesh frustum culling
//!
//! A second culling step that runs after the scene partitioner's broad
//! phase: one mesh is compiled once into a fixed-depth octree whose cells
//! bucket triangle indices by material. At render time the tree is walked
//! against the camera frustum and the surviving buckets are merged into
//! per-material batches.
//!
//! The tree trades memory for simplicity: every cell of every level is
//! pre-allocated up front, so addressing a node is pure index arithmetic
//! and no splitting or merging ever happens after construction.

use std::collections::BTreeMap;

use log::{debug, warn};

use crate::foundation::math::Vec3;
use crate::scene::{Frustum, AABB};
use crate::scene::{MaterialId, MeshData};

/// Default depth of the pre-grown octree
pub const DEFAULT_MAX_DEPTH: u8 = 5;

/// Per-node payload: triangle indices bucketed by material
#[derive(Debug, Default)]
pub struct CullerNodeData {
    /// Triangle list indices per material, in mesh index space
    pub triangles: BTreeMap<MaterialId, Vec<u32>>,
}

/// One cell of the static octree
#[derive(Debug)]
pub struct CullerNode {
    level: u8,
    grid: [u32; 3],
    data: CullerNodeData,
}

impl CullerNode {
    /// Depth of this cell (root = 0)
    pub fn level(&self) -> u8 {
        self.level
    }

    /// 3-D grid coordinate of this cell within its level
    pub fn grid(&self) -> [u32; 3] {
        self.grid
    }

    /// The triangle buckets stored in this cell
    pub fn data(&self) -> &CullerNodeData {
        &self.data
    }
}

/// Fixed-depth octree over a single mesh's bounding cube
#[derive(Debug)]
pub struct CullerOctree {
    bounds: AABB,
    levels: u8,
    nodes: Vec<CullerNode>,
}

impl CullerOctree {
    /// Pre-grow a tree covering `bounds`, forced square, to a fixed depth
    pub fn new(bounds: &AABB, max_level_count: u8) -> Self {
        // Make sure the bounds are square
        let half = bounds.max_dimension() / 2.0;
        let bounds = AABB::from_center_extents(bounds.center(), Vec3::new(half, half, half));

        let mut nodes = Vec::with_capacity(Self::level_base(max_level_count + 1));
        for level in 0..=max_level_count {
            let grid_width = 1u32 << level;
            for z in 0..grid_width {
                for y in 0..grid_width {
                    for x in 0..grid_width {
                        nodes.push(CullerNode {
                            level,
                            grid: [x, y, z],
                            data: CullerNodeData::default(),
                        });
                    }
                }
            }
        }

        Self {
            bounds,
            levels: max_level_count,
            nodes,
        }
    }

    /// Number of cells across all levels
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// True when a node sits at the deepest level
    pub fn is_leaf(&self, node: &CullerNode) -> bool {
        node.level == self.levels
    }

    /// The cubic world-space volume of a cell
    pub fn node_bounds(&self, node: &CullerNode) -> AABB {
        let grid_width = 1u32 << node.level;
        let cell_width = self.bounds.max_dimension() / grid_width as f32;
        let min = self.bounds.min
            + Vec3::new(
                node.grid[0] as f32 * cell_width,
                node.grid[1] as f32 * cell_width,
                node.grid[2] as f32 * cell_width,
            );
        let max = min + Vec3::new(cell_width, cell_width, cell_width);
        AABB::new(min, max)
    }

    /// First node index of a level: the geometric series of cells above it
    fn level_base(level: u8) -> usize {
        (8usize.pow(u32::from(level)) - 1) / 7
    }

    fn calc_index(level: u8, x: u32, y: u32, z: u32) -> usize {
        let level_width = 1usize << level;
        Self::level_base(level) + x as usize + level_width * y as usize
            + level_width * level_width * z as usize
    }

    fn child_indexes(node: &CullerNode) -> [usize; 8] {
        let mut indexes = [0usize; 8];
        let mut slot = 0;
        for z in 0..=1u32 {
            for y in 0..=1u32 {
                for x in 0..=1u32 {
                    indexes[slot] = Self::calc_index(
                        node.level + 1,
                        2 * node.grid[0] + x,
                        2 * node.grid[1] + y,
                        2 * node.grid[2] + z,
                    );
                    slot += 1;
                }
            }
        }
        indexes
    }

    /// Find the deepest node whose cell fully contains all three vertices
    ///
    /// Descends from the root into whichever child contains the whole
    /// triangle, stopping at a leaf or at the first node none of whose
    /// children can hold it.
    pub fn find_destination_for_triangle(&self, vertices: &[Vec3; 3]) -> usize {
        let mut current = 0usize;
        loop {
            let node = &self.nodes[current];
            if self.is_leaf(node) {
                return current;
            }

            let next = Self::child_indexes(node).into_iter().find(|&index| {
                self.node_bounds(&self.nodes[index]).contains_points(vertices)
            });

            match next {
                Some(index) => current = index,
                // No child fits the whole triangle, it stays here
                None => return current,
            }
        }
    }

    /// Append a triangle's indices to a node's per-material bucket
    ///
    /// Out-of-range node indices are ignored.
    pub fn insert_triangle(&mut self, node_index: usize, material_id: MaterialId, triangle: [u32; 3]) {
        if let Some(node) = self.nodes.get_mut(node_index) {
            node.data
                .triangles
                .entry(material_id)
                .or_default()
                .extend_from_slice(&triangle);
        }
    }

    /// Visit every node whose cell intersects the frustum, pruning
    /// non-intersecting subtrees
    pub fn traverse_visible<F>(&self, frustum: &Frustum, callback: &mut F)
    where
        F: FnMut(&CullerNode),
    {
        if self.nodes.is_empty() {
            return;
        }
        self.visit_visible(0, frustum, callback);
    }

    fn visit_visible<F>(&self, index: usize, frustum: &Frustum, callback: &mut F)
    where
        F: FnMut(&CullerNode),
    {
        let node = &self.nodes[index];
        if !frustum.intersects_aabb(&self.node_bounds(node)) {
            return;
        }

        callback(node);

        if !self.is_leaf(node) {
            for child in Self::child_indexes(node) {
                self.visit_visible(child, frustum, callback);
            }
        }
    }
}

/// A per-material batch of visible triangle indices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeomRenderable {
    /// Material shared by every triangle in the batch
    pub material_id: MaterialId,
    /// Triangle list indices into the compiled mesh
    pub indices: Vec<u32>,
}

/// Compiles a mesh into a static octree and answers frustum queries with
/// per-material render batches
#[derive(Debug)]
pub struct GeomCuller {
    mesh: MeshData,
    octree: Option<CullerOctree>,
    max_depth: u8,
    compiled: bool,
}

impl GeomCuller {
    /// Create a culler for a mesh at the default tree depth
    pub fn new(mesh: MeshData) -> Self {
        Self::with_max_depth(mesh, DEFAULT_MAX_DEPTH)
    }

    /// Create a culler with an explicit tree depth
    pub fn with_max_depth(mesh: MeshData, max_depth: u8) -> Self {
        Self {
            mesh,
            octree: None,
            max_depth,
            compiled: false,
        }
    }

    /// The mesh this culler was built over
    pub fn mesh(&self) -> &MeshData {
        &self.mesh
    }

    /// True once `compile` has run
    pub fn is_compiled(&self) -> bool {
        self.compiled
    }

    /// Build the octree and bucket every triangle (one-shot)
    ///
    /// Compiling twice is a no-op. A mesh with no vertices compiles to an
    /// empty culler that reports nothing visible.
    pub fn compile(&mut self) {
        if self.compiled {
            return;
        }
        self.compiled = true;

        if self.mesh.positions.is_empty() {
            return;
        }

        let bounds = self.mesh.aabb();
        let mut octree = CullerOctree::new(&bounds, self.max_depth);

        let mut inserted = 0usize;
        for submesh in &self.mesh.submeshes {
            for triangle in submesh.triangles() {
                let Some(vertices) = self.triangle_vertices(triangle) else {
                    warn!(
                        "skipping triangle with out-of-range indices {:?} for material {:?}",
                        triangle, submesh.material_id
                    );
                    continue;
                };

                let destination = octree.find_destination_for_triangle(&vertices);
                octree.insert_triangle(destination, submesh.material_id, triangle);
                inserted += 1;
            }
        }

        debug!(
            "compiled geom culler: {} triangles into {} nodes",
            inserted,
            octree.node_count()
        );

        self.octree = Some(octree);
    }

    /// Gather per-material batches for everything inside the frustum
    ///
    /// Never fails: an uncompiled or empty culler simply yields no batches.
    pub fn renderables_visible(&self, frustum: &Frustum) -> Vec<GeomRenderable> {
        let Some(octree) = &self.octree else {
            return Vec::new();
        };

        let mut batches: BTreeMap<MaterialId, Vec<u32>> = BTreeMap::new();
        octree.traverse_visible(frustum, &mut |node: &CullerNode| {
            for (material_id, indices) in &node.data.triangles {
                batches.entry(*material_id).or_default().extend(indices);
            }
        });

        Self::into_renderables(batches)
    }

    /// Visit every compiled batch regardless of visibility
    pub fn each_renderable<F>(&self, mut callback: F)
    where
        F: FnMut(&GeomRenderable),
    {
        let Some(octree) = &self.octree else {
            return;
        };

        let mut batches: BTreeMap<MaterialId, Vec<u32>> = BTreeMap::new();
        for node in &octree.nodes {
            for (material_id, indices) in &node.data.triangles {
                batches.entry(*material_id).or_default().extend(indices);
            }
        }

        for renderable in Self::into_renderables(batches) {
            callback(&renderable);
        }
    }

    fn triangle_vertices(&self, triangle: [u32; 3]) -> Option<[Vec3; 3]> {
        let fetch = |index: u32| self.mesh.positions.get(index as usize).copied();
        Some([fetch(triangle[0])?, fetch(triangle[1])?, fetch(triangle[2])?])
    }

    fn into_renderables(batches: BTreeMap<MaterialId, Vec<u32>>) -> Vec<GeomRenderable> {
        batches
            .into_iter()
            .map(|(material_id, indices)| GeomRenderable {
                material_id,
                indices,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Mat4, Mat4Ext};
    use crate::scene::SubMesh;

    /// Two quads on different materials inside [0, 16]^3
    fn test_mesh() -> MeshData {
        MeshData::new(
            vec![
                // A small quad near one corner
                Vec3::new(1.0, 1.0, 1.0),
                Vec3::new(2.0, 1.0, 1.0),
                Vec3::new(2.0, 2.0, 1.0),
                Vec3::new(1.0, 2.0, 1.0),
                // A small quad near the opposite corner
                Vec3::new(14.0, 14.0, 15.0),
                Vec3::new(15.0, 14.0, 15.0),
                Vec3::new(15.0, 15.0, 15.0),
                Vec3::new(14.0, 15.0, 15.0),
                // Corner markers so the mesh bounds span the full cube
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(16.0, 16.0, 16.0),
                Vec3::new(16.0, 0.0, 16.0),
            ],
            vec![
                SubMesh::new(MaterialId(0), vec![0, 1, 2, 0, 2, 3]),
                SubMesh::new(MaterialId(1), vec![4, 5, 6, 4, 6, 7, 8, 9, 10]),
            ],
        )
    }

    fn all_seeing_frustum() -> Frustum {
        let proj = Mat4::perspective(std::f32::consts::FRAC_PI_2, 1.0, 0.1, 500.0);
        let view = Mat4::look_at(
            Vec3::new(8.0, 8.0, 120.0),
            Vec3::new(8.0, 8.0, 8.0),
            Vec3::new(0.0, 1.0, 0.0),
        );
        Frustum::from_matrix(&(proj * view))
    }

    fn blind_frustum() -> Frustum {
        let proj = Mat4::perspective(std::f32::consts::FRAC_PI_2, 1.0, 0.1, 5.0);
        let view = Mat4::look_at(
            Vec3::new(500.0, 500.0, 500.0),
            Vec3::new(501.0, 500.0, 500.0),
            Vec3::new(0.0, 1.0, 0.0),
        );
        Frustum::from_matrix(&(proj * view))
    }

    #[test]
    fn test_tree_is_pregrown_to_fixed_depth() {
        let bounds = AABB::new(Vec3::zeros(), Vec3::new(16.0, 16.0, 16.0));
        let octree = CullerOctree::new(&bounds, 2);

        // 1 + 8 + 64 cells
        assert_eq!(octree.node_count(), 73);
    }

    #[test]
    fn test_whole_frustum_visits_every_leaf_once() {
        let bounds = AABB::new(Vec3::zeros(), Vec3::new(16.0, 16.0, 16.0));
        let octree = CullerOctree::new(&bounds, 2);

        let mut leaves = Vec::new();
        octree.traverse_visible(&all_seeing_frustum(), &mut |node: &CullerNode| {
            if octree.is_leaf(node) {
                leaves.push(node.grid());
            }
        });

        assert_eq!(leaves.len(), 64);
        let unique: std::collections::HashSet<_> = leaves.iter().collect();
        assert_eq!(unique.len(), 64, "a leaf was visited more than once");
    }

    #[test]
    fn test_small_triangle_sinks_to_a_leaf() {
        let mesh = test_mesh();
        let octree = CullerOctree::new(&mesh.aabb(), 3);

        let tiny = [
            Vec3::new(1.0, 1.0, 1.0),
            Vec3::new(1.5, 1.0, 1.0),
            Vec3::new(1.0, 1.5, 1.0),
        ];
        let index = octree.find_destination_for_triangle(&tiny);
        assert!(octree.is_leaf(&octree.nodes[index]));

        // A triangle spanning the whole cube can only live at the root
        let huge = [
            Vec3::new(0.5, 0.5, 0.5),
            Vec3::new(15.5, 0.5, 0.5),
            Vec3::new(8.0, 15.5, 15.5),
        ];
        assert_eq!(octree.find_destination_for_triangle(&huge), 0);
    }

    #[test]
    fn test_compile_collects_full_triangle_set() {
        let mesh = test_mesh();
        let expected: Vec<Vec<u32>> = mesh
            .submeshes
            .iter()
            .map(|submesh| {
                let mut sorted = submesh.indices.clone();
                sorted.sort_unstable();
                sorted
            })
            .collect();

        let mut culler = GeomCuller::new(mesh);
        culler.compile();
        assert!(culler.is_compiled());

        let batches = culler.renderables_visible(&all_seeing_frustum());
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].material_id, MaterialId(0));
        assert_eq!(batches[1].material_id, MaterialId(1));

        for (batch, expected_indices) in batches.iter().zip(&expected) {
            let mut collected = batch.indices.clone();
            collected.sort_unstable();
            assert_eq!(&collected, expected_indices);
        }
    }

    #[test]
    fn test_disjoint_frustum_collects_nothing() {
        let mut culler = GeomCuller::new(test_mesh());
        culler.compile();

        assert!(culler.renderables_visible(&blind_frustum()).is_empty());
    }

    #[test]
    fn test_each_renderable_matches_visible_totals() {
        let mut culler = GeomCuller::new(test_mesh());
        culler.compile();

        let mut total = 0usize;
        culler.each_renderable(|renderable| total += renderable.indices.len());
        assert_eq!(total, culler.mesh().triangle_count() * 3);
    }

    #[test]
    fn test_empty_mesh_compiles_to_nothing() {
        let mut culler = GeomCuller::new(MeshData::default());
        culler.compile();

        assert!(culler.is_compiled());
        assert!(culler.renderables_visible(&all_seeing_frustum()).is_empty());
    }
}
