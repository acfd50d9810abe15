//! Dynamic sparse octree over moving scene objects
//!
//! Nodes are addressed by `(level, quantized centre hash)` and stored in a
//! slotmap arena; the per-level tables own nothing but stable keys, so
//! parent/child/sibling references can never dangle. The tree is sized by
//! the first object inserted: its max dimension becomes the root diameter,
//! and everything that follows must fit inside that cube.
//!
//! Subdivision and coalescing are policy-driven. The default policy splits
//! on every insert; merging is evaluated as a gate but never performed
//! structurally, mirroring the behaviour this design is modelled on.

use std::collections::{HashMap, HashSet};

use log::{debug, trace};
use slotmap::{new_key_type, SlotMap};
use thiserror::Error;

use crate::foundation::math::Vec3;
use crate::scene::{Frustum, AABB};
use crate::scene::{ActorId, LightId, ParticleSystemId};
use crate::spatial::hash_key::hash_combine;

new_key_type! {
    /// Stable handle to an octree node
    pub struct OctreeNodeKey;
}

/// Depth of a node below the root (root = 0)
pub type NodeLevel = usize;

/// Errors raised by octree mutations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OctreeError {
    /// The object's position or size does not fit the root volume, or the
    /// octree has no root yet
    #[error("object is outside the octree bounds (or the octree has no root)")]
    OutsideBounds,

    /// An attempt was made to create a node more than one level below the
    /// deepest existing level. Levels can never be skipped; hitting this
    /// indicates a bug in the caller
    #[error("cannot create an octree node without its parent level")]
    MissingParent,

    /// The object's bounding volume has no spatial area
    #[error("object has no spatial area and cannot be inserted into the octree")]
    InvalidInsertion,
}

/// Hash of a quantized node centre, used to address nodes within a level
///
/// Centres are rounded to two decimal places before hashing so that centres
/// computed along different arithmetic paths still land in the same cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VectorHash(u64);

/// Compute the address hash for a node centre
pub fn generate_vector_hash(v: &Vec3) -> VectorHash {
    let quantize = |value: f32| {
        let rounded = (value * 100.0).round() / 100.0;
        // Collapse -0.0 so both zero signs share a cell
        if rounded == 0.0 {
            0.0
        } else {
            rounded
        }
    };

    let mut seed = 0u64;
    for component in [quantize(v.x), quantize(v.y), quantize(v.z)] {
        hash_combine(&mut seed, u64::from(component.to_bits()));
    }
    VectorHash(seed)
}

/// Policy deciding when nodes subdivide or coalesce
pub trait SplitMergePolicy: Send + Sync {
    /// Should this node subdivide after an insertion?
    fn should_split(&self, node: &OctreeNode) -> bool;

    /// Should this sibling group coalesce after a removal?
    fn should_merge(&self, nodes: &[&OctreeNode]) -> bool;
}

/// Default policy: always split, always approve merges
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysSplitMerge;

impl SplitMergePolicy for AlwaysSplitMerge {
    fn should_split(&self, _node: &OctreeNode) -> bool {
        true
    }

    fn should_merge(&self, _nodes: &[&OctreeNode]) -> bool {
        true
    }
}

/// Per-node payload: the objects filed in this cell, by kind
#[derive(Debug, Default)]
pub struct NodeData {
    /// Actors in this cell with their cached bounds
    pub actors: HashMap<ActorId, AABB>,
    /// Lights in this cell with their cached bounds
    pub lights: HashMap<LightId, AABB>,
    /// Particle systems in this cell with their cached bounds
    pub particle_systems: HashMap<ParticleSystemId, AABB>,
}

impl NodeData {
    /// True when no objects of any kind are filed here
    pub fn is_empty(&self) -> bool {
        self.actors.is_empty() && self.lights.is_empty() && self.particle_systems.is_empty()
    }

    /// Total object count across all kinds
    pub fn len(&self) -> usize {
        self.actors.len() + self.lights.len() + self.particle_systems.len()
    }
}

/// A single octree cell
///
/// The cell's cubic volume is implied by its level and centre; the diameter
/// comes from the owning tree (`root diameter / 2^level`).
#[derive(Debug)]
pub struct OctreeNode {
    level: NodeLevel,
    center: Vec3,
    data: NodeData,
    parent: Option<OctreeNodeKey>,
    children: HashSet<OctreeNodeKey>,
}

impl OctreeNode {
    fn new(level: NodeLevel, center: Vec3, parent: Option<OctreeNodeKey>) -> Self {
        Self {
            level,
            center,
            data: NodeData::default(),
            parent,
            children: HashSet::new(),
        }
    }

    /// Depth of this node (root = 0)
    pub fn level(&self) -> NodeLevel {
        self.level
    }

    /// Centre point of this node's cubic cell
    pub fn center(&self) -> Vec3 {
        self.center
    }

    /// The objects filed in this cell
    pub fn data(&self) -> &NodeData {
        &self.data
    }

    /// Key of the parent node, if any
    pub fn parent(&self) -> Option<OctreeNodeKey> {
        self.parent
    }

    /// Keys of this node's existing children
    pub fn children(&self) -> &HashSet<OctreeNodeKey> {
        &self.children
    }

    /// True when this node has existing children
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// A node is empty when it holds no payload and has no children; only
    /// empty nodes are eligible for pruning
    pub fn is_empty(&self) -> bool {
        self.data.is_empty() && self.children.is_empty()
    }
}

/// Objects the octree can index, tagged with their cached bounds
#[derive(Debug, Clone, Copy)]
enum OctreeObject {
    Actor(ActorId, AABB),
    Light(LightId, AABB),
    ParticleSystem(ParticleSystemId, AABB),
}

impl OctreeObject {
    fn aabb(&self) -> &AABB {
        match self {
            Self::Actor(_, aabb) | Self::Light(_, aabb) | Self::ParticleSystem(_, aabb) => aabb,
        }
    }
}

/// Dynamic sparse octree indexing actors, lights and particle systems
pub struct Octree {
    nodes: SlotMap<OctreeNodeKey, OctreeNode>,
    /// Level tables, coarsest first; each maps centre hash to node key
    levels: Vec<HashMap<VectorHash, OctreeNodeKey>>,
    actor_lookup: HashMap<ActorId, OctreeNodeKey>,
    light_lookup: HashMap<LightId, OctreeNodeKey>,
    particle_system_lookup: HashMap<ParticleSystemId, OctreeNodeKey>,
    root_width: f32,
    policy: Box<dyn SplitMergePolicy>,
}

impl Default for Octree {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Octree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Octree")
            .field("node_count", &self.nodes.len())
            .field("level_count", &self.levels.len())
            .field("root_width", &self.root_width)
            .finish_non_exhaustive()
    }
}

impl Octree {
    /// Create an octree with the default always-split policy
    pub fn new() -> Self {
        Self::with_policy(Box::new(AlwaysSplitMerge))
    }

    /// Create an octree with a custom split/merge policy
    pub fn with_policy(policy: Box<dyn SplitMergePolicy>) -> Self {
        Self {
            nodes: SlotMap::with_key(),
            levels: Vec::new(),
            actor_lookup: HashMap::new(),
            light_lookup: HashMap::new(),
            particle_system_lookup: HashMap::new(),
            root_width: 0.0,
            policy,
        }
    }

    /// True when the octree has no root yet
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Number of live nodes across all levels
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of levels currently allocated
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Look up a node by key
    pub fn node(&self, key: OctreeNodeKey) -> Option<&OctreeNode> {
        self.nodes.get(key)
    }

    /// Key of the root node, if the octree has one
    pub fn root(&self) -> Option<OctreeNodeKey> {
        self.levels
            .first()
            .and_then(|table| table.values().next().copied())
    }

    /// Diameter of a node cell at the given level
    pub fn node_diameter(&self, level: NodeLevel) -> f32 {
        self.root_width / 2.0f32.powi(level as i32)
    }

    /// The cubic volume occupied by a node
    pub fn node_aabb(&self, node: &OctreeNode) -> AABB {
        let hw = self.node_diameter(node.level) / 2.0;
        AABB::from_center_extents(node.center, Vec3::new(hw, hw, hw))
    }

    /// True when a point lies inside a node's cubic cell
    pub fn node_contains(&self, node: &OctreeNode, point: Vec3) -> bool {
        self.node_aabb(node).contains_point(point)
    }

    /// Insert an actor, splitting the destination node if the policy asks
    pub fn insert_actor(&mut self, id: ActorId, aabb: AABB) -> Result<OctreeNodeKey, OctreeError> {
        self.insert_object(OctreeObject::Actor(id, aabb))
    }

    /// Insert a light, splitting the destination node if the policy asks
    pub fn insert_light(&mut self, id: LightId, aabb: AABB) -> Result<OctreeNodeKey, OctreeError> {
        self.insert_object(OctreeObject::Light(id, aabb))
    }

    /// Insert a particle system, splitting the destination node if the
    /// policy asks
    pub fn insert_particle_system(
        &mut self,
        id: ParticleSystemId,
        aabb: AABB,
    ) -> Result<OctreeNodeKey, OctreeError> {
        self.insert_object(OctreeObject::ParticleSystem(id, aabb))
    }

    /// Node currently holding an actor
    pub fn locate_actor(&self, id: ActorId) -> Option<OctreeNodeKey> {
        self.actor_lookup.get(&id).copied()
    }

    /// Node currently holding a light
    pub fn locate_light(&self, id: LightId) -> Option<OctreeNodeKey> {
        self.light_lookup.get(&id).copied()
    }

    /// Node currently holding a particle system
    pub fn locate_particle_system(&self, id: ParticleSystemId) -> Option<OctreeNodeKey> {
        self.particle_system_lookup.get(&id).copied()
    }

    /// Remove an actor; unknown ids are ignored
    pub fn remove_actor(&mut self, id: ActorId) {
        let Some(node_key) = self.actor_lookup.remove(&id) else {
            return;
        };
        if let Some(node) = self.nodes.get_mut(node_key) {
            node.data.actors.remove(&id);
        }
        self.after_removal(node_key);
    }

    /// Remove a light; unknown ids are ignored
    pub fn remove_light(&mut self, id: LightId) {
        let Some(node_key) = self.light_lookup.remove(&id) else {
            return;
        };
        if let Some(node) = self.nodes.get_mut(node_key) {
            node.data.lights.remove(&id);
        }
        self.after_removal(node_key);
    }

    /// Remove a particle system; unknown ids are ignored
    pub fn remove_particle_system(&mut self, id: ParticleSystemId) {
        let Some(node_key) = self.particle_system_lookup.remove(&id) else {
            return;
        };
        if let Some(node) = self.nodes.get_mut(node_key) {
            node.data.particle_systems.remove(&id);
        }
        self.after_removal(node_key);
    }

    /// Visit every node whose cell intersects the frustum, pruning subtrees
    /// whose cells do not
    pub fn traverse_visible<F>(&self, frustum: &Frustum, callback: &mut F)
    where
        F: FnMut(&OctreeNode),
    {
        if let Some(root) = self.root() {
            self.visit_visible(root, frustum, callback);
        }
    }

    fn visit_visible<F>(&self, key: OctreeNodeKey, frustum: &Frustum, callback: &mut F)
    where
        F: FnMut(&OctreeNode),
    {
        let Some(node) = self.nodes.get(key) else {
            return;
        };
        if !frustum.intersects_aabb(&self.node_aabb(node)) {
            return;
        }

        callback(node);
        for child in &node.children {
            self.visit_visible(*child, frustum, callback);
        }
    }

    fn insert_object(&mut self, object: OctreeObject) -> Result<OctreeNodeKey, OctreeError> {
        let node_key = self.get_or_create_node_for_aabb(object.aabb())?;
        self.store_object(node_key, object);

        if self.split_if_necessary(node_key)? {
            // The tree gained a level; the object may have moved deeper
            Ok(self.locate_object(&object).unwrap_or(node_key))
        } else {
            Ok(node_key)
        }
    }

    fn store_object(&mut self, node_key: OctreeNodeKey, object: OctreeObject) {
        let Some(node) = self.nodes.get_mut(node_key) else {
            return;
        };
        match object {
            OctreeObject::Actor(id, aabb) => {
                node.data.actors.insert(id, aabb);
                self.actor_lookup.insert(id, node_key);
            }
            OctreeObject::Light(id, aabb) => {
                node.data.lights.insert(id, aabb);
                self.light_lookup.insert(id, node_key);
            }
            OctreeObject::ParticleSystem(id, aabb) => {
                node.data.particle_systems.insert(id, aabb);
                self.particle_system_lookup.insert(id, node_key);
            }
        }
    }

    fn locate_object(&self, object: &OctreeObject) -> Option<OctreeNodeKey> {
        match object {
            OctreeObject::Actor(id, _) => self.locate_actor(*id),
            OctreeObject::Light(id, _) => self.locate_light(*id),
            OctreeObject::ParticleSystem(id, _) => self.locate_particle_system(*id),
        }
    }

    fn after_removal(&mut self, node_key: OctreeNodeKey) {
        let mut group = self.sibling_keys(node_key);
        group.push(node_key);
        self.merge_if_possible(&group);

        if self.nodes.get(node_key).is_some_and(OctreeNode::is_empty) {
            self.prune_empty_nodes();
        }
    }

    fn sibling_keys(&self, key: OctreeNodeKey) -> Vec<OctreeNodeKey> {
        self.nodes
            .get(key)
            .and_then(|node| node.parent)
            .and_then(|parent| self.nodes.get(parent))
            .map(|parent| {
                parent
                    .children
                    .iter()
                    .copied()
                    .filter(|child| *child != key)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Evaluate the merge predicate over a sibling group
    ///
    /// The predicate is a gate only: no structural coalescing takes place
    /// even when it approves. Returns whether the merge was approved.
    fn merge_if_possible(&self, keys: &[OctreeNodeKey]) -> bool {
        let nodes: Vec<&OctreeNode> = keys.iter().filter_map(|key| self.nodes.get(*key)).collect();
        if !self.policy.should_merge(&nodes) {
            return false;
        }

        trace!("merge approved over {} siblings (no-op)", nodes.len());
        true
    }

    fn split_if_necessary(&mut self, node_key: OctreeNodeKey) -> Result<bool, OctreeError> {
        let (level, centers) = match self.nodes.get(node_key) {
            Some(node) => {
                if !self.policy.should_split(node) {
                    return Ok(false);
                }
                (node.level, self.child_centers(node))
            }
            None => return Ok(false),
        };

        let mut created = Vec::new();
        let mut child_keys = Vec::new();
        for center in centers {
            let (child_key, was_created) = self.get_or_create_node(level + 1, center)?;
            child_keys.push(child_key);
            if was_created {
                created.push(child_key);
            }
        }

        if let Some(node) = self.nodes.get_mut(node_key) {
            node.children.extend(child_keys.iter().copied());
        }

        // If nothing was created the payload is already as deep as it can
        // go; the predicate may keep asking but there is nothing to do
        if created.is_empty() {
            return Ok(false);
        }

        debug!(
            "split node at level {}: {} children created",
            level,
            created.len()
        );

        // Stash the payload, wipe the node and reinsert from the top; with
        // one more level available, objects route into the new children or
        // deeper
        let data = match self.nodes.get_mut(node_key) {
            Some(node) => std::mem::take(&mut node.data),
            None => return Ok(false),
        };
        self.reinsert_data(data)?;

        // Newly created children that stayed empty are removed right away
        for child in created {
            if self.nodes.get(child).is_some_and(OctreeNode::is_empty) {
                self.remove_node(child);
            }
        }

        Ok(true)
    }

    fn reinsert_data(&mut self, data: NodeData) -> Result<(), OctreeError> {
        for (id, aabb) in data.actors {
            self.insert_object(OctreeObject::Actor(id, aabb))?;
        }
        for (id, aabb) in data.lights {
            self.insert_object(OctreeObject::Light(id, aabb))?;
        }
        for (id, aabb) in data.particle_systems {
            self.insert_object(OctreeObject::ParticleSystem(id, aabb))?;
        }
        Ok(())
    }

    fn child_centers(&self, node: &OctreeNode) -> Vec<Vec3> {
        let quarter = self.node_diameter(node.level) / 4.0;

        let mut centers = Vec::with_capacity(8);
        for x in [-1.0f32, 1.0] {
            for y in [-1.0f32, 1.0] {
                for z in [-1.0f32, 1.0] {
                    centers.push(node.center + Vec3::new(x * quarter, y * quarter, z * quarter));
                }
            }
        }

        centers
    }

    /// Remove empty nodes level by level, deepest first, until a level has
    /// no deletions
    fn prune_empty_nodes(&mut self) {
        let mut level = self.levels.len();
        while level > 0 {
            level -= 1;

            let keys: Vec<OctreeNodeKey> = self.levels[level].values().copied().collect();
            let mut deleted = false;
            for key in keys {
                if self.nodes.get(key).is_some_and(OctreeNode::is_empty) {
                    self.remove_node(key);
                    deleted = true;
                }
            }

            if !deleted {
                // A level with nothing to delete means nothing above it
                // became prunable either
                break;
            }
        }
    }

    fn remove_node(&mut self, key: OctreeNodeKey) {
        let Some(node) = self.nodes.remove(key) else {
            return;
        };

        if let Some(parent_key) = node.parent {
            if let Some(parent) = self.nodes.get_mut(parent_key) {
                parent.children.remove(&key);
            }
        }

        for id in node.data.actors.keys() {
            self.actor_lookup.remove(id);
        }
        for id in node.data.lights.keys() {
            self.light_lookup.remove(id);
        }
        for id in node.data.particle_systems.keys() {
            self.particle_system_lookup.remove(id);
        }

        let level = node.level;
        if let Some(table) = self.levels.get_mut(level) {
            table.remove(&generate_vector_hash(&node.center));
        }

        // Drop the level entirely when it is the deepest and now empty
        if level + 1 == self.levels.len() && self.levels[level].is_empty() {
            self.levels.pop();
        }
    }

    fn get_or_create_node_for_aabb(&mut self, aabb: &AABB) -> Result<OctreeNodeKey, OctreeError> {
        if aabb.has_zero_area() {
            return Err(OctreeError::InvalidInsertion);
        }

        if self.levels.is_empty() {
            // First insertion: the object defines the root volume
            self.levels.push(HashMap::new());
            self.root_width = aabb.max_dimension();
            debug!(
                "creating octree root: center {:?}, diameter {}",
                aabb.center(),
                self.root_width
            );
            return self.create_node(0, aabb.center());
        }

        self.find_best_existing_node(aabb)
    }

    /// Starting from the level implied by the object's size, walk upward
    /// through existing levels until a populated cell covers its centre
    fn find_best_existing_node(&self, aabb: &AABB) -> Result<OctreeNodeKey, OctreeError> {
        let max_level = self.calculate_level(aabb.max_dimension())?;

        for level in (0..=max_level).rev() {
            if level < self.levels.len() {
                let center = self.find_node_center_for_point(level, aabb.center())?;
                let hash = generate_vector_hash(&center);
                if let Some(&key) = self.levels[level].get(&hash) {
                    return Ok(key);
                }
            }
        }

        Err(OctreeError::OutsideBounds)
    }

    /// The shallowest level whose cells are still at least as large as an
    /// object of this diameter
    fn calculate_level(&self, diameter: f32) -> Result<NodeLevel, OctreeError> {
        if self.levels.is_empty() {
            return Err(OctreeError::OutsideBounds);
        }

        let mut octree_diameter = self.node_diameter(0);
        if diameter > octree_diameter {
            return Err(OctreeError::OutsideBounds);
        }

        let mut level = 0;
        while diameter < octree_diameter {
            octree_diameter /= 2.0;
            level += 1;
        }

        Ok(level)
    }

    /// Centre of the cell containing a point at a given level
    ///
    /// Cells at every level tile the root cube, so the centre is derived
    /// from the point's grid index relative to the root's minimum corner.
    /// Points on the far boundary belong to the last cell.
    fn find_node_center_for_point(
        &self,
        level: NodeLevel,
        point: Vec3,
    ) -> Result<Vec3, OctreeError> {
        let root_key = self.root().ok_or(OctreeError::OutsideBounds)?;
        let root = self.nodes.get(root_key).ok_or(OctreeError::OutsideBounds)?;
        if !self.node_contains(root, point) {
            return Err(OctreeError::OutsideBounds);
        }

        let step = self.node_diameter(level);
        let cells = 2.0f32.powi(level as i32);
        let root_min = root.center() - Vec3::new(1.0, 1.0, 1.0) * (self.root_width / 2.0);

        let snap = |value: f32, min: f32| {
            let index = ((value - min) / step).floor().clamp(0.0, cells - 1.0);
            (index + 0.5).mul_add(step, min)
        };

        Ok(Vec3::new(
            snap(point.x, root_min.x),
            snap(point.y, root_min.y),
            snap(point.z, root_min.z),
        ))
    }

    fn get_or_create_node(
        &mut self,
        level: NodeLevel,
        center: Vec3,
    ) -> Result<(OctreeNodeKey, bool), OctreeError> {
        // Levels can never be skipped
        if level > self.levels.len() {
            return Err(OctreeError::MissingParent);
        }
        if level == self.levels.len() {
            self.levels.push(HashMap::new());
        }

        let hash = generate_vector_hash(&center);
        if let Some(&existing) = self.levels[level].get(&hash) {
            return Ok((existing, false));
        }

        let key = self.create_node(level, center)?;
        Ok((key, true))
    }

    fn create_node(&mut self, level: NodeLevel, center: Vec3) -> Result<OctreeNodeKey, OctreeError> {
        let parent = if level > 0 {
            let parent_center = self.find_node_center_for_point(level - 1, center)?;
            let parent_hash = generate_vector_hash(&parent_center);
            let parent_key = self.levels[level - 1]
                .get(&parent_hash)
                .copied()
                .ok_or(OctreeError::MissingParent)?;
            Some(parent_key)
        } else {
            None
        };

        let key = self.nodes.insert(OctreeNode::new(level, center, parent));
        self.levels[level].insert(generate_vector_hash(&center), key);

        if let Some(parent_key) = parent {
            if let Some(parent_node) = self.nodes.get_mut(parent_key) {
                parent_node.children.insert(key);
            }
        }

        Ok(key)
    }
}
