//! Hierarchical grid spatial hash
//!
//! Objects are filed under (preferably) one cell: the smallest power-of-two
//! cell size that comfortably bounds them. An object is inserted once per
//! bounding-box corner, so anything spanning several cells is filed
//! redundantly in each cell it touches. Queries gather matches both below
//! (descendant cells) and above (ancestor cells) the query's own cell.
//!
//! The hash never owns what it indexes. Each indexed object keeps a
//! [`SpatialHashEntry`] — its cached box and current key set — and must be
//! removed from the index before the entry is discarded.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::hash::Hash;
use std::ops::Bound;

use log::trace;

use crate::scene::{Frustum, AABB};
use crate::spatial::hash_key::{make_key, Key, MAX_GRID_LEVELS};

/// The set of keys an entry is currently filed under
pub type KeySet = HashSet<Key>;

/// Per-object bookkeeping for the spatial hash
///
/// Owned by the object (or whatever registered it), not by the index.
/// Invariant: `keys` always matches the key set most recently derived from
/// `hash_aabb`.
#[derive(Debug, Clone, Default)]
pub struct SpatialHashEntry {
    keys: KeySet,
    hash_aabb: Option<AABB>,
}

impl SpatialHashEntry {
    /// Create an entry that has not been indexed yet
    pub fn new() -> Self {
        Self::default()
    }

    /// The box this entry was last indexed with
    pub fn hash_aabb(&self) -> Option<&AABB> {
        self.hash_aabb.as_ref()
    }

    /// The keys this entry is currently filed under
    pub fn keys(&self) -> &KeySet {
        &self.keys
    }

    fn set_hash_aabb(&mut self, aabb: AABB) {
        self.hash_aabb = Some(aabb);
    }

    fn push_key(&mut self, key: Key) {
        self.keys.insert(key);
    }

    fn set_keys(&mut self, keys: KeySet) {
        self.keys = keys;
    }
}

/// Hierarchical spatial hash over caller-owned entries
///
/// `I` is the caller's identifier type for indexed objects; the index
/// stores ids only and never touches the objects themselves.
#[derive(Debug)]
pub struct SpatialHash<I> {
    index: BTreeMap<Key, HashSet<I>>,
}

impl<I> Default for SpatialHash<I> {
    fn default() -> Self {
        Self {
            index: BTreeMap::new(),
        }
    }
}

impl<I: Copy + Eq + Hash> SpatialHash<I> {
    /// Create an empty spatial hash
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct keys currently in the index
    pub fn key_count(&self) -> usize {
        self.index.len()
    }

    /// Insert an object under every corner key of its bounding box
    pub fn insert_object_for_box(&mut self, aabb: AABB, id: I, entry: &mut SpatialHashEntry) {
        let cell_size = find_cell_size_for_box(&aabb);

        entry.set_hash_aabb(aabb);
        for corner in aabb.corners() {
            let key = make_key(cell_size, corner.x, corner.y, corner.z);
            self.insert_object_for_key(key, id, entry);
        }
    }

    /// Remove an object from every key it is filed under
    pub fn remove_object(&mut self, id: I, entry: &mut SpatialHashEntry) {
        for key in entry.keys().clone() {
            self.erase_object_from_key(&key, id);
        }
        entry.set_keys(KeySet::new());
        entry.hash_aabb = None;
    }

    /// Re-file an object under a new bounding box
    ///
    /// Computes the new key set, diffs it against the stored one and only
    /// touches the keys that changed. Calling this with the box the entry
    /// already has is a no-op.
    pub fn update_object_for_box(&mut self, new_box: AABB, id: I, entry: &mut SpatialHashEntry) {
        let cell_size = find_cell_size_for_box(&new_box);

        let mut new_keys = KeySet::new();
        for corner in new_box.corners() {
            new_keys.insert(make_key(cell_size, corner.x, corner.y, corner.z));
        }

        if new_keys.is_empty() && entry.keys().is_empty() {
            return;
        }

        let stale: Vec<Key> = entry.keys().difference(&new_keys).copied().collect();
        let fresh: Vec<Key> = new_keys.difference(entry.keys()).copied().collect();

        trace!(
            "rehash: {} stale, {} fresh of {} keys",
            stale.len(),
            fresh.len(),
            new_keys.len()
        );

        for key in stale {
            self.erase_object_from_key(&key, id);
        }

        for key in fresh {
            self.index.entry(key).or_default().insert(id);
        }

        entry.set_hash_aabb(new_box);
        entry.set_keys(new_keys);
    }

    /// Find every object whose cell is at, above or below the box's cell
    ///
    /// Matches are at bounding-box-cell granularity; callers needing exact
    /// overlap must filter the result. Never fails: an empty index or a box
    /// nobody overlaps simply yields an empty set.
    pub fn find_objects_within_box(&self, aabb: &AABB) -> HashSet<I> {
        let mut objects = HashSet::new();

        let cell_size = find_cell_size_for_box(aabb);

        let mut seen = KeySet::new();
        for corner in aabb.corners() {
            seen.insert(make_key(cell_size, corner.x, corner.y, corner.z));
        }

        for key in &seen {
            self.gather_objects(key, &mut objects);
        }

        objects
    }

    /// Find every object whose cell may fall inside the frustum
    ///
    /// Queries the box(es) bounding the frustum volume, then exactly
    /// filters each candidate's cached box against the frustum planes via
    /// the supplied lookup.
    pub fn find_objects_within_frustum<F>(&self, frustum: &Frustum, hash_aabb: F) -> HashSet<I>
    where
        F: Fn(&I) -> Option<AABB>,
    {
        let mut boxes = Vec::new();
        generate_boxes_for_frustum(frustum, &mut boxes);

        let mut results = HashSet::new();
        for aabb in &boxes {
            for id in self.find_objects_within_box(aabb) {
                if let Some(object_box) = hash_aabb(&id) {
                    if frustum.intersects_aabb(&object_box) {
                        results.insert(id);
                    }
                }
            }
        }

        results
    }

    fn insert_object_for_key(&mut self, key: Key, id: I, entry: &mut SpatialHashEntry) {
        self.index.entry(key).or_default().insert(id);
        entry.push_key(key);
    }

    fn erase_object_from_key(&mut self, key: &Key, id: I) {
        if let Some(bucket) = self.index.get_mut(key) {
            bucket.remove(&id);
            if bucket.is_empty() {
                self.index.remove(key);
            }
        }
    }

    fn gather_objects(&self, key: &Key, objects: &mut HashSet<I>) {
        // Walk the index in order from the key: descendant keys sort
        // adjacently, so stop at the first non-descendant.
        for (candidate, bucket) in self.index.range((Bound::Included(*key), Bound::Unbounded)) {
            if !key.is_ancestor_of(candidate) {
                break;
            }
            objects.extend(bucket.iter().copied());
        }

        // Then go up the tree collecting objects filed at each ancestor
        let mut path = *key;
        while !path.is_root() {
            path = path.parent_key();
            if let Some(bucket) = self.index.get(&path) {
                objects.extend(bucket.iter().copied());
            }
        }
    }
}

impl<I> fmt::Display for SpatialHash<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, bucket) in &self.index {
            writeln!(f, "{} : {} items", key, bucket.len())?;
        }
        Ok(())
    }
}

/// Choose the cell size an object of this box should be filed under
///
/// The nearest power-of-two size at or above the box's max dimension, so
/// that objects rarely span cells wastefully. Anything smaller than one
/// unit files under cell size 1.
fn find_cell_size_for_box(aabb: &AABB) -> i32 {
    let max_dimension = aabb.max_dimension();
    if max_dimension < 1.0 {
        1
    } else {
        let exponent = (max_dimension.log2().ceil() as u32).min(MAX_GRID_LEVELS as u32 - 1);
        1 << exponent
    }
}

/// Build the AABB(s) bounding a frustum's volume for box queries
pub fn generate_boxes_for_frustum(frustum: &Frustum, results: &mut Vec<AABB>) {
    results.clear();
    results.push(frustum.bounding_box());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Mat4, Mat4Ext, Vec3};
    use crate::spatial::hash_key::MAX_PATH_SIZE;

    fn box_at(center: Vec3, half: f32) -> AABB {
        AABB::from_center_extents(center, Vec3::new(half, half, half))
    }

    #[test]
    fn test_cell_size_selection() {
        assert_eq!(find_cell_size_for_box(&box_at(Vec3::zeros(), 0.25)), 1);
        assert_eq!(find_cell_size_for_box(&box_at(Vec3::zeros(), 1.0)), 2);
        assert_eq!(find_cell_size_for_box(&box_at(Vec3::zeros(), 3.0)), 8);
        // Gigantic boxes clamp to the coarsest level
        assert_eq!(
            find_cell_size_for_box(&box_at(Vec3::zeros(), 1.0e6)),
            MAX_PATH_SIZE
        );
    }

    #[test]
    fn test_insert_then_find_within_enclosing_box() {
        let mut hash = SpatialHash::new();
        let mut entry = SpatialHashEntry::new();

        hash.insert_object_for_box(box_at(Vec3::new(2.0, 2.0, 2.0), 0.5), 1u32, &mut entry);

        let found = hash.find_objects_within_box(&box_at(Vec3::new(2.0, 2.0, 2.0), 5.0));
        assert!(found.contains(&1));
    }

    #[test]
    fn test_small_query_finds_coarser_neighbour() {
        let mut hash = SpatialHash::new();
        let mut entry = SpatialHashEntry::new();

        // A large object files at a coarse cell; a tiny query box inside
        // that cell must still find it via the ancestor walk
        hash.insert_object_for_box(box_at(Vec3::new(8.0, 8.0, 8.0), 8.0), 7u32, &mut entry);

        let found = hash.find_objects_within_box(&box_at(Vec3::new(8.0, 8.0, 8.0), 0.1));
        assert!(found.contains(&7));
    }

    #[test]
    fn test_remove_object_clears_index_and_entry() {
        let mut hash = SpatialHash::new();
        let mut entry = SpatialHashEntry::new();

        hash.insert_object_for_box(box_at(Vec3::zeros(), 1.0), 1u32, &mut entry);
        assert!(hash.key_count() > 0);
        assert!(!entry.keys().is_empty());

        hash.remove_object(1u32, &mut entry);
        assert_eq!(hash.key_count(), 0);
        assert!(entry.keys().is_empty());

        let found = hash.find_objects_within_box(&box_at(Vec3::zeros(), 10.0));
        assert!(found.is_empty());
    }

    #[test]
    fn test_update_with_same_box_is_noop() {
        let mut hash = SpatialHash::new();
        let mut entry = SpatialHashEntry::new();

        let aabb = box_at(Vec3::new(1.0, 2.0, 3.0), 0.75);
        hash.insert_object_for_box(aabb, 1u32, &mut entry);
        let keys_before = entry.keys().clone();
        let count_before = hash.key_count();

        hash.update_object_for_box(aabb, 1u32, &mut entry);

        assert_eq!(*entry.keys(), keys_before);
        assert_eq!(hash.key_count(), count_before);
    }

    #[test]
    fn test_update_moves_object_between_cells() {
        let mut hash = SpatialHash::new();
        let mut entry = SpatialHashEntry::new();

        hash.insert_object_for_box(box_at(Vec3::zeros(), 0.4), 1u32, &mut entry);
        hash.update_object_for_box(box_at(Vec3::new(50.0, 0.0, 0.0), 0.4), 1u32, &mut entry);

        let near_origin = hash.find_objects_within_box(&box_at(Vec3::zeros(), 2.0));
        assert!(!near_origin.contains(&1));

        let at_new_home = hash.find_objects_within_box(&box_at(Vec3::new(50.0, 0.0, 0.0), 2.0));
        assert!(at_new_home.contains(&1));
    }

    #[test]
    fn test_no_false_negatives_for_contained_boxes() {
        let mut hash = SpatialHash::new();
        let mut entries = Vec::new();

        // A scattering of differently sized objects inside [0, 32)^3
        let centers = [
            Vec3::new(1.5, 1.5, 1.5),
            Vec3::new(10.0, 3.0, 7.0),
            Vec3::new(25.0, 25.0, 25.0),
            Vec3::new(4.0, 30.0, 12.0),
            Vec3::new(16.0, 16.0, 16.0),
        ];
        for (i, center) in centers.iter().enumerate() {
            let mut entry = SpatialHashEntry::new();
            let half = 0.25 + i as f32 * 0.5;
            hash.insert_object_for_box(box_at(*center, half), i as u32, &mut entry);
            entries.push(entry);
        }

        // A query box containing all of them must report all of them
        let everything = AABB::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(33.0, 33.0, 33.0));
        let found = hash.find_objects_within_box(&everything);
        for i in 0..centers.len() {
            assert!(found.contains(&(i as u32)), "missing object {i}");
        }
    }

    #[test]
    fn test_frustum_query_filters_exactly() {
        let mut hash = SpatialHash::new();
        let mut visible_entry = SpatialHashEntry::new();
        let mut hidden_entry = SpatialHashEntry::new();

        let visible_box = box_at(Vec3::zeros(), 1.0);
        let hidden_box = box_at(Vec3::new(0.0, 0.0, 50.0), 1.0);

        hash.insert_object_for_box(visible_box, 1u32, &mut visible_entry);
        hash.insert_object_for_box(hidden_box, 2u32, &mut hidden_entry);

        let proj = Mat4::perspective(std::f32::consts::FRAC_PI_2, 1.0, 0.1, 100.0);
        let view = Mat4::look_at(
            Vec3::new(0.0, 0.0, 10.0),
            Vec3::zeros(),
            Vec3::new(0.0, 1.0, 0.0),
        );
        let frustum = Frustum::from_matrix(&(proj * view));

        let lookup = |id: &u32| match id {
            1 => Some(visible_box),
            2 => Some(hidden_box),
            _ => None,
        };

        let found = hash.find_objects_within_frustum(&frustum, lookup);
        assert!(found.contains(&1));
        assert!(!found.contains(&2));
    }
}
