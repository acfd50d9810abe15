//! Hierarchical spatial hash keys
//!
//! A key is the path of grid cells containing a point, from the coarsest
//! cell size (2^15 units) down to the cell size the owning object was filed
//! under. If a child key is visible then all parent and child keys are
//! visible; the ordering below keeps descendant keys adjacent in an ordered
//! map so both directions are cheap to gather.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Number of levels in a key's hash path
pub const MAX_GRID_LEVELS: usize = 16;

/// Cell size of the coarsest grid level
pub const MAX_PATH_SIZE: i32 = 1 << (MAX_GRID_LEVELS - 1);

/// Grid coordinate of one level of a key's path
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GridHash {
    /// Grid X coordinate
    pub x: i16,
    /// Grid Y coordinate
    pub y: i16,
    /// Grid Z coordinate
    pub z: i16,
}

/// Compute the grid coordinate of a point at a given cell size
pub fn make_hash(cell_size: i32, x: f32, y: f32, z: f32) -> GridHash {
    let cell = cell_size as f32;
    GridHash {
        x: (x / cell).floor() as i16,
        y: (y / cell).floor() as i16,
        z: (z / cell).floor() as i16,
    }
}

/// A hierarchical key: grid path, depth, and precomputed hash code
///
/// Keys order by comparing their paths truncated to the shallower of the
/// two depths, then by depth. All of an ancestor's descendants therefore
/// sort in one contiguous run directly after the ancestor itself.
#[derive(Debug, Clone, Copy)]
pub struct Key {
    hash_path: [GridHash; MAX_GRID_LEVELS],
    ancestors: usize,
    hash_code: u64,
}

/// Build the key for a point at the given cell size
///
/// `cell_size` must be a power of two no larger than [`MAX_PATH_SIZE`].
/// The key's depth is fixed by the cell size: filing at a smaller cell
/// means carrying more ancestor levels.
pub fn make_key(cell_size: i32, x: f32, y: f32, z: f32) -> Key {
    debug_assert!(
        cell_size > 0 && cell_size <= MAX_PATH_SIZE && (cell_size & (cell_size - 1)) == 0,
        "cell size must be a power of two within the grid range"
    );

    let ancestors = (MAX_GRID_LEVELS - 1) - cell_size.trailing_zeros() as usize;

    let mut hash_path = [GridHash::default(); MAX_GRID_LEVELS];
    for (level, slot) in hash_path.iter_mut().enumerate().take(ancestors + 1) {
        *slot = make_hash(MAX_PATH_SIZE >> level, x, y, z);
    }

    Key {
        hash_path,
        ancestors,
        hash_code: compute_hash_code(&hash_path),
    }
}

impl Key {
    /// Depth of this key below the coarsest level
    pub fn ancestors(&self) -> usize {
        self.ancestors
    }

    /// True when this key sits at the coarsest grid level
    pub fn is_root(&self) -> bool {
        self.ancestors == 0
    }

    /// The key one level coarser than this one
    ///
    /// # Panics
    ///
    /// Panics when called on a root key, which has no parent.
    pub fn parent_key(&self) -> Key {
        assert!(!self.is_root(), "a root key has no parent");

        let mut hash_path = [GridHash::default(); MAX_GRID_LEVELS];
        hash_path[..self.ancestors].copy_from_slice(&self.hash_path[..self.ancestors]);

        Key {
            hash_path,
            ancestors: self.ancestors - 1,
            hash_code: compute_hash_code(&hash_path),
        }
    }

    /// True when `other` lies in this key's subtree
    ///
    /// A key is considered an ancestor of itself.
    pub fn is_ancestor_of(&self, other: &Key) -> bool {
        if self.ancestors > other.ancestors {
            return false;
        }
        self.hash_path[..=self.ancestors] == other.hash_path[..=self.ancestors]
    }
}

fn compute_hash_code(path: &[GridHash; MAX_GRID_LEVELS]) -> u64 {
    let mut seed: u64 = 0;
    for hash in path {
        hash_combine(&mut seed, hash.x as u64);
        hash_combine(&mut seed, hash.y as u64);
        hash_combine(&mut seed, hash.z as u64);
    }
    seed
}

pub(crate) fn hash_combine(seed: &mut u64, value: u64) {
    *seed ^= value
        .wrapping_add(0x9e37_79b9)
        .wrapping_add(*seed << 6)
        .wrapping_add(*seed >> 2);
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.ancestors.min(other.ancestors) + 1;
        match self.hash_path[..len].cmp(&other.hash_path[..len]) {
            Ordering::Equal => self.ancestors.cmp(&other.ancestors),
            ordering => ordering,
        }
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Key {}

impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Unused path slots are always zeroed, so equal keys share a code
        state.write_u64(self.hash_code);
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (level, hash) in self.hash_path[..=self.ancestors].iter().enumerate() {
            if level > 0 {
                write!(f, " / ")?;
            }
            write!(f, "{},{},{}", hash.x, hash.y, hash.z)?;
        }
        Ok(())
    }
}
