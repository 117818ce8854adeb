/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::Score;

/// Number of bytes in a megabyte
const BYTES_IN_MB: usize = 1024 * 1024;

/// Type of node encountered during search.
///
/// See [CPW](https://www.chessprogramming.org/Node_Types) for more.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Hash)]
pub enum NodeType {
    /// The score is exact.
    Exact,

    /// The score is greater than beta (lower bound).
    Lower,

    /// The score is less than the original alpha (upper bound).
    Upper,
}

impl NodeType {
    /// Creates a new [`NodeType`] for a fail-soft search result:
    ///
    /// ```text
    /// if score < original alpha:
    ///     UPPERBOUND
    /// else if score > beta:
    ///     LOWERBOUND
    /// else:
    ///     EXACT
    /// ```
    #[inline(always)]
    pub fn new(score: Score, orig_alpha: Score, beta: Score) -> Self {
        if score < orig_alpha {
            Self::Upper
        } else if score > beta {
            Self::Lower
        } else {
            Self::Exact
        }
    }
}

/// An entry into a hash table
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub struct TTableEntry {
    /// Key of the node this entry represents.
    pub key: u64,

    /// Depth at which the data for this entry was found.
    pub depth: u8,

    /// Best score found for this position.
    pub score: Score,

    /// Node type of this entry.
    pub node_type: NodeType,
}

impl TTableEntry {
    /// Creates a new [`TTableEntry`] from the provided parameters.
    #[inline(always)]
    pub fn new(key: u64, depth: u8, score: Score, node_type: NodeType) -> Self {
        Self {
            key,
            depth,
            score,
            node_type,
        }
    }
}

/// Transposition Table.
///
/// A direct-mapped, always-replace cache of search results, keyed by the
/// position's Zobrist hash. On an index collision the incoming entry
/// overwrites the resident one; there is no chaining.
#[derive(Debug)]
pub struct TTable {
    /// Internal cache of the TTable.
    cache: Vec<Option<TTableEntry>>,

    /// Number of probes that have occurred since last clearing.
    pub(crate) accesses: usize,

    /// Number of hits that have occurred since last clearing.
    pub(crate) hits: usize,

    /// Number of collisions that have occurred since last clearing.
    pub(crate) collisions: usize,
}

impl TTable {
    /// Default capacity of the Transposition Table, in entries.
    pub const DEFAULT_CAPACITY: usize = 1 << 24;

    /// Default size of the Transposition Table, in megabytes, for the UCI `Hash` option.
    pub const DEFAULT_SIZE: usize = 16;

    /// Minimum size of the Transposition Table, in megabytes.
    pub const MIN_SIZE: usize = 1;

    /// Maximum size of the Transposition Table, in megabytes.
    pub const MAX_SIZE: usize = 1_024;

    /// Create a new [`TTable`] that is `size` megabytes.
    ///
    /// Its size will be `size_of::<TTableEntry>() * capacity`
    #[inline(always)]
    pub fn new(size: usize) -> Self {
        Self::from_capacity((size * BYTES_IN_MB) / std::mem::size_of::<TTableEntry>())
    }

    /// Create a new [`TTable`] that can hold `capacity` entries.
    #[inline(always)]
    pub fn from_capacity(capacity: usize) -> Self {
        Self {
            cache: vec![None; capacity.max(1)],
            accesses: 0,
            hits: 0,
            collisions: 0,
        }
    }

    /// Clears the entries of this [`TTable`].
    ///
    /// Also resets all collected stats.
    #[inline(always)]
    pub fn clear(&mut self) {
        self.cache.iter_mut().for_each(|entry| *entry = None);
        self.accesses = 0;
        self.hits = 0;
        self.collisions = 0;
    }

    /// Returns the number of entries that can fit within this [`TTable`]
    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.cache.len()
    }

    /// Returns the size of this [`TTable`], in megabytes.
    #[inline(always)]
    pub fn size(&self) -> usize {
        self.cache.len() * std::mem::size_of::<TTableEntry>() / BYTES_IN_MB
    }

    /// Returns the number of `Some` entries in this [`TTable`].
    #[inline(always)]
    pub fn num_entries(&self) -> usize {
        self.cache.iter().filter(|entry| entry.is_some()).count()
    }

    /// Map `key` to an index into this [`TTable`].
    ///
    /// The capacity does not need to be a power of two.
    #[inline(always)]
    pub fn index(&self, key: u64) -> usize {
        (key % self.capacity() as u64) as usize
    }

    /// Get the entry if and only if it matches the provided key
    #[inline(always)]
    pub fn get(&self, key: u64) -> Option<&TTableEntry> {
        self.cache[self.index(key)]
            .as_ref()
            .filter(|entry| entry.key == key)
    }

    /// Store `entry` in the table at `entry.key`, overriding and returning whatever was there.
    #[inline(always)]
    pub fn store(&mut self, entry: TTableEntry) -> Option<TTableEntry> {
        let index = self.index(entry.key);
        self.cache[index].replace(entry)
    }
}

impl Default for TTable {
    #[inline(always)]
    fn default() -> Self {
        Self::new(Self::DEFAULT_SIZE)
    }
}
