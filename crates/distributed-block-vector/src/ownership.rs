//! Rank ownership of blocks.

use block_vector::{BlockVectorError, Result};

/// Sentinel used in raw ownership arrays for blocks held by every rank.
pub const SHARED: i64 = -1;

/// Owner of one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Owner {
    /// Exclusively owned by one rank.
    Rank(usize),
    /// Replicated identically on every rank.
    Shared,
}

/// Immutable block → owner map, identical on every rank.
///
/// # Example
/// ```
/// use distributed_block_vector::OwnershipMap;
///
/// let map = OwnershipMap::from_ranks(3, &[0, 1, -1], 2).unwrap();
/// assert_eq!(map.owned_blocks(0), vec![0, 2]);
/// assert_eq!(map.owned_blocks(1), vec![1, 2]);
/// assert_eq!(map.shared_blocks(), vec![2]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnershipMap {
    owners: Vec<Owner>,
    group_size: usize,
}

impl OwnershipMap {
    /// Build a map for `nblocks` blocks from raw rank ids.
    ///
    /// `-1` ([`SHARED`]) marks a shared block; any other entry must be a rank
    /// in `[0, group_size)`.
    pub fn from_ranks(nblocks: usize, ranks: &[i64], group_size: usize) -> Result<Self> {
        if ranks.len() != nblocks {
            return Err(BlockVectorError::InvalidOwnership(format!(
                "map has {} entries for {nblocks} blocks",
                ranks.len()
            )));
        }
        let owners = ranks
            .iter()
            .enumerate()
            .map(|(i, &r)| match r {
                SHARED => Ok(Owner::Shared),
                r if r >= 0 && (r as usize) < group_size => Ok(Owner::Rank(r as usize)),
                r => Err(BlockVectorError::InvalidOwnership(format!(
                    "block {i} assigned to rank {r} in a group of {group_size}"
                ))),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { owners, group_size })
    }

    pub fn nblocks(&self) -> usize {
        self.owners.len()
    }

    pub fn group_size(&self) -> usize {
        self.group_size
    }

    pub fn owner(&self, block: usize) -> Option<Owner> {
        self.owners.get(block).copied()
    }

    pub fn is_shared(&self, block: usize) -> bool {
        self.owner(block) == Some(Owner::Shared)
    }

    /// Whether `rank` holds data for `block`.
    pub fn is_visible(&self, block: usize, rank: usize) -> bool {
        match self.owner(block) {
            Some(Owner::Shared) => true,
            Some(Owner::Rank(r)) => r == rank,
            None => false,
        }
    }

    /// Blocks visible to `rank` (exclusive plus shared), sorted.
    pub fn owned_blocks(&self, rank: usize) -> Vec<usize> {
        (0..self.nblocks())
            .filter(|&i| self.is_visible(i, rank))
            .collect()
    }

    /// Blocks owned by `rank` alone, sorted.
    pub fn exclusive_blocks(&self, rank: usize) -> Vec<usize> {
        (0..self.nblocks())
            .filter(|&i| self.owner(i) == Some(Owner::Rank(rank)))
            .collect()
    }

    /// Shared blocks, sorted.
    pub fn shared_blocks(&self) -> Vec<usize> {
        (0..self.nblocks()).filter(|&i| self.is_shared(i)).collect()
    }

    /// Raw rank ids with [`SHARED`] for shared blocks.
    pub fn to_ranks(&self) -> Vec<i64> {
        self.owners
            .iter()
            .map(|o| match o {
                Owner::Rank(r) => *r as i64,
                Owner::Shared => SHARED,
            })
            .collect()
    }
}
