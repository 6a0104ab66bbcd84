//! Layout of blocks in the flattened vector.

use std::ops::Range;

/// Block lengths of a vector together with their flat offsets.
///
/// Blocks are laid out back to back in index order, so block `i` covers
/// `offsets[i]..offsets[i + 1]` of the flattened vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockPartition {
    block_sizes: Vec<usize>,
    /// `[0, s0, s0+s1, ..., total_len]`
    offsets: Vec<usize>,
}

impl BlockPartition {
    /// Build the layout for blocks of the given lengths.
    ///
    /// # Example
    /// ```
    /// use block_vector::BlockPartition;
    /// let p = BlockPartition::new(vec![2, 0, 3]);
    /// assert_eq!(p.num_blocks(), 3);
    /// assert_eq!(p.total_len(), 5);
    /// assert_eq!(p.block_range(2), 2..5);
    /// ```
    pub fn new(block_sizes: Vec<usize>) -> Self {
        let offsets = std::iter::once(0)
            .chain(block_sizes.iter().scan(0, |end, &len| {
                *end += len;
                Some(*end)
            }))
            .collect();
        Self {
            block_sizes,
            offsets,
        }
    }

    #[inline]
    pub fn num_blocks(&self) -> usize {
        self.block_sizes.len()
    }

    /// Length of the flattened vector.
    #[inline]
    pub fn total_len(&self) -> usize {
        self.offsets.last().copied().unwrap_or(0)
    }

    #[inline]
    pub fn block_sizes(&self) -> &[usize] {
        &self.block_sizes
    }

    /// Flat positions covered by block `i`.
    ///
    /// # Panics
    /// Panics if `i >= num_blocks()`.
    #[inline]
    pub fn block_range(&self, i: usize) -> Range<usize> {
        self.offsets[i]..self.offsets[i + 1]
    }
}
