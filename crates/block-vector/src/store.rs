//! Local block store: block index → block data, with fixed block lengths.

use crate::block_data::BlockData;
use crate::error::{BlockVectorError, Result};
use crate::scalar::Element;

/// In-memory table of blocks held by one process.
///
/// A block's length is fixed by its first assignment; later assignments must
/// match it. Contents stay replaceable.
#[derive(Debug, Clone)]
pub struct BlockStore<T: Element> {
    blocks: Vec<Option<BlockData<T>>>,
    lengths: Vec<Option<usize>>,
}

impl<T: Element> BlockStore<T> {
    /// Create a store with `nblocks` unset slots.
    pub fn new(nblocks: usize) -> Self {
        Self {
            blocks: vec![None; nblocks],
            lengths: vec![None; nblocks],
        }
    }

    /// Create a store from per-slot blocks; each present block fixes its
    /// slot's length.
    pub fn from_slots(blocks: Vec<Option<BlockData<T>>>) -> Self {
        let lengths = blocks.iter().map(|b| b.as_ref().map(BlockData::len)).collect();
        Self { blocks, lengths }
    }

    /// Number of slots.
    pub fn nblocks(&self) -> usize {
        self.blocks.len()
    }

    fn check_index(&self, i: usize) -> Result<()> {
        if i >= self.nblocks() {
            return Err(BlockVectorError::BlockIndexOutOfBounds {
                index: i,
                nblocks: self.nblocks(),
            });
        }
        Ok(())
    }

    /// Store `data` at `i`.
    pub fn set(&mut self, i: usize, data: BlockData<T>) -> Result<()> {
        self.check_index(i)?;
        match self.lengths[i] {
            Some(expected) if expected != data.len() => {
                return Err(BlockVectorError::ShapeMismatch {
                    block: i,
                    expected,
                    actual: data.len(),
                });
            }
            Some(_) => {}
            None => self.lengths[i] = Some(data.len()),
        }
        self.blocks[i] = Some(data);
        Ok(())
    }

    /// Get the block at `i`.
    pub fn get(&self, i: usize) -> Result<&BlockData<T>> {
        self.check_index(i)?;
        self.blocks[i].as_ref().ok_or(BlockVectorError::NotSet(i))
    }

    /// Whether `i` has been populated. Out-of-range indices are unset.
    pub fn is_set(&self, i: usize) -> bool {
        self.blocks.get(i).is_some_and(|b| b.is_some())
    }

    /// Length of block `i`, if known.
    pub fn length(&self, i: usize) -> Option<usize> {
        self.lengths.get(i).copied().flatten()
    }
}
