//! Distributed block vector: construction, access and structural copies.

use std::sync::{Arc, OnceLock};

use block_vector::{
    BlockData, BlockPartition, BlockStore, BlockVector, BlockVectorError, Element, Result,
};
use tracing::debug;

use crate::comm::Communicator;
use crate::operand::Operand;
use crate::options::DistributedOptions;
use crate::ownership::OwnershipMap;

/// A block vector whose blocks are spread over the ranks of a process group.
///
/// Every rank builds the vector with the same ownership map. A rank stores
/// only the blocks it owns plus every shared block; shared blocks must be
/// set to identical values on every rank.
///
/// Elementwise operations and accessors are local. Reductions, `size`,
/// `block_sizes` and `make_local_copy` are collectives and must be called by
/// every rank in the same order.
///
/// # Example
/// ```
/// use distributed_block_vector::{DistributedBlockVector, LocalGroup};
///
/// let sums = LocalGroup::run(2, |comm| {
///     let mut v = DistributedBlockVector::<f64, _>::new(3, &[0, 1, -1], comm)?;
///     for i in v.owned_blocks() {
///         v.set_block(i, [1.0, 2.0])?;
///     }
///     v.sum()
/// })
/// .unwrap();
/// assert_eq!(sums[0].as_ref().unwrap(), &9.0);
/// assert_eq!(sums[1].as_ref().unwrap(), &9.0);
/// ```
#[derive(Debug, Clone)]
pub struct DistributedBlockVector<T: Element, C: Communicator> {
    ownership: Arc<OwnershipMap>,
    comm: C,
    options: DistributedOptions,
    store: BlockStore<T>,
    /// Lengths of all blocks, filled by the first successful exchange.
    block_sizes: OnceLock<Vec<usize>>,
}

impl<T: Element, C: Communicator> DistributedBlockVector<T, C> {
    /// Create a vector of `nblocks` blocks owned according to `ranks`
    /// (`-1` marks a shared block).
    pub fn new(nblocks: usize, ranks: &[i64], comm: C) -> Result<Self> {
        Self::with_options(nblocks, ranks, comm, DistributedOptions::default())
    }

    pub fn with_options(
        nblocks: usize,
        ranks: &[i64],
        comm: C,
        options: DistributedOptions,
    ) -> Result<Self> {
        let ownership = OwnershipMap::from_ranks(nblocks, ranks, comm.size())?;
        Self::from_ownership(Arc::new(ownership), comm, options)
    }

    /// Create a vector over an existing ownership map.
    pub fn from_ownership(
        ownership: Arc<OwnershipMap>,
        comm: C,
        options: DistributedOptions,
    ) -> Result<Self> {
        if ownership.group_size() != comm.size() {
            return Err(BlockVectorError::InvalidOwnership(format!(
                "map built for {} ranks used in a group of {}",
                ownership.group_size(),
                comm.size()
            )));
        }
        if options.shared_contributor >= comm.size() {
            return Err(BlockVectorError::InvalidOwnership(format!(
                "shared contributor {} outside group of {}",
                options.shared_contributor,
                comm.size()
            )));
        }
        Ok(Self {
            store: BlockStore::new(ownership.nblocks()),
            ownership,
            comm,
            options,
            block_sizes: OnceLock::new(),
        })
    }

    /// Build a vector with this vector's map from a prepared store.
    pub(crate) fn derive<U: Element>(
        &self,
        store: BlockStore<U>,
        keep_lengths: bool,
    ) -> DistributedBlockVector<U, C> {
        let block_sizes = match self.block_sizes.get() {
            Some(sizes) if keep_lengths => OnceLock::from(sizes.clone()),
            _ => OnceLock::new(),
        };
        DistributedBlockVector {
            ownership: Arc::clone(&self.ownership),
            comm: self.comm.clone(),
            options: self.options.clone(),
            store,
            block_sizes,
        }
    }

    /// Build a vector by mapping every visible block.
    pub(crate) fn map_blocks<U: Element>(
        &self,
        keep_lengths: bool,
        mut f: impl FnMut(usize, &BlockData<T>) -> Result<BlockData<U>>,
    ) -> Result<DistributedBlockVector<U, C>> {
        let mut store = BlockStore::new(self.nblocks());
        for (i, block) in self.visible_blocks()? {
            store.set(i, f(i, block)?)?;
        }
        Ok(self.derive(store, keep_lengths))
    }

    /// Replace the local blocks with those of `other`, which must share this
    /// vector's map and lengths.
    pub(crate) fn replace_store(&mut self, other: DistributedBlockVector<T, C>) -> Result<()> {
        for (i, block) in other.visible_blocks()? {
            self.store.set(i, block.clone())?;
        }
        Ok(())
    }

    pub fn nblocks(&self) -> usize {
        self.ownership.nblocks()
    }

    /// Block shape, `(nblocks,)`.
    pub fn bshape(&self) -> (usize,) {
        (self.nblocks(),)
    }

    pub fn ndim(&self) -> usize {
        1
    }

    pub fn rank(&self) -> usize {
        self.comm.rank()
    }

    pub fn communicator(&self) -> &C {
        &self.comm
    }

    pub fn ownership(&self) -> &Arc<OwnershipMap> {
        &self.ownership
    }

    pub fn options(&self) -> &DistributedOptions {
        &self.options
    }

    /// Blocks visible to this rank (exclusive plus shared), sorted.
    pub fn owned_blocks(&self) -> Vec<usize> {
        self.ownership.owned_blocks(self.rank())
    }

    /// Blocks owned by this rank alone, sorted.
    pub fn exclusive_blocks(&self) -> Vec<usize> {
        self.ownership.exclusive_blocks(self.rank())
    }

    pub fn shared_blocks(&self) -> Vec<usize> {
        self.ownership.shared_blocks()
    }

    pub fn is_visible(&self, i: usize) -> bool {
        self.ownership.is_visible(i, self.rank())
    }

    fn check_visible(&self, i: usize) -> Result<()> {
        if i >= self.nblocks() {
            return Err(BlockVectorError::BlockIndexOutOfBounds {
                index: i,
                nblocks: self.nblocks(),
            });
        }
        if !self.is_visible(i) {
            return Err(BlockVectorError::Ownership {
                block: i,
                rank: self.rank(),
            });
        }
        Ok(())
    }

    /// Store `data` in block `i`, which must be visible to this rank.
    pub fn set_block(&mut self, i: usize, data: impl Into<BlockData<T>>) -> Result<()> {
        self.check_visible(i)?;
        self.store.set(i, data.into())
    }

    pub fn get_block(&self, i: usize) -> Result<&BlockData<T>> {
        self.check_visible(i)?;
        self.store.get(i)
    }

    /// Whether block `i` is visible and set. Never fails.
    pub fn is_set(&self, i: usize) -> bool {
        self.is_visible(i) && self.store.is_set(i)
    }

    /// Whether any block visible to this rank is unset.
    pub fn has_none(&self) -> bool {
        self.owned_blocks().into_iter().any(|i| !self.store.is_set(i))
    }

    fn unset_blocks(&self) -> Vec<usize> {
        self.owned_blocks()
            .into_iter()
            .filter(|&i| !self.store.is_set(i))
            .collect()
    }

    /// Visible blocks with their indices; fails if any is unset.
    pub fn visible_blocks(&self) -> Result<Vec<(usize, &BlockData<T>)>> {
        if self.has_none() {
            return Err(BlockVectorError::IncompleteVector {
                blocks: self.unset_blocks(),
            });
        }
        self.owned_blocks()
            .into_iter()
            .map(|i| self.store.get(i).map(|b| (i, b)))
            .collect()
    }

    /// Overwrite every visible block with `value`, keeping block lengths.
    pub fn fill(&mut self, value: T) -> Result<()> {
        let owned = self.owned_blocks();
        let unknown: Vec<usize> = owned
            .iter()
            .copied()
            .filter(|&i| self.store.length(i).is_none())
            .collect();
        if !unknown.is_empty() {
            return Err(BlockVectorError::IncompleteVector { blocks: unknown });
        }
        for i in owned {
            if let Some(len) = self.store.length(i) {
                self.store.set(i, BlockData::filled(len, value))?;
            }
        }
        Ok(())
    }

    /// Length of every block in the group.
    ///
    /// Collective on first use: ranks exchange the lengths of their visible
    /// blocks. The result is cached once every length is known.
    pub fn block_sizes(&self) -> Result<Vec<usize>> {
        if let Some(sizes) = self.block_sizes.get() {
            return Ok(sizes.clone());
        }
        let local: Vec<(usize, usize)> = self
            .owned_blocks()
            .into_iter()
            .filter_map(|i| self.store.length(i).map(|len| (i, len)))
            .collect();
        debug!(
            rank = self.rank(),
            known = local.len(),
            "exchanging block lengths"
        );
        let gathered = self.comm.all_gather(local)?;

        let mut sizes: Vec<Option<usize>> = vec![None; self.nblocks()];
        for (i, len) in gathered.into_iter().flatten() {
            match sizes.get(i).copied().flatten() {
                Some(expected) if expected != len => {
                    return Err(BlockVectorError::ShapeMismatch {
                        block: i,
                        expected,
                        actual: len,
                    });
                }
                _ => {
                    if let Some(slot) = sizes.get_mut(i) {
                        *slot = Some(len);
                    }
                }
            }
        }
        let missing: Vec<usize> = sizes
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.is_none().then_some(i))
            .collect();
        if !missing.is_empty() {
            return Err(BlockVectorError::IncompleteVector { blocks: missing });
        }
        let sizes: Vec<usize> = sizes.into_iter().flatten().collect();
        Ok(self.block_sizes.get_or_init(|| sizes).clone())
    }

    /// Total length, each block counted once. Collective on first use.
    pub fn size(&self) -> Result<usize> {
        Ok(self.block_sizes()?.iter().sum())
    }

    /// `(size,)`. Collective on first use.
    pub fn shape(&self) -> Result<(usize,)> {
        Ok((self.size()?,))
    }

    /// Partition of the flattened vector. Collective on first use.
    pub fn partition(&self) -> Result<BlockPartition> {
        Ok(BlockPartition::new(self.block_sizes()?))
    }

    /// A vector with the same map and block lengths, filled with zeros.
    ///
    /// Visible blocks of unknown length stay unset.
    pub fn copy_structure(&self) -> Self {
        let slots = (0..self.nblocks())
            .map(|i| {
                self.is_visible(i)
                    .then(|| self.store.length(i))
                    .flatten()
                    .map(|len| BlockData::filled(len, T::default()))
            })
            .collect();
        self.derive(BlockStore::from_slots(slots), true)
    }

    /// Copy this vector's visible blocks into `other`.
    pub fn copyto(&self, other: &mut Self) -> Result<()> {
        other.copyfrom(self)
    }

    /// Overwrite the visible blocks from `source`.
    ///
    /// `source` may be a distributed vector with the same map, a serial block
    /// vector, or a flat array. The copy reads only local data, except that a
    /// flat source needs the block lengths (collective unless cached).
    pub fn copyfrom<'a>(&mut self, source: impl Into<Operand<'a, T, C>>) -> Result<()>
    where
        T: 'a,
        C: 'a,
    {
        let owned = self.owned_blocks();
        let staged: Vec<(usize, BlockData<T>)> = match source.into() {
            Operand::Distributed(other) => {
                self.check_compatible(other)?;
                owned
                    .into_iter()
                    .map(|i| other.get_block(i).map(|b| (i, b.clone())))
                    .collect::<Result<_>>()?
            }
            Operand::Serial(other) => {
                if other.nblocks() != self.nblocks() {
                    return Err(BlockVectorError::BlockCountMismatch {
                        expected: self.nblocks(),
                        actual: other.nblocks(),
                    });
                }
                owned
                    .into_iter()
                    .map(|i| other.get_block(i).map(|b| (i, b.clone())))
                    .collect::<Result<_>>()?
            }
            Operand::Flat(data) => {
                let partition = self.partition()?;
                if partition.total_len() != data.len() {
                    return Err(BlockVectorError::SizeMismatch {
                        expected: partition.total_len(),
                        actual: data.len(),
                    });
                }
                owned
                    .into_iter()
                    .map(|i| (i, BlockData::from(&data[partition.block_range(i)])))
                    .collect()
            }
            Operand::Scalar(_) => {
                return Err(BlockVectorError::IncompatibleStructure(
                    "copyfrom needs a vector or flat array; use fill for scalars".into(),
                ));
            }
        };
        // nothing is written unless every block fits
        for (i, block) in &staged {
            if let Some(expected) = self.store.length(*i) {
                if expected != block.len() {
                    return Err(BlockVectorError::ShapeMismatch {
                        block: *i,
                        expected,
                        actual: block.len(),
                    });
                }
            }
        }
        for (i, block) in staged {
            self.store.set(i, block)?;
        }
        Ok(())
    }

    /// Require `other` to have the same ownership map.
    pub(crate) fn check_compatible<S: Element>(
        &self,
        other: &DistributedBlockVector<S, C>,
    ) -> Result<()> {
        if Arc::ptr_eq(&self.ownership, &other.ownership) || self.ownership == other.ownership {
            return Ok(());
        }
        Err(BlockVectorError::IncompatibleStructure(format!(
            "ownership maps differ: {:?} vs {:?}",
            self.ownership.to_ranks(),
            other.ownership.to_ranks()
        )))
    }

    /// Gather every block onto every rank as a serial block vector.
    ///
    /// Collective. Shared blocks are taken from the shared contributor rank;
    /// with `verify_shared_blocks` every rank's copy is compared first.
    pub fn make_local_copy(&self) -> Result<BlockVector<T>> {
        let local: Vec<(usize, Vec<T>)> = self
            .owned_blocks()
            .into_iter()
            .filter_map(|i| self.store.get(i).ok().map(|b| (i, b.to_vec())))
            .collect();
        debug!(rank = self.rank(), blocks = local.len(), "gathering local copy");
        let gathered = self.comm.all_gather(local)?;

        let mut blocks: Vec<Option<Vec<T>>> = vec![None; self.nblocks()];
        for (rank, contribution) in gathered.iter().enumerate() {
            for (i, data) in contribution {
                let Some(slot) = blocks.get_mut(*i) else {
                    continue;
                };
                if !self.ownership.is_shared(*i) {
                    *slot = Some(data.clone());
                    continue;
                }
                if self.options.verify_shared_blocks {
                    if let Some(existing) = slot.as_ref() {
                        if existing != data {
                            return Err(BlockVectorError::InconsistentSharedBlock { block: *i });
                        }
                    }
                }
                if slot.is_none() || rank == self.options.shared_contributor {
                    *slot = Some(data.clone());
                }
            }
        }

        let missing: Vec<usize> = blocks
            .iter()
            .enumerate()
            .filter_map(|(i, b)| b.is_none().then_some(i))
            .collect();
        if !missing.is_empty() {
            return Err(BlockVectorError::IncompleteVector { blocks: missing });
        }
        Ok(BlockVector::from_blocks(
            blocks.into_iter().flatten().map(BlockData::new).collect(),
        ))
    }

    /// Concatenate every block in index order on every rank. Collective.
    pub fn flatten(&self) -> Result<Vec<T>> {
        self.make_local_copy()?.flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::SelfComm;

    fn single(nblocks: usize) -> DistributedBlockVector<f64, SelfComm> {
        let ranks = vec![0; nblocks];
        DistributedBlockVector::new(nblocks, &ranks, SelfComm).unwrap()
    }

    #[test]
    fn test_construction_validates_map() {
        assert!(DistributedBlockVector::<f64, _>::new(2, &[0], SelfComm).is_err());
        assert!(DistributedBlockVector::<f64, _>::new(2, &[0, 1], SelfComm).is_err());
        let opts = DistributedOptions::default().with_shared_contributor(1);
        assert!(DistributedBlockVector::<f64, _>::with_options(1, &[-1], SelfComm, opts).is_err());
    }

    #[test]
    fn test_set_get_round_trip() {
        let mut v = single(2);
        v.set_block(0, [1.0, 2.0]).unwrap();
        assert_eq!(v.get_block(0).unwrap().to_vec(), vec![1.0, 2.0]);
        assert!(v.is_set(0));
        assert!(!v.is_set(1));
        assert!(v.has_none());
        assert_eq!(v.get_block(1).unwrap_err(), BlockVectorError::NotSet(1));
        assert!(matches!(
            v.set_block(0, [1.0]),
            Err(BlockVectorError::ShapeMismatch { block: 0, .. })
        ));
    }

    #[test]
    fn test_block_sizes_cached_after_success() {
        let mut v = single(2);
        v.set_block(0, [1.0, 2.0]).unwrap();
        assert_eq!(
            v.block_sizes().unwrap_err(),
            BlockVectorError::IncompleteVector { blocks: vec![1] }
        );
        v.set_block(1, [3.0]).unwrap();
        assert_eq!(v.block_sizes().unwrap(), vec![2, 1]);
        assert_eq!(v.size().unwrap(), 3);
        assert_eq!(v.shape().unwrap(), (3,));
        assert_eq!(v.bshape(), (2,));
        assert_eq!(v.ndim(), 1);
    }

    #[test]
    fn test_fill_requires_known_lengths() {
        let mut v = single(2);
        v.set_block(0, [1.0, 2.0]).unwrap();
        assert!(v.fill(3.0).is_err());
        v.set_block(1, [0.0]).unwrap();
        v.fill(3.0).unwrap();
        assert_eq!(v.flatten().unwrap(), vec![3.0, 3.0, 3.0]);
    }

    #[test]
    fn test_copy_structure_and_copyfrom() {
        let mut v = single(2);
        v.set_block(0, [1.0, 2.0]).unwrap();
        v.set_block(1, [3.0]).unwrap();
        let mut w = v.copy_structure();
        assert_eq!(w.flatten().unwrap(), vec![0.0, 0.0, 0.0]);
        w.copyfrom(&v).unwrap();
        assert_eq!(w.flatten().unwrap(), v.flatten().unwrap());

        let flat = [7.0, 8.0, 9.0];
        w.copyfrom(&flat[..]).unwrap();
        assert_eq!(w.flatten().unwrap(), flat.to_vec());
        assert!(matches!(
            w.copyfrom(&[1.0][..]),
            Err(BlockVectorError::SizeMismatch { expected: 3, actual: 1 })
        ));
        assert!(matches!(
            w.copyfrom(1.0),
            Err(BlockVectorError::IncompatibleStructure(_))
        ));
    }

    #[test]
    fn test_copyfrom_serial() {
        let serial = BlockVector::from_blocks(vec![BlockData::from([4.0]), BlockData::from([5.0])]);
        let mut v = single(2);
        v.copyfrom(&serial).unwrap();
        assert_eq!(v.make_local_copy().unwrap(), serial);
        let short = BlockVector::from_blocks(vec![BlockData::from([4.0])]);
        assert!(matches!(
            v.copyfrom(&short),
            Err(BlockVectorError::BlockCountMismatch { expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn test_failed_copyfrom_leaves_vector_untouched() {
        let mut v = single(3);
        for (i, data) in [vec![1.0], vec![2.0, 2.0], vec![3.0]].into_iter().enumerate() {
            v.set_block(i, data).unwrap();
        }
        let before = v.flatten().unwrap();

        // last block missing
        let mut partial = BlockVector::<f64>::new(3);
        partial.set_block(0, [9.0]).unwrap();
        partial.set_block(1, [9.0, 9.0]).unwrap();
        assert_eq!(v.copyfrom(&partial).unwrap_err(), BlockVectorError::NotSet(2));
        assert_eq!(v.flatten().unwrap(), before);

        // last block has the wrong length
        partial.set_block(2, [9.0, 9.0]).unwrap();
        assert_eq!(
            v.copyfrom(&partial).unwrap_err(),
            BlockVectorError::ShapeMismatch {
                block: 2,
                expected: 1,
                actual: 2
            }
        );
        assert_eq!(v.flatten().unwrap(), before);
    }
}
