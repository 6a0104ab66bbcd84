//! Collective reductions.
//!
//! Idempotent reductions (`min`, `max`, `all`, `any`) fold every visible
//! block, shared ones included, and combine the partials across ranks.
//! Count-sensitive reductions (`sum`, `prod`, `dot`, `mean`) must see each
//! shared block exactly once, so only the shared contributor rank folds them
//! in.
//!
//! Unset blocks fail on the calling rank before any communication. An empty
//! vector fails `min`/`max` on every rank after the group agrees on it.

use block_vector::{
    BlockData, BlockVectorError, Duplication, Element, ReduceOp, Reduction, Result, Scalar,
    UfuncOutput,
};
use tracing::trace;

use crate::comm::Communicator;
use crate::operand::Operand;
use crate::vector::DistributedBlockVector;

impl<T: Element, C: Communicator> DistributedBlockVector<T, C> {
    /// Whether this rank folds `block` into a reduction of class `dup`.
    fn contributes(&self, block: usize, dup: Duplication) -> bool {
        match dup {
            Duplication::Idempotent => true,
            Duplication::CountSensitive => {
                if self.ownership().is_shared(block) {
                    self.rank() == self.options().shared_contributor
                } else {
                    true
                }
            }
        }
    }

    /// Visible blocks this rank folds into a reduction of class `dup`.
    fn reduction_blocks(&self, dup: Duplication) -> Result<Vec<(usize, &BlockData<T>)>> {
        Ok(self
            .visible_blocks()?
            .into_iter()
            .filter(|(i, _)| self.contributes(*i, dup))
            .collect())
    }

    fn all_reduce_logged<V: Element>(&self, partial: V, op: ReduceOp) -> Result<V> {
        trace!(rank = self.rank(), ?op, ?partial, "reduction partial");
        self.communicator().all_reduce(partial, op)
    }

    /// Whether every element is truthy. Collective.
    pub fn all(&self) -> Result<bool> {
        let partial = self
            .reduction_blocks(Duplication::Idempotent)?
            .into_iter()
            .all(|(_, b)| b.all());
        self.all_reduce_logged(partial, ReduceOp::LogicalAnd)
    }

    /// Whether any element is truthy. Collective.
    pub fn any(&self) -> Result<bool> {
        let partial = self
            .reduction_blocks(Duplication::Idempotent)?
            .into_iter()
            .any(|(_, b)| b.any());
        self.all_reduce_logged(partial, ReduceOp::LogicalOr)
    }

    /// Whether `value` occurs anywhere in the vector. Collective.
    pub fn contains(&self, value: T) -> Result<bool> {
        let partial = self
            .reduction_blocks(Duplication::Idempotent)?
            .into_iter()
            .any(|(_, b)| b.contains(value));
        self.all_reduce_logged(partial, ReduceOp::LogicalOr)
    }
}

impl<T: Scalar, C: Communicator> DistributedBlockVector<T, C> {
    /// Sum of all elements, shared blocks counted once. Collective.
    pub fn sum(&self) -> Result<T> {
        let partial = self
            .reduction_blocks(Duplication::CountSensitive)?
            .into_iter()
            .fold(T::zero(), |acc, (_, b)| acc + b.sum());
        self.all_reduce_logged(partial, ReduceOp::Sum)
    }

    /// Product of all elements, shared blocks counted once. Collective.
    pub fn prod(&self) -> Result<T> {
        let partial = self
            .reduction_blocks(Duplication::CountSensitive)?
            .into_iter()
            .fold(T::one(), |acc, (_, b)| acc * b.prod());
        self.all_reduce_logged(partial, ReduceOp::Product)
    }

    /// Arithmetic mean. Collective; NaN for an empty vector.
    pub fn mean(&self) -> Result<T> {
        let sum = self.sum()?;
        let size = self.size()?;
        Ok(sum / T::from_f64(size as f64))
    }

    /// Smallest element. Collective.
    ///
    /// Fails on every rank if the whole vector is empty.
    pub fn min(&self) -> Result<T> {
        self.extremum(Reduction::Min)
    }

    /// Largest element. Collective.
    ///
    /// Fails on every rank if the whole vector is empty.
    pub fn max(&self) -> Result<T> {
        self.extremum(Reduction::Max)
    }

    /// Empty blocks are skipped. The result is an error on every rank only
    /// when no rank holds an element.
    fn extremum(&self, r: Reduction) -> Result<T> {
        let op = r.combine_op();
        let blocks = self.reduction_blocks(r.duplication())?;
        // neutral for ranks without elements
        let mut partial = if op == ReduceOp::Min {
            T::infinity()
        } else {
            T::neg_infinity()
        };
        let mut populated = false;
        for (_, block) in blocks {
            let local = match op {
                ReduceOp::Min => block.min(),
                _ => block.max(),
            };
            if let Some(local) = local {
                populated = true;
                partial = partial.combine(local, op).unwrap_or(partial);
            }
        }
        if !self.all_reduce_logged(populated, ReduceOp::LogicalOr)? {
            return Err(BlockVectorError::ZeroSizeReduction { op: r.name() });
        }
        self.all_reduce_logged(partial, op)
    }

    /// Inner product, shared blocks counted once. Collective.
    ///
    /// `other` may be a distributed vector with the same map, a serial block
    /// vector with the same block count, or a flat array of the full length.
    /// A flat operand needs the block lengths (collective unless cached).
    pub fn dot<'a>(&self, other: impl Into<Operand<'a, T, C>>) -> Result<T>
    where
        T: 'a,
        C: 'a,
    {
        let other = other.into();
        let blocks = self.reduction_blocks(Duplication::CountSensitive)?;
        let mismatch = |i: usize, a: &BlockData<T>, b_len: usize| BlockVectorError::ShapeMismatch {
            block: i,
            expected: a.len(),
            actual: b_len,
        };
        let mut partial = T::zero();
        match other {
            Operand::Distributed(v) => {
                self.check_compatible(v)?;
                v.visible_blocks()?;
                for (i, a) in blocks {
                    let b = v.get_block(i)?;
                    partial = partial + a.dot(b).ok_or_else(|| mismatch(i, a, b.len()))?;
                }
            }
            Operand::Serial(v) => {
                if v.nblocks() != self.nblocks() {
                    return Err(BlockVectorError::BlockCountMismatch {
                        expected: self.nblocks(),
                        actual: v.nblocks(),
                    });
                }
                for (i, a) in blocks {
                    let b = v.get_block(i)?;
                    partial = partial + a.dot(b).ok_or_else(|| mismatch(i, a, b.len()))?;
                }
            }
            Operand::Flat(data) => {
                let partition = self.partition()?;
                if partition.total_len() != data.len() {
                    return Err(BlockVectorError::SizeMismatch {
                        expected: partition.total_len(),
                        actual: data.len(),
                    });
                }
                for (i, a) in blocks {
                    let b = BlockData::from(&data[partition.block_range(i)]);
                    partial = partial + a.dot(&b).ok_or_else(|| mismatch(i, a, b.len()))?;
                }
            }
            Operand::Scalar(_) => return Err(other.rejected("dot")),
        }
        self.all_reduce_logged(partial, ReduceOp::Sum)
    }

    /// Dispatch a registry reduction. Collective.
    pub(crate) fn reduce(&self, r: Reduction) -> Result<UfuncOutput<Self, T>> {
        Ok(match r {
            Reduction::Sum => UfuncOutput::Value(self.sum()?),
            Reduction::Prod => UfuncOutput::Value(self.prod()?),
            Reduction::Min => UfuncOutput::Value(self.min()?),
            Reduction::Max => UfuncOutput::Value(self.max()?),
            Reduction::Mean => UfuncOutput::Value(self.mean()?),
            Reduction::All => UfuncOutput::Truth(self.all()?),
            Reduction::Any => UfuncOutput::Truth(self.any()?),
        })
    }
}
