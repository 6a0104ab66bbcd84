//! Collective communication over a fixed process group.
//!
//! Every method here is a blocking collective: all ranks of the group must
//! call the same method in the same order. A rank that skips a collective
//! leaves its peers waiting.

use std::fmt::Debug;

use block_vector::{BlockVectorError, Element, ReduceOp, Result};

/// A fixed-size group of cooperating ranks.
///
/// Implementors provide `all_gather`; the remaining collectives are derived
/// from it and may be overridden by transports with native support.
pub trait Communicator: Clone + Debug + Send + Sync {
    /// Rank of the calling process in `[0, size)`.
    fn rank(&self) -> usize;

    /// Number of ranks in the group.
    fn size(&self) -> usize;

    /// Collect one value from every rank, indexed by rank.
    fn all_gather<V>(&self, value: V) -> Result<Vec<V>>
    where
        V: Clone + Send + Sync + 'static;

    /// Combine one value from every rank under `op`.
    fn all_reduce<V: Element>(&self, value: V, op: ReduceOp) -> Result<V> {
        let values = self.all_gather(value)?;
        let mut iter = values.into_iter();
        let first = iter
            .next()
            .ok_or_else(|| BlockVectorError::Communication("empty process group".into()))?;
        iter.try_fold(first, |acc, v| {
            acc.combine(v, op).ok_or_else(|| {
                BlockVectorError::Communication(format!(
                    "{op:?} is not defined for {}",
                    std::any::type_name::<V>()
                ))
            })
        })
    }

    /// Distribute `root`'s value to every rank.
    fn broadcast<V>(&self, value: V, root: usize) -> Result<V>
    where
        V: Clone + Send + Sync + 'static,
    {
        if root >= self.size() {
            return Err(BlockVectorError::Communication(format!(
                "broadcast root {root} outside group of {}",
                self.size()
            )));
        }
        let mut values = self.all_gather(value)?;
        Ok(values.swap_remove(root))
    }

    /// Wait until every rank has arrived.
    fn barrier(&self) -> Result<()> {
        self.all_gather(()).map(|_| ())
    }
}

/// A group containing only the calling process.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelfComm;

impl Communicator for SelfComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn all_gather<V>(&self, value: V) -> Result<Vec<V>>
    where
        V: Clone + Send + Sync + 'static,
    {
        Ok(vec![value])
    }
}
