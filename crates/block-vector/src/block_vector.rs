//! Serial block vector.

use std::ops::{Add, Div, Mul, Neg, Sub};

use crate::block_data::BlockData;
use crate::error::{BlockVectorError, Result};
use crate::partition::BlockPartition;
use crate::scalar::{Element, Scalar};
use crate::store::BlockStore;
use crate::ufunc::{
    round_decimals, BinaryFunc, Capability, CompareOp, LogicalOp, Reduction, UfuncOutput,
    UnaryFunc,
};

/// A vector split into a fixed number of 1D blocks, all held by one process.
///
/// Every block must be set before arithmetic or reductions; block lengths are
/// fixed by their first assignment.
#[derive(Debug, Clone)]
pub struct BlockVector<T: Element> {
    store: BlockStore<T>,
}

impl<T: Element> BlockVector<T> {
    /// Create a vector with `nblocks` unset blocks.
    pub fn new(nblocks: usize) -> Self {
        Self {
            store: BlockStore::new(nblocks),
        }
    }

    /// Create a vector from its blocks, in order.
    pub fn from_blocks(blocks: Vec<BlockData<T>>) -> Self {
        Self {
            store: BlockStore::from_slots(blocks.into_iter().map(Some).collect()),
        }
    }

    /// Split a flat array according to `partition`.
    pub fn from_flat(partition: &BlockPartition, data: &[T]) -> Result<Self> {
        if partition.total_len() != data.len() {
            return Err(BlockVectorError::SizeMismatch {
                expected: partition.total_len(),
                actual: data.len(),
            });
        }
        let blocks = (0..partition.num_blocks())
            .map(|i| BlockData::from(&data[partition.block_range(i)]))
            .collect();
        Ok(Self::from_blocks(blocks))
    }

    /// Number of blocks.
    pub fn nblocks(&self) -> usize {
        self.store.nblocks()
    }

    /// Block shape, `(nblocks,)`.
    pub fn bshape(&self) -> (usize,) {
        (self.nblocks(),)
    }

    pub fn set_block(&mut self, i: usize, data: impl Into<BlockData<T>>) -> Result<()> {
        self.store.set(i, data.into())
    }

    /// Set every block from `blocks`, in order.
    pub fn set_blocks(&mut self, blocks: Vec<BlockData<T>>) -> Result<()> {
        if blocks.len() != self.nblocks() {
            return Err(BlockVectorError::BlockCountMismatch {
                expected: self.nblocks(),
                actual: blocks.len(),
            });
        }
        for (i, block) in blocks.into_iter().enumerate() {
            self.store.set(i, block)?;
        }
        Ok(())
    }

    pub fn get_block(&self, i: usize) -> Result<&BlockData<T>> {
        self.store.get(i)
    }

    pub fn is_set(&self, i: usize) -> bool {
        self.store.is_set(i)
    }

    /// Whether any block is unset.
    pub fn has_none(&self) -> bool {
        (0..self.nblocks()).any(|i| !self.store.is_set(i))
    }

    fn unset_blocks(&self) -> Vec<usize> {
        (0..self.nblocks())
            .filter(|&i| !self.store.is_set(i))
            .collect()
    }

    /// All blocks, or `IncompleteVector` if any is unset.
    pub fn blocks(&self) -> Result<Vec<&BlockData<T>>> {
        if self.has_none() {
            return Err(BlockVectorError::IncompleteVector {
                blocks: self.unset_blocks(),
            });
        }
        (0..self.nblocks()).map(|i| self.store.get(i)).collect()
    }

    /// Length of every block. Fails if any length is unknown.
    pub fn block_sizes(&self) -> Result<Vec<usize>> {
        (0..self.nblocks())
            .map(|i| {
                self.store
                    .length(i)
                    .ok_or_else(|| BlockVectorError::IncompleteVector {
                        blocks: self.unset_blocks(),
                    })
            })
            .collect()
    }

    /// Total number of elements.
    pub fn size(&self) -> Result<usize> {
        Ok(self.block_sizes()?.iter().sum())
    }

    pub fn partition(&self) -> Result<BlockPartition> {
        Ok(BlockPartition::new(self.block_sizes()?))
    }

    /// Concatenate every block in index order.
    pub fn flatten(&self) -> Result<Vec<T>> {
        Ok(self.blocks()?.into_iter().flat_map(|b| b.values()).collect())
    }

    /// Overwrite every element with `value`, keeping block lengths.
    pub fn fill(&mut self, value: T) -> Result<()> {
        let sizes = self.block_sizes()?;
        for (i, len) in sizes.into_iter().enumerate() {
            self.store.set(i, BlockData::filled(len, value))?;
        }
        Ok(())
    }

    /// Apply `f` to every element.
    pub fn map<U: Element>(&self, mut f: impl FnMut(T) -> U) -> Result<BlockVector<U>> {
        let blocks = self.blocks()?.into_iter().map(|b| b.map(&mut f)).collect();
        Ok(BlockVector::from_blocks(blocks))
    }

    /// Combine with another vector of the same structure, block by block.
    pub fn zip_map<S: Element, U: Element>(
        &self,
        other: &BlockVector<S>,
        mut f: impl FnMut(T, S) -> U,
    ) -> Result<BlockVector<U>> {
        if self.nblocks() != other.nblocks() {
            return Err(BlockVectorError::BlockCountMismatch {
                expected: self.nblocks(),
                actual: other.nblocks(),
            });
        }
        let lhs = self.blocks()?;
        let rhs = other.blocks()?;
        let mut out = Vec::with_capacity(lhs.len());
        for (i, (a, b)) in lhs.into_iter().zip(rhs).enumerate() {
            let block = a
                .zip_map(b, &mut f)
                .ok_or(BlockVectorError::ShapeMismatch {
                    block: i,
                    expected: a.len(),
                    actual: b.len(),
                })?;
            out.push(block);
        }
        Ok(BlockVector::from_blocks(out))
    }

    /// Keep the elements where `mask` is true, block by block.
    pub fn compress(&self, mask: &BlockVector<bool>) -> Result<Self> {
        if self.nblocks() != mask.nblocks() {
            return Err(BlockVectorError::BlockCountMismatch {
                expected: self.nblocks(),
                actual: mask.nblocks(),
            });
        }
        let data = self.blocks()?;
        let masks = mask.blocks()?;
        let mut out = Vec::with_capacity(data.len());
        for (i, (b, m)) in data.into_iter().zip(masks).enumerate() {
            out.push(b.compress(m).ok_or(BlockVectorError::ShapeMismatch {
                block: i,
                expected: b.len(),
                actual: m.len(),
            })?);
        }
        Ok(Self::from_blocks(out))
    }

    /// Block-local positions of the truthy elements.
    pub fn nonzero(&self) -> Result<BlockVector<usize>> {
        let blocks = self.blocks()?.into_iter().map(|b| b.nonzero()).collect();
        Ok(BlockVector::from_blocks(blocks))
    }

    pub fn all(&self) -> Result<bool> {
        Ok(self.blocks()?.into_iter().all(|b| b.all()))
    }

    pub fn any(&self) -> Result<bool> {
        Ok(self.blocks()?.into_iter().any(|b| b.any()))
    }

    pub fn contains(&self, value: T) -> Result<bool> {
        Ok(self.blocks()?.into_iter().any(|b| b.contains(value)))
    }
}

impl<T: Scalar> BlockVector<T> {
    /// Elementwise binary function against another vector.
    pub fn binary(&self, f: BinaryFunc, other: &Self) -> Result<Self> {
        self.zip_map(other, |a, b| f.eval(a, b))
    }

    /// Elementwise binary function with a scalar right operand.
    pub fn binary_scalar(&self, f: BinaryFunc, rhs: T) -> Result<Self> {
        self.map(|a| f.eval(a, rhs))
    }

    /// Elementwise binary function with a scalar left operand.
    pub fn rbinary_scalar(&self, f: BinaryFunc, lhs: T) -> Result<Self> {
        self.map(|b| f.eval(lhs, b))
    }

    pub fn compare(&self, op: CompareOp, other: &Self) -> Result<BlockVector<bool>> {
        self.zip_map(other, |a, b| op.eval(a, b))
    }

    pub fn compare_scalar(&self, op: CompareOp, rhs: T) -> Result<BlockVector<bool>> {
        self.map(|a| op.eval(a, rhs))
    }

    /// Apply an elementwise registry function.
    pub fn apply_unary(&self, f: UnaryFunc) -> Result<Self> {
        let kernel = f.kernel::<T>().ok_or_else(|| {
            BlockVectorError::UnsupportedOperation(format!(
                "{} is not an elementwise function",
                f.name()
            ))
        })?;
        self.map(kernel)
    }

    /// Generalized function dispatch through the registry.
    pub fn ufunc(&self, f: UnaryFunc) -> Result<UfuncOutput<Self, T>> {
        match (f.capability(), f) {
            (Capability::Elementwise, _) => Ok(UfuncOutput::Vector(self.apply_unary(f)?)),
            (Capability::Reduction, UnaryFunc::Reduce(r)) => self.reduce(r),
            _ => Err(BlockVectorError::UnsupportedOperation(format!(
                "{} not supported by BlockVector",
                f.name()
            ))),
        }
    }

    fn reduce(&self, r: Reduction) -> Result<UfuncOutput<Self, T>> {
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

    pub fn abs(&self) -> Result<Self> {
        self.apply_unary(UnaryFunc::Absolute)
    }

    /// Round to `decimals` places, ties to even.
    pub fn round(&self, decimals: i32) -> Result<Self> {
        self.map(|x| round_decimals(x, decimals))
    }

    /// Limit values to `[min, max]`; a missing bound is not applied.
    pub fn clip(&self, min: Option<T>, max: Option<T>) -> Result<Self> {
        self.map(|x| {
            let x = min.map_or(x, |lo| if x < lo { lo } else { x });
            max.map_or(x, |hi| if x > hi { hi } else { x })
        })
    }

    pub fn sum(&self) -> Result<T> {
        Ok(self
            .blocks()?
            .into_iter()
            .fold(T::zero(), |acc, b| acc + b.sum()))
    }

    pub fn prod(&self) -> Result<T> {
        Ok(self
            .blocks()?
            .into_iter()
            .fold(T::one(), |acc, b| acc * b.prod()))
    }

    pub fn min(&self) -> Result<T> {
        self.extremum(Reduction::Min)
    }

    pub fn max(&self) -> Result<T> {
        self.extremum(Reduction::Max)
    }

    fn extremum(&self, r: Reduction) -> Result<T> {
        let op = r.combine_op();
        let partials: Vec<T> = self
            .blocks()?
            .into_iter()
            .filter_map(|b| if r == Reduction::Min { b.min() } else { b.max() })
            .collect();
        let (first, rest) = partials
            .split_first()
            .ok_or(BlockVectorError::ZeroSizeReduction { op: r.name() })?;
        Ok(rest
            .iter()
            .fold(*first, |acc, &x| acc.combine(x, op).unwrap_or(acc)))
    }

    /// Arithmetic mean; NaN for an empty vector.
    pub fn mean(&self) -> Result<T> {
        let sum = self.sum()?;
        let size = self.size()?;
        Ok(sum / T::from_f64(size as f64))
    }

    /// Inner product with a vector of the same structure.
    pub fn dot(&self, other: &Self) -> Result<T> {
        if self.nblocks() != other.nblocks() {
            return Err(BlockVectorError::BlockCountMismatch {
                expected: self.nblocks(),
                actual: other.nblocks(),
            });
        }
        let mut acc = T::zero();
        for (i, (a, b)) in self.blocks()?.into_iter().zip(other.blocks()?).enumerate() {
            acc = acc
                + a.dot(b).ok_or(BlockVectorError::ShapeMismatch {
                    block: i,
                    expected: a.len(),
                    actual: b.len(),
                })?;
        }
        Ok(acc)
    }

    /// Check closeness against `other`, block by block.
    pub fn allclose(&self, other: &Self, rtol: T, atol: T) -> Result<bool> {
        if self.nblocks() != other.nblocks() {
            return Ok(false);
        }
        Ok(self
            .blocks()?
            .into_iter()
            .zip(other.blocks()?)
            .all(|(a, b)| a.allclose(b, rtol, atol)))
    }
}

impl BlockVector<bool> {
    pub fn logical(&self, op: LogicalOp, other: &Self) -> Result<Self> {
        self.zip_map(other, |a, b| op.eval(a, b))
    }

    pub fn logical_not(&self) -> Result<Self> {
        self.map(|a| !a)
    }
}

impl<T: Element> PartialEq for BlockVector<T> {
    fn eq(&self, other: &Self) -> bool {
        self.nblocks() == other.nblocks()
            && (0..self.nblocks()).all(|i| match (self.store.get(i), other.store.get(i)) {
                (Ok(a), Ok(b)) => a == b,
                (Err(_), Err(_)) => true,
                _ => false,
            })
    }
}

macro_rules! impl_serial_binop {
    ($trait:ident, $method:ident, $func:expr) => {
        impl<T: Scalar> $trait<&BlockVector<T>> for &BlockVector<T> {
            type Output = Result<BlockVector<T>>;

            fn $method(self, rhs: &BlockVector<T>) -> Self::Output {
                self.binary($func, rhs)
            }
        }

        impl<T: Scalar> $trait<T> for &BlockVector<T> {
            type Output = Result<BlockVector<T>>;

            fn $method(self, rhs: T) -> Self::Output {
                self.binary_scalar($func, rhs)
            }
        }
    };
}

impl_serial_binop!(Add, add, BinaryFunc::Add);
impl_serial_binop!(Sub, sub, BinaryFunc::Subtract);
impl_serial_binop!(Mul, mul, BinaryFunc::Multiply);
impl_serial_binop!(Div, div, BinaryFunc::Divide);

impl<T: Scalar> Neg for &BlockVector<T> {
    type Output = Result<BlockVector<T>>;

    fn neg(self) -> Self::Output {
        self.apply_unary(UnaryFunc::Negative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample() -> BlockVector<f64> {
        BlockVector::from_blocks(vec![
            BlockData::from([1.0, 2.0]),
            BlockData::from([3.0, -4.0, 5.0]),
        ])
    }

    #[test]
    fn test_structure() {
        let v = sample();
        assert_eq!(v.nblocks(), 2);
        assert_eq!(v.bshape(), (2,));
        assert_eq!(v.block_sizes().unwrap(), vec![2, 3]);
        assert_eq!(v.size().unwrap(), 5);
        assert_eq!(v.flatten().unwrap(), vec![1.0, 2.0, 3.0, -4.0, 5.0]);
        assert!(!v.has_none());
    }

    #[test]
    fn test_unset_blocks_reported() {
        let mut v = BlockVector::<f64>::new(3);
        v.set_block(1, [1.0]).unwrap();
        assert!(v.has_none());
        assert_eq!(
            v.sum().unwrap_err(),
            BlockVectorError::IncompleteVector { blocks: vec![0, 2] }
        );
        assert!(v.fill(0.0).is_err());
    }

    #[test]
    fn test_from_flat() {
        let p = BlockPartition::new(vec![2, 3]);
        let v = BlockVector::from_flat(&p, &[1.0, 2.0, 3.0, -4.0, 5.0]).unwrap();
        assert_eq!(v, sample());
        assert!(matches!(
            BlockVector::from_flat(&p, &[1.0]),
            Err(BlockVectorError::SizeMismatch { expected: 5, actual: 1 })
        ));
    }

    #[test]
    fn test_arithmetic_operators() {
        let v = sample();
        let w = (&v + &v).unwrap();
        assert_eq!(w.flatten().unwrap(), vec![2.0, 4.0, 6.0, -8.0, 10.0]);
        let w = (&v * 2.0).unwrap();
        assert_eq!(w.flatten().unwrap(), vec![2.0, 4.0, 6.0, -8.0, 10.0]);
        let w = v.rbinary_scalar(BinaryFunc::Subtract, 1.0).unwrap();
        assert_eq!(w.flatten().unwrap(), vec![0.0, -1.0, -2.0, 5.0, -4.0]);
        let w = (-&v).unwrap();
        assert_eq!(w.flatten().unwrap(), vec![-1.0, -2.0, -3.0, 4.0, -5.0]);
    }

    #[test]
    fn test_binary_shape_mismatch() {
        let v = sample();
        let w = BlockVector::from_blocks(vec![BlockData::from([1.0]), BlockData::from([1.0])]);
        assert!(matches!(
            &v + &w,
            Err(BlockVectorError::ShapeMismatch { block: 0, .. })
        ));
        let u = BlockVector::from_blocks(vec![BlockData::from([1.0])]);
        assert!(matches!(
            &v + &u,
            Err(BlockVectorError::BlockCountMismatch { expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn test_reductions() {
        let v = sample();
        assert_relative_eq!(v.sum().unwrap(), 7.0);
        assert_relative_eq!(v.prod().unwrap(), -120.0);
        assert_eq!(v.min().unwrap(), -4.0);
        assert_eq!(v.max().unwrap(), 5.0);
        assert_relative_eq!(v.mean().unwrap(), 1.4);
        assert_relative_eq!(v.dot(&v).unwrap(), 55.0);
        assert!(v.all().unwrap());
        assert!(v.any().unwrap());
        assert!(v.contains(-4.0).unwrap());
    }

    #[test]
    fn test_empty_reductions() {
        let v = BlockVector::from_blocks(vec![BlockData::<f64>::new(vec![])]);
        assert_eq!(
            v.min().unwrap_err(),
            BlockVectorError::ZeroSizeReduction { op: "min" }
        );
        assert!(v.mean().unwrap().is_nan());
        assert_eq!(v.sum().unwrap(), 0.0);
    }

    #[test]
    fn test_compare_compress_nonzero() {
        let v = sample();
        let mask = v.compare_scalar(CompareOp::Greater, 1.5).unwrap();
        let kept = v.compress(&mask).unwrap();
        assert_eq!(kept.flatten().unwrap(), vec![2.0, 3.0, 5.0]);
        assert_eq!(mask.nonzero().unwrap().flatten().unwrap(), vec![1, 0, 2]);
        let inverted = mask.logical_not().unwrap();
        let none = mask.logical(LogicalOp::And, &inverted).unwrap();
        assert!(!none.any().unwrap());
    }

    #[test]
    fn test_ufunc_dispatch() {
        let v = sample();
        match v.ufunc(UnaryFunc::Absolute).unwrap() {
            UfuncOutput::Vector(w) => assert_eq!(w.min().unwrap(), 1.0),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(
            v.ufunc(UnaryFunc::Reduce(Reduction::Sum)).unwrap(),
            UfuncOutput::Value(7.0)
        );
        assert_eq!(
            v.ufunc(UnaryFunc::Reduce(Reduction::All)).unwrap(),
            UfuncOutput::Truth(true)
        );
        assert!(matches!(
            v.ufunc(UnaryFunc::Cumsum),
            Err(BlockVectorError::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn test_clip_and_round() {
        let v = sample();
        let c = v.clip(Some(0.0), Some(3.0)).unwrap();
        assert_eq!(c.flatten().unwrap(), vec![1.0, 2.0, 3.0, 0.0, 3.0]);
        let c = v.clip(None, None).unwrap();
        assert_eq!(c, v);
        let r = BlockVector::from_blocks(vec![BlockData::from([0.5, 1.5, 1.26])])
            .round(0)
            .unwrap();
        assert_eq!(r.flatten().unwrap(), vec![0.0, 2.0, 1.0]);
    }

    #[test]
    fn test_fill_keeps_lengths() {
        let mut v = sample();
        v.fill(9.0).unwrap();
        assert_eq!(v.block_sizes().unwrap(), vec![2, 3]);
        assert_eq!(v.sum().unwrap(), 45.0);
    }

    #[test]
    fn test_random_flat_round_trip_and_reductions() {
        use rand::prelude::*;
        use rand_chacha::ChaCha8Rng;

        let mut rng = ChaCha8Rng::seed_from_u64(42);
        for _ in 0..10 {
            let sizes: Vec<usize> = (0..rng.gen_range(1..8)).map(|_| rng.gen_range(1..6)).collect();
            let partition = BlockPartition::new(sizes);
            let flat: Vec<f64> = (0..partition.total_len())
                .map(|_| rng.gen::<f64>() * 2.0 - 1.0)
                .collect();
            let v = BlockVector::from_flat(&partition, &flat).unwrap();
            assert_eq!(v.partition().unwrap(), partition);
            assert_eq!(v.flatten().unwrap(), flat);
            assert_relative_eq!(v.sum().unwrap(), flat.iter().sum::<f64>(), epsilon = 1e-12);
            let sq: f64 = flat.iter().map(|x| x * x).sum();
            assert_relative_eq!(v.dot(&v).unwrap(), sq, epsilon = 1e-12);
            let max = flat.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            assert_eq!(v.max().unwrap(), max);
        }
    }

    #[test]
    fn test_apply_unary_runs_every_elementwise_kernel() {
        let v = sample();
        let flat = v.flatten().unwrap();
        for f in UnaryFunc::ELEMENTWISE {
            let got = v.apply_unary(f).unwrap().flatten().unwrap();
            for (x, y) in flat.iter().zip(&got) {
                let want = f.eval(*x).unwrap();
                assert!(want == *y || (want.is_nan() && y.is_nan()), "{}", f.name());
            }
        }
        for f in [
            UnaryFunc::Cumsum,
            UnaryFunc::Cumprod,
            UnaryFunc::Modf,
            UnaryFunc::Reduce(Reduction::Sum),
        ] {
            assert!(matches!(
                v.apply_unary(f),
                Err(BlockVectorError::UnsupportedOperation(_))
            ));
        }
    }
}
