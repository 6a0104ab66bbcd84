//! One-dimensional block data storage.

use mdarray::DTensor;

use crate::scalar::{Element, Scalar};
use crate::ufunc::ReduceOp;

/// Owned 1D block tensor.
pub type BlockTensor1<T> = DTensor<T, 1>;

/// Dense 1D block data using mdarray.
///
/// Wraps `mdarray::DTensor<T, 1>`. Cloning copies the data.
#[derive(Debug, Clone)]
pub struct BlockData<T: Element> {
    tensor: BlockTensor1<T>,
}

impl<T: Element> BlockData<T> {
    /// Create a block from values.
    pub fn new(data: Vec<T>) -> Self {
        let tensor = BlockTensor1::<T>::from_fn([data.len()], |idx| data[idx[0]]);
        Self { tensor }
    }

    /// Create a block of `len` copies of `value`.
    pub fn filled(len: usize, value: T) -> Self {
        let tensor = BlockTensor1::<T>::from_fn([len], |_| value);
        Self { tensor }
    }

    /// Create a block of length `len` from a generator.
    pub fn from_fn(len: usize, mut f: impl FnMut(usize) -> T) -> Self {
        let tensor = BlockTensor1::<T>::from_fn([len], |idx| f(idx[0]));
        Self { tensor }
    }

    /// Get the number of elements.
    pub fn len(&self) -> usize {
        self.tensor.len()
    }

    /// Check if the block has no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get element `i`.
    ///
    /// # Panics
    /// Panics if `i >= len()`.
    pub fn get(&self, i: usize) -> T {
        self.tensor[[i]]
    }

    /// Iterate over the values in order.
    pub fn values(&self) -> impl Iterator<Item = T> + '_ {
        (0..self.len()).map(move |i| self.tensor[[i]])
    }

    /// Convert to Vec.
    pub fn to_vec(&self) -> Vec<T> {
        self.values().collect()
    }

    /// Apply `f` to every element.
    pub fn map<U: Element>(&self, mut f: impl FnMut(T) -> U) -> BlockData<U> {
        BlockData::from_fn(self.len(), |i| f(self.tensor[[i]]))
    }

    /// Combine two blocks elementwise.
    ///
    /// Returns `None` if the lengths differ.
    pub fn zip_map<S: Element, U: Element>(
        &self,
        other: &BlockData<S>,
        mut f: impl FnMut(T, S) -> U,
    ) -> Option<BlockData<U>> {
        if self.len() != other.len() {
            return None;
        }
        Some(BlockData::from_fn(self.len(), |i| {
            f(self.tensor[[i]], other.tensor[[i]])
        }))
    }

    /// Keep the elements whose mask entry is true.
    ///
    /// Returns `None` if the mask length differs.
    pub fn compress(&self, mask: &BlockData<bool>) -> Option<Self> {
        if self.len() != mask.len() {
            return None;
        }
        let kept: Vec<T> = self
            .values()
            .zip(mask.values())
            .filter_map(|(v, keep)| keep.then_some(v))
            .collect();
        Some(Self::new(kept))
    }

    /// Positions of the truthy elements.
    pub fn nonzero(&self) -> BlockData<usize> {
        let positions: Vec<usize> = self
            .values()
            .enumerate()
            .filter_map(|(i, v)| v.is_truthy().then_some(i))
            .collect();
        BlockData::new(positions)
    }

    /// Whether every element is truthy (true for an empty block).
    pub fn all(&self) -> bool {
        self.values().all(|v| v.is_truthy())
    }

    /// Whether any element is truthy (false for an empty block).
    pub fn any(&self) -> bool {
        self.values().any(|v| v.is_truthy())
    }

    /// Whether `value` occurs in the block.
    pub fn contains(&self, value: T) -> bool {
        self.values().any(|v| v == value)
    }
}

impl<T: Scalar> BlockData<T> {
    /// Sum of all elements.
    pub fn sum(&self) -> T {
        self.values().fold(T::zero(), |acc, x| acc + x)
    }

    /// Product of all elements.
    pub fn prod(&self) -> T {
        self.values().fold(T::one(), |acc, x| acc * x)
    }

    /// Smallest element, NaN-propagating. `None` for an empty block.
    pub fn min(&self) -> Option<T> {
        self.extremum(ReduceOp::Min)
    }

    /// Largest element, NaN-propagating. `None` for an empty block.
    pub fn max(&self) -> Option<T> {
        self.extremum(ReduceOp::Max)
    }

    fn extremum(&self, op: ReduceOp) -> Option<T> {
        let first = self.values().next()?;
        Some(
            self.values()
                .fold(first, |acc, x| acc.combine(x, op).unwrap_or(acc)),
        )
    }

    /// Inner product with another block.
    ///
    /// Returns `None` if the lengths differ.
    pub fn dot(&self, other: &Self) -> Option<T> {
        if self.len() != other.len() {
            return None;
        }
        Some(
            self.values()
                .zip(other.values())
                .fold(T::zero(), |acc, (a, b)| acc + a * b),
        )
    }

    /// Check elementwise closeness (`|a - b| <= atol + rtol * |b|`).
    pub fn allclose(&self, other: &Self, rtol: T, atol: T) -> bool {
        self.len() == other.len()
            && self
                .values()
                .zip(other.values())
                .all(|(a, b)| a == b || (a - b).abs() <= atol + rtol * b.abs())
    }
}

impl<T: Element> PartialEq for BlockData<T> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.values().zip(other.values()).all(|(a, b)| a == b)
    }
}

impl<T: Element> From<Vec<T>> for BlockData<T> {
    fn from(data: Vec<T>) -> Self {
        Self::new(data)
    }
}

impl<T: Element> From<&[T]> for BlockData<T> {
    fn from(data: &[T]) -> Self {
        Self::new(data.to_vec())
    }
}

impl<T: Element, const N: usize> From<[T; N]> for BlockData<T> {
    fn from(data: [T; N]) -> Self {
        Self::new(data.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_data_new() {
        let block = BlockData::new(vec![1.0, 2.0, 3.0]);
        assert_eq!(block.len(), 3);
        assert!(!block.is_empty());
        assert_eq!(block.get(1), 2.0);
        assert_eq!(block.to_vec(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_block_data_empty() {
        let block = BlockData::<f64>::new(vec![]);
        assert!(block.is_empty());
        assert_eq!(block.min(), None);
        assert_eq!(block.max(), None);
        assert_eq!(block.sum(), 0.0);
        assert_eq!(block.prod(), 1.0);
        assert!(block.all());
        assert!(!block.any());
    }

    #[test]
    fn test_block_data_reductions() {
        let block = BlockData::from([8.0, 4.0, 7.0, 12.0]);
        assert_eq!(block.sum(), 31.0);
        assert_eq!(block.prod(), 2688.0);
        assert_eq!(block.min(), Some(4.0));
        assert_eq!(block.max(), Some(12.0));
        assert_eq!(block.dot(&block), Some(64.0 + 16.0 + 49.0 + 144.0));
    }

    #[test]
    fn test_min_max_propagate_nan() {
        let block = BlockData::from([1.0, f64::NAN, -3.0]);
        assert!(block.min().unwrap().is_nan());
        assert!(block.max().unwrap().is_nan());
    }

    #[test]
    fn test_zip_map_length_mismatch() {
        let a = BlockData::from([1.0, 2.0]);
        let b = BlockData::from([1.0, 2.0, 3.0]);
        assert!(a.zip_map(&b, |x, y| x + y).is_none());
        assert!(a.dot(&b).is_none());
        let c = a.zip_map(&a, |x, y| x < y).unwrap();
        assert_eq!(c.to_vec(), vec![false, false]);
    }

    #[test]
    fn test_compress_and_nonzero() {
        let block = BlockData::from([0.0, 1.0, 2.0, 3.0]);
        let mask = BlockData::from([true, true, true, false]);
        assert_eq!(block.compress(&mask).unwrap().to_vec(), vec![0.0, 1.0, 2.0]);
        assert_eq!(block.nonzero().to_vec(), vec![1, 2, 3]);
        assert!(block.compress(&BlockData::from([true])).is_none());
    }

    #[test]
    fn test_contains_and_allclose() {
        let block = BlockData::from([1.0, 0.0]);
        assert!(block.contains(0.0));
        assert!(!block.contains(3.0));
        let other = BlockData::from([1.0 + 1e-12, 0.0]);
        assert!(block.allclose(&other, 1e-9, 1e-12));
        assert_ne!(block, other);
    }
}
