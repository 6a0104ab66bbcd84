//! Elementwise operations on distributed block vectors.
//!
//! All of these are local: each rank transforms its visible blocks and no
//! data crosses ranks. Vector operands must share the ownership map, so both
//! sides see the same blocks on every rank.

use std::ops::{Add, Div, Mul, Neg, Sub};

use block_vector::{
    ufunc::round_decimals, BinaryFunc, BlockVector, BlockVectorError, Capability, CompareOp,
    Element, LogicalOp, Result, Scalar, UfuncOutput, UnaryFunc,
};
use tracing::trace;

use crate::comm::Communicator;
use crate::operand::Operand;
use crate::vector::DistributedBlockVector;

impl<T: Element, C: Communicator> DistributedBlockVector<T, C> {
    /// Combine every visible block with the matching block of `other`.
    pub(crate) fn zip_blocks<S: Element, U: Element>(
        &self,
        other: &DistributedBlockVector<S, C>,
        mut f: impl FnMut(T, S) -> U,
    ) -> Result<DistributedBlockVector<U, C>> {
        self.check_compatible(other)?;
        other.visible_blocks()?;
        self.map_blocks(true, |i, a| {
            let b = other.get_block(i)?;
            a.zip_map(b, &mut f).ok_or(BlockVectorError::ShapeMismatch {
                block: i,
                expected: a.len(),
                actual: b.len(),
            })
        })
    }

    /// Apply `f(a, b)` elementwise against `other`; `reflected` swaps the
    /// arguments so `other` is on the left.
    pub(crate) fn elementwise<U: Element>(
        &self,
        op: &str,
        other: Operand<'_, T, C>,
        reflected: bool,
        f: impl Fn(T, T) -> U,
    ) -> Result<DistributedBlockVector<U, C>> {
        trace!(rank = self.rank(), op, operand = other.kind(), reflected, "elementwise");
        let g = |a: T, b: T| if reflected { f(b, a) } else { f(a, b) };
        match other {
            Operand::Distributed(v) => self.zip_blocks(v, g),
            Operand::Scalar(s) => self.map_blocks(true, |_, a| Ok(a.map(|x| g(x, s)))),
            Operand::Serial(_) | Operand::Flat(_) => Err(other.rejected(op)),
        }
    }

    /// Apply `f` to every visible element.
    pub fn map<U: Element>(&self, f: impl Fn(T) -> U) -> Result<DistributedBlockVector<U, C>> {
        self.map_blocks(true, |_, a| Ok(a.map(&f)))
    }

    /// Keep the elements where `mask` is true, block by block.
    ///
    /// The mask must be a distributed vector with the same map. Block lengths
    /// of the result differ from this vector's.
    pub fn compress<'a>(&self, mask: impl Into<Operand<'a, bool, C>>) -> Result<Self>
    where
        C: 'a,
    {
        let mask = match mask.into() {
            Operand::Distributed(m) => m,
            other => return Err(other.rejected("compress")),
        };
        self.check_compatible(mask)?;
        mask.visible_blocks()?;
        self.map_blocks(false, |i, a| {
            let m = mask.get_block(i)?;
            a.compress(m).ok_or(BlockVectorError::ShapeMismatch {
                block: i,
                expected: a.len(),
                actual: m.len(),
            })
        })
    }

    /// Block-local positions of the truthy elements of every visible block.
    pub fn nonzero(&self) -> Result<DistributedBlockVector<usize, C>> {
        self.map_blocks(false, |_, a| Ok(a.nonzero()))
    }
}

impl<T: Scalar, C: Communicator> DistributedBlockVector<T, C> {
    /// Elementwise `f(self, other)`.
    pub fn binary<'a>(&self, f: BinaryFunc, other: impl Into<Operand<'a, T, C>>) -> Result<Self>
    where
        T: 'a,
        C: 'a,
    {
        self.elementwise(f.name(), other.into(), false, |a, b| f.eval(a, b))
    }

    /// Elementwise `f(other, self)`, e.g. `5.0 - v` or `2.0 / v`.
    pub fn rbinary<'a>(&self, f: BinaryFunc, other: impl Into<Operand<'a, T, C>>) -> Result<Self>
    where
        T: 'a,
        C: 'a,
    {
        self.elementwise(f.name(), other.into(), true, |a, b| f.eval(a, b))
    }

    /// In-place `self = f(self, other)`.
    pub fn binary_inplace<'a>(
        &mut self,
        f: BinaryFunc,
        other: impl Into<Operand<'a, T, C>>,
    ) -> Result<()>
    where
        T: 'a,
        C: 'a,
    {
        let result = self.binary(f, other)?;
        self.replace_store(result)
    }

    /// Elementwise comparison producing a boolean vector.
    ///
    /// For a scalar on the left (`3.0 >= v`) use `v.compare(op.swapped(), 3.0)`.
    pub fn compare<'a>(
        &self,
        op: CompareOp,
        other: impl Into<Operand<'a, T, C>>,
    ) -> Result<DistributedBlockVector<bool, C>>
    where
        T: 'a,
        C: 'a,
    {
        self.elementwise("comparison", other.into(), false, |a, b| op.eval(a, b))
    }

    pub fn less<'a>(
        &self,
        other: impl Into<Operand<'a, T, C>>,
    ) -> Result<DistributedBlockVector<bool, C>>
    where
        T: 'a,
        C: 'a,
    {
        self.compare(CompareOp::Less, other)
    }

    pub fn less_equal<'a>(
        &self,
        other: impl Into<Operand<'a, T, C>>,
    ) -> Result<DistributedBlockVector<bool, C>>
    where
        T: 'a,
        C: 'a,
    {
        self.compare(CompareOp::LessEqual, other)
    }

    pub fn greater<'a>(
        &self,
        other: impl Into<Operand<'a, T, C>>,
    ) -> Result<DistributedBlockVector<bool, C>>
    where
        T: 'a,
        C: 'a,
    {
        self.compare(CompareOp::Greater, other)
    }

    pub fn greater_equal<'a>(
        &self,
        other: impl Into<Operand<'a, T, C>>,
    ) -> Result<DistributedBlockVector<bool, C>>
    where
        T: 'a,
        C: 'a,
    {
        self.compare(CompareOp::GreaterEqual, other)
    }

    pub fn equal<'a>(
        &self,
        other: impl Into<Operand<'a, T, C>>,
    ) -> Result<DistributedBlockVector<bool, C>>
    where
        T: 'a,
        C: 'a,
    {
        self.compare(CompareOp::Equal, other)
    }

    pub fn not_equal<'a>(
        &self,
        other: impl Into<Operand<'a, T, C>>,
    ) -> Result<DistributedBlockVector<bool, C>>
    where
        T: 'a,
        C: 'a,
    {
        self.compare(CompareOp::NotEqual, other)
    }

    /// Apply an elementwise registry function to every visible block.
    pub fn apply_unary(&self, f: UnaryFunc) -> Result<Self> {
        let kernel = f.kernel::<T>().ok_or_else(|| {
            BlockVectorError::UnsupportedOperation(format!(
                "{} is not supported by distributed block vectors",
                f.name()
            ))
        })?;
        self.map(kernel)
    }

    /// Generalized function dispatch through the registry.
    ///
    /// Elementwise functions are local; reductions are collectives; functions
    /// needing cross-block data fail locally with `UnsupportedOperation`.
    pub fn ufunc(&self, f: UnaryFunc) -> Result<UfuncOutput<Self, T>> {
        match (f.capability(), f) {
            (Capability::Elementwise, _) => Ok(UfuncOutput::Vector(self.apply_unary(f)?)),
            (Capability::Reduction, UnaryFunc::Reduce(r)) => self.reduce(r),
            _ => Err(BlockVectorError::UnsupportedOperation(format!(
                "{} is not supported by distributed block vectors",
                f.name()
            ))),
        }
    }

    pub fn conj(&self) -> Result<Self> {
        self.apply_unary(UnaryFunc::Conjugate)
    }

    pub fn conjugate(&self) -> Result<Self> {
        self.conj()
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
}

impl<C: Communicator> DistributedBlockVector<bool, C> {
    pub fn logical<'a>(
        &self,
        op: LogicalOp,
        other: impl Into<Operand<'a, bool, C>>,
    ) -> Result<Self>
    where
        C: 'a,
    {
        self.elementwise("logical", other.into(), false, |a, b| op.eval(a, b))
    }

    pub fn logical_and<'a>(&self, other: impl Into<Operand<'a, bool, C>>) -> Result<Self>
    where
        C: 'a,
    {
        self.logical(LogicalOp::And, other)
    }

    pub fn logical_or<'a>(&self, other: impl Into<Operand<'a, bool, C>>) -> Result<Self>
    where
        C: 'a,
    {
        self.logical(LogicalOp::Or, other)
    }

    pub fn logical_xor<'a>(&self, other: impl Into<Operand<'a, bool, C>>) -> Result<Self>
    where
        C: 'a,
    {
        self.logical(LogicalOp::Xor, other)
    }

    pub fn logical_not(&self) -> Result<Self> {
        self.map(|a| !a)
    }
}

macro_rules! impl_dist_binop {
    ($trait:ident, $method:ident, $func:expr) => {
        impl<T: Scalar, C: Communicator> $trait<&DistributedBlockVector<T, C>>
            for &DistributedBlockVector<T, C>
        {
            type Output = Result<DistributedBlockVector<T, C>>;

            fn $method(self, rhs: &DistributedBlockVector<T, C>) -> Self::Output {
                self.binary($func, rhs)
            }
        }

        impl<T: Scalar, C: Communicator> $trait<T> for &DistributedBlockVector<T, C> {
            type Output = Result<DistributedBlockVector<T, C>>;

            fn $method(self, rhs: T) -> Self::Output {
                self.binary($func, Operand::Scalar(rhs))
            }
        }

        impl<T: Scalar, C: Communicator> $trait<&BlockVector<T>> for &DistributedBlockVector<T, C> {
            type Output = Result<DistributedBlockVector<T, C>>;

            fn $method(self, rhs: &BlockVector<T>) -> Self::Output {
                self.binary($func, rhs)
            }
        }

        impl<C: Communicator> $trait<&DistributedBlockVector<f64, C>> for f64 {
            type Output = Result<DistributedBlockVector<f64, C>>;

            fn $method(self, rhs: &DistributedBlockVector<f64, C>) -> Self::Output {
                rhs.rbinary($func, self)
            }
        }

        impl<C: Communicator> $trait<&DistributedBlockVector<f32, C>> for f32 {
            type Output = Result<DistributedBlockVector<f32, C>>;

            fn $method(self, rhs: &DistributedBlockVector<f32, C>) -> Self::Output {
                rhs.rbinary($func, self)
            }
        }
    };
}

impl_dist_binop!(Add, add, BinaryFunc::Add);
impl_dist_binop!(Sub, sub, BinaryFunc::Subtract);
impl_dist_binop!(Mul, mul, BinaryFunc::Multiply);
impl_dist_binop!(Div, div, BinaryFunc::Divide);

impl<T: Scalar, C: Communicator> Neg for &DistributedBlockVector<T, C> {
    type Output = Result<DistributedBlockVector<T, C>>;

    fn neg(self) -> Self::Output {
        self.apply_unary(UnaryFunc::Negative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::SelfComm;
    use block_vector::BlockData;

    fn sample() -> DistributedBlockVector<f64, SelfComm> {
        let mut v = DistributedBlockVector::new(2, &[0, -1], SelfComm).unwrap();
        v.set_block(0, [1.0, -2.0]).unwrap();
        v.set_block(1, [3.0]).unwrap();
        v
    }

    #[test]
    fn test_scalar_on_either_side() {
        let v = sample();
        assert_eq!((&v + 1.0).unwrap().flatten().unwrap(), vec![2.0, -1.0, 4.0]);
        assert_eq!((5.0 - &v).unwrap().flatten().unwrap(), vec![4.0, 7.0, 2.0]);
        assert_eq!((6.0 / &v).unwrap().flatten().unwrap(), vec![6.0, -3.0, 2.0]);
        let fd = v.rbinary(BinaryFunc::FloorDivide, 2.0).unwrap();
        assert_eq!(fd.flatten().unwrap(), vec![2.0, -1.0, 0.0]);
    }

    #[test]
    fn test_inplace() {
        let mut v = sample();
        let w = v.clone();
        v.binary_inplace(BinaryFunc::Add, &w).unwrap();
        v.binary_inplace(BinaryFunc::Multiply, 7.0).unwrap();
        assert_eq!(v.flatten().unwrap(), vec![14.0, -28.0, 42.0]);
        assert_eq!(w.flatten().unwrap(), vec![1.0, -2.0, 3.0]);
    }

    #[test]
    fn test_serial_and_flat_rejected() {
        let v = sample();
        let serial = v.make_local_copy().unwrap();
        assert!(matches!(
            &v + &serial,
            Err(BlockVectorError::IncompatibleStructure(_))
        ));
        let flat = vec![1.0, 2.0, 3.0];
        assert!(matches!(
            v.binary(BinaryFunc::Add, &flat),
            Err(BlockVectorError::IncompatibleStructure(_))
        ));
        assert!(matches!(
            v.less_equal(&serial),
            Err(BlockVectorError::IncompatibleStructure(_))
        ));
        let mask_serial = BlockVector::from_blocks(vec![
            BlockData::from([true, false]),
            BlockData::from([true]),
        ]);
        assert!(matches!(
            v.compress(&mask_serial),
            Err(BlockVectorError::IncompatibleStructure(_))
        ));
    }

    #[test]
    fn test_different_maps_rejected() {
        let v = sample();
        let mut w = DistributedBlockVector::new(3, &[0, 0, 0], SelfComm).unwrap();
        for i in 0..3 {
            w.set_block(i, [1.0]).unwrap();
        }
        assert!(matches!(&v + &w, Err(BlockVectorError::IncompatibleStructure(_))));
    }

    #[test]
    fn test_block_length_mismatch() {
        let v = sample();
        let mut w = DistributedBlockVector::new(2, &[0, -1], SelfComm).unwrap();
        w.set_block(0, [1.0]).unwrap();
        w.set_block(1, [1.0]).unwrap();
        assert!(matches!(
            &v * &w,
            Err(BlockVectorError::ShapeMismatch { block: 0, expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn test_comparisons_and_logical() {
        let v = sample();
        let pos = v.greater(0.0).unwrap();
        assert_eq!(pos.flatten().unwrap(), vec![true, false, true]);
        // 3.0 >= v
        let le3 = v.compare(CompareOp::GreaterEqual.swapped(), 3.0).unwrap();
        assert_eq!(le3.flatten().unwrap(), vec![true, true, true]);
        let both = pos.logical_and(&le3).unwrap();
        assert_eq!(both.flatten().unwrap(), vec![true, false, true]);
        let x = pos.logical_xor(&le3).unwrap();
        assert_eq!(x.flatten().unwrap(), vec![false, true, false]);
        assert_eq!(pos.logical_not().unwrap().flatten().unwrap(), vec![false, true, false]);
        assert_eq!(
            v.compress(&pos).unwrap().flatten().unwrap(),
            vec![1.0, 3.0]
        );
        assert_eq!(pos.nonzero().unwrap().flatten().unwrap(), vec![0, 0]);
    }

    #[test]
    fn test_unary_functions() {
        let v = sample();
        assert_eq!(v.abs().unwrap().flatten().unwrap(), vec![1.0, 2.0, 3.0]);
        assert_eq!(v.conj().unwrap().flatten().unwrap(), v.flatten().unwrap());
        assert_eq!((-&v).unwrap().flatten().unwrap(), vec![-1.0, 2.0, -3.0]);
        assert_eq!(
            v.clip(Some(0.0), None).unwrap().flatten().unwrap(),
            vec![1.0, 0.0, 3.0]
        );
        assert!(matches!(
            v.ufunc(UnaryFunc::Cumprod),
            Err(BlockVectorError::UnsupportedOperation(_))
        ));
        match v.ufunc(UnaryFunc::Square).unwrap() {
            UfuncOutput::Vector(w) => assert_eq!(w.flatten().unwrap(), vec![1.0, 4.0, 9.0]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_unset_block_fails_elementwise() {
        let mut v = DistributedBlockVector::<f64, _>::new(2, &[0, 0], SelfComm).unwrap();
        v.set_block(0, [1.0]).unwrap();
        assert_eq!(
            (&v + 1.0).unwrap_err(),
            BlockVectorError::IncompleteVector { blocks: vec![1] }
        );
    }
}
