//! Element and scalar traits for generic block operations.
//!
//! [`Element`] is anything a block can hold (numbers, masks, indices).
//! [`Scalar`] narrows that to floating-point values that support the full
//! arithmetic and reduction catalog.

use std::fmt::Debug;

use num_traits::Float;

use crate::ufunc::ReduceOp;

/// Trait for values stored in a block.
pub trait Element: Clone + Copy + Debug + Default + PartialEq + Send + Sync + 'static {
    /// Truth value used by `all`/`any` (non-zero is true).
    fn is_truthy(&self) -> bool;

    /// Combine two partial results under a collective operator.
    ///
    /// Returns `None` when the operator has no meaning for this type
    /// (e.g. a product of booleans).
    fn combine(self, other: Self, op: ReduceOp) -> Option<Self>;
}

/// Trait for floating-point scalars used in block arithmetic.
pub trait Scalar: Element + Float {
    /// Create a scalar from f64.
    fn from_f64(val: f64) -> Self;
}

macro_rules! impl_float_element {
    ($($t:ty),*) => {$(
        impl Element for $t {
            fn is_truthy(&self) -> bool {
                *self != 0.0
            }

            fn combine(self, other: Self, op: ReduceOp) -> Option<Self> {
                match op {
                    ReduceOp::Sum => Some(self + other),
                    ReduceOp::Product => Some(self * other),
                    // NaN propagates like numpy's min/max
                    ReduceOp::Min => Some(if self.is_nan() || other.is_nan() {
                        <$t>::NAN
                    } else {
                        self.min(other)
                    }),
                    ReduceOp::Max => Some(if self.is_nan() || other.is_nan() {
                        <$t>::NAN
                    } else {
                        self.max(other)
                    }),
                    ReduceOp::LogicalAnd | ReduceOp::LogicalOr => None,
                }
            }
        }
    )*};
}

macro_rules! impl_int_element {
    ($($t:ty),*) => {$(
        impl Element for $t {
            fn is_truthy(&self) -> bool {
                *self != 0
            }

            fn combine(self, other: Self, op: ReduceOp) -> Option<Self> {
                match op {
                    ReduceOp::Sum => self.checked_add(other),
                    ReduceOp::Product => self.checked_mul(other),
                    ReduceOp::Min => Some(self.min(other)),
                    ReduceOp::Max => Some(self.max(other)),
                    ReduceOp::LogicalAnd | ReduceOp::LogicalOr => None,
                }
            }
        }
    )*};
}

impl_float_element!(f32, f64);
impl_int_element!(i64, usize);

impl Element for bool {
    fn is_truthy(&self) -> bool {
        *self
    }

    fn combine(self, other: Self, op: ReduceOp) -> Option<Self> {
        match op {
            ReduceOp::LogicalAnd | ReduceOp::Min => Some(self && other),
            ReduceOp::LogicalOr | ReduceOp::Max => Some(self || other),
            ReduceOp::Sum | ReduceOp::Product => None,
        }
    }
}

impl Scalar for f64 {
    fn from_f64(val: f64) -> Self {
        val
    }
}

impl Scalar for f32 {
    fn from_f64(val: f64) -> Self {
        val as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_f64() {
        let x: f64 = Scalar::from_f64(3.0);
        assert_eq!(x, 3.0);
    }

    #[test]
    fn test_scalar_f32() {
        let x: f32 = Scalar::from_f64(1.5);
        assert_eq!(x, 1.5f32);
    }

    #[test]
    fn test_truthiness() {
        assert!(2.0f64.is_truthy());
        assert!(!0.0f64.is_truthy());
        assert!(!false.is_truthy());
        assert!(3usize.is_truthy());
    }

    #[test]
    fn test_combine() {
        assert_eq!(2.0f64.combine(3.0, ReduceOp::Sum), Some(5.0));
        assert_eq!(2.0f64.combine(3.0, ReduceOp::Product), Some(6.0));
        assert_eq!(2.0f64.combine(3.0, ReduceOp::Min), Some(2.0));
        assert!(f64::NAN.combine(3.0, ReduceOp::Max).unwrap().is_nan());
        assert_eq!(true.combine(false, ReduceOp::LogicalAnd), Some(false));
        assert_eq!(true.combine(false, ReduceOp::LogicalOr), Some(true));
        assert_eq!(true.combine(false, ReduceOp::Sum), None);
        assert_eq!(1.0f64.combine(0.0, ReduceOp::LogicalOr), None);
        assert_eq!(usize::MAX.combine(1, ReduceOp::Sum), None);
    }
}
