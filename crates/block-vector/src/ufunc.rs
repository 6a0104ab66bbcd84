//! Registry of elementwise functions, comparisons and reductions.
//!
//! Every function a block vector can apply is listed here together with its
//! [`Capability`]. Vectors consult the registry before dispatching, so a
//! function that needs data from more than one block is rejected up front
//! instead of being silently computed per block.

use crate::scalar::Scalar;

/// How a function may be applied to a block-partitioned vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Applied independently to every block.
    Elementwise,
    /// Collapses the whole vector to one value.
    Reduction,
    /// Needs cross-block information or has no single-vector result.
    Disallowed,
}

/// Combining operator for collective reductions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReduceOp {
    Sum,
    Product,
    Min,
    Max,
    LogicalAnd,
    LogicalOr,
}

/// Whether repeating a contribution changes a reduction's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Duplication {
    /// `op(x, x) == x`; shared blocks may be counted on every rank.
    Idempotent,
    /// Shared blocks must be counted exactly once.
    CountSensitive,
}

/// Whole-vector reductions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reduction {
    Sum,
    Prod,
    Min,
    Max,
    Mean,
    All,
    Any,
}

impl Reduction {
    /// All reductions, in registry order.
    pub const ALL: [Reduction; 7] = [
        Reduction::Sum,
        Reduction::Prod,
        Reduction::Min,
        Reduction::Max,
        Reduction::Mean,
        Reduction::All,
        Reduction::Any,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Reduction::Sum => "sum",
            Reduction::Prod => "prod",
            Reduction::Min => "min",
            Reduction::Max => "max",
            Reduction::Mean => "mean",
            Reduction::All => "all",
            Reduction::Any => "any",
        }
    }

    pub fn duplication(self) -> Duplication {
        match self {
            Reduction::Min | Reduction::Max | Reduction::All | Reduction::Any => {
                Duplication::Idempotent
            }
            Reduction::Sum | Reduction::Prod | Reduction::Mean => Duplication::CountSensitive,
        }
    }

    /// Operator used to combine per-rank partial results.
    pub fn combine_op(self) -> ReduceOp {
        match self {
            Reduction::Sum | Reduction::Mean => ReduceOp::Sum,
            Reduction::Prod => ReduceOp::Product,
            Reduction::Min => ReduceOp::Min,
            Reduction::Max => ReduceOp::Max,
            Reduction::All => ReduceOp::LogicalAnd,
            Reduction::Any => ReduceOp::LogicalOr,
        }
    }
}

/// Unary functions known to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryFunc {
    Negative,
    Positive,
    Absolute,
    Sign,
    Sqrt,
    Cbrt,
    Square,
    Reciprocal,
    Exp,
    Exp2,
    Expm1,
    Log,
    Log2,
    Log10,
    Log1p,
    Sin,
    Cos,
    Tan,
    Arcsin,
    Arccos,
    Arctan,
    Sinh,
    Cosh,
    Tanh,
    Arcsinh,
    Arccosh,
    Arctanh,
    Ceil,
    Floor,
    Trunc,
    Rint,
    Conjugate,
    Degrees,
    Radians,
    Reduce(Reduction),
    Cumsum,
    Cumprod,
    Modf,
}

impl UnaryFunc {
    /// Every elementwise unary function.
    pub const ELEMENTWISE: [UnaryFunc; 34] = [
        UnaryFunc::Negative,
        UnaryFunc::Positive,
        UnaryFunc::Absolute,
        UnaryFunc::Sign,
        UnaryFunc::Sqrt,
        UnaryFunc::Cbrt,
        UnaryFunc::Square,
        UnaryFunc::Reciprocal,
        UnaryFunc::Exp,
        UnaryFunc::Exp2,
        UnaryFunc::Expm1,
        UnaryFunc::Log,
        UnaryFunc::Log2,
        UnaryFunc::Log10,
        UnaryFunc::Log1p,
        UnaryFunc::Sin,
        UnaryFunc::Cos,
        UnaryFunc::Tan,
        UnaryFunc::Arcsin,
        UnaryFunc::Arccos,
        UnaryFunc::Arctan,
        UnaryFunc::Sinh,
        UnaryFunc::Cosh,
        UnaryFunc::Tanh,
        UnaryFunc::Arcsinh,
        UnaryFunc::Arccosh,
        UnaryFunc::Arctanh,
        UnaryFunc::Ceil,
        UnaryFunc::Floor,
        UnaryFunc::Trunc,
        UnaryFunc::Rint,
        UnaryFunc::Conjugate,
        UnaryFunc::Degrees,
        UnaryFunc::Radians,
    ];

    pub fn name(self) -> &'static str {
        match self {
            UnaryFunc::Negative => "negative",
            UnaryFunc::Positive => "positive",
            UnaryFunc::Absolute => "absolute",
            UnaryFunc::Sign => "sign",
            UnaryFunc::Sqrt => "sqrt",
            UnaryFunc::Cbrt => "cbrt",
            UnaryFunc::Square => "square",
            UnaryFunc::Reciprocal => "reciprocal",
            UnaryFunc::Exp => "exp",
            UnaryFunc::Exp2 => "exp2",
            UnaryFunc::Expm1 => "expm1",
            UnaryFunc::Log => "log",
            UnaryFunc::Log2 => "log2",
            UnaryFunc::Log10 => "log10",
            UnaryFunc::Log1p => "log1p",
            UnaryFunc::Sin => "sin",
            UnaryFunc::Cos => "cos",
            UnaryFunc::Tan => "tan",
            UnaryFunc::Arcsin => "arcsin",
            UnaryFunc::Arccos => "arccos",
            UnaryFunc::Arctan => "arctan",
            UnaryFunc::Sinh => "sinh",
            UnaryFunc::Cosh => "cosh",
            UnaryFunc::Tanh => "tanh",
            UnaryFunc::Arcsinh => "arcsinh",
            UnaryFunc::Arccosh => "arccosh",
            UnaryFunc::Arctanh => "arctanh",
            UnaryFunc::Ceil => "ceil",
            UnaryFunc::Floor => "floor",
            UnaryFunc::Trunc => "trunc",
            UnaryFunc::Rint => "rint",
            UnaryFunc::Conjugate => "conjugate",
            UnaryFunc::Degrees => "degrees",
            UnaryFunc::Radians => "radians",
            UnaryFunc::Reduce(r) => r.name(),
            UnaryFunc::Cumsum => "cumsum",
            UnaryFunc::Cumprod => "cumprod",
            UnaryFunc::Modf => "modf",
        }
    }

    pub fn capability(self) -> Capability {
        match self {
            UnaryFunc::Reduce(_) => Capability::Reduction,
            UnaryFunc::Cumsum | UnaryFunc::Cumprod | UnaryFunc::Modf => Capability::Disallowed,
            _ => Capability::Elementwise,
        }
    }

    /// Per-element kernel of an elementwise function.
    ///
    /// `None` exactly for reductions and disallowed functions.
    pub fn kernel<T: Scalar>(self) -> Option<fn(T) -> T> {
        let kernel: fn(T) -> T = match self {
            UnaryFunc::Negative => |x: T| -x,
            UnaryFunc::Positive | UnaryFunc::Conjugate => |x: T| x,
            UnaryFunc::Absolute => |x: T| x.abs(),
            UnaryFunc::Sign => |x: T| sign(x),
            UnaryFunc::Sqrt => |x: T| x.sqrt(),
            UnaryFunc::Cbrt => |x: T| x.cbrt(),
            UnaryFunc::Square => |x: T| x * x,
            UnaryFunc::Reciprocal => |x: T| x.recip(),
            UnaryFunc::Exp => |x: T| x.exp(),
            UnaryFunc::Exp2 => |x: T| x.exp2(),
            UnaryFunc::Expm1 => |x: T| x.exp_m1(),
            UnaryFunc::Log => |x: T| x.ln(),
            UnaryFunc::Log2 => |x: T| x.log2(),
            UnaryFunc::Log10 => |x: T| x.log10(),
            UnaryFunc::Log1p => |x: T| x.ln_1p(),
            UnaryFunc::Sin => |x: T| x.sin(),
            UnaryFunc::Cos => |x: T| x.cos(),
            UnaryFunc::Tan => |x: T| x.tan(),
            UnaryFunc::Arcsin => |x: T| x.asin(),
            UnaryFunc::Arccos => |x: T| x.acos(),
            UnaryFunc::Arctan => |x: T| x.atan(),
            UnaryFunc::Sinh => |x: T| x.sinh(),
            UnaryFunc::Cosh => |x: T| x.cosh(),
            UnaryFunc::Tanh => |x: T| x.tanh(),
            UnaryFunc::Arcsinh => |x: T| x.asinh(),
            UnaryFunc::Arccosh => |x: T| x.acosh(),
            UnaryFunc::Arctanh => |x: T| x.atanh(),
            UnaryFunc::Ceil => |x: T| x.ceil(),
            UnaryFunc::Floor => |x: T| x.floor(),
            UnaryFunc::Trunc => |x: T| x.trunc(),
            UnaryFunc::Rint => |x: T| round_half_even(x),
            UnaryFunc::Degrees => |x: T| x.to_degrees(),
            UnaryFunc::Radians => |x: T| x.to_radians(),
            UnaryFunc::Reduce(_) | UnaryFunc::Cumsum | UnaryFunc::Cumprod | UnaryFunc::Modf => {
                return None
            }
        };
        Some(kernel)
    }

    /// Evaluate an elementwise function on one value.
    pub fn eval<T: Scalar>(self, x: T) -> Option<T> {
        self.kernel().map(|k| k(x))
    }
}

/// Elementwise binary arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryFunc {
    Add,
    Subtract,
    Multiply,
    Divide,
    FloorDivide,
    Power,
    Remainder,
    Fmod,
    Maximum,
    Minimum,
    Fmax,
    Fmin,
    Hypot,
    Arctan2,
    Copysign,
    Logaddexp,
    Logaddexp2,
}

impl BinaryFunc {
    pub const ALL: [BinaryFunc; 17] = [
        BinaryFunc::Add,
        BinaryFunc::Subtract,
        BinaryFunc::Multiply,
        BinaryFunc::Divide,
        BinaryFunc::FloorDivide,
        BinaryFunc::Power,
        BinaryFunc::Remainder,
        BinaryFunc::Fmod,
        BinaryFunc::Maximum,
        BinaryFunc::Minimum,
        BinaryFunc::Fmax,
        BinaryFunc::Fmin,
        BinaryFunc::Hypot,
        BinaryFunc::Arctan2,
        BinaryFunc::Copysign,
        BinaryFunc::Logaddexp,
        BinaryFunc::Logaddexp2,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BinaryFunc::Add => "add",
            BinaryFunc::Subtract => "subtract",
            BinaryFunc::Multiply => "multiply",
            BinaryFunc::Divide => "divide",
            BinaryFunc::FloorDivide => "floor_divide",
            BinaryFunc::Power => "power",
            BinaryFunc::Remainder => "remainder",
            BinaryFunc::Fmod => "fmod",
            BinaryFunc::Maximum => "maximum",
            BinaryFunc::Minimum => "minimum",
            BinaryFunc::Fmax => "fmax",
            BinaryFunc::Fmin => "fmin",
            BinaryFunc::Hypot => "hypot",
            BinaryFunc::Arctan2 => "arctan2",
            BinaryFunc::Copysign => "copysign",
            BinaryFunc::Logaddexp => "logaddexp",
            BinaryFunc::Logaddexp2 => "logaddexp2",
        }
    }

    pub fn capability(self) -> Capability {
        Capability::Elementwise
    }

    pub fn eval<T: Scalar>(self, a: T, b: T) -> T {
        match self {
            BinaryFunc::Add => a + b,
            BinaryFunc::Subtract => a - b,
            BinaryFunc::Multiply => a * b,
            BinaryFunc::Divide => a / b,
            BinaryFunc::FloorDivide => floor_divide(a, b),
            BinaryFunc::Power => a.powf(b),
            BinaryFunc::Remainder => remainder(a, b),
            BinaryFunc::Fmod => a % b,
            BinaryFunc::Maximum => {
                if a.is_nan() || b.is_nan() {
                    T::nan()
                } else {
                    a.max(b)
                }
            }
            BinaryFunc::Minimum => {
                if a.is_nan() || b.is_nan() {
                    T::nan()
                } else {
                    a.min(b)
                }
            }
            BinaryFunc::Fmax => a.max(b),
            BinaryFunc::Fmin => a.min(b),
            BinaryFunc::Hypot => a.hypot(b),
            BinaryFunc::Arctan2 => a.atan2(b),
            BinaryFunc::Copysign => {
                if b.is_sign_negative() {
                    -a.abs()
                } else {
                    a.abs()
                }
            }
            BinaryFunc::Logaddexp => logaddexp(a, b),
            BinaryFunc::Logaddexp2 => logaddexp2(a, b),
        }
    }
}

/// Elementwise comparisons; results are boolean blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Equal,
    NotEqual,
}

impl CompareOp {
    pub const ALL: [CompareOp; 6] = [
        CompareOp::Less,
        CompareOp::LessEqual,
        CompareOp::Greater,
        CompareOp::GreaterEqual,
        CompareOp::Equal,
        CompareOp::NotEqual,
    ];

    pub fn eval<T: PartialOrd>(self, a: T, b: T) -> bool {
        match self {
            CompareOp::Less => a < b,
            CompareOp::LessEqual => a <= b,
            CompareOp::Greater => a > b,
            CompareOp::GreaterEqual => a >= b,
            CompareOp::Equal => a == b,
            CompareOp::NotEqual => a != b,
        }
    }

    /// The operator with its operands swapped (`a < b` ⇔ `b > a`).
    pub fn swapped(self) -> Self {
        match self {
            CompareOp::Less => CompareOp::Greater,
            CompareOp::LessEqual => CompareOp::GreaterEqual,
            CompareOp::Greater => CompareOp::Less,
            CompareOp::GreaterEqual => CompareOp::LessEqual,
            CompareOp::Equal => CompareOp::Equal,
            CompareOp::NotEqual => CompareOp::NotEqual,
        }
    }
}

/// Elementwise logical operators on boolean blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalOp {
    And,
    Or,
    Xor,
}

impl LogicalOp {
    pub const ALL: [LogicalOp; 3] = [LogicalOp::And, LogicalOp::Or, LogicalOp::Xor];

    pub fn eval(self, a: bool, b: bool) -> bool {
        match self {
            LogicalOp::And => a && b,
            LogicalOp::Or => a || b,
            LogicalOp::Xor => a ^ b,
        }
    }
}

/// Result of a generalized function dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum UfuncOutput<V, T> {
    /// Elementwise result with the operand's structure.
    Vector(V),
    /// Numeric reduction result.
    Value(T),
    /// Boolean reduction result (`all`/`any`).
    Truth(bool),
}

fn sign<T: Scalar>(x: T) -> T {
    if x.is_nan() {
        x
    } else if x > T::zero() {
        T::one()
    } else if x < T::zero() {
        -T::one()
    } else {
        T::zero()
    }
}

/// Round to the nearest integer, ties to even.
pub fn round_half_even<T: Scalar>(x: T) -> T {
    let rounded = x.round();
    let half = T::from_f64(0.5);
    if (x - x.trunc()).abs() == half {
        let two = T::from_f64(2.0);
        two * (x / two).round()
    } else {
        rounded
    }
}

/// Round to `decimals` places, ties to even.
pub fn round_decimals<T: Scalar>(x: T, decimals: i32) -> T {
    if decimals == 0 {
        return round_half_even(x);
    }
    let scale = T::from_f64(10f64.powi(decimals));
    round_half_even(x * scale) / scale
}

fn floor_divide<T: Scalar>(a: T, b: T) -> T {
    if b == T::zero() {
        return a / b;
    }
    let m = a % b;
    let mut div = (a - m) / b;
    if m != T::zero() && (b < T::zero()) != (m < T::zero()) {
        div = div - T::one();
    }
    if div == T::zero() {
        return T::zero() * (a / b).signum();
    }
    let floordiv = div.floor();
    if div - floordiv > T::from_f64(0.5) {
        floordiv + T::one()
    } else {
        floordiv
    }
}

fn remainder<T: Scalar>(a: T, b: T) -> T {
    let m = a % b;
    if b == T::zero() {
        return m;
    }
    if m != T::zero() {
        if (b < T::zero()) != (m < T::zero()) {
            m + b
        } else {
            m
        }
    } else if b.is_sign_negative() {
        -T::zero()
    } else {
        T::zero()
    }
}

fn logaddexp<T: Scalar>(a: T, b: T) -> T {
    if a == b {
        return a + T::from_f64(std::f64::consts::LN_2);
    }
    let d = a - b;
    if d > T::zero() {
        a + (-d).exp().ln_1p()
    } else if d <= T::zero() {
        b + d.exp().ln_1p()
    } else {
        d
    }
}

fn logaddexp2<T: Scalar>(a: T, b: T) -> T {
    if a == b {
        return a + T::one();
    }
    let d = a - b;
    let log2e = T::from_f64(std::f64::consts::LOG2_E);
    if d > T::zero() {
        a + (-d).exp2().ln_1p() * log2e
    } else if d <= T::zero() {
        b + d.exp2().ln_1p() * log2e
    } else {
        d
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_capabilities() {
        for f in UnaryFunc::ELEMENTWISE {
            assert_eq!(f.capability(), Capability::Elementwise, "{}", f.name());
            assert!(f.kernel::<f64>().is_some(), "{}", f.name());
        }
        for r in Reduction::ALL {
            assert_eq!(UnaryFunc::Reduce(r).capability(), Capability::Reduction);
            assert!(UnaryFunc::Reduce(r).kernel::<f64>().is_none());
        }
        for f in [UnaryFunc::Cumsum, UnaryFunc::Cumprod, UnaryFunc::Modf] {
            assert_eq!(f.capability(), Capability::Disallowed);
            assert!(f.kernel::<f64>().is_none());
        }
    }

    #[test]
    fn test_duplication_classes() {
        assert_eq!(Reduction::Min.duplication(), Duplication::Idempotent);
        assert_eq!(Reduction::Any.duplication(), Duplication::Idempotent);
        assert_eq!(Reduction::Sum.duplication(), Duplication::CountSensitive);
        assert_eq!(Reduction::Mean.duplication(), Duplication::CountSensitive);
        assert_eq!(Reduction::Mean.combine_op(), ReduceOp::Sum);
        assert_eq!(Reduction::All.combine_op(), ReduceOp::LogicalAnd);
    }

    #[test]
    fn test_sign_and_rint() {
        assert_eq!(UnaryFunc::Sign.eval(-3.0f64), Some(-1.0));
        assert_eq!(UnaryFunc::Sign.eval(0.0f64), Some(0.0));
        assert_eq!(UnaryFunc::Rint.eval(2.5f64), Some(2.0));
        assert_eq!(UnaryFunc::Rint.eval(3.5f64), Some(4.0));
        assert_eq!(UnaryFunc::Rint.eval(-0.5f64), Some(-0.0));
        assert_eq!(UnaryFunc::Rint.eval(1.2f64), Some(1.0));
    }

    #[test]
    fn test_round_decimals() {
        assert_relative_eq!(round_decimals(1.01f64, 0), 1.0);
        assert_relative_eq!(round_decimals(1.256f64, 2), 1.26, epsilon = 1e-12);
    }

    #[test]
    fn test_floor_divide_and_remainder() {
        assert_eq!(BinaryFunc::FloorDivide.eval(7.0f64, 2.0), 3.0);
        assert_eq!(BinaryFunc::FloorDivide.eval(-7.0f64, 2.0), -4.0);
        assert_eq!(BinaryFunc::FloorDivide.eval(2.0f64, 3.0), 0.0);
        assert_eq!(BinaryFunc::Remainder.eval(-7.0f64, 2.0), 1.0);
        assert_eq!(BinaryFunc::Fmod.eval(-7.0f64, 2.0), -1.0);
        assert!(BinaryFunc::FloorDivide.eval(1.0f64, 0.0).is_infinite());
    }

    #[test]
    fn test_maximum_propagates_nan() {
        assert!(BinaryFunc::Maximum.eval(f64::NAN, 1.0).is_nan());
        assert_eq!(BinaryFunc::Fmax.eval(f64::NAN, 1.0), 1.0);
        assert_eq!(BinaryFunc::Minimum.eval(2.0f64, 1.0), 1.0);
    }

    #[test]
    fn test_logaddexp() {
        let x = BinaryFunc::Logaddexp.eval(1.0f64, 2.0);
        assert_relative_eq!(x, (1.0f64.exp() + 2.0f64.exp()).ln(), epsilon = 1e-12);
        let y = BinaryFunc::Logaddexp2.eval(1.0f64, 3.0);
        assert_relative_eq!(y, (2.0f64 + 8.0).log2(), epsilon = 1e-12);
    }

    #[test]
    fn test_compare_swapped() {
        for op in CompareOp::ALL {
            assert_eq!(op.eval(1.0, 2.0), op.swapped().eval(2.0, 1.0));
        }
    }
}
