//! Right-hand operands accepted by distributed operations.

use block_vector::{BlockVector, BlockVectorError, Element};

use crate::comm::Communicator;
use crate::vector::DistributedBlockVector;

/// Second operand of a binary operation, comparison or copy.
///
/// Binary operators accept only `Distributed` (same ownership map) and
/// `Scalar`. `Serial` and `Flat` are accepted where the operation is a local
/// read from a fully materialized source (`copyfrom`, `dot`).
#[derive(Debug)]
pub enum Operand<'a, T: Element, C: Communicator> {
    Distributed(&'a DistributedBlockVector<T, C>),
    Serial(&'a BlockVector<T>),
    Flat(&'a [T]),
    Scalar(T),
}

impl<T: Element, C: Communicator> Clone for Operand<'_, T, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: Element, C: Communicator> Copy for Operand<'_, T, C> {}

impl<T: Element, C: Communicator> Operand<'_, T, C> {
    pub fn kind(&self) -> &'static str {
        match self {
            Operand::Distributed(_) => "distributed block vector",
            Operand::Serial(_) => "serial block vector",
            Operand::Flat(_) => "flat array",
            Operand::Scalar(_) => "scalar",
        }
    }

    /// Error for an operand the operation `op` refuses.
    pub(crate) fn rejected(&self, op: &str) -> BlockVectorError {
        BlockVectorError::IncompatibleStructure(format!(
            "{op} cannot combine a distributed block vector with a {}",
            self.kind()
        ))
    }
}

impl<'a, T: Element, C: Communicator> From<&'a DistributedBlockVector<T, C>>
    for Operand<'a, T, C>
{
    fn from(v: &'a DistributedBlockVector<T, C>) -> Self {
        Operand::Distributed(v)
    }
}

impl<'a, T: Element, C: Communicator> From<&'a BlockVector<T>> for Operand<'a, T, C> {
    fn from(v: &'a BlockVector<T>) -> Self {
        Operand::Serial(v)
    }
}

impl<'a, T: Element, C: Communicator> From<&'a [T]> for Operand<'a, T, C> {
    fn from(v: &'a [T]) -> Self {
        Operand::Flat(v)
    }
}

impl<'a, T: Element, C: Communicator> From<&'a Vec<T>> for Operand<'a, T, C> {
    fn from(v: &'a Vec<T>) -> Self {
        Operand::Flat(v.as_slice())
    }
}

macro_rules! impl_scalar_operand {
    ($($t:ty),*) => {$(
        impl<C: Communicator> From<$t> for Operand<'_, $t, C> {
            fn from(v: $t) -> Self {
                Operand::Scalar(v)
            }
        }
    )*};
}

impl_scalar_operand!(f64, f32, i64, usize, bool);
