//! Block-partitioned vectors held by a single process.
//!
//! A block vector represents one logical 1D vector as an ordered sequence of
//! contiguous blocks. Each block is a dense `mdarray` tensor whose length is
//! fixed the first time it is assigned.
//!
//! # Core Types
//!
//! - [`BlockData`]: Owned 1D block data (wraps mdarray's `DTensor<T, 1>`)
//! - [`BlockPartition`]: Block sizes and offsets into the flattened vector
//! - [`BlockStore`]: Index → block table with per-block length bookkeeping
//! - [`BlockVector`]: Serial block vector with elementwise ops and reductions
//! - [`UnaryFunc`], [`BinaryFunc`], [`CompareOp`], [`LogicalOp`]: function
//!   registry consulted before dispatch
//!
//! # Example
//!
//! ```
//! use block_vector::{BlockData, BlockVector};
//!
//! let mut v = BlockVector::<f64>::new(2);
//! v.set_block(0, [1.0, 2.0]).unwrap();
//! v.set_block(1, BlockData::filled(3, 0.5)).unwrap();
//!
//! assert_eq!(v.size().unwrap(), 5);
//! assert_eq!(v.sum().unwrap(), 4.5);
//! let w = (&v * 2.0).unwrap();
//! assert_eq!(w.flatten().unwrap(), vec![2.0, 4.0, 1.0, 1.0, 1.0]);
//! ```

mod block_data;
mod block_vector;
mod error;
mod partition;
mod scalar;
mod store;
pub mod ufunc;

pub use block_data::{BlockData, BlockTensor1};
pub use block_vector::BlockVector;
pub use error::{BlockVectorError, Result};
pub use partition::BlockPartition;
pub use scalar::{Element, Scalar};
pub use store::BlockStore;
pub use ufunc::{
    BinaryFunc, Capability, CompareOp, Duplication, LogicalOp, ReduceOp, Reduction, UfuncOutput,
    UnaryFunc,
};
