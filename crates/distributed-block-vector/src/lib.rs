//! Block-partitioned vectors distributed over a process group.
//!
//! One logical vector is split into blocks; each block belongs to exactly one
//! rank, except shared blocks, which every rank holds identically. Arithmetic
//! behaves as if the vector lived on a single process:
//!
//! - elementwise operations run locally on each rank's visible blocks;
//! - reductions fold local partials and combine them with one collective,
//!   counting shared blocks once where repetition would change the result;
//! - combining with serial vectors or flat arrays is refused for operators,
//!   since it would need an implicit gather.
//!
//! # Core Types
//!
//! - [`Communicator`]: rank, size and blocking collectives
//! - [`LocalGroup`] / [`ThreadComm`]: in-process group, one thread per rank
//! - [`OwnershipMap`]: block → owning rank or shared
//! - [`DistributedBlockVector`]: the distributed vector
//! - [`Operand`]: right-hand operands (vector, serial vector, flat array, scalar)
//!
//! # Example
//!
//! ```
//! use distributed_block_vector::{BlockVectorError, DistributedBlockVector, LocalGroup};
//!
//! // blocks 0 and 1 on rank 0, block 2 on rank 1, block 3 shared
//! let results = LocalGroup::run(2, |comm| {
//!     let mut v = DistributedBlockVector::<f64, _>::new(4, &[0, 0, 1, -1], comm)?;
//!     for i in v.owned_blocks() {
//!         v.set_block(i, vec![i as f64; 2])?;
//!     }
//!     let w = (&v * 2.0)?;
//!     Ok::<_, BlockVectorError>((w.sum()?, v.max()?))
//! })
//! .unwrap();
//!
//! for r in results {
//!     assert_eq!(r.unwrap(), (24.0, 3.0));
//! }
//! ```

mod comm;
mod elementwise;
mod local_group;
mod operand;
mod options;
mod ownership;
mod reduce;
mod vector;

pub use block_vector::{
    BinaryFunc, BlockData, BlockPartition, BlockVector, BlockVectorError, CompareOp, Element,
    LogicalOp, ReduceOp, Reduction, Result, Scalar, UfuncOutput, UnaryFunc,
};
pub use comm::{Communicator, SelfComm};
pub use local_group::{LocalGroup, LocalGroupOptions, ThreadComm};
pub use operand::Operand;
pub use options::DistributedOptions;
pub use ownership::{Owner, OwnershipMap, SHARED};
pub use vector::DistributedBlockVector;
