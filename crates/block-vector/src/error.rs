//! Error types for block vector operations.

use thiserror::Error;

/// Error type for serial and distributed block vector operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BlockVectorError {
    /// Write to (or read of) a block the calling rank does not hold.
    #[error("Block {block} is not visible to rank {rank}")]
    Ownership { block: usize, rank: usize },

    /// Block length differs from the length fixed by its first assignment.
    #[error("Shape mismatch for block {block}: expected length {expected}, got {actual}")]
    ShapeMismatch {
        block: usize,
        expected: usize,
        actual: usize,
    },

    /// Operand has a different number of blocks.
    #[error("Block count mismatch: expected {expected} blocks, got {actual}")]
    BlockCountMismatch { expected: usize, actual: usize },

    /// Flat operand does not match the total vector length.
    #[error("Size mismatch: expected {expected} elements, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// Operands cannot be combined without an implicit gather or broadcast.
    #[error("Incompatible structure: {0}")]
    IncompatibleStructure(String),

    /// Operation needs blocks that have never been set.
    #[error("Operation requires every block to be set; unset blocks: {blocks:?}")]
    IncompleteVector { blocks: Vec<usize> },

    /// `min`/`max` over a block of length zero.
    #[error("cannot get the {op} of a size 0 array")]
    ZeroSizeReduction { op: &'static str },

    /// Function needs information across block boundaries.
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Read of a block that has never been set.
    #[error("Block {0} is not set")]
    NotSet(usize),

    /// Block index outside `[0, nblocks)`.
    #[error("Block index {index} out of bounds for {nblocks} blocks")]
    BlockIndexOutOfBounds { index: usize, nblocks: usize },

    /// Ownership map rejected at construction.
    #[error("Invalid ownership map: {0}")]
    InvalidOwnership(String),

    /// Ranks hold different data for the same shared block.
    #[error("Shared block {block} differs between ranks")]
    InconsistentSharedBlock { block: usize },

    /// Collective call failed or the process group was aborted.
    #[error("Communication error: {0}")]
    Communication(String),
}

/// Result type for block vector operations.
pub type Result<T> = std::result::Result<T, BlockVectorError>;
