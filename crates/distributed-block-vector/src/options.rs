//! Options for distributed block vectors.

/// Options for [`DistributedBlockVector`](crate::DistributedBlockVector).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributedOptions {
    /// Rank that contributes shared blocks to count-sensitive reductions
    /// (`sum`, `prod`, `dot`, `mean`). Must be a rank of the group.
    pub shared_contributor: usize,
    /// Check that every rank holds identical shared blocks when gathering a
    /// local copy.
    pub verify_shared_blocks: bool,
}

impl Default for DistributedOptions {
    fn default() -> Self {
        Self {
            shared_contributor: 0,
            verify_shared_blocks: false,
        }
    }
}

impl DistributedOptions {
    pub fn with_shared_contributor(mut self, rank: usize) -> Self {
        self.shared_contributor = rank;
        self
    }

    pub fn with_verify_shared_blocks(mut self, verify: bool) -> Self {
        self.verify_shared_blocks = verify;
        self
    }
}
