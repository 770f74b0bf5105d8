//! Storage abstraction for the relay
//!
//! Chains are keyed by their team's genesis public key. Every stored block
//! is also indexed by hash so a read can resume from any `last_block_hash`.

pub mod memory;

pub use memory::MemoryBlockStore;

use async_trait::async_trait;
use keyward_core::Block;
use std::fmt::Debug;

/// Error type for storage operations
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Not found: {0}")]
    NotFound(String),

    /// The chain head moved since the caller looked at it
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

/// Where a stored block sits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockPosition {
    /// Genesis public key of the owning team
    pub team: Vec<u8>,
    /// Zero-based index within the team's chain
    pub index: usize,
}

/// A slice of a team's chain
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockRange {
    pub blocks: Vec<Block>,
    pub has_more: bool,
}

/// Block storage backend
///
/// Implementations must be thread-safe and make `append` a single
/// compare-and-append step.
#[async_trait]
pub trait BlockStore: Send + Sync + Debug {
    /// Hash of the team's newest block, `None` if the team has no blocks
    async fn head(&self, team: &[u8]) -> Result<Option<Vec<u8>>, StorageError>;

    /// Find a block by hash
    async fn locate(&self, hash: &[u8]) -> Result<Option<BlockPosition>, StorageError>;

    /// Append `block` if the team's head is still `expected_head`
    async fn append(
        &self,
        team: &[u8],
        expected_head: Option<&[u8]>,
        block: Block,
    ) -> Result<(), StorageError>;

    /// Up to `limit` blocks starting at `start`
    async fn read(&self, team: &[u8], start: usize, limit: usize) -> Result<BlockRange, StorageError>;

    /// Number of teams with at least one block
    async fn team_count(&self) -> Result<usize, StorageError>;
}
