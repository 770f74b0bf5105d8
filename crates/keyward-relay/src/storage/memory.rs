//! In-memory storage backend
//!
//! Default storage for development and tests. Data is lost on restart.

use async_trait::async_trait;
use keyward_core::Block;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::info;

use super::{BlockPosition, BlockRange, BlockStore, StorageError};

#[derive(Debug, Default)]
struct Chains {
    teams: HashMap<Vec<u8>, Vec<Block>>,
    index: HashMap<Vec<u8>, BlockPosition>,
}

/// In-memory block store
#[derive(Debug, Default)]
pub struct MemoryBlockStore {
    chains: RwLock<Chains>,
}

impl MemoryBlockStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlockStore for MemoryBlockStore {
    async fn head(&self, team: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        let chains = self.chains.read().unwrap();
        Ok(chains
            .teams
            .get(team)
            .and_then(|blocks| blocks.last())
            .map(Block::hash))
    }

    async fn locate(&self, hash: &[u8]) -> Result<Option<BlockPosition>, StorageError> {
        let chains = self.chains.read().unwrap();
        Ok(chains.index.get(hash).cloned())
    }

    async fn append(
        &self,
        team: &[u8],
        expected_head: Option<&[u8]>,
        block: Block,
    ) -> Result<(), StorageError> {
        let mut chains = self.chains.write().unwrap();
        let current = chains
            .teams
            .get(team)
            .and_then(|blocks| blocks.last())
            .map(Block::hash);
        if current.as_deref() != expected_head {
            return Err(StorageError::Conflict("chain head has moved".into()));
        }

        let hash = block.hash();
        if chains.index.contains_key(&hash) {
            return Err(StorageError::Conflict("block already stored".into()));
        }

        let blocks = chains.teams.entry(team.to_vec()).or_default();
        let index = blocks.len();
        blocks.push(block);
        chains.index.insert(
            hash.clone(),
            BlockPosition {
                team: team.to_vec(),
                index,
            },
        );

        info!(
            team = %hex::encode(team),
            index = index,
            block_hash = %hex::encode(&hash),
            "Stored block"
        );
        Ok(())
    }

    async fn read(&self, team: &[u8], start: usize, limit: usize) -> Result<BlockRange, StorageError> {
        let chains = self.chains.read().unwrap();
        let Some(blocks) = chains.teams.get(team) else {
            return Ok(BlockRange::default());
        };
        let end = start.saturating_add(limit).min(blocks.len());
        let page = blocks.get(start..end).map(<[Block]>::to_vec).unwrap_or_default();
        Ok(BlockRange {
            blocks: page,
            has_more: end < blocks.len(),
        })
    }

    async fn team_count(&self) -> Result<usize, StorageError> {
        let chains = self.chains.read().unwrap();
        Ok(chains.teams.len())
    }
}
