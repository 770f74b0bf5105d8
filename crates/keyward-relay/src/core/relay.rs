//! Block processing
//!
//! The relay checks only what it needs to keep chains linear: a valid
//! signature and a `last_block_hash` naming a team's current head (or a
//! genesis key with no blocks yet, signed by that key). Membership rules
//! are enforced by every reader, never here.

use keyward_core::{AppendBlock, Block, Payload, ReadBlock, ReadResponse, TeamPointer};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::validation::{validate_block, validate_read, ValidationError};
use crate::config::RelayConfig;
use crate::storage::{BlockStore, StorageError};

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Invalid block: {0}")]
    Invalid(String),

    #[error("Invalid signature: {0}")]
    Signature(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<ValidationError> for RelayError {
    fn from(err: ValidationError) -> Self {
        RelayError::Invalid(err.to_string())
    }
}

impl From<StorageError> for RelayError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(msg) => RelayError::NotFound(msg),
            StorageError::Conflict(msg) => RelayError::Conflict(msg),
            StorageError::Backend(msg) => RelayError::Storage(msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;

/// Outcome of a processed block
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayReply {
    Appended,
    Page(ReadResponse),
}

#[derive(Debug, Clone)]
pub struct Relay {
    store: Arc<dyn BlockStore>,
    config: RelayConfig,
}

impl Relay {
    pub fn new(store: Arc<dyn BlockStore>, config: RelayConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn BlockStore> {
        &self.store
    }

    /// Verify a submitted block and dispatch on its payload
    pub async fn process(&self, block: &Block) -> Result<RelayReply> {
        validate_block(block, self.config.max_payload_bytes)?;
        block
            .verify_signature()
            .map_err(|e| RelayError::Signature(e.to_string()))?;

        let payload = block
            .decode_payload()
            .map_err(|e| RelayError::Invalid(e.to_string()))?;

        match payload {
            Payload::Append(append) => {
                self.append(block, &append).await?;
                Ok(RelayReply::Appended)
            }
            Payload::Read(read) => Ok(RelayReply::Page(self.read(&read).await?)),
        }
    }

    async fn append(&self, block: &Block, append: &AppendBlock) -> Result<()> {
        let last = append.last_block_hash.as_slice();

        if let Some(position) = self.store.locate(last).await? {
            let head = self.store.head(&position.team).await?;
            if head.as_deref() != Some(last) {
                warn!(
                    team = %hex::encode(&position.team),
                    last_block_hash = %hex::encode(last),
                    "Append against stale head"
                );
                return Err(RelayError::Conflict("last_block_hash is not the chain head".into()));
            }
            self.store.append(&position.team, Some(last), block.clone()).await?;
            debug!(operation = append.operation.name(), "Appended to existing team");
            return Ok(());
        }

        // not a block hash: only a genesis key founding a new team is left
        if self.store.head(last).await?.is_some() {
            return Err(RelayError::Conflict("team already has blocks".into()));
        }
        if block.public_key != last {
            return Err(RelayError::NotFound("unknown last_block_hash".into()));
        }

        self.store.append(last, None, block.clone()).await?;
        info!(team = %hex::encode(last), "Team created");
        Ok(())
    }

    async fn read(&self, read: &ReadBlock) -> Result<ReadResponse> {
        validate_read(read)?;

        let (team, start) = match &read.team_pointer {
            TeamPointer::PublicKey(team) => (team.clone(), 0),
            TeamPointer::LastBlockHash(hash) => {
                let position = self
                    .store
                    .locate(hash)
                    .await?
                    .ok_or_else(|| RelayError::NotFound("unknown last_block_hash".into()))?;
                (position.team, position.index + 1)
            }
        };

        let range = self.store.read(&team, start, self.config.page_size).await?;
        debug!(
            team = %hex::encode(&team),
            start = start,
            count = range.blocks.len(),
            has_more = range.has_more,
            "Serving block page"
        );
        Ok(ReadResponse {
            blocks: range.blocks,
            has_more: range.has_more,
        })
    }
}
