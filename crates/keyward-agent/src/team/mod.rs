//! Team chain service
//!
//! Builds, posts and verifies the team's hash chain against an untrusted
//! relay. Each operation holds one async lock for its whole duration,
//! including every relay round trip, so no two appends or syncs from the
//! same service are ever in flight together.
//!
//! Local state only changes through [`TeamIdentity::apply`], which verifies
//! a whole batch before committing it. A failed operation leaves the chain
//! exactly as it was.

pub mod server;

pub use server::{HttpTeamServer, TeamServer, TeamServerError};

use keyward_core::{
    AppendBlock, Block, InviteKey, KeyIdentity, KeyPair, MemberIdentity, Operation, Payload,
    ReadBlock, ServerResponse, SigningBackend, TeamIdentity, TeamInvite, TeamPointer,
};
use rand::rngs::OsRng;
use rand::RngCore;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::error::{TeamResult, TeamServiceError};

const NONCE_LEN: usize = 32;

/// Position in a paged sync
///
/// A cursor always starts from the last verified pointer, so a sync that
/// fails part way resumes from where verification stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor {
    pointer: TeamPointer,
    pages: usize,
    applied: usize,
}

impl PageCursor {
    pub fn new(pointer: TeamPointer) -> Self {
        Self {
            pointer,
            pages: 0,
            applied: 0,
        }
    }

    pub fn pointer(&self) -> &TeamPointer {
        &self.pointer
    }

    /// Pages fetched so far
    pub fn pages(&self) -> usize {
        self.pages
    }

    /// Blocks verified and applied so far
    pub fn applied(&self) -> usize {
        self.applied
    }

    fn advance(&mut self, pointer: TeamPointer, applied: usize) {
        self.pointer = pointer;
        self.pages += 1;
        self.applied += applied;
    }
}

pub struct TeamService {
    identity: Mutex<TeamIdentity>,
    server: Arc<dyn TeamServer>,
    backend: Arc<dyn SigningBackend>,
    clock: Arc<dyn Clock>,
}

impl TeamService {
    pub fn new(
        identity: TeamIdentity,
        server: Arc<dyn TeamServer>,
        backend: Arc<dyn SigningBackend>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            identity: Mutex::new(identity),
            server,
            backend,
            clock,
        }
    }

    /// Committed team state
    pub async fn snapshot(&self) -> TeamIdentity {
        self.identity.lock().await.clone()
    }

    fn me(&self, identity: &TeamIdentity) -> TeamResult<MemberIdentity> {
        let ssh = self.backend.public_key(KeyIdentity::Ssh)?;
        let pgp = self.backend.public_key(KeyIdentity::Pgp)?;
        Ok(identity.member_identity(ssh, pgp))
    }

    /// Found the team: the first block adds the admin, linked to the genesis key
    pub async fn create_team(&self) -> TeamResult<Block> {
        let mut identity = self.identity.lock().await;
        if !identity.is_admin() {
            return Err(TeamServiceError::NeedAdminKeypair);
        }
        if identity.last_block_hash().is_some() {
            return Err(TeamServiceError::TeamAlreadyCreated);
        }

        let me = self.me(&identity)?;
        let genesis = identity.initial_team_public_key().to_vec();
        let signer = identity.keypair().clone();
        self.post_append(&mut identity, genesis, Operation::AddMember(me), &signer)
            .await
    }

    /// Append an operation signed by the standing keypair
    pub async fn append(&self, operation: Operation) -> TeamResult<Block> {
        let mut identity = self.identity.lock().await;
        let signer = identity.keypair().clone();
        self.append_locked(&mut identity, operation, &signer).await
    }

    pub async fn add_member(&self, member: MemberIdentity) -> TeamResult<Block> {
        self.append(Operation::AddMember(member)).await
    }

    /// Announce a fresh invite key and return the invitation
    pub async fn create_invite(&self) -> TeamResult<TeamInvite> {
        let mut seed = vec![0u8; keyward_core::crypto::SEED_LEN];
        OsRng.fill_bytes(&mut seed);
        let invite_keypair =
            KeyPair::from_seed(&seed).map_err(|e| TeamServiceError::BadInviteSeed(e.to_string()))?;

        let mut identity = self.identity.lock().await;
        let signer = identity.keypair().clone();
        let operation = Operation::Invite(InviteKey {
            public_key: invite_keypair.public_key_bytes(),
        });
        self.append_locked(&mut identity, operation, &signer).await?;

        Ok(TeamInvite {
            seed,
            initial_team_public_key: identity.initial_team_public_key().to_vec(),
        })
    }

    /// Join the team with an invitation; the block is signed by the invite key
    pub async fn accept_invite(&self, invite: &TeamInvite) -> TeamResult<Block> {
        let invite_keypair = invite
            .keypair()
            .map_err(|e| TeamServiceError::BadInviteSeed(e.to_string()))?;

        let mut identity = self.identity.lock().await;
        let last = identity
            .last_block_hash()
            .ok_or(TeamServiceError::NeedNewestBlock)?
            .to_vec();
        let me = self.me(&identity)?;
        self.post_append(&mut identity, last, Operation::AcceptInvite(me), &invite_keypair)
            .await
    }

    /// Fetch and verify every block after the local head
    pub async fn sync(&self) -> TeamResult<usize> {
        let mut identity = self.identity.lock().await;
        let reader = identity.keypair().clone();
        self.sync_locked(&mut identity, &reader).await
    }

    /// Sync before membership, reading with the invite key
    pub async fn sync_with_invite(&self, invite: &TeamInvite) -> TeamResult<usize> {
        let reader = invite
            .keypair()
            .map_err(|e| TeamServiceError::BadInviteSeed(e.to_string()))?;
        let mut identity = self.identity.lock().await;
        self.sync_locked(&mut identity, &reader).await
    }

    async fn append_locked(
        &self,
        identity: &mut TeamIdentity,
        operation: Operation,
        signer: &KeyPair,
    ) -> TeamResult<Block> {
        let last = identity
            .last_block_hash()
            .ok_or(TeamServiceError::MissingLastBlockHash)?
            .to_vec();
        self.post_append(identity, last, operation, signer).await
    }

    async fn post_append(
        &self,
        identity: &mut TeamIdentity,
        last_block_hash: Vec<u8>,
        operation: Operation,
        signer: &KeyPair,
    ) -> TeamResult<Block> {
        let operation_name = operation.name();
        let payload = Payload::Append(AppendBlock {
            last_block_hash,
            operation,
        });
        let block = Block::sign(&payload, signer)
            .map_err(|e| TeamServiceError::PayloadSignature(e.to_string()))?;

        // the relay accepts any linked block; check readers' rules first
        let mut candidate = identity.clone();
        candidate.apply(std::slice::from_ref(&block))?;

        match self.server.post_block(&block).await {
            Ok(ServerResponse::Success(_)) => {}
            Ok(ServerResponse::Error(message)) => {
                warn!(operation = operation_name, error = %message, "Relay refused block");
                return Err(TeamServiceError::BlockDidNotPost(message));
            }
            Err(err) => return Err(TeamServiceError::BlockDidNotPost(err.to_string())),
        }

        let hash = block.hash();
        candidate.set_checkpoint(hash.clone());
        *identity = candidate;

        info!(
            operation = operation_name,
            block_hash = %hex::encode(&hash),
            "Appended team block"
        );
        Ok(block)
    }

    fn read_request(&self, pointer: &TeamPointer, reader: &KeyPair) -> TeamResult<Block> {
        let mut nonce = vec![0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        let payload = Payload::Read(ReadBlock {
            team_pointer: pointer.clone(),
            nonce,
            unix_seconds: self.clock.now_secs(),
        });
        Block::sign(&payload, reader).map_err(|e| TeamServiceError::PayloadSignature(e.to_string()))
    }

    async fn sync_locked(&self, identity: &mut TeamIdentity, reader: &KeyPair) -> TeamResult<usize> {
        let mut cursor = PageCursor::new(identity.pointer());

        loop {
            let request = self.read_request(cursor.pointer(), reader)?;
            let page = match self.server.read_blocks(&request).await {
                Ok(ServerResponse::Success(page)) => page,
                Ok(ServerResponse::Error(message)) => {
                    return Err(TeamServiceError::BadResponse(message))
                }
                Err(err) => return Err(TeamServiceError::BadResponse(err.to_string())),
            };

            if page.blocks.is_empty() {
                if !identity.is_checkpoint_reached() {
                    warn!("Relay returned no blocks before the checkpoint");
                    return Err(TeamServiceError::CheckpointNotReached);
                }
                break;
            }

            let applied = identity.apply(&page.blocks)?;
            cursor.advance(identity.pointer(), applied);
            debug!(
                page = cursor.pages(),
                applied = applied,
                has_more = page.has_more,
                "Applied block page"
            );

            if !page.has_more {
                break;
            }
        }

        if cursor.applied() > 0 {
            info!(
                blocks = cursor.applied(),
                pages = cursor.pages(),
                "Team chain synced"
            );
        }
        Ok(cursor.applied())
    }
}
