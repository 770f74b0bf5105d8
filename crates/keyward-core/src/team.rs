//! Locally verified team state
//!
//! `TeamIdentity` owns the accepted prefix of a team's chain together with
//! the local member's keypair. Blocks are applied in batches: a batch is
//! verified against a scratch copy of the state and committed only if
//! every block passes, so a rejected batch leaves the identity untouched.
//!
//! ## Verification rules
//!
//! For each block, in delivery order:
//! 1. the signature verifies against the block's own public key
//! 2. the payload is an append whose `last_block_hash` equals the hash of
//!    the last accepted block (the genesis public key for the first block)
//! 3. the signer may perform the operation: the first block and every
//!    `add_member` / `invite` are signed by the genesis (admin) key, and an
//!    `accept_invite` is signed by a previously announced invite key, which
//!    is consumed

use crate::crypto::{KeyPair, SEED_LEN};
use crate::encoding::base64_bytes;
use crate::error::{KeywardError, Result};
use crate::hashchain::{Block, MemberIdentity, Operation, Payload, TeamPointer};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Invitation handed out of band to a prospective member
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamInvite {
    /// Seed of the one-time invite keypair
    #[serde(with = "base64_bytes")]
    pub seed: Vec<u8>,

    /// Genesis key of the team being joined
    #[serde(with = "base64_bytes")]
    pub initial_team_public_key: Vec<u8>,
}

impl std::fmt::Debug for TeamInvite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TeamInvite")
            .field("seed", &"[redacted]")
            .field(
                "initial_team_public_key",
                &hex::encode(&self.initial_team_public_key),
            )
            .finish()
    }
}

impl TeamInvite {
    /// Derive the invite keypair from the seed
    pub fn keypair(&self) -> Result<KeyPair> {
        KeyPair::from_seed(&self.seed)
    }

    pub fn is_well_formed(&self) -> bool {
        self.seed.len() == SEED_LEN
    }
}

#[derive(Debug, Clone, Default)]
struct ChainState {
    blocks: Vec<Block>,
    hashes: Vec<Vec<u8>>,
    members: Vec<MemberIdentity>,
    invite_keys: HashSet<Vec<u8>>,
}

impl ChainState {
    fn last_block_hash(&self) -> Option<&[u8]> {
        self.hashes.last().map(Vec::as_slice)
    }

    fn apply(&mut self, block: &Block, genesis: &[u8]) -> Result<()> {
        let index = self.blocks.len();
        block.verify_signature()?;

        let append = match block.decode_payload()? {
            Payload::Append(append) => append,
            Payload::Read(_) => return Err(KeywardError::UnexpectedReadBlock(index)),
        };

        let expected = self.last_block_hash().unwrap_or(genesis);
        if append.last_block_hash != expected {
            return Err(KeywardError::LinkageMismatch {
                index,
                expected: hex::encode(expected),
                actual: hex::encode(&append.last_block_hash),
            });
        }

        let signed_by_admin = block.public_key == genesis;
        if index == 0 && !signed_by_admin {
            return Err(KeywardError::UnauthorizedSigner {
                index,
                reason: "first block must be signed by the team key".into(),
            });
        }

        match append.operation {
            Operation::AddMember(member) => {
                if !signed_by_admin {
                    return Err(KeywardError::UnauthorizedSigner {
                        index,
                        reason: "add_member requires the team key".into(),
                    });
                }
                self.add_member(member);
            }
            Operation::Invite(invite) => {
                if !signed_by_admin {
                    return Err(KeywardError::UnauthorizedSigner {
                        index,
                        reason: "invite requires the team key".into(),
                    });
                }
                self.invite_keys.insert(invite.public_key);
            }
            Operation::AcceptInvite(member) => {
                if !self.invite_keys.remove(&block.public_key) {
                    return Err(KeywardError::UnauthorizedSigner {
                        index,
                        reason: "accept_invite not signed by an outstanding invite key".into(),
                    });
                }
                self.add_member(member);
            }
        }

        self.hashes.push(block.hash());
        self.blocks.push(block.clone());
        Ok(())
    }

    fn add_member(&mut self, member: MemberIdentity) {
        self.members.retain(|m| m.public_key != member.public_key);
        self.members.push(member);
    }
}

/// A member's view of a team
#[derive(Debug, Clone)]
pub struct TeamIdentity {
    initial_team_public_key: Vec<u8>,
    keypair: KeyPair,
    email: String,
    checkpoint: Option<Vec<u8>>,
    state: ChainState,
}

impl TeamIdentity {
    /// Join an existing team identified by its genesis key
    pub fn new(initial_team_public_key: Vec<u8>, keypair: KeyPair, email: impl Into<String>) -> Self {
        Self {
            initial_team_public_key,
            keypair,
            email: email.into(),
            checkpoint: None,
            state: ChainState::default(),
        }
    }

    /// Found a new team; the local keypair becomes the genesis (admin) key
    pub fn new_admin(keypair: KeyPair, email: impl Into<String>) -> Self {
        let genesis = keypair.public_key_bytes();
        Self::new(genesis, keypair, email)
    }

    pub fn initial_team_public_key(&self) -> &[u8] {
        &self.initial_team_public_key
    }

    pub fn keypair(&self) -> &KeyPair {
        &self.keypair
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    /// Whether the local key is the team's genesis key
    pub fn is_admin(&self) -> bool {
        self.keypair.public_key_bytes() == self.initial_team_public_key
    }

    /// Hash of the last accepted block
    pub fn last_block_hash(&self) -> Option<&[u8]> {
        self.state.last_block_hash()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.state.blocks
    }

    pub fn members(&self) -> &[MemberIdentity] {
        &self.state.members
    }

    pub fn is_member(&self, public_key: &[u8]) -> bool {
        self.state.members.iter().any(|m| m.public_key == public_key)
    }

    /// Announced invite keys not yet used
    pub fn outstanding_invites(&self) -> usize {
        self.state.invite_keys.len()
    }

    /// Where the next read should resume
    pub fn pointer(&self) -> TeamPointer {
        match self.state.last_block_hash() {
            Some(hash) => TeamPointer::LastBlockHash(hash.to_vec()),
            None => TeamPointer::PublicKey(self.initial_team_public_key.clone()),
        }
    }

    pub fn checkpoint(&self) -> Option<&[u8]> {
        self.checkpoint.as_deref()
    }

    /// Record a block hash the local chain is known to contain
    pub fn set_checkpoint(&mut self, hash: Vec<u8>) {
        self.checkpoint = Some(hash);
    }

    /// Whether the accepted prefix is known to be complete.
    ///
    /// With a checkpoint set, the prefix must contain the checkpoint block.
    /// Without one, an empty chain is never considered complete.
    pub fn is_checkpoint_reached(&self) -> bool {
        match &self.checkpoint {
            Some(checkpoint) => self.state.hashes.iter().any(|h| h == checkpoint),
            None => !self.state.blocks.is_empty(),
        }
    }

    /// This member's public identity for `add_member` / `accept_invite`
    pub fn member_identity(&self, ssh_public_key: Vec<u8>, pgp_public_key: Vec<u8>) -> MemberIdentity {
        MemberIdentity {
            public_key: self.keypair.public_key_bytes(),
            email: self.email.clone(),
            ssh_public_key,
            pgp_public_key,
        }
    }

    /// Verify and apply a batch of blocks atomically.
    ///
    /// Returns the number of blocks applied. On error nothing is applied.
    pub fn apply(&mut self, blocks: &[Block]) -> Result<usize> {
        let mut next = self.state.clone();
        for block in blocks {
            if let Err(err) = next.apply(block, &self.initial_team_public_key) {
                tracing::debug!(
                    error = %err,
                    accepted = self.state.blocks.len(),
                    batch = blocks.len(),
                    "rejecting block batch"
                );
                return Err(err);
            }
        }
        self.state = next;
        Ok(blocks.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashchain::{AppendBlock, InviteKey};

    fn member(kp: &KeyPair, email: &str) -> MemberIdentity {
        MemberIdentity {
            public_key: kp.public_key_bytes(),
            email: email.into(),
            ssh_public_key: vec![1; 32],
            pgp_public_key: vec![2; 32],
        }
    }

    fn append(last: &[u8], operation: Operation, signer: &KeyPair) -> Block {
        Block::sign(
            &Payload::Append(AppendBlock {
                last_block_hash: last.to_vec(),
                operation,
            }),
            signer,
        )
        .unwrap()
    }

    #[test]
    fn test_genesis_block_applies() {
        let admin = KeyPair::generate();
        let mut team = TeamIdentity::new_admin(admin.clone(), "admin@example.com");
        assert!(team.is_admin());
        assert!(!team.is_checkpoint_reached());

        let genesis = team.initial_team_public_key().to_vec();
        let block = append(&genesis, Operation::AddMember(member(&admin, "admin@example.com")), &admin);

        assert_eq!(team.apply(&[block.clone()]).unwrap(), 1);
        assert_eq!(team.last_block_hash(), Some(block.hash().as_slice()));
        assert!(team.is_member(&admin.public_key_bytes()));
        assert!(team.is_checkpoint_reached());
        assert_eq!(team.pointer(), TeamPointer::LastBlockHash(block.hash()));
    }

    #[test]
    fn test_first_block_must_come_from_genesis_key() {
        let admin = KeyPair::generate();
        let intruder = KeyPair::generate();
        let mut team = TeamIdentity::new(admin.public_key_bytes(), intruder.clone(), "x@example.com");

        let block = append(
            &admin.public_key_bytes(),
            Operation::AddMember(member(&intruder, "x@example.com")),
            &intruder,
        );
        let err = team.apply(&[block]).unwrap_err();
        assert!(matches!(err, KeywardError::UnauthorizedSigner { index: 0, .. }));
        assert!(team.blocks().is_empty());
    }

    #[test]
    fn test_batch_is_atomic() {
        let admin = KeyPair::generate();
        let mut team = TeamIdentity::new_admin(admin.clone(), "admin@example.com");
        let genesis = admin.public_key_bytes();

        let first = append(&genesis, Operation::AddMember(member(&admin, "a")), &admin);
        let bad = append(&[9; 32], Operation::AddMember(member(&KeyPair::generate(), "b")), &admin);

        let err = team.apply(&[first, bad]).unwrap_err();
        assert!(matches!(err, KeywardError::LinkageMismatch { index: 1, .. }));
        assert!(team.blocks().is_empty());
        assert!(team.members().is_empty());
    }

    #[test]
    fn test_invite_then_accept() {
        let admin = KeyPair::generate();
        let mut team = TeamIdentity::new_admin(admin.clone(), "admin@example.com");
        let genesis = admin.public_key_bytes();

        let invite_kp = KeyPair::from_seed(&[5; 32]).unwrap();
        let newcomer = KeyPair::generate();

        let b0 = append(&genesis, Operation::AddMember(member(&admin, "a")), &admin);
        let b1 = append(
            &b0.hash(),
            Operation::Invite(InviteKey {
                public_key: invite_kp.public_key_bytes(),
            }),
            &admin,
        );
        let b2 = append(&b1.hash(), Operation::AcceptInvite(member(&newcomer, "n")), &invite_kp);

        team.apply(&[b0, b1, b2.clone()]).unwrap();
        assert!(team.is_member(&newcomer.public_key_bytes()));
        assert_eq!(team.outstanding_invites(), 0);

        // the invite key is consumed
        let replay = append(&b2.hash(), Operation::AcceptInvite(member(&KeyPair::generate(), "r")), &invite_kp);
        assert!(matches!(
            team.apply(&[replay]).unwrap_err(),
            KeywardError::UnauthorizedSigner { index: 3, .. }
        ));
    }

    #[test]
    fn test_non_admin_cannot_add_member() {
        let admin = KeyPair::generate();
        let member_kp = KeyPair::generate();
        let mut team = TeamIdentity::new_admin(admin.clone(), "admin@example.com");

        let b0 = append(&admin.public_key_bytes(), Operation::AddMember(member(&member_kp, "m")), &admin);
        let b1 = append(&b0.hash(), Operation::AddMember(member(&KeyPair::generate(), "z")), &member_kp);

        team.apply(&[b0]).unwrap();
        assert!(team.apply(&[b1]).is_err());
        assert_eq!(team.blocks().len(), 1);
    }

    #[test]
    fn test_checkpoint_requires_block_present() {
        let admin = KeyPair::generate();
        let mut team = TeamIdentity::new_admin(admin.clone(), "admin@example.com");
        let b0 = append(&admin.public_key_bytes(), Operation::AddMember(member(&admin, "a")), &admin);
        let b1 = append(&b0.hash(), Operation::AddMember(member(&KeyPair::generate(), "b")), &admin);

        team.set_checkpoint(b1.hash());
        team.apply(&[b0]).unwrap();
        assert!(!team.is_checkpoint_reached());
        team.apply(&[b1]).unwrap();
        assert!(team.is_checkpoint_reached());
    }

    #[test]
    fn test_read_block_rejected_in_chain() {
        let admin = KeyPair::generate();
        let mut team = TeamIdentity::new_admin(admin.clone(), "admin@example.com");
        let read = Block::sign(
            &Payload::Read(crate::hashchain::ReadBlock {
                team_pointer: team.pointer(),
                nonce: vec![0; 32],
                unix_seconds: 0,
            }),
            &admin,
        )
        .unwrap();
        assert!(matches!(
            team.apply(&[read]).unwrap_err(),
            KeywardError::UnexpectedReadBlock(0)
        ));
    }

    #[test]
    fn test_invite_debug_redacts_seed() {
        let invite = TeamInvite {
            seed: vec![1; 32],
            initial_team_public_key: vec![2; 32],
        };
        assert!(format!("{:?}", invite).contains("[redacted]"));
        assert!(invite.is_well_formed());
    }
}
