//! # Keyward Core
//!
//! Shared types and primitives for Keyward, a phone-resident signer that
//! answers SSH and Git signing requests from paired workstations and keeps
//! team membership in a signed, append-only hash chain.
//!
//! ## Key Concepts
//!
//! - **Request / Response**: the JSON messages exchanged with a paired workstation
//! - **Signing Backend**: the black-box key custodian (sign, verify, digest)
//! - **Block**: one signed entry in the team hash chain
//! - **TeamIdentity**: the locally verified prefix of a team's chain
//!
//! ## Chain Invariants
//!
//! 1. **Authenticity**: every block verifies against its embedded public key
//! 2. **Linkage**: every block names the hash of the block before it
//!    (the genesis public key for the first block)
//! 3. **Atomicity**: a batch of blocks is applied entirely or not at all

pub mod crypto;
pub mod encoding;
pub mod error;
pub mod git;
pub mod hashchain;
pub mod team;
pub mod types;

pub use crypto::{DigestAlgorithm, Ed25519Backend, KeyIdentity, KeyPair, PublicKey, SigningBackend};
pub use error::{KeywardError, Result};
pub use git::{armor_signature, CommitInfo, GitInfo, TagInfo};
pub use hashchain::{
    AppendBlock, Block, EmptyResponse, InviteKey, MemberIdentity, Operation, Payload, ReadBlock,
    ReadResponse, ServerResponse, TeamPointer,
};
pub use team::{TeamIdentity, TeamInvite};
pub use types::{
    AckResponse, CacheKey, GitSignRequest, GitSignResponse, Me, MeRequest, MeResponse, Pairing,
    Request, Response, Session, SignRequest, SignResponse, UnpairRequest, UnpairResponse,
    VerifiedHostAuth, PROTOCOL_VERSION,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get the library version
pub fn version() -> &'static str {
    VERSION
}
