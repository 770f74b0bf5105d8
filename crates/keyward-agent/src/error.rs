//! Error types for the agent

use keyward_core::KeywardError;
use thiserror::Error;

use crate::transport::TransportError;

/// Result type for request admission
pub type SiloResult<T> = std::result::Result<T, SiloError>;

/// Result type for team chain operations
pub type TeamResult<T> = std::result::Result<T, TeamServiceError>;

/// Errors that abort request handling
///
/// None of these are ever delivered to the workstation as a signed
/// response; business outcomes (rejection, host mismatch) travel inside the
/// response's error string instead.
#[derive(Error, Debug)]
pub enum SiloError {
    /// The session is not (or no longer) paired
    #[error("Session removed")]
    SessionRemoved,

    /// Request timestamp is outside the tolerance window
    #[error("Invalid request time: request at {request_seconds}, now {now}")]
    InvalidRequestTime { request_seconds: i64, now: i64 },

    /// The request is already waiting on a human decision
    #[error("Request pending approval")]
    RequestPending,

    /// The workstation asked for a key this device does not hold
    #[error("Requested key does not match the local identity")]
    KeyMismatch,

    /// Identity material unusable or a cached response undecodable
    #[error(transparent)]
    Core(#[from] KeywardError),

    /// Response could not be delivered
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Errors from team chain operations
///
/// Every variant leaves the local chain state unchanged.
#[derive(Error, Debug)]
pub enum TeamServiceError {
    /// The chain has not been synced far enough to append
    #[error("Missing last block hash; sync the team first")]
    MissingLastBlockHash,

    /// The payload could not be signed
    #[error("Payload signature failed: {0}")]
    PayloadSignature(String),

    /// The invitation seed does not derive a keypair
    #[error("Bad invite seed: {0}")]
    BadInviteSeed(String),

    /// Accepting an invite requires the newest block
    #[error("Need newest block before accepting an invite")]
    NeedNewestBlock,

    /// The relay returned no blocks but the local chain is not known complete
    #[error("Checkpoint not reached")]
    CheckpointNotReached,

    /// The relay refused or failed to store the block
    #[error("Block did not post: {0}")]
    BlockDidNotPost(String),

    /// Only the genesis key may found the team
    #[error("Creating a team requires the team admin keypair")]
    NeedAdminKeypair,

    /// The team already has blocks
    #[error("Team already created")]
    TeamAlreadyCreated,

    /// The relay's reply could not be used
    #[error("Bad relay response: {0}")]
    BadResponse(String),

    /// A delivered block failed verification
    #[error("Verification failed: {0}")]
    Verification(#[from] KeywardError),
}
