//! Hash chain data model
//!
//! A team's history is a singly linked list of signed blocks. Each append
//! block names the hash of the block before it; the first block names the
//! team's genesis public key instead. The relay stores and forwards blocks
//! but is never trusted to enforce any of this.

use crate::crypto::{digest, DigestAlgorithm, KeyPair, PublicKey};
use crate::encoding::base64_bytes;
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// One signed entry in the chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Block {
    /// Key that signed `payload`
    #[serde(with = "base64_bytes")]
    pub public_key: Vec<u8>,

    /// JSON-encoded [`Payload`]; these exact bytes are signed and hashed
    pub payload: String,

    #[serde(with = "base64_bytes")]
    pub signature: Vec<u8>,
}

impl Block {
    /// Encode `payload` and sign it with `signer`
    pub fn sign(payload: &Payload, signer: &KeyPair) -> Result<Self> {
        let payload = payload.encode()?;
        let signature = signer.sign(payload.as_bytes())?;
        Ok(Self {
            public_key: signer.public_key_bytes(),
            payload,
            signature,
        })
    }

    /// Content hash: SHA-256 over `public_key || payload || signature`
    pub fn hash(&self) -> Vec<u8> {
        let mut buf =
            Vec::with_capacity(self.public_key.len() + self.payload.len() + self.signature.len());
        buf.extend_from_slice(&self.public_key);
        buf.extend_from_slice(self.payload.as_bytes());
        buf.extend_from_slice(&self.signature);
        digest(&buf, DigestAlgorithm::Sha256)
    }

    /// Verify the signature against the embedded public key
    pub fn verify_signature(&self) -> Result<()> {
        PublicKey::from_slice(&self.public_key)?.verify(self.payload.as_bytes(), &self.signature)
    }

    /// Decode the payload
    pub fn decode_payload(&self) -> Result<Payload> {
        Ok(serde_json::from_str(&self.payload)?)
    }
}

/// Block payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Payload {
    Append(AppendBlock),
    Read(ReadBlock),
}

impl Payload {
    /// Canonical JSON encoding
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Extends the chain by one operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppendBlock {
    /// Hash of the previous block, or the genesis public key for the first block
    #[serde(with = "base64_bytes")]
    pub last_block_hash: Vec<u8>,

    pub operation: Operation,
}

/// Signed request for the next range of blocks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReadBlock {
    pub team_pointer: TeamPointer,

    #[serde(with = "base64_bytes")]
    pub nonce: Vec<u8>,

    pub unix_seconds: i64,
}

/// Team membership operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Admin adds a member directly
    AddMember(MemberIdentity),
    /// A member joins with an invite-derived key
    AcceptInvite(MemberIdentity),
    /// Admin announces the public key derived from an invitation seed
    Invite(InviteKey),
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::AddMember(_) => "add_member",
            Operation::AcceptInvite(_) => "accept_invite",
            Operation::Invite(_) => "invite",
        }
    }
}

/// A team member's public identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemberIdentity {
    /// Key the member signs chain blocks with
    #[serde(with = "base64_bytes")]
    pub public_key: Vec<u8>,

    pub email: String,

    #[serde(with = "base64_bytes")]
    pub ssh_public_key: Vec<u8>,

    #[serde(with = "base64_bytes")]
    pub pgp_public_key: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InviteKey {
    #[serde(with = "base64_bytes")]
    pub public_key: Vec<u8>,
}

/// Resumable position in the chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamPointer {
    /// No blocks seen yet: start from the team's genesis key
    PublicKey(#[serde(with = "base64_bytes")] Vec<u8>),
    /// Resume after this block
    LastBlockHash(#[serde(with = "base64_bytes")] Vec<u8>),
}

/// A page of blocks returned by the relay
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReadResponse {
    pub blocks: Vec<Block>,
    pub has_more: bool,
}

/// Relay reply envelope: `{"success": ...}` or `{"error": "..."}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerResponse<T> {
    Success(T),
    Error(String),
}

impl<T> ServerResponse<T> {
    pub fn into_result(self) -> std::result::Result<T, String> {
        match self {
            ServerResponse::Success(value) => Ok(value),
            ServerResponse::Error(message) => Err(message),
        }
    }
}

/// Body of a successful append
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmptyResponse {}
