//! Wire types exchanged with a paired workstation
//!
//! Requests are decoded strictly: unknown fields are rejected at the
//! boundary rather than ignored. Binary values (keys, signatures, payloads)
//! are standard base64 strings.

use crate::encoding::{base64_bytes, base64_bytes_opt};
use crate::error::Result;
use crate::git::GitInfo;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Protocol version stamped on every response
pub const PROTOCOL_VERSION: &str = "2.4.0";

fn is_false(value: &bool) -> bool {
    !*value
}

/// A request delivered by a paired workstation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Request {
    /// Transport-assigned id, unique per session
    #[serde(rename = "request_id")]
    pub id: String,

    /// Workstation clock at send time
    pub unix_seconds: i64,

    #[serde(rename = "sign_request", default, skip_serializing_if = "Option::is_none")]
    pub sign: Option<SignRequest>,

    #[serde(rename = "git_sign_request", default, skip_serializing_if = "Option::is_none")]
    pub git_sign: Option<GitSignRequest>,

    #[serde(rename = "me_request", default, skip_serializing_if = "Option::is_none")]
    pub me: Option<MeRequest>,

    #[serde(rename = "unpair_request", default, skip_serializing_if = "Option::is_none")]
    pub unpair: Option<UnpairRequest>,

    /// Whether the workstation wants an ack while the request waits on approval
    #[serde(rename = "a", default, skip_serializing_if = "is_false")]
    pub send_ack: bool,

    #[serde(rename = "v", default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl Request {
    /// Create an empty request with the given id and timestamp
    pub fn new(id: impl Into<String>, unix_seconds: i64) -> Self {
        Self {
            id: id.into(),
            unix_seconds,
            sign: None,
            git_sign: None,
            me: None,
            unpair: None,
            send_ack: false,
            version: None,
        }
    }

    /// A request with nothing to answer
    pub fn is_noop(&self) -> bool {
        self.sign.is_none() && self.git_sign.is_none() && self.me.is_none()
    }

    /// Decode from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Encode to JSON bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// SSH signature request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignRequest {
    /// Data to be signed
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,

    /// SHA-256 fingerprint of the SSH public key the workstation expects
    #[serde(rename = "public_key_fingerprint", with = "base64_bytes")]
    pub fingerprint: Vec<u8>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_auth: Option<VerifiedHostAuth>,

    /// Command line that triggered the request, for display
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

impl SignRequest {
    /// Short label for audit entries
    pub fn display(&self) -> String {
        match (&self.command, &self.host_auth) {
            (Some(command), _) => command.clone(),
            (None, Some(auth)) => auth
                .host_names
                .first()
                .cloned()
                .unwrap_or_else(|| "unknown host".into()),
            (None, None) => "unknown host".into(),
        }
    }
}

/// Host key assertion forwarded by the workstation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifiedHostAuth {
    #[serde(with = "base64_bytes")]
    pub host_key: Vec<u8>,

    #[serde(with = "base64_bytes")]
    pub signature: Vec<u8>,

    pub host_names: Vec<String>,
}

/// Git commit or tag signature request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GitSignRequest {
    pub git: GitInfo,
    pub user_id: String,
}

/// Identity request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MeRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pgp_user_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UnpairRequest {}

/// A paired workstation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub pairing: Pairing,
}

impl Session {
    pub fn new(id: impl Into<String>, pairing: Pairing) -> Self {
        Self {
            id: id.into(),
            pairing,
        }
    }
}

/// Cryptographic identity of a paired workstation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pairing {
    #[serde(with = "base64_bytes")]
    pub workstation_public_key: Vec<u8>,
    pub name: String,
}

/// Deduplication key for the admission cache: `"{session}_{request}"`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(session: &Session, request: &Request) -> Self {
        Self(format!("{}_{}", session.id, request.id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<CacheKey> for String {
    fn from(key: CacheKey) -> Self {
        key.0
    }
}

/// Response sent back to the workstation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Response {
    pub request_id: String,

    /// Push endpoint the workstation can use to reach this device
    pub sns_endpoint_arn: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_until: Option<i64>,

    #[serde(rename = "sign_response", default, skip_serializing_if = "Option::is_none")]
    pub sign: Option<SignResponse>,

    #[serde(rename = "git_sign_response", default, skip_serializing_if = "Option::is_none")]
    pub git_sign: Option<GitSignResponse>,

    #[serde(rename = "me_response", default, skip_serializing_if = "Option::is_none")]
    pub me: Option<MeResponse>,

    #[serde(rename = "unpair_response", default, skip_serializing_if = "Option::is_none")]
    pub unpair: Option<UnpairResponse>,

    #[serde(rename = "ack_response", default, skip_serializing_if = "Option::is_none")]
    pub ack: Option<AckResponse>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_id: Option<String>,

    #[serde(rename = "v")]
    pub version: String,
}

impl Response {
    /// Create an empty response for a request
    pub fn new(request_id: impl Into<String>, sns_endpoint_arn: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            sns_endpoint_arn: sns_endpoint_arn.into(),
            approved_until: None,
            sign: None,
            git_sign: None,
            me: None,
            unpair: None,
            ack: None,
            tracking_id: None,
            version: PROTOCOL_VERSION.to_string(),
        }
    }

    pub fn with_approved_until(mut self, approved_until: Option<i64>) -> Self {
        self.approved_until = approved_until;
        self
    }

    pub fn with_tracking_id(mut self, tracking_id: Option<String>) -> Self {
        self.tracking_id = tracking_id;
        self
    }

    /// Error string carried by the sign or git-sign sub-response, if any
    pub fn error(&self) -> Option<&str> {
        self.sign
            .as_ref()
            .and_then(|s| s.error.as_deref())
            .or_else(|| self.git_sign.as_ref().and_then(|g| g.error.as_deref()))
    }

    /// Decode from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Encode to JSON bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignResponse {
    #[serde(default, skip_serializing_if = "Option::is_none", with = "base64_bytes_opt")]
    pub signature: Option<Vec<u8>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SignResponse {
    pub fn signed(signature: Vec<u8>) -> Self {
        Self {
            signature: Some(signature),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            signature: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GitSignResponse {
    /// PGP signature packet
    #[serde(default, skip_serializing_if = "Option::is_none", with = "base64_bytes_opt")]
    pub signature: Option<Vec<u8>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GitSignResponse {
    pub fn signed(signature: Vec<u8>) -> Self {
        Self {
            signature: Some(signature),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            signature: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MeResponse {
    pub me: Me,
}

/// Local identity material returned by a `me` request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Me {
    pub email: String,

    /// SSH wire encoding of the local public key
    #[serde(with = "base64_bytes")]
    pub public_key_wire: Vec<u8>,

    #[serde(rename = "pgp_pk", default, skip_serializing_if = "Option::is_none", with = "base64_bytes_opt")]
    pub pgp_public_key: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UnpairResponse {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AckResponse {}
