//! Known SSH hosts
//!
//! Host keys are pinned on first use per host name. A later assertion with
//! a different key for a pinned name is a mismatch.
//!
//! The host signature in a `VerifiedHostAuth` covers the SSH session, which
//! only the workstation sees; the workstation verifies it before forwarding.
//! Here it is only required to be present.

use keyward_core::VerifiedHostAuth;
use parking_lot::RwLock;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostAuthError {
    #[error("host public key mismatch for {0}")]
    HostMismatch(String),

    #[error("host authentication carries no host name")]
    MissingHostName,

    #[error("host authentication carries no signature")]
    MissingSignature,
}

/// Verifies and records host key assertions
pub trait KnownHosts: Send + Sync {
    /// Pin or match `auth.host_key` for every host name.
    ///
    /// The signature is not re-verified; an empty one is rejected.
    fn check_or_add(&self, auth: &VerifiedHostAuth) -> Result<(), HostAuthError>;
}

/// In-memory trust-on-first-use host key store
#[derive(Debug, Default)]
pub struct MemoryKnownHosts {
    pinned: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryKnownHosts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pin(&self, host_name: impl Into<String>, host_key: Vec<u8>) {
        self.pinned.write().insert(host_name.into(), host_key);
    }

    pub fn host_key(&self, host_name: &str) -> Option<Vec<u8>> {
        self.pinned.read().get(host_name).cloned()
    }
}

impl KnownHosts for MemoryKnownHosts {
    fn check_or_add(&self, auth: &VerifiedHostAuth) -> Result<(), HostAuthError> {
        if auth.signature.is_empty() {
            return Err(HostAuthError::MissingSignature);
        }
        if auth.host_names.is_empty() {
            return Err(HostAuthError::MissingHostName);
        }

        let mut pinned = self.pinned.write();
        for host in &auth.host_names {
            if let Some(known) = pinned.get(host) {
                if known != &auth.host_key {
                    warn!(host = %host, "Host key mismatch");
                    return Err(HostAuthError::HostMismatch(host.clone()));
                }
            }
        }

        for host in &auth.host_names {
            if !pinned.contains_key(host) {
                info!(host = %host, "Pinning new host key");
                pinned.insert(host.clone(), auth.host_key.clone());
            }
        }
        Ok(())
    }
}
