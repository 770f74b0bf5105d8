//! The device's own signing identity
//!
//! Wraps the signing backend with the local email and the set of PGP user
//! ids a public key has been issued for. Raw key material never leaves
//! the backend.

use keyward_core::{KeyIdentity, PublicKey, Result, SigningBackend};
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

pub struct LocalIdentity {
    email: String,
    backend: Arc<dyn SigningBackend>,
    pgp_user_ids: RwLock<BTreeSet<String>>,
}

impl std::fmt::Debug for LocalIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalIdentity")
            .field("email", &self.email)
            .field("pgp_user_ids", &*self.pgp_user_ids.read())
            .finish()
    }
}

impl LocalIdentity {
    pub fn new(email: impl Into<String>, backend: Arc<dyn SigningBackend>) -> Self {
        Self {
            email: email.into(),
            backend,
            pgp_user_ids: RwLock::new(BTreeSet::new()),
        }
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn backend(&self) -> &Arc<dyn SigningBackend> {
        &self.backend
    }

    fn ssh_public_key(&self) -> Result<PublicKey> {
        PublicKey::from_slice(&self.backend.public_key(KeyIdentity::Ssh)?)
    }

    /// SSH wire encoding of the local SSH key
    pub fn ssh_wire(&self) -> Result<Vec<u8>> {
        Ok(self.ssh_public_key()?.ssh_wire())
    }

    /// SHA-256 fingerprint of the SSH wire encoding
    pub fn ssh_fingerprint(&self) -> Result<Vec<u8>> {
        Ok(self.ssh_public_key()?.ssh_fingerprint())
    }

    pub fn sign_ssh(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.backend.sign(data, KeyIdentity::Ssh)
    }

    pub fn sign_git(&self, payload: &[u8]) -> Result<Vec<u8>> {
        self.backend.sign(payload, KeyIdentity::Pgp)
    }

    /// Record that a PGP key was issued for `user_id`
    pub fn record_pgp_user_id(&self, user_id: &str) {
        if self.pgp_user_ids.write().insert(user_id.to_string()) {
            debug!(user_id = %user_id, "Issued PGP key for new user id");
        }
    }

    /// PGP public key issued for `user_id`, recording the user id
    pub fn pgp_public_key_for(&self, user_id: &str) -> Result<Vec<u8>> {
        self.record_pgp_user_id(user_id);
        self.backend.public_key(KeyIdentity::Pgp)
    }

    pub fn pgp_user_ids(&self) -> Vec<String> {
        self.pgp_user_ids.read().iter().cloned().collect()
    }
}
