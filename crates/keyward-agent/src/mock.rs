//! Test doubles for the agent's collaborators
//!
//! For testing purposes. Each double records what it was asked to do so
//! tests can assert on side effects.

use async_trait::async_trait;
use keyward_core::{
    DigestAlgorithm, Ed25519Backend, KeyIdentity, Request, Response, Result, Session,
    SigningBackend,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::notify::{Notifier, Outcome};
use crate::store::{SecretStore, StoreError};
use crate::transport::{ResponseSender, TransportError};

/// Sender that records every response as encoded bytes
#[derive(Debug, Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<(String, Vec<u8>)>>,
    fail: AtomicBool,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent sends fail
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// `(session_id, encoded response)` in send order
    pub fn sent(&self) -> Vec<(String, Vec<u8>)> {
        self.sent.lock().clone()
    }

    /// Decoded responses in send order
    pub fn responses(&self) -> Vec<Response> {
        self.sent
            .lock()
            .iter()
            .filter_map(|(_, bytes)| Response::from_bytes(bytes).ok())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().len()
    }
}

#[async_trait]
impl ResponseSender for RecordingSender {
    async fn send(&self, session: &Session, response: &Response) -> std::result::Result<(), TransportError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(TransportError::SendFailed("sender set to fail".into()));
        }
        let bytes = response
            .to_bytes()
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;
        self.sent.lock().push((session.id.clone(), bytes));
        Ok(())
    }
}

/// Notifier that records prompts and outcomes
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    prompts: Mutex<Vec<String>>,
    outcomes: Mutex<Vec<(String, Outcome)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request ids the human was prompted for
    pub fn authorization_requests(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    /// `(request_id, outcome)` in notification order
    pub fn outcomes(&self) -> Vec<(String, Outcome)> {
        self.outcomes.lock().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn request_authorization(&self, _session: &Session, request: &Request) {
        self.prompts.lock().push(request.id.clone());
    }

    fn notify_outcome(&self, _session: &Session, request: &Request, outcome: &Outcome) {
        self.outcomes.lock().push((request.id.clone(), outcome.clone()));
    }
}

/// Backend that counts signatures
#[derive(Debug)]
pub struct CountingBackend {
    inner: Ed25519Backend,
    signs: AtomicUsize,
}

impl CountingBackend {
    pub fn new(inner: Ed25519Backend) -> Self {
        Self {
            inner,
            signs: AtomicUsize::new(0),
        }
    }

    pub fn sign_count(&self) -> usize {
        self.signs.load(Ordering::SeqCst)
    }
}

impl SigningBackend for CountingBackend {
    fn public_key(&self, identity: KeyIdentity) -> Result<Vec<u8>> {
        self.inner.public_key(identity)
    }

    fn sign(&self, bytes: &[u8], identity: KeyIdentity) -> Result<Vec<u8>> {
        self.signs.fetch_add(1, Ordering::SeqCst);
        self.inner.sign(bytes, identity)
    }

    fn verify(&self, bytes: &[u8], signature: &[u8], public_key: &[u8]) -> bool {
        self.inner.verify(bytes, signature, public_key)
    }

    fn digest(&self, bytes: &[u8], algorithm: DigestAlgorithm) -> Vec<u8> {
        self.inner.digest(bytes, algorithm)
    }
}

/// Secret store whose every operation fails with `Unknown`
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingSecretStore;

impl SecretStore for FailingSecretStore {
    fn get(&self, _key: &str) -> std::result::Result<Vec<u8>, StoreError> {
        Err(StoreError::Unknown("keychain unavailable".into()))
    }

    fn set(&self, _key: &str, _value: &[u8]) -> std::result::Result<(), StoreError> {
        Err(StoreError::Unknown("keychain unavailable".into()))
    }

    fn delete(&self, _key: &str) -> std::result::Result<(), StoreError> {
        Err(StoreError::Unknown("keychain unavailable".into()))
    }
}
