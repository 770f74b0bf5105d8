//! Cryptographic primitives for request signing and the team chain
//!
//! Everything above this module treats signing as a black box with a fixed
//! contract: `sign`, `verify` and `digest`. The contract is the
//! [`SigningBackend`] trait; [`Ed25519Backend`] is the implementation used
//! by the agent and the tests.
//!
//! Key types:
//! - `KeyPair`: Ed25519 key pair, either random or derived from a 32-byte seed
//! - `PublicKey`: Ed25519 public key with SSH wire encoding and fingerprint
//! - `KeyIdentity`: which local identity a signature is produced with

use crate::error::{KeywardError, Result};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};

/// SSH key type name for Ed25519 keys
pub const SSH_ED25519: &str = "ssh-ed25519";

/// Length of an invitation or keypair seed
pub const SEED_LEN: usize = 32;

/// Hash algorithms available through the signing backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DigestAlgorithm {
    Sha1,
    Sha256,
    Sha512,
}

/// Local identities that can produce signatures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyIdentity {
    /// The SSH user key presented to remote hosts
    Ssh,
    /// The PGP key used for git commit and tag signatures
    Pgp,
}

/// Compute a digest with the given algorithm
pub fn digest(bytes: &[u8], algorithm: DigestAlgorithm) -> Vec<u8> {
    match algorithm {
        DigestAlgorithm::Sha1 => Sha1::digest(bytes).to_vec(),
        DigestAlgorithm::Sha256 => Sha256::digest(bytes).to_vec(),
        DigestAlgorithm::Sha512 => Sha512::digest(bytes).to_vec(),
    }
}

/// Verify an Ed25519 signature given raw public key and signature bytes.
///
/// Malformed keys or signatures verify as `false`.
pub fn verify_signature(public_key: &[u8], message: &[u8], signature: &[u8]) -> bool {
    match PublicKey::from_slice(public_key) {
        Ok(pk) => pk.verify(message, signature).is_ok(),
        Err(_) => false,
    }
}

/// Ed25519 key pair
#[derive(Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &hex::encode(self.verifying_key.to_bytes()))
            .field("signing_key", &"[redacted]")
            .finish()
    }
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::generate(&mut OsRng))
    }

    /// Derive a key pair from a 32-byte seed
    pub fn from_seed(seed: &[u8]) -> Result<Self> {
        let seed: [u8; SEED_LEN] = seed
            .try_into()
            .map_err(|_| KeywardError::InvalidSeed(seed.len()))?;
        Ok(Self::from_signing_key(SigningKey::from_bytes(&seed)))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let verifying_key = signing_key.verifying_key();
        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Get the public key
    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            verifying_key: self.verifying_key,
        }
    }

    /// Get the raw public key bytes
    pub fn public_key_bytes(&self) -> Vec<u8> {
        self.verifying_key.to_bytes().to_vec()
    }

    /// Sign a message
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        let signature: Signature = self
            .signing_key
            .try_sign(message)
            .map_err(KeywardError::from)?;
        Ok(signature.to_bytes().to_vec())
    }
}

/// Ed25519 public key
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey {
    verifying_key: VerifyingKey,
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PublicKey({})", hex::encode(self.verifying_key.to_bytes()))
    }
}

impl PublicKey {
    /// Parse a public key from raw bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| KeywardError::CryptoError("Invalid public key length".into()))?;
        let verifying_key = VerifyingKey::from_bytes(&bytes)?;
        Ok(Self { verifying_key })
    }

    /// Get the raw public key bytes
    pub fn to_bytes(&self) -> [u8; 32] {
        self.verifying_key.to_bytes()
    }

    /// Verify a signature over `message`
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<()> {
        let signature: [u8; 64] = signature
            .try_into()
            .map_err(|_| KeywardError::SignatureInvalid("Invalid signature length".into()))?;
        self.verifying_key
            .verify(message, &Signature::from_bytes(&signature))
            .map_err(|e| KeywardError::SignatureInvalid(e.to_string()))
    }

    /// SSH wire encoding: `string "ssh-ed25519" || string key`
    pub fn ssh_wire(&self) -> Vec<u8> {
        let key = self.to_bytes();
        let mut wire = Vec::with_capacity(4 + SSH_ED25519.len() + 4 + key.len());
        write_ssh_string(&mut wire, SSH_ED25519.as_bytes());
        write_ssh_string(&mut wire, &key);
        wire
    }

    /// SHA-256 fingerprint of the SSH wire encoding
    pub fn ssh_fingerprint(&self) -> Vec<u8> {
        digest(&self.ssh_wire(), DigestAlgorithm::Sha256)
    }
}

fn write_ssh_string(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    buf.extend_from_slice(bytes);
}

/// Signing backend contract
///
/// Implementations hold the private key material; callers only ever see
/// public keys and signatures.
pub trait SigningBackend: Send + Sync {
    /// Raw public key bytes for a local identity
    fn public_key(&self, identity: KeyIdentity) -> Result<Vec<u8>>;

    /// Sign `bytes` with a local identity
    fn sign(&self, bytes: &[u8], identity: KeyIdentity) -> Result<Vec<u8>>;

    /// Verify `signature` over `bytes` against a raw public key
    fn verify(&self, bytes: &[u8], signature: &[u8], public_key: &[u8]) -> bool;

    /// Hash `bytes`
    fn digest(&self, bytes: &[u8], algorithm: DigestAlgorithm) -> Vec<u8>;
}

/// Ed25519 signing backend with separate SSH and PGP keys
#[derive(Debug, Clone)]
pub struct Ed25519Backend {
    ssh: KeyPair,
    pgp: KeyPair,
}

impl Ed25519Backend {
    /// Create a backend with freshly generated keys
    pub fn generate() -> Self {
        Self {
            ssh: KeyPair::generate(),
            pgp: KeyPair::generate(),
        }
    }

    /// Create a backend from existing key pairs
    pub fn new(ssh: KeyPair, pgp: KeyPair) -> Self {
        Self { ssh, pgp }
    }

    fn key(&self, identity: KeyIdentity) -> &KeyPair {
        match identity {
            KeyIdentity::Ssh => &self.ssh,
            KeyIdentity::Pgp => &self.pgp,
        }
    }
}

impl SigningBackend for Ed25519Backend {
    fn public_key(&self, identity: KeyIdentity) -> Result<Vec<u8>> {
        Ok(self.key(identity).public_key_bytes())
    }

    fn sign(&self, bytes: &[u8], identity: KeyIdentity) -> Result<Vec<u8>> {
        self.key(identity).sign(bytes)
    }

    fn verify(&self, bytes: &[u8], signature: &[u8], public_key: &[u8]) -> bool {
        verify_signature(public_key, bytes, signature)
    }

    fn digest(&self, bytes: &[u8], algorithm: DigestAlgorithm) -> Vec<u8> {
        digest(bytes, algorithm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let kp = KeyPair::generate();
        let sig = kp.sign(b"payload").unwrap();

        assert_eq!(sig.len(), 64);
        assert!(kp.public_key().verify(b"payload", &sig).is_ok());
        assert!(verify_signature(&kp.public_key_bytes(), b"payload", &sig));
    }

    #[test]
    fn test_verification_fails_with_wrong_key() {
        let kp1 = KeyPair::generate();
        let kp2 = KeyPair::generate();
        let sig = kp1.sign(b"payload").unwrap();

        assert!(kp2.public_key().verify(b"payload", &sig).is_err());
        assert!(!verify_signature(&kp2.public_key_bytes(), b"payload", &sig));
    }

    #[test]
    fn test_malformed_inputs_do_not_verify() {
        let kp = KeyPair::generate();
        let sig = kp.sign(b"payload").unwrap();

        assert!(!verify_signature(&[0u8; 7], b"payload", &sig));
        assert!(!verify_signature(&kp.public_key_bytes(), b"payload", &sig[..10]));
    }

    #[test]
    fn test_from_seed_is_deterministic() {
        let seed = [7u8; 32];
        let a = KeyPair::from_seed(&seed).unwrap();
        let b = KeyPair::from_seed(&seed).unwrap();
        assert_eq!(a.public_key(), b.public_key());
    }

    #[test]
    fn test_from_seed_rejects_bad_length() {
        let err = KeyPair::from_seed(&[1u8; 16]).unwrap_err();
        assert!(matches!(err, KeywardError::InvalidSeed(16)));
    }

    #[test]
    fn test_ssh_wire_layout() {
        let kp = KeyPair::generate();
        let wire = kp.public_key().ssh_wire();

        assert_eq!(&wire[0..4], &11u32.to_be_bytes());
        assert_eq!(&wire[4..15], b"ssh-ed25519");
        assert_eq!(&wire[15..19], &32u32.to_be_bytes());
        assert_eq!(&wire[19..], &kp.public_key().to_bytes());
        assert_eq!(kp.public_key().ssh_fingerprint().len(), 32);
    }

    #[test]
    fn test_digest_lengths() {
        assert_eq!(digest(b"abc", DigestAlgorithm::Sha1).len(), 20);
        assert_eq!(digest(b"abc", DigestAlgorithm::Sha256).len(), 32);
        assert_eq!(digest(b"abc", DigestAlgorithm::Sha512).len(), 64);
        assert_eq!(
            hex::encode(digest(b"abc", DigestAlgorithm::Sha1)),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
    }

    #[test]
    fn test_backend_keeps_identities_separate() {
        let backend = Ed25519Backend::generate();
        let ssh = backend.public_key(KeyIdentity::Ssh).unwrap();
        let pgp = backend.public_key(KeyIdentity::Pgp).unwrap();
        assert_ne!(ssh, pgp);

        let sig = backend.sign(b"data", KeyIdentity::Pgp).unwrap();
        assert!(backend.verify(b"data", &sig, &pgp));
        assert!(!backend.verify(b"data", &sig, &ssh));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let kp = KeyPair::generate();
        let rendered = format!("{:?}", kp);
        assert!(rendered.contains("[redacted]"));
    }
}
