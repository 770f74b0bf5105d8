//! Shape checks applied before any cryptography or storage access

use keyward_core::{Block, ReadBlock};
use thiserror::Error;
use tracing::warn;

const PUBLIC_KEY_LEN: usize = 32;
const SIGNATURE_LEN: usize = 64;
const NONCE_LEN: usize = 32;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid public key length: expected 32 bytes, got {0}")]
    PublicKeyLength(usize),

    #[error("Invalid signature length: expected 64 bytes, got {0}")]
    SignatureLength(usize),

    #[error("Empty payload")]
    EmptyPayload,

    #[error("Payload too large: {size} bytes exceeds {max}")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("Invalid nonce length: expected 32 bytes, got {0}")]
    NonceLength(usize),
}

/// Validate the envelope of a submitted block
pub fn validate_block(block: &Block, max_payload_bytes: usize) -> Result<(), ValidationError> {
    if block.public_key.len() != PUBLIC_KEY_LEN {
        return Err(ValidationError::PublicKeyLength(block.public_key.len()));
    }
    if block.signature.len() != SIGNATURE_LEN {
        return Err(ValidationError::SignatureLength(block.signature.len()));
    }
    if block.payload.is_empty() {
        return Err(ValidationError::EmptyPayload);
    }
    if block.payload.len() > max_payload_bytes {
        warn!(
            size = block.payload.len(),
            max = max_payload_bytes,
            "Rejecting oversized payload"
        );
        return Err(ValidationError::PayloadTooLarge {
            size: block.payload.len(),
            max: max_payload_bytes,
        });
    }
    Ok(())
}

pub fn validate_read(read: &ReadBlock) -> Result<(), ValidationError> {
    if read.nonce.len() != NONCE_LEN {
        return Err(ValidationError::NonceLength(read.nonce.len()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyward_core::TeamPointer;

    fn block() -> Block {
        Block {
            public_key: vec![1; 32],
            payload: "{}".into(),
            signature: vec![2; 64],
        }
    }

    #[test]
    fn test_valid_envelope() {
        assert_eq!(validate_block(&block(), 1024), Ok(()));
    }

    #[test]
    fn test_bad_lengths() {
        let mut b = block();
        b.public_key.pop();
        assert_eq!(validate_block(&b, 1024), Err(ValidationError::PublicKeyLength(31)));

        let mut b = block();
        b.signature.push(0);
        assert_eq!(validate_block(&b, 1024), Err(ValidationError::SignatureLength(65)));
    }

    #[test]
    fn test_payload_limits() {
        let mut b = block();
        b.payload.clear();
        assert_eq!(validate_block(&b, 1024), Err(ValidationError::EmptyPayload));

        b.payload = "x".repeat(11);
        assert_eq!(
            validate_block(&b, 10),
            Err(ValidationError::PayloadTooLarge { size: 11, max: 10 })
        );
    }

    #[test]
    fn test_nonce_length() {
        let read = ReadBlock {
            team_pointer: TeamPointer::PublicKey(vec![1; 32]),
            nonce: vec![0; 8],
            unix_seconds: 0,
        };
        assert_eq!(validate_read(&read), Err(ValidationError::NonceLength(8)));
    }
}
