//! Secret storage abstraction
//!
//! Stands in for the device keychain. Callers must branch on
//! [`StoreError::NotFound`] versus [`StoreError::Unknown`]: a missing entry
//! is an expected outcome, anything else is a failure.

pub mod memory;

pub use memory::MemorySecretStore;

/// Key under which the push endpoint identifier is stored
pub const SNS_ENDPOINT_ARN_KEY: &str = "sns_endpoint_arn";

/// Error type for secret store operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Secret not found: {0}")]
    NotFound(String),

    #[error("Secret store failure: {0}")]
    Unknown(String),
}

/// Keyed secret storage
pub trait SecretStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    /// Deleting a missing key is not an error
    fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Read a UTF-8 value
    fn get_string(&self, key: &str) -> Result<String, StoreError> {
        let bytes = self.get(key)?;
        String::from_utf8(bytes).map_err(|e| StoreError::Unknown(e.to_string()))
    }
}
