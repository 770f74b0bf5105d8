//! In-memory secret store
//!
//! Data is lost on restart.

use parking_lot::RwLock;
use std::collections::HashMap;

use super::{SecretStore, StoreError};

#[derive(Debug, Default)]
pub struct MemorySecretStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecretStore for MemorySecretStore {
    fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.entries
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.entries.write().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.write().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_is_not_found() {
        let store = MemorySecretStore::new();
        assert_eq!(
            store.get("absent"),
            Err(StoreError::NotFound("absent".into()))
        );
    }

    #[test]
    fn test_set_get_delete() {
        let store = MemorySecretStore::new();
        store.set("k", b"value").unwrap();
        assert_eq!(store.get_string("k").unwrap(), "value");

        store.delete("k").unwrap();
        store.delete("k").unwrap();
        assert!(matches!(store.get("k"), Err(StoreError::NotFound(_))));
    }
}
