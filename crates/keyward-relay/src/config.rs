//! Relay configuration

use std::env;

/// Default number of blocks returned per read
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Default upper bound on an encoded payload
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Blocks per read page; always at least 1
    pub page_size: usize,
    pub max_payload_bytes: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
        }
    }
}

impl RelayConfig {
    /// Read `KEYWARD_RELAY_PAGE_SIZE`, falling back to defaults
    pub fn from_env() -> Self {
        let page_size = env::var("KEYWARD_RELAY_PAGE_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_PAGE_SIZE);
        Self::default().with_page_size(page_size)
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_max_payload_bytes(mut self, max_payload_bytes: usize) -> Self {
        self.max_payload_bytes = max_payload_bytes;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_size_floor() {
        assert_eq!(RelayConfig::default().with_page_size(0).page_size, 1);
        assert_eq!(RelayConfig::default().page_size, DEFAULT_PAGE_SIZE);
    }
}
