//! Team relay client
//!
//! The relay stores and forwards blocks. It is trusted for availability
//! only; everything it returns is verified locally.

use async_trait::async_trait;
use keyward_core::{Block, EmptyResponse, ReadResponse, ServerResponse};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum TeamServerError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Undecodable relay reply: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for TeamServerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            TeamServerError::Decode(err.to_string())
        } else {
            TeamServerError::Http(err.to_string())
        }
    }
}

/// The relay contract
#[async_trait]
pub trait TeamServer: Send + Sync {
    /// Submit a block carrying an append payload
    async fn post_block(&self, block: &Block) -> Result<ServerResponse<EmptyResponse>, TeamServerError>;

    /// Submit a block carrying a read payload
    async fn read_blocks(&self, request: &Block) -> Result<ServerResponse<ReadResponse>, TeamServerError>;
}

/// Relay reached over HTTP at `{base_url}/v1/chain`
#[derive(Debug, Clone)]
pub struct HttpTeamServer {
    endpoint: String,
    http_client: reqwest::Client,
}

impl HttpTeamServer {
    pub fn new(base_url: impl AsRef<str>) -> Self {
        Self {
            endpoint: format!("{}/v1/chain", base_url.as_ref().trim_end_matches('/')),
            http_client: reqwest::Client::new(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn submit<T: serde::de::DeserializeOwned>(
        &self,
        block: &Block,
    ) -> Result<ServerResponse<T>, TeamServerError> {
        debug!(endpoint = %self.endpoint, "Submitting block to relay");
        // error replies carry a JSON body, so the status is not checked
        let response = self.http_client.post(&self.endpoint).json(block).send().await?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl TeamServer for HttpTeamServer {
    async fn post_block(&self, block: &Block) -> Result<ServerResponse<EmptyResponse>, TeamServerError> {
        self.submit(block).await
    }

    async fn read_blocks(&self, request: &Block) -> Result<ServerResponse<ReadResponse>, TeamServerError> {
        self.submit(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_normalized() {
        assert_eq!(
            HttpTeamServer::new("https://relay.example.com/").endpoint(),
            "https://relay.example.com/v1/chain"
        );
        assert_eq!(
            HttpTeamServer::new("http://localhost:8080").endpoint(),
            "http://localhost:8080/v1/chain"
        );
    }
}
