//! Response delivery

use async_trait::async_trait;
use keyward_core::{Response, Session};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// How a request reached the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommunicationMedium {
    Push,
    Bluetooth,
    Polling,
}

impl fmt::Display for CommunicationMedium {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommunicationMedium::Push => write!(f, "push"),
            CommunicationMedium::Bluetooth => write!(f, "bluetooth"),
            CommunicationMedium::Polling => write!(f, "polling"),
        }
    }
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Send failed: {0}")]
    SendFailed(String),
}

/// Delivers responses to a paired workstation
#[async_trait]
pub trait ResponseSender: Send + Sync {
    async fn send(&self, session: &Session, response: &Response) -> Result<(), TransportError>;
}
