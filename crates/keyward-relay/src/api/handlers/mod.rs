//! API request handlers

pub mod chain;

pub use chain::process_block;

use crate::core::Relay;

/// Shared application state
pub struct AppState {
    pub relay: Relay,
}
