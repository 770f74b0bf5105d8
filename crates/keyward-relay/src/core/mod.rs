//! Core logic for the relay

mod relay;
mod validation;

pub use relay::{Relay, RelayError, RelayReply};
pub use validation::{validate_block, validate_read, ValidationError};
