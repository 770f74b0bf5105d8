//! Keyward Relay
//!
//! Reference implementation of the team hash chain server. The relay stores
//! blocks and serves them back in pages. It is trusted for availability
//! only: members verify every block they read, so a relay can withhold or
//! reorder data but cannot forge membership.
//!
//! ## API Endpoints
//!
//! - `GET /health` - Liveness check
//! - `GET /ready` - Readiness check with team count
//! - `POST /v1/chain` - Submit a signed block: an append extends a chain,
//!   a read returns the next page after a `TeamPointer`
//!
//! Every `/v1/chain` reply is `{"success": ...}` or `{"error": "..."}`.

pub mod api;
pub mod config;
pub mod core;
pub mod storage;

pub use api::create_router;
pub use api::handlers::AppState;
pub use config::RelayConfig;
pub use core::{Relay, RelayError, RelayReply};
pub use storage::{BlockStore, MemoryBlockStore, StorageError};
