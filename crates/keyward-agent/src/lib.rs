//! Keyward Agent
//!
//! The device-side runtime. A transport hands each inbound request to the
//! [`Silo`], which deduplicates it, checks its freshness, consults the
//! [`Policy`] and either answers it or parks it for a human decision. The
//! [`TeamService`] keeps the local view of the team chain in sync with an
//! untrusted relay.
//!
//! ## Architecture
//!
//! Every external collaborator is a trait with an in-memory implementation:
//!
//! - **SessionRegistry**: paired workstations
//! - **ResponseSender**: delivers responses over push, Bluetooth or polling
//! - **SecretStore**: keychain-style storage (`NotFound` is distinct from failure)
//! - **KnownHosts**: pins SSH host keys on first use
//! - **AuditLog**: records every signature attempt
//! - **Notifier**: the approval prompt and outcome notifications
//! - **TeamServer**: the hash chain relay
//!
//! ## Usage
//!
//! ```ignore
//! let silo = Silo::new(context, AgentConfig::from_env());
//! silo.handle(&request, &session, CommunicationMedium::Push).await?;
//!
//! // later, when the human decides
//! silo.resolve(&request, &session, Decision::Allow(ApprovalInterval::ThreeHours)).await?;
//! ```

pub mod audit;
pub mod clock;
pub mod config;
pub mod error;
pub mod identity;
pub mod known_hosts;
pub mod mock;
pub mod notify;
pub mod policy;
pub mod session;
pub mod silo;
pub mod store;
pub mod team;
pub mod transport;

pub use audit::{AuditEntry, AuditLog, MemoryAuditLog, SignatureLog};
pub use clock::{Clock, FixedClock, ManualClock, SystemClock};
pub use config::AgentConfig;
pub use error::{SiloError, SiloResult, TeamResult, TeamServiceError};
pub use identity::LocalIdentity;
pub use known_hosts::{HostAuthError, KnownHosts, MemoryKnownHosts};
pub use notify::{LoggingNotifier, Notifier, Outcome};
pub use policy::{ApprovalInterval, ApprovalState, Decision, PendingAuthorization, Policy};
pub use session::{MemorySessionRegistry, SessionRegistry};
pub use silo::{Silo, SiloContext};
pub use store::{MemorySecretStore, SecretStore, StoreError};
pub use team::{HttpTeamServer, PageCursor, TeamServer, TeamServerError, TeamService};
pub use transport::{CommunicationMedium, ResponseSender, TransportError};
