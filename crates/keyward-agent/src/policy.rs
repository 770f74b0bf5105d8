//! Approval policy
//!
//! Decides whether a session's requests may be signed without asking the
//! human, and tracks requests that are waiting on a decision.
//!
//! Per session the state moves NoApproval -> Pending -> Approved | NoApproval.
//! An approval window is a single expiry timestamp persisted in the secret
//! store; granting a window overwrites the previous one, and a window that
//! has passed decays back to NoApproval without any explicit transition.

use keyward_core::{CacheKey, Request, Session};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::AgentConfig;
use crate::notify::Notifier;
use crate::store::{SecretStore, StoreError};

/// Length of the "allow for three hours" window
pub const THREE_HOURS_SECS: i64 = 3 * 60 * 60;

const APPROVED_UNTIL_PREFIX: &str = "approved_until";

/// Durations the human can approve for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalInterval {
    /// This request only; no window is opened
    Once,
    ThreeHours,
}

impl ApprovalInterval {
    pub fn seconds(&self) -> Option<i64> {
        match self {
            ApprovalInterval::Once => None,
            ApprovalInterval::ThreeHours => Some(THREE_HOURS_SECS),
        }
    }
}

/// The human's answer to an approval prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow(ApprovalInterval),
    Reject,
}

impl Decision {
    pub fn is_allow(&self) -> bool {
        matches!(self, Decision::Allow(_))
    }
}

/// Per-session approval state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalState {
    NoApproval,
    Pending,
    Approved { until: i64 },
}

/// A request waiting on the human
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAuthorization {
    pub session: Session,
    pub request: Request,
}

struct PendingEntry {
    authorization: PendingAuthorization,
    added: Instant,
}

pub struct Policy {
    store: Arc<dyn SecretStore>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    pending: RwLock<HashMap<CacheKey, PendingEntry>>,
    pending_ttl: Duration,
}

impl Policy {
    pub fn new(store: Arc<dyn SecretStore>, notifier: Arc<dyn Notifier>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            notifier,
            clock,
            pending: RwLock::new(HashMap::new()),
            pending_ttl: AgentConfig::default().cache_ttl(),
        }
    }

    /// Lifetime of a pending authorization; match the Silo's marker lifetime
    pub fn with_pending_ttl(mut self, ttl: Duration) -> Self {
        self.pending_ttl = ttl;
        self
    }

    fn approved_until_key(session: &Session) -> String {
        format!("{}.{}", APPROVED_UNTIL_PREFIX, session.id)
    }

    /// Stored window expiry, whether or not it has passed.
    ///
    /// Store failures other than `NotFound` read as "no window".
    fn stored_window(&self, session: &Session) -> Option<i64> {
        match self.store.get_string(&Self::approved_until_key(session)) {
            Ok(value) => match value.parse() {
                Ok(until) => Some(until),
                Err(_) => {
                    warn!(session_id = %session.id, "Unreadable approval window");
                    None
                }
            },
            Err(StoreError::NotFound(_)) => None,
            Err(err) => {
                warn!(session_id = %session.id, error = %err, "Approval window lookup failed");
                None
            }
        }
    }

    /// Window expiry, only while it is still in the future
    pub fn approved_until(&self, session: &Session) -> Option<i64> {
        self.stored_window(session)
            .filter(|until| *until > self.clock.now_secs())
    }

    /// True unless an approval window is open for the session
    pub fn needs_user_approval(&self, session: &Session) -> bool {
        self.approved_until(session).is_none()
    }

    /// Open (or replace) the session's approval window
    pub fn allow(&self, session: &Session, interval: ApprovalInterval) {
        let Some(seconds) = interval.seconds() else {
            debug!(session_id = %session.id, "One-off approval opens no window");
            return;
        };

        let until = self.clock.now_secs() + seconds;
        match self
            .store
            .set(&Self::approved_until_key(session), until.to_string().as_bytes())
        {
            Ok(()) => info!(session_id = %session.id, approved_until = until, "Approval window opened"),
            Err(err) => warn!(session_id = %session.id, error = %err, "Failed to persist approval window"),
        }
    }

    /// Close the session's approval window
    pub fn revoke(&self, session: &Session) {
        if let Err(err) = self.store.delete(&Self::approved_until_key(session)) {
            warn!(session_id = %session.id, error = %err, "Failed to clear approval window");
        }
    }

    pub fn add_pending_authorization(&self, session: &Session, request: &Request) {
        let mut pending = self.pending.write();
        self.prune(&mut pending);
        pending.insert(
            CacheKey::new(session, request),
            PendingEntry {
                authorization: PendingAuthorization {
                    session: session.clone(),
                    request: request.clone(),
                },
                added: Instant::now(),
            },
        );
    }

    pub fn remove_pending_authorization(&self, session: &Session, request: &Request) {
        self.pending.write().remove(&CacheKey::new(session, request));
    }

    /// Drop authorizations whose pending marker has expired
    fn prune(&self, pending: &mut HashMap<CacheKey, PendingEntry>) {
        let before = pending.len();
        pending.retain(|_, entry| entry.added.elapsed() < self.pending_ttl);
        if pending.len() < before {
            debug!(expired = before - pending.len(), "Expired pending authorizations");
        }
    }

    /// Snapshot of requests awaiting a decision
    pub fn pending_authorizations(&self) -> Vec<PendingAuthorization> {
        let mut pending = self.pending.write();
        self.prune(&mut pending);
        pending.values().map(|e| e.authorization.clone()).collect()
    }

    /// Prompt the human for a decision
    pub fn request_user_authorization(&self, session: &Session, request: &Request) {
        self.notifier.request_authorization(session, request);
    }

    pub fn approval_state(&self, session: &Session) -> ApprovalState {
        if let Some(until) = self.approved_until(session) {
            return ApprovalState::Approved { until };
        }
        let pending = {
            let mut pending = self.pending.write();
            self.prune(&mut pending);
            pending
                .values()
                .any(|e| e.authorization.session.id == session.id)
        };
        if pending {
            ApprovalState::Pending
        } else {
            ApprovalState::NoApproval
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::mock::{FailingSecretStore, RecordingNotifier};
    use crate::notify::LoggingNotifier;
    use crate::store::MemorySecretStore;
    use keyward_core::Pairing;

    fn session(id: &str) -> Session {
        Session::new(
            id,
            Pairing {
                workstation_public_key: vec![0; 32],
                name: "laptop".into(),
            },
        )
    }

    fn policy(clock: Arc<ManualClock>) -> Policy {
        Policy::new(
            Arc::new(MemorySecretStore::new()),
            Arc::new(LoggingNotifier),
            clock,
        )
    }

    #[test]
    fn test_needs_approval_by_default() {
        let policy = policy(Arc::new(ManualClock::new(1_000)));
        assert!(policy.needs_user_approval(&session("s1")));
        assert_eq!(policy.approval_state(&session("s1")), ApprovalState::NoApproval);
    }

    #[test]
    fn test_window_decays() {
        let clock = Arc::new(ManualClock::new(1_000));
        let policy = policy(clock.clone());
        let s = session("s1");

        policy.allow(&s, ApprovalInterval::ThreeHours);
        assert!(!policy.needs_user_approval(&s));
        assert_eq!(policy.approved_until(&s), Some(1_000 + THREE_HOURS_SECS));
        assert_eq!(
            policy.approval_state(&s),
            ApprovalState::Approved { until: 1_000 + THREE_HOURS_SECS }
        );

        clock.advance(THREE_HOURS_SECS);
        assert!(policy.needs_user_approval(&s));
        assert_eq!(policy.approved_until(&s), None);
        assert_eq!(policy.approval_state(&s), ApprovalState::NoApproval);
    }

    #[test]
    fn test_windows_overwrite_not_sum() {
        let clock = Arc::new(ManualClock::new(1_000));
        let policy = policy(clock.clone());
        let s = session("s1");

        policy.allow(&s, ApprovalInterval::ThreeHours);
        clock.advance(100);
        policy.allow(&s, ApprovalInterval::ThreeHours);
        assert_eq!(policy.approved_until(&s), Some(1_100 + THREE_HOURS_SECS));
    }

    #[test]
    fn test_once_opens_no_window() {
        let policy = policy(Arc::new(ManualClock::new(1_000)));
        let s = session("s1");
        policy.allow(&s, ApprovalInterval::Once);
        assert!(policy.needs_user_approval(&s));
    }

    #[test]
    fn test_sessions_are_independent() {
        let policy = policy(Arc::new(ManualClock::new(1_000)));
        policy.allow(&session("a"), ApprovalInterval::ThreeHours);
        assert!(!policy.needs_user_approval(&session("a")));
        assert!(policy.needs_user_approval(&session("b")));
    }

    #[test]
    fn test_revoke_closes_window() {
        let policy = policy(Arc::new(ManualClock::new(1_000)));
        let s = session("s1");
        policy.allow(&s, ApprovalInterval::ThreeHours);
        policy.revoke(&s);
        assert!(policy.needs_user_approval(&s));
    }

    #[test]
    fn test_pending_state() {
        let notifier = Arc::new(RecordingNotifier::new());
        let policy = Policy::new(
            Arc::new(MemorySecretStore::new()),
            notifier.clone(),
            Arc::new(ManualClock::new(1_000)),
        );
        let s = session("s1");
        let request = Request::new("r1", 1_000);

        policy.add_pending_authorization(&s, &request);
        policy.request_user_authorization(&s, &request);
        assert_eq!(policy.approval_state(&s), ApprovalState::Pending);
        assert_eq!(policy.pending_authorizations().len(), 1);
        assert_eq!(notifier.authorization_requests(), vec!["r1".to_string()]);

        policy.remove_pending_authorization(&s, &request);
        assert_eq!(policy.approval_state(&s), ApprovalState::NoApproval);
    }

    #[test]
    fn test_pending_expires_with_marker() {
        let policy = policy(Arc::new(ManualClock::new(1_000)))
            .with_pending_ttl(Duration::from_millis(50));
        let s = session("s1");

        for i in 0..5 {
            policy.add_pending_authorization(&s, &Request::new(format!("r{}", i), 1_000));
        }
        assert_eq!(policy.pending_authorizations().len(), 5);
        assert_eq!(policy.approval_state(&s), ApprovalState::Pending);

        std::thread::sleep(Duration::from_millis(80));
        assert!(policy.pending_authorizations().is_empty());
        assert_eq!(policy.approval_state(&s), ApprovalState::NoApproval);
    }

    #[test]
    fn test_store_failure_fails_closed() {
        let policy = Policy::new(
            Arc::new(FailingSecretStore),
            Arc::new(LoggingNotifier),
            Arc::new(ManualClock::new(1_000)),
        );
        let s = session("s1");
        policy.allow(&s, ApprovalInterval::ThreeHours);
        assert!(policy.needs_user_approval(&s));
    }
}
