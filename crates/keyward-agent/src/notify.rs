//! Approval prompts and outcome notifications

use keyward_core::{Request, Session};
use tracing::info;

/// Terminal outcome of a signing request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Approved,
    Rejected,
    Errored(String),
}

/// The approval surface
///
/// `notify_outcome` is called exactly once per terminal outcome.
pub trait Notifier: Send + Sync {
    /// Ask the human to approve or reject `request`
    fn request_authorization(&self, session: &Session, request: &Request);

    fn notify_outcome(&self, session: &Session, request: &Request, outcome: &Outcome);
}

/// Notifier that only logs
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingNotifier;

impl Notifier for LoggingNotifier {
    fn request_authorization(&self, session: &Session, request: &Request) {
        info!(
            session_id = %session.id,
            request_id = %request.id,
            device = %session.pairing.name,
            "Approval requested"
        );
    }

    fn notify_outcome(&self, session: &Session, request: &Request, outcome: &Outcome) {
        info!(
            session_id = %session.id,
            request_id = %request.id,
            outcome = ?outcome,
            "Request finished"
        );
    }
}
