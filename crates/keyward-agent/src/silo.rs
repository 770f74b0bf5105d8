//! Request admission
//!
//! The Silo is the single point that turns a `(Request, Session)` pair into
//! at most one `Response`. It is the only caller of the signing backend for
//! user-facing signatures.
//!
//! ## Handling a request
//!
//! 1. The session must still be paired
//! 2. An unpair request removes the session and stops
//! 3. The request timestamp must be within the tolerance window
//! 4. A cached response for the same `CacheKey` is resent as-is
//! 5. Sign and git-sign requests without an open approval window are parked
//!    for a human decision
//! 6. Requests with nothing to answer stop here
//! 7. Otherwise the response is computed, cached, and sent
//!
//! Everything from step 1 to the send runs under one async lock, so two
//! deliveries of the same request can never both sign.

use keyward_core::{
    armor_signature, encoding::to_base64, AckResponse, CacheKey, GitInfo, GitSignRequest,
    GitSignResponse, Me, MeResponse, Request, Response, Session, SignRequest, SignResponse,
};
use moka::future::Cache;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::audit::{AuditLog, SignatureLog, FAILED_SIGNATURE, REJECTED_SIGNATURE};
use crate::clock::Clock;
use crate::config::AgentConfig;
use crate::error::{SiloError, SiloResult};
use crate::identity::LocalIdentity;
use crate::known_hosts::KnownHosts;
use crate::notify::{Notifier, Outcome};
use crate::policy::{Decision, Policy};
use crate::session::SessionRegistry;
use crate::store::{SecretStore, StoreError, SNS_ENDPOINT_ARN_KEY};
use crate::transport::{CommunicationMedium, ResponseSender};

/// Error string for a request the human rejected
pub const REJECTED: &str = "rejected";

/// Collaborators the Silo works with
#[derive(Clone)]
pub struct SiloContext {
    pub sessions: Arc<dyn SessionRegistry>,
    pub sender: Arc<dyn ResponseSender>,
    pub policy: Arc<Policy>,
    pub identity: Arc<LocalIdentity>,
    pub known_hosts: Arc<dyn KnownHosts>,
    pub audit: Arc<dyn AuditLog>,
    pub notifier: Arc<dyn Notifier>,
    pub secrets: Arc<dyn SecretStore>,
    pub clock: Arc<dyn Clock>,
}

/// Response cache and pending markers, both keyed by `CacheKey`
struct SiloCaches {
    responses: Cache<String, Arc<Vec<u8>>>,
    pending: Cache<String, ()>,
}

impl SiloCaches {
    fn new(config: &AgentConfig) -> Self {
        Self {
            responses: Cache::builder().time_to_live(config.cache_ttl()).build(),
            pending: Cache::builder().time_to_live(config.cache_ttl()).build(),
        }
    }

    async fn purge_expired(&self) {
        self.responses.run_pending_tasks().await;
        self.pending.run_pending_tasks().await;
    }
}

pub struct Silo {
    ctx: SiloContext,
    config: AgentConfig,
    caches: Mutex<SiloCaches>,
}

impl Silo {
    pub fn new(ctx: SiloContext, config: AgentConfig) -> Self {
        let caches = Mutex::new(SiloCaches::new(&config));
        Self {
            ctx,
            config,
            caches,
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Admit a request and send its response, if it has one
    pub async fn handle(
        &self,
        request: &Request,
        session: &Session,
        medium: CommunicationMedium,
    ) -> SiloResult<()> {
        let caches = self.caches.lock().await;

        if self.ctx.sessions.get(&session.id).is_none() {
            return Err(SiloError::SessionRemoved);
        }

        if request.unpair.is_some() {
            info!(session_id = %session.id, medium = %medium, "Unpair requested");
            self.ctx.sessions.remove(&session.id);
            self.ctx.policy.revoke(session);
            return Err(SiloError::SessionRemoved);
        }

        let now = self.ctx.clock.now_secs();
        let tolerance = self.config.request_time_tolerance.as_secs();
        if now.abs_diff(request.unix_seconds) > tolerance {
            warn!(
                session_id = %session.id,
                request_id = %request.id,
                request_seconds = request.unix_seconds,
                now = now,
                "Request outside time window"
            );
            return Err(SiloError::InvalidRequestTime {
                request_seconds: request.unix_seconds,
                now,
            });
        }

        caches.purge_expired().await;
        let key = CacheKey::new(session, request);
        if let Some(cached) = caches.responses.get(key.as_str()).await {
            debug!(session_id = %session.id, request_id = %request.id, "Resending cached response");
            let response = Response::from_bytes(&cached)?;
            self.ctx.sender.send(session, &response).await?;
            return Ok(());
        }

        let needs_approval = (request.sign.is_some() || request.git_sign.is_some())
            && self.ctx.policy.needs_user_approval(session);
        if needs_approval {
            return self
                .handle_requires_approval(&caches, &key, request, session, medium)
                .await;
        }

        if request.is_noop() {
            return Ok(());
        }

        let response = match self.response_for(&caches, &key, request, session, true).await {
            Ok(response) => response,
            Err(err) => {
                self.notify_failure(session, request, &err);
                return Err(err);
            }
        };
        if response.sign.is_some() || response.git_sign.is_some() {
            info!(
                session_id = %session.id,
                request_id = %request.id,
                medium = %medium,
                "Automatic approval"
            );
        }
        self.notify_outcome(session, request, &response);
        self.ctx.sender.send(session, &response).await?;
        Ok(())
    }

    /// Deliver the human's decision for a parked request
    pub async fn resolve(
        &self,
        request: &Request,
        session: &Session,
        decision: Decision,
    ) -> SiloResult<()> {
        let caches = self.caches.lock().await;

        if self.ctx.sessions.get(&session.id).is_none() {
            return Err(SiloError::SessionRemoved);
        }

        let key = CacheKey::new(session, request);
        let response = match caches.responses.get(key.as_str()).await {
            Some(cached) => Response::from_bytes(&cached)?,
            None => {
                if let Decision::Allow(interval) = decision {
                    self.ctx.policy.allow(session, interval);
                }

                let computed = self
                    .response_for(&caches, &key, request, session, decision.is_allow())
                    .await;
                caches.pending.invalidate(key.as_str()).await;
                self.ctx.policy.remove_pending_authorization(session, request);

                let response = match computed {
                    Ok(response) => response,
                    Err(err) => {
                        self.notify_failure(session, request, &err);
                        return Err(err);
                    }
                };
                info!(
                    session_id = %session.id,
                    request_id = %request.id,
                    decision = ?decision,
                    "Resolved pending request"
                );
                self.notify_outcome(session, request, &response);
                response
            }
        };

        self.ctx.sender.send(session, &response).await?;
        Ok(())
    }

    /// The cached response for a request, if any
    pub async fn cached_response(&self, session: &Session, request: &Request) -> Option<Response> {
        let caches = self.caches.lock().await;
        let cached = caches
            .responses
            .get(CacheKey::new(session, request).as_str())
            .await?;
        Response::from_bytes(&cached).ok()
    }

    async fn handle_requires_approval(
        &self,
        caches: &SiloCaches,
        key: &CacheKey,
        request: &Request,
        session: &Session,
        medium: CommunicationMedium,
    ) -> SiloResult<()> {
        if caches.pending.get(key.as_str()).await.is_some() {
            return Err(SiloError::RequestPending);
        }
        caches.pending.insert(key.to_string(), ()).await;

        self.ctx.policy.add_pending_authorization(session, request);
        self.ctx.policy.request_user_authorization(session, request);

        if request.send_ack {
            let mut ack = self.base_response(request, session);
            ack.ack = Some(AckResponse::default());
            if let Err(err) = self.ctx.sender.send(session, &ack).await {
                warn!(session_id = %session.id, request_id = %request.id, error = %err, "Ack send failed");
            }
        }

        info!(
            session_id = %session.id,
            request_id = %request.id,
            medium = %medium,
            "Request requires approval"
        );
        Ok(())
    }

    fn sns_endpoint_arn(&self) -> String {
        match self.ctx.secrets.get_string(SNS_ENDPOINT_ARN_KEY) {
            Ok(arn) => arn,
            Err(StoreError::NotFound(_)) => String::new(),
            Err(err) => {
                warn!(error = %err, "Endpoint lookup failed");
                String::new()
            }
        }
    }

    fn base_response(&self, request: &Request, session: &Session) -> Response {
        Response::new(request.id.clone(), self.sns_endpoint_arn())
            .with_approved_until(self.ctx.policy.approved_until(session))
            .with_tracking_id(self.config.tracking_id.clone())
    }

    /// Compute and cache the response. Caller holds the Silo lock.
    async fn response_for(
        &self,
        caches: &SiloCaches,
        key: &CacheKey,
        request: &Request,
        session: &Session,
        signature_allowed: bool,
    ) -> SiloResult<Response> {
        let started = Instant::now();

        let sign = match &request.sign {
            Some(sign) => {
                if self.ctx.identity.ssh_fingerprint()? != sign.fingerprint {
                    warn!(session_id = %session.id, request_id = %request.id, "Key fingerprint mismatch");
                    return Err(SiloError::KeyMismatch);
                }
                Some(self.sign_response(sign, session, signature_allowed))
            }
            None => None,
        };

        let git_sign = request
            .git_sign
            .as_ref()
            .map(|git| self.git_sign_response(git, session, signature_allowed));

        let me = match &request.me {
            Some(me) => {
                let pgp_public_key = match &me.pgp_user_id {
                    Some(user_id) => Some(self.ctx.identity.pgp_public_key_for(user_id)?),
                    None => None,
                };
                Some(MeResponse {
                    me: Me {
                        email: self.ctx.identity.email().to_string(),
                        public_key_wire: self.ctx.identity.ssh_wire()?,
                        pgp_public_key,
                    },
                })
            }
            None => None,
        };

        let mut response = self.base_response(request, session);
        response.sign = sign;
        response.git_sign = git_sign;
        response.me = me;

        let encoded = response.to_bytes()?;
        caches
            .responses
            .insert(key.to_string(), Arc::new(encoded))
            .await;

        debug!(
            session_id = %session.id,
            request_id = %request.id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Response computed"
        );
        Ok(response)
    }

    fn sign_response(&self, sign: &SignRequest, session: &Session, allowed: bool) -> SignResponse {
        let host = sign
            .host_auth
            .as_ref()
            .and_then(|auth| auth.host_names.first().cloned());
        let device = &session.pairing.name;

        let failed = |display: String| SignatureLog::Ssh {
            session_id: session.id.clone(),
            host: host.clone(),
            signature: FAILED_SIGNATURE.to_string(),
            display,
        };

        if !allowed {
            self.ctx
                .audit
                .record(failed(format!("rejected: {}", sign.display())), device);
            return SignResponse::failed(REJECTED);
        }

        if let Some(auth) = &sign.host_auth {
            if let Err(err) = self.ctx.known_hosts.check_or_add(auth) {
                self.ctx.audit.record(failed(format!("rejected: {}", err)), device);
                return SignResponse::failed(err.to_string());
            }
        }

        match self.ctx.identity.sign_ssh(&sign.data) {
            Ok(signature) => {
                self.ctx.audit.record(
                    SignatureLog::Ssh {
                        session_id: session.id.clone(),
                        host: host.clone(),
                        signature: to_base64(&signature),
                        display: sign.display(),
                    },
                    device,
                );
                SignResponse::signed(signature)
            }
            Err(err) => {
                warn!(session_id = %session.id, error = %err, "SSH signature failed");
                self.ctx.audit.record(failed(format!("error: {}", err)), device);
                SignResponse::failed(err.to_string())
            }
        }
    }

    fn git_sign_response(
        &self,
        git: &GitSignRequest,
        session: &Session,
        allowed: bool,
    ) -> GitSignResponse {
        let device = &session.pairing.name;

        if !allowed {
            let log = match &git.git {
                GitInfo::Commit(commit) => SignatureLog::Commit {
                    session_id: session.id.clone(),
                    signature: REJECTED_SIGNATURE.to_string(),
                    commit_hash: String::new(),
                    commit: commit.clone(),
                },
                GitInfo::Tag(tag) => SignatureLog::Tag {
                    session_id: session.id.clone(),
                    signature: REJECTED_SIGNATURE.to_string(),
                    tag: tag.clone(),
                },
            };
            self.ctx.audit.record(log, device);
            return GitSignResponse::failed(REJECTED);
        }

        self.ctx.identity.record_pgp_user_id(&git.user_id);

        let signature = match self.ctx.identity.sign_git(&git.git.signed_payload()) {
            Ok(signature) => signature,
            Err(err) => {
                warn!(session_id = %session.id, error = %err, "Git signature failed");
                return GitSignResponse::failed(err.to_string());
            }
        };

        let armored = armor_signature(&signature, None);
        let log = match &git.git {
            GitInfo::Commit(commit) => SignatureLog::Commit {
                session_id: session.id.clone(),
                signature: to_base64(&signature),
                commit_hash: hex::encode(commit.commit_hash(&armored)),
                commit: commit.clone(),
            },
            GitInfo::Tag(tag) => SignatureLog::Tag {
                session_id: session.id.clone(),
                signature: to_base64(&signature),
                tag: tag.clone(),
            },
        };
        self.ctx.audit.record(log, device);
        GitSignResponse::signed(signature)
    }

    fn notify_outcome(&self, session: &Session, request: &Request, response: &Response) {
        if response.sign.is_none() && response.git_sign.is_none() {
            return;
        }
        let outcome = match response.error() {
            None => Outcome::Approved,
            Some(REJECTED) => Outcome::Rejected,
            Some(err) => Outcome::Errored(err.to_string()),
        };
        self.ctx.notifier.notify_outcome(session, request, &outcome);
    }

    fn notify_failure(&self, session: &Session, request: &Request, err: &SiloError) {
        if request.sign.is_some() || request.git_sign.is_some() {
            self.ctx
                .notifier
                .notify_outcome(session, request, &Outcome::Errored(err.to_string()));
        }
    }
}
