//! Signature audit log
//!
//! Every signing attempt, successful or not, is recorded for display.

use chrono::{DateTime, Utc};
use keyward_core::{CommitInfo, TagInfo};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Signature field value recorded for rejected git requests
pub const REJECTED_SIGNATURE: &str = "rejected";

/// Signature field value recorded for failed SSH requests
pub const FAILED_SIGNATURE: &str = "request failed";

/// What was (or was not) signed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureLog {
    Ssh {
        session_id: String,
        host: Option<String>,
        signature: String,
        display: String,
    },
    Commit {
        session_id: String,
        signature: String,
        commit_hash: String,
        commit: CommitInfo,
    },
    Tag {
        session_id: String,
        signature: String,
        tag: TagInfo,
    },
}

impl SignatureLog {
    pub fn session_id(&self) -> &str {
        match self {
            SignatureLog::Ssh { session_id, .. }
            | SignatureLog::Commit { session_id, .. }
            | SignatureLog::Tag { session_id, .. } => session_id,
        }
    }

    pub fn signature(&self) -> &str {
        match self {
            SignatureLog::Ssh { signature, .. }
            | SignatureLog::Commit { signature, .. }
            | SignatureLog::Tag { signature, .. } => signature,
        }
    }

    pub fn is_rejected(&self) -> bool {
        match self {
            SignatureLog::Ssh { signature, .. } => signature == FAILED_SIGNATURE,
            SignatureLog::Commit { signature, .. } | SignatureLog::Tag { signature, .. } => {
                signature == REJECTED_SIGNATURE
            }
        }
    }
}

/// A recorded log with its metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub recorded_at: DateTime<Utc>,
    pub device_name: String,
    pub log: SignatureLog,
}

pub trait AuditLog: Send + Sync {
    fn record(&self, log: SignatureLog, device_name: &str);
}

#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    entries: RwLock<Vec<AuditEntry>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all entries, oldest first
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.read().clone()
    }

    pub fn entries_for(&self, session_id: &str) -> Vec<AuditEntry> {
        self.entries
            .read()
            .iter()
            .filter(|e| e.log.session_id() == session_id)
            .cloned()
            .collect()
    }
}

impl AuditLog for MemoryAuditLog {
    fn record(&self, log: SignatureLog, device_name: &str) {
        self.entries.write().push(AuditEntry {
            id: Uuid::new_v4(),
            recorded_at: Utc::now(),
            device_name: device_name.to_string(),
            log,
        });
    }
}
