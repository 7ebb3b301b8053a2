//! Access control engine: identity-normalized, path-canonicalizing pattern authorization.
//!
//! `authorize` normalizes the identity, canonicalizes the requested path, and tests the
//! canonical path against the identity's patterns in order. Unknown identities are denied
//! without evaluating any pattern. Every call leaves exactly one audit record.

mod audit;
mod canonical;
mod pattern;
mod policy;

pub use audit::{AuditRecord, AuditSink, FanoutAudit, FileAudit, MemoryAudit, TracingAudit, Verdict};
pub use canonical::canonicalize;
pub use pattern::{PathPattern, PatternError};
pub use policy::AccessPolicy;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use crate::identity::Identity;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessDecision {
    pub allowed: bool,
    /// The path any subsequent read must use. None when the request could not be resolved.
    pub canonical: Option<PathBuf>,
    pub matched: Option<String>,
}

#[derive(Clone)]
pub struct AccessControl {
    policy: Arc<AccessPolicy>,
    audit: Arc<dyn AuditSink>,
    base_dir: PathBuf,
}

impl AccessControl {
    pub fn new(policy: Arc<AccessPolicy>, audit: Arc<dyn AuditSink>, base_dir: PathBuf) -> Self {
        Self { policy, audit, base_dir }
    }

    pub fn policy(&self) -> &AccessPolicy { &self.policy }

    pub fn authorize(&self, identity: &str, requested: &str) -> bool {
        self.evaluate(&Identity::new(identity), requested).allowed
    }

    pub fn evaluate(&self, identity: &Identity, requested: &str) -> AccessDecision {
        let (decision, detail) = self.decide(identity, requested);
        self.audit.record(&AuditRecord {
            at: Utc::now(),
            identity: identity.to_string(),
            requested: requested.to_string(),
            canonical: decision.canonical.as_ref().map(|p| p.display().to_string()),
            verdict: if decision.allowed { Verdict::Allow } else { Verdict::Deny },
            detail,
        });
        decision
    }

    fn decide(&self, identity: &Identity, requested: &str) -> (AccessDecision, String) {
        let canonical = match canonicalize(requested, &self.base_dir) {
            Ok(p) => p,
            Err(e) => {
                debug!(target: "tablegate::access", user = %identity, requested, "unresolvable path: {}", e);
                return (AccessDecision { allowed: false, canonical: None, matched: None }, e.to_string());
            }
        };
        let Some(patterns) = self.policy.patterns_for(identity) else {
            return (
                AccessDecision { allowed: false, canonical: Some(canonical), matched: None },
                "identity has no policy entry".to_string(),
            );
        };
        match patterns.iter().find(|p| p.matches_path(&canonical)) {
            Some(p) => {
                let matched = p.as_str().to_string();
                (AccessDecision { allowed: true, canonical: Some(canonical), matched: Some(matched.clone()) }, matched)
            }
            None => (
                AccessDecision { allowed: false, canonical: Some(canonical), matched: None },
                format!("no pattern matched ({} checked)", patterns.len()),
            ),
        }
    }
}
