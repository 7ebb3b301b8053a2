//! Append-only audit trail of access decisions.
//!
//! Every call to the access engine produces exactly one [`AuditRecord`], allowed or
//! denied. Sinks must tolerate concurrent appends from in-flight requests.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Allow,
    Deny,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub at: DateTime<Utc>,
    pub identity: String,
    pub requested: String,
    /// None when the requested path could not be canonicalized.
    pub canonical: Option<String>,
    pub verdict: Verdict,
    /// Pattern that granted access, or the reason for denial.
    pub detail: String,
}

pub trait AuditSink: Send + Sync {
    fn record(&self, entry: &AuditRecord);
}

/// Emits each decision as a structured tracing event.
pub struct TracingAudit;

impl AuditSink for TracingAudit {
    fn record(&self, entry: &AuditRecord) {
        info!(
            target: "tablegate::audit",
            identity = %entry.identity,
            requested = %entry.requested,
            canonical = entry.canonical.as_deref().unwrap_or("<unresolved>"),
            verdict = ?entry.verdict,
            detail = %entry.detail,
            "access decision"
        );
    }
}

/// JSON-lines file, opened in append mode. Writes are serialized under a mutex so
/// concurrent records never interleave.
pub struct FileAudit {
    file: Mutex<File>,
}

impl FileAudit {
    pub fn open(path: &Path) -> std::io::Result<Self> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() { std::fs::create_dir_all(dir)?; }
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { file: Mutex::new(file) })
    }
}

impl AuditSink for FileAudit {
    fn record(&self, entry: &AuditRecord) {
        let mut line = match serde_json::to_vec(entry) {
            Ok(v) => v,
            Err(e) => { error!(target: "tablegate::audit", "audit serialize failed: {e}"); return; }
        };
        line.push(b'\n');
        let mut f = self.file.lock();
        if let Err(e) = f.write_all(&line) {
            error!(target: "tablegate::audit", "audit append failed: {e}");
        }
    }
}

/// In-process buffer of records.
#[derive(Default)]
pub struct MemoryAudit {
    entries: Mutex<Vec<AuditRecord>>,
}

impl MemoryAudit {
    pub fn new() -> Self { Self::default() }

    pub fn entries(&self) -> Vec<AuditRecord> { self.entries.lock().clone() }

    pub fn len(&self) -> usize { self.entries.lock().len() }

    pub fn is_empty(&self) -> bool { self.entries.lock().is_empty() }
}

impl AuditSink for MemoryAudit {
    fn record(&self, entry: &AuditRecord) { self.entries.lock().push(entry.clone()); }
}

/// Forwards every record to each inner sink in order.
pub struct FanoutAudit {
    sinks: Vec<Arc<dyn AuditSink>>,
}

impl FanoutAudit {
    pub fn new(sinks: Vec<Arc<dyn AuditSink>>) -> Self { Self { sinks } }
}

impl AuditSink for FanoutAudit {
    fn record(&self, entry: &AuditRecord) {
        for s in &self.sinks { s.record(entry); }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(identity: &str, verdict: Verdict) -> AuditRecord {
        AuditRecord {
            at: Utc::now(),
            identity: identity.into(),
            requested: "/data/x.parquet".into(),
            canonical: Some("/data/x.parquet".into()),
            verdict,
            detail: "test".into(),
        }
    }

    #[test]
    fn file_audit_appends_json_lines_from_many_threads() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("logs/audit.jsonl");
        let sink = Arc::new(FileAudit::open(&path).unwrap());
        let mut handles = Vec::new();
        for t in 0..8 {
            let sink = sink.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..25 { sink.record(&sample(&format!("user{}", t), Verdict::Allow)); }
            }));
        }
        for h in handles { h.join().unwrap(); }
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 200);
        for l in lines {
            let rec: AuditRecord = serde_json::from_str(l).unwrap();
            assert_eq!(rec.verdict, Verdict::Allow);
        }
    }

    #[test]
    fn file_audit_appends_across_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("audit.jsonl");
        FileAudit::open(&path).unwrap().record(&sample("a", Verdict::Deny));
        FileAudit::open(&path).unwrap().record(&sample("b", Verdict::Allow));
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.contains("\"verdict\":\"deny\""));
    }

    #[test]
    fn fanout_reaches_every_sink() {
        let a = Arc::new(MemoryAudit::new());
        let b = Arc::new(MemoryAudit::new());
        let sinks: Vec<Arc<dyn AuditSink>> = vec![a.clone(), b.clone(), Arc::new(TracingAudit)];
        let fan = FanoutAudit::new(sinks);
        fan.record(&sample("alice", Verdict::Deny));
        assert_eq!(a.len(), 1);
        assert_eq!(b.entries()[0].identity, "alice");
    }
}
