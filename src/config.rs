//! Gateway configuration.
//!
//! Settings come from an optional JSON file, then `TABLEGATE_*` environment variables,
//! then command-line flags; later layers win. Everything the server needs at startup is
//! validated here so a bad policy or credential table fails before the port is bound.

use std::collections::{BTreeMap, HashMap};
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::access::PathPattern;
use crate::error::{AppError, AppResult};

pub const DEFAULT_HTTP_PORT: u16 = 5000;
pub const DEFAULT_CHUNK_SIZE: usize = 100_000;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum VerifierMode {
    /// argon2 hashes from `credentials`
    #[default]
    #[serde(rename = "static")]
    Static,
    /// Accept any secret for a non-empty username. Development only.
    #[serde(rename = "none")]
    NoValidation,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GatewayConfig {
    pub bind_addr: String,
    pub http_port: u16,
    /// Rows per CSV chunk and per internal read batch.
    pub chunk_size: usize,
    /// Base for relative request paths; the working directory when unset.
    pub base_dir: Option<PathBuf>,
    pub verifier: VerifierMode,
    /// identity -> argon2 PHC string
    pub credentials: HashMap<String, String>,
    /// Optional gate in front of the verifier; identities outside it get 401.
    pub allowed_identities: Option<Vec<String>>,
    /// identity -> ordered path patterns
    pub policy: BTreeMap<String, Vec<String>>,
    /// Append-only JSON-lines audit file, in addition to the tracing audit target.
    pub audit_log: Option<PathBuf>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            http_port: DEFAULT_HTTP_PORT,
            chunk_size: DEFAULT_CHUNK_SIZE,
            base_dir: None,
            verifier: VerifierMode::Static,
            credentials: HashMap::new(),
            allowed_identities: None,
            policy: BTreeMap::new(),
            audit_log: None,
        }
    }
}

impl GatewayConfig {
    pub fn from_json_str(text: &str) -> AppResult<Self> {
        serde_json::from_str(text).map_err(|e| AppError::config("bad_config", format!("config parse: {}", e)))
    }

    pub fn load(path: &Path) -> AppResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| AppError::config("config_unreadable", format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&text)
    }

    pub fn apply(&mut self, ov: &ConfigOverrides) {
        if let Some(p) = ov.http_port { self.http_port = p; }
        if let Some(b) = &ov.bind_addr { self.bind_addr = b.clone(); }
        if let Some(c) = ov.chunk_size { self.chunk_size = c; }
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.chunk_size == 0 {
            return Err(AppError::config("bad_chunk_size", "chunk_size must be positive"));
        }
        self.socket_addr()?;
        for (identity, patterns) in &self.policy {
            if identity.trim().is_empty() {
                return Err(AppError::config("bad_policy", "policy contains an empty identity"));
            }
            for p in patterns {
                PathPattern::parse(p)
                    .map_err(|e| AppError::config("bad_policy_pattern", format!("{} for '{}': {}", p, identity, e)))?;
            }
        }
        if let Some(list) = &self.allowed_identities {
            if list.iter().any(|u| u.trim().is_empty()) {
                return Err(AppError::config("bad_allow_list", "allowed_identities contains an empty name"));
            }
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> AppResult<SocketAddr> {
        let ip: IpAddr = self
            .bind_addr
            .trim()
            .parse()
            .map_err(|_| AppError::config("bad_bind_addr", format!("not an IP address: {}", self.bind_addr)))?;
        Ok(SocketAddr::new(ip, self.http_port))
    }

    /// Absolute, symlink-resolved base directory for relative request paths.
    pub fn resolved_base_dir(&self) -> AppResult<PathBuf> {
        let dir = match &self.base_dir {
            Some(d) => d.clone(),
            None => std::env::current_dir().map_err(|e| AppError::config("bad_base_dir", e.to_string()))?,
        };
        std::fs::canonicalize(&dir).map_err(|e| AppError::config("bad_base_dir", format!("{}: {}", dir.display(), e)))
    }
}

/// Per-field overrides from the environment or the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub http_port: Option<u16>,
    pub bind_addr: Option<String>,
    pub chunk_size: Option<usize>,
}

impl ConfigOverrides {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            http_port: lookup("TABLEGATE_HTTP_PORT").and_then(|v| v.trim().parse().ok()),
            bind_addr: lookup("TABLEGATE_BIND").filter(|v| !v.trim().is_empty()),
            chunk_size: lookup("TABLEGATE_CHUNK_SIZE").and_then(|v| v.trim().parse().ok()),
        }
    }

    /// Values set in `higher` win.
    pub fn merge(self, higher: ConfigOverrides) -> Self {
        Self {
            http_port: higher.http_port.or(self.http_port),
            bind_addr: higher.bind_addr.or(self.bind_addr),
            chunk_size: higher.chunk_size.or(self.chunk_size),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
