use std::collections::{BTreeMap, HashMap};

use crate::error::{AppError, AppResult};
use crate::identity::Identity;

use super::pattern::PathPattern;

/// Immutable identity -> ordered pattern list table.
///
/// Built once at startup from configuration. Keys are normalized identities; an
/// identity without an entry (or with an empty list) has no permissions.
#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    table: HashMap<Identity, Vec<PathPattern>>,
}

impl AccessPolicy {
    /// Compile every pattern up front. Syntax errors and identities that collide after
    /// normalization are configuration errors.
    pub fn from_table(raw: &BTreeMap<String, Vec<String>>) -> AppResult<Self> {
        let mut table: HashMap<Identity, Vec<PathPattern>> = HashMap::with_capacity(raw.len());
        for (user, patterns) in raw {
            let id = Identity::new(user);
            if id.is_empty() {
                return Err(AppError::config("bad_policy", "policy contains an empty identity"));
            }
            let mut compiled = Vec::with_capacity(patterns.len());
            for p in patterns {
                let pat = PathPattern::parse(p)
                    .map_err(|e| AppError::config("bad_policy_pattern", format!("policy for '{}': {}", user, e)))?;
                compiled.push(pat);
            }
            if table.insert(id, compiled).is_some() {
                return Err(AppError::config("duplicate_identity", format!("policy lists '{}' more than once (names are case-insensitive)", user)));
            }
        }
        Ok(Self { table })
    }

    pub fn patterns_for(&self, identity: &Identity) -> Option<&[PathPattern]> {
        self.table.get(identity).map(|v| v.as_slice())
    }

    pub fn identity_count(&self) -> usize { self.table.len() }
}
