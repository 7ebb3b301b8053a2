use std::collections::{HashMap, HashSet};

use anyhow::{anyhow, Result};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use password_hash::{PasswordHash, SaltString};
use tracing::{debug, warn};

use super::principal::{Credentials, Identity};
use crate::error::{AppError, AppResult};

/// Narrow seam to whatever directory service backs the credentials.
/// The access engine never looks past this call.
pub trait IdentityVerifier: Send + Sync {
    fn verify(&self, identity: &Identity, secret: &str) -> bool;

    /// Short label used in startup logs.
    fn mode(&self) -> &'static str;
}

/// Resolve raw credentials to a normalized identity, or fail with an auth error.
pub fn authenticate(verifier: &dyn IdentityVerifier, creds: &Credentials) -> AppResult<Identity> {
    let identity = Identity::new(&creds.username);
    if identity.is_empty() {
        return Err(AppError::auth("invalid_credentials", "empty username"));
    }
    if verifier.verify(&identity, &creds.secret) {
        Ok(identity)
    } else {
        debug!(target: "tablegate::auth", user = %identity, "credential verification failed");
        Err(AppError::auth("invalid_credentials", "Unauthorized access"))
    }
}

pub fn hash_secret(secret: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let argon2 = Argon2::default();
    let phc = argon2.hash_password(secret.as_bytes(), &salt).map_err(|e| anyhow!(e.to_string()))?.to_string();
    Ok(phc)
}

fn decoy_hash() -> Result<String> {
    let mut seed = [0u8; 32];
    getrandom::getrandom(&mut seed).map_err(|e| anyhow!(e.to_string()))?;
    hash_secret(&STANDARD.encode(seed))
}

fn verify_phc(hash: &str, secret: &str) -> bool {
    if let Ok(parsed) = PasswordHash::new(hash) {
        Argon2::default().verify_password(secret.as_bytes(), &parsed).is_ok()
    } else { false }
}

/// Identity -> argon2 PHC hash table loaded from configuration.
pub struct StaticVerifier {
    hashes: HashMap<Identity, String>,
    /// Hash of a random secret nobody knows; unknown identities are checked against it
    /// so a miss costs the same argon2 work as a wrong password.
    decoy: String,
}

impl StaticVerifier {
    /// Every hash is parsed up front so a malformed entry fails startup rather than a login.
    pub fn new(table: &HashMap<String, String>) -> AppResult<Self> {
        let mut hashes = HashMap::with_capacity(table.len());
        for (user, phc) in table {
            if PasswordHash::new(phc).is_err() {
                return Err(AppError::config("bad_credential_hash", &format!("credential hash for '{}' is not a PHC string", user)));
            }
            if hashes.insert(Identity::new(user), phc.clone()).is_some() {
                return Err(AppError::config("duplicate_identity", &format!("credentials list '{}' twice (names are case-insensitive)", user)));
            }
        }
        let decoy = decoy_hash().map_err(|e| AppError::internal("decoy_hash", e.to_string()))?;
        Ok(Self { hashes, decoy })
    }
}

impl IdentityVerifier for StaticVerifier {
    fn verify(&self, identity: &Identity, secret: &str) -> bool {
        match self.hashes.get(identity) {
            Some(phc) => verify_phc(phc, secret),
            None => {
                let _ = verify_phc(&self.decoy, secret);
                false
            }
        }
    }

    fn mode(&self) -> &'static str { "static" }
}

impl IdentityVerifier for Box<dyn IdentityVerifier> {
    fn verify(&self, identity: &Identity, secret: &str) -> bool { (**self).verify(identity, secret) }

    fn mode(&self) -> &'static str { (**self).mode() }
}

/// Development bypass: every credential pair is accepted.
pub struct NoValidationVerifier;

impl IdentityVerifier for NoValidationVerifier {
    fn verify(&self, identity: &Identity, _secret: &str) -> bool {
        warn!(target: "tablegate::auth", user = %identity, "no-validation mode: credentials accepted without verification");
        true
    }

    fn mode(&self) -> &'static str { "none" }
}

/// Extra gate in front of another verifier: only listed identities may authenticate.
pub struct AllowListVerifier<V> {
    inner: V,
    allowed: HashSet<Identity>,
}

impl<V: IdentityVerifier> AllowListVerifier<V> {
    pub fn new(inner: V, allowed: &[String]) -> Self {
        Self { inner, allowed: allowed.iter().map(|s| Identity::new(s)).collect() }
    }
}

impl<V: IdentityVerifier> IdentityVerifier for AllowListVerifier<V> {
    fn verify(&self, identity: &Identity, secret: &str) -> bool {
        if !self.inner.verify(identity, secret) { return false; }
        if self.allowed.contains(identity) { return true; }
        debug!(target: "tablegate::auth", user = %identity, "identity not in allow-list");
        false
    }

    fn mode(&self) -> &'static str { self.inner.mode() }
}

#[cfg(test)]
#[path = "verifier_tests.rs"]
mod verifier_tests;
