//! Caller identity: normalization, credential extraction and verification.
//! Keep the public surface thin and split implementation across sub-modules.

mod principal;
mod basic;
mod verifier;

pub use principal::{Identity, Credentials};
pub use basic::parse_basic_auth;
pub use verifier::{IdentityVerifier, StaticVerifier, NoValidationVerifier, AllowListVerifier, authenticate, hash_secret};
