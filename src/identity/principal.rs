use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Normalized caller identifier used as the policy-table key.
///
/// Construction lower-cases the raw name, so comparisons between two `Identity`
/// values are plain string equality while the raw input is compared case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Identity(String);

impl Identity {
    pub fn new(raw: &str) -> Self { Identity(raw.to_lowercase()) }

    pub fn as_str(&self) -> &str { &self.0 }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

impl From<String> for Identity {
    fn from(raw: String) -> Self { Identity::new(&raw) }
}

impl From<&str> for Identity {
    fn from(raw: &str) -> Self { Identity::new(raw) }
}

impl From<Identity> for String {
    fn from(id: Identity) -> Self { id.0 }
}

impl Display for Identity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { f.write_str(&self.0) }
}

/// Raw credentials as presented by the caller, before verification.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials").field("username", &self.username).field("secret", &"<redacted>").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_lower_cased() {
        let a = Identity::new("DDmitry@MyCompany.LocalDomain");
        let b = Identity::new("ddmitry@mycompany.localdomain");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "ddmitry@mycompany.localdomain");
    }

    #[test]
    fn identity_deserializes_normalized() {
        let id: Identity = serde_json::from_str("\"Alice\"").unwrap();
        assert_eq!(id.as_str(), "alice");
    }

    #[test]
    fn credentials_debug_hides_secret() {
        let c = Credentials { username: "alice".into(), secret: "hunter2".into() };
        let s = format!("{:?}", c);
        assert!(s.contains("alice"));
        assert!(!s.contains("hunter2"));
    }
}
