use axum::http::HeaderMap;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use super::principal::Credentials;

/// Extract HTTP Basic credentials from the Authorization header.
/// Any missing, non-Basic or undecodable header yields None.
pub fn parse_basic_auth(headers: &HeaderMap) -> Option<Credentials> {
    let raw = headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, payload) = raw.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") { return None; }
    let decoded = STANDARD.decode(payload.trim()).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    // The secret may itself contain ':'; only the first one separates the username
    let (username, secret) = text.split_once(':')?;
    Some(Credentials { username: username.to_string(), secret: secret.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(value: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert("authorization", HeaderValue::from_str(value).unwrap());
        h
    }

    #[test]
    fn parses_basic_credentials() {
        let token = STANDARD.encode("alice:pa:ss");
        let creds = parse_basic_auth(&headers_with(&format!("Basic {}", token))).unwrap();
        assert_eq!(creds.username, "alice");
        assert_eq!(creds.secret, "pa:ss");

        let lower = parse_basic_auth(&headers_with(&format!("basic {}", token)));
        assert!(lower.is_some());
    }

    #[test]
    fn rejects_missing_or_malformed() {
        assert!(parse_basic_auth(&HeaderMap::new()).is_none());
        assert!(parse_basic_auth(&headers_with("Bearer abc")).is_none());
        assert!(parse_basic_auth(&headers_with("Basic !!notbase64")).is_none());
        let no_colon = STANDARD.encode("alice");
        assert!(parse_basic_auth(&headers_with(&format!("Basic {}", no_colon))).is_none());
    }
}
