//! Caller identity decoded from a bearer token.
//!
//! The token is read as a JWT without verifying its signature; verification
//! belongs to whoever issued the token. Only the payload claims are consulted.
//!
//! A forged token can therefore claim any `upn`. In splice mode that value is
//! written into query text unescaped, so the dispatcher must sit behind a
//! gateway that verifies tokens unless `bind` mode is configured.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value as JsonValue;

/// Claims consulted, in order, for the caller identity.
const IDENTITY_CLAIMS: &[&str] = &["upn", "preferred_username", "unique_name", "email"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallerIdentity {
    pub upn: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl CallerIdentity {
    pub fn unknown() -> Self {
        Self::default()
    }

    /// Decodes identity claims from `token`. Tokens that are not JWTs, or whose
    /// payload cannot be read, yield an unknown identity.
    pub fn from_bearer(token: &str) -> Self {
        match decode_claims(token) {
            Some(claims) => Self::from_claims(&claims),
            None => Self::unknown(),
        }
    }

    fn from_claims(claims: &JsonValue) -> Self {
        let upn = IDENTITY_CLAIMS
            .iter()
            .find_map(|c| claims.get(*c).and_then(|v| v.as_str()))
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let expires_at = claims
            .get("exp")
            .and_then(|v| v.as_i64())
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single());
        Self { upn, expires_at }
    }

    pub fn upn(&self) -> Option<&str> {
        self.upn.as_deref()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(exp) if exp < now)
    }
}

fn decode_claims(token: &str) -> Option<JsonValue> {
    let mut parts = token.split('.');
    let (_header, payload, _sig) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: JsonValue = serde_json::from_slice(&bytes).ok()?;
    claims.is_object().then_some(claims)
}

/// Extracts the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

#[cfg(test)]
pub(crate) fn fake_jwt(claims: &JsonValue) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string().as_bytes());
    format!("{}.{}.sig", header, payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_upn_claim() {
        let token = fake_jwt(&json!({"upn": "alice@example.com", "exp": 4102444800i64}));
        let id = CallerIdentity::from_bearer(&token);
        assert_eq!(id.upn(), Some("alice@example.com"));
        assert!(!id.is_expired_at(Utc::now()));
    }

    #[test]
    fn falls_back_to_other_claims() {
        let token = fake_jwt(&json!({"preferred_username": "bob@example.com"}));
        assert_eq!(CallerIdentity::from_bearer(&token).upn(), Some("bob@example.com"));
    }

    #[test]
    fn opaque_tokens_have_no_identity() {
        assert_eq!(CallerIdentity::from_bearer("opaque-token"), CallerIdentity::unknown());
        assert_eq!(CallerIdentity::from_bearer("a.%%%.c"), CallerIdentity::unknown());
    }

    #[test]
    fn detects_expiry() {
        let token = fake_jwt(&json!({"upn": "x", "exp": 1}));
        assert!(CallerIdentity::from_bearer(&token).is_expired_at(Utc::now()));
    }

    #[test]
    fn parses_bearer_header() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("bearer  abc "), Some("abc"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer "), None);
    }
}
