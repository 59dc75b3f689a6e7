// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Signed token payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::roles::has_role;

/// Fixed `iss` claim for every token minted by this service.
pub const ISSUER: &str = "identity-gate";

/// Claims carried inside a signed bearer token.
///
/// A `Claims` value only comes from two places: [`TokenManager`] building it at
/// issuance, or signature verification reconstructing it from a token. Fields
/// are private and there are no setters, so a parsed value cannot drift from
/// what was signed.
///
/// Wire names follow the registered JWT claims plus three private ones:
/// `user_id`, `username` and `roles`.
///
/// [`TokenManager`]: super::token::TokenManager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Opaque principal identifier
    user_id: String,

    /// Human-readable username
    username: String,

    /// Role names in issuance order (duplicates kept, case-sensitive)
    #[serde(default)]
    roles: Vec<String>,

    /// Issuer, always [`ISSUER`]
    iss: String,

    /// Subject, mirrors `user_id`
    sub: String,

    /// Issued at (unix seconds)
    iat: i64,

    /// Not before (unix seconds), equal to `iat`
    nbf: i64,

    /// Expiration (unix seconds)
    exp: i64,

    /// Token id, hook for future revocation bookkeeping
    jti: String,

    /// Key id taken from the token header (not part of the payload)
    #[serde(skip)]
    kid: Option<String>,
}

impl Claims {
    /// Build claims for a token issued at `issued_at` that lives `ttl_secs`.
    pub(crate) fn new(
        subject_id: &str,
        display_name: &str,
        roles: &[String],
        issued_at: i64,
        ttl_secs: i64,
        token_id: String,
        key_id: &str,
    ) -> Self {
        Self {
            user_id: subject_id.to_string(),
            username: display_name.to_string(),
            roles: roles.to_vec(),
            iss: ISSUER.to_string(),
            sub: subject_id.to_string(),
            iat: issued_at,
            nbf: issued_at,
            exp: issued_at.saturating_add(ttl_secs),
            jti: token_id,
            kid: Some(key_id.to_string()),
        }
    }

    /// Attach the key id read from a verified token header.
    pub(crate) fn with_key_id(mut self, kid: Option<String>) -> Self {
        self.kid = kid;
        self
    }

    pub fn subject_id(&self) -> &str {
        &self.user_id
    }

    pub fn display_name(&self) -> &str {
        &self.username
    }

    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    pub fn issuer(&self) -> &str {
        &self.iss
    }

    /// Registered `sub` claim. Always equal to [`Claims::subject_id`] for
    /// tokens minted here.
    pub fn subject(&self) -> &str {
        &self.sub
    }

    pub fn issued_at(&self) -> i64 {
        self.iat
    }

    pub fn not_before(&self) -> i64 {
        self.nbf
    }

    pub fn expires_at(&self) -> i64 {
        self.exp
    }

    /// Expiration as a UTC timestamp, `None` if out of chrono's range.
    pub fn expires_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }

    pub fn token_id(&self) -> &str {
        &self.jti
    }

    /// Key id of the signing key, if the token header named one.
    pub fn key_id(&self) -> Option<&str> {
        self.kid.as_deref()
    }

    /// Exact, case-sensitive role membership.
    pub fn has_role(&self, required: &str) -> bool {
        has_role(&self.roles, required)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_claims() -> Claims {
        Claims::new(
            "u1",
            "alice",
            &["admin".to_string(), "user".to_string()],
            1_700_000_000,
            900,
            "jwt-1700000000-abc".to_string(),
            "default",
        )
    }

    #[test]
    fn new_sets_validity_window() {
        let claims = sample_claims();
        assert_eq!(claims.issued_at(), 1_700_000_000);
        assert_eq!(claims.not_before(), claims.issued_at());
        assert_eq!(claims.expires_at(), 1_700_000_900);
        assert_eq!(claims.issuer(), ISSUER);
        assert_eq!(claims.subject(), "u1");
        assert_eq!(claims.key_id(), Some("default"));
    }

    #[test]
    fn serializes_with_wire_names_and_without_kid() {
        let value = serde_json::to_value(sample_claims()).unwrap();
        assert_eq!(value["user_id"], "u1");
        assert_eq!(value["username"], "alice");
        assert_eq!(value["roles"], serde_json::json!(["admin", "user"]));
        assert_eq!(value["iss"], "identity-gate");
        assert_eq!(value["jti"], "jwt-1700000000-abc");
        assert!(value.get("kid").is_none());
    }

    #[test]
    fn missing_roles_deserialize_as_empty() {
        let json = serde_json::json!({
            "user_id": "u2",
            "username": "bob",
            "iss": ISSUER,
            "sub": "u2",
            "iat": 1,
            "nbf": 1,
            "exp": 2,
            "jti": "jwt-1-x",
        });
        let claims: Claims = serde_json::from_value(json).unwrap();
        assert!(claims.roles().is_empty());
        assert_eq!(claims.key_id(), None);
    }

    #[test]
    fn has_role_is_exact_match() {
        let claims = sample_claims();
        assert!(claims.has_role("admin"));
        assert!(!claims.has_role("Admin"));
        assert!(!claims.has_role("superadmin"));
    }

    #[test]
    fn expires_at_utc_converts() {
        let claims = sample_claims();
        assert_eq!(claims.expires_at_utc().unwrap().timestamp(), 1_700_000_900);
    }
}
