// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token lifecycle: issue, validate, refresh, rotate.
//!
//! ## Signing context
//!
//! The manager holds an `Arc<KeyRing>` behind a `RwLock`. Issue and validate
//! take a snapshot of the `Arc` under the read lock and work on it without
//! holding the lock; rotation builds a new ring and swaps the `Arc` under the
//! write lock. A request in flight therefore sees either the old ring or the
//! new ring, never a mix.
//!
//! ## Validation
//!
//! - algorithm must be exactly [`ALGORITHM`] (checked before any key lookup)
//! - signature must verify against the key named by `kid` if the ring still
//!   holds it, otherwise against the active key
//! - `exp`, `nbf`, `iss`, `sub` required; no clock-skew leeway

use std::sync::{Arc, RwLock};

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{Duration, Utc};
use jsonwebtoken::{errors::ErrorKind, Header, Validation};
use serde_json::json;

use super::claims::{Claims, ISSUER};
use super::error::TokenError;
use super::events::{AuthEvent, AuthEventType, EventSink};
use super::keys::{KeyRing, SecretSource, SigningKey, ALGORITHM, DEFAULT_KEY_ID};

/// Mints and verifies signed bearer tokens.
pub struct TokenManager {
    ring: RwLock<Arc<KeyRing>>,
    validation: Validation,
    events: EventSink,
}

impl TokenManager {
    /// Create a manager signing with `active` and accepting up to `retained`
    /// previous keys after rotation.
    pub fn new(active: SigningKey, retained: usize) -> Self {
        let mut validation = Validation::new(ALGORITHM);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.validate_aud = false;
        validation.set_issuer(&[ISSUER]);
        validation.set_required_spec_claims(&["exp", "nbf", "iss", "sub"]);

        Self {
            ring: RwLock::new(Arc::new(KeyRing::new(active, retained))),
            validation,
            events: EventSink::none(),
        }
    }

    /// Single-key manager with the default key id and no retention.
    pub fn from_secret(secret: &str) -> Result<Self, TokenError> {
        Ok(Self::new(SigningKey::new(DEFAULT_KEY_ID, secret)?, 0))
    }

    /// Load the startup secret from `source`. Fails closed when the source
    /// has nothing configured.
    pub fn from_source(
        source: &dyn SecretSource,
        key_id: &str,
        retained: usize,
    ) -> Result<Self, TokenError> {
        let secret = source.require()?;
        Ok(Self::new(SigningKey::new(key_id, &secret)?, retained))
    }

    /// Attach an audit event sink.
    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    /// Key id of the key currently used for signing.
    pub fn active_key_id(&self) -> String {
        self.snapshot().active().kid().to_string()
    }

    /// Key ids accepted for validation, newest first.
    pub fn key_ids(&self) -> Vec<String> {
        self.snapshot()
            .key_ids()
            .into_iter()
            .map(str::to_owned)
            .collect()
    }

    fn snapshot(&self) -> Arc<KeyRing> {
        // The guarded value is replaced whole, so a poisoned lock still holds
        // a consistent ring.
        match self.ring.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Issue a token for an already resolved identity.
    ///
    /// `issued_at == not_before == now` and `expires_at = now + ttl`. A
    /// non-positive `ttl` produces a token that is already expired.
    pub fn issue_token(
        &self,
        subject_id: &str,
        display_name: &str,
        roles: &[String],
        ttl: Duration,
    ) -> Result<String, TokenError> {
        if subject_id.is_empty() {
            return Err(TokenError::EmptySubject);
        }

        let ring = self.snapshot();
        let key = ring.active();
        let now = Utc::now().timestamp();

        let claims = Claims::new(
            subject_id,
            display_name,
            roles,
            now,
            ttl.num_seconds(),
            token_id(now),
            key.kid(),
        );

        let mut header = Header::new(ALGORITHM);
        header.kid = Some(key.kid().to_string());

        let token = jsonwebtoken::encode(&header, &claims, key.encoding()).map_err(|e| {
            tracing::error!(error = %e, key_id = key.kid(), "failed to sign token");
            TokenError::Signing(e.to_string())
        })?;

        self.events.emit(|| {
            AuthEvent::new(AuthEventType::TokenIssued)
                .with_user(claims.subject_id(), claims.display_name())
                .with_token(claims.token_id())
                .with_key(key.kid())
                .with_details(json!({ "expires_at": claims.expires_at() }))
        });

        Ok(token)
    }

    /// Verify a token and return its claims.
    pub fn validate_token(&self, token: &str) -> Result<Claims, TokenError> {
        let result = self.verify(token);

        match &result {
            Ok(claims) => {
                tracing::debug!(
                    user_id = claims.subject_id(),
                    token_id = claims.token_id(),
                    "token validated"
                );
                self.events.emit(|| {
                    let event = AuthEvent::new(AuthEventType::TokenValidated)
                        .with_user(claims.subject_id(), claims.display_name())
                        .with_token(claims.token_id());
                    match claims.key_id() {
                        Some(kid) => event.with_key(kid),
                        None => event,
                    }
                });
            }
            Err(e) => {
                tracing::debug!(reason = e.reason(), "token rejected");
                self.events
                    .emit(|| AuthEvent::new(AuthEventType::TokenRejected).failed(e.reason()));
            }
        }

        result
    }

    fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let header = match jsonwebtoken::decode_header(token) {
            Ok(header) => header,
            // Unknown algorithm names (e.g. "none") do not parse as a Header.
            Err(_) => {
                return match declared_algorithm(token) {
                    Some(alg) if alg != "HS256" => Err(TokenError::AlgorithmMismatch),
                    _ => Err(TokenError::Malformed),
                };
            }
        };

        if header.alg != ALGORITHM {
            return Err(TokenError::AlgorithmMismatch);
        }

        let ring = self.snapshot();
        let active = ring.active();
        let key = match header.kid.as_deref() {
            Some(kid) if kid != active.kid() => {
                let retained = ring.find(kid);
                tracing::debug!(
                    token_kid = kid,
                    active_kid = active.kid(),
                    retained = retained.is_some(),
                    "token key id differs from active key id"
                );
                self.events.emit(|| {
                    AuthEvent::new(AuthEventType::KeyIdMismatch)
                        .with_key(kid)
                        .with_details(json!({
                            "active_key_id": active.kid(),
                            "retained": retained.is_some(),
                        }))
                });
                retained.unwrap_or(active)
            }
            _ => active,
        };

        // The header has decoded and the payload is only read once the
        // signature verifies, so a base64 failure here is in the signature.
        let data = jsonwebtoken::decode::<Claims>(token, key.decoding(), &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::Base64(_) => TokenError::InvalidSignature,
                _ => TokenError::from(e),
            })?;
        let claims = data.claims.with_key_id(header.kid);

        if claims.subject_id().is_empty() || claims.subject() != claims.subject_id() {
            return Err(TokenError::InvalidClaims);
        }

        Ok(claims)
    }

    /// Re-issue a valid token with a new ttl.
    ///
    /// Identity (subject, display name, roles) is carried over; the new token
    /// gets a fresh token id, the active key id and a new `issued_at`.
    pub fn refresh_token(&self, token: &str, ttl: Duration) -> Result<String, TokenError> {
        let claims = self.validate_token(token)?;
        self.issue_token(
            claims.subject_id(),
            claims.display_name(),
            claims.roles(),
            ttl,
        )
    }

    /// Replace the signing secret. The new key id is derived from the secret.
    ///
    /// Returns the new active key id. On error the previous key stays active.
    pub fn rotate_signing_key(&self, new_secret: &str) -> Result<String, TokenError> {
        self.install(SigningKey::derived(new_secret)?)
    }

    /// Replace the signing secret under an explicit key id.
    pub fn rotate_signing_key_with_id(
        &self,
        key_id: &str,
        new_secret: &str,
    ) -> Result<String, TokenError> {
        self.install(SigningKey::new(key_id, new_secret)?)
    }

    /// Re-read the secret from `source` and rotate to it.
    pub fn rotate_from_source(&self, source: &dyn SecretSource) -> Result<String, TokenError> {
        let secret = source.require().inspect_err(|e| {
            tracing::warn!(error = %e, "signing key rotation aborted, previous key stays active");
        })?;
        self.rotate_signing_key(&secret)
    }

    fn install(&self, key: SigningKey) -> Result<String, TokenError> {
        let kid = key.kid().to_string();

        let next = {
            let mut guard = match self.ring.write() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            let next = Arc::new(guard.rotated(key));
            *guard = Arc::clone(&next);
            next
        };

        tracing::info!(
            key_id = %kid,
            retained_keys = next.key_ids().len() - 1,
            "signing key rotated"
        );
        self.events.emit(|| {
            AuthEvent::new(AuthEventType::KeyRotated)
                .with_key(kid.clone())
                .with_details(json!({ "accepted_key_ids": next.key_ids() }))
        });

        Ok(kid)
    }
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("algorithm", &ALGORITHM)
            .field("key_ids", &self.key_ids())
            .field("events", &self.events)
            .finish()
    }
}

/// `jwt-<issued_at>-<12 random hex>`.
fn token_id(issued_at: i64) -> String {
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!("jwt-{issued_at}-{}", &random[..12])
}

/// `alg` field of a token header that did not parse as a known header.
fn declared_algorithm(token: &str) -> Option<String> {
    let segment = token.split('.').next()?;
    let bytes = Base64UrlUnpadded::decode_vec(segment).ok()?;
    let header: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    header.get("alg")?.as_str().map(str::to_owned)
}
