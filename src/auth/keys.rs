// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Signing keys, the key ring and secret sources.
//!
//! ## Key ring
//!
//! The signing context is a [`KeyRing`]: the active key plus up to
//! `retained` previous keys, newest first. Only the active key signs.
//! A ring is never mutated in place; rotation builds a new ring and the
//! token manager swaps it in whole.

use std::sync::RwLock;

use base64ct::{Base64UrlUnpadded, Encoding};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};
use sha2::{Digest, Sha256};

use super::error::TokenError;
use crate::config::JWT_SECRET_ENV;

/// The only algorithm tokens are signed and accepted with.
pub const ALGORITHM: Algorithm = Algorithm::HS256;

/// Key id used for the startup secret when none is configured.
pub const DEFAULT_KEY_ID: &str = "default";

/// Derive a key id from a secret: `k-` + 11 base64url chars of its SHA-256.
pub fn derive_key_id(secret: &str) -> String {
    let digest = Sha256::digest(secret.as_bytes());
    let encoded = Base64UrlUnpadded::encode_string(&digest);
    format!("k-{}", &encoded[..11])
}

/// An HMAC secret with its key id.
#[derive(Clone)]
pub struct SigningKey {
    kid: String,
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SigningKey {
    /// Build a key. Fails with `Configuration` if the secret is empty or
    /// whitespace only, or if the key id is empty.
    pub fn new(kid: impl Into<String>, secret: &str) -> Result<Self, TokenError> {
        let kid = kid.into();
        if secret.trim().is_empty() {
            return Err(TokenError::Configuration(
                "signing secret must not be empty".to_string(),
            ));
        }
        if kid.trim().is_empty() {
            return Err(TokenError::Configuration(
                "key id must not be empty".to_string(),
            ));
        }

        Ok(Self {
            kid,
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        })
    }

    /// Build a key whose id is derived from the secret.
    pub fn derived(secret: &str) -> Result<Self, TokenError> {
        Self::new(derive_key_id(secret), secret)
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    pub(crate) fn encoding(&self) -> &EncodingKey {
        &self.encoding
    }

    pub(crate) fn decoding(&self) -> &DecodingKey {
        &self.decoding
    }
}

// Key material is never printed.
impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("kid", &self.kid)
            .finish_non_exhaustive()
    }
}

/// Active signing key plus a bounded list of previous keys.
#[derive(Debug, Clone)]
pub struct KeyRing {
    active: SigningKey,
    /// Newest first, at most `retained` entries
    previous: Vec<SigningKey>,
    retained: usize,
}

impl KeyRing {
    pub fn new(active: SigningKey, retained: usize) -> Self {
        Self {
            active,
            previous: Vec::new(),
            retained,
        }
    }

    pub fn active(&self) -> &SigningKey {
        &self.active
    }

    /// Key with the given id, active key first.
    pub fn find(&self, kid: &str) -> Option<&SigningKey> {
        std::iter::once(&self.active)
            .chain(self.previous.iter())
            .find(|key| key.kid == kid)
    }

    /// Key ids, newest first.
    pub fn key_ids(&self) -> Vec<&str> {
        std::iter::once(self.active.kid())
            .chain(self.previous.iter().map(SigningKey::kid))
            .collect()
    }

    /// New ring with `key` active and the current active key demoted.
    ///
    /// Any older entry carrying the new key's id is dropped so a key id never
    /// resolves to two secrets.
    pub fn rotated(&self, key: SigningKey) -> KeyRing {
        let mut previous: Vec<SigningKey> = std::iter::once(self.active.clone())
            .chain(self.previous.iter().cloned())
            .filter(|old| old.kid != key.kid)
            .collect();
        previous.truncate(self.retained);

        KeyRing {
            active: key,
            previous,
            retained: self.retained,
        }
    }
}

/// Where signing secrets come from.
pub trait SecretSource: Send + Sync {
    /// Current secret, or `None` when not configured. Empty values count as
    /// not configured.
    fn fetch(&self) -> Option<String>;

    /// Name used in configuration errors.
    fn name(&self) -> &str;

    /// Fetch or fail with a `Configuration` error.
    fn require(&self) -> Result<String, TokenError> {
        self.fetch().ok_or_else(|| {
            TokenError::Configuration(format!("{} is required and must not be empty", self.name()))
        })
    }
}

/// Reads the secret from an environment variable on every fetch.
#[derive(Debug, Clone)]
pub struct EnvSecretSource {
    var: String,
}

impl EnvSecretSource {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvSecretSource {
    /// Reads [`JWT_SECRET_ENV`].
    fn default() -> Self {
        Self::new(JWT_SECRET_ENV)
    }
}

impl SecretSource for EnvSecretSource {
    fn fetch(&self) -> Option<String> {
        std::env::var(&self.var)
            .ok()
            .filter(|value| !value.trim().is_empty())
    }

    fn name(&self) -> &str {
        &self.var
    }
}

/// In-process secret holder that can be replaced at runtime.
#[derive(Debug, Default)]
pub struct StaticSecretSource {
    secret: RwLock<Option<String>>,
}

impl StaticSecretSource {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: RwLock::new(Some(secret.into())),
        }
    }

    /// Replace the held secret.
    pub fn set(&self, secret: impl Into<String>) {
        let secret = Some(secret.into());
        match self.secret.write() {
            Ok(mut guard) => *guard = secret,
            Err(poisoned) => *poisoned.into_inner() = secret,
        }
    }
}

impl SecretSource for StaticSecretSource {
    fn fetch(&self) -> Option<String> {
        let guard = match self.secret.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.clone().filter(|value| !value.trim().is_empty())
    }

    fn name(&self) -> &str {
        "static secret"
    }
}
