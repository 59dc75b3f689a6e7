// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Bearer-token identity for the Identity Gate API.
//!
//! ## Auth Flow
//!
//! 1. A client obtains a token issued by [`TokenManager::issue_token`]
//! 2. The client sends `Authorization: Bearer <token>`
//! 3. The [`AuthPipeline`]:
//!    - extracts the token from the header
//!    - verifies signature (HS256 only), expiry, not-before and issuer
//!    - attaches a [`RequestIdentity`] to the request
//!    - optionally checks a required role
//!
//! The pipeline is wired into Axum two ways: middleware functions for whole
//! route groups ([`middleware`]) and extractors for single handlers
//! ([`extractor`]). Both produce the same 401/403 bodies.
//!
//! ## Security
//!
//! - No clock skew tolerance
//! - Only the configured algorithm is accepted; `none` is always rejected
//! - Failure responses carry a stable reason code, never library error text
//! - Signing keys rotate atomically; see [`keys`]

pub mod claims;
pub mod context;
pub mod error;
pub mod events;
pub mod extractor;
pub mod keys;
pub mod middleware;
pub mod pipeline;
pub mod roles;
pub mod token;

pub use claims::Claims;
pub use context::{IdentityCarrier, RequestIdentity};
pub use error::{AuthError, AuthErrorBody, TokenError};
pub use events::{AuthEvent, AuthEventSink, AuthEventType, EventSink, MemorySink, TracingSink};
pub use extractor::{Auth, Authorized, CurrentIdentity, OptionalAuth};
pub use keys::{EnvSecretSource, SecretSource, SigningKey, StaticSecretSource};
pub use pipeline::{AuthMode, AuthPipeline, Authentication, RoleGate};
pub use roles::{Admin, RequiredRole, ADMIN_ROLE};
pub use token::TokenManager;
