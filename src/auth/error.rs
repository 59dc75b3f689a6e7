// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token and authentication errors.
//!
//! [`TokenError`] is what the token manager returns. [`AuthError`] is what the
//! pipeline turns a failure into: one of two rejection kinds (401 or 403) with
//! a generic message and a stable reason code. Library error text stays in the
//! logs and never reaches a response body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// Errors from issuing, validating, refreshing or rotating tokens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// Secret missing or empty at startup or rotation
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Issuance requested for an empty subject id
    #[error("subject id must not be empty")]
    EmptySubject,

    /// Signature computation failed during issuance
    #[error("failed to sign token: {0}")]
    Signing(String),

    /// Not a parseable signed token
    #[error("token is malformed")]
    Malformed,

    /// Token header declares an algorithm other than the configured one
    #[error("unexpected signing algorithm")]
    AlgorithmMismatch,

    /// Signature does not verify against the signing key
    #[error("token signature is invalid")]
    InvalidSignature,

    /// `now > exp`
    #[error("token has expired")]
    Expired,

    /// `now < nbf`
    #[error("token is not yet valid")]
    NotYetValid,

    /// Signature verified but registered claims are wrong or missing
    #[error("token claims are invalid")]
    InvalidClaims,
}

impl TokenError {
    /// Stable machine-readable code.
    pub fn reason(&self) -> &'static str {
        match self {
            TokenError::Configuration(_) => "configuration_error",
            TokenError::EmptySubject => "empty_subject",
            TokenError::Signing(_) => "signing_error",
            TokenError::Malformed => "malformed_token",
            TokenError::AlgorithmMismatch => "algorithm_mismatch",
            TokenError::InvalidSignature => "invalid_signature",
            TokenError::Expired => "token_expired",
            TokenError::NotYetValid => "token_not_yet_valid",
            TokenError::InvalidClaims => "invalid_claims",
        }
    }

    /// True for failures caused by the presented token rather than by this
    /// service's configuration.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(
            self,
            TokenError::Malformed
                | TokenError::AlgorithmMismatch
                | TokenError::InvalidSignature
                | TokenError::Expired
                | TokenError::NotYetValid
                | TokenError::InvalidClaims
        )
    }
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::ImmatureSignature => TokenError::NotYetValid,
            ErrorKind::InvalidSignature => TokenError::InvalidSignature,
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                TokenError::AlgorithmMismatch
            }
            ErrorKind::InvalidIssuer
            | ErrorKind::InvalidSubject
            | ErrorKind::MissingRequiredClaim(_) => TokenError::InvalidClaims,
            _ => TokenError::Malformed,
        }
    }
}

/// Pipeline rejection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No `Authorization` header, or `Bearer ` with nothing after it
    MissingCredentials,
    /// `Authorization` header without the `Bearer ` prefix or not valid text
    MalformedHeader,
    /// Token presented but validation failed
    InvalidToken(TokenError),
    /// Role gate reached without an attached identity
    NoRolesInContext,
    /// Identity lacks the required role
    InsufficientPermissions,
}

/// JSON body of a rejection.
#[derive(Debug, Serialize, ToSchema)]
pub struct AuthErrorBody {
    /// Generic, human-readable message
    pub error: String,
    /// HTTP status (401 or 403)
    pub code: u16,
    /// `unauthorized` or `forbidden`
    pub error_code: String,
    /// Stable reason code
    pub reason: String,
}

impl AuthError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingCredentials
            | AuthError::MalformedHeader
            | AuthError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            AuthError::NoRolesInContext | AuthError::InsufficientPermissions => {
                StatusCode::FORBIDDEN
            }
        }
    }

    /// Get the error kind code (one per status).
    pub fn error_code(&self) -> &'static str {
        if self.is_authorization_failure() {
            "forbidden"
        } else {
            "unauthorized"
        }
    }

    /// Get the stable reason code for this error.
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::MissingCredentials => "missing_credentials",
            AuthError::MalformedHeader => "malformed_header",
            AuthError::InvalidToken(e) => e.reason(),
            AuthError::NoRolesInContext => "no_roles_in_context",
            AuthError::InsufficientPermissions => "insufficient_permissions",
        }
    }

    pub fn is_authorization_failure(&self) -> bool {
        matches!(
            self,
            AuthError::NoRolesInContext | AuthError::InsufficientPermissions
        )
    }

    /// Build the response body.
    pub fn body(&self) -> AuthErrorBody {
        AuthErrorBody {
            error: self.to_string(),
            code: self.status_code().as_u16(),
            error_code: self.error_code().to_string(),
            reason: self.reason().to_string(),
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingCredentials | AuthError::MalformedHeader => {
                write!(f, "Missing or invalid authorization header")
            }
            AuthError::InvalidToken(_) => write!(f, "Invalid or expired token"),
            AuthError::NoRolesInContext => write!(f, "User roles not found in context"),
            AuthError::InsufficientPermissions => write!(f, "Insufficient permissions"),
        }
    }
}

impl std::error::Error for AuthError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AuthError::InvalidToken(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(e: TokenError) -> Self {
        AuthError::InvalidToken(e)
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self.body())).into_response()
    }
}
