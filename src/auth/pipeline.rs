// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Framework-agnostic auth pipeline.
//!
//! ```text
//! Authorization header ─► extract ─► validate ─► enrich ─► (authorize) ─► handler
//!                            │           │
//!                            └─ Required: 401 and stop
//!                               Optional: continue anonymously
//! ```
//!
//! Every stage works on an [`IdentityCarrier`], so the axum middleware and
//! the axum extractors share this code. Rejections come back as
//! [`AuthError`]; the adapters only turn them into responses.

use std::sync::Arc;

use axum::http::{header::AUTHORIZATION, HeaderMap};
use serde_json::json;

use super::claims::Claims;
use super::context::{IdentityCarrier, RequestIdentity};
use super::error::AuthError;
use super::events::{AuthEvent, AuthEventType, EventSink};
use super::token::TokenManager;

/// Required prefix of the `Authorization` header (case-sensitive, one space).
pub const BEARER_PREFIX: &str = "Bearer ";

/// What to do when a request has no valid token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Reject with 401.
    Required,
    /// Continue without an identity. Never rejects.
    Optional,
}

impl AuthMode {
    fn as_str(&self) -> &'static str {
        match self {
            AuthMode::Required => "required",
            AuthMode::Optional => "optional",
        }
    }
}

/// Result of the validate stage when the request is allowed to continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authentication {
    /// An identity is attached to the request.
    Authenticated,
    /// Optional mode, no usable token. Nothing attached.
    Anonymous,
}

/// Read the bearer token from the `Authorization` header.
///
/// The remainder after `Bearer ` is trimmed. A missing header or an empty
/// remainder is [`AuthError::MissingCredentials`]; any other prefix, or a
/// value that is not visible ASCII, is [`AuthError::MalformedHeader`].
pub fn extract_bearer(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingCredentials)?
        .to_str()
        .map_err(|_| AuthError::MalformedHeader)?;

    let token = value
        .strip_prefix(BEARER_PREFIX)
        .ok_or(AuthError::MalformedHeader)?
        .trim();

    if token.is_empty() {
        return Err(AuthError::MissingCredentials);
    }

    Ok(token)
}

/// Extract, validate, enrich and authorize.
#[derive(Debug, Clone)]
pub struct AuthPipeline {
    tokens: Arc<TokenManager>,
    events: EventSink,
}

impl AuthPipeline {
    pub fn new(tokens: Arc<TokenManager>) -> Self {
        Self {
            tokens,
            events: EventSink::none(),
        }
    }

    /// Attach an audit event sink.
    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    pub fn tokens(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    /// Run the extract, validate and enrich stages.
    ///
    /// - Required mode: any failure is returned as the rejection.
    /// - Optional mode: failures are logged and swallowed; the request
    ///   continues as [`Authentication::Anonymous`].
    ///
    /// A request that already carries an identity (an earlier stage
    /// authenticated it) is not validated again.
    pub fn authenticate<R: IdentityCarrier>(
        &self,
        request: &mut R,
        mode: AuthMode,
    ) -> Result<Authentication, AuthError> {
        if request.identity().is_some() {
            return Ok(Authentication::Authenticated);
        }

        match self.validate(request.headers()) {
            Ok(claims) => {
                self.enrich(request, claims, mode);
                Ok(Authentication::Authenticated)
            }
            Err(err) => match mode {
                AuthMode::Required => {
                    tracing::warn!(
                        reason = err.reason(),
                        method = %request.method(),
                        path = request.uri().path(),
                        "authentication rejected"
                    );
                    self.events.emit(|| {
                        AuthEvent::new(AuthEventType::AuthFailure)
                            .failed(err.reason())
                            .with_details(request_details(request, mode))
                    });
                    Err(err)
                }
                AuthMode::Optional => {
                    tracing::debug!(
                        reason = err.reason(),
                        path = request.uri().path(),
                        "optional authentication skipped"
                    );
                    Ok(Authentication::Anonymous)
                }
            },
        }
    }

    fn validate(&self, headers: &HeaderMap) -> Result<Claims, AuthError> {
        let token = extract_bearer(headers)?;
        Ok(self.tokens.validate_token(token)?)
    }

    fn enrich<R: IdentityCarrier>(&self, request: &mut R, claims: Claims, mode: AuthMode) {
        let identity = RequestIdentity::from_claims(claims);

        tracing::debug!(
            user_id = identity.subject_id(),
            username = identity.display_name(),
            method = %request.method(),
            path = request.uri().path(),
            "user authenticated"
        );
        self.events.emit(|| {
            AuthEvent::new(AuthEventType::AuthSuccess)
                .with_user(identity.subject_id(), identity.display_name())
                .with_token(identity.claims().token_id())
                .with_details(request_details(request, mode))
        });

        // Only reachable without a prior identity, so this cannot be refused.
        let _ = request.attach_identity(identity);
    }

    /// Role gate. Reads the identity attached by [`AuthPipeline::authenticate`].
    ///
    /// - no identity: [`AuthError::NoRolesInContext`]
    /// - identity without `required_role` (exact match):
    ///   [`AuthError::InsufficientPermissions`]
    pub fn authorize<R: IdentityCarrier>(
        &self,
        request: &R,
        required_role: &str,
    ) -> Result<(), AuthError> {
        let Some(identity) = request.identity() else {
            tracing::warn!(
                required_role,
                path = request.uri().path(),
                "role check without authenticated identity"
            );
            self.events.emit(|| {
                AuthEvent::new(AuthEventType::PermissionDenied)
                    .failed(AuthError::NoRolesInContext.reason())
                    .with_details(json!({
                        "required_role": required_role,
                        "path": request.uri().path(),
                    }))
            });
            return Err(AuthError::NoRolesInContext);
        };

        let allowed = identity.has_role(required_role);
        self.events.emit(|| {
            let event = if allowed {
                AuthEvent::new(AuthEventType::PermissionGranted)
            } else {
                AuthEvent::new(AuthEventType::PermissionDenied)
                    .failed(AuthError::InsufficientPermissions.reason())
            };
            event
                .with_user(identity.subject_id(), identity.display_name())
                .with_details(json!({
                    "required_role": required_role,
                    "path": request.uri().path(),
                }))
        });

        if !allowed {
            tracing::warn!(
                user_id = identity.subject_id(),
                required_role,
                "insufficient permissions"
            );
            return Err(AuthError::InsufficientPermissions);
        }

        Ok(())
    }

    /// Role gate bound to one role, for per-route middleware.
    pub fn role_gate(&self, role: impl Into<Arc<str>>) -> RoleGate {
        RoleGate {
            pipeline: self.clone(),
            role: role.into(),
        }
    }
}

/// A pipeline plus the role a route requires.
#[derive(Debug, Clone)]
pub struct RoleGate {
    pipeline: AuthPipeline,
    role: Arc<str>,
}

impl RoleGate {
    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn check<R: IdentityCarrier>(&self, request: &R) -> Result<(), AuthError> {
        self.pipeline.authorize(request, &self.role)
    }
}

fn request_details<R: IdentityCarrier>(request: &R, mode: AuthMode) -> serde_json::Value {
    json!({
        "mode": mode.as_str(),
        "method": request.method().as_str(),
        "path": request.uri().path(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::error::TokenError;
    use crate::auth::events::MemorySink;
    use axum::http::{HeaderValue, Request};
    use chrono::Duration;

    fn pipeline() -> (AuthPipeline, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let tokens = Arc::new(TokenManager::from_secret("pipeline-secret").unwrap());
        let pipeline = AuthPipeline::new(tokens).with_events(EventSink::new(sink.clone()));
        (pipeline, sink)
    }

    fn token(pipeline: &AuthPipeline, roles: &[&str]) -> String {
        let roles: Vec<String> = roles.iter().map(|s| s.to_string()).collect();
        pipeline
            .tokens()
            .issue_token("u1", "alice", &roles, Duration::minutes(15))
            .unwrap()
    }

    fn request(authorization: Option<&str>) -> Request<()> {
        let mut builder = Request::builder().uri("/v1/resource");
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap()
    }

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn extract_bearer_accepts_and_trims() {
        assert_eq!(extract_bearer(&headers("Bearer abc")), Ok("abc"));
        assert_eq!(extract_bearer(&headers("Bearer   abc  ")), Ok("abc"));
    }

    #[test]
    fn extract_bearer_distinguishes_missing_from_malformed() {
        assert_eq!(
            extract_bearer(&HeaderMap::new()),
            Err(AuthError::MissingCredentials)
        );
        assert_eq!(
            extract_bearer(&headers("Bearer ")),
            Err(AuthError::MissingCredentials)
        );
        for value in ["bearer abc", "Basic abc", "Bearer", "BearerAbc", "Token abc"] {
            assert_eq!(
                extract_bearer(&headers(value)),
                Err(AuthError::MalformedHeader),
                "header: {value:?}"
            );
        }
    }

    #[test]
    fn extract_bearer_rejects_non_text_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_bytes(b"Bearer \xff\xfe").unwrap(),
        );
        assert_eq!(extract_bearer(&headers), Err(AuthError::MalformedHeader));
    }

    #[test]
    fn required_mode_attaches_identity() {
        let (pipeline, sink) = pipeline();
        let mut req = request(Some(&format!("Bearer {}", token(&pipeline, &["user"]))));

        let outcome = pipeline.authenticate(&mut req, AuthMode::Required).unwrap();
        assert_eq!(outcome, Authentication::Authenticated);

        let identity = req.identity().unwrap();
        assert_eq!(identity.subject_id(), "u1");
        assert_eq!(identity.display_name(), "alice");
        assert_eq!(identity.roles(), &["user".to_string()]);
        assert!(sink.event_types().contains(&AuthEventType::AuthSuccess));
    }

    #[test]
    fn required_mode_rejects_missing_and_invalid_tokens() {
        let (pipeline, sink) = pipeline();

        let mut missing = request(None);
        assert_eq!(
            pipeline.authenticate(&mut missing, AuthMode::Required),
            Err(AuthError::MissingCredentials)
        );

        let mut garbled = request(Some("Bearer invalid.jwt.token"));
        assert_eq!(
            pipeline.authenticate(&mut garbled, AuthMode::Required),
            Err(AuthError::InvalidToken(TokenError::Malformed))
        );

        assert!(missing.identity().is_none());
        assert!(garbled.identity().is_none());
        let failures = sink
            .events()
            .into_iter()
            .filter(|e| e.event_type == AuthEventType::AuthFailure)
            .count();
        assert_eq!(failures, 2);
    }

    #[test]
    fn required_mode_reports_expiry() {
        let (pipeline, _) = pipeline();
        let expired = pipeline
            .tokens()
            .issue_token("u1", "alice", &[], Duration::seconds(-1))
            .unwrap();
        let mut req = request(Some(&format!("Bearer {expired}")));
        assert_eq!(
            pipeline.authenticate(&mut req, AuthMode::Required),
            Err(AuthError::InvalidToken(TokenError::Expired))
        );
    }

    #[test]
    fn optional_mode_never_rejects() {
        let (pipeline, sink) = pipeline();

        for header in [None, Some("garbled"), Some("Bearer not.a.token"), Some("Bearer ")] {
            let mut req = request(header);
            let outcome = pipeline.authenticate(&mut req, AuthMode::Optional).unwrap();
            assert_eq!(outcome, Authentication::Anonymous, "header: {header:?}");
            assert!(req.identity().is_none());
        }
        assert!(!sink.event_types().contains(&AuthEventType::AuthFailure));
    }

    #[test]
    fn optional_mode_attaches_valid_identity() {
        let (pipeline, _) = pipeline();
        let mut req = request(Some(&format!("Bearer {}", token(&pipeline, &["user"]))));
        assert_eq!(
            pipeline.authenticate(&mut req, AuthMode::Optional),
            Ok(Authentication::Authenticated)
        );
        assert_eq!(req.identity().unwrap().subject_id(), "u1");
    }

    #[test]
    fn existing_identity_is_not_revalidated() {
        let (pipeline, _) = pipeline();
        let mut req = request(Some(&format!("Bearer {}", token(&pipeline, &["user"]))));
        pipeline.authenticate(&mut req, AuthMode::Required).unwrap();

        // Rotating would break the token, but the identity is already attached.
        pipeline.tokens().rotate_signing_key("other-secret").unwrap();
        assert_eq!(
            pipeline.authenticate(&mut req, AuthMode::Required),
            Ok(Authentication::Authenticated)
        );
    }

    #[test]
    fn role_gate_allows_matching_role() {
        let (pipeline, sink) = pipeline();
        let mut req = request(Some(&format!(
            "Bearer {}",
            token(&pipeline, &["admin", "user"])
        )));
        pipeline.authenticate(&mut req, AuthMode::Required).unwrap();

        assert_eq!(pipeline.authorize(&req, "admin"), Ok(()));
        assert_eq!(
            pipeline.authorize(&req, "superadmin"),
            Err(AuthError::InsufficientPermissions)
        );
        assert!(sink.event_types().contains(&AuthEventType::PermissionGranted));
        assert!(sink.event_types().contains(&AuthEventType::PermissionDenied));
    }

    #[test]
    fn role_gate_without_identity_reports_missing_roles() {
        let (pipeline, _) = pipeline();
        let gate = pipeline.role_gate("admin");
        assert_eq!(gate.role(), "admin");
        assert_eq!(gate.check(&request(None)), Err(AuthError::NoRolesInContext));
    }

    #[test]
    fn role_gate_after_anonymous_optional_reports_missing_roles() {
        let (pipeline, _) = pipeline();
        let mut req = request(None);
        pipeline.authenticate(&mut req, AuthMode::Optional).unwrap();
        assert_eq!(
            pipeline.authorize(&req, "user"),
            Err(AuthError::NoRolesInContext)
        );
    }

    #[test]
    fn pipeline_without_sink_behaves_the_same() {
        let tokens = Arc::new(TokenManager::from_secret("pipeline-secret").unwrap());
        let plain = AuthPipeline::new(tokens);
        let token = plain
            .tokens()
            .issue_token("u1", "alice", &["user".to_string()], Duration::minutes(5))
            .unwrap();

        let mut ok = request(Some(&format!("Bearer {token}")));
        assert_eq!(
            plain.authenticate(&mut ok, AuthMode::Required),
            Ok(Authentication::Authenticated)
        );
        assert_eq!(
            plain.authenticate(&mut request(None), AuthMode::Required),
            Err(AuthError::MissingCredentials)
        );
        assert_eq!(plain.authorize(&ok, "admin"), Err(AuthError::InsufficientPermissions));
    }
}
