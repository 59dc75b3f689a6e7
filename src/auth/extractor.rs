// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for authenticated users.
//!
//! Handler-signature adapter over [`AuthPipeline`]. Use `Auth` in handlers to
//! require authentication:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(identity): Auth) -> impl IntoResponse {
//!     // identity is RequestIdentity
//! }
//! ```
//!
//! `Auth` and `OptionalAuth` run the pipeline themselves when no middleware
//! did, so they need `AuthPipeline: FromRef<S>` on the router state.
//! `CurrentIdentity` and `Authorized` only read what an earlier stage
//! attached.

use std::convert::Infallible;
use std::marker::PhantomData;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};

use super::context::{IdentityCarrier, RequestIdentity};
use super::error::AuthError;
use super::pipeline::{AuthMode, AuthPipeline};
use super::roles::RequiredRole;

/// Extractor for authenticated users. Rejects with 401.
///
/// # Example
///
/// ```rust,ignore
/// async fn me(Auth(identity): Auth) -> Json<IdentityResponse> {
///     Json(IdentityResponse::from(&identity))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Auth(pub RequestIdentity);

impl<S> FromRequestParts<S> for Auth
where
    AuthPipeline: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        AuthPipeline::from_ref(state).authenticate(parts, AuthMode::Required)?;

        parts
            .identity()
            .cloned()
            .map(Auth)
            .ok_or(AuthError::MissingCredentials)
    }
}

/// Optional authentication extractor.
///
/// `None` when no valid token is present, instead of rejecting.
#[derive(Debug, Clone)]
pub struct OptionalAuth(pub Option<RequestIdentity>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    AuthPipeline: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // Optional mode has no error path.
        let _ = AuthPipeline::from_ref(state).authenticate(parts, AuthMode::Optional);
        Ok(OptionalAuth(parts.identity().cloned()))
    }
}

/// Identity attached by middleware, if any. Never runs the pipeline.
#[derive(Debug, Clone)]
pub struct CurrentIdentity(pub Option<RequestIdentity>);

impl<S> FromRequestParts<S> for CurrentIdentity
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(CurrentIdentity(parts.identity().cloned()))
    }
}

/// Extractor that requires a specific role.
///
/// Reads the identity attached by `Auth` or the auth middleware, so it must
/// come after one of them.
///
/// # Example
///
/// ```rust,ignore
/// async fn rotate(
///     Auth(_): Auth,
///     Authorized(admin, _): Authorized<Admin>,
/// ) -> impl IntoResponse {
///     // Only admins can reach here
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Authorized<R: RequiredRole>(pub RequestIdentity, pub PhantomData<R>);

impl<R, S> FromRequestParts<S> for Authorized<R>
where
    R: RequiredRole,
    AuthPipeline: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        AuthPipeline::from_ref(state).authorize(parts, R::NAME)?;

        parts
            .identity()
            .cloned()
            .map(|identity| Authorized(identity, PhantomData))
            .ok_or(AuthError::NoRolesInContext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::http::{header::AUTHORIZATION, Request};
    use chrono::Duration;

    use crate::auth::roles::Admin;
    use crate::auth::token::TokenManager;

    fn pipeline() -> AuthPipeline {
        AuthPipeline::new(Arc::new(TokenManager::from_secret("extractor-secret").unwrap()))
    }

    fn parts(authorization: Option<String>) -> Parts {
        let mut builder = Request::builder().uri("/test");
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    fn bearer(pipeline: &AuthPipeline, user_id: &str, roles: &[&str]) -> Option<String> {
        let roles: Vec<String> = roles.iter().map(|s| s.to_string()).collect();
        let token = pipeline
            .tokens()
            .issue_token(user_id, "alice", &roles, Duration::minutes(5))
            .unwrap();
        Some(format!("Bearer {token}"))
    }

    #[tokio::test]
    async fn auth_extractor_requires_auth_header() {
        let pipeline = pipeline();
        let mut parts = parts(None);

        let result = Auth::from_request_parts(&mut parts, &pipeline).await;
        assert!(matches!(result, Err(AuthError::MissingCredentials)));
    }

    #[tokio::test]
    async fn auth_extractor_succeeds_with_jwt() {
        let pipeline = pipeline();
        let mut parts = parts(bearer(&pipeline, "user_123", &["user"]));

        let Auth(identity) = Auth::from_request_parts(&mut parts, &pipeline).await.unwrap();
        assert_eq!(identity.subject_id(), "user_123");
        assert_eq!(identity.roles(), &["user".to_string()]);

        // Attached for later extractors.
        assert_eq!(parts.identity().unwrap().subject_id(), "user_123");
    }

    #[tokio::test]
    async fn auth_extractor_rejects_token_from_other_secret() {
        let pipeline = pipeline();
        let foreign = AuthPipeline::new(Arc::new(TokenManager::from_secret("other").unwrap()));
        let mut parts = parts(bearer(&foreign, "user_123", &[]));

        let result = Auth::from_request_parts(&mut parts, &pipeline).await;
        assert!(matches!(result, Err(AuthError::InvalidToken(_))));
        assert!(parts.identity().is_none());
    }

    #[tokio::test]
    async fn auth_extractor_prefers_extensions() {
        let pipeline = pipeline();
        let mut parts = parts(bearer(&pipeline, "from_middleware", &[]));
        pipeline.authenticate(&mut parts, AuthMode::Required).unwrap();

        // Header swapped after the middleware ran; the attached identity wins.
        parts
            .headers
            .insert(AUTHORIZATION, "Bearer garbage".parse().unwrap());

        let Auth(identity) = Auth::from_request_parts(&mut parts, &pipeline).await.unwrap();
        assert_eq!(identity.subject_id(), "from_middleware");
    }

    #[tokio::test]
    async fn optional_auth_never_rejects() {
        let pipeline = pipeline();

        let mut anonymous = parts(Some("Basic abc".to_string()));
        let OptionalAuth(identity) = OptionalAuth::from_request_parts(&mut anonymous, &pipeline)
            .await
            .unwrap();
        assert!(identity.is_none());

        let mut authenticated = parts(bearer(&pipeline, "u1", &[]));
        let OptionalAuth(identity) =
            OptionalAuth::from_request_parts(&mut authenticated, &pipeline)
                .await
                .unwrap();
        assert_eq!(identity.unwrap().subject_id(), "u1");
    }

    #[tokio::test]
    async fn current_identity_does_not_validate() {
        let pipeline = pipeline();
        let mut parts = parts(bearer(&pipeline, "u1", &[]));

        let CurrentIdentity(identity) = CurrentIdentity::from_request_parts(&mut parts, &pipeline)
            .await
            .unwrap();
        assert!(identity.is_none());
    }

    #[tokio::test]
    async fn authorized_requires_prior_authentication() {
        let pipeline = pipeline();
        let mut parts = parts(bearer(&pipeline, "u1", &["admin"]));

        let result = Authorized::<Admin>::from_request_parts(&mut parts, &pipeline).await;
        assert!(matches!(result, Err(AuthError::NoRolesInContext)));
    }

    #[tokio::test]
    async fn authorized_checks_role() {
        let pipeline = pipeline();

        let mut admin = parts(bearer(&pipeline, "u1", &["admin"]));
        Auth::from_request_parts(&mut admin, &pipeline).await.unwrap();
        let Authorized(identity, _) = Authorized::<Admin>::from_request_parts(&mut admin, &pipeline)
            .await
            .unwrap();
        assert_eq!(identity.subject_id(), "u1");

        let mut user = parts(bearer(&pipeline, "u2", &["Admin", "user"]));
        Auth::from_request_parts(&mut user, &pipeline).await.unwrap();
        let result = Authorized::<Admin>::from_request_parts(&mut user, &pipeline).await;
        assert!(matches!(result, Err(AuthError::InsufficientPermissions)));
    }
}
