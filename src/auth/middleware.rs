// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication middleware for Axum.
//!
//! Router-subtree adapter over [`AuthPipeline`]: wrap a group of routes with
//! `from_fn_with_state` and every request through them is authenticated (and
//! optionally role-checked) before the handler runs.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let admin = Router::new()
//!     .route("/admin/ping", get(ping))
//!     .route_layer(from_fn_with_state(pipeline.role_gate("admin"), require_role))
//!     .route_layer(from_fn_with_state(pipeline.clone(), require_auth));
//! ```
//!
//! Layers added later run first, so the role gate goes on before the
//! authentication layer.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use super::error::AuthError;
use super::pipeline::{AuthMode, AuthPipeline, RoleGate};

/// Reject with 401 unless the request carries a valid bearer token.
pub async fn require_auth(
    State(pipeline): State<AuthPipeline>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    pipeline.authenticate(&mut request, AuthMode::Required)?;
    Ok(next.run(request).await)
}

/// Attach an identity when a valid bearer token is present; never rejects.
pub async fn optional_auth(
    State(pipeline): State<AuthPipeline>,
    mut request: Request,
    next: Next,
) -> Response {
    // Optional mode has no error path.
    let _ = pipeline.authenticate(&mut request, AuthMode::Optional);
    next.run(request).await
}

/// Reject with 403 unless the attached identity holds the gate's role.
pub async fn require_role(
    State(gate): State<RoleGate>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    gate.check(&request)?;
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{header::AUTHORIZATION, StatusCode},
        middleware::from_fn_with_state,
        routing::get,
        Router,
    };
    use chrono::Duration;
    use tower::ServiceExt;

    use crate::auth::context::IdentityCarrier;
    use crate::auth::token::TokenManager;

    fn pipeline() -> AuthPipeline {
        AuthPipeline::new(Arc::new(TokenManager::from_secret("middleware-secret").unwrap()))
    }

    fn bearer(pipeline: &AuthPipeline, roles: &[&str]) -> String {
        let roles: Vec<String> = roles.iter().map(|s| s.to_string()).collect();
        let token = pipeline
            .tokens()
            .issue_token("u1", "alice", &roles, Duration::minutes(15))
            .unwrap();
        format!("Bearer {token}")
    }

    async fn whoami(request: Request) -> String {
        match request.identity() {
            Some(identity) => identity.subject_id().to_string(),
            None => "anonymous".to_string(),
        }
    }

    fn app(pipeline: &AuthPipeline) -> Router {
        let required = Router::new()
            .route("/required", get(whoami))
            .route_layer(from_fn_with_state(pipeline.clone(), require_auth));
        let optional = Router::new()
            .route("/optional", get(whoami))
            .route_layer(from_fn_with_state(pipeline.clone(), optional_auth));
        let admin = Router::new()
            .route("/admin", get(whoami))
            .route_layer(from_fn_with_state(pipeline.role_gate("admin"), require_role))
            .route_layer(from_fn_with_state(pipeline.clone(), require_auth));
        let gate_only = Router::new()
            .route("/gate-only", get(whoami))
            .route_layer(from_fn_with_state(pipeline.role_gate("admin"), require_role));

        required.merge(optional).merge(admin).merge(gate_only)
    }

    async fn call(app: Router, uri: &str, authorization: Option<&str>) -> (StatusCode, String) {
        let mut builder = axum::http::Request::builder().uri(uri);
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        let response = app
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn required_route_runs_handler_with_identity() {
        let pipeline = pipeline();
        let (status, body) = call(app(&pipeline), "/required", Some(&bearer(&pipeline, &[]))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "u1");
    }

    #[tokio::test]
    async fn required_route_short_circuits_without_token() {
        let pipeline = pipeline();
        let (status, body) = call(app(&pipeline), "/required", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["code"], 401);
        assert_eq!(json["reason"], "missing_credentials");
    }

    #[tokio::test]
    async fn optional_route_passes_anonymous_requests() {
        let pipeline = pipeline();
        for header in [None, Some("garbled"), Some("Bearer garbled")] {
            let (status, body) = call(app(&pipeline), "/optional", header).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body, "anonymous");
        }

        let (status, body) =
            call(app(&pipeline), "/optional", Some(&bearer(&pipeline, &[]))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "u1");
    }

    #[tokio::test]
    async fn role_gate_allows_and_forbids() {
        let pipeline = pipeline();

        let (status, _) = call(
            app(&pipeline),
            "/admin",
            Some(&bearer(&pipeline, &["admin", "user"])),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(app(&pipeline), "/admin", Some(&bearer(&pipeline, &["user"]))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["reason"], "insufficient_permissions");
    }

    #[tokio::test]
    async fn role_gate_without_auth_stage_reports_missing_roles() {
        let pipeline = pipeline();
        let (status, body) = call(
            app(&pipeline),
            "/gate-only",
            Some(&bearer(&pipeline, &["admin"])),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["reason"], "no_roles_in_context");
        assert_eq!(json["error"], "User roles not found in context");
    }

    #[tokio::test]
    async fn unauthenticated_admin_route_is_401_not_403() {
        let pipeline = pipeline();
        let (status, _) = call(app(&pipeline), "/admin", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
