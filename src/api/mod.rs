// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Json, Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::{
    auth::{
        middleware::{optional_auth, require_auth, require_role},
        AuthErrorBody, ADMIN_ROLE,
    },
    state::AppState,
};

pub mod admin;
pub mod health;
pub mod session;

pub fn router(state: AppState) -> Router {
    let pipeline = state.pipeline.clone();

    // Later route layers run first: authenticate, then check the role.
    let admin_routes = Router::new()
        .route("/admin/ping", get(admin::ping))
        .route_layer(from_fn_with_state(pipeline.role_gate(ADMIN_ROLE), require_role))
        .route_layer(from_fn_with_state(pipeline.clone(), require_auth));

    let refresh_routes = Router::new()
        .route("/auth/refresh", post(session::refresh))
        .route_layer(from_fn_with_state(pipeline.clone(), require_auth));

    let public_routes = Router::new()
        .route("/greeting", get(session::greeting))
        .route_layer(from_fn_with_state(pipeline, optional_auth));

    let v1_routes = Router::new()
        .route("/me", get(session::me))
        .route("/admin/keys/rotate", post(admin::rotate_key))
        .merge(admin_routes)
        .merge(refresh_routes)
        .merge(public_routes);

    Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .route("/api-doc/openapi.json", get(openapi_json))
        .nest("/v1", v1_routes)
        .with_state(state)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        health::readiness,
        session::me,
        session::greeting,
        session::refresh,
        admin::ping,
        admin::rotate_key
    ),
    components(
        schemas(
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse,
            session::IdentityResponse,
            session::GreetingResponse,
            session::TokenResponse,
            admin::PingResponse,
            admin::RotateKeyResponse,
            AuthErrorBody
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness and readiness"),
        (name = "Session", description = "Caller identity and token refresh"),
        (name = "Admin", description = "Administrative operations (admin role)")
    )
)]
pub struct ApiDoc;
