// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session endpoints: who am I, an optionally-authenticated greeting, and
//! token refresh.

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    auth::{pipeline::extract_bearer, Auth, AuthError, CurrentIdentity, RequestIdentity},
    config::MAX_REFRESH_TTL_SECS,
    error::ApiError,
    state::AppState,
};

/// Response for GET /v1/me
#[derive(Debug, Serialize, ToSchema)]
pub struct IdentityResponse {
    /// Subject id the token was issued to
    pub user_id: String,
    pub username: String,
    pub roles: Vec<String>,
    /// `jti` of the presented token
    pub token_id: String,
    /// Key the token was signed with
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<&RequestIdentity> for IdentityResponse {
    fn from(identity: &RequestIdentity) -> Self {
        let claims = identity.claims();
        Self {
            user_id: identity.subject_id().to_string(),
            username: identity.display_name().to_string(),
            roles: identity.roles().to_vec(),
            token_id: claims.token_id().to_string(),
            key_id: claims.key_id().map(str::to_string),
            expires_at: claims.expires_at_utc(),
        }
    }
}

/// Get the current authenticated user's information.
///
/// This endpoint returns the identity and roles carried by the bearer token.
#[utoipa::path(
    get,
    path = "/v1/me",
    tag = "Session",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Identity of the caller", body = IdentityResponse),
        (status = 401, description = "Missing, invalid or expired token", body = crate::auth::AuthErrorBody),
    )
)]
pub async fn me(Auth(identity): Auth) -> Json<IdentityResponse> {
    Json(IdentityResponse::from(&identity))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GreetingResponse {
    pub message: String,
    pub authenticated: bool,
}

/// Greeting that is personalised when a valid token is presented.
///
/// Never rejects: an absent or invalid token gets the anonymous greeting.
#[utoipa::path(
    get,
    path = "/v1/greeting",
    tag = "Session",
    security((), ("bearer_auth" = [])),
    responses(
        (status = 200, description = "Greeting", body = GreetingResponse),
    )
)]
pub async fn greeting(CurrentIdentity(identity): CurrentIdentity) -> Json<GreetingResponse> {
    let response = match identity {
        Some(identity) => GreetingResponse {
            message: format!("Hello, {}", identity.display_name()),
            authenticated: true,
        },
        None => GreetingResponse {
            message: "Hello, guest".to_string(),
            authenticated: false,
        },
    };
    Json(response)
}

/// Query parameters for token refresh.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct RefreshParams {
    /// Lifetime of the new token in seconds (1 to 86400). Defaults to the
    /// configured access token lifetime.
    pub ttl_secs: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    /// Always `Bearer`
    pub token_type: String,
    /// Seconds until the new token expires
    pub expires_in: i64,
}

/// Exchange a valid token for a new one with the same identity.
///
/// The new token is signed with the current active key. The old token stays
/// valid until it expires.
#[utoipa::path(
    post,
    path = "/v1/auth/refresh",
    tag = "Session",
    params(RefreshParams),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Refreshed token", body = TokenResponse),
        (status = 400, description = "ttl_secs out of range"),
        (status = 401, description = "Missing, invalid or expired token", body = crate::auth::AuthErrorBody),
        (status = 503, description = "No signing key configured"),
    )
)]
pub async fn refresh(
    State(state): State<AppState>,
    Query(params): Query<RefreshParams>,
    headers: HeaderMap,
) -> Result<Json<TokenResponse>, Response> {
    let token = extract_bearer(&headers).map_err(IntoResponse::into_response)?;

    let ttl = match params.ttl_secs {
        None => state.settings.access_token_ttl,
        Some(secs) if (1..=MAX_REFRESH_TTL_SECS).contains(&secs) => Duration::seconds(secs),
        Some(_) => {
            return Err(ApiError::bad_request(format!(
                "ttl_secs must be between 1 and {MAX_REFRESH_TTL_SECS}"
            ))
            .into_response())
        }
    };

    let access_token = state.tokens.refresh_token(token, ttl).map_err(|err| {
        if err.is_authentication_failure() {
            AuthError::from(err).into_response()
        } else {
            ApiError::from(err).into_response()
        }
    })?;

    Ok(Json(TokenResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: ttl.num_seconds(),
    }))
}
