// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Admin-only API endpoints.
//!
//! These endpoints require the `admin` role. `/admin/ping` is gated by the
//! role middleware on its route group; key rotation states the role in its
//! handler signature.

use axum::{extract::State, Json};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    auth::{Admin, Auth, Authorized, CurrentIdentity},
    error::ApiError,
    state::AppState,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct PingResponse {
    pub status: String,
    /// Admin who called
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub timestamp: String,
}

/// Admin liveness check.
#[utoipa::path(
    get,
    path = "/v1/admin/ping",
    tag = "Admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Caller is an admin", body = PingResponse),
        (status = 401, description = "Not authenticated", body = crate::auth::AuthErrorBody),
        (status = 403, description = "Not authorized (admin required)", body = crate::auth::AuthErrorBody)
    )
)]
pub async fn ping(CurrentIdentity(identity): CurrentIdentity) -> Json<PingResponse> {
    Json(PingResponse {
        status: "ok".to_string(),
        user_id: identity.map(|i| i.subject_id().to_string()),
        timestamp: Utc::now().to_rfc3339(),
    })
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RotateKeyResponse {
    /// Key id new tokens are signed with
    pub key_id: String,
    /// Key ids still accepted for validation, newest first
    pub accepted_key_ids: Vec<String>,
}

/// Rotate the signing key.
///
/// Re-reads the secret source (the `JWT_SECRET` variable by default) and
/// makes it the active key. Tokens signed with the old key stop validating
/// unless a grace window is configured. On failure the old key stays active.
#[utoipa::path(
    post,
    path = "/v1/admin/keys/rotate",
    tag = "Admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Key rotated", body = RotateKeyResponse),
        (status = 401, description = "Not authenticated", body = crate::auth::AuthErrorBody),
        (status = 403, description = "Not authorized (admin required)", body = crate::auth::AuthErrorBody),
        (status = 503, description = "Secret source has no secret")
    )
)]
pub async fn rotate_key(
    Auth(_caller): Auth,
    Authorized(admin, _role): Authorized<Admin>,
    State(state): State<AppState>,
) -> Result<Json<RotateKeyResponse>, ApiError> {
    let key_id = state.tokens.rotate_from_source(state.secrets.as_ref())?;

    tracing::info!(
        user_id = admin.subject_id(),
        key_id = %key_id,
        "signing key rotated via admin API"
    );

    Ok(Json(RotateKeyResponse {
        key_id,
        accepted_key_ids: state.tokens.key_ids(),
    }))
}
