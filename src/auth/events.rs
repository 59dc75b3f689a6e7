// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Audit events for token issuance, validation, rotation and role checks.
//!
//! Events go to an optional [`AuthEventSink`]. Recording is best-effort: a
//! sink cannot fail the caller, and with no sink attached the token manager
//! and pipeline behave exactly the same.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Types of auditable events.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuthEventType {
    // Token manager events
    TokenIssued,
    TokenValidated,
    TokenRejected,
    KeyIdMismatch,
    KeyRotated,

    // Pipeline events
    AuthSuccess,
    AuthFailure,
    PermissionGranted,
    PermissionDenied,
}

impl AuthEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthEventType::TokenIssued => "token_issued",
            AuthEventType::TokenValidated => "token_validated",
            AuthEventType::TokenRejected => "token_rejected",
            AuthEventType::KeyIdMismatch => "key_id_mismatch",
            AuthEventType::KeyRotated => "key_rotated",
            AuthEventType::AuthSuccess => "auth_success",
            AuthEventType::AuthFailure => "auth_failure",
            AuthEventType::PermissionGranted => "permission_granted",
            AuthEventType::PermissionDenied => "permission_denied",
        }
    }
}

/// An audit event.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthEvent {
    /// Unique event ID.
    pub event_id: String,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// Type of event.
    pub event_type: AuthEventType,
    /// Subject of the token (if known).
    pub user_id: Option<String>,
    /// Username of the token (if known).
    pub username: Option<String>,
    /// Token id (`jti`) involved.
    pub token_id: Option<String>,
    /// Key id involved.
    pub key_id: Option<String>,
    /// Stable machine-readable reason for failures.
    pub reason: Option<String>,
    /// Additional details as JSON.
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
    /// Whether the operation succeeded.
    pub success: bool,
}

impl AuthEvent {
    /// Create a new, successful event.
    pub fn new(event_type: AuthEventType) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type,
            user_id: None,
            username: None,
            token_id: None,
            key_id: None,
            reason: None,
            details: None,
            success: true,
        }
    }

    /// Set the user ID and username.
    pub fn with_user(mut self, user_id: impl Into<String>, username: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self.username = Some(username.into());
        self
    }

    /// Set the token id.
    pub fn with_token(mut self, token_id: impl Into<String>) -> Self {
        self.token_id = Some(token_id.into());
        self
    }

    /// Set the key id.
    pub fn with_key(mut self, key_id: impl Into<String>) -> Self {
        self.key_id = Some(key_id.into());
        self
    }

    /// Add details.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Mark as failed with a reason code.
    pub fn failed(mut self, reason: impl Into<String>) -> Self {
        self.success = false;
        self.reason = Some(reason.into());
        self
    }
}

/// Receiver of audit events (metrics exporter, tracing collector, ...).
pub trait AuthEventSink: Send + Sync {
    fn record(&self, event: &AuthEvent);
}

/// Sink that writes each event as a structured `tracing` record on the
/// `audit` target. Successes log at `info`, failures at `warn`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl AuthEventSink for TracingSink {
    fn record(&self, event: &AuthEvent) {
        let details = event
            .details
            .as_ref()
            .map(|d| d.to_string())
            .unwrap_or_default();

        if event.success {
            tracing::info!(
                target: "audit",
                event_id = %event.event_id,
                event_type = event.event_type.as_str(),
                user_id = event.user_id.as_deref().unwrap_or("-"),
                username = event.username.as_deref().unwrap_or("-"),
                token_id = event.token_id.as_deref().unwrap_or("-"),
                key_id = event.key_id.as_deref().unwrap_or("-"),
                details = %details,
                "auth event"
            );
        } else {
            tracing::warn!(
                target: "audit",
                event_id = %event.event_id,
                event_type = event.event_type.as_str(),
                user_id = event.user_id.as_deref().unwrap_or("-"),
                key_id = event.key_id.as_deref().unwrap_or("-"),
                reason = event.reason.as_deref().unwrap_or("-"),
                details = %details,
                "auth event"
            );
        }
    }
}

/// Sink that keeps events in memory, for diagnostics and tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<AuthEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded events, oldest first.
    pub fn events(&self) -> Vec<AuthEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Recorded event types, oldest first.
    pub fn event_types(&self) -> Vec<AuthEventType> {
        self.events().iter().map(|e| e.event_type).collect()
    }
}

impl AuthEventSink for MemorySink {
    fn record(&self, event: &AuthEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
    }
}

/// Optional sink handle shared by the token manager and the pipeline.
///
/// Events are built lazily, so an absent sink costs nothing.
#[derive(Clone, Default)]
pub struct EventSink(Option<Arc<dyn AuthEventSink>>);

impl EventSink {
    pub fn new(sink: Arc<dyn AuthEventSink>) -> Self {
        Self(Some(sink))
    }

    pub fn none() -> Self {
        Self(None)
    }

    pub fn is_attached(&self) -> bool {
        self.0.is_some()
    }

    pub fn emit(&self, build: impl FnOnce() -> AuthEvent) {
        if let Some(sink) = &self.0 {
            sink.record(&build());
        }
    }
}

impl std::fmt::Debug for EventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("EventSink")
            .field(&if self.is_attached() { "attached" } else { "none" })
            .finish()
    }
}
