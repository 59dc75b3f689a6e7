// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use axum::extract::FromRef;

use crate::auth::{AuthPipeline, EventSink, SecretSource, TokenManager};
use crate::config::AuthSettings;

#[derive(Clone)]
pub struct AppState {
    pub tokens: Arc<TokenManager>,
    pub pipeline: AuthPipeline,
    /// Re-read on key rotation.
    pub secrets: Arc<dyn SecretSource>,
    pub settings: AuthSettings,
}

impl AppState {
    /// Share one token manager between the handlers and the pipeline.
    pub fn new(
        tokens: TokenManager,
        secrets: Arc<dyn SecretSource>,
        settings: AuthSettings,
        events: EventSink,
    ) -> Self {
        let tokens = Arc::new(tokens.with_events(events.clone()));
        let pipeline = AuthPipeline::new(Arc::clone(&tokens)).with_events(events);

        Self {
            tokens,
            pipeline,
            secrets,
            settings,
        }
    }
}

impl FromRef<AppState> for AuthPipeline {
    fn from_ref(state: &AppState) -> Self {
        state.pipeline.clone()
    }
}
