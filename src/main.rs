// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{process::ExitCode, sync::Arc};

use identity_gate::{
    api::router,
    auth::{EnvSecretSource, EventSink, TokenManager, TracingSink},
    config::{AuthSettings, LogFormat, ServerSettings},
    logging,
    state::AppState,
};

#[tokio::main]
async fn main() -> ExitCode {
    logging::init(LogFormat::from_env());

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "server failed to start");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let settings = AuthSettings::from_env()?;
    let server = ServerSettings::from_env()?;

    // Fails closed: no secret, no server.
    let secrets = Arc::new(EnvSecretSource::default());
    let tokens = TokenManager::from_source(&*secrets, &settings.key_id, settings.retained_keys)?;

    tracing::info!(
        key_id = %tokens.active_key_id(),
        retained_keys = settings.retained_keys,
        access_token_ttl_secs = settings.access_token_ttl.num_seconds(),
        "token manager ready"
    );

    let state = AppState::new(tokens, secrets, settings, EventSink::new(Arc::new(TracingSink)));
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(server.addr).await?;
    tracing::info!(addr = %server.addr, "Identity Gate listening (OpenAPI at /api-doc/openapi.json)");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
