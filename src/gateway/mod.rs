pub mod auth;
pub mod handlers;
pub mod state;
pub mod types;

use anyhow::Context;
use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::config::GatewayConfig;
use auth::jwt_auth_middleware;
use state::AppState;

/// Build the HTTP router
///
/// `/health` is public; everything under `/api/v1` requires a bearer token.
pub fn router(state: Arc<AppState>) -> Router {
    let private_routes = Router::new()
        .route(
            "/accounts/{account_id}/transfers",
            post(handlers::create_transfer),
        )
        .route(
            "/accounts/{account_id}/transactions",
            get(handlers::list_transactions),
        )
        .route(
            "/transactions/{transaction_id}",
            get(handlers::get_transaction),
        )
        .layer(from_fn_with_state(state.clone(), jwt_auth_middleware));

    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api/v1", private_routes)
        .with_state(state)
}

/// Start HTTP Gateway server; returns after Ctrl-C
pub async fn run_server(config: &GatewayConfig, state: Arc<AppState>) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(%addr, "Gateway listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Gateway server error")?;

    tracing::info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
