//! HTTP service adapter
//!
//! Translates the REST surface into record-store calls. All API routes
//! live under the `/-/` prefix and are gated by a shared bearer token;
//! everything else optionally serves a built frontend from the configured
//! static directory, falling back to its `index.html` so client-side
//! routes resolve.
//!
//! The adapter owns no storage state: a [`Database`] handle is injected
//! at router construction and shared through axum state.

mod auth;
mod handlers;

use std::sync::Arc;

use anyhow::{anyhow, Result};
use axum::routing::{get, post};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::ScratchConfig;
use crate::database::Database;

/// Shared server state
#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) db: Arc<Database>,
    pub(crate) token: String,
}

/// Create the service router
pub fn create_router(db: Arc<Database>, config: &ScratchConfig) -> Router {
    let state = AppState {
        db,
        token: config.token.clone(),
    };

    let mut router = Router::new()
        .route("/-/verify", get(auth::verify))
        .route("/-/notes", get(handlers::list))
        .route("/-/note", post(handlers::create))
        .route(
            "/-/note/:id",
            get(handlers::get_one)
                .put(handlers::update)
                .delete(handlers::delete_one),
        )
        .with_state(state);

    if let Some(dir) = config.static_dir.as_deref() {
        let index = format!("{}/index.html", dir.trim_end_matches('/'));
        router = router
            .fallback_service(ServeDir::new(dir).not_found_service(ServeFile::new(index)));
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new())
}

/// Start the HTTP server and block until shutdown
///
/// Binds the configured listen address and serves until SIGINT, then
/// drains in-flight requests before returning.
pub async fn start_server(db: Arc<Database>, config: &ScratchConfig) -> Result<()> {
    let router = create_router(db, config);
    let addr = config.listen_addr();

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow!("Failed to bind {}: {}", addr, e))?;

    info!("Listening at {}", config.url);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow!("Server error: {}", e))?;

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::warn!("Shutting down...");
    }
}
