//! # texvault HTTP API Module
//!
//! This module implements the HTTP REST API server using axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /status` - Index summary
//! - `GET /index` - Full index snapshot
//! - `GET /notes/{slug}/links` - Outgoing links and backlinks of a note
//! - `GET /graph` - Link graph as JSON, or DOT with `?format=dot`
//! - `GET /assets` - Stored attachments
//! - `POST /reindex` - Rebuild the index
//! - `POST /build` - Build every note (`?workers=N` to override the pool)
//! - `POST /build/{slug}` - Build one note
//!
//! ## Configuration (Environment Variables)
//!
//! - `TEXVAULT_CORS_ORIGINS`: Comma-separated list of allowed origins, or "*" for all (default: localhost only)

mod handlers;
mod types;

// Re-export handlers and types for integration tests (via `texvault::api::*`)
pub use handlers::{
    assets_handler, build_all_handler, build_note_handler, graph_handler, health_handler,
    index_handler, links_handler, reindex_handler, status_handler,
};
pub use types::{
    ApiError, BuildRequest, ErrorResponse, GraphQuery, HealthResponse, LinksResponse,
    StatusResponse,
};

use crate::build::{BuildCancel, BuildOrchestrator};
use crate::vault::Vault;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    routing::{get, post},
};
use std::sync::Arc;
use texvault_core::{AssetStore, VaultError};
use tokio::sync::Mutex;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Request bodies are tiny; nothing is uploaded through the API.
const MAX_BODY_BYTES: usize = 64 * 1024;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state.
#[derive(Clone)]
pub struct AppState {
    pub vault: Arc<Vault>,
    pub orchestrator: BuildOrchestrator,
    pub assets: Arc<Mutex<AssetStore>>,
    /// Serializes operations that rewrite the index or the PDFs.
    pub writer: Arc<Mutex<()>>,
    /// Tripped on shutdown so queued build jobs are skipped.
    pub cancel: BuildCancel,
}

impl AppState {
    /// State using the vault's configured compiler.
    #[must_use]
    pub fn new(vault: Vault) -> Self {
        let orchestrator = vault.orchestrator();
        Self::with_orchestrator(vault, orchestrator)
    }

    /// State using a specific orchestrator.
    #[must_use]
    pub fn with_orchestrator(vault: Vault, orchestrator: BuildOrchestrator) -> Self {
        Self {
            assets: Arc::new(Mutex::new(vault.asset_store())),
            vault: Arc::new(vault),
            orchestrator,
            writer: Arc::new(Mutex::new(())),
            cancel: BuildCancel::new(),
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build CORS layer from environment configuration.
///
/// Reads `TEXVAULT_CORS_ORIGINS`:
/// - If "*": allows all origins
/// - If not set: localhost only
/// - Otherwise: comma-separated list of allowed origins
fn build_cors_layer() -> CorsLayer {
    let origins_env = std::env::var("TEXVAULT_CORS_ORIGINS").ok();

    match origins_env.as_deref() {
        Some("*") => {
            tracing::warn!("CORS: allowing ALL origins (TEXVAULT_CORS_ORIGINS=*)");
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| {
                    let trimmed = s.trim();
                    match trimmed.parse::<HeaderValue>() {
                        Ok(hv) => {
                            tracing::info!("CORS: allowing origin: {}", trimmed);
                            Some(hv)
                        }
                        Err(e) => {
                            tracing::warn!("CORS: invalid origin '{}': {}", trimmed, e);
                            None
                        }
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!(
                    "CORS: no valid origins in TEXVAULT_CORS_ORIGINS, defaulting to localhost only"
                );
                build_localhost_cors()
            } else {
                CorsLayer::new()
                    .allow_origin(allowed_origins)
                    .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                    .allow_headers([header::CONTENT_TYPE])
            }
        }
        None => build_localhost_cors(),
    }
}

/// Build a restrictive CORS layer that only allows localhost origins.
fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .iter()
    .filter_map(|o| o.parse::<HeaderValue>().ok())
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner): tracing, CORS, body limit.
pub fn create_router(state: AppState) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES));

    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/status", get(handlers::status_handler))
        .route("/index", get(handlers::index_handler))
        .route("/notes/{slug}/links", get(handlers::links_handler))
        .route("/graph", get(handlers::graph_handler))
        .route("/assets", get(handlers::assets_handler))
        .route("/reindex", post(handlers::reindex_handler))
        .route("/build", post(handlers::build_all_handler))
        .route("/build/{slug}", post(handlers::build_note_handler))
        .layer(middleware)
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Start the HTTP server and run until Ctrl+C.
pub async fn run_server(addr: &str, state: AppState) -> Result<(), VaultError> {
    let cancel = state.cancel.clone();
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| VaultError::io(format!("bind {}", addr), e))?;

    tracing::info!("texvault HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutdown requested");
            }
            cancel.cancel("server shutting down");
        })
        .await
        .map_err(|e| VaultError::io("server error", e))
}
