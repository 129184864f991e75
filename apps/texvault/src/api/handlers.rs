//! # API Endpoint Handlers
//!
//! This module implements the actual HTTP endpoint handlers.
//!
//! Index and preprocessing work is synchronous file I/O and runs on the
//! blocking pool; compilation is awaited directly.

use super::{
    AppState,
    types::{ApiError, BuildRequest, GraphQuery, HealthResponse, LinksResponse, StatusResponse},
};
use crate::build::{BatchReport, BuildResult};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use texvault_core::{Asset, GraphView, Index, IndexStats, VaultError};

/// Run synchronous vault work off the async runtime.
async fn blocking<T, F>(work: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, VaultError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApiError(VaultError::Io(format!("background task failed: {}", e))))?
        .map_err(ApiError)
}

async fn load_index(state: &AppState) -> Result<Index, ApiError> {
    let indexer = state.vault.indexer();
    blocking(move || indexer.load_index()).await
}

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// INDEX HANDLERS
// =============================================================================

/// Index summary.
pub async fn status_handler(State(state): State<AppState>) -> Result<Json<StatusResponse>, ApiError> {
    let indexed = state.vault.indexer().index_exists();
    let index = load_index(&state).await?;

    Ok(Json(StatusResponse {
        indexed,
        note_count: index.note_count(),
        connection_count: index.connection_count(),
        broken_link_count: index.broken_link_count(),
        orphan_count: index.orphans().len(),
        last_indexed: index.last_indexed.to_rfc3339(),
    }))
}

/// The full persisted index.
pub async fn index_handler(State(state): State<AppState>) -> Result<Json<Index>, ApiError> {
    Ok(Json(load_index(&state).await?))
}

/// Links and backlinks of one note.
pub async fn links_handler(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<LinksResponse>, ApiError> {
    let index = load_index(&state).await?;
    let entry = index
        .notes
        .get(&slug)
        .ok_or_else(|| ApiError(VaultError::NotFound(format!("note '{}'", slug))))?;

    let missing = entry
        .outgoing_links
        .iter()
        .filter(|t| !index.notes.contains_key(*t))
        .cloned()
        .collect();

    Ok(Json(LinksResponse {
        title: entry.title.clone(),
        outgoing: entry.outgoing_links.clone(),
        backlinks: entry.backlinks.clone(),
        missing,
        slug,
    }))
}

/// The link graph as JSON, or Graphviz DOT.
pub async fn graph_handler(
    State(state): State<AppState>,
    Query(query): Query<GraphQuery>,
) -> Result<Response, ApiError> {
    let index = load_index(&state).await?;
    let view = GraphView::from_index(&index);

    match query.format.as_deref().unwrap_or("json") {
        "json" => Ok(Json(view).into_response()),
        "dot" => Ok(([(header::CONTENT_TYPE, "text/vnd.graphviz")], view.to_dot()).into_response()),
        other => Err(ApiError(VaultError::InvalidInput(format!(
            "unknown graph format '{}' (expected json or dot)",
            other
        )))),
    }
}

/// Rebuild the index.
pub async fn reindex_handler(State(state): State<AppState>) -> Result<Json<IndexStats>, ApiError> {
    let _writer = state.writer.lock().await;
    let indexer = state.vault.indexer();
    Ok(Json(blocking(move || indexer.reindex()).await?))
}

// =============================================================================
// BUILD HANDLERS
// =============================================================================

/// Build every note.
pub async fn build_all_handler(
    State(state): State<AppState>,
    Query(request): Query<BuildRequest>,
) -> Result<Json<BatchReport>, ApiError> {
    let orchestrator = match request.workers {
        Some(0) => {
            return Err(ApiError(VaultError::InvalidInput(
                "workers must be at least 1".to_string(),
            )));
        }
        Some(workers) => state.orchestrator.clone().with_workers(workers),
        None => state.orchestrator.clone(),
    };

    let _writer = state.writer.lock().await;
    let report = orchestrator.build_all(&state.cancel).await?;
    Ok(Json(report))
}

/// Build one note. The result body is returned for failures too.
pub async fn build_note_handler(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<(StatusCode, Json<BuildResult>), ApiError> {
    if !state.vault.repository().exists(&slug) {
        return Err(ApiError(VaultError::NotFound(format!("note '{}'", slug))));
    }

    let _writer = state.writer.lock().await;
    let result = state.orchestrator.build_one(&slug).await;
    let status = if result.success {
        StatusCode::OK
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };
    Ok((status, Json(result)))
}

// =============================================================================
// ASSET HANDLER
// =============================================================================

/// Stored attachments.
pub async fn assets_handler(State(state): State<AppState>) -> Result<Json<Vec<Asset>>, ApiError> {
    let mut store = state.assets.lock().await;
    Ok(Json(store.list()?))
}
