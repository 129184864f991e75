//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use texvault_core::VaultError;

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// STATUS RESPONSE
// =============================================================================

/// Index summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Whether an index snapshot exists on disk.
    pub indexed: bool,
    pub note_count: usize,
    pub connection_count: usize,
    pub broken_link_count: usize,
    pub orphan_count: usize,
    /// RFC 3339 time of the last reindex.
    pub last_indexed: String,
}

// =============================================================================
// LINKS RESPONSE
// =============================================================================

/// Incoming and outgoing references of one note.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinksResponse {
    pub slug: String,
    pub title: String,
    pub outgoing: BTreeSet<String>,
    pub backlinks: BTreeSet<String>,
    /// Outgoing targets that are not notes.
    pub missing: BTreeSet<String>,
}

// =============================================================================
// GRAPH QUERY
// =============================================================================

/// `GET /graph?format=json|dot`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphQuery {
    pub format: Option<String>,
}

// =============================================================================
// BUILD REQUEST
// =============================================================================

/// Optional body of `POST /build`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildRequest {
    /// Pool size for this batch only.
    pub workers: Option<usize>,
}

// =============================================================================
// ERRORS
// =============================================================================

/// Error body returned by every failing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// A `VaultError` mapped onto an HTTP status.
#[derive(Debug)]
pub struct ApiError(pub VaultError);

impl From<VaultError> for ApiError {
    fn from(err: VaultError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            VaultError::NotFound(_) => StatusCode::NOT_FOUND,
            VaultError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            VaultError::CompileFailure { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            VaultError::Cancelled(_) => StatusCode::SERVICE_UNAVAILABLE,
            VaultError::Io(_) | VaultError::Serialization(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        let body = ErrorResponse {
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
