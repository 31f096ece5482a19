//! The `{code, success, message, data}` envelope every HTTP route returns,
//! and the 0-based/1-based position adapter — the one translation point
//! between the query engine's internal [`Range`](crate::types::Range) and
//! the wire format. A real type rather than an inline
//! `axum::Json(serde_json::json!({..}))` per handler, so every route
//! shares one success/error path.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::error::{IndexError, QueryError, StoreError, WorkspaceError};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub code: String,
    pub success: bool,
    pub message: String,
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self { code: "0".into(), success: true, message: "ok".into(), data: Some(data) }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// One variant per surfaced error kind, each carrying the HTTP status
/// class it maps to.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    ServiceUnavailable(String),
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &str {
        match self {
            Self::BadRequest(m) | Self::NotFound(m) | Self::ServiceUnavailable(m) | Self::Internal(m) => m,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ApiResponse::<()> { code: status.as_u16().to_string(), success: false, message: self.message().to_string(), data: None };
        (status, Json(body)).into_response()
    }
}

impl From<WorkspaceError> for ApiError {
    fn from(e: WorkspaceError) -> Self {
        match e {
            WorkspaceError::WorkspaceNotFound { .. } => Self::NotFound(e.to_string()),
            WorkspaceError::SymlinkEscape { .. } => Self::BadRequest(e.to_string()),
            WorkspaceError::Io { .. } => Self::Internal(e.to_string()),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::StoreClosed { .. } => Self::ServiceUnavailable(e.to_string()),
            StoreError::KeyNotFound { .. } | StoreError::InvalidKey { .. } => Self::BadRequest(e.to_string()),
            StoreError::StoreCorruption { .. } | StoreError::Engine(_) | StoreError::Codec(_) | StoreError::Io(_) => {
                Self::Internal(e.to_string())
            }
        }
    }
}

impl From<IndexError> for ApiError {
    fn from(e: IndexError) -> Self {
        match e {
            IndexError::Workspace(inner) => inner.into(),
            IndexError::Store(inner) => inner.into(),
            IndexError::Analyzer(inner) => Self::Internal(inner.to_string()),
            IndexError::ProjectNotIndexed { .. } => Self::NotFound(e.to_string()),
            IndexError::InvalidArgument { .. } => Self::BadRequest(e.to_string()),
            IndexError::Cancelled => Self::Internal(e.to_string()),
            IndexError::InternalError { .. } => Self::Internal(e.to_string()),
        }
    }
}

impl From<QueryError> for ApiError {
    fn from(e: QueryError) -> Self {
        match e {
            QueryError::Store(inner) => inner.into(),
            QueryError::ProjectNotIndexed { .. } => Self::NotFound(e.to_string()),
            QueryError::SymbolNotFound => Self::NotFound(e.to_string()),
            QueryError::InvalidArgument { .. } => Self::BadRequest(e.to_string()),
        }
    }
}

/// One-based, inclusive wire position, the shape every route's JSON uses.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct WirePosition {
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
}

/// The single 0-based to 1-based translation point: internal storage
/// and the query engine are 0-based throughout; every response crosses
/// through here exactly once on the way out.
pub fn to_position(range: crate::types::Range) -> WirePosition {
    WirePosition {
        start_line: range.start_line + 1,
        start_column: range.start_col + 1,
        end_line: range.end_line + 1,
        end_column: range.end_col + 1,
    }
}

/// The inverse translation, applied to 1-based line numbers arriving as
/// query parameters before they reach the 0-based query engine.
pub fn from_line(wire_line: u32) -> u32 {
    wire_line.saturating_sub(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Range;

    #[test]
    fn to_position_adds_one_to_every_field() {
        let pos = to_position(Range::new(9, 4, 14, 1));
        assert_eq!(pos.start_line, 10);
        assert_eq!(pos.start_column, 5);
        assert_eq!(pos.end_line, 15);
        assert_eq!(pos.end_column, 2);
    }

    #[test]
    fn from_line_subtracts_one_and_floors_at_zero() {
        assert_eq!(from_line(1), 0);
        assert_eq!(from_line(0), 0);
    }
}
