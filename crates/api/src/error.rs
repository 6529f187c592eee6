//! The ingress error contract.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use gantry_engine::EngineError;
use gantry_storage::StorageError;
use thiserror::Error;

/// API-surface errors mapped onto the status-code contract. Messages are
/// sanitized: no stack frames or backend internals cross the API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// 400 — malformed request, invalid graph, invalid node config.
    #[error("{0}")]
    Validation(String),

    /// 401 — webhook signature missing, invalid, or stale.
    #[error("signature verification failed")]
    Unauthorized,

    /// 404 — the addressed entity does not exist for this tenant.
    #[error("{0}")]
    NotFound(String),

    /// 409 — the operation conflicts with the entity's state.
    #[error("{0}")]
    Conflict(String),

    /// 410 — the run was cancelled.
    #[error("{0}")]
    Gone(String),

    /// 500 — anything else.
    #[error("internal error")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Gone(_) => StatusCode::GONE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Internal(detail) = &self {
            tracing::error!(detail, "internal error");
        }
        let status = self.status();
        let body = Json(serde_json::json!({"error": self.to_string()}));
        (status, body).into_response()
    }
}

impl From<EngineError> for ApiError {
    fn from(error: EngineError) -> Self {
        match error {
            EngineError::NoWorkflowForNode(node) => {
                Self::NotFound(format!("no published workflow contains node {node}"))
            }
            EngineError::UnknownNodeType(t) => {
                Self::Validation(format!("unknown node type {t:?}"))
            }
            EngineError::RunNotFound(id) => Self::NotFound(format!("run not found: {id}")),
            EngineError::Graph(e) => Self::Validation(e.to_string()),
            // Operations against a cancelled run are gone, not merely in
            // conflict.
            EngineError::Execution(gantry_execution::ExecutionError::InvalidTransition {
                ref from,
                ..
            }) if from == "cancelled" => Self::Gone("run is cancelled".into()),
            EngineError::Execution(e) => Self::Conflict(e.to_string()),
            EngineError::Storage(e) => e.into(),
            EngineError::Events(e) => Self::Internal(e.to_string()),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::WorkflowNotFound(_)
            | StorageError::ExecutionNotFound(_)
            | StorageError::ScheduledEventNotFound(_) => Self::NotFound(error.to_string()),
            StorageError::VersionConflict { .. } => Self::Conflict(error.to_string()),
            StorageError::Backend(detail) => Self::Internal(detail),
        }
    }
}
