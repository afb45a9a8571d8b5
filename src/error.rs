use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed or semantically invalid request input.
    #[error("Validation error: {0}")]
    Validation(String),
    /// Operation not allowed in the session's current lifecycle state.
    #[error("Session state error: {0}")]
    SessionState(String),
    /// Required configuration (global settings row) is missing or incomplete.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// Scoring inputs could not be loaded in time; the scan was rejected
    /// rather than stored unscored.
    #[error("Scoring unavailable: {0}")]
    ScoringUnavailable(String),
    /// Event-store write failed past the retry budget; the scan is queued
    /// for reconciliation.
    #[error("Persistence error: {0}")]
    Persistence(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable code carried in the error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation",
            AppError::SessionState(_) => "session_state",
            AppError::Configuration(_) => "configuration",
            AppError::ScoringUnavailable(_) => "scoring_unavailable",
            AppError::Persistence(_) => "persistence",
            AppError::NotFound(_) => "not_found",
            AppError::Internal(_) => "internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::SessionState(_) => StatusCode::CONFLICT,
            AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ScoringUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Persistence(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<crate::settings::SettingsError> for AppError {
    fn from(err: crate::settings::SettingsError) -> Self {
        use crate::settings::SettingsError;
        match err {
            SettingsError::MissingGlobal | SettingsError::IncompleteGlobal(_) => {
                AppError::Configuration(err.to_string())
            }
            SettingsError::Storage(e) => AppError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({
            "success": false,
            "error": self.code(),
            "message": self.to_string(),
        }));

        (status, body).into_response()
    }
}
