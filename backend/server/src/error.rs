use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use roster::RosterError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Roster(#[from] RosterError),

    #[error("Database error: {0}")]
    Database(#[from] redis::RedisError),

    #[error("Encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("Environment misconfigured: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MalformedPayload(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Roster(RosterError::Busy(_)) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Roster(RosterError::SourceFormat { .. } | RosterError::Collisions(_)) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::Roster(_)
            | AppError::Database(_)
            | AppError::Encoding(_)
            | AppError::Config(_)
            | AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            error!("{self}");
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::NotFound("User".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::Roster(RosterError::Busy(PathBuf::from("roster.json.lock"))).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::Roster(RosterError::SourceFormat {
                row: 3,
                reason: "expected 8 columns".into(),
            })
            .status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn test_not_found_message() {
        assert_eq!(AppError::NotFound("House".into()).to_string(), "House not found");
    }
}
