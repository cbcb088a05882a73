use crate::domain::hls::PlaylistError;
use crate::domain::leads::ConsultationError;
use crate::domain::upload::Rejection;
use crate::ports::media::MediaError;
use crate::ports::queue::QueueError;
use crate::ports::repository::RepoError;
use crate::ports::storage::StorageError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::error::Error as StdError;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Rejected(#[from] Rejection),

    #[error("Invalid consultation: {0}")]
    InvalidConsultation(#[from] ConsultationError),

    #[error("{message}")]
    BadRequest { code: &'static str, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Malformed manifest: {0}")]
    BadManifest(#[from] PlaylistError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepoError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("An unexpected error occurred: {0}")]
    Unexpected(#[from] anyhow::Error),
}

impl AppError {
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        AppError::BadRequest {
            code,
            message: message.into(),
        }
    }

    /// HTTP status and machine-readable reason code.
    pub fn classify(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Rejected(rejection) => {
                let status = match rejection {
                    Rejection::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                    Rejection::CorruptVideo(_) => StatusCode::UNPROCESSABLE_ENTITY,
                    _ => StatusCode::BAD_REQUEST,
                };
                (status, rejection.code())
            }
            AppError::InvalidConsultation(_) => (StatusCode::BAD_REQUEST, "INVALID_CONSULTATION"),
            AppError::BadRequest { code, .. } => (StatusCode::BAD_REQUEST, *code),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::BadManifest(_) => (StatusCode::BAD_GATEWAY, "BAD_MANIFEST"),
            AppError::Storage(e) => match e {
                StorageError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                StorageError::RangeNotSatisfiable(_) => (StatusCode::RANGE_NOT_SATISFIABLE, "RANGE_NOT_SATISFIABLE"),
                StorageError::Unauthorized(_) => (StatusCode::BAD_GATEWAY, "STORAGE_UNAUTHORIZED"),
                StorageError::Upstream { .. } | StorageError::Transport(_) => (StatusCode::BAD_GATEWAY, "STORAGE_ERROR"),
                StorageError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
            },
            AppError::Repository(RepoError::Conflict(_)) => (StatusCode::CONFLICT, "CONFLICT"),
            AppError::Repository(_) => (StatusCode::INTERNAL_SERVER_ERROR, "REPOSITORY_ERROR"),
            AppError::Media(_) => (StatusCode::INTERNAL_SERVER_ERROR, "MEDIA_ERROR"),
            AppError::Queue(_) => (StatusCode::SERVICE_UNAVAILABLE, "QUEUE_UNAVAILABLE"),
            AppError::Unexpected(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.classify();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(code, status_code = %status, error_message = %message, "Request error");

            let mut source_chain = String::new();
            let mut current_err = self.source();
            while let Some(err) = current_err {
                source_chain.push_str(&format!("\n  Caused by: {}", err));
                current_err = err.source();
            }
            if !source_chain.is_empty() {
                tracing::error!("Error source chain:{}", source_chain);
            }
        } else {
            tracing::warn!(code, status_code = %status, error_message = %message, "Request rejected");
        }

        let body = Json(json!({
            "code": code,
            "message": message,
            "status": status.as_u16(),
        }));
        (status, body).into_response()
    }
}
