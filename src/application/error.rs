use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::application::repos::RepoError;
use crate::domain::error::DomainError;
use crate::infra::auth::AuthError;
use crate::infra::error::InfraError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("caller is not the claimed user")]
    Unauthorized,
    #[error("caller may not modify this resource")]
    Forbidden,
    #[error("resource not found")]
    NotFound,
    #[error("conflicting concurrent write: {0}")]
    Conflict(String),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Infra(#[from] InfraError),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::Domain(DomainError::Validation { .. }) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound
            | AppError::Domain(DomainError::NotFound { .. })
            | AppError::Repo(RepoError::NotFound) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) | AppError::Repo(RepoError::Duplicate { .. }) => {
                StatusCode::CONFLICT
            }
            AppError::Repo(RepoError::InvalidInput { .. }) => StatusCode::BAD_REQUEST,
            AppError::Repo(RepoError::Persistence(_)) | AppError::Repo(RepoError::Timeout) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::Domain(DomainError::Invariant { .. }) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Infra(InfraError::Database { .. }) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Infra(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The message shown to callers. Internal causes are logged, never
    /// exposed.
    fn presentation_message(&self) -> &'static str {
        match self {
            AppError::Validation(_) | AppError::Domain(DomainError::Validation { .. }) => {
                "Request could not be processed"
            }
            AppError::Unauthorized => "Unauthorized user",
            AppError::Forbidden => "You do not own this resource",
            AppError::NotFound
            | AppError::Domain(DomainError::NotFound { .. })
            | AppError::Repo(RepoError::NotFound) => "Resource not found",
            AppError::Conflict(_) | AppError::Repo(RepoError::Duplicate { .. }) => {
                "Conflicting update, please retry"
            }
            AppError::Repo(_) | AppError::Infra(InfraError::Database { .. }) => {
                "Service temporarily unavailable"
            }
            AppError::Domain(DomainError::Invariant { .. }) | AppError::Infra(_) => {
                "Unexpected error occurred"
            }
        }
    }
}

impl From<AuthError> for AppError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::InvalidToken(_) => AppError::Unauthorized,
            AuthError::Provider(message) => AppError::Infra(InfraError::upstream(message)),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.presentation_message();
        tracing::error!(error = %self, status = %status, "request failed");
        (status, message).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(
            AppError::validation("bad").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Unauthorized.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AppError::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::Repo(RepoError::Timeout).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn internal_cause_is_not_exposed() {
        let error = AppError::Repo(RepoError::Persistence(
            "connection refused at 10.0.0.3:5432".to_string(),
        ));
        assert_eq!(error.presentation_message(), "Service temporarily unavailable");
    }
}
