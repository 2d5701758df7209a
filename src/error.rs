//! Error types for the Virtual Armory.
//!
//! Every fallible operation in the crate returns [`AppError`]. The
//! `IntoResponse` impl is the single place where an error becomes an HTTP
//! response: conflicts and authorization problems are reported to the
//! user, infrastructure failures are logged and hidden behind a generic page.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use thiserror::Error;

use crate::templates;

/// Central error type for all request handling and bootstrap operations.
#[derive(Debug, Error)]
pub enum AppError {
    /// The requested record does not exist or is not owned by the caller.
    #[error("resource not found")]
    NotFound,

    /// Authenticated, but the policy denies the request.
    #[error("forbidden")]
    Forbidden,

    /// The route requires a logged-in user.
    #[error("authentication required")]
    Unauthorized,

    /// A uniqueness constraint was violated.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Embedded migrations failed to apply.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Session store read/write failure.
    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Policy engine failed to build or evaluate.
    #[error("policy engine error: {0}")]
    Policy(String),

    /// Password hashing or verification failed for a reason other than a mismatch.
    #[error("password hashing error: {0}")]
    PasswordHash(String),

    /// Missing or invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Anything else that should never reach the user verbatim.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<casbin::Error> for AppError {
    fn from(err: casbin::Error) -> Self {
        AppError::Policy(err.to_string())
    }
}

impl AppError {
    /// HTTP status used when this error is rendered.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Unauthorized => StatusCode::SEE_OTHER,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Database(_)
            | Self::Migration(_)
            | Self::Session(_)
            | Self::Policy(_)
            | Self::PasswordHash(_)
            | Self::Config(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// True for failures of the infrastructure rather than of the request.
    pub fn is_infrastructure(&self) -> bool {
        self.status_code() == StatusCode::INTERNAL_SERVER_ERROR
    }

    /// User-facing message. Infrastructure details never leak.
    pub fn user_message(&self) -> String {
        match self {
            Self::Conflict(msg) => msg.clone(),
            Self::NotFound => "The page you were looking for does not exist.".to_string(),
            Self::Forbidden => "You do not have permission to access this page.".to_string(),
            Self::Unauthorized => "Please log in to continue.".to_string(),
            _ => "Something went wrong on our side. Please try again later.".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Self::Unauthorized = self {
            return Redirect::to("/login").into_response();
        }

        let status = self.status_code();
        if self.is_infrastructure() {
            tracing::error!(error = %self, status = status.as_u16(), "request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "request rejected");
        }

        templates::error_response(status, &self.user_message())
    }
}

/// Result alias used throughout the crate.
pub type AppResult<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_follows_taxonomy() {
        assert_eq!(AppError::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            AppError::Conflict("dup".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Internal("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn infrastructure_messages_are_generic() {
        let err = AppError::Internal("SELECT * FROM users failed".into());
        assert!(err.is_infrastructure());
        assert!(!err.user_message().contains("SELECT"));

        let err = AppError::Policy("model file unreadable".into());
        assert!(!err.user_message().contains("model"));
    }

    #[test]
    fn conflict_message_is_shown_verbatim() {
        let err = AppError::Conflict("That name is already taken.".into());
        assert!(!err.is_infrastructure());
        assert_eq!(err.user_message(), "That name is already taken.");
    }

    #[test]
    fn unauthorized_redirects_to_login() {
        let response = AppError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()["location"], "/login");
    }

    #[test]
    fn forbidden_renders_error_page() {
        let response = AppError::Forbidden.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
