use axum::http::StatusCode;
use thiserror::Error;

use crate::auth::AuthError;

/// RepoError
///
/// Every failure raised by the persistence layer. Services return these
/// unchanged to the handlers, which report them as 500.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    #[error("{0} already exists")]
    Conflict(String),

    #[error("transaction already finished")]
    Finished,

    /// Failure injected by the in-memory store for a named operation.
    #[error("{0} failed")]
    Injected(String),

    /// The operation failed and rolling the transaction back failed as well.
    #[error("{original}; rollback failed: {rollback}")]
    Rollback {
        original: Box<RepoError>,
        rollback: Box<RepoError>,
    },
}

impl RepoError {
    pub fn not_found(entity: &'static str) -> Self {
        RepoError::NotFound { entity }
    }
}

/// ValidationError
///
/// A request body or fragment that decoded but breaks an entity rule, or did
/// not decode at all.
#[derive(Debug, Error, PartialEq)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl From<serde_json::Error> for ValidationError {
    fn from(err: serde_json::Error) -> Self {
        ValidationError(err.to_string())
    }
}

/// ApiError
///
/// The taxonomy handlers and the dispatcher speak. Each variant owns exactly
/// one status code; the body is the single-line `Display` message.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Malformed or missing query parameter, page out of range, empty result.
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Authentication(#[from] AuthError),

    #[error("this function locked for current user")]
    Locked,

    #[error("this uri not found {0}")]
    RouteNotFound(String),

    #[error("this method not provided")]
    MethodNotAllowed,

    #[error(transparent)]
    Persistence(#[from] RepoError),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Authentication(_) => StatusCode::UNAUTHORIZED,
            ApiError::Locked => StatusCode::LOCKED,
            ApiError::RouteNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Persistence(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Convenience type alias for handler return values.
pub type ApiResult<T> = Result<T, ApiError>;
