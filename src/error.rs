use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Error taxonomy for the whole API. Handlers and repos translate store or
/// client failures into one of these at their own boundary.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Missing or malformed input.
    #[error("{0}")]
    Validation(String),

    /// Missing, invalid or expired credentials.
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated but not permitted.
    #[error("{0}")]
    Forbidden(String),

    /// Entity absent.
    #[error("{0}")]
    NotFound(String),

    /// Duplicate unique constraint (email in use, already in collection).
    #[error("{0}")]
    Conflict(String),

    /// Client exceeded a request quota (login throttling).
    #[error("{0}")]
    RateLimited(String),

    /// Third-party captcha/mail/storage failure.
    #[error("upstream service error: {0}")]
    Upstream(String),

    /// Unexpected store failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Anything else unexpected.
    #[error(transparent)]
    Internal(anyhow::Error),
}

/// Repos return `anyhow::Result`; store failures are routed to the
/// `Database` arm here so the `RowNotFound` mapping applies to them.
impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        match e.downcast::<sqlx::Error>() {
            Ok(db) => ApiError::Database(db),
            Err(other) => ApiError::Internal(other),
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Database(sqlx::Error::RowNotFound) => StatusCode::NOT_FOUND,
            ApiError::Upstream(_) | ApiError::Database(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Store and internal failures are logged in full but never leak
        // details to the client.
        let message = match &self {
            ApiError::Database(sqlx::Error::RowNotFound) => "not found".to_string(),
            ApiError::Database(e) => {
                tracing::error!(error = %e, "database error");
                "internal server error".to_string()
            }
            ApiError::Internal(e) => {
                tracing::error!(error = %e, "internal error");
                "internal server error".to_string()
            }
            ApiError::Upstream(e) => {
                tracing::error!(error = %e, "upstream error");
                "upstream service unavailable".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_match_taxonomy() {
        assert_eq!(
            ApiError::Validation("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Unauthorized("x".into()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::Forbidden("x".into()).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(ApiError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Conflict("x".into()).status(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::Upstream("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::Database(sqlx::Error::RowNotFound).status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn anyhow_wrapped_store_errors_become_database() {
        let err = ApiError::from(anyhow::Error::from(sqlx::Error::RowNotFound));
        assert!(matches!(err, ApiError::Database(sqlx::Error::RowNotFound)));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let err = ApiError::from(anyhow::Error::from(sqlx::Error::PoolClosed));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let err = ApiError::from(anyhow::anyhow!("not a store failure"));
        assert!(matches!(err, ApiError::Internal(_)));
    }

    #[test]
    fn internal_errors_do_not_leak() {
        let resp = ApiError::Internal(anyhow::anyhow!("secret detail")).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
