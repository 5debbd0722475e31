use axum::http::StatusCode;
use thiserror::Error;

/// Error taxonomy shared by every service layer.
///
/// Validation and Denied carry user-facing text; Db and Pool never leak
/// their detail past the log line written where they occur.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Denied(String),

    #[error("not found")]
    NotFound,

    #[error("database error: {0}")]
    Db(#[from] diesel::result::Error),

    #[error("connection pool error: {0}")]
    Pool(String),
}

impl ServiceError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn denied(msg: impl Into<String>) -> Self {
        Self::Denied(msg.into())
    }
}

impl From<diesel::r2d2::PoolError> for ServiceError {
    fn from(e: diesel::r2d2::PoolError) -> Self {
        Self::Pool(e.to_string())
    }
}

/// Maps a service error to the tuple the handlers return.
pub fn http(e: ServiceError) -> (StatusCode, String) {
    match e {
        ServiceError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
        ServiceError::Denied(msg) => (StatusCode::FORBIDDEN, msg),
        ServiceError::NotFound => (StatusCode::NOT_FOUND, "not found".to_string()),
        ServiceError::Db(e) => {
            log::error!("database error: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal error".to_string(),
            )
        }
        ServiceError::Pool(e) => {
            log::error!("connection pool error: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal error".to_string(),
            )
        }
    }
}
