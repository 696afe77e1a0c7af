use std::time::Duration;
use thiserror::Error;

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{kind} {key} doesn't exist")]
    NotFound { kind: &'static str, key: String },

    #[error("invalid input: {0}")]
    BadInput(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("environment endpoint {endpoint} not ready after {timeout:?}")]
    NotReady { endpoint: String, timeout: Duration },

    #[error("container runtime error: {0}")]
    Runtime(String),

    #[error("environment API error: {0}")]
    EnvironmentApi(String),

    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("metadata error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ServiceError {
    pub fn not_found(kind: &'static str, key: impl ToString) -> Self {
        ServiceError::NotFound {
            kind,
            key: key.to_string(),
        }
    }

    /// Errors caused by the caller rather than by the platform.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ServiceError::NotFound { .. } | ServiceError::BadInput(_) | ServiceError::Conflict(_)
        )
    }
}

/// Turns a unique-index violation into a Conflict carrying `message`.
pub(crate) fn map_unique_violation(e: sea_orm::DbErr, message: impl FnOnce() -> String) -> ServiceError {
    match e.sql_err() {
        Some(sea_orm::SqlErr::UniqueConstraintViolation(_)) => ServiceError::Conflict(message()),
        _ => ServiceError::Database(e),
    }
}

impl From<bollard::errors::Error> for ServiceError {
    fn from(e: bollard::errors::Error) -> Self {
        ServiceError::Runtime(e.to_string())
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        ServiceError::EnvironmentApi(e.to_string())
    }
}

impl From<walkdir::Error> for ServiceError {
    fn from(e: walkdir::Error) -> Self {
        ServiceError::Io(e.into())
    }
}
