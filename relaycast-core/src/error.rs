use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Bad caller input. Never retried.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A remote platform call failed or timed out.
    #[error("Platform error during {operation}: {cause}")]
    Platform {
        operation: &'static str,
        cause: String,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    /// A relay is already registered for the stream key.
    #[error("Relay already running for stream key {0}")]
    AlreadyRunning(String),

    #[error("Already started: {0}")]
    AlreadyStarted(String),

    /// Launch preconditions are not met (asset not ready, no ingest address).
    #[error("Not ready: {0}")]
    NotReady(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Wrap any displayable remote failure as a `Platform` error.
    pub fn platform(operation: &'static str, cause: impl std::fmt::Display) -> Self {
        Self::Platform {
            operation,
            cause: cause.to_string(),
        }
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Self::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().unwrap_or_default();
                match code.as_ref() {
                    // PostgreSQL unique_violation
                    "23505" => {
                        let detail = db_err.message().to_string();
                        if detail.contains("stream_key") {
                            Self::Conflict("Stream key already bound to an active broadcast".to_string())
                        } else {
                            Self::Conflict("Resource already exists".to_string())
                        }
                    }
                    // PostgreSQL foreign_key_violation
                    "23503" => Self::NotFound("Referenced resource not found".to_string()),
                    // PostgreSQL check_violation
                    "23514" => Self::Validation("Constraint check failed".to_string()),
                    // PostgreSQL not_null_violation
                    "23502" => Self::Validation("Required field is missing".to_string()),
                    _ => Self::Database(err),
                }
            }
            _ => Self::Database(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
