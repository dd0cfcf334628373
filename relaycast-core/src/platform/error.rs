//! Platform client error types
//!
//! Shared by every `PlatformClient` implementation, plus response helpers for
//! the HTTP-backed ones.

use thiserror::Error;

/// Maximum response body size for platform HTTP calls (4 MB).
pub const MAX_RESPONSE_SIZE: usize = 4 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum PlatformClientError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP error {status}: {message}")]
    Http {
        status: reqwest::StatusCode,
        message: String,
    },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Remote resource not found: {0}")]
    NotFound(String),

    #[error("Response too large ({size} bytes, max {MAX_RESPONSE_SIZE})")]
    ResponseTooLarge { size: u64 },
}

/// Read a response body with size limit and deserialize as JSON.
pub async fn json_with_limit<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, PlatformClientError> {
    if let Some(cl) = response.content_length() {
        if cl as usize > MAX_RESPONSE_SIZE {
            return Err(PlatformClientError::ResponseTooLarge { size: cl });
        }
    }
    let bytes = response.bytes().await?;
    if bytes.len() > MAX_RESPONSE_SIZE {
        return Err(PlatformClientError::ResponseTooLarge {
            size: bytes.len() as u64,
        });
    }
    serde_json::from_slice(&bytes).map_err(Into::into)
}

/// Turn a non-success response into `Http`, keeping the API's error message.
///
/// Google APIs wrap failures as `{"error": {"code": 403, "message": "..."}}`.
pub async fn check_response(
    resp: reqwest::Response,
) -> Result<reqwest::Response, PlatformClientError> {
    let status = resp.status();
    if !(status.is_client_error() || status.is_server_error()) {
        return Ok(resp);
    }

    #[derive(serde::Deserialize)]
    struct ErrorBody {
        error: ErrorDetail,
    }

    #[derive(serde::Deserialize)]
    struct ErrorDetail {
        message: String,
    }

    let message = match resp.bytes().await {
        Ok(bytes) => serde_json::from_slice::<ErrorBody>(&bytes)
            .map(|b| b.error.message)
            .unwrap_or_else(|_| String::from_utf8_lossy(&bytes).chars().take(256).collect()),
        Err(e) => e.to_string(),
    };

    Err(PlatformClientError::Http { status, message })
}

impl From<reqwest::Error> for PlatformClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

impl From<serde_json::Error> for PlatformClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}
