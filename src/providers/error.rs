use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP client build error: {0}")]
    ClientBuild(String),
    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: StatusCode },
    #[error("failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },
    #[error("authentication required, run `agromarket login` first")]
    Unauthorized,
    #[error("session expired, please log in again")]
    SessionExpired,
    #[error("{0}")]
    InvalidCredentials(String),
    #[error("token storage failed: {0}")]
    TokenStore(String),
}

impl ApiError {
    pub(crate) fn request(url: &str, err: reqwest::Error) -> Self {
        ApiError::Request {
            url: url.to_string(),
            message: err.to_string(),
        }
    }

    /// True when the server refused the stored credentials.
    pub fn is_rejected_session(&self) -> bool {
        match self {
            ApiError::SessionExpired | ApiError::Unauthorized => true,
            ApiError::Status { status, .. } => {
                *status == StatusCode::UNAUTHORIZED || *status == StatusCode::FORBIDDEN
            }
            _ => false,
        }
    }

    pub(crate) fn token_store(err: anyhow::Error) -> Self {
        ApiError::TokenStore(format!("{err:#}"))
    }
}
