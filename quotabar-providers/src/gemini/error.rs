//! Gemini-specific errors.

use std::time::Duration;
use thiserror::Error;

use quotabar_core::ProbeError;

/// Gemini-specific errors.
#[derive(Debug, Error)]
pub enum GeminiError {
    /// No credentials file, or it holds no access token.
    #[error("Not logged in to Gemini CLI: {0}")]
    NotLoggedIn(String),

    /// The CLI is configured for an auth type the quota API doesn't serve.
    #[error("Unsupported auth type: {0}")]
    UnsupportedAuthType(String),

    /// The access token expired and cannot be refreshed.
    #[error("Token expired: {0}")]
    TokenExpired(String),

    /// The token endpoint rejected the refresh grant (HTTP 400 or 401).
    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    /// The token endpoint could not serve the refresh right now.
    #[error("Token endpoint unavailable: {0}")]
    TokenEndpoint(String),

    /// The credentials file is not valid JSON.
    #[error("Credentials parse error: {0}")]
    CredentialsParse(String),

    /// HTTP transport failure.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// HTTP request exceeded the client timeout.
    #[error("HTTP request timed out after {0:?}")]
    Timeout(Duration),

    /// Non-success status or malformed body.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// No usable quota buckets.
    #[error("No quota data available")]
    NoData,
}

impl From<GeminiError> for ProbeError {
    fn from(err: GeminiError) -> Self {
        match err {
            GeminiError::NotLoggedIn(_)
            | GeminiError::UnsupportedAuthType(_)
            | GeminiError::TokenExpired(_)
            | GeminiError::RefreshFailed(_)
            | GeminiError::CredentialsParse(_) => ProbeError::auth(err.to_string()),
            GeminiError::Timeout(after) => ProbeError::Timeout(after),
            GeminiError::Http(_) | GeminiError::TokenEndpoint(_) => {
                ProbeError::execution(err.to_string())
            }
            GeminiError::InvalidResponse(_) | GeminiError::NoData => {
                ProbeError::parse(err.to_string())
            }
        }
    }
}
