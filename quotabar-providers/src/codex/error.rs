//! Codex-specific error types.

use std::time::Duration;
use thiserror::Error;

use quotabar_core::ProbeError;
use quotabar_fetch::RpcError;

/// Errors specific to Codex operations.
#[derive(Debug, Error)]
pub enum CodexError {
    /// Codex binary could not be located.
    #[error("Codex binary not found: {0}")]
    BinaryNotFound(String),

    /// The line transport failed or the app-server exited.
    #[error("App-server transport error: {0}")]
    Transport(#[from] RpcError),

    /// A single RPC call exceeded its request timeout.
    #[error("RPC call {method} timed out after {after:?}")]
    Timeout {
        /// Method that timed out.
        method: String,
        /// Configured request timeout.
        after: Duration,
    },

    /// The app-server answered with an error object.
    #[error("RPC error from {method}: {message}")]
    Rpc {
        /// Method that failed.
        method: String,
        /// Server-provided message.
        message: String,
    },

    /// A response had neither `result` nor `error`.
    #[error("RPC response for {0} has no result")]
    EmptyResponse(String),

    /// A request could not be encoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A well-formed response carried a result of an unexpected shape.
    #[error("Unexpected {method} result: {message}")]
    Decode {
        /// Method whose result did not match.
        method: String,
        /// Decoder message.
        message: String,
    },

    /// The app-server has no rate limit windows for this account yet.
    #[error("no rate limit data yet")]
    NoData,
}

impl CodexError {
    /// Returns true if the session must be discarded after this error.
    pub fn is_fatal_to_session(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Serialization(_))
    }
}

impl From<serde_json::Error> for CodexError {
    fn from(e: serde_json::Error) -> Self {
        CodexError::Serialization(e.to_string())
    }
}

impl From<CodexError> for ProbeError {
    fn from(err: CodexError) -> Self {
        match err {
            CodexError::Timeout { after, .. } => ProbeError::Timeout(after),
            CodexError::NoData | CodexError::Decode { .. } => ProbeError::parse(err.to_string()),
            CodexError::Rpc { message, .. } => ProbeError::execution(message),
            other => ProbeError::execution(other.to_string()),
        }
    }
}
