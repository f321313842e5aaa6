//! Core error types for `QuotaBar`.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Core error type for model construction and validation.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Unknown provider name.
    #[error("Provider not found: {0}")]
    ProviderNotFound(String),

    /// Invalid data from a probe (out-of-range percentage, empty snapshot).
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// ============================================================================
// Probe Error
// ============================================================================

/// Failure of a single probe call.
///
/// Every provider-specific error is folded into one of these four kinds
/// before it reaches the monitor.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ProbeError {
    /// Missing, expired or rejected credentials. Not retried automatically.
    #[error("Authentication required: {0}")]
    AuthenticationRequired(String),

    /// Subprocess or transport failure.
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    /// Output did not match any known shape.
    #[error("Parse failed: {0}")]
    ParseFailed(String),

    /// The probe exceeded its allotted time.
    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

/// Discriminant of [`ProbeError`], used for diagnostics and state display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeErrorKind {
    /// See [`ProbeError::AuthenticationRequired`].
    AuthenticationRequired,
    /// See [`ProbeError::ExecutionFailed`].
    ExecutionFailed,
    /// See [`ProbeError::ParseFailed`].
    ParseFailed,
    /// See [`ProbeError::Timeout`].
    Timeout,
}

impl ProbeError {
    /// Shorthand for an authentication failure.
    pub fn auth(reason: impl Into<String>) -> Self {
        Self::AuthenticationRequired(reason.into())
    }

    /// Shorthand for an execution failure.
    pub fn execution(reason: impl Into<String>) -> Self {
        Self::ExecutionFailed(reason.into())
    }

    /// Shorthand for a parse failure.
    pub fn parse(reason: impl Into<String>) -> Self {
        Self::ParseFailed(reason.into())
    }

    /// Returns the kind of this error.
    pub fn kind(&self) -> ProbeErrorKind {
        match self {
            Self::AuthenticationRequired(_) => ProbeErrorKind::AuthenticationRequired,
            Self::ExecutionFailed(_) => ProbeErrorKind::ExecutionFailed,
            Self::ParseFailed(_) => ProbeErrorKind::ParseFailed,
            Self::Timeout(_) => ProbeErrorKind::Timeout,
        }
    }

    /// Returns true if the user has to act (log in) before this can succeed.
    pub fn is_user_actionable(&self) -> bool {
        matches!(self, Self::AuthenticationRequired(_))
    }

    /// Returns true for failures that count as "execution failed" for status
    /// purposes (timeouts included).
    pub fn is_execution_failure(&self) -> bool {
        matches!(self, Self::ExecutionFailed(_) | Self::Timeout(_))
    }
}

impl From<CoreError> for ProbeError {
    fn from(err: CoreError) -> Self {
        ProbeError::ParseFailed(err.to_string())
    }
}

impl fmt::Display for ProbeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::AuthenticationRequired => "authentication required",
            Self::ExecutionFailed => "execution failed",
            Self::ParseFailed => "parse failed",
            Self::Timeout => "timeout",
        };
        f.write_str(label)
    }
}
