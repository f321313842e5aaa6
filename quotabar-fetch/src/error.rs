//! Host-layer error types.

use std::time::Duration;
use thiserror::Error;

use quotabar_core::ProbeError;

// ============================================================================
// PTY Error
// ============================================================================

/// Error type for PTY operations.
#[derive(Debug, Error)]
pub enum PtyError {
    /// Binary could not be located.
    #[error("Command not found: {0}")]
    NotFound(String),

    /// Failed to create PTY.
    #[error("Failed to create PTY: {0}")]
    CreateFailed(String),

    /// Failed to spawn process.
    #[error("Failed to spawn process: {0}")]
    SpawnFailed(String),

    /// Nothing completed the run within the overall timeout.
    #[error("Command timed out after {0:?}")]
    Timeout(Duration),

    /// The caller stopped waiting for the run.
    #[error("Command cancelled")]
    Cancelled,

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<PtyError> for ProbeError {
    fn from(err: PtyError) -> Self {
        match err {
            PtyError::Timeout(after) => ProbeError::Timeout(after),
            other => ProbeError::ExecutionFailed(other.to_string()),
        }
    }
}

// ============================================================================
// RPC Transport Error
// ============================================================================

/// Error type for the line transport.
#[derive(Debug, Error)]
pub enum RpcError {
    /// Failed to spawn the subprocess.
    #[error("Failed to spawn transport process: {0}")]
    Spawn(String),

    /// The peer closed the stream, or the transport was closed locally.
    #[error("Transport closed")]
    Closed,

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<RpcError> for ProbeError {
    fn from(err: RpcError) -> Self {
        ProbeError::ExecutionFailed(err.to_string())
    }
}
