//! RPC-backed probe for Codex.

use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use quotabar_core::{ProbeError, ProviderKind, UsageSnapshot};
use quotabar_fetch::{QuotaProbe, locate};

use super::error::CodexError;
use super::parser::parse_rate_limits;
use super::rpc::{CodexRpcClient, DEFAULT_REQUEST_TIMEOUT};

/// Codex binary name.
pub const CODEX_BINARY: &str = "codex";

/// Reads rate limits from a long-lived `codex app-server` session.
///
/// The session is spawned on first use and reused until it dies, a call is
/// abandoned midway, or [`QuotaProbe::shutdown`] is called.
#[derive(Debug)]
pub struct CodexRpcProbe {
    binary: String,
    request_timeout: Duration,
    session: Mutex<Option<CodexRpcClient>>,
}

impl Default for CodexRpcProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl CodexRpcProbe {
    /// Creates a probe that spawns `codex` on demand.
    pub fn new() -> Self {
        Self {
            binary: CODEX_BINARY.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            session: Mutex::new(None),
        }
    }

    /// Creates a probe around an already connected session.
    pub fn from_client(client: CodexRpcClient) -> Self {
        Self {
            session: Mutex::new(Some(client)),
            ..Self::new()
        }
    }

    /// Uses a different binary name or path.
    #[must_use]
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Returns true if a session is currently held.
    pub async fn has_session(&self) -> bool {
        self.session.lock().await.is_some()
    }

    async fn fetch(&self) -> Result<UsageSnapshot, ProbeError> {
        let mut guard = self.session.lock().await;

        if guard.as_ref().is_some_and(|client| !client.is_usable()) {
            debug!("Discarding unusable app-server session");
            if let Some(mut stale) = guard.take() {
                stale.close().await;
            }
        }

        if guard.is_none() {
            let path = locate(&self.binary)
                .ok_or_else(|| CodexError::BinaryNotFound(self.binary.clone()))?;
            info!(path = %path.display(), "Starting Codex app-server");
            *guard = Some(CodexRpcClient::spawn(path, self.request_timeout).await?);
        }

        let Some(client) = guard.as_mut() else {
            return Err(ProbeError::execution("app-server session unavailable"));
        };

        match client.read_rate_limits().await {
            Ok(result) => parse_rate_limits(&result, client.account(), Utc::now()),
            Err(e) => {
                if e.is_fatal_to_session() {
                    warn!(error = %e, "App-server session lost");
                    client.close().await;
                    *guard = None;
                }
                Err(e.into())
            }
        }
    }
}

#[async_trait]
impl QuotaProbe for CodexRpcProbe {
    fn provider(&self) -> ProviderKind {
        ProviderKind::Codex
    }

    fn is_available(&self) -> bool {
        locate(&self.binary).is_some()
    }

    #[instrument(skip(self), fields(provider = "codex"))]
    async fn probe(&self) -> Result<UsageSnapshot, ProbeError> {
        self.fetch().await
    }

    async fn shutdown(&self) {
        if let Some(mut client) = self.session.lock().await.take() {
            client.close().await;
        }
    }
}
