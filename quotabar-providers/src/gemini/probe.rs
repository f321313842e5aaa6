//! Gemini probe: quota API first, CLI table as fallback.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, instrument};

use quotabar_core::{ProbeError, ProviderKind, UsageSnapshot};
use quotabar_fetch::{PtyOptions, PtyRunner, QuotaProbe, locate};

use super::api::GeminiApiClient;
use super::credentials::{GeminiAuthType, GeminiCredentials, GeminiPaths};
use super::error::GeminiError;
use super::table::parse_stats_table;

/// Gemini binary name.
pub const GEMINI_BINARY: &str = "gemini";

const PTY_TIMEOUT: Duration = Duration::from_secs(30);
const IDLE_TIMEOUT: Duration = Duration::from_secs(3);

/// Which source a probe call will use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeminiSource {
    /// The Cloud Code quota API with stored OAuth credentials.
    Api,
    /// The `/stats` table of the installed CLI.
    CliTable,
}

/// Reads Gemini quotas.
///
/// The API is used whenever `oauth_creds.json` exists. Without it, the
/// `gemini` CLI's `/stats` table is parsed if the binary is installed.
/// Auth failures from the API are returned as-is.
#[derive(Debug, Clone)]
pub struct GeminiProbe {
    paths: Option<GeminiPaths>,
    api: GeminiApiClient,
    binary: String,
    runner: PtyRunner,
    timeout: Duration,
}

impl Default for GeminiProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl GeminiProbe {
    /// Creates a probe reading `~/.gemini`.
    pub fn new() -> Self {
        Self {
            paths: GeminiPaths::from_home(),
            api: GeminiApiClient::new(),
            binary: GEMINI_BINARY.to_string(),
            runner: PtyRunner::default(),
            timeout: PTY_TIMEOUT,
        }
    }

    /// Reads credentials from a different directory.
    #[must_use]
    pub fn with_paths(mut self, paths: GeminiPaths) -> Self {
        self.paths = Some(paths);
        self
    }

    /// Uses a different API client.
    #[must_use]
    pub fn with_api(mut self, api: GeminiApiClient) -> Self {
        self.api = api;
        self
    }

    /// Uses a different CLI binary name or path.
    #[must_use]
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Sets the CLI run timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn has_credentials(&self) -> bool {
        self.paths.as_ref().is_some_and(GeminiPaths::has_credentials)
    }

    /// The source the next probe call would use, if any.
    pub fn source(&self) -> Option<GeminiSource> {
        if self.has_credentials() {
            Some(GeminiSource::Api)
        } else if locate(&self.binary).is_some() {
            Some(GeminiSource::CliTable)
        } else {
            None
        }
    }

    async fn probe_api(&self, paths: &GeminiPaths) -> Result<UsageSnapshot, ProbeError> {
        let auth_type = GeminiAuthType::load(&paths.settings());
        debug!(?auth_type, "Gemini auth type");
        auth_type.ensure_supported()?;

        let creds = GeminiCredentials::load(&paths.credentials())?;
        self.api.fetch_snapshot(&creds).await
    }

    async fn probe_cli(&self) -> Result<UsageSnapshot, ProbeError> {
        let options = PtyOptions::with_timeout(self.timeout)
            .with_idle_timeout(IDLE_TIMEOUT)
            .with_env("NO_COLOR", "1");
        let result = self.runner.execute(&self.binary, "/stats\r", options).await?;

        debug!(
            output_len = result.output.len(),
            idle = result.idle_timed_out,
            "Gemini /stats captured"
        );
        parse_stats_table(&result.output)
    }
}

#[async_trait]
impl QuotaProbe for GeminiProbe {
    fn provider(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    fn is_available(&self) -> bool {
        self.source().is_some()
    }

    #[instrument(skip(self), fields(provider = "gemini"))]
    async fn probe(&self) -> Result<UsageSnapshot, ProbeError> {
        match (self.source(), self.paths.as_ref()) {
            (Some(GeminiSource::Api), Some(paths)) => self.probe_api(paths).await,
            (Some(GeminiSource::CliTable), _) => self.probe_cli().await,
            _ => Err(GeminiError::NotLoggedIn(
                "no ~/.gemini/oauth_creds.json and no gemini CLI installed".to_string(),
            )
            .into()),
        }
    }
}
