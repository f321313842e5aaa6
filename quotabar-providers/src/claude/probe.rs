//! CLI-output probe for Claude.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, instrument};

use quotabar_core::{ProbeError, ProviderKind, UsageSnapshot};
use quotabar_fetch::{PtyOptions, PtyRunner, QuotaProbe, locate};

use super::parser::parse_usage_output;

/// Claude binary name.
pub const CLAUDE_BINARY: &str = "claude";

/// Timeout for one `/usage` run.
const PTY_TIMEOUT: Duration = Duration::from_secs(30);

/// Quiet period that counts as "screen finished rendering".
const IDLE_TIMEOUT: Duration = Duration::from_secs(4);

/// Time to keep reading once the last section header appeared.
const SETTLE_TIME: Duration = Duration::from_secs(1);

/// Prompts that can appear before the REPL accepts input, and the replies.
const PROMPT_REPLIES: &[(&str, &str)] = &[
    ("Do you trust the files in this folder?", "\r"),
    ("Press Enter to continue", "\r"),
];

/// Headers of the last section of the usage screen.
const STOP_PATTERNS: &[&str] = &["Current week (Opus)", "Current week (Sonnet)"];

/// Runs `claude` on a PTY, asks for `/usage` and parses the screen.
#[derive(Debug, Clone)]
pub struct ClaudeCliProbe {
    binary: String,
    runner: PtyRunner,
    timeout: Duration,
}

impl Default for ClaudeCliProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ClaudeCliProbe {
    /// Creates a probe that runs `claude`.
    pub fn new() -> Self {
        Self {
            binary: CLAUDE_BINARY.to_string(),
            runner: PtyRunner::default(),
            timeout: PTY_TIMEOUT,
        }
    }

    /// Uses a different binary name or path.
    #[must_use]
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Sets the PTY run timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn options(&self) -> PtyOptions {
        let mut options = PtyOptions::with_timeout(self.timeout)
            .with_idle_timeout(IDLE_TIMEOUT)
            .with_settle(SETTLE_TIME)
            .with_env("NO_COLOR", "1");
        if let Some(home) = dirs::home_dir() {
            options = options.in_dir(home);
        }
        for (trigger, reply) in PROMPT_REPLIES {
            options = options.send_on(*trigger, *reply);
        }
        for pattern in STOP_PATTERNS {
            options = options.stop_on(*pattern);
        }
        options
    }
}

#[async_trait]
impl QuotaProbe for ClaudeCliProbe {
    fn provider(&self) -> ProviderKind {
        ProviderKind::Claude
    }

    fn is_available(&self) -> bool {
        locate(&self.binary).is_some()
    }

    #[instrument(skip(self), fields(provider = "claude"))]
    async fn probe(&self) -> Result<UsageSnapshot, ProbeError> {
        let result = self
            .runner
            .execute(&self.binary, "/usage\r", self.options())
            .await?;

        debug!(
            output_len = result.output.len(),
            exit_code = ?result.exit_code,
            stopped_on = ?result.stopped_on_pattern,
            "Claude /usage captured"
        );

        parse_usage_output(&result.output)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use quotabar_core::{ProbeErrorKind, QuotaType};
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    fn fake_cli(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("claude");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn test_probe_parses_fake_cli() {
        let dir = tempfile::tempdir().unwrap();
        let bin = fake_cli(
            dir.path(),
            "printf 'Current session\\n64%% left\\nResets 5pm\\n'\n\
             printf 'Current week (all models)\\n12%% used\\n'",
        );

        let probe = ClaudeCliProbe::new()
            .with_binary(bin.to_string_lossy())
            .with_timeout(Duration::from_secs(10));
        assert!(probe.is_available());

        let snapshot = probe.probe().await.unwrap();
        let session = snapshot.quota(&QuotaType::Session).unwrap();
        assert!((session.percent_remaining() - 64.0).abs() < 0.01);
        let weekly = snapshot.quota(&QuotaType::Weekly).unwrap();
        assert!((weekly.percent_remaining() - 88.0).abs() < 0.01);
    }

    #[tokio::test]
    async fn test_probe_reports_login_required() {
        let dir = tempfile::tempdir().unwrap();
        let bin = fake_cli(dir.path(), "echo 'Not logged in. Please run /login'");

        let probe = ClaudeCliProbe::new().with_binary(bin.to_string_lossy());
        let err = probe.probe().await.unwrap_err();
        assert_eq!(err.kind(), ProbeErrorKind::AuthenticationRequired);
    }

    #[tokio::test]
    async fn test_probe_times_out_on_hanging_cli() {
        let dir = tempfile::tempdir().unwrap();
        let bin = fake_cli(dir.path(), "while true; do echo tick; sleep 0.1; done");

        let probe = ClaudeCliProbe::new()
            .with_binary(bin.to_string_lossy())
            .with_timeout(Duration::from_millis(500));
        let err = probe.probe().await.unwrap_err();
        assert_eq!(err.kind(), ProbeErrorKind::Timeout);
    }

    #[test]
    fn test_missing_binary_unavailable() {
        let probe = ClaudeCliProbe::new().with_binary("/nonexistent/claude");
        assert!(!probe.is_available());
    }
}
