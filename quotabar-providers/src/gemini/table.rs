//! Parser for the `gemini` CLI `/stats` table.
//!
//! The table lists one row per model with its remaining share:
//!
//! ```text
//! │ gemini-2.5-pro      12     45.0% (Resets in 3h)   │
//! │ gemini-2.5-flash     3     98%                    │
//! ```

use regex::Regex;
use std::sync::LazyLock;
use tracing::warn;

use quotabar_core::{FetchSource, ProbeError, ProviderKind, QuotaType, UsageQuota, UsageSnapshot};

use super::error::GeminiError;

/// Terminal escape sequences: two-byte `ESC x` forms and CSI sequences.
static ANSI_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b[@-Z\\-_]|\x1b\[[0-?]*[ -/]*[@-~]").expect("Invalid regex")
});

static ROW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(gemini[\w.\-]*)\b.*?(\d+(?:\.\d+)?)\s*%").expect("Invalid regex")
});

static LOGIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(login with google|waiting for auth|please (sign|log) ?in)")
        .expect("Invalid regex")
});

/// Removes terminal escape sequences.
pub fn strip_ansi(text: &str) -> String {
    ANSI_RE.replace_all(text, "").into_owned()
}

/// Parses model rows out of `/stats` output.
///
/// The first row seen for a model wins.
///
/// # Errors
///
/// - [`ProbeError::AuthenticationRequired`] if the CLI is asking to sign in
/// - [`ProbeError::ParseFailed`] if a row's percentage is over 100, or if
///   no model row is found
pub fn parse_stats_table(text: &str) -> Result<UsageSnapshot, ProbeError> {
    let clean = strip_ansi(text);
    let mut quotas: Vec<UsageQuota> = Vec::new();

    for line in clean.lines() {
        let Some(caps) = ROW_RE.captures(line) else {
            continue;
        };
        let model = caps[1].to_lowercase();
        let quota_type = QuotaType::ModelSpecific(model);
        if quotas.iter().any(|q| *q.quota_type() == quota_type) {
            continue;
        }

        let percent: f64 = caps[2]
            .parse()
            .map_err(|_| ProbeError::parse(format!("invalid percentage in row: {line}")))?;
        match UsageQuota::new(ProviderKind::Gemini, quota_type, percent) {
            Ok(quota) => quotas.push(quota),
            Err(e) => {
                warn!(error = %e, line, "Rejecting invalid stats row");
                return Err(GeminiError::InvalidResponse(format!("stats row {line:?}: {e}")).into());
            }
        }
    }

    if quotas.is_empty() {
        if LOGIN_RE.is_match(&clean) {
            return Err(GeminiError::NotLoggedIn("gemini CLI is waiting for sign-in".to_string()).into());
        }
        return Err(ProbeError::parse("no model rows in gemini /stats output"));
    }

    quotas.sort_by_key(|q| q.quota_type().label());
    Ok(UsageSnapshot::new(ProviderKind::Gemini, quotas)?.with_source(FetchSource::Cli))
}
