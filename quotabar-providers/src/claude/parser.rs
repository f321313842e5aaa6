//! Parser for the `claude` CLI `/usage` screen.
//!
//! # Output Format
//!
//! ```text
//! Current session
//! ███████▌          72% left
//! Resets 2pm (Europe/Berlin)
//!
//! Current week (all models)
//! ████              45% left
//! Resets Jan 5 at 12am
//!
//! Current week (Opus)
//!                   80% used
//! Resets Jan 5 at 12am
//! ```
//!
//! Older releases print `NN% used` instead of `NN% left`; both are accepted.

use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, instrument};

use quotabar_core::{FetchSource, ProbeError, ProviderKind, QuotaType, UsageQuota, UsageSnapshot};

// ============================================================================
// Regex Patterns
// ============================================================================

/// "XX% left" or "XX% remaining".
static PERCENT_LEFT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*%\s*(?:left|remaining)").expect("Invalid regex")
});

/// "XX% used".
static PERCENT_USED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*%\s*used").expect("Invalid regex"));

/// "Resets <time>".
static RESET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bresets?:?\s+(.+?)\s*$").expect("Invalid regex"));

/// Model name in "Current week (Opus)".
static MODEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(([^)]+)\)").expect("Invalid regex"));

/// Account email.
static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:account|email)\s*:?\s*([^\s@]+@[^\s]+)").expect("Invalid regex")
});

/// Phrases the CLI prints when it has no usable login.
const LOGIN_PHRASES: &[&str] = &[
    "please run /login",
    "not logged in",
    "invalid api key",
    "authentication_error",
    "oauth token has expired",
];

// ============================================================================
// Sections
// ============================================================================

/// Which quota a section header announces.
fn classify_header(line: &str) -> Option<QuotaType> {
    let lower = line.to_lowercase();
    if !lower.starts_with("current") {
        return None;
    }

    if lower.contains("session") {
        return Some(QuotaType::Session);
    }

    if lower.contains("week") {
        return match MODEL_RE.captures(line).and_then(|caps| caps.get(1)) {
            Some(model) if !model.as_str().to_lowercase().contains("all models") => {
                Some(QuotaType::ModelSpecific(model.as_str().trim().to_string()))
            }
            _ => Some(QuotaType::Weekly),
        };
    }

    None
}

#[derive(Debug)]
struct Section {
    quota_type: QuotaType,
    lines: Vec<String>,
}

fn split_into_sections(text: &str) -> Vec<Section> {
    let mut sections: Vec<Section> = Vec::new();

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(quota_type) = classify_header(line) {
            // Header and bar share a line once cursor moves are stripped
            sections.push(Section {
                quota_type,
                lines: vec![line.to_string()],
            });
        } else if let Some(current) = sections.last_mut() {
            current.lines.push(line.to_string());
        }
    }

    sections
}

// ============================================================================
// Extractors
// ============================================================================

/// Extract "XX% left" from text.
pub fn extract_percent_left(text: &str) -> Option<f64> {
    PERCENT_LEFT_RE
        .captures(text)
        .and_then(|caps| caps.get(1)?.as_str().parse().ok())
}

/// Extract "XX% used" from text.
pub fn extract_percent_used(text: &str) -> Option<f64> {
    PERCENT_USED_RE
        .captures(text)
        .and_then(|caps| caps.get(1)?.as_str().parse().ok())
}

/// Extract the reset description from one line.
pub fn extract_reset(line: &str) -> Option<String> {
    RESET_RE.captures(line).and_then(|caps| {
        let time = caps.get(1)?.as_str().trim();
        (!time.is_empty()).then(|| format!("Resets {time}"))
    })
}

/// Extract the account email.
pub fn extract_email(text: &str) -> Option<String> {
    EMAIL_RE
        .captures(text)
        .and_then(|caps| Some(caps.get(1)?.as_str().to_string()))
}

/// Returns the first login phrase found in `text`, if any.
pub fn detect_login_required(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    LOGIN_PHRASES.iter().copied().find(|p| lower.contains(p))
}

fn parse_section(section: &Section) -> Result<Option<UsageQuota>, ProbeError> {
    let mut quota = None;
    let mut reset = None;

    for line in &section.lines {
        if quota.is_none() {
            if let Some(left) = extract_percent_left(line) {
                quota = Some(UsageQuota::new(
                    ProviderKind::Claude,
                    section.quota_type.clone(),
                    left,
                )?);
            } else if let Some(used) = extract_percent_used(line) {
                quota = Some(UsageQuota::from_used_percent(
                    ProviderKind::Claude,
                    section.quota_type.clone(),
                    used,
                )?);
            }
        }
        if reset.is_none() {
            reset = extract_reset(line);
        }
    }

    Ok(quota.map(|q| match reset {
        Some(description) => q.with_reset_description(description),
        None => q,
    }))
}

// ============================================================================
// Entry Point
// ============================================================================

/// Parses `/usage` output into a snapshot.
///
/// # Errors
///
/// - [`ProbeError::AuthenticationRequired`] if the CLI asks for a login
/// - [`ProbeError::ParseFailed`] if no quota line is present or a percentage
///   is out of range
#[instrument(skip(text), fields(len = text.len()))]
pub fn parse_usage_output(text: &str) -> Result<UsageSnapshot, ProbeError> {
    let mut quotas: Vec<UsageQuota> = Vec::new();

    for section in split_into_sections(text) {
        if quotas.iter().any(|q| *q.quota_type() == section.quota_type) {
            continue;
        }
        if let Some(quota) = parse_section(&section)? {
            quotas.push(quota);
        }
    }

    if quotas.is_empty() {
        if let Some(phrase) = detect_login_required(text) {
            debug!(phrase, "Claude CLI is not logged in");
            return Err(ProbeError::auth(format!(
                "Claude CLI reported \"{phrase}\"; run `claude` and log in"
            )));
        }
        return Err(ProbeError::parse("no usage section found in claude output"));
    }

    debug!(quotas = quotas.len(), "Parsed Claude usage");

    Ok(UsageSnapshot::new(ProviderKind::Claude, quotas)?
        .with_source(FetchSource::Cli)
        .with_account(extract_email(text), None))
}

// ============================================================================
// Tests
// ============================================================================
