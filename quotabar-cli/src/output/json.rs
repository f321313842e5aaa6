//! JSON output formatting.

use anyhow::Result;
use chrono::{DateTime, Utc};
use quotabar_core::{ProbeError, ProbeErrorKind, QuotaStatus, UsageQuota};
use quotabar_providers::ProviderInfo;
use quotabar_store::{ProbeOutcome, ProviderState, RefreshReport, StatusTransition};
use serde::Serialize;

// ============================================================================
// Output Types
// ============================================================================

/// One provider in `usage` output.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderOutput {
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<QuotaStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub quotas: Vec<QuotaOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_success_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_attempt_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorOutput>,
}

/// One quota measurement.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaOutput {
    pub label: String,
    pub percent_remaining: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resets_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_description: Option<String>,
}

/// A probe failure.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorOutput {
    pub kind: ProbeErrorKind,
    pub message: String,
}

/// One refresh in `watch` output.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportOutput {
    pub sequence: u64,
    pub started_at: DateTime<Utc>,
    pub outcomes: Vec<OutcomeOutput>,
    pub alerts: Vec<AlertOutput>,
}

/// One probe within a refresh.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeOutput {
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<QuotaStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorOutput>,
    pub elapsed_ms: u128,
    pub applied: bool,
}

/// A degrading transition.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertOutput {
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<QuotaStatus>,
    pub to: QuotaStatus,
    pub at: DateTime<Utc>,
}

/// Provider info for listing.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderInfoOutput {
    pub id: String,
    pub display_name: String,
    pub enabled: bool,
    pub available: bool,
}

// ============================================================================
// Conversions
// ============================================================================

impl From<&ProbeError> for ErrorOutput {
    fn from(error: &ProbeError) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

impl From<&UsageQuota> for QuotaOutput {
    fn from(quota: &UsageQuota) -> Self {
        Self {
            label: quota.quota_type().label(),
            percent_remaining: quota.percent_remaining(),
            resets_at: quota.resets_at(),
            reset_description: quota.reset_description().map(str::to_string),
        }
    }
}

impl From<&ProviderState> for ProviderOutput {
    fn from(state: &ProviderState) -> Self {
        let snapshot = state.snapshot.as_ref();
        Self {
            provider: state.provider.cli_name().to_string(),
            status: state.status,
            source: snapshot.map(|s| s.source().to_string()),
            quotas: snapshot
                .map(|s| s.quotas().iter().map(QuotaOutput::from).collect())
                .unwrap_or_default(),
            account: snapshot.and_then(|s| s.account()).map(str::to_string),
            plan: snapshot.and_then(|s| s.plan()).map(str::to_string),
            captured_at: snapshot.map(quotabar_core::UsageSnapshot::captured_at),
            last_success_at: state.last_success_at,
            last_attempt_at: state.last_attempt_at,
            error: state.last_error.as_ref().map(ErrorOutput::from),
        }
    }
}

impl From<&ProbeOutcome> for OutcomeOutput {
    fn from(outcome: &ProbeOutcome) -> Self {
        let (status, error) = match &outcome.result {
            Ok(status) => (Some(*status), None),
            Err(e) => (None, Some(ErrorOutput::from(e))),
        };
        Self {
            provider: outcome.provider.cli_name().to_string(),
            status,
            error,
            elapsed_ms: outcome.elapsed.as_millis(),
            applied: outcome.applied,
        }
    }
}

impl From<&StatusTransition> for AlertOutput {
    fn from(transition: &StatusTransition) -> Self {
        Self {
            provider: transition.provider.cli_name().to_string(),
            from: transition.from,
            to: transition.to,
            at: transition.at,
        }
    }
}

// ============================================================================
// JSON Formatter
// ============================================================================

/// JSON formatter.
pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    /// Creates a new JSON formatter.
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    /// Formats any serializable value.
    pub fn format<T: Serialize>(&self, data: &T) -> Result<String> {
        let json = if self.pretty {
            serde_json::to_string_pretty(data)?
        } else {
            serde_json::to_string(data)?
        };
        Ok(json)
    }

    /// Formats provider states. Always an array.
    pub fn format_states(&self, states: &[ProviderState]) -> Result<String> {
        let outputs: Vec<ProviderOutput> = states.iter().map(ProviderOutput::from).collect();
        self.format(&outputs)
    }

    /// Formats a refresh report with its degrading transitions.
    pub fn format_report(&self, report: &RefreshReport) -> Result<String> {
        let output = ReportOutput {
            sequence: report.sequence,
            started_at: report.started_at,
            outcomes: report.outcomes.iter().map(OutcomeOutput::from).collect(),
            alerts: report.degrading().map(AlertOutput::from).collect(),
        };
        self.format(&output)
    }

    /// Formats provider list.
    pub fn format_providers(&self, providers: &[ProviderInfo]) -> Result<String> {
        let outputs: Vec<ProviderInfoOutput> = providers
            .iter()
            .map(|info| ProviderInfoOutput {
                id: info.id.cli_name().to_string(),
                display_name: info.name.clone(),
                enabled: info.enabled,
                available: info.available,
            })
            .collect();

        self.format(&outputs)
    }
}

// ============================================================================
// Tests
// ============================================================================
