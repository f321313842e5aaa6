//! Status and fetch-related types.
//!
//! - [`QuotaStatus`] - Health derived from the scarcest remaining quota
//! - [`FetchSource`] - How data was obtained

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Thresholds
// ============================================================================

/// Below this remaining percentage a provider is `Critical`.
pub const CRITICAL_THRESHOLD: f64 = 20.0;

/// Below this remaining percentage a provider is `Warning`.
pub const WARNING_THRESHOLD: f64 = 50.0;

// ============================================================================
// Quota Status
// ============================================================================

/// Health classification of a provider's remaining quota.
///
/// Ordered from best to worst, so `a < b` means `b` is more severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaStatus {
    /// 50% or more remaining.
    Healthy,
    /// At least 20% but under 50% remaining.
    Warning,
    /// More than 0% but under 20% remaining.
    Critical,
    /// Nothing left.
    Depleted,
}

impl QuotaStatus {
    /// Classifies a minimum remaining percentage.
    ///
    /// Pure and deterministic: the same input always yields the same status.
    pub fn classify(min_percent_remaining: f64) -> Self {
        if min_percent_remaining <= 0.0 {
            Self::Depleted
        } else if min_percent_remaining < CRITICAL_THRESHOLD {
            Self::Critical
        } else if min_percent_remaining < WARNING_THRESHOLD {
            Self::Warning
        } else {
            Self::Healthy
        }
    }

    /// Numeric severity, 0 (healthy) to 3 (depleted).
    pub fn severity(self) -> u8 {
        match self {
            Self::Healthy => 0,
            Self::Warning => 1,
            Self::Critical => 2,
            Self::Depleted => 3,
        }
    }

    /// Returns true for any status worth alerting on.
    pub fn is_alert_worthy(self) -> bool {
        self != Self::Healthy
    }

    /// Lowercase label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Warning => "warning",
            Self::Critical => "critical",
            Self::Depleted => "depleted",
        }
    }
}

impl fmt::Display for QuotaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// Fetch Source
// ============================================================================

/// How usage data was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FetchSource {
    /// Parsed from interactive CLI output.
    #[default]
    Cli,
    /// JSON-RPC to a helper subprocess.
    Rpc,
    /// HTTP API with a stored OAuth token.
    OAuth,
}

impl fmt::Display for FetchSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Cli => "cli",
            Self::Rpc => "rpc",
            Self::OAuth => "oauth",
        };
        f.write_str(label)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_table() {
        assert_eq!(QuotaStatus::classify(0.0), QuotaStatus::Depleted);
        assert_eq!(QuotaStatus::classify(0.1), QuotaStatus::Critical);
        assert_eq!(QuotaStatus::classify(19.99), QuotaStatus::Critical);
        assert_eq!(QuotaStatus::classify(20.0), QuotaStatus::Warning);
        assert_eq!(QuotaStatus::classify(49.9), QuotaStatus::Warning);
        assert_eq!(QuotaStatus::classify(50.0), QuotaStatus::Healthy);
        assert_eq!(QuotaStatus::classify(100.0), QuotaStatus::Healthy);
    }

    #[test]
    fn test_classify_is_deterministic() {
        for pct in [0.0, 5.0, 19.0, 20.0, 35.5, 50.0, 77.0, 100.0] {
            assert_eq!(QuotaStatus::classify(pct), QuotaStatus::classify(pct));
        }
    }

    #[test]
    fn test_severity_order() {
        assert!(QuotaStatus::Healthy < QuotaStatus::Warning);
        assert!(QuotaStatus::Warning < QuotaStatus::Critical);
        assert!(QuotaStatus::Critical < QuotaStatus::Depleted);
        assert_eq!(QuotaStatus::Depleted.severity(), 3);
        assert!(!QuotaStatus::Healthy.is_alert_worthy());
    }
}
