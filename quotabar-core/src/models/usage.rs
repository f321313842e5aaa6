//! Usage-related types.
//!
//! - [`QuotaType`] - What a quota measures (session, weekly, per model)
//! - [`UsageQuota`] - One remaining-percentage measurement
//! - [`UsageSnapshot`] - The immutable result of one successful probe

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::provider::ProviderKind;
use super::status::{FetchSource, QuotaStatus};
use crate::error::CoreError;

// ============================================================================
// Quota Type
// ============================================================================

/// The window or scope a quota applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "model", rename_all = "snake_case")]
pub enum QuotaType {
    /// Short rolling window (e.g. 5 hours).
    Session,
    /// Weekly window.
    Weekly,
    /// Budget scoped to one model.
    ModelSpecific(String),
}

impl QuotaType {
    /// Short label for display.
    pub fn label(&self) -> String {
        match self {
            Self::Session => "Session".to_string(),
            Self::Weekly => "Weekly".to_string(),
            Self::ModelSpecific(model) => model.clone(),
        }
    }
}

impl fmt::Display for QuotaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

// ============================================================================
// Usage Quota
// ============================================================================

/// One measured quantity of remaining quota.
///
/// `percent_remaining` is always within `[0, 100]`; the constructors reject
/// anything else instead of clamping it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "QuotaRepr")]
pub struct UsageQuota {
    percent_remaining: f64,
    quota_type: QuotaType,
    provider: ProviderKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    resets_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reset_description: Option<String>,
}

/// Unvalidated wire form of [`UsageQuota`].
#[derive(Deserialize)]
struct QuotaRepr {
    percent_remaining: f64,
    quota_type: QuotaType,
    provider: ProviderKind,
    #[serde(default)]
    resets_at: Option<DateTime<Utc>>,
    #[serde(default)]
    reset_description: Option<String>,
}

impl TryFrom<QuotaRepr> for UsageQuota {
    type Error = CoreError;

    fn try_from(repr: QuotaRepr) -> Result<Self, Self::Error> {
        let mut quota = UsageQuota::new(repr.provider, repr.quota_type, repr.percent_remaining)?;
        quota.resets_at = repr.resets_at;
        quota.reset_description = repr.reset_description;
        Ok(quota)
    }
}

impl UsageQuota {
    /// Creates a quota from a remaining percentage.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidData` if the value is not a finite number
    /// in `[0, 100]`.
    pub fn new(
        provider: ProviderKind,
        quota_type: QuotaType,
        percent_remaining: f64,
    ) -> Result<Self, CoreError> {
        validate_percent(percent_remaining)
            .map_err(|e| CoreError::InvalidData(format!("{provider} {quota_type}: {e}")))?;
        Ok(Self {
            percent_remaining,
            quota_type,
            provider,
            resets_at: None,
            reset_description: None,
        })
    }

    /// Creates a quota from a used percentage.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidData` if the used value is out of range.
    pub fn from_used_percent(
        provider: ProviderKind,
        quota_type: QuotaType,
        used_percent: f64,
    ) -> Result<Self, CoreError> {
        validate_percent(used_percent).map_err(|e| {
            CoreError::InvalidData(format!("{provider} {quota_type}: used {e}"))
        })?;
        Self::new(provider, quota_type, 100.0 - used_percent)
    }

    /// Creates a quota from a remaining fraction in `[0, 1]`.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidData` if the fraction is out of range.
    pub fn from_fraction(
        provider: ProviderKind,
        quota_type: QuotaType,
        fraction: f64,
    ) -> Result<Self, CoreError> {
        if !fraction.is_finite() || !(0.0..=1.0).contains(&fraction) {
            return Err(CoreError::InvalidData(format!(
                "{provider} {quota_type}: fraction {fraction} outside [0, 1]"
            )));
        }
        Self::new(provider, quota_type, fraction * 100.0)
    }

    /// Attaches a reset timestamp.
    #[must_use]
    pub fn with_resets_at(mut self, resets_at: DateTime<Utc>) -> Self {
        self.resets_at = Some(resets_at);
        self
    }

    /// Attaches a human-readable reset description.
    #[must_use]
    pub fn with_reset_description(mut self, description: impl Into<String>) -> Self {
        self.reset_description = Some(description.into());
        self
    }

    /// Percentage of the quota still available.
    pub fn percent_remaining(&self) -> f64 {
        self.percent_remaining
    }

    /// Percentage of the quota consumed.
    pub fn percent_used(&self) -> f64 {
        100.0 - self.percent_remaining
    }

    /// What this quota measures.
    pub fn quota_type(&self) -> &QuotaType {
        &self.quota_type
    }

    /// The provider that owns this quota.
    pub fn provider(&self) -> ProviderKind {
        self.provider
    }

    /// When the quota resets, if known.
    pub fn resets_at(&self) -> Option<DateTime<Utc>> {
        self.resets_at
    }

    /// Human-readable reset description, if known.
    pub fn reset_description(&self) -> Option<&str> {
        self.reset_description.as_deref()
    }
}

fn validate_percent(value: f64) -> Result<(), String> {
    if !value.is_finite() {
        return Err(format!("{value} is not a finite percentage"));
    }
    if !(0.0..=100.0).contains(&value) {
        return Err(format!("{value}% outside [0, 100]"));
    }
    Ok(())
}

// ============================================================================
// Usage Snapshot
// ============================================================================

/// The immutable result of one successful probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SnapshotRepr")]
pub struct UsageSnapshot {
    provider: ProviderKind,
    quotas: Vec<UsageQuota>,
    captured_at: DateTime<Utc>,
    source: FetchSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    account: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    plan: Option<String>,
}

#[derive(Deserialize)]
struct SnapshotRepr {
    provider: ProviderKind,
    quotas: Vec<UsageQuota>,
    captured_at: DateTime<Utc>,
    #[serde(default)]
    source: FetchSource,
    #[serde(default)]
    account: Option<String>,
    #[serde(default)]
    plan: Option<String>,
}

impl TryFrom<SnapshotRepr> for UsageSnapshot {
    type Error = CoreError;

    fn try_from(repr: SnapshotRepr) -> Result<Self, Self::Error> {
        let mut snapshot = UsageSnapshot::new(repr.provider, repr.quotas)?;
        snapshot.captured_at = repr.captured_at;
        snapshot.source = repr.source;
        snapshot.account = repr.account;
        snapshot.plan = repr.plan;
        Ok(snapshot)
    }
}

impl UsageSnapshot {
    /// Creates a snapshot captured now.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidData` if `quotas` is empty or contains a
    /// quota owned by another provider.
    pub fn new(provider: ProviderKind, quotas: Vec<UsageQuota>) -> Result<Self, CoreError> {
        if quotas.is_empty() {
            return Err(CoreError::InvalidData(format!(
                "{provider} snapshot has no quotas"
            )));
        }
        if let Some(foreign) = quotas.iter().find(|q| q.provider != provider) {
            return Err(CoreError::InvalidData(format!(
                "{} quota in {provider} snapshot",
                foreign.provider
            )));
        }
        Ok(Self {
            provider,
            quotas,
            captured_at: Utc::now(),
            source: FetchSource::default(),
            account: None,
            plan: None,
        })
    }

    /// Records how the data was obtained.
    #[must_use]
    pub fn with_source(mut self, source: FetchSource) -> Self {
        self.source = source;
        self
    }

    /// Records the account the data belongs to.
    #[must_use]
    pub fn with_account(mut self, account: Option<String>, plan: Option<String>) -> Self {
        self.account = account;
        self.plan = plan;
        self
    }

    /// The provider this snapshot belongs to.
    pub fn provider(&self) -> ProviderKind {
        self.provider
    }

    /// All quotas, in the order the probe reported them.
    pub fn quotas(&self) -> &[UsageQuota] {
        &self.quotas
    }

    /// When this snapshot was captured.
    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// How this snapshot was obtained.
    pub fn source(&self) -> FetchSource {
        self.source
    }

    /// Account email or name, if the probe reported one.
    pub fn account(&self) -> Option<&str> {
        self.account.as_deref()
    }

    /// Plan name, if the probe reported one.
    pub fn plan(&self) -> Option<&str> {
        self.plan.as_deref()
    }

    /// Finds a quota by type.
    pub fn quota(&self, quota_type: &QuotaType) -> Option<&UsageQuota> {
        self.quotas.iter().find(|q| &q.quota_type == quota_type)
    }

    /// The scarcest remaining percentage across all quotas.
    pub fn min_percent_remaining(&self) -> f64 {
        self.quotas
            .iter()
            .map(UsageQuota::percent_remaining)
            .fold(100.0, f64::min)
    }

    /// The quota that currently binds (lowest remaining).
    pub fn binding_quota(&self) -> &UsageQuota {
        self.quotas
            .iter()
            .min_by(|a, b| a.percent_remaining.total_cmp(&b.percent_remaining))
            .unwrap_or(&self.quotas[0])
    }

    /// Status derived from the binding quota.
    pub fn status(&self) -> QuotaStatus {
        QuotaStatus::classify(self.min_percent_remaining())
    }

    /// Age of this snapshot.
    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.captured_at
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn quota(pct: f64, t: QuotaType) -> UsageQuota {
        UsageQuota::new(ProviderKind::Claude, t, pct).unwrap()
    }

    #[test]
    fn test_quota_rejects_out_of_range() {
        assert!(UsageQuota::new(ProviderKind::Codex, QuotaType::Session, -0.1).is_err());
        assert!(UsageQuota::new(ProviderKind::Codex, QuotaType::Session, 100.5).is_err());
        assert!(UsageQuota::new(ProviderKind::Codex, QuotaType::Session, f64::NAN).is_err());
        assert!(UsageQuota::new(ProviderKind::Codex, QuotaType::Session, 0.0).is_ok());
        assert!(UsageQuota::new(ProviderKind::Codex, QuotaType::Session, 100.0).is_ok());
    }

    #[test]
    fn test_quota_from_used_and_fraction() {
        let q = UsageQuota::from_used_percent(ProviderKind::Codex, QuotaType::Weekly, 85.0)
            .unwrap();
        assert_eq!(q.percent_remaining(), 15.0);
        assert!(
            UsageQuota::from_used_percent(ProviderKind::Codex, QuotaType::Weekly, 120.0).is_err()
        );

        let q = UsageQuota::from_fraction(
            ProviderKind::Gemini,
            QuotaType::ModelSpecific("gemini-2.5-pro".into()),
            0.3,
        )
        .unwrap();
        assert!((q.percent_remaining() - 30.0).abs() < 1e-9);
        assert!(
            UsageQuota::from_fraction(ProviderKind::Gemini, QuotaType::Session, 1.2).is_err()
        );
    }

    #[test]
    fn test_snapshot_requires_quotas() {
        assert!(UsageSnapshot::new(ProviderKind::Claude, vec![]).is_err());
    }

    #[test]
    fn test_snapshot_rejects_foreign_quota() {
        let codex = UsageQuota::new(ProviderKind::Codex, QuotaType::Session, 50.0).unwrap();
        assert!(UsageSnapshot::new(ProviderKind::Claude, vec![codex]).is_err());
    }

    #[test]
    fn test_min_remaining_and_status() {
        let snapshot = UsageSnapshot::new(
            ProviderKind::Claude,
            vec![
                quota(72.0, QuotaType::Session),
                quota(18.0, QuotaType::Weekly),
                quota(90.0, QuotaType::ModelSpecific("Opus".into())),
            ],
        )
        .unwrap();

        assert_eq!(snapshot.min_percent_remaining(), 18.0);
        assert_eq!(snapshot.binding_quota().quota_type(), &QuotaType::Weekly);
        assert_eq!(snapshot.status(), QuotaStatus::Critical);
        assert!(snapshot.quota(&QuotaType::Session).is_some());
    }

    #[test]
    fn test_deserialize_rejects_invalid_percent() {
        let json = r#"{
            "percent_remaining": 140.0,
            "quota_type": {"type": "session"},
            "provider": "claude"
        }"#;
        assert!(serde_json::from_str::<UsageQuota>(json).is_err());
    }
}
