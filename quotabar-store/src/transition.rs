//! Status transitions between refreshes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use quotabar_core::{ProviderKind, QuotaStatus};

/// Direction of a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionDirection {
    /// Moved toward `Depleted`. Alert-worthy.
    Degrading,
    /// Moved toward `Healthy`, e.g. after a quota reset.
    Improving,
}

/// A provider's status changed between two refreshes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTransition {
    /// Provider whose status changed.
    pub provider: ProviderKind,
    /// Previous status; `None` on the first observation.
    pub from: Option<QuotaStatus>,
    /// New status.
    pub to: QuotaStatus,
    /// Whether things got worse or better.
    pub direction: TransitionDirection,
    /// Refresh that produced the new status.
    pub sequence: u64,
    /// When the change was applied.
    pub at: DateTime<Utc>,
}

impl StatusTransition {
    /// Compares two statuses and builds a transition if they differ.
    ///
    /// A first observation only counts when it is already Warning or worse.
    pub fn detect(
        provider: ProviderKind,
        from: Option<QuotaStatus>,
        to: QuotaStatus,
        sequence: u64,
    ) -> Option<Self> {
        let direction = match from {
            None if to.is_alert_worthy() => TransitionDirection::Degrading,
            None => return None,
            Some(prev) if to.severity() > prev.severity() => TransitionDirection::Degrading,
            Some(prev) if to.severity() < prev.severity() => TransitionDirection::Improving,
            Some(_) => return None,
        };

        Some(Self {
            provider,
            from,
            to,
            direction,
            sequence,
            at: Utc::now(),
        })
    }

    /// Returns true if this transition should reach the user.
    pub fn is_degrading(&self) -> bool {
        self.direction == TransitionDirection::Degrading
    }
}

impl std::fmt::Display for StatusTransition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.from {
            Some(from) => write!(f, "{}: {} -> {}", self.provider, from, self.to),
            None => write!(f, "{}: {}", self.provider, self.to),
        }
    }
}
