//! Conversion of app-server rate limits into a snapshot.

use chrono::{DateTime, Utc};
use tracing::debug;

use quotabar_core::{FetchSource, ProbeError, ProviderKind, QuotaType, UsageQuota, UsageSnapshot};

use super::error::CodexError;
use super::rpc::{AccountInfo, RateLimitWindow, RateLimitsResult};
use crate::reset::describe_reset;

fn window_quota(
    window: &RateLimitWindow,
    quota_type: QuotaType,
    now: DateTime<Utc>,
) -> Result<UsageQuota, ProbeError> {
    let mut quota = UsageQuota::from_used_percent(ProviderKind::Codex, quota_type, window.used_percent)?;
    if let Some(resets_at) = window.resets_at {
        quota = quota.with_reset_description(describe_reset(resets_at, now));
        if let Some(at) = DateTime::from_timestamp(resets_at, 0) {
            quota = quota.with_resets_at(at);
        }
    }
    Ok(quota)
}

fn is_free_or_unlimited(result: &RateLimitsResult, account: Option<&AccountInfo>) -> bool {
    let plan_is_free = |plan: Option<&str>| plan.is_some_and(|p| p.eq_ignore_ascii_case("free"));

    let limits = result.rate_limits.as_ref();
    plan_is_free(limits.and_then(|l| l.plan_type.as_deref()))
        || plan_is_free(account.and_then(|a| a.plan_type.as_deref()))
        || limits
            .and_then(|l| l.credits.as_ref())
            .and_then(|c| c.unlimited)
            .unwrap_or(false)
}

/// Builds a snapshot from an `account/rateLimits/read` result.
///
/// `primary` becomes the session quota and `secondary` the weekly one.
/// A free or unlimited plan without windows reports a single full session
/// quota.
///
/// # Errors
///
/// - [`ProbeError::ParseFailed`] if there are no windows and no plan
///   information, or a percentage is out of range
pub fn parse_rate_limits(
    result: &RateLimitsResult,
    account: Option<&AccountInfo>,
    now: DateTime<Utc>,
) -> Result<UsageSnapshot, ProbeError> {
    let mut quotas = Vec::new();

    if let Some(limits) = &result.rate_limits {
        if let Some(primary) = &limits.primary {
            quotas.push(window_quota(primary, QuotaType::Session, now)?);
        }
        if let Some(secondary) = &limits.secondary {
            quotas.push(window_quota(secondary, QuotaType::Weekly, now)?);
        }
    }

    if quotas.is_empty() {
        if !is_free_or_unlimited(result, account) {
            return Err(CodexError::NoData.into());
        }
        debug!("No windows on a free/unlimited plan, reporting full session quota");
        quotas.push(UsageQuota::new(ProviderKind::Codex, QuotaType::Session, 100.0)?);
    }

    let plan = result
        .rate_limits
        .as_ref()
        .and_then(|l| l.plan_type.clone())
        .or_else(|| account.and_then(|a| a.plan_type.clone()));
    let email = account.and_then(|a| a.email.clone());

    Ok(UsageSnapshot::new(ProviderKind::Codex, quotas)?
        .with_source(FetchSource::Rpc)
        .with_account(email, plan))
}
