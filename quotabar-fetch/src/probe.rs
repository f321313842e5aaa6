//! The quota probe capability.

use async_trait::async_trait;
use quotabar_core::{ProbeError, ProviderKind, UsageSnapshot};

/// Queries one provider's current quota.
///
/// Implementations must be cheap to hold behind an `Arc` and safe to call
/// from any task. The monitor only ever sees `dyn QuotaProbe`.
#[async_trait]
pub trait QuotaProbe: Send + Sync {
    /// The provider this probe reports on.
    fn provider(&self) -> ProviderKind;

    /// Returns true if the probe can plausibly run on this machine.
    ///
    /// Must not spawn processes or do network I/O; existence checks only.
    fn is_available(&self) -> bool;

    /// Fetches a fresh snapshot.
    async fn probe(&self) -> Result<UsageSnapshot, ProbeError>;

    /// Releases long-lived resources such as helper subprocesses.
    async fn shutdown(&self) {}
}
