//! Domain models for QuotaBar.
//!
//! ## Submodules
//!
//! - [`provider`] - Provider identity ([`ProviderKind`])
//! - [`usage`] - Usage types ([`UsageSnapshot`], [`UsageQuota`], [`QuotaType`])
//! - [`status`] - Status and fetch types ([`QuotaStatus`], [`FetchSource`])

mod provider;
mod status;
mod usage;

pub use provider::ProviderKind;
pub use status::{CRITICAL_THRESHOLD, FetchSource, QuotaStatus, WARNING_THRESHOLD};
pub use usage::{QuotaType, UsageQuota, UsageSnapshot};
