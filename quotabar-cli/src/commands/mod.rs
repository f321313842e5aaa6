//! CLI command implementations.

pub mod config;
pub mod providers;
pub mod usage;
pub mod watch;

use std::sync::Arc;

use quotabar_core::ProviderKind;
use quotabar_providers::ProviderRegistry;
use quotabar_store::{QuotaMonitor, Settings};

/// Builds a registry with settings applied.
///
/// With `only` set, every other provider is disabled for this run.
pub(crate) async fn build_registry(
    settings: &Settings,
    only: Option<ProviderKind>,
) -> Arc<ProviderRegistry> {
    let registry = Arc::new(ProviderRegistry::with_defaults());
    settings.apply_to(&registry).await;

    if let Some(selected) = only {
        for kind in registry.ids().await {
            registry.set_enabled(kind, kind == selected).await;
        }
    }

    registry
}

/// Builds a monitor over a freshly configured registry.
pub(crate) async fn build_monitor(settings: &Settings, only: Option<ProviderKind>) -> QuotaMonitor {
    let registry = build_registry(settings, only).await;
    QuotaMonitor::new(registry, settings.monitor_config())
}
