//! Registry of provider probes and their enablement.
//!
//! The registry owns one probe instance per provider. Long-lived probe state
//! (such as the Codex app-server session) lives as long as the registry, or
//! until [`ProviderRegistry::shutdown`].

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use quotabar_core::ProviderKind;
use quotabar_fetch::QuotaProbe;

use crate::claude::ClaudeCliProbe;
use crate::codex::CodexRpcProbe;
use crate::gemini::GeminiProbe;

// ============================================================================
// Records
// ============================================================================

/// A probe together with its enabled flag.
#[derive(Clone)]
pub struct ProviderRecord {
    probe: Arc<dyn QuotaProbe>,
    enabled: bool,
}

impl ProviderRecord {
    /// Wraps a probe.
    pub fn new(probe: Arc<dyn QuotaProbe>, enabled: bool) -> Self {
        Self { probe, enabled }
    }

    /// The provider this record probes.
    pub fn kind(&self) -> ProviderKind {
        self.probe.provider()
    }
}

impl std::fmt::Debug for ProviderRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRecord")
            .field("kind", &self.kind())
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

/// Listing entry for a registered provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderInfo {
    /// Provider identity.
    pub id: ProviderKind,
    /// Human-readable name.
    pub name: String,
    /// Included in the next refresh.
    pub enabled: bool,
    /// CLI or credentials found on this machine.
    pub available: bool,
}

// ============================================================================
// Registry
// ============================================================================

/// The set of known providers.
///
/// Enablement is read once at the start of each refresh, so a change only
/// affects the next one.
#[derive(Debug)]
pub struct ProviderRegistry {
    records: RwLock<Vec<ProviderRecord>>,
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ProviderRegistry {
    /// Claude, Codex and Gemini with their default probes, all enabled.
    pub fn with_defaults() -> Self {
        Self::new(vec![
            ProviderRecord::new(Arc::new(ClaudeCliProbe::new()), true),
            ProviderRecord::new(Arc::new(CodexRpcProbe::new()), true),
            ProviderRecord::new(Arc::new(GeminiProbe::new()), true),
        ])
    }

    /// A registry over the given records.
    ///
    /// A later record for the same provider replaces an earlier one.
    pub fn new(records: Vec<ProviderRecord>) -> Self {
        let mut unique: Vec<ProviderRecord> = Vec::with_capacity(records.len());
        for record in records {
            if let Some(existing) = unique.iter_mut().find(|r| r.kind() == record.kind()) {
                *existing = record;
            } else {
                unique.push(record);
            }
        }
        Self {
            records: RwLock::new(unique),
        }
    }

    /// Enables or disables a provider. Returns false if it isn't registered.
    pub async fn set_enabled(&self, kind: ProviderKind, enabled: bool) -> bool {
        let mut records = self.records.write().await;
        let Some(record) = records.iter_mut().find(|r| r.kind() == kind) else {
            return false;
        };
        if record.enabled != enabled {
            info!(provider = %kind, enabled, "Provider enablement changed");
        }
        record.enabled = enabled;
        true
    }

    /// Returns true if the provider is registered and enabled.
    pub async fn is_enabled(&self, kind: ProviderKind) -> bool {
        self.records
            .read()
            .await
            .iter()
            .any(|r| r.kind() == kind && r.enabled)
    }

    /// All registered providers, in registration order.
    pub async fn ids(&self) -> Vec<ProviderKind> {
        self.records.read().await.iter().map(ProviderRecord::kind).collect()
    }

    /// Listing of every provider. Availability checks are existence checks
    /// only.
    pub async fn records(&self) -> Vec<ProviderInfo> {
        self.records
            .read()
            .await
            .iter()
            .map(|r| {
                let id = r.kind();
                ProviderInfo {
                    id,
                    name: id.display_name().to_string(),
                    enabled: r.enabled,
                    available: r.probe.is_available(),
                }
            })
            .collect()
    }

    /// The probes of enabled providers, copied at call time.
    pub async fn enabled_probes(&self) -> Vec<(ProviderKind, Arc<dyn QuotaProbe>)> {
        self.records
            .read()
            .await
            .iter()
            .filter(|r| r.enabled)
            .map(|r| (r.kind(), Arc::clone(&r.probe)))
            .collect()
    }

    /// Shuts every probe down.
    pub async fn shutdown(&self) {
        let probes: Vec<_> = self
            .records
            .read()
            .await
            .iter()
            .map(|r| Arc::clone(&r.probe))
            .collect();
        for probe in probes {
            debug!(provider = %probe.provider(), "Shutting down probe");
            probe.shutdown().await;
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
