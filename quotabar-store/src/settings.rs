//! User settings.
//!
//! Stored as JSON at `<config_dir>/quotabar/settings.json`. Missing fields
//! take their defaults, so an empty object is a valid file.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use quotabar_core::ProviderKind;
use quotabar_providers::ProviderRegistry;

use crate::error::StoreError;
use crate::monitor::MonitorConfig;
use crate::persistence::{load_json_or_default, save_json};

/// Shortest accepted refresh interval.
pub const MIN_REFRESH_INTERVAL_SECS: u64 = 10;

// ============================================================================
// Settings Types
// ============================================================================

/// User preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Seconds between refreshes in `watch` mode.
    pub refresh_interval_secs: u64,

    /// Upper bound for a single probe call.
    pub probe_timeout_secs: u64,

    /// Upper bound for a whole refresh.
    pub refresh_deadline_secs: u64,

    /// Per-provider settings. Providers not listed are enabled.
    pub providers: BTreeMap<ProviderKind, ProviderSettings>,

    /// Log level used when neither `--verbose` nor `RUST_LOG` is given.
    pub log_level: LogLevel,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 300,
            probe_timeout_secs: 45,
            refresh_deadline_secs: 60,
            providers: ProviderKind::all()
                .iter()
                .map(|kind| (*kind, ProviderSettings::default()))
                .collect(),
            log_level: LogLevel::default(),
        }
    }
}

/// Per-provider settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// Whether the provider is probed.
    pub enabled: bool,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    /// Error level logging.
    Error,
    /// Warning level logging.
    #[default]
    Warn,
    /// Info level logging.
    Info,
    /// Debug level logging.
    Debug,
    /// Trace level logging.
    Trace,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Error => write!(f, "error"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Trace => write!(f, "trace"),
        }
    }
}

// ============================================================================
// Settings Operations
// ============================================================================

impl Settings {
    /// Loads settings, falling back to defaults if the file is missing or
    /// invalid.
    pub async fn load(path: &Path) -> Self {
        let settings: Self = load_json_or_default(path).await;
        debug!(path = %path.display(), "Settings loaded");
        settings
    }

    /// Validates and saves settings.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails or the file cannot be written.
    pub async fn save(&self, path: &Path) -> Result<(), StoreError> {
        self.validate()?;
        save_json(path, self).await?;
        info!(path = %path.display(), "Settings saved");
        Ok(())
    }

    /// Checks that timing values are usable.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Config` describing the first invalid value.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.refresh_interval_secs < MIN_REFRESH_INTERVAL_SECS {
            return Err(StoreError::Config(format!(
                "refresh_interval_secs must be at least {MIN_REFRESH_INTERVAL_SECS}"
            )));
        }
        if self.probe_timeout_secs == 0 {
            return Err(StoreError::Config("probe_timeout_secs must be positive".to_string()));
        }
        if self.refresh_deadline_secs == 0 {
            return Err(StoreError::Config(
                "refresh_deadline_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Checks if a provider is enabled.
    pub fn is_enabled(&self, provider: ProviderKind) -> bool {
        self.providers.get(&provider).is_none_or(|p| p.enabled)
    }

    /// Enables or disables a provider.
    pub fn set_enabled(&mut self, provider: ProviderKind, enabled: bool) {
        self.providers.entry(provider).or_default().enabled = enabled;
    }

    /// Interval for the external refresh scheduler.
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(MIN_REFRESH_INTERVAL_SECS))
    }

    /// Monitor timing derived from these settings.
    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            probe_timeout: Duration::from_secs(self.probe_timeout_secs.max(1)),
            refresh_deadline: Duration::from_secs(self.refresh_deadline_secs.max(1)),
        }
    }

    /// Copies provider enablement into a registry.
    pub async fn apply_to(&self, registry: &ProviderRegistry) {
        for kind in registry.ids().await {
            registry.set_enabled(kind, self.is_enabled(kind)).await;
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
