// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # QuotaBar Store
//!
//! State management for QuotaBar.
//!
//! This crate provides:
//!
//! - **QuotaMonitor**: Refresh cycles, per-provider state and transition events
//! - **Settings**: User preferences with persistence
//! - **Persistence**: File I/O helpers for JSON data
//!
//! ## Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use quotabar_providers::ProviderRegistry;
//! use quotabar_store::{QuotaMonitor, Settings, default_settings_path};
//!
//! let settings = Settings::load(&default_settings_path()).await;
//! let registry = Arc::new(ProviderRegistry::with_defaults());
//! settings.apply_to(&registry).await;
//!
//! let monitor = QuotaMonitor::new(registry, settings.monitor_config());
//! let mut alerts = monitor.subscribe();
//! let report = monitor.refresh().await;
//! ```

pub mod error;
pub mod monitor;
pub mod persistence;
pub mod settings;
pub mod transition;

pub use error::StoreError;
pub use monitor::{
    MonitorConfig, ProbeOutcome, ProviderHealth, ProviderState, QuotaMonitor, RefreshReport,
};
pub use persistence::{default_config_dir, default_settings_path, load_json, load_json_or_default, save_json};
pub use settings::{LogLevel, MIN_REFRESH_INTERVAL_SECS, ProviderSettings, Settings};
pub use transition::{StatusTransition, TransitionDirection};
