// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `QuotaBar` Core
//!
//! Core types and models for the `QuotaBar` quota monitor.
//!
//! This crate provides the foundational abstractions used across all other
//! `QuotaBar` crates:
//!
//! - Domain models (providers, quotas, snapshots, status)
//! - Error types shared by every probe
//!
//! ## Key Types
//!
//! - [`ProviderKind`] - Enum of supported providers
//! - [`UsageQuota`] - One remaining-percentage measurement (validated)
//! - [`UsageSnapshot`] - Immutable result of one successful probe
//! - [`QuotaStatus`] - Healthy / Warning / Critical / Depleted
//! - [`ProbeError`] - The four ways a probe can fail

pub mod error;
pub mod models;

pub use error::{CoreError, ProbeError, ProbeErrorKind};

pub use models::{
    FetchSource, ProviderKind, QuotaStatus, QuotaType, UsageQuota, UsageSnapshot,
    CRITICAL_THRESHOLD, WARNING_THRESHOLD,
};
