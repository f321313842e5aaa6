// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # QuotaBar Providers
//!
//! Quota probes for each supported AI CLI, and the registry that holds them.
//!
//! | Provider | Source | Quotas |
//! |----------|--------|--------|
//! | Claude (Anthropic) | `claude` CLI `/usage` screen on a PTY | session, weekly, per model |
//! | Codex (OpenAI) | `codex app-server` JSON-RPC | session, weekly |
//! | Gemini (Google) | Cloud Code quota API, `gemini` CLI `/stats` fallback | per model |
//!
//! Every probe implements [`quotabar_fetch::QuotaProbe`]; callers only see
//! `Arc<dyn QuotaProbe>`.
//!
//! ## Usage
//!
//! ```ignore
//! use quotabar_providers::ProviderRegistry;
//!
//! let registry = ProviderRegistry::with_defaults();
//! for (kind, probe) in registry.enabled_probes().await {
//!     println!("{kind}: {:?}", probe.probe().await);
//! }
//! ```

pub mod registry;
pub mod reset;

// Provider modules (alphabetical)
pub mod claude;
pub mod codex;
pub mod gemini;


pub use claude::ClaudeCliProbe;
pub use codex::CodexRpcProbe;
pub use gemini::GeminiProbe;
pub use registry::{ProviderInfo, ProviderRecord, ProviderRegistry};
pub use reset::describe_reset;
