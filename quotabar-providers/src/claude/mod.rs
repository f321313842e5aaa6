//! Claude (Anthropic) provider.
//!
//! Usage is read from the interactive `claude` CLI: the probe starts it on a
//! pseudo-terminal, types `/usage`, answers the trust-folder and
//! "Press Enter" prompts, and parses the rendered screen into session,
//! weekly and per-model quotas.
//!
//! ```ignore
//! use quotabar_providers::claude::ClaudeCliProbe;
//! use quotabar_fetch::QuotaProbe;
//!
//! let snapshot = ClaudeCliProbe::new().probe().await?;
//! ```

pub(crate) mod parser;
mod probe;

pub use parser::parse_usage_output;
pub use probe::{CLAUDE_BINARY, ClaudeCliProbe};
