//! Codex (OpenAI) provider.
//!
//! Rate limits are read over JSON-RPC from a long-lived
//! `codex -s read-only -a untrusted app-server` subprocess:
//!
//! 1. `initialize` (client info), then the `initialized` notification
//! 2. `account/read` once per session for email and plan
//! 3. `account/rateLimits/read` on every probe
//!
//! The `primary` window maps to the session quota and `secondary` to the
//! weekly quota.

mod error;
pub(crate) mod parser;
mod probe;
pub(crate) mod rpc;

pub use error::CodexError;
pub use parser::parse_rate_limits;
pub use probe::{CODEX_BINARY, CodexRpcProbe};
pub use rpc::{AccountInfo, CodexRpcClient, RateLimitWindow, RateLimits, RateLimitsResult};
