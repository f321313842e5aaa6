//! Gemini (Google) provider.
//!
//! Two sources, chosen per call:
//!
//! - **Quota API** (when `~/.gemini/oauth_creds.json` exists): one `POST` to
//!   the Cloud Code `retrieveUserQuota` endpoint with the stored OAuth token.
//!   Expired tokens are refreshed in memory only.
//! - **CLI table** (no credentials, `gemini` installed): the CLI is run on a
//!   pseudo-terminal with `/stats` and the per-model rows are parsed.
//!
//! Quotas are reported per model (`ModelSpecific`).

mod api;
mod credentials;
mod error;
mod probe;
pub(crate) mod table;

pub use api::{GeminiApiClient, QuotaBucket, QuotaResponse, parse_quota_response};
pub use credentials::{GeminiAuthType, GeminiCredentials, GeminiPaths};
pub use error::GeminiError;
pub use probe::{GEMINI_BINARY, GeminiProbe, GeminiSource};
pub use table::{parse_stats_table, strip_ansi};
