// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `QuotaBar` Fetch
//!
//! Host APIs and the probe capability shared by all `QuotaBar` providers.
//!
//! ## Host APIs
//!
//! - [`host::locate`] - Find CLI binaries without spawning anything
//! - [`host::pty`] - Drive interactive CLIs on a pseudo-terminal
//! - [`host::rpc`] - Newline-delimited transport to helper subprocesses
//!
//! ## Probes
//!
//! - [`probe::QuotaProbe`] - Trait every provider implements

pub mod error;
pub mod host;
pub mod probe;

pub use error::{PtyError, RpcError};

pub use host::{
    locate::{exists, locate, locate_in},
    pty::{PtyOptions, PtyResult, PtyRunner},
    rpc::LineTransport,
};

pub use probe::QuotaProbe;
