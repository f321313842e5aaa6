//! Host APIs used by quota probes.
//!
//! - [`locate`] - Binary discovery in well-known install directories and `PATH`
//! - [`pty`] - PTY-based execution for interactive CLI tools
//! - [`rpc`] - Newline-delimited message transport over subprocess stdio

pub mod locate;
pub mod pty;
pub mod rpc;

pub use locate::{exists, locate, locate_in, well_known_dirs};
pub use pty::{PtyOptions, PtyResult, PtyRunner, strip_ansi_codes};
pub use rpc::LineTransport;
