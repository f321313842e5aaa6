//! PTY-based command execution for interactive CLI tools.
//!
//! Interactive tools like `claude` and `gemini` refuse to print their usage
//! screens unless they are attached to a terminal. [`PtyRunner`] spawns them
//! on a pseudo-terminal, plays a scripted conversation and captures what they
//! print.
//!
//! # Completion
//!
//! A run completes when one of these happens first:
//!
//! - the child exits or the PTY reaches EOF
//! - a stop pattern appears in the output (followed by a short settle delay)
//! - no output arrives for the idle-quiescence period, when one is set
//!
//! If none happens within [`PtyOptions::timeout`] the child is killed and
//! [`PtyError::Timeout`] is returned. Dropping the future returned by
//! [`PtyRunner::execute`] also kills the child.
//!
//! # Example
//!
//! ```no_run
//! use quotabar_fetch::host::pty::{PtyOptions, PtyRunner};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let runner = PtyRunner::default();
//! let options = PtyOptions::with_timeout(Duration::from_secs(20))
//!     .send_on("Press Enter", "\r")
//!     .stop_on("Current week");
//!
//! let result = runner.execute("claude", "/usage\r", options).await?;
//! println!("{}", result.output);
//! # Ok(())
//! # }
//! ```

use portable_pty::{ChildKiller, CommandBuilder, PtySize, native_pty_system};
use std::collections::{HashMap, HashSet};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, trace, warn};

use super::locate::locate;
use crate::error::PtyError;

// ============================================================================
// Constants
// ============================================================================

/// Default terminal width in columns. Wide enough that usage tables don't wrap.
const DEFAULT_COLS: u16 = 160;

/// Default terminal height in rows.
const DEFAULT_ROWS: u16 = 50;

/// Default overall timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Buffer size for reading from PTY.
const READ_BUFFER_SIZE: usize = 4096;

/// Polling interval for checking output.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Settle time after stop pattern detected.
const DEFAULT_SETTLE_TIME: Duration = Duration::from_millis(300);

// ============================================================================
// PTY Options
// ============================================================================

/// Configuration options for PTY command execution.
#[derive(Debug, Clone)]
pub struct PtyOptions {
    /// Maximum time to wait for completion before the child is killed.
    pub timeout: Duration,

    /// Treat this long without output as completion. Disabled if `None`.
    pub idle_timeout: Option<Duration>,

    /// Working directory for the command.
    pub working_dir: Option<PathBuf>,

    /// Arguments to pass to the command.
    pub args: Vec<String>,

    /// Environment variables to set for the command.
    pub env: HashMap<String, String>,

    /// Substrings that end the run once they appear in the output.
    pub stop_on_substrings: Vec<String>,

    /// Trigger substring to reply text. Each trigger fires at most once.
    pub send_on_substrings: Vec<(String, String)>,

    /// Time to keep reading after a stop pattern matched.
    pub settle_after_stop: Duration,

    /// Whether to strip ANSI escape codes from the output.
    pub strip_ansi: bool,
}

impl Default for PtyOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            idle_timeout: None,
            working_dir: None,
            args: Vec::new(),
            env: HashMap::new(),
            stop_on_substrings: Vec::new(),
            send_on_substrings: Vec::new(),
            settle_after_stop: DEFAULT_SETTLE_TIME,
            strip_ansi: true,
        }
    }
}

impl PtyOptions {
    /// Create options with just a timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Default::default()
        }
    }

    /// Add an argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add a stop pattern.
    pub fn stop_on(mut self, pattern: impl Into<String>) -> Self {
        self.stop_on_substrings.push(pattern.into());
        self
    }

    /// Add a trigger/reply rule.
    pub fn send_on(mut self, trigger: impl Into<String>, reply: impl Into<String>) -> Self {
        self.send_on_substrings.push((trigger.into(), reply.into()));
        self
    }

    /// Set the working directory.
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Add an environment variable.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set the idle-quiescence period.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Set the settle delay after a stop pattern.
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle_after_stop = settle;
        self
    }
}

// ============================================================================
// PTY Result
// ============================================================================

/// Result of a completed PTY run.
#[derive(Debug, Clone)]
pub struct PtyResult {
    /// Combined output (stdout + stderr via PTY).
    pub output: String,

    /// Exit code, if the child exited on its own.
    pub exit_code: Option<i32>,

    /// How long the run took.
    pub duration: Duration,

    /// The stop pattern that ended the run, if any.
    pub stopped_on_pattern: Option<String>,

    /// Whether the run ended through idle quiescence.
    pub idle_timed_out: bool,
}

impl PtyResult {
    /// Returns true if the child exited with code 0.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

// ============================================================================
// PTY Runner
// ============================================================================

/// PTY-based command runner for interactive CLI tools.
#[derive(Debug, Clone)]
pub struct PtyRunner {
    cols: u16,
    rows: u16,
}

impl Default for PtyRunner {
    fn default() -> Self {
        Self::new(DEFAULT_COLS, DEFAULT_ROWS)
    }
}

/// Sets the cancel flag when the owning future is dropped.
struct CancelOnDrop(Arc<AtomicBool>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl PtyRunner {
    /// Create a new PTY runner with the specified terminal size.
    pub fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }

    /// Run a command in a PTY and capture its output.
    ///
    /// `binary` is resolved with [`locate`]. `input` is written once right
    /// after spawn (it may be empty).
    #[instrument(skip(self, input, options), fields(binary = %binary))]
    pub async fn execute(
        &self,
        binary: &str,
        input: &str,
        options: PtyOptions,
    ) -> Result<PtyResult, PtyError> {
        let binary_path = locate(binary).ok_or_else(|| {
            warn!(binary = %binary, "Binary not found");
            PtyError::NotFound(binary.to_string())
        })?;

        debug!(
            binary_path = %binary_path.display(),
            timeout = ?options.timeout,
            idle_timeout = ?options.idle_timeout,
            "Starting PTY command"
        );

        let cancelled = Arc::new(AtomicBool::new(false));
        let _guard = CancelOnDrop(Arc::clone(&cancelled));

        let session = PtySession {
            binary_path,
            input: input.to_string(),
            cols: self.cols,
            rows: self.rows,
            options,
            cancelled,
        };

        let result = tokio::task::spawn_blocking(move || session.run())
            .await
            .map_err(|e| PtyError::SpawnFailed(format!("Task join error: {e}")))??;

        debug!(
            duration = ?result.duration,
            exit_code = ?result.exit_code,
            output_len = result.output.len(),
            stopped_on = ?result.stopped_on_pattern,
            "PTY command completed"
        );

        Ok(result)
    }
}

// ============================================================================
// Blocking PTY Implementation
// ============================================================================

#[derive(Debug)]
enum PtyMessage {
    Data(Vec<u8>),
    Error(std::io::Error),
    Closed,
}

struct PtySession {
    binary_path: PathBuf,
    input: String,
    cols: u16,
    rows: u16,
    options: PtyOptions,
    cancelled: Arc<AtomicBool>,
}

impl PtySession {
    fn run(self) -> Result<PtyResult, PtyError> {
        let start = Instant::now();
        let options = &self.options;

        let pair = native_pty_system()
            .openpty(PtySize {
                rows: self.rows,
                cols: self.cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| PtyError::CreateFailed(e.to_string()))?;

        let mut cmd = CommandBuilder::new(&self.binary_path);
        cmd.args(&options.args);
        if let Some(ref dir) = options.working_dir {
            cmd.cwd(dir);
        }
        for (key, value) in &options.env {
            cmd.env(key, value);
        }
        cmd.env("TERM", "xterm-256color");

        let mut child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| PtyError::SpawnFailed(e.to_string()))?;
        drop(pair.slave);

        let mut writer = pair
            .master
            .take_writer()
            .map_err(|e| PtyError::CreateFailed(format!("Failed to get PTY writer: {e}")))?;
        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| PtyError::CreateFailed(format!("Failed to get PTY reader: {e}")))?;

        let (tx, rx) = mpsc::channel::<PtyMessage>();
        thread::spawn(move || read_pty_output(reader, &tx));

        if !self.input.is_empty() {
            trace!(input_len = self.input.len(), "Sending input to PTY");
            writer.write_all(self.input.as_bytes())?;
            writer.flush()?;
        }

        let mut output_bytes = Vec::new();
        let mut last_output = Instant::now();
        let mut stopped_on_pattern: Option<String> = None;
        let mut stop_time: Option<Instant> = None;
        let mut fired: HashSet<usize> = HashSet::new();
        let mut idle_timed_out = false;

        loop {
            if self.cancelled.load(Ordering::SeqCst) {
                debug!("PTY run cancelled");
                let _ = child.kill();
                return Err(PtyError::Cancelled);
            }

            if start.elapsed() >= options.timeout {
                debug!("Overall timeout reached");
                let _ = child.kill();
                return Err(PtyError::Timeout(options.timeout));
            }

            if let Some(stop_instant) = stop_time {
                if stop_instant.elapsed() >= options.settle_after_stop {
                    debug!(pattern = ?stopped_on_pattern, "Stop pattern settle time elapsed");
                    break;
                }
            }

            if let Some(idle) = options.idle_timeout {
                if stop_time.is_none() && last_output.elapsed() >= idle {
                    debug!("Output quiescent");
                    idle_timed_out = true;
                    break;
                }
            }

            match rx.recv_timeout(POLL_INTERVAL) {
                Ok(PtyMessage::Data(data)) => {
                    last_output = Instant::now();
                    output_bytes.extend_from_slice(&data);
                    let current = String::from_utf8_lossy(&output_bytes);

                    if stop_time.is_none() {
                        if let Some(pattern) = options
                            .stop_on_substrings
                            .iter()
                            .find(|p| current.contains(p.as_str()))
                        {
                            debug!(pattern = %pattern, "Stop pattern matched");
                            stopped_on_pattern = Some(pattern.clone());
                            stop_time = Some(Instant::now());
                        }
                    }

                    for (index, (trigger, reply)) in options.send_on_substrings.iter().enumerate() {
                        if !fired.contains(&index) && current.contains(trigger.as_str()) {
                            debug!(trigger = %trigger, "Send pattern matched");
                            fired.insert(index);
                            if let Err(e) = writer.write_all(reply.as_bytes()) {
                                warn!(error = %e, "Failed to send reply");
                            }
                            let _ = writer.flush();
                        }
                    }
                }
                Ok(PtyMessage::Error(e)) => {
                    debug!(error = %e, "PTY read ended with error");
                    break;
                }
                Ok(PtyMessage::Closed) | Err(mpsc::RecvTimeoutError::Disconnected) => {
                    debug!("PTY closed");
                    break;
                }
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    if let Ok(Some(_)) = child.try_wait() {
                        thread::sleep(POLL_INTERVAL);
                        while let Ok(msg) = rx.try_recv() {
                            if let PtyMessage::Data(data) = msg {
                                output_bytes.extend_from_slice(&data);
                            }
                        }
                        break;
                    }
                }
            }
        }

        let exit_code = reap(child.as_mut(), stopped_on_pattern.is_none() && !idle_timed_out);

        Ok(PtyResult {
            output: process_output(&output_bytes, options.strip_ansi),
            exit_code,
            duration: start.elapsed(),
            stopped_on_pattern,
            idle_timed_out,
        })
    }
}

/// Collects the exit code, killing the child if it is still running.
///
/// After EOF the child may not have been reaped yet, so it gets a short grace
/// period before the kill.
fn reap(child: &mut (dyn portable_pty::Child + Send + Sync), expect_exit: bool) -> Option<i32> {
    let attempts = if expect_exit { 10 } else { 1 };
    for _ in 0..attempts {
        if let Ok(Some(status)) = child.try_wait() {
            return i32::try_from(status.exit_code()).ok();
        }
        if expect_exit {
            thread::sleep(Duration::from_millis(20));
        }
    }
    let _ = child.kill();
    None
}

fn read_pty_output(mut reader: Box<dyn Read + Send>, tx: &mpsc::Sender<PtyMessage>) {
    let mut buffer = [0u8; READ_BUFFER_SIZE];

    loop {
        match reader.read(&mut buffer) {
            Ok(0) => {
                let _ = tx.send(PtyMessage::Closed);
                break;
            }
            Ok(n) => {
                if tx.send(PtyMessage::Data(buffer[..n].to_vec())).is_err() {
                    break;
                }
            }
            Err(e) => {
                let _ = tx.send(PtyMessage::Error(e));
                break;
            }
        }
    }
}

fn process_output(bytes: &[u8], strip_ansi: bool) -> String {
    if strip_ansi {
        strip_ansi_codes(&String::from_utf8_lossy(bytes))
    } else {
        String::from_utf8_lossy(bytes).into_owned()
    }
}

/// Strip ANSI escape codes from text.
pub fn strip_ansi_codes(text: &str) -> String {
    let stripped = strip_ansi_escapes::strip(text.as_bytes());
    String::from_utf8_lossy(&stripped).into_owned()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_ansi_codes() {
        assert_eq!(strip_ansi_codes("\x1b[31mRed\x1b[0m Normal"), "Red Normal");
        assert_eq!(strip_ansi_codes("\x1b[2J\x1b[HHello"), "Hello");
        assert_eq!(strip_ansi_codes("Just plain text"), "Just plain text");
    }

    #[test]
    fn test_pty_options_builder() {
        let opts = PtyOptions::with_timeout(Duration::from_secs(60))
            .arg("--verbose")
            .stop_on("Done")
            .send_on("Press Enter", "\r")
            .in_dir("/tmp")
            .with_env("MY_VAR", "value")
            .with_idle_timeout(Duration::from_secs(5));

        assert_eq!(opts.timeout, Duration::from_secs(60));
        assert_eq!(opts.args, vec!["--verbose"]);
        assert_eq!(opts.stop_on_substrings, vec!["Done"]);
        assert_eq!(
            opts.send_on_substrings,
            vec![("Press Enter".to_string(), "\r".to_string())]
        );
        assert_eq!(opts.working_dir, Some(PathBuf::from("/tmp")));
        assert_eq!(opts.idle_timeout, Some(Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn test_execute_not_found() {
        let runner = PtyRunner::default();
        let result = runner
            .execute(
                "definitely_not_a_real_command_xyz123",
                "",
                PtyOptions::default(),
            )
            .await;

        assert!(matches!(result, Err(PtyError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_execute_captures_output_until_exit() {
        let runner = PtyRunner::default();
        let options = PtyOptions::with_timeout(Duration::from_secs(10))
            .arg("-c")
            .arg("echo quota-line 42%");

        let result = runner.execute("sh", "", options).await.unwrap();

        assert!(result.output.contains("quota-line 42%"));
        assert_eq!(result.exit_code, Some(0));
    }

    #[tokio::test]
    async fn test_execute_timeout_is_error() {
        let runner = PtyRunner::default();
        let options = PtyOptions::with_timeout(Duration::from_millis(300))
            .arg("-c")
            .arg("sleep 10");

        let result = runner.execute("sh", "", options).await;

        assert!(matches!(result, Err(PtyError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_execute_idle_quiescence_completes() {
        let runner = PtyRunner::default();
        let options = PtyOptions::with_timeout(Duration::from_secs(10))
            .with_idle_timeout(Duration::from_millis(300));

        let result = runner.execute("cat", "", options).await.unwrap();

        assert!(result.idle_timed_out);
        assert_eq!(result.exit_code, None);
    }

    #[tokio::test]
    async fn test_execute_stop_pattern() {
        let runner = PtyRunner::default();
        let options = PtyOptions::with_timeout(Duration::from_secs(10))
            .arg("-c")
            .arg("echo ready; sleep 10")
            .stop_on("ready")
            .with_settle(Duration::from_millis(50));

        let result = runner.execute("sh", "", options).await.unwrap();

        assert_eq!(result.stopped_on_pattern.as_deref(), Some("ready"));
    }

    #[tokio::test]
    async fn test_execute_replies_to_trigger_once() {
        let runner = PtyRunner::default();
        let options = PtyOptions::with_timeout(Duration::from_secs(10))
            .arg("-c")
            .arg("printf 'Continue? '; read answer; echo got-$answer")
            .send_on("Continue?", "yes\r");

        let result = runner.execute("sh", "", options).await.unwrap();

        assert!(result.output.contains("got-yes"));
    }

    #[tokio::test]
    async fn test_dropping_future_cancels_run() {
        let runner = PtyRunner::default();
        let options = PtyOptions::with_timeout(Duration::from_secs(30))
            .arg("-c")
            .arg("sleep 30");

        let started = Instant::now();
        let outcome =
            tokio::time::timeout(Duration::from_millis(200), runner.execute("sh", "", options))
                .await;

        assert!(outcome.is_err());
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
