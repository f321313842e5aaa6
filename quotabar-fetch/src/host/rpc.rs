//! Line-delimited message transport over a subprocess's stdio.
//!
//! [`LineTransport`] frames opaque byte payloads as newline-terminated
//! messages. It knows nothing about JSON-RPC; protocol clients build on top.
//!
//! ```no_run
//! use quotabar_fetch::host::rpc::LineTransport;
//!
//! # async fn example() -> Result<(), quotabar_fetch::RpcError> {
//! let mut transport = LineTransport::spawn("/usr/local/bin/codex", &["app-server"])?;
//! transport.send(br#"{"id":1,"method":"initialize","params":{}}"#).await?;
//! let reply = transport.receive().await?;
//! transport.close().await;
//! # let _ = reply;
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, instrument, trace};

use crate::error::RpcError;

type BoxedReader = Box<dyn AsyncRead + Unpin + Send>;
type BoxedWriter = Box<dyn AsyncWrite + Unpin + Send>;

/// Bidirectional newline-delimited message channel.
pub struct LineTransport {
    reader: BufReader<BoxedReader>,
    writer: Option<BoxedWriter>,
    child: Option<Child>,
}

impl std::fmt::Debug for LineTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineTransport")
            .field("closed", &self.is_closed())
            .field("pid", &self.child.as_ref().and_then(Child::id))
            .finish_non_exhaustive()
    }
}

impl LineTransport {
    /// Spawns `binary` with piped stdin/stdout and discarded stderr.
    ///
    /// The child is killed when the transport is dropped.
    #[instrument(skip(args), fields(binary = %binary.as_ref().display()))]
    pub fn spawn(binary: impl AsRef<Path>, args: &[&str]) -> Result<Self, RpcError> {
        let mut child = Command::new(binary.as_ref())
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RpcError::Spawn(e.to_string()))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| RpcError::Spawn("stdin not captured".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RpcError::Spawn("stdout not captured".to_string()))?;

        debug!(pid = ?child.id(), "Transport subprocess spawned");

        let mut transport = Self::from_streams(stdout, stdin);
        transport.child = Some(child);
        Ok(transport)
    }

    /// Wraps an existing reader/writer pair.
    pub fn from_streams<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        Self {
            reader: BufReader::new(Box::new(reader) as BoxedReader),
            writer: Some(Box::new(writer) as BoxedWriter),
            child: None,
        }
    }

    /// Writes `payload` followed by a newline and flushes.
    pub async fn send(&mut self, payload: &[u8]) -> Result<(), RpcError> {
        let writer = self.writer.as_mut().ok_or(RpcError::Closed)?;
        trace!(len = payload.len(), "Sending message");
        writer.write_all(payload).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        Ok(())
    }

    /// Waits for the next non-empty line and returns it without the line
    /// terminator.
    ///
    /// Returns [`RpcError::Closed`] at end of stream.
    pub async fn receive(&mut self) -> Result<Vec<u8>, RpcError> {
        loop {
            let mut line = Vec::new();
            let read = self.reader.read_until(b'\n', &mut line).await?;
            if read == 0 {
                return Err(RpcError::Closed);
            }
            while matches!(line.last(), Some(b'\n' | b'\r')) {
                line.pop();
            }
            if !line.is_empty() {
                trace!(len = line.len(), "Received message");
                return Ok(line);
            }
        }
    }

    /// Closes the transport. Safe to call more than once.
    pub async fn close(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.shutdown().await;
        }
        if let Some(mut child) = self.child.take() {
            debug!(pid = ?child.id(), "Terminating transport subprocess");
            let _ = child.kill().await;
        }
    }

    /// Returns true once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.writer.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, duplex};

    #[tokio::test]
    async fn test_send_appends_newline() {
        let (ours, theirs) = duplex(1024);
        let (our_read, our_write) = tokio::io::split(ours);
        let (mut their_read, _their_write) = tokio::io::split(theirs);
        let mut transport = LineTransport::from_streams(our_read, our_write);

        transport.send(b"{\"id\":1}").await.unwrap();

        let mut buf = [0u8; 9];
        their_read.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"{\"id\":1}\n");
    }

    #[tokio::test]
    async fn test_receive_splits_lines_and_skips_blanks() {
        let (ours, theirs) = duplex(1024);
        let (our_read, our_write) = tokio::io::split(ours);
        let (_their_read, mut their_write) = tokio::io::split(theirs);
        let mut transport = LineTransport::from_streams(our_read, our_write);

        their_write.write_all(b"first\r\n\n\nsecond\n").await.unwrap();

        assert_eq!(transport.receive().await.unwrap(), b"first");
        assert_eq!(transport.receive().await.unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_receive_eof_is_closed() {
        let (ours, theirs) = duplex(64);
        let (our_read, our_write) = tokio::io::split(ours);
        drop(theirs);
        let mut transport = LineTransport::from_streams(our_read, our_write);

        assert!(matches!(transport.receive().await, Err(RpcError::Closed)));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (ours, _theirs) = duplex(64);
        let (our_read, our_write) = tokio::io::split(ours);
        let mut transport = LineTransport::from_streams(our_read, our_write);

        transport.close().await;
        transport.close().await;

        assert!(transport.is_closed());
        assert!(matches!(transport.send(b"x").await, Err(RpcError::Closed)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_spawn_cat_echoes() {
        let cat = crate::host::locate::locate("cat").unwrap();
        let mut transport = LineTransport::spawn(cat, &[]).unwrap();

        transport.send(b"ping").await.unwrap();
        assert_eq!(transport.receive().await.unwrap(), b"ping");

        transport.close().await;
        assert!(transport.is_closed());
    }
}
