//! JSON-RPC client for the Codex app-server.
//!
//! # Protocol
//!
//! ```bash
//! codex -s read-only -a untrusted app-server
//! ```
//!
//! Messages are newline-delimited JSON objects:
//!
//! - request: `{"id":1,"method":"initialize","params":{...}}`
//! - notification: `{"method":"initialized","params":{}}`
//! - response: `{"id":1,"result":{...}}` or `{"id":1,"error":{"message":"..."}}`
//!
//! The server interleaves its own notifications with responses; anything
//! that isn't the response to the pending request id is skipped.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, instrument, trace};

use quotabar_fetch::LineTransport;

use super::error::CodexError;

// ============================================================================
// Constants
// ============================================================================

/// Arguments for app-server mode.
pub const APP_SERVER_ARGS: &[&str] = &["-s", "read-only", "-a", "untrusted", "app-server"];

/// Default timeout for individual RPC requests.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const CLIENT_NAME: &str = "quotabar";

const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// Messages
// ============================================================================

#[derive(Debug, Serialize)]
struct Request<'a, P: Serialize> {
    id: u64,
    method: &'a str,
    params: P,
}

#[derive(Debug, Serialize)]
struct Notification<'a> {
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct ResponseError {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InitializeParams {
    client_info: ClientInfo,
}

#[derive(Debug, Serialize)]
struct ClientInfo {
    name: &'static str,
    title: &'static str,
    version: &'static str,
}

// ============================================================================
// Rate Limits
// ============================================================================

/// Result of `account/rateLimits/read`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitsResult {
    /// Absent until the account has made its first request.
    #[serde(default)]
    pub rate_limits: Option<RateLimits>,
}

/// Rate limit windows and plan details.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimits {
    /// Short (five-hour) window.
    #[serde(default)]
    pub primary: Option<RateLimitWindow>,
    /// Weekly window.
    #[serde(default)]
    pub secondary: Option<RateLimitWindow>,
    /// Credit balance.
    #[serde(default)]
    pub credits: Option<CreditsInfo>,
    /// Plan identifier such as `free`, `plus`, `pro`.
    #[serde(default)]
    pub plan_type: Option<String>,
}

/// One rate limit window.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitWindow {
    /// Percentage of the window used (0-100).
    pub used_percent: f64,
    /// Window length in minutes.
    #[serde(default)]
    pub window_duration_mins: Option<u32>,
    /// Reset time, Unix seconds.
    #[serde(default)]
    pub resets_at: Option<i64>,
}

/// Credit information.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditsInfo {
    /// Whether the account has credits.
    #[serde(default)]
    pub has_credits: Option<bool>,
    /// Whether credits are unlimited.
    #[serde(default)]
    pub unlimited: Option<bool>,
    /// Balance as a decimal string.
    #[serde(default)]
    pub balance: Option<String>,
}

// ============================================================================
// Account
// ============================================================================

/// Result of `account/read`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountResult {
    /// Signed-in account, if any.
    #[serde(default)]
    pub account: Option<AccountInfo>,
}

/// Signed-in account details.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    /// Account email.
    #[serde(default)]
    pub email: Option<String>,
    /// Plan identifier.
    #[serde(default)]
    pub plan_type: Option<String>,
}

// ============================================================================
// Client
// ============================================================================

fn empty_params() -> Value {
    Value::Object(serde_json::Map::new())
}

/// An initialized app-server session.
#[derive(Debug)]
pub struct CodexRpcClient {
    transport: LineTransport,
    next_id: u64,
    request_timeout: Duration,
    in_flight: bool,
    account: Option<AccountInfo>,
}

impl CodexRpcClient {
    /// Spawns the app-server at `binary_path` and performs the handshake.
    #[instrument(skip_all, fields(binary = %binary_path.as_ref().display()))]
    pub async fn spawn(
        binary_path: impl AsRef<Path>,
        request_timeout: Duration,
    ) -> Result<Self, CodexError> {
        let transport = LineTransport::spawn(binary_path, APP_SERVER_ARGS)?;
        Self::connect(transport, request_timeout).await
    }

    /// Performs the handshake over an existing transport.
    ///
    /// Sends `initialize`, then the `initialized` notification, then reads
    /// account details (best effort).
    pub async fn connect(
        transport: LineTransport,
        request_timeout: Duration,
    ) -> Result<Self, CodexError> {
        let mut client = Self {
            transport,
            next_id: 1,
            request_timeout,
            in_flight: false,
            account: None,
        };

        let params = InitializeParams {
            client_info: ClientInfo {
                name: CLIENT_NAME,
                title: "QuotaBar",
                version: CLIENT_VERSION,
            },
        };
        let init: Value = client.call("initialize", params).await?;
        debug!(user_agent = ?init.get("userAgent"), "App-server initialized");
        client.notify("initialized").await?;

        match client.call::<_, AccountResult>("account/read", empty_params()).await {
            Ok(result) => client.account = result.account,
            Err(e) if e.is_fatal_to_session() => return Err(e),
            Err(e) => debug!(error = %e, "account/read unavailable"),
        }

        Ok(client)
    }

    /// Reads the current rate limits.
    pub async fn read_rate_limits(&mut self) -> Result<RateLimitsResult, CodexError> {
        self.call("account/rateLimits/read", empty_params()).await
    }

    /// Account details captured during the handshake.
    pub fn account(&self) -> Option<&AccountInfo> {
        self.account.as_ref()
    }

    /// Returns false once the session can no longer be trusted: the
    /// transport is closed, or a call was abandoned midway.
    pub fn is_usable(&self) -> bool {
        !self.in_flight && !self.transport.is_closed()
    }

    /// Terminates the app-server.
    pub async fn close(&mut self) {
        debug!("Closing app-server session");
        self.transport.close().await;
    }

    async fn notify(&mut self, method: &str) -> Result<(), CodexError> {
        let payload = serde_json::to_vec(&Notification {
            method,
            params: empty_params(),
        })?;
        self.transport.send(&payload).await?;
        Ok(())
    }

    /// Sends a request and waits for the response with the same id.
    async fn call<P: Serialize, R: DeserializeOwned>(
        &mut self,
        method: &str,
        params: P,
    ) -> Result<R, CodexError> {
        let id = self.next_id;
        self.next_id += 1;

        let payload = serde_json::to_vec(&Request { id, method, params })?;
        trace!(id, method, "Sending request");

        self.in_flight = true;
        self.transport.send(&payload).await?;

        let timeout = self.request_timeout;
        let response = tokio::time::timeout(timeout, self.read_response(id))
            .await
            .map_err(|_| CodexError::Timeout {
                method: method.to_string(),
                after: timeout,
            });
        self.in_flight = false;

        let mut response = response??;

        if let Some(error) = response.get("error").filter(|e| !e.is_null()) {
            let message = serde_json::from_value::<ResponseError>(error.clone())
                .map(|e| e.message)
                .unwrap_or_else(|_| error.to_string());
            return Err(CodexError::Rpc {
                method: method.to_string(),
                message,
            });
        }

        let result = response
            .get_mut("result")
            .map(Value::take)
            .ok_or_else(|| CodexError::EmptyResponse(method.to_string()))?;
        serde_json::from_value(result).map_err(|e| CodexError::Decode {
            method: method.to_string(),
            message: e.to_string(),
        })
    }

    async fn read_response(&mut self, id: u64) -> Result<Value, CodexError> {
        loop {
            let line = self.transport.receive().await?;
            let message: Value = match serde_json::from_slice(&line) {
                Ok(value) => value,
                Err(e) => {
                    trace!(error = %e, "Skipping non-JSON line");
                    continue;
                }
            };

            match message.get("id").and_then(Value::as_u64) {
                Some(got) if got == id => return Ok(message),
                Some(other) => trace!(id = other, "Skipping response for another request"),
                None => trace!(method = ?message.get("method"), "Skipping notification"),
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, duplex};

    /// Spawns an in-process app-server that answers each method with the
    /// given result. Returns the client side of the transport.
    pub(crate) fn fake_server(rate_limits: Value) -> LineTransport {
        let (client_side, server_side) = duplex(16 * 1024);
        let (client_read, client_write) = tokio::io::split(client_side);
        let (server_read, mut server_write) = tokio::io::split(server_side);

        tokio::spawn(async move {
            let mut lines = BufReader::new(server_read).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let request: Value = serde_json::from_str(&line).unwrap();
                let Some(id) = request.get("id").cloned() else {
                    continue;
                };
                let result = match request["method"].as_str() {
                    Some("initialize") => serde_json::json!({ "userAgent": "codex/0.50" }),
                    Some("account/read") => serde_json::json!({
                        "account": { "type": "chatgpt", "email": "dev@example.com", "planType": "plus" }
                    }),
                    Some("account/rateLimits/read") => rate_limits.clone(),
                    _ => Value::Null,
                };
                let noise = serde_json::json!({ "method": "codex/event", "params": {} });
                let reply = serde_json::json!({ "id": id, "result": result });
                let out = format!("{noise}\n\n{reply}\n");
                if server_write.write_all(out.as_bytes()).await.is_err() {
                    break;
                }
            }
        });

        LineTransport::from_streams(client_read, client_write)
    }

    #[tokio::test]
    async fn test_handshake_and_rate_limits() {
        let transport = fake_server(serde_json::json!({
            "rateLimits": {
                "primary": { "usedPercent": 85.0, "windowDurationMins": 300, "resetsAt": 1735000000 }
            }
        }));

        let mut client = CodexRpcClient::connect(transport, Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(
            client.account().and_then(|a| a.email.as_deref()),
            Some("dev@example.com")
        );

        let limits = client.read_rate_limits().await.unwrap();
        let primary = limits.rate_limits.unwrap().primary.unwrap();
        assert!((primary.used_percent - 85.0).abs() < 0.01);
        assert!(client.is_usable());
    }

    #[tokio::test]
    async fn test_error_response() {
        let (client_side, server_side) = duplex(4096);
        let (client_read, client_write) = tokio::io::split(client_side);
        let (server_read, mut server_write) = tokio::io::split(server_side);
        tokio::spawn(async move {
            let mut lines = BufReader::new(server_read).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let request: Value = serde_json::from_str(&line).unwrap();
                if let Some(id) = request.get("id") {
                    let reply = serde_json::json!({ "id": id, "error": { "code": -32600, "message": "nope" } });
                    let _ = server_write.write_all(format!("{reply}\n").as_bytes()).await;
                }
            }
        });

        let err = CodexRpcClient::connect(
            LineTransport::from_streams(client_read, client_write),
            Duration::from_secs(2),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CodexError::Rpc { ref message, .. } if message == "nope"));
    }

    #[tokio::test]
    async fn test_silent_server_times_out() {
        let (client_side, _server_side) = duplex(4096);
        let (client_read, client_write) = tokio::io::split(client_side);

        let err = CodexRpcClient::connect(
            LineTransport::from_streams(client_read, client_write),
            Duration::from_millis(100),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CodexError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_closed_server_is_transport_error() {
        let (client_side, server_side) = duplex(4096);
        let (client_read, client_write) = tokio::io::split(client_side);
        drop(server_side);

        let err = CodexRpcClient::connect(
            LineTransport::from_streams(client_read, client_write),
            Duration::from_secs(1),
        )
        .await
        .unwrap_err();
        assert!(err.is_fatal_to_session());
    }

    #[tokio::test]
    async fn test_mismatched_result_keeps_session_usable() {
        let transport = fake_server(serde_json::json!({
            "rateLimits": { "primary": { "usedPercent": "lots" } }
        }));
        let mut client = CodexRpcClient::connect(transport, Duration::from_secs(2))
            .await
            .unwrap();

        let err = client.read_rate_limits().await.unwrap_err();
        assert!(matches!(err, CodexError::Decode { ref method, .. } if method == "account/rateLimits/read"));
        assert!(!err.is_fatal_to_session());
        assert!(client.is_usable());
    }

    #[test]
    fn test_rate_limits_deserialize() {
        let json = r#"{
            "rateLimits": {
                "primary": { "usedPercent": 28.5, "windowDurationMins": 300, "resetsAt": 1735000000 },
                "secondary": { "usedPercent": 59.2, "windowDurationMins": 10080 },
                "credits": { "hasCredits": true, "unlimited": false, "balance": "112.45" },
                "planType": "pro"
            }
        }"#;

        let result: RateLimitsResult = serde_json::from_str(json).unwrap();
        let limits = result.rate_limits.unwrap();
        assert_eq!(limits.primary.unwrap().window_duration_mins, Some(300));
        assert!(limits.secondary.unwrap().resets_at.is_none());
        assert_eq!(limits.credits.unwrap().balance.as_deref(), Some("112.45"));
        assert_eq!(limits.plan_type.as_deref(), Some("pro"));
    }
}
