//! Cloud Code quota API client.
//!
//! One authenticated `POST {}` to `v1internal:retrieveUserQuota` returns a
//! list of quota buckets. A model can appear in several buckets (one per
//! token type); the most constraining one wins.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use quotabar_core::{FetchSource, ProbeError, ProviderKind, QuotaType, UsageQuota, UsageSnapshot};

use super::credentials::GeminiCredentials;
use super::error::GeminiError;
use crate::reset::describe_reset;

// ============================================================================
// Endpoints
// ============================================================================

/// Cloud Code Private API endpoint for quota retrieval.
pub const QUOTA_ENDPOINT: &str = "https://cloudcode-pa.googleapis.com/v1internal:retrieveUserQuota";

/// Google OAuth token refresh endpoint.
pub const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

/// Per-request HTTP timeout.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Lifetime assumed when the token endpoint omits `expires_in`.
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

/// A cached token is dropped this long before it actually expires.
const TOKEN_EXPIRY_MARGIN_SECS: i64 = 60;

// ============================================================================
// Response Types
// ============================================================================

/// Body of a `retrieveUserQuota` response.
#[derive(Debug, Default, Deserialize)]
pub struct QuotaResponse {
    /// Quota buckets, one per model and token type.
    #[serde(default)]
    pub buckets: Vec<QuotaBucket>,
}

/// A single quota bucket.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaBucket {
    /// Model identifier, e.g. `gemini-2.5-pro`.
    pub model_id: Option<String>,
    /// Remaining share of the budget, `0.0..=1.0`.
    pub remaining_fraction: Option<f64>,
    /// RFC 3339 reset time.
    pub reset_time: Option<String>,
    /// Budget kind, e.g. `REQUESTS` or `INPUT_TOKENS`.
    pub token_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenRefreshResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// A refreshed access token kept in memory.
#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
    /// Refresh token the access token was minted from.
    refresh_token: String,
}

impl CachedToken {
    fn usable_for(&self, refresh_token: &str, now: DateTime<Utc>) -> bool {
        self.refresh_token == refresh_token && now < self.expires_at
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Converts a quota response into a snapshot.
///
/// Buckets are grouped by model keeping the minimum remaining fraction; a
/// later bucket only replaces the kept one when strictly lower. Buckets
/// without a model or fraction are skipped. Quotas are ordered by model
/// name.
///
/// # Errors
///
/// [`ProbeError::ParseFailed`] if any bucket reports a fraction outside
/// `0..=1`, or if no complete bucket remains.
pub fn parse_quota_response(
    response: &QuotaResponse,
    now: DateTime<Utc>,
) -> Result<UsageSnapshot, ProbeError> {
    let mut by_model: BTreeMap<&str, &QuotaBucket> = BTreeMap::new();

    for bucket in &response.buckets {
        let (Some(model), Some(fraction)) = (bucket.model_id.as_deref(), bucket.remaining_fraction)
        else {
            debug!(?bucket, "Skipping incomplete quota bucket");
            continue;
        };
        if !(0.0..=1.0).contains(&fraction) {
            warn!(model, fraction, "Rejecting out-of-range quota bucket");
            return Err(GeminiError::InvalidResponse(format!(
                "remaining fraction {fraction} for {model} is outside 0..=1"
            ))
            .into());
        }

        let lower = by_model
            .get(model)
            .and_then(|kept| kept.remaining_fraction)
            .is_none_or(|kept| fraction < kept);
        if lower {
            by_model.insert(model, bucket);
        }
    }

    if by_model.is_empty() {
        return Err(GeminiError::NoData.into());
    }

    let mut quotas = Vec::with_capacity(by_model.len());
    for (model, bucket) in by_model {
        let fraction = bucket.remaining_fraction.unwrap_or_default();
        let mut quota = UsageQuota::from_fraction(
            ProviderKind::Gemini,
            QuotaType::ModelSpecific(model.to_string()),
            fraction,
        )?;

        let reset = bucket
            .reset_time
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));
        if let Some(at) = reset {
            quota = quota
                .with_resets_at(at)
                .with_reset_description(describe_reset(at.timestamp(), now));
        }

        debug!(
            model,
            token_type = ?bucket.token_type,
            percent_remaining = quota.percent_remaining(),
            "Parsed model quota"
        );
        quotas.push(quota);
    }

    Ok(UsageSnapshot::new(ProviderKind::Gemini, quotas)?.with_source(FetchSource::OAuth))
}

// ============================================================================
// Client
// ============================================================================

/// HTTP client for the quota and token endpoints.
///
/// Clones share the refreshed-token cache.
#[derive(Debug, Clone)]
pub struct GeminiApiClient {
    http: reqwest::Client,
    quota_url: String,
    token_url: String,
    timeout: Duration,
    refreshed: Arc<Mutex<Option<CachedToken>>>,
}

impl Default for GeminiApiClient {
    fn default() -> Self {
        Self::new()
    }
}

impl GeminiApiClient {
    /// Creates a client for the production endpoints.
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            quota_url: QUOTA_ENDPOINT.to_string(),
            token_url: TOKEN_ENDPOINT.to_string(),
            timeout: DEFAULT_HTTP_TIMEOUT,
            refreshed: Arc::new(Mutex::new(None)),
        }
    }

    /// Points the client at different endpoints.
    #[must_use]
    pub fn with_endpoints(mut self, quota_url: impl Into<String>, token_url: impl Into<String>) -> Self {
        self.quota_url = quota_url.into();
        self.token_url = token_url.into();
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn transport_error(&self, context: &str, err: &reqwest::Error) -> GeminiError {
        if err.is_timeout() {
            GeminiError::Timeout(self.timeout)
        } else {
            GeminiError::Http(format!("{context}: {err}"))
        }
    }

    /// Returns a usable access token, refreshing an expired one in memory.
    ///
    /// A refreshed token is reused until its `expires_in` runs out. It is
    /// never written back to the credentials file.
    pub async fn access_token(&self, creds: &GeminiCredentials) -> Result<String, GeminiError> {
        let token = creds.access_token().ok_or_else(|| {
            GeminiError::NotLoggedIn("credentials file has no access token".to_string())
        })?;

        if !creds.is_expired() {
            return Ok(token.to_string());
        }

        let Some((refresh_token, client_id, client_secret)) = creds.refresh_material() else {
            warn!("Gemini token expired and cannot be refreshed");
            return Err(GeminiError::TokenExpired(
                "run `gemini` to sign in again".to_string(),
            ));
        };

        // Held across the request so concurrent callers refresh once
        let mut cached = self.refreshed.lock().await;
        if let Some(hit) = cached.as_ref().filter(|c| c.usable_for(refresh_token, Utc::now())) {
            debug!(expires_at = %hit.expires_at, "Using cached Gemini access token");
            return Ok(hit.access_token.clone());
        }

        info!("Gemini access token expired, refreshing");
        let refreshed = self.refresh(refresh_token, client_id, client_secret).await?;

        let lifetime = refreshed
            .expires_in
            .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS)
            .saturating_sub(TOKEN_EXPIRY_MARGIN_SECS)
            .max(0);
        let expires_at = Utc::now() + chrono::Duration::seconds(lifetime);
        debug!(%expires_at, "Caching refreshed Gemini access token");

        *cached = Some(CachedToken {
            access_token: refreshed.access_token.clone(),
            expires_at,
            refresh_token: refresh_token.to_string(),
        });
        Ok(refreshed.access_token)
    }

    async fn refresh(
        &self,
        refresh_token: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Result<TokenRefreshResponse, GeminiError> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", client_id),
            ("client_secret", client_secret),
        ];

        let response = self
            .http
            .post(&self.token_url)
            .timeout(self.timeout)
            .form(&params)
            .send()
            .await
            .map_err(|e| self.transport_error("token refresh", &e))?;

        let status = response.status();
        if status == reqwest::StatusCode::BAD_REQUEST || status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(GeminiError::RefreshFailed(format!("HTTP {status}")));
        }
        if !status.is_success() {
            return Err(GeminiError::TokenEndpoint(format!("HTTP {status}")));
        }

        response
            .json()
            .await
            .map_err(|e| GeminiError::InvalidResponse(format!("token response: {e}")))
    }

    /// Fetches the raw quota response.
    pub async fn fetch_quota(&self, access_token: &str) -> Result<QuotaResponse, GeminiError> {
        debug!(url = %self.quota_url, "Fetching Gemini quota");

        let response = self
            .http
            .post(&self.quota_url)
            .timeout(self.timeout)
            .bearer_auth(access_token)
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| self.transport_error("quota request", &e))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(GeminiError::NotLoggedIn(
                "quota API rejected the access token".to_string(),
            ));
        }
        if !status.is_success() {
            return Err(GeminiError::InvalidResponse(format!("HTTP {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| self.transport_error("quota body", &e))?;
        serde_json::from_str(&body).map_err(|e| GeminiError::InvalidResponse(e.to_string()))
    }

    /// Loads a token, fetches the quota and parses it.
    pub async fn fetch_snapshot(&self, creds: &GeminiCredentials) -> Result<UsageSnapshot, ProbeError> {
        let token = self.access_token(creds).await?;
        let response = self.fetch_quota(&token).await?;
        parse_quota_response(&response, Utc::now())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use quotabar_core::ProbeErrorKind;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn response(value: serde_json::Value) -> QuotaResponse {
        serde_json::from_value(value).unwrap()
    }

    fn creds(token: &str) -> GeminiCredentials {
        GeminiCredentials {
            access_token: Some(token.to_string()),
            ..Default::default()
        }
    }

    fn expired_creds() -> GeminiCredentials {
        GeminiCredentials {
            access_token: Some("ya29.old".to_string()),
            refresh_token: Some("1//refresh".to_string()),
            expiry_date: Some(Utc::now().timestamp_millis() - 60_000),
            client_id: Some("id".to_string()),
            client_secret: Some("secret".to_string()),
        }
    }

    async fn mount_token(server: &MockServer, template: ResponseTemplate, times: u64) {
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(template)
            .expect(times)
            .mount(server)
            .await;
    }

    async fn mount_quota(server: &MockServer, token: &str) {
        Mock::given(method("POST"))
            .and(path("/quota"))
            .and(header("authorization", format!("Bearer {token}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "buckets": [{ "modelId": "gemini-2.5-flash", "remainingFraction": 0.9 }]
            })))
            .mount(server)
            .await;
    }

    fn client_for(server: &MockServer) -> GeminiApiClient {
        GeminiApiClient::new().with_endpoints(
            format!("{}/quota", server.uri()),
            format!("{}/token", server.uri()),
        )
    }

    #[test]
    fn test_minimum_fraction_kept_per_model() {
        let resp = response(json!({
            "buckets": [
                { "modelId": "x", "remainingFraction": 0.8, "tokenType": "REQUESTS" },
                { "modelId": "x", "remainingFraction": 0.3, "tokenType": "INPUT_TOKENS" }
            ]
        }));

        let snapshot = parse_quota_response(&resp, Utc::now()).unwrap();
        assert_eq!(snapshot.quotas().len(), 1);
        let quota = snapshot.quota(&QuotaType::ModelSpecific("x".to_string())).unwrap();
        assert!((quota.percent_remaining() - 30.0).abs() < 0.01);
    }

    #[test]
    fn test_models_sorted_and_reset_parsed() {
        let resp = response(json!({
            "buckets": [
                { "modelId": "gemini-2.5-pro", "remainingFraction": 0.5,
                  "resetTime": "2030-01-01T00:00:00Z" },
                { "modelId": "gemini-2.5-flash", "remainingFraction": 1.0 }
            ]
        }));

        let snapshot = parse_quota_response(&resp, Utc::now()).unwrap();
        let names: Vec<String> = snapshot.quotas().iter().map(|q| q.quota_type().label()).collect();
        assert_eq!(names, ["gemini-2.5-flash", "gemini-2.5-pro"]);

        let pro = snapshot
            .quota(&QuotaType::ModelSpecific("gemini-2.5-pro".to_string()))
            .unwrap();
        assert!(pro.resets_at().is_some());
        assert_eq!(snapshot.source(), FetchSource::OAuth);
    }

    #[test]
    fn test_no_valid_buckets_is_parse_failure() {
        let err = parse_quota_response(&response(json!({})), Utc::now()).unwrap_err();
        assert_eq!(err.kind(), ProbeErrorKind::ParseFailed);

        let resp = response(json!({
            "buckets": [
                { "remainingFraction": 0.4 },
                { "modelId": "y", "remainingFraction": 1.7 }
            ]
        }));
        let err = parse_quota_response(&resp, Utc::now()).unwrap_err();
        assert_eq!(err.kind(), ProbeErrorKind::ParseFailed);
    }

    #[test]
    fn test_out_of_range_bucket_rejects_response() {
        let resp = response(json!({
            "buckets": [
                { "modelId": "gemini-2.5-pro", "remainingFraction": 0.5 },
                { "modelId": "gemini-2.5-flash", "remainingFraction": 1.7 }
            ]
        }));

        let err = parse_quota_response(&resp, Utc::now()).unwrap_err();
        assert_eq!(err.kind(), ProbeErrorKind::ParseFailed);
        assert!(err.to_string().contains("gemini-2.5-flash"));
    }

    #[tokio::test]
    async fn test_fetch_snapshot_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/quota"))
            .and(header("authorization", "Bearer ya29.ok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "buckets": [{ "modelId": "gemini-2.5-pro", "remainingFraction": 0.6 }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let snapshot = client_for(&server).fetch_snapshot(&creds("ya29.ok")).await.unwrap();
        assert!((snapshot.min_percent_remaining() - 60.0).abs() < 0.01);
    }

    #[tokio::test]
    async fn test_unauthorized_requires_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/quota"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = client_for(&server).fetch_snapshot(&creds("stale")).await.unwrap_err();
        assert_eq!(err.kind(), ProbeErrorKind::AuthenticationRequired);
    }

    #[tokio::test]
    async fn test_server_error_is_parse_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/quota"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = client_for(&server).fetch_snapshot(&creds("tok")).await.unwrap_err();
        assert_eq!(err.kind(), ProbeErrorKind::ParseFailed);
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed() {
        let server = MockServer::start().await;
        let fresh = ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "ya29.fresh", "expires_in": 3599
        }));
        mount_token(&server, fresh, 1).await;
        mount_quota(&server, "ya29.fresh").await;

        let snapshot = client_for(&server).fetch_snapshot(&expired_creds()).await.unwrap();
        assert!((snapshot.min_percent_remaining() - 90.0).abs() < 0.01);
    }

    #[tokio::test]
    async fn test_refreshed_token_reused_until_expiry() {
        let server = MockServer::start().await;
        let fresh = ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "ya29.fresh", "expires_in": 3599
        }));
        mount_token(&server, fresh, 1).await;
        mount_quota(&server, "ya29.fresh").await;

        let client = client_for(&server);
        let expired = expired_creds();
        for _ in 0..3 {
            client.fetch_snapshot(&expired).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_short_lived_refresh_is_not_reused() {
        let server = MockServer::start().await;
        let fresh = ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "ya29.fresh", "expires_in": 30
        }));
        mount_token(&server, fresh, 2).await;
        mount_quota(&server, "ya29.fresh").await;

        let client = client_for(&server);
        let expired = expired_creds();
        client.fetch_snapshot(&expired).await.unwrap();
        client.fetch_snapshot(&expired).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejected_refresh_requires_auth() {
        let server = MockServer::start().await;
        let rejected = ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant"
        }));
        mount_token(&server, rejected, 1).await;

        let err = client_for(&server).fetch_snapshot(&expired_creds()).await.unwrap_err();
        assert_eq!(err.kind(), ProbeErrorKind::AuthenticationRequired);
    }

    #[tokio::test]
    async fn test_token_endpoint_outage_is_execution_failure() {
        let server = MockServer::start().await;
        mount_token(&server, ResponseTemplate::new(503), 1).await;

        let err = client_for(&server).fetch_snapshot(&expired_creds()).await.unwrap_err();
        assert_eq!(err.kind(), ProbeErrorKind::ExecutionFailed);
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_expired_token_without_refresh_material() {
        let expired = GeminiCredentials {
            access_token: Some("ya29.old".to_string()),
            expiry_date: Some(Utc::now().timestamp_millis() - 60_000),
            ..Default::default()
        };

        let err = GeminiApiClient::new().access_token(&expired).await.unwrap_err();
        assert!(matches!(err, GeminiError::TokenExpired(_)));
    }
}
