//! Gemini CLI credentials and settings.
//!
//! ## Config Files
//!
//! - `~/.gemini/oauth_creds.json` - OAuth credentials (access/refresh tokens)
//! - `~/.gemini/settings.json` - Auth type under `security.auth.selectedType`
//!
//! Both files are only ever read.

use chrono::Utc;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::error::GeminiError;

const CREDENTIALS_FILE: &str = "oauth_creds.json";
const SETTINGS_FILE: &str = "settings.json";

// ============================================================================
// Paths
// ============================================================================

/// Location of the Gemini CLI config directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeminiPaths {
    dir: PathBuf,
}

impl GeminiPaths {
    /// `~/.gemini`, if a home directory is known.
    pub fn from_home() -> Option<Self> {
        dirs::home_dir().map(|home| Self::new(home.join(".gemini")))
    }

    /// A specific config directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of `oauth_creds.json`.
    pub fn credentials(&self) -> PathBuf {
        self.dir.join(CREDENTIALS_FILE)
    }

    /// Path of `settings.json`.
    pub fn settings(&self) -> PathBuf {
        self.dir.join(SETTINGS_FILE)
    }

    /// Returns true if the credentials file exists.
    pub fn has_credentials(&self) -> bool {
        self.credentials().is_file()
    }
}

// ============================================================================
// Auth Type
// ============================================================================

/// Gemini authentication type from `settings.json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeminiAuthType {
    /// Personal Google login.
    OAuthPersonal,
    /// Gemini API key.
    ApiKey,
    /// Vertex AI.
    VertexAi,
    /// Not set or unrecognized.
    Unknown,
}

impl GeminiAuthType {
    /// Reads the auth type. Missing or unreadable settings yield `Unknown`.
    pub fn load(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            debug!(path = %path.display(), "No Gemini settings file");
            return Self::Unknown;
        };

        let Ok(json) = serde_json::from_str::<serde_json::Value>(&content) else {
            warn!(path = %path.display(), "Failed to parse Gemini settings.json");
            return Self::Unknown;
        };

        let selected = json
            .get("security")
            .and_then(|s| s.get("auth"))
            .and_then(|a| a.get("selectedType"))
            .and_then(serde_json::Value::as_str);

        match selected {
            Some("oauth-personal") => Self::OAuthPersonal,
            Some("api-key" | "gemini-api-key") => Self::ApiKey,
            Some("vertex-ai") => Self::VertexAi,
            _ => Self::Unknown,
        }
    }

    /// Rejects auth types the quota endpoint cannot serve.
    pub fn ensure_supported(self) -> Result<(), GeminiError> {
        match self {
            Self::OAuthPersonal | Self::Unknown => Ok(()),
            Self::ApiKey => Err(GeminiError::UnsupportedAuthType(
                "api-key auth has no quota endpoint; sign in with Google in the Gemini CLI"
                    .to_string(),
            )),
            Self::VertexAi => Err(GeminiError::UnsupportedAuthType(
                "vertex-ai quotas are managed in Google Cloud; sign in with Google in the Gemini CLI"
                    .to_string(),
            )),
        }
    }
}

// ============================================================================
// OAuth Credentials
// ============================================================================

/// Contents of `oauth_creds.json`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeminiCredentials {
    /// Bearer token for API calls.
    #[serde(default)]
    pub access_token: Option<String>,
    /// Token used to mint a new access token.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Access token expiry, Unix milliseconds.
    #[serde(default)]
    pub expiry_date: Option<i64>,
    /// OAuth client id.
    #[serde(default)]
    pub client_id: Option<String>,
    /// OAuth client secret.
    #[serde(default)]
    pub client_secret: Option<String>,
}

impl GeminiCredentials {
    /// Loads and validates the credentials file.
    ///
    /// # Errors
    ///
    /// `NotLoggedIn` if the file is missing or has no access token,
    /// `CredentialsParse` if it isn't valid JSON.
    pub fn load(path: &Path) -> Result<Self, GeminiError> {
        debug!(path = %path.display(), "Loading Gemini credentials");

        let content = std::fs::read_to_string(path).map_err(|_| {
            GeminiError::NotLoggedIn(format!("{} not found", path.display()))
        })?;
        let creds: Self = serde_json::from_str(&content)
            .map_err(|e| GeminiError::CredentialsParse(e.to_string()))?;

        if creds.access_token().is_none() {
            return Err(GeminiError::NotLoggedIn(
                "credentials file has no access token".to_string(),
            ));
        }
        Ok(creds)
    }

    /// The access token, if non-empty.
    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref().filter(|t| !t.is_empty())
    }

    /// Returns true once `expiry_date` has passed. No expiry means not expired.
    pub fn is_expired(&self) -> bool {
        self.expiry_date
            .is_some_and(|expiry_ms| expiry_ms <= Utc::now().timestamp_millis())
    }

    /// Refresh token and client credentials, if all present.
    pub fn refresh_material(&self) -> Option<(&str, &str, &str)> {
        fn non_empty(v: &Option<String>) -> Option<&str> {
            v.as_deref().filter(|s| !s.is_empty())
        }
        Some((
            non_empty(&self.refresh_token)?,
            non_empty(&self.client_id)?,
            non_empty(&self.client_secret)?,
        ))
    }
}

// ============================================================================
// Tests
// ============================================================================
