//! Provider identity.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

// ============================================================================
// Provider Kind
// ============================================================================

/// Supported coding-assistant providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Anthropic Claude Code
    Claude,
    /// OpenAI Codex
    Codex,
    /// Google Gemini CLI
    Gemini,
}

impl ProviderKind {
    /// Returns the display name for this provider.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Claude => "Claude",
            Self::Codex => "Codex",
            Self::Gemini => "Gemini",
        }
    }

    /// Returns all available provider kinds.
    pub fn all() -> &'static [ProviderKind] {
        &[Self::Claude, Self::Codex, Self::Gemini]
    }

    /// Returns the CLI name for this provider (lowercase, no spaces).
    pub fn cli_name(&self) -> &'static str {
        match self {
            Self::Claude => "claude",
            Self::Codex => "codex",
            Self::Gemini => "gemini",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for ProviderKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        Self::all()
            .iter()
            .copied()
            .find(|kind| kind.cli_name() == needle)
            .or(match needle.as_str() {
                "openai" => Some(Self::Codex),
                "anthropic" => Some(Self::Claude),
                "google" => Some(Self::Gemini),
                _ => None,
            })
            .ok_or_else(|| CoreError::ProviderNotFound(s.to_string()))
    }
}
