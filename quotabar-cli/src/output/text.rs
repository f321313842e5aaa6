//! Text output formatting with progress bars and colors.

use chrono::{DateTime, Duration, Local, Utc};
use quotabar_core::{ProbeError, QuotaStatus, UsageQuota, UsageSnapshot};
use quotabar_providers::ProviderInfo;
use quotabar_store::{ProviderState, StatusTransition};

// ============================================================================
// ANSI Colors
// ============================================================================

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";
const BLUE: &str = "\x1b[34m";
const CYAN: &str = "\x1b[36m";

// Progress bar characters
const BAR_FULL: char = '█';
const BAR_EMPTY: char = '░';

/// Text formatter with optional colors.
pub struct TextFormatter {
    use_colors: bool,
    bar_width: usize,
}

impl TextFormatter {
    /// Creates a new text formatter.
    pub fn new(use_colors: bool) -> Self {
        Self {
            use_colors,
            bar_width: 10,
        }
    }

    /// Formats everything known about one provider.
    ///
    /// A failed probe still shows the last good snapshot, followed by the
    /// error.
    pub fn format_state(&self, state: &ProviderState) -> String {
        let name = state.provider.display_name();
        let mut lines = Vec::new();

        match &state.snapshot {
            Some(snapshot) => lines.push(self.format_snapshot(snapshot)),
            None => lines.push(self.bold(name)),
        }

        if let Some(error) = &state.last_error {
            let label = if state.snapshot.is_some() {
                "Last refresh failed"
            } else {
                "Error"
            };
            lines.push(format!("{}: {}", self.red(label), error));
            if let Some(hint) = Self::hint(error) {
                lines.push(self.dim(&format!("  {hint}")));
            }
        }

        lines.join("\n")
    }

    /// Formats a snapshot: header line, one line per quota, account details.
    pub fn format_snapshot(&self, snapshot: &UsageSnapshot) -> String {
        let mut lines = Vec::new();

        // Header: "Codex (rpc) warning"
        lines.push(format!(
            "{} ({}) {}",
            self.bold(snapshot.provider().display_name()),
            snapshot.source(),
            self.format_status(snapshot.status())
        ));

        for quota in snapshot.quotas() {
            lines.push(self.format_quota(quota));
        }

        if let Some(account) = snapshot.account() {
            lines.push(format!("Account: {}", self.cyan(account)));
        }
        if let Some(plan) = snapshot.plan() {
            lines.push(format!("Plan:    {}", self.blue(plan)));
        }

        lines.join("\n")
    }

    /// Formats a quota with progress bar and reset hint.
    pub fn format_quota(&self, quota: &UsageQuota) -> String {
        let remaining = quota.percent_remaining();
        let bar = self.progress_bar(remaining);
        let pct_str = self.color_for_percent(remaining, &format!("{remaining:.0}% left"));

        let label = format!("{}:", quota.quota_type().label());
        let mut result = format!("{label:<18} {bar} {pct_str}");

        if let Some(desc) = quota.reset_description() {
            result.push_str(&format!("\n{:<18} {}", "", self.dim(desc)));
        } else if let Some(resets_at) = quota.resets_at() {
            let reset_str = Self::format_reset_time(resets_at);
            result.push_str(&format!("\n{:<18} Resets {}", "", self.dim(&reset_str)));
        }

        result
    }

    /// Formats a progress bar.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn progress_bar(&self, percent_remaining: f64) -> String {
        let fraction = (percent_remaining / 100.0).clamp(0.0, 1.0);
        let filled = (fraction * self.bar_width as f64).round() as usize;
        let empty = self.bar_width.saturating_sub(filled);

        let bar = format!(
            "{}{}",
            BAR_FULL.to_string().repeat(filled),
            BAR_EMPTY.to_string().repeat(empty)
        );

        self.color_for_percent(percent_remaining, &bar)
    }

    /// Formats a status label in its color.
    pub fn format_status(&self, status: QuotaStatus) -> String {
        match status {
            QuotaStatus::Healthy => self.green(status.label()),
            QuotaStatus::Warning => self.yellow(status.label()),
            QuotaStatus::Critical | QuotaStatus::Depleted => self.red(status.label()),
        }
    }

    /// Formats a degrading transition as an alert line.
    pub fn format_transition(&self, transition: &StatusTransition) -> String {
        format!("{} {}", self.yellow("⚠"), self.bold(&transition.to_string()))
    }

    /// Formats provider list header.
    pub fn format_providers_header(&self) -> String {
        format!(
            "{:<10} {:<10} {:<10} {}",
            self.bold("Provider"),
            self.bold("CLI"),
            self.bold("Enabled"),
            self.bold("Available"),
        )
    }

    /// Formats a single provider line.
    pub fn format_provider_line(&self, info: &ProviderInfo) -> String {
        let enabled = if info.enabled {
            self.green("✓")
        } else {
            self.dim("−")
        };
        let available = if info.available {
            self.green("✓")
        } else {
            self.dim("−")
        };

        format!(
            "{:<10} {:<10} {:<10} {}",
            info.name,
            info.id.cli_name(),
            enabled,
            available
        )
    }

    /// Formats one line per provider for watch mode.
    pub fn format_summary(&self, states: &[ProviderState]) -> String {
        if states.is_empty() {
            return self.dim("No providers enabled");
        }

        let mut lines = Vec::new();
        for state in states {
            let name = state.provider.display_name();

            let mut line = match &state.snapshot {
                Some(snapshot) => {
                    let binding = snapshot.binding_quota();
                    let remaining = binding.percent_remaining();
                    format!(
                        "{:<8} {} {} {}",
                        name,
                        self.progress_bar(remaining),
                        self.color_for_percent(remaining, &format!("{remaining:>3.0}%")),
                        self.dim(&binding.quota_type().label())
                    )
                }
                None => format!("{:<8} {}", name, self.dim("No data")),
            };

            if let Some(error) = &state.last_error {
                line.push_str(&format!("  {}", self.red(&error.kind().to_string())));
            }
            lines.push(line);
        }

        lines.join("\n")
    }

    /// What the user can do about an error, if anything.
    fn hint(error: &ProbeError) -> Option<&'static str> {
        match error {
            ProbeError::AuthenticationRequired(_) => {
                Some("Log in with the provider's CLI and try again.")
            }
            ProbeError::ExecutionFailed(_) => Some("Is the provider's CLI installed and on PATH?"),
            ProbeError::ParseFailed(_) | ProbeError::Timeout(_) => None,
        }
    }

    /// Formats reset time as countdown or absolute.
    fn format_reset_time(resets_at: DateTime<Utc>) -> String {
        let now = Utc::now();
        let local_reset = resets_at.with_timezone(&Local);

        if resets_at <= now {
            return "now".to_string();
        }

        let diff = resets_at - now;

        if diff < Duration::hours(1) {
            let mins = diff.num_minutes().max(1);
            format!("in {} minute{}", mins, if mins == 1 { "" } else { "s" })
        } else if diff < Duration::hours(24) {
            let hours = diff.num_hours();
            let mins = diff.num_minutes() % 60;
            if mins > 0 {
                format!("in {hours}h {mins}m")
            } else {
                format!("in {} hour{}", hours, if hours == 1 { "" } else { "s" })
            }
        } else {
            local_reset.format("%a at %l:%M %p").to_string().trim().to_string()
        }
    }

    // ========================================================================
    // Color/style helpers
    // ========================================================================

    fn color_for_percent(&self, percent: f64, text: &str) -> String {
        if !self.use_colors {
            return text.to_string();
        }

        match QuotaStatus::classify(percent) {
            QuotaStatus::Healthy => self.green(text),
            QuotaStatus::Warning => self.yellow(text),
            QuotaStatus::Critical | QuotaStatus::Depleted => self.red(text),
        }
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.use_colors {
            format!("{code}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    fn bold(&self, text: &str) -> String {
        self.paint(BOLD, text)
    }

    fn dim(&self, text: &str) -> String {
        self.paint(DIM, text)
    }

    fn green(&self, text: &str) -> String {
        self.paint(GREEN, text)
    }

    fn yellow(&self, text: &str) -> String {
        self.paint(YELLOW, text)
    }

    fn red(&self, text: &str) -> String {
        self.paint(RED, text)
    }

    fn blue(&self, text: &str) -> String {
        self.paint(BLUE, text)
    }

    fn cyan(&self, text: &str) -> String {
        self.paint(CYAN, text)
    }
}

// ============================================================================
// Tests
// ============================================================================
