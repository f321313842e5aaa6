// Lint configuration for this crate
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! `QuotaBar` CLI - remaining quota of AI coding assistants from the command line.
//!
//! # Examples
//!
//! ```bash
//! # One refresh of every enabled provider
//! quotabar
//!
//! # A single provider
//! quotabar usage --provider codex
//!
//! # JSON output
//! quotabar --format json --pretty
//!
//! # List providers
//! quotabar providers
//!
//! # Watch mode
//! quotabar watch --interval 60
//! ```

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use commands::{config, providers, usage, watch};
use quotabar_store::{LogLevel, Settings, default_settings_path};

// ============================================================================
// CLI Definition
// ============================================================================

/// `QuotaBar` CLI - quota monitoring for AI coding assistants.
#[derive(Parser)]
#[command(name = "quotabar")]
#[command(about = "Quota monitoring for AI coding-assistant CLIs")]
#[command(long_about = r#"
QuotaBar shows how much of each coding assistant's quota is left.

Supported providers:
  • Claude (claude)   - `/usage` screen of the interactive CLI
  • Codex (codex)     - `codex app-server` JSON-RPC
  • Gemini (gemini)   - quota API, or the CLI `/stats` table

Examples:
  quotabar                       # All enabled providers
  quotabar usage -p codex        # Single provider
  quotabar --format json         # JSON output
  quotabar watch                 # Refresh on an interval
"#)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run. If none, runs 'usage' by default.
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Output format (text or json).
    #[arg(long, short = 'f', default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Pretty-print JSON output.
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Verbose output (show debug info).
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Quiet mode (minimal output).
    #[arg(long, short, global = true)]
    pub quiet: bool,

    /// Settings file to use instead of the default location.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Path of the settings file in effect.
    pub fn settings_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(default_settings_path)
    }

    /// Whether text output should carry ANSI colors.
    pub fn use_colors(&self) -> bool {
        !self.no_color && std::env::var_os("NO_COLOR").is_none()
    }
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Refresh once and show remaining quota (default).
    #[command(visible_alias = "u")]
    Usage(usage::UsageArgs),

    /// Refresh on an interval and alert when a provider gets worse.
    #[command(visible_alias = "w")]
    Watch(watch::WatchArgs),

    /// List providers with enablement and availability.
    #[command(visible_alias = "p")]
    Providers,

    /// Manage configuration.
    Config(config::ConfigArgs),
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable text with colors.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

/// CLI exit codes.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Success.
    Success = 0,
    /// General error.
    Error = 1,
    /// Every probed provider failed.
    ProbeFailed = 2,
    /// No provider was enabled.
    NothingToProbe = 3,
}

// ============================================================================
// Logging Setup
// ============================================================================

fn setup_logging(verbose: bool, quiet: bool, level: LogLevel) {
    if quiet {
        return;
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("quotabar=debug")
        } else {
            EnvFilter::new(format!("quotabar={level}"))
        }
    });

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load(&cli.settings_path()).await;
    setup_logging(cli.verbose, cli.quiet, settings.log_level);

    let result = match &cli.command {
        Some(Commands::Usage(args)) => usage::run(args, &cli, &settings).await,
        Some(Commands::Watch(args)) => watch::run(args, &cli, &settings).await,
        Some(Commands::Providers) => providers::run(&cli, &settings).await,
        Some(Commands::Config(args)) => config::run(args, &cli, &settings).await,
        None => usage::run(&usage::UsageArgs::default(), &cli, &settings).await,
    };

    match result {
        Ok(ExitCode::Success) => Ok(()),
        Ok(code) => std::process::exit(code as i32),
        Err(e) => {
            if !cli.quiet {
                eprintln!("Error: {e:#}");
            }
            std::process::exit(ExitCode::Error as i32);
        }
    }
}
