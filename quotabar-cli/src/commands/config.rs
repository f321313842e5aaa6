//! Config command - manage configuration.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use quotabar_core::ProviderKind;
use quotabar_store::{Settings, default_config_dir};
use std::path::Path;
use tracing::info;

use crate::output::JsonFormatter;
use crate::{Cli, ExitCode, OutputFormat};

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config subcommands.
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration.
    Show,

    /// Show configuration paths.
    Path,

    /// Write the default configuration file.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },

    /// Enable a provider.
    Enable {
        /// Provider to enable.
        provider: ProviderKind,
    },

    /// Disable a provider.
    Disable {
        /// Provider to disable.
        provider: ProviderKind,
    },
}

/// Runs the config command.
pub async fn run(args: &ConfigArgs, cli: &Cli, settings: &Settings) -> Result<ExitCode> {
    let path = cli.settings_path();

    match &args.action {
        ConfigAction::Show => show_config(settings, &path, cli)?,
        ConfigAction::Path => show_paths(&path, cli)?,
        ConfigAction::Init { force } => init_config(&path, *force).await?,
        ConfigAction::Enable { provider } => {
            set_provider(settings.clone(), &path, *provider, true).await?;
        }
        ConfigAction::Disable { provider } => {
            set_provider(settings.clone(), &path, *provider, false).await?;
        }
    }

    Ok(ExitCode::Success)
}

fn show_config(settings: &Settings, path: &Path, cli: &Cli) -> Result<()> {
    match cli.format {
        OutputFormat::Text => {
            println!("QuotaBar Configuration");
            println!("{}", "─".repeat(40));
            println!();
            println!("File: {}", path.display());
            println!();
            println!("Providers:");
            for kind in ProviderKind::all() {
                let state = if settings.is_enabled(*kind) {
                    "enabled"
                } else {
                    "disabled"
                };
                println!("  • {:<8} {}", kind.display_name(), state);
            }
            println!();
            println!("Refresh interval: {}s", settings.refresh_interval_secs);
            println!("Probe timeout:    {}s", settings.probe_timeout_secs);
            println!("Refresh deadline: {}s", settings.refresh_deadline_secs);
            println!("Log level:        {}", settings.log_level);
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(settings)?);
        }
    }

    Ok(())
}

fn show_paths(path: &Path, cli: &Cli) -> Result<()> {
    let config_dir = default_config_dir();

    match cli.format {
        OutputFormat::Text => {
            println!("Configuration Paths");
            println!("{}", "─".repeat(40));
            println!();
            println!("Config dir:    {}", config_dir.display());
            println!("Settings file: {}", path.display());
        }
        OutputFormat::Json => {
            let paths = serde_json::json!({
                "config_dir": config_dir.display().to_string(),
                "settings_file": path.display().to_string(),
            });
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&paths)?);
        }
    }

    Ok(())
}

async fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }

    Settings::default()
        .save(path)
        .await
        .with_context(|| format!("writing {}", path.display()))?;

    info!(path = %path.display(), "Settings initialized");
    println!("Wrote {}", path.display());
    Ok(())
}

async fn set_provider(
    mut settings: Settings,
    path: &Path,
    provider: ProviderKind,
    enabled: bool,
) -> Result<()> {
    settings.set_enabled(provider, enabled);
    settings
        .save(path)
        .await
        .with_context(|| format!("writing {}", path.display()))?;

    info!(provider = %provider, enabled, "Provider setting updated");
    println!(
        "{}: {}",
        if enabled { "Enabled" } else { "Disabled" },
        provider.display_name()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        init_config(&path, false).await.unwrap();
        assert!(path.exists());
        assert!(init_config(&path, false).await.is_err());
        assert!(init_config(&path, true).await.is_ok());
    }

    #[tokio::test]
    async fn test_disable_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        set_provider(Settings::default(), &path, ProviderKind::Codex, false)
            .await
            .unwrap();

        let loaded = Settings::load(&path).await;
        assert!(!loaded.is_enabled(ProviderKind::Codex));
        assert!(loaded.is_enabled(ProviderKind::Claude));
    }
}
