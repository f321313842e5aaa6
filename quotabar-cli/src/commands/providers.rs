//! Providers command - list providers with enablement and availability.

use anyhow::Result;
use quotabar_store::Settings;
use tracing::info;

use crate::commands::build_registry;
use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, ExitCode, OutputFormat};

/// Runs the providers command.
pub async fn run(cli: &Cli, settings: &Settings) -> Result<ExitCode> {
    info!("Listing providers");

    let registry = build_registry(settings, None).await;
    let providers = registry.records().await;

    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(cli.use_colors());

            println!("{}", formatter.format_providers_header());
            println!("{}", "─".repeat(40));

            for info in &providers {
                println!("{}", formatter.format_provider_line(info));
            }

            println!();
            println!(
                "Total: {} providers ({} enabled, {} available)",
                providers.len(),
                providers.iter().filter(|p| p.enabled).count(),
                providers.iter().filter(|p| p.available).count()
            );
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format_providers(&providers)?);
        }
    }

    Ok(ExitCode::Success)
}
