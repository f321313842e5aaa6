//! Usage command - one refresh, then print every provider's state.

use anyhow::Result;
use clap::Args;
use quotabar_core::ProviderKind;
use quotabar_store::{QuotaMonitor, RefreshReport, Settings};
use tracing::{debug, info};

use crate::commands::build_monitor;
use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, ExitCode, OutputFormat};

/// Arguments for the usage command.
#[derive(Args, Default)]
pub struct UsageArgs {
    /// Provider to query (claude, codex, gemini). Defaults to all enabled.
    #[arg(long, short)]
    pub provider: Option<ProviderKind>,
}

/// Runs the usage command.
pub async fn run(args: &UsageArgs, cli: &Cli, settings: &Settings) -> Result<ExitCode> {
    let monitor = build_monitor(settings, args.provider).await;

    info!(provider = ?args.provider, "Fetching usage");
    let report = monitor.refresh().await;
    debug!(
        sequence = report.sequence,
        succeeded = report.succeeded(),
        failed = report.failed(),
        "Refresh finished"
    );

    let printed = print_report(&monitor, &report, cli).await;
    monitor.shutdown().await;
    printed?;

    Ok(exit_code(&report))
}

/// Maps a refresh to the process exit code.
fn exit_code(report: &RefreshReport) -> ExitCode {
    if report.outcomes.is_empty() {
        ExitCode::NothingToProbe
    } else if report.succeeded() == 0 {
        ExitCode::ProbeFailed
    } else {
        ExitCode::Success
    }
}

async fn print_report(monitor: &QuotaMonitor, report: &RefreshReport, cli: &Cli) -> Result<()> {
    let states = monitor.states().await;

    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(cli.use_colors());

            if states.is_empty() {
                if !cli.quiet {
                    println!("No providers enabled. See `quotabar config show`.");
                }
                return Ok(());
            }

            let blocks: Vec<String> = states.iter().map(|s| formatter.format_state(s)).collect();
            println!("{}", blocks.join("\n\n"));

            for transition in report.degrading() {
                println!("{}", formatter.format_transition(transition));
            }
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format_states(&states)?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use quotabar_core::{ProbeError, QuotaStatus};
    use quotabar_store::ProbeOutcome;
    use std::time::Duration;

    fn report(results: Vec<Result<QuotaStatus, ProbeError>>) -> RefreshReport {
        RefreshReport {
            sequence: 1,
            started_at: Utc::now(),
            outcomes: results
                .into_iter()
                .map(|result| ProbeOutcome {
                    provider: ProviderKind::Codex,
                    result,
                    elapsed: Duration::from_millis(5),
                    applied: true,
                })
                .collect(),
            transitions: Vec::new(),
        }
    }

    #[test]
    fn test_exit_code_nothing_enabled() {
        assert_eq!(exit_code(&report(vec![])), ExitCode::NothingToProbe);
    }

    #[test]
    fn test_exit_code_all_failed() {
        let r = report(vec![Err(ProbeError::auth("expired"))]);
        assert_eq!(exit_code(&r), ExitCode::ProbeFailed);
    }

    #[test]
    fn test_exit_code_partial_success() {
        let r = report(vec![
            Err(ProbeError::parse("garbled")),
            Ok(QuotaStatus::Warning),
        ]);
        assert_eq!(exit_code(&r), ExitCode::Success);
    }
}
