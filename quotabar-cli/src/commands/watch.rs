//! Watch command - periodic refresh with alerts.

use anyhow::Result;
use clap::Args;
use quotabar_core::ProviderKind;
use quotabar_store::{MIN_REFRESH_INTERVAL_SECS, QuotaMonitor, RefreshReport, Settings};
use std::io::{Write, stdout};
use tokio::time::{Duration, MissedTickBehavior, interval};
use tracing::{debug, info};

use crate::commands::build_monitor;
use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, ExitCode, OutputFormat};

/// Arguments for watch command.
#[derive(Args)]
pub struct WatchArgs {
    /// Refresh interval in seconds. Defaults to the configured interval.
    #[arg(long, short)]
    pub interval: Option<u64>,

    /// Provider to watch. Defaults to all enabled.
    #[arg(long, short)]
    pub provider: Option<ProviderKind>,
}

impl WatchArgs {
    fn refresh_interval(&self, settings: &Settings) -> Duration {
        match self.interval {
            Some(secs) => Duration::from_secs(secs.max(MIN_REFRESH_INTERVAL_SECS)),
            None => settings.refresh_interval(),
        }
    }
}

/// Runs the watch command until Ctrl+C.
pub async fn run(args: &WatchArgs, cli: &Cli, settings: &Settings) -> Result<ExitCode> {
    let refresh_interval = args.refresh_interval(settings);
    let monitor = build_monitor(settings, args.provider).await;

    info!(interval = refresh_interval.as_secs(), "Starting watch mode");

    let interrupted = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    let result = watch_until(&monitor, refresh_interval, cli, interrupted).await;

    monitor.shutdown().await;
    result
}

/// Refreshes on every tick until `shutdown` resolves, abandoning a refresh
/// that is still in flight.
async fn watch_until<S>(
    monitor: &QuotaMonitor,
    refresh_interval: Duration,
    cli: &Cli,
    shutdown: S,
) -> Result<ExitCode>
where
    S: Future<Output = ()>,
{
    let mut ticker = interval(refresh_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let report = tokio::select! {
                    report = monitor.try_refresh() => report,
                    () = &mut shutdown => {
                        info!("Interrupted during refresh, leaving watch mode");
                        return Ok(ExitCode::Success);
                    }
                };
                match report {
                    Some(report) => render(monitor, &report, refresh_interval, cli).await?,
                    None => debug!("Refresh already running, tick skipped"),
                }
            }
            () = &mut shutdown => {
                info!("Interrupted, leaving watch mode");
                return Ok(ExitCode::Success);
            }
        }
    }
}

async fn render(
    monitor: &QuotaMonitor,
    report: &RefreshReport,
    refresh_interval: Duration,
    cli: &Cli,
) -> Result<()> {
    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(cli.use_colors());
            let states = monitor.states().await;

            // Clear screen
            print!("\x1b[2J\x1b[H");
            stdout().flush()?;

            let now = chrono::Local::now();
            println!(
                "QuotaBar Watch Mode - {} (refresh: {}s)",
                now.format("%H:%M:%S"),
                refresh_interval.as_secs()
            );
            println!("{}", "─".repeat(50));
            println!();
            println!("{}", formatter.format_summary(&states));

            let alerts: Vec<String> = report
                .degrading()
                .map(|t| formatter.format_transition(t))
                .collect();
            if !alerts.is_empty() {
                println!();
                println!("{}", alerts.join("\n"));
            }

            println!();
            println!("Press Ctrl+C to exit");
        }
        OutputFormat::Json => {
            // One report per line
            let formatter = JsonFormatter::new(false);
            println!("{}", formatter.format_report(report)?);
        }
    }

    Ok(())
}
