use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use samland_core::SOURCE_NAME;
use samland_sync::{IngestConfig, RunReport};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "samland-cli")]
#[command(about = "Land SAM.gov opportunity payloads and audit every fetch")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Fetch once, land the raw payload and audit the attempt.
    Sync {
        /// postedFrom override; used only together with --posted-to.
        #[arg(long)]
        posted_from: Option<String>,
        /// postedTo override; used only together with --posted-from.
        #[arg(long)]
        posted_to: Option<String>,
    },
    /// Create or upgrade the landing tables without fetching.
    Migrate,
    /// Show the raw store total and the most recent audit entries.
    Report {
        #[arg(long, default_value_t = 10)]
        runs: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Loaded first so RUST_LOG from .env reaches the filter.
    if let Err(err) = dotenvy::dotenv() {
        if !err.not_found() {
            return Err(err).context("loading .env");
        }
    }

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    let config = IngestConfig::from_env().context("resolving configuration")?;
    tracing::debug!(?config, "configuration resolved");

    match cli.command.unwrap_or(Commands::Sync {
        posted_from: None,
        posted_to: None,
    }) {
        Commands::Sync {
            posted_from,
            posted_to,
        } => {
            let config = config.with_window_overrides(posted_from, posted_to);
            let report = samland_sync::run_once_from_config(config)
                .await
                .context("landing run aborted")?;
            print_run(&report);
        }
        Commands::Migrate => {
            samland_sync::migrate_from_config(&config)
                .await
                .context("schema bootstrap failed")?;
            println!("schema ready");
        }
        Commands::Report { runs } => {
            let report = samland_sync::report_from_config(&config, runs)
                .await
                .context("reading landing tables")?;
            println!("{SOURCE_NAME}: {} raw rows", report.total_raw_rows);
            for entry in &report.recent_audit {
                println!(
                    "#{} {} status={} success={} window={}..{}",
                    entry.id,
                    entry.fetched_at.to_rfc3339(),
                    entry.status_code,
                    entry.was_success,
                    entry.posted_from,
                    entry.posted_to
                );
            }
        }
    }

    Ok(())
}

fn print_run(report: &RunReport) {
    println!(
        "sync complete: run_id={} window={} status={} http={} raw_rows_written={} audited={}",
        report.run_id,
        report.window,
        report.outcome.status(),
        report.outcome.status_code_text(),
        report.raw_rows_written,
        report.audit_written
    );
    match report.total_raw_rows {
        Some(total) => println!("total raw rows: {total}"),
        None => println!("total raw rows: unavailable"),
    }
    for issue in &report.issues {
        eprintln!("warning: {issue}");
    }
}
