//! Transaction Sync entry point.

use clap::Parser;
use std::process::ExitCode;
use sync_core::observability::{init_tracing, shutdown_tracing};
use transaction_sync::config::SyncConfig;
use transaction_sync::services::init_metrics;
use transaction_sync::startup::Application;

#[derive(Debug, Parser)]
#[command(name = "transaction-sync", version, about)]
struct Cli {
    /// Sync the whole account history instead of the last 30 days
    #[arg(long)]
    full: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Load configuration
    let config = match SyncConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Initialize tracing
    if let Err(e) = init_tracing(
        &config.service_name,
        &config.common.log_level,
        config.common.log_format,
        config.otlp_endpoint.as_deref(),
    ) {
        eprintln!("Failed to initialize tracing: {}", e);
        return ExitCode::FAILURE;
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        full = cli.full,
        "Starting transaction-sync"
    );

    init_metrics();

    // Log configuration (secrets stay out)
    tracing::info!(
        service_name = %config.service_name,
        max_concurrency = config.common.max_concurrency,
        feed_url = %config.feed.url,
        sheets_url = %config.sheets.url,
        spreadsheet_key = %config.sheets.spreadsheet_key,
        worksheet = %config.sheets.worksheet_name,
        invoices_enabled = config.invoices.is_some(),
        "Configuration loaded"
    );

    let result = match Application::build(config).await {
        Ok(app) => app.run(cli.full).await,
        Err(e) => Err(e),
    };

    let code = match result {
        Ok(report) => {
            tracing::info!(
                start_date = %report.start_date,
                end_date = %report.end_date,
                saved = report.saved,
                known_after = report.known_after,
                "Sync complete"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Sync failed");
            ExitCode::FAILURE
        }
    };

    shutdown_tracing();
    code
}
