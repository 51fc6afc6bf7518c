//! Application wiring: HTTP clients, record store, sync driver.

use crate::config::SyncConfig;
use crate::record_store::RecordStore;
use crate::services::{
    record_sync_run, write_metrics_file, FakturoidClient, FioFeed, SheetsBackend,
};
use crate::sync::{SyncReport, Synchronizer};
use reqwest::Client;
use std::sync::Arc;
use std::time::Instant;
use sync_core::concurrency::BoundedExecutor;
use sync_core::error::AppError;

/// Application container for one sync run.
pub struct Application {
    config: SyncConfig,
    synchronizer: Synchronizer,
}

impl Application {
    /// Build the backends and load the record store's existing ids.
    pub async fn build(config: SyncConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(config.http_timeout)
            .user_agent(format!(
                "{}/{}",
                config.service_name, config.service_version
            ))
            .build()
            .map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!("Failed to build HTTP client: {}", e))
            })?;

        let feed = Arc::new(FioFeed::new(
            client.clone(),
            config.feed.url.clone(),
            config.feed.token.clone(),
        ));

        let backend = Arc::new(SheetsBackend::new(
            client.clone(),
            &config.sheets.url,
            config.sheets.spreadsheet_key.clone(),
            config.sheets.worksheet_name.clone(),
            config.sheets.access_token.clone(),
        )?);

        let store = RecordStore::load(backend, config.retry.clone())
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    worksheet = %config.sheets.worksheet_name,
                    "Failed to load record store"
                );
                e
            })?;

        let executor = BoundedExecutor::new(config.common.max_concurrency);
        let mut synchronizer = Synchronizer::new(feed, Arc::new(store), executor);

        match &config.invoices {
            Some(invoices) => {
                tracing::info!(
                    url = %invoices.url,
                    load_size = invoices.load_size,
                    "Invoice enrichment enabled"
                );
                let source = Arc::new(FakturoidClient::new(
                    client.clone(),
                    invoices.url.clone(),
                    invoices.token.clone(),
                ));
                synchronizer = synchronizer.with_invoices(source, invoices.load_size);
            }
            None => {
                tracing::info!("Invoice backend not configured - enrichment will be skipped");
            }
        }

        Ok(Self {
            config,
            synchronizer,
        })
    }

    /// Run one sync and record its metrics.
    pub async fn run(self, full: bool) -> Result<SyncReport, AppError> {
        let start = Instant::now();
        let result = self.synchronizer.sync(full).await;

        let status = if result.is_ok() { "success" } else { "failure" };
        record_sync_run(status, start.elapsed().as_secs_f64());

        if let Some(path) = &self.config.metrics_file {
            if let Err(e) = write_metrics_file(path).await {
                tracing::warn!(error = %e, path = %path.display(), "Failed to write metrics file");
            }
        }

        result
    }
}
