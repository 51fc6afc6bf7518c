//! Sync driver: fetch a window from the feed, enrich, append.

use crate::invoice_index::InvoiceIndex;
use crate::models::Transaction;
use crate::record_store::{AppendOutcome, RecordStore};
use crate::services::{InvoiceSource, TransactionFeed};
use chrono::{Days, Local, NaiveDate};
use std::sync::Arc;
use sync_core::concurrency::BoundedExecutor;
use sync_core::error::AppError;

/// Days covered by a regular run.
pub const RECENT_WINDOW_DAYS: u64 = 30;

/// Days covered by a `--full` run; far enough back to mean "everything".
pub const FULL_HISTORY_DAYS: u64 = 50_000;

/// `(start, end)` of the feed window ending `today`.
pub fn sync_window(today: NaiveDate, full: bool) -> (NaiveDate, NaiveDate) {
    let days = if full {
        FULL_HISTORY_DAYS
    } else {
        RECENT_WINDOW_DAYS
    };
    let start = today.checked_sub_days(Days::new(days)).unwrap_or(NaiveDate::MIN);
    (start, today)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub fetched: usize,
    pub enriched: usize,
    pub saved: usize,
    pub already_present: usize,
    /// Duplicates within the window whose first copy was still being saved.
    pub in_flight: usize,
    pub known_before: usize,
    pub known_after: usize,
}

struct InvoiceEnrichment {
    source: Arc<dyn InvoiceSource>,
    load_size: usize,
}

pub struct Synchronizer {
    feed: Arc<dyn TransactionFeed>,
    store: Arc<RecordStore>,
    invoices: Option<InvoiceEnrichment>,
    executor: BoundedExecutor,
}

impl Synchronizer {
    pub fn new(
        feed: Arc<dyn TransactionFeed>,
        store: Arc<RecordStore>,
        executor: BoundedExecutor,
    ) -> Self {
        Self {
            feed,
            store,
            invoices: None,
            executor,
        }
    }

    /// Enable enrichment; the index is paged `load_size` pages at a time.
    pub fn with_invoices(mut self, source: Arc<dyn InvoiceSource>, load_size: usize) -> Self {
        self.invoices = Some(InvoiceEnrichment { source, load_size });
        self
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub async fn sync(&self, full: bool) -> Result<SyncReport, AppError> {
        self.sync_as_of(Local::now().date_naive(), full).await
    }

    pub async fn sync_as_of(&self, today: NaiveDate, full: bool) -> Result<SyncReport, AppError> {
        let (start_date, end_date) = sync_window(today, full);

        let known_before = self.store.known_count();
        tracing::info!(
            transactions = known_before,
            "Record store has {} transactions",
            known_before
        );

        let mut transactions = self.feed.fetch_transactions(start_date, end_date).await?;
        tracing::info!(
            start_date = %start_date,
            end_date = %end_date,
            fetched = transactions.len(),
            "Fetched transactions"
        );

        let enriched = self.enrich(&mut transactions).await?;

        let outcomes = self
            .executor
            .run(transactions.iter(), |transaction| {
                self.store.append(transaction)
            })
            .await?;

        let count = |wanted: AppendOutcome| outcomes.iter().filter(|o| **o == wanted).count();
        let saved = count(AppendOutcome::Saved);

        let known_after = self.store.known_count();
        tracing::info!(
            transactions = known_after,
            "Record store has {} transactions",
            known_after
        );

        let report = SyncReport {
            start_date,
            end_date,
            fetched: transactions.len(),
            enriched,
            saved,
            already_present: count(AppendOutcome::AlreadyPresent),
            in_flight: count(AppendOutcome::InFlight),
            known_before,
            known_after,
        };

        tracing::info!(
            fetched = report.fetched,
            enriched = report.enriched,
            saved = report.saved,
            already_present = report.already_present,
            in_flight = report.in_flight,
            "Sync finished"
        );

        Ok(report)
    }

    /// Returns the number of transactions enriched. The index is only built
    /// when at least one transaction could use it.
    async fn enrich(&self, transactions: &mut [Transaction]) -> Result<usize, AppError> {
        let Some(invoices) = &self.invoices else {
            return Ok(0);
        };

        if !transactions.iter().any(Transaction::is_enrichable) {
            tracing::debug!("No incoming payments with a variable symbol, skipping invoices");
            return Ok(0);
        }

        let index = InvoiceIndex::build(invoices.source.as_ref(), invoices.load_size).await?;

        let mut enriched = 0;
        for transaction in transactions.iter_mut() {
            if index.enrich(transaction) {
                enriched += 1;
            }
        }

        Ok(enriched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn test_recent_window() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        let (start, end) = sync_window(today, false);

        assert_eq!(start, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(end, today);
    }

    #[test]
    fn test_full_window_reaches_far_back() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        let (start, end) = sync_window(today, true);

        assert_eq!(end, today);
        assert_eq!((today - start).num_days(), FULL_HISTORY_DAYS as i64);
        assert!(start.year() < 1900);
    }
}
