//! Remote backends the sync pipeline talks to.

pub mod fakturoid;
pub mod fio;
pub mod metrics;
pub mod sheets;

use crate::models::{Invoice, Transaction};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use sync_core::error::AppError;

pub use fakturoid::{FakturoidClient, MockInvoiceSource};
pub use fio::{FioFeed, MockTransactionFeed};
pub use metrics::{
    get_metrics, init_metrics, record_invoice_page, record_sync_run, record_transaction_outcome,
    write_metrics_file,
};
pub use sheets::{MockRecordBackend, SheetsBackend};

/// Source of bank transactions for a date window.
#[async_trait]
pub trait TransactionFeed: Send + Sync {
    async fn fetch_transactions(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<Transaction>, AppError>;
}

/// Append-only tabular store. Row 1 is the header, all other rows are data.
#[async_trait]
pub trait RecordBackend: Send + Sync {
    async fn read_header(&self) -> Result<Vec<String>, AppError>;

    /// Values of the named column below the header, top to bottom.
    async fn read_column(&self, name: &str) -> Result<Vec<String>, AppError>;

    async fn append_row(&self, values: Vec<Value>) -> Result<(), AppError>;
}

/// Paginated invoice listing. An empty page means no data on that page.
#[async_trait]
pub trait InvoiceSource: Send + Sync {
    async fn list_invoices(&self, page: u32) -> Result<Vec<Invoice>, AppError>;
}
