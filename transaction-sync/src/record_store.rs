//! Idempotent append of transactions into the record store.

use crate::models::{Transaction, TRANSACTION_ID};
use crate::services::{record_transaction_outcome, RecordBackend};
use dashmap::DashSet;
use std::sync::Arc;
use sync_core::error::AppError;
use sync_core::retry::{run_with_retry, RetryConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Saved,
    AlreadyPresent,
    /// Another append of the same id was in flight. Nothing is known about
    /// whether that append lands.
    InFlight,
}

impl AppendOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Saved => "saved",
            Self::AlreadyPresent => "already_present",
            Self::InFlight => "in_flight",
        }
    }
}

/// The remote record store plus the set of transaction ids known to be in it.
///
/// `ids` is seeded once at load and grows with every append this process
/// makes. It is never re-read, so rows written by other processes after load
/// are invisible here, including across retries.
pub struct RecordStore {
    backend: Arc<dyn RecordBackend>,
    header: Vec<String>,
    ids: DashSet<String>,
    // ids with an append in flight
    pending: DashSet<String>,
    retry: RetryConfig,
}

impl RecordStore {
    /// Read the header and the existing `transaction_id` column.
    pub async fn load(backend: Arc<dyn RecordBackend>, retry: RetryConfig) -> Result<Self, AppError> {
        let header = backend.read_header().await?;
        if !header.iter().any(|column| column == TRANSACTION_ID) {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "Record store header has no '{}' column",
                TRANSACTION_ID
            )));
        }

        let ids: DashSet<String> = backend
            .read_column(TRANSACTION_ID)
            .await?
            .into_iter()
            .filter(|id| !id.is_empty())
            .collect();

        tracing::debug!(
            columns = header.len(),
            known_ids = ids.len(),
            "Record store loaded"
        );

        Ok(Self {
            backend,
            header,
            ids,
            pending: DashSet::new(),
            retry,
        })
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn known_count(&self) -> usize {
        self.ids.len()
    }

    pub fn contains(&self, transaction_id: &str) -> bool {
        self.ids.contains(transaction_id)
    }

    /// Append `transaction` unless its id is already known.
    ///
    /// Conflicts and transient failures re-run the whole check-then-append.
    pub async fn append(&self, transaction: &Transaction) -> Result<AppendOutcome, AppError> {
        let id = transaction.transaction_id().ok_or_else(|| {
            AppError::BadRequest(anyhow::anyhow!("Transaction has no '{}'", TRANSACTION_ID))
        })?;

        let outcome = run_with_retry(&self.retry, "append_transaction", || {
            self.try_append(&id, transaction)
        })
        .await?;

        record_transaction_outcome(outcome.as_str());
        Ok(outcome)
    }

    async fn try_append(
        &self,
        id: &str,
        transaction: &Transaction,
    ) -> Result<AppendOutcome, AppError> {
        if self.ids.contains(id) {
            tracing::info!(transaction_id = %id, "Transaction already present");
            return Ok(AppendOutcome::AlreadyPresent);
        }

        if !self.pending.insert(id.to_string()) {
            tracing::info!(transaction_id = %id, "Transaction already being saved");
            return Ok(AppendOutcome::InFlight);
        }

        // an append of the same id may have finished between the two checks
        if self.ids.contains(id) {
            self.pending.remove(id);
            tracing::info!(transaction_id = %id, "Transaction already present");
            return Ok(AppendOutcome::AlreadyPresent);
        }

        let row = transaction.project_row(&self.header);

        match self.backend.append_row(row).await {
            Ok(()) => {
                self.ids.insert(id.to_string());
                self.pending.remove(id);
                tracing::info!(transaction_id = %id, "Transaction saved");
                Ok(AppendOutcome::Saved)
            }
            Err(e) => {
                self.pending.remove(id);
                Err(e)
            }
        }
    }
}
