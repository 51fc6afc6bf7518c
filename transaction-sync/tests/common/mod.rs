//! Common test utilities for transaction-sync integration tests.

#![allow(dead_code)]

use serde_json::json;
use std::sync::{Arc, Once};
use sync_core::retry::RetryConfig;
use transaction_sync::models::{Invoice, Transaction, AMOUNT, TRANSACTION_ID, VARIABLE_SYMBOL};
use transaction_sync::record_store::RecordStore;
use transaction_sync::services::MockRecordBackend;

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,transaction_sync=debug,sync_core=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Header used by most record store tests.
pub const LEDGER_HEADER: &[&str] = &[
    "transaction_id",
    "date",
    "amount",
    "variable_symbol",
    "invoice_id",
    "invoice_number",
    "client_name",
    "invoice_issued_on",
];

pub fn transaction(id: &str, amount: i64) -> Transaction {
    Transaction::new()
        .with(TRANSACTION_ID, id)
        .with("date", "2024-03-05")
        .with(AMOUNT, amount)
}

pub fn payment(id: &str, amount: i64, symbol: &str) -> Transaction {
    transaction(id, amount).with(VARIABLE_SYMBOL, symbol)
}

pub fn invoice(id: i64, symbol: &str) -> Invoice {
    serde_json::from_value(json!({
        "id": id,
        "number": format!("INV-{id}"),
        "variable_symbol": symbol,
        "client_name": format!("Client {id}"),
        "client_registration_no": "12345678",
        "issued_on": "2024-02-01",
        "sent_at": "2024-02-02T09:30:00.000+01:00"
    }))
    .unwrap()
}

/// `pages` pages of `per_page` invoices, every symbol distinct.
pub fn invoice_pages(pages: usize, per_page: usize) -> Vec<Vec<Invoice>> {
    (0..pages)
        .map(|p| {
            (0..per_page)
                .map(|i| {
                    let id = (p * per_page + i + 1) as i64;
                    invoice(id, &format!("VS{id}"))
                })
                .collect()
        })
        .collect()
}

/// Load a record store over `backend` with zero-delay retries.
pub async fn load_store(backend: &Arc<MockRecordBackend>) -> RecordStore {
    RecordStore::load(backend.clone(), RetryConfig::immediate())
        .await
        .unwrap()
}
