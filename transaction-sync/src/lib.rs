//! Transaction Sync - idempotent bank transaction sync into a ledger sheet.

pub mod config;
pub mod invoice_index;
pub mod models;
pub mod record_store;
pub mod services;
pub mod startup;
pub mod sync;
