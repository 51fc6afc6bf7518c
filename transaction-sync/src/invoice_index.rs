//! In-memory index of invoices by variable symbol.

use crate::models::{Invoice, Transaction};
use crate::services::{record_invoice_page, InvoiceSource};
use std::collections::HashMap;
use sync_core::concurrency::run_concurrently;
use sync_core::error::AppError;

#[derive(Debug, Clone, Default)]
pub struct InvoiceIndex {
    by_symbol: HashMap<String, Invoice>,
}

impl InvoiceIndex {
    /// Page through `source` in batches of `load_size` concurrent requests.
    ///
    /// Loading stops after a batch that either contains an empty page or adds
    /// no new symbol. With data on pages `1..=N` that is `ceil(N / load_size)`
    /// batches, plus one empty batch when `N` ends on a batch boundary, so at
    /// most `N + load_size` pages are requested. Page errors are returned as-is.
    pub async fn build(source: &dyn InvoiceSource, load_size: usize) -> Result<Self, AppError> {
        let load_size = load_size.max(1);
        let pages_per_batch = u32::try_from(load_size).unwrap_or(u32::MAX);
        let mut by_symbol: HashMap<String, Invoice> = HashMap::new();
        let mut pages_fetched = 0usize;

        for batch in 0u32.. {
            let count_before = by_symbol.len();
            let first_page = batch.saturating_mul(pages_per_batch).saturating_add(1);
            let pages = first_page..first_page.saturating_add(pages_per_batch);

            let mut fetched = run_concurrently(pages, load_size, |page| async move {
                let invoices = source.list_invoices(page).await?;
                record_invoice_page();
                Ok::<_, AppError>((page, invoices))
            })
            .await?;
            pages_fetched += fetched.len();
            let reached_end = fetched.iter().any(|(_, invoices)| invoices.is_empty());

            // later pages win on duplicate symbols, independent of completion order
            fetched.sort_unstable_by_key(|(page, _)| *page);
            for (_, invoices) in fetched {
                for invoice in invoices {
                    if invoice.variable_symbol.is_empty() {
                        continue;
                    }
                    by_symbol.insert(invoice.variable_symbol.clone(), invoice);
                }
            }

            tracing::debug!(
                batch = batch,
                first_page = first_page,
                symbols = by_symbol.len(),
                reached_end = reached_end,
                "Invoice batch loaded"
            );

            if reached_end || by_symbol.len() == count_before {
                break;
            }
        }

        tracing::info!(
            invoices = by_symbol.len(),
            pages = pages_fetched,
            "Invoice index built"
        );

        Ok(Self { by_symbol })
    }

    pub fn get(&self, variable_symbol: &str) -> Option<&Invoice> {
        self.by_symbol.get(variable_symbol)
    }

    pub fn len(&self) -> usize {
        self.by_symbol.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_symbol.is_empty()
    }

    /// Attach the matching invoice to an incoming payment. Returns whether
    /// the transaction was enriched.
    pub fn enrich(&self, transaction: &mut Transaction) -> bool {
        if !transaction.is_enrichable() {
            return false;
        }

        let invoice = transaction
            .variable_symbol()
            .and_then(|symbol| self.by_symbol.get(&symbol));

        match invoice {
            Some(invoice) => {
                transaction.apply_invoice(invoice);
                true
            }
            None => false,
        }
    }
}

impl FromIterator<Invoice> for InvoiceIndex {
    fn from_iter<I: IntoIterator<Item = Invoice>>(iter: I) -> Self {
        Self {
            by_symbol: iter
                .into_iter()
                .filter(|invoice| !invoice.variable_symbol.is_empty())
                .map(|invoice| (invoice.variable_symbol.clone(), invoice))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AMOUNT, INVOICE_ID, VARIABLE_SYMBOL};
    use serde_json::json;

    fn invoice(id: i64, symbol: &str) -> Invoice {
        serde_json::from_value(json!({
            "id": id,
            "number": format!("INV-{id}"),
            "variable_symbol": symbol,
            "client_name": "Client",
            "issued_on": "2024-01-15"
        }))
        .unwrap()
    }

    #[test]
    fn test_enrich_only_incoming_payments() {
        let index: InvoiceIndex = vec![invoice(1, "111")].into_iter().collect();

        let mut incoming = Transaction::new()
            .with(AMOUNT, 500)
            .with(VARIABLE_SYMBOL, "111");
        let mut refund = Transaction::new()
            .with(AMOUNT, -500)
            .with(VARIABLE_SYMBOL, "111");
        let mut unknown = Transaction::new()
            .with(AMOUNT, 500)
            .with(VARIABLE_SYMBOL, "999");

        assert!(index.enrich(&mut incoming));
        assert!(!index.enrich(&mut refund));
        assert!(!index.enrich(&mut unknown));

        assert_eq!(incoming.get(INVOICE_ID), Some(&json!(1)));
        assert!(refund.get(INVOICE_ID).is_none());
        assert!(unknown.get(INVOICE_ID).is_none());
    }

    #[test]
    fn test_invoices_without_symbol_are_not_indexed() {
        let index: InvoiceIndex = vec![invoice(1, ""), invoice(2, "222")]
            .into_iter()
            .collect();

        assert_eq!(index.len(), 1);
        assert!(index.get("222").is_some());
    }
}
