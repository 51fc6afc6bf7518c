use super::InvoiceSource;
use crate::models::Invoice;
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use std::sync::atomic::{AtomicU64, Ordering};
use sync_core::error::AppError;
use tokio::sync::Mutex;

/// Fakturoid account API root for a subdomain.
pub fn fakturoid_api_url(subdomain: &str) -> String {
    format!("https://{}.fakturoid.cz/api/v1", subdomain)
}

pub struct FakturoidClient {
    client: Client,
    base_url: String,
    token: Secret<String>,
}

impl FakturoidClient {
    pub fn new(client: Client, base_url: impl Into<String>, token: Secret<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            token,
        }
    }
}

#[async_trait]
impl InvoiceSource for FakturoidClient {
    async fn list_invoices(&self, page: u32) -> Result<Vec<Invoice>, AppError> {
        let url = format!("{}/invoices.json", self.base_url.trim_end_matches('/'));

        let response = self
            .client
            .get(&url)
            .query(&[("page", page)])
            .bearer_auth(self.token.expose_secret())
            .send()
            .await?;
        let response = AppError::check_response(response).await?;

        let invoices: Vec<Invoice> = response.json().await?;

        tracing::debug!(page = page, count = invoices.len(), "Fetched invoice page");

        Ok(invoices)
    }
}

/// Mock invoice source for testing. Page `n` serves `pages[n - 1]`; pages
/// past the end are empty.
pub struct MockInvoiceSource {
    pages: Vec<Vec<Invoice>>,
    failing_page: Option<u32>,
    fetch_count: AtomicU64,
    fetched_pages: Mutex<Vec<u32>>,
}

impl MockInvoiceSource {
    pub fn new(pages: Vec<Vec<Invoice>>) -> Self {
        Self {
            pages,
            failing_page: None,
            fetch_count: AtomicU64::new(0),
            fetched_pages: Mutex::new(Vec::new()),
        }
    }

    /// Fail every request for `page` with an upstream error.
    pub fn failing_on(self, page: u32) -> Self {
        Self {
            failing_page: Some(page),
            ..self
        }
    }

    pub fn fetch_count(&self) -> u64 {
        self.fetch_count.load(Ordering::SeqCst)
    }

    /// Pages requested so far, sorted.
    pub async fn fetched_pages(&self) -> Vec<u32> {
        let mut pages = self.fetched_pages.lock().await.clone();
        pages.sort_unstable();
        pages
    }
}

#[async_trait]
impl InvoiceSource for MockInvoiceSource {
    async fn list_invoices(&self, page: u32) -> Result<Vec<Invoice>, AppError> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        self.fetched_pages.lock().await.push(page);

        if self.failing_page == Some(page) {
            return Err(AppError::Upstream {
                status: 500,
                body: format!("mock failure on page {}", page),
            });
        }

        let invoices = page
            .checked_sub(1)
            .and_then(|i| self.pages.get(i as usize))
            .cloned()
            .unwrap_or_default();

        tracing::info!(page = page, count = invoices.len(), "[MOCK] Invoice page served");

        Ok(invoices)
    }
}
