//! Configuration module for transaction-sync.

use crate::services::fakturoid::fakturoid_api_url;
use crate::services::fio::FIO_API_URL;
use crate::services::sheets::SHEETS_API_URL;
use secrecy::Secret;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use sync_core::config as core_config;
use sync_core::error::AppError;
use sync_core::retry::RetryConfig;

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub service_version: String,
    pub otlp_endpoint: Option<String>,
    pub http_timeout: Duration,
    pub feed: FeedConfig,
    pub sheets: SheetsConfig,
    pub invoices: Option<InvoiceConfig>,
    pub retry: RetryConfig,
    pub metrics_file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub url: String,
    pub token: Secret<String>,
}

#[derive(Debug, Clone)]
pub struct SheetsConfig {
    pub url: String,
    pub access_token: Secret<String>,
    pub spreadsheet_key: String,
    pub worksheet_name: String,
}

#[derive(Debug, Clone)]
pub struct InvoiceConfig {
    pub url: String,
    pub token: Secret<String>,
    pub load_size: usize,
}

impl SyncConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;
        Self::from_lookup(common, |key| env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(common: core_config::Config, lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| {
            var(key).ok_or_else(|| AppError::ConfigError(anyhow::anyhow!("{} is required", key)))
        };

        let invoices = match (var("FAKTUROID_SUBDOMAIN"), var("FAKTUROID_TOKEN")) {
            (Some(subdomain), Some(token)) => Some(InvoiceConfig {
                url: var("FAKTUROID_API_URL").unwrap_or_else(|| fakturoid_api_url(&subdomain)),
                token: Secret::new(token),
                load_size: parsed(&var, "INVOICE_LOAD_SIZE")?
                    .unwrap_or(common.max_concurrency),
            }),
            _ => None,
        };

        let retry = RetryConfig::new(
            Duration::from_millis(parsed(&var, "RETRY_INITIAL_BACKOFF_MS")?.unwrap_or(100)),
            Duration::from_millis(parsed(&var, "RETRY_MAX_BACKOFF_MS")?.unwrap_or(10_000)),
        );

        Ok(Self {
            service_name: var("SERVICE_NAME").unwrap_or_else(|| "transaction-sync".to_string()),
            service_version: var("SERVICE_VERSION")
                .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string()),
            otlp_endpoint: var("OTLP_ENDPOINT"),
            http_timeout: Duration::from_secs(parsed(&var, "HTTP_TIMEOUT_SECS")?.unwrap_or(30)),
            feed: FeedConfig {
                url: var("FIO_API_URL").unwrap_or_else(|| FIO_API_URL.to_string()),
                token: Secret::new(required("FIO_TOKEN")?),
            },
            sheets: SheetsConfig {
                url: var("SHEETS_API_URL").unwrap_or_else(|| SHEETS_API_URL.to_string()),
                access_token: Secret::new(required("SHEETS_ACCESS_TOKEN")?),
                spreadsheet_key: required("SPREADSHEET_KEY")?,
                worksheet_name: required("WORKSHEET_NAME")?,
            },
            invoices,
            retry,
            metrics_file: var("METRICS_FILE").map(PathBuf::from),
            common,
        })
    }
}

/// Parse an optional value; a present but malformed value is an error.
fn parsed<T, F>(var: &F, key: &str) -> Result<Option<T>, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    var(key)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!("{} has invalid value '{}': {}", key, raw, e))
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    const BASE: &[(&str, &str)] = &[
        ("FIO_TOKEN", "fio-token"),
        ("SHEETS_ACCESS_TOKEN", "sheets-token"),
        ("SPREADSHEET_KEY", "sheet-key"),
        ("WORKSHEET_NAME", "Transactions"),
    ];

    #[test]
    fn test_minimal_config_disables_invoices() {
        let config = SyncConfig::from_lookup(core_config::Config::default(), lookup(BASE)).unwrap();

        assert_eq!(config.service_name, "transaction-sync");
        assert_eq!(config.feed.url, FIO_API_URL);
        assert_eq!(config.feed.token.expose_secret(), "fio-token");
        assert_eq!(config.sheets.worksheet_name, "Transactions");
        assert!(config.invoices.is_none());
        assert!(config.metrics_file.is_none());
        assert_eq!(config.http_timeout, Duration::from_secs(30));
        assert_eq!(config.retry.initial_backoff, Duration::from_millis(100));
    }

    #[test]
    fn test_invoices_need_subdomain_and_token() {
        let mut pairs = BASE.to_vec();
        pairs.push(("FAKTUROID_SUBDOMAIN", "acme"));

        let config =
            SyncConfig::from_lookup(core_config::Config::default(), lookup(&pairs)).unwrap();
        assert!(config.invoices.is_none());

        pairs.push(("FAKTUROID_TOKEN", "invoice-token"));
        let config =
            SyncConfig::from_lookup(core_config::Config::default(), lookup(&pairs)).unwrap();
        let invoices = config.invoices.unwrap();
        assert_eq!(invoices.url, "https://acme.fakturoid.cz/api/v1");
        assert_eq!(invoices.load_size, 10);
    }

    #[test]
    fn test_missing_required_value() {
        let pairs: Vec<_> = BASE
            .iter()
            .copied()
            .filter(|(k, _)| *k != "SPREADSHEET_KEY")
            .collect();

        let err = SyncConfig::from_lookup(core_config::Config::default(), lookup(&pairs))
            .unwrap_err();
        assert!(err.to_string().contains("SPREADSHEET_KEY"));
    }

    #[test]
    fn test_malformed_number_is_rejected() {
        let mut pairs = BASE.to_vec();
        pairs.push(("HTTP_TIMEOUT_SECS", "soon"));

        let result = SyncConfig::from_lookup(core_config::Config::default(), lookup(&pairs));
        assert!(matches!(result, Err(AppError::ConfigError(_))));
    }
}
