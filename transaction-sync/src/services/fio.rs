use super::TransactionFeed;
use crate::models::{date_prefix, value_text, Transaction};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use sync_core::error::AppError;
use tokio::sync::Mutex;

pub const FIO_API_URL: &str = "https://fioapi.fio.cz/v1/rest";

#[derive(Debug, Clone, Copy)]
enum ColumnKind {
    Text,
    Amount,
    Date,
}

/// Statement column -> transaction field.
const FIO_COLUMNS: &[(&str, &str, ColumnKind)] = &[
    ("column22", "transaction_id", ColumnKind::Text),
    ("column0", "date", ColumnKind::Date),
    ("column1", "amount", ColumnKind::Amount),
    ("column14", "currency", ColumnKind::Text),
    ("column2", "account_number", ColumnKind::Text),
    ("column10", "account_name", ColumnKind::Text),
    ("column3", "bank_code", ColumnKind::Text),
    ("column26", "bic", ColumnKind::Text),
    ("column12", "bank_name", ColumnKind::Text),
    ("column4", "constant_symbol", ColumnKind::Text),
    ("column5", "variable_symbol", ColumnKind::Text),
    ("column6", "specific_symbol", ColumnKind::Text),
    ("column7", "user_identification", ColumnKind::Text),
    ("column16", "recipient_message", ColumnKind::Text),
    ("column8", "type", ColumnKind::Text),
    ("column9", "executor", ColumnKind::Text),
    ("column18", "specification", ColumnKind::Text),
    ("column25", "comment", ColumnKind::Text),
    ("column17", "instruction_id", ColumnKind::Text),
];

#[derive(Debug, Deserialize)]
struct FioResponse {
    #[serde(rename = "accountStatement")]
    account_statement: FioStatement,
}

#[derive(Debug, Deserialize)]
struct FioStatement {
    #[serde(rename = "transactionList", default)]
    transaction_list: Option<FioTransactionList>,
}

#[derive(Debug, Deserialize)]
struct FioTransactionList {
    #[serde(default)]
    transaction: Vec<HashMap<String, Option<FioColumn>>>,
}

#[derive(Debug, Deserialize)]
struct FioColumn {
    #[serde(default)]
    value: Value,
}

/// Fio bank REST feed. The API token is a path segment, so request errors are
/// stripped of their URL before they reach the logs.
pub struct FioFeed {
    client: Client,
    base_url: String,
    token: Secret<String>,
}

impl FioFeed {
    pub fn new(client: Client, base_url: impl Into<String>, token: Secret<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            token,
        }
    }
}

#[async_trait]
impl TransactionFeed for FioFeed {
    async fn fetch_transactions(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<Transaction>, AppError> {
        let url = format!(
            "{}/periods/{}/{}/{}/transactions.json",
            self.base_url.trim_end_matches('/'),
            self.token.expose_secret(),
            start_date.format("%Y-%m-%d"),
            end_date.format("%Y-%m-%d"),
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::from(e.without_url()))?;
        let response = AppError::check_response(response).await?;

        let body: FioResponse = response
            .json()
            .await
            .map_err(|e| AppError::from(e.without_url()))?;

        let transactions = transactions_from_response(body);

        tracing::debug!(
            start_date = %start_date,
            end_date = %end_date,
            count = transactions.len(),
            "Fetched Fio statement"
        );

        Ok(transactions)
    }
}

fn transactions_from_response(response: FioResponse) -> Vec<Transaction> {
    response
        .account_statement
        .transaction_list
        .map(|list| list.transaction)
        .unwrap_or_default()
        .into_iter()
        .map(transaction_from_columns)
        .collect()
}

fn transaction_from_columns(columns: HashMap<String, Option<FioColumn>>) -> Transaction {
    let mut transaction = Transaction::new();

    for (column, field, kind) in FIO_COLUMNS {
        let Some(Some(cell)) = columns.get(*column) else {
            continue;
        };

        let value = match kind {
            ColumnKind::Amount => match &cell.value {
                Value::Null => continue,
                number @ Value::Number(_) => number.clone(),
                other => match value_text(other) {
                    Some(text) => Value::String(text),
                    None => continue,
                },
            },
            ColumnKind::Text => match value_text(&cell.value) {
                Some(text) => Value::String(text),
                None => continue,
            },
            ColumnKind::Date => match value_text(&cell.value) {
                Some(text) => Value::String(date_prefix(&text)),
                None => continue,
            },
        };

        transaction.set(*field, value);
    }

    transaction
}

/// Mock feed for testing.
pub struct MockTransactionFeed {
    transactions: Vec<Transaction>,
    requests: Mutex<Vec<(NaiveDate, NaiveDate)>>,
}

impl MockTransactionFeed {
    pub fn new(transactions: Vec<Transaction>) -> Self {
        Self {
            transactions,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Windows requested so far, oldest first.
    pub async fn requests(&self) -> Vec<(NaiveDate, NaiveDate)> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl TransactionFeed for MockTransactionFeed {
    async fn fetch_transactions(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<Transaction>, AppError> {
        self.requests.lock().await.push((start_date, end_date));

        tracing::info!(
            start_date = %start_date,
            end_date = %end_date,
            count = self.transactions.len(),
            "[MOCK] Transactions fetched"
        );

        Ok(self.transactions.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_statement_columns_map_to_fields() {
        let response: FioResponse = serde_json::from_value(json!({
            "accountStatement": {
                "info": { "accountId": "2000000000", "currency": "CZK" },
                "transactionList": {
                    "transaction": [{
                        "column22": { "value": 1147608196, "name": "ID pohybu", "id": 22 },
                        "column0": { "value": "2024-03-05+0100", "name": "Datum", "id": 0 },
                        "column1": { "value": 1210.0, "name": "Objem", "id": 1 },
                        "column14": { "value": "CZK", "name": "Měna", "id": 14 },
                        "column5": { "value": "20240012", "name": "VS", "id": 5 },
                        "column4": { "value": 308, "name": "KS", "id": 4 },
                        "column16": null,
                        "column25": { "value": null, "name": "Komentář", "id": 25 }
                    }]
                }
            }
        }))
        .unwrap();

        let transactions = transactions_from_response(response);
        assert_eq!(transactions.len(), 1);

        let tx = &transactions[0];
        assert_eq!(tx.transaction_id().as_deref(), Some("1147608196"));
        assert_eq!(tx.get("date"), Some(&json!("2024-03-05")));
        assert_eq!(tx.get("amount"), Some(&json!(1210.0)));
        assert_eq!(tx.get("currency"), Some(&json!("CZK")));
        assert_eq!(tx.variable_symbol().as_deref(), Some("20240012"));
        assert_eq!(tx.get("constant_symbol"), Some(&json!("308")));
        assert!(tx.get("recipient_message").is_none());
        assert!(tx.get("comment").is_none());
    }

    #[test]
    fn test_empty_statement() {
        let response: FioResponse = serde_json::from_value(json!({
            "accountStatement": { "info": {}, "transactionList": { "transaction": [] } }
        }))
        .unwrap();
        assert!(transactions_from_response(response).is_empty());

        let response: FioResponse =
            serde_json::from_value(json!({ "accountStatement": { "info": {} } })).unwrap();
        assert!(transactions_from_response(response).is_empty());
    }
}
