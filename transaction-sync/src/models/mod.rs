//! Domain models for transaction-sync.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;

pub const TRANSACTION_ID: &str = "transaction_id";
pub const VARIABLE_SYMBOL: &str = "variable_symbol";
pub const AMOUNT: &str = "amount";

pub const INVOICE_ID: &str = "invoice_id";
pub const INVOICE_NUMBER: &str = "invoice_number";
pub const CLIENT_NAME: &str = "client_name";
pub const CLIENT_REGISTRATION_NO: &str = "client_registration_no";
pub const INVOICE_ISSUED_ON: &str = "invoice_issued_on";
pub const INVOICE_SENT_AT: &str = "invoice_sent_at";

/// Number of leading characters that carry the date in feed and invoice timestamps.
const DATE_PREFIX_LEN: usize = 10;

// ============================================================================
// Transaction
// ============================================================================

/// A bank transaction as a map of named fields.
///
/// The field set is whatever the feed delivers; the record store picks the
/// fields it needs by header name. Enrichment only ever adds fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transaction {
    fields: BTreeMap<String, Value>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    pub fn transaction_id(&self) -> Option<String> {
        self.text(TRANSACTION_ID).filter(|id| !id.is_empty())
    }

    pub fn variable_symbol(&self) -> Option<String> {
        self.text(VARIABLE_SYMBOL).filter(|vs| !vs.is_empty())
    }

    pub fn amount(&self) -> Option<Decimal> {
        match self.fields.get(AMOUNT)? {
            Value::Number(n) => parse_decimal(&n.to_string()),
            Value::String(s) => parse_decimal(s.trim()),
            _ => None,
        }
    }

    /// Only incoming payments carrying a symbol are matched against invoices.
    pub fn is_enrichable(&self) -> bool {
        self.amount().is_some_and(|amount| amount > Decimal::ZERO)
            && self.variable_symbol().is_some()
    }

    /// Copy the invoice metadata onto this transaction.
    pub fn apply_invoice(&mut self, invoice: &Invoice) {
        self.set(INVOICE_ID, invoice.id);
        self.set(INVOICE_NUMBER, invoice.number.clone());
        self.set(CLIENT_NAME, invoice.client_name.clone().unwrap_or_default());
        self.set(
            CLIENT_REGISTRATION_NO,
            invoice.client_registration_no.clone().unwrap_or_default(),
        );
        self.set(
            INVOICE_ISSUED_ON,
            date_prefix(invoice.issued_on.as_deref().unwrap_or_default()),
        );
        self.set(
            INVOICE_SENT_AT,
            date_prefix(invoice.sent_at.as_deref().unwrap_or_default()),
        );
    }

    /// Lay the transaction out in `header` order. Missing and null fields
    /// become empty strings so every row has the header's width.
    pub fn project_row(&self, header: &[String]) -> Vec<Value> {
        header
            .iter()
            .map(|column| match self.fields.get(column) {
                None | Some(Value::Null) => Value::String(String::new()),
                Some(value) => value.clone(),
            })
            .collect()
    }

    fn text(&self, field: &str) -> Option<String> {
        self.fields.get(field).and_then(value_text)
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Transaction {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

// ============================================================================
// Invoice
// ============================================================================

/// Invoice metadata from the bookkeeping backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: i64,
    #[serde(default)]
    pub number: String,
    #[serde(default, deserialize_with = "symbol_from_value")]
    pub variable_symbol: String,
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default)]
    pub client_registration_no: Option<String>,
    #[serde(default)]
    pub issued_on: Option<String>,
    #[serde(default)]
    pub sent_at: Option<String>,
}

/// The backend sends symbols as either strings or numbers.
fn symbol_from_value<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value_text(&value).unwrap_or_default())
}

// ============================================================================
// Helpers
// ============================================================================

/// Text form of a scalar cell value; `None` for null.
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

pub fn date_prefix(s: &str) -> String {
    s.chars().take(DATE_PREFIX_LEN).collect()
}

fn parse_decimal(s: &str) -> Option<Decimal> {
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}
