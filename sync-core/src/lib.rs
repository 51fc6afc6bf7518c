//! sync-core: Shared infrastructure for the transaction sync pipeline.
pub mod concurrency;
pub mod config;
pub mod error;
pub mod observability;
pub mod retry;

pub use reqwest;
pub use serde;
pub use serde_json;
pub use tokio;
pub use tracing;
