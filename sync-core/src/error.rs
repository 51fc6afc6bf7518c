use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Conflict: {0}")]
    Conflict(anyhow::Error),

    #[error("Transient I/O error: {0}")]
    Transient(anyhow::Error),

    #[error("Unauthorized: {0}")]
    Unauthorized(anyhow::Error),

    #[error("Not found: {0}")]
    NotFound(anyhow::Error),

    #[error("Bad request: {0}")]
    BadRequest(anyhow::Error),

    #[error("Upstream error ({status}): {body}")]
    Upstream { status: u16, body: String },

    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    /// Map a non-success HTTP status from a remote backend onto the error taxonomy.
    pub fn from_status(status: StatusCode, body: String) -> Self {
        match status {
            StatusCode::CONFLICT => AppError::Conflict(anyhow::anyhow!("{}: {}", status, body)),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                AppError::Unauthorized(anyhow::anyhow!("{}: {}", status, body))
            }
            StatusCode::NOT_FOUND => AppError::NotFound(anyhow::anyhow!("{}: {}", status, body)),
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                AppError::BadRequest(anyhow::anyhow!("{}: {}", status, body))
            }
            _ => AppError::Upstream {
                status: status.as_u16(),
                body,
            },
        }
    }

    /// Returns the response unchanged when its status is a success, otherwise
    /// drains the body and converts the status into an `AppError`.
    pub async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, Self> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(Self::from_status(status, body))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, AppError::Conflict(_))
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::Transient(_))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return AppError::from_status(status, err.to_string());
        }

        if err.is_decode() {
            AppError::InternalError(anyhow::Error::new(err))
        } else if err.is_builder() {
            AppError::BadRequest(anyhow::Error::new(err))
        } else {
            // connect, timeout, request and body failures are all I/O on the wire
            AppError::Transient(anyhow::Error::new(err))
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(anyhow::Error::new(err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}
