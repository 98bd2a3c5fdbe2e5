// 🚨 Error taxonomy
// Ledger errors surface to the caller; sync errors end up in a failed-session report.

use thiserror::Error;

/// Result type for ledger and store operations
pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

/// Errors raised by the ledger engine and the person/payment store
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Malformed input, rejected before any mutation
    #[error("{0}")]
    Validation(String),

    /// Referenced record does not exist
    #[error("{0}")]
    NotFound(String),

    /// Backend failure
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

impl LedgerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        LedgerError::Validation(msg.into())
    }

    pub fn person_not_found(person_id: i64) -> Self {
        LedgerError::NotFound(format!("person {} not found", person_id))
    }
}

/// Errors raised during a sync session
#[derive(Error, Debug)]
pub enum SyncError {
    /// Remote did not answer (connect failure, timeout)
    #[error("Remote {remote} unreachable: {reason}")]
    Unreachable { remote: String, reason: String },

    /// Bytes on the wire did not arrive as declared
    #[error("Transfer failed: {0}")]
    Transfer(String),

    /// Local store could not be read or written
    #[error("Local store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    pub fn length_mismatch(declared: u64, received: usize) -> Self {
        SyncError::Transfer(format!(
            "declared {} bytes but received {}",
            declared, received
        ))
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(e: reqwest::Error) -> Self {
        let remote = e
            .url()
            .map(|u| u.to_string())
            .unwrap_or_else(|| "<unknown>".to_string());

        if e.is_connect() || e.is_timeout() {
            SyncError::Unreachable {
                remote,
                reason: e.to_string(),
            }
        } else {
            SyncError::Transfer(e.to_string())
        }
    }
}

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}
