//! Error types for the sheets adapter.

use thiserror::Error;

/// Errors that can occur when talking to the Sheets API.
#[derive(Debug, Error)]
pub enum SheetsError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Token exchange or credential problem.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Service account key could not be loaded.
    #[error("service account key: {0}")]
    Key(String),

    /// API call failed with an HTTP status.
    #[error("HTTP {status}: {body}")]
    Api { status: u16, body: String },

    /// The spreadsheet reference is neither an id nor a sheets URL.
    #[error("invalid spreadsheet reference: {0}")]
    InvalidSheetRef(String),

    /// No worksheet to operate on.
    #[error("worksheet not found: {0}")]
    WorksheetNotFound(String),

    /// A required column vanished after header reconciliation.
    #[error("missing column: {0}")]
    MissingColumn(String),
}
