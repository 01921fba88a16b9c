//! Error types for the Threads client.

use thiserror::Error;

/// Errors that can occur when posting to Threads.
#[derive(Debug, Error)]
pub enum ThreadsError {
    /// HTTP request failed (network, timeout).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API call failed with an HTTP status. The display form carries the
    /// numeric status so row error cells record it.
    #[error("HTTP {status}: {body}")]
    Api { status: u16, body: String },

    /// Create-container response carried no container id.
    #[error("create-container response carried no container id")]
    MissingContainerId,

    /// The row has neither text nor an image to post.
    #[error("row has neither text nor image_url")]
    EmptyRow,
}
