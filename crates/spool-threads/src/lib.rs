//! Threads Graph API client for spool.
//!
//! Implements the two-call posting protocol: create a media container,
//! then publish it. Text posts set `auto_publish_text` and skip the second
//! call, so they count as published after creation alone. Every remote
//! call runs under a bounded retry policy with randomized backoff.

mod client;
mod error;
mod retry;
mod types;

pub use client::{API_BASE, ThreadsClient};
pub use error::ThreadsError;
pub use retry::RetryPolicy;
pub use types::{CreateContainer, MediaType, PostOutcome};
