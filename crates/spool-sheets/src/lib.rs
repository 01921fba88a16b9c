//! Google Sheets row store for spool's posting queue.
//!
//! The queue is one worksheet: row 1 is the header, every later row is a
//! post. This crate provides:
//!
//! - **Client**: a typed values-API client with service-account auth
//! - **Store**: header reconciliation, row reads, per-row result writes
//! - **Selector**: picking the first row still eligible for posting

mod auth;
mod client;
mod error;
mod store;

#[cfg(test)]
mod testutil;

pub use auth::{ServiceAccountKey, resolve_key_path};
pub use client::{API_BASE, SheetsClient, spreadsheet_id_from_ref};
pub use error::SheetsError;
pub use store::{
    MAX_ERROR_LEN, REQUIRED_COLUMNS, Row, RowStatus, RowStore, col_to_a1, first_unposted,
    truncate_error,
};
