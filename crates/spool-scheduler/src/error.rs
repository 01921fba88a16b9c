//! Error types for schedule parsing.

use thiserror::Error;

/// Errors that can occur when parsing schedule specifications.
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// Time-of-day string is not a valid `HH:MM`.
    #[error("invalid time of day '{0}', expected HH:MM")]
    InvalidTime(String),

    /// Window string is not a valid `HH:MM-HH:MM`.
    #[error("invalid window '{0}', expected HH:MM-HH:MM")]
    InvalidWindow(String),

    /// Timezone name is not a known IANA zone.
    #[error("unknown timezone '{0}'")]
    InvalidTimezone(String),

    /// Multi-time schedule has no entries.
    #[error("no schedule times given")]
    EmptyTimes,
}
