//! Fire-time arithmetic for spool's posting schedules.
//!
//! Four policies drive the run loop:
//! - fixed interval: fire immediately, then every N minutes
//! - daily window: a uniformly random instant inside a `HH:MM-HH:MM` window
//! - daily at: a fixed time of day with randomized jitter
//! - daily multi at: several daily times, each independently jittered
//!
//! All arithmetic happens in one named timezone so windows stay put
//! regardless of host configuration. Computations take an explicit `now`
//! and rng, which keeps them deterministic under test.

mod clock;
mod error;
mod policy;

pub use clock::{TimeOfDay, Window, parse_times, parse_timezone};
pub use error::ScheduleError;
pub use policy::{
    MIN_LEAD_SECS, ScheduleMap, nearest_entry, next_at_with_jitter, next_random_in_window,
    sleep_until, start_of_day_after,
};
