//! Next-fire-instant computation for the posting schedules.

use std::collections::BTreeMap;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use rand::Rng;
use tokio::time::sleep;
use tracing::trace;

use crate::clock::{TimeOfDay, Window, localize};

/// Minimum lead time before any computed fire instant.
pub const MIN_LEAD_SECS: i64 = 5;

/// Minimum randomization span for jittered times.
const MIN_JITTER_SPAN_SECS: i64 = 60;

/// Minimum sleep slice while waiting for a fire instant.
const MIN_SLEEP_SECS: u64 = 1;

/// Maximum sleep slice while waiting for a fire instant.
const MAX_SLEEP_SECS: u64 = 60;

/// Next fire instant per schedule label, for the multi-time policy.
///
/// The run loop sleeps until the nearest entry, fires it, and recomputes
/// only that label; the other labels' pending instants are undisturbed.
pub type ScheduleMap = BTreeMap<String, DateTime<Tz>>;

/// Compute a uniformly random instant inside the daily window.
///
/// The instant is at least [`MIN_LEAD_SECS`] in the future. If the window
/// end has already passed today, or the window is not after its own start,
/// the whole window shifts to the next day.
pub fn next_random_in_window(
    window: &Window,
    now: DateTime<Tz>,
    rng: &mut impl Rng,
) -> DateTime<Tz> {
    let tz = now.timezone();
    let day = Duration::days(1);
    let today = now.date_naive();

    let mut start = localize(tz, today.and_time(window.start));
    let mut end = localize(tz, today.and_time(window.end));
    if end <= now || end <= start {
        start = start + day;
        end = end + day;
    }

    let lead = Duration::seconds(MIN_LEAD_SECS);
    let mut win_start = start.max(now + lead);
    if end - win_start <= lead {
        // Too little of the window left; take tomorrow's from its start.
        start = start + day;
        end = end + day;
        win_start = start;
    }

    let span = (end - win_start).num_seconds().max(0);
    win_start + Duration::seconds(rng.random_range(0..=span))
}

/// Compute the next fire instant for a daily time with jitter.
///
/// The target is `now`'s date at the given time (plus its day carry), rolled
/// one day forward once `target + jitter` has passed. The instant is uniform
/// within `[target - jitter, target + jitter]`, clamped to at least
/// [`MIN_LEAD_SECS`] in the future, with a randomization span of at least
/// 60 seconds.
pub fn next_at_with_jitter(
    time: &TimeOfDay,
    jitter_min: u32,
    now: DateTime<Tz>,
    rng: &mut impl Rng,
) -> DateTime<Tz> {
    let tz = now.timezone();
    let base_date = now.date_naive() + Duration::days(time.days as i64);

    let mut base = localize(tz, base_date.and_time(time.time));
    let jitter = Duration::minutes(jitter_min as i64);
    if now > base + jitter {
        base = base + Duration::days(1);
    }

    let start = (base - jitter).max(now + Duration::seconds(MIN_LEAD_SECS));
    let span = (base + jitter - start)
        .num_seconds()
        .max(MIN_JITTER_SPAN_SECS);
    start + Duration::seconds(rng.random_range(0..=span))
}

/// Midnight of the calendar day after `at`.
///
/// Used as the draw reference once a daily window has fired, so the next
/// instant is uniform over the whole of tomorrow's window rather than the
/// remainder past the instant that just fired.
pub fn start_of_day_after(at: DateTime<Tz>) -> DateTime<Tz> {
    let tz = at.timezone();
    localize(
        tz,
        (at.date_naive() + Duration::days(1)).and_time(chrono::NaiveTime::MIN),
    )
}

/// The schedule entry with the nearest pending fire instant.
pub fn nearest_entry(map: &ScheduleMap) -> Option<(&str, DateTime<Tz>)> {
    map.iter()
        .min_by_key(|(_, at)| **at)
        .map(|(label, at)| (label.as_str(), *at))
}

/// Sleep until `target`, in bounded slices so the wall clock is reassessed
/// at least once a minute.
pub async fn sleep_until(target: DateTime<Tz>) {
    loop {
        let now = Utc::now().with_timezone(&target.timezone());
        if now >= target {
            return;
        }
        let remaining = (target - now).num_seconds().max(MIN_SLEEP_SECS as i64) as u64;
        let slice = remaining.min(MAX_SLEEP_SECS);
        trace!(slice_secs = slice, "sleeping toward fire instant");
        sleep(StdDuration::from_secs(slice)).await;
    }
}
