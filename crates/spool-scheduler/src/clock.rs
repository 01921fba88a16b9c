//! Time-of-day and window parsing, and local-time resolution.

use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, NaiveTime, TimeZone};
use chrono_tz::Tz;

use crate::ScheduleError;

/// A wall-clock time of day, possibly carried into a later calendar day.
///
/// Hour values >= 24 mean "`hour / 24` days later at `hour % 24`", so a
/// schedule of `26:30` fires the next calendar day at 02:30.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeOfDay {
    /// Calendar days to carry past the reference date.
    pub days: u32,
    /// Time within that day.
    pub time: NaiveTime,
}

impl TimeOfDay {
    /// Parse an extended `HH:MM` string (hours >= 24 allowed).
    pub fn parse(s: &str) -> Result<Self, ScheduleError> {
        let (h, m) =
            split_hhmm(s).ok_or_else(|| ScheduleError::InvalidTime(s.trim().to_string()))?;
        let time = NaiveTime::from_hms_opt(h % 24, m, 0)
            .ok_or_else(|| ScheduleError::InvalidTime(s.trim().to_string()))?;
        Ok(Self { days: h / 24, time })
    }
}

/// A daily `HH:MM-HH:MM` window (plain 24-hour times only).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl Window {
    /// Parse a `HH:MM-HH:MM` window string.
    pub fn parse(s: &str) -> Result<Self, ScheduleError> {
        let invalid = || ScheduleError::InvalidWindow(s.trim().to_string());
        let (start_s, end_s) = s.trim().split_once('-').ok_or_else(invalid)?;
        Ok(Self {
            start: parse_plain_time(start_s).ok_or_else(invalid)?,
            end: parse_plain_time(end_s).ok_or_else(invalid)?,
        })
    }
}

/// Parse a comma-separated list of `HH:MM` times into labeled entries.
///
/// Labels are the trimmed source strings; they key the multi-time schedule
/// map. Empty segments are skipped; an empty result is an error.
pub fn parse_times(csv: &str) -> Result<Vec<(String, TimeOfDay)>, ScheduleError> {
    let mut times = Vec::new();
    for part in csv.split(',') {
        let label = part.trim();
        if label.is_empty() {
            continue;
        }
        times.push((label.to_string(), TimeOfDay::parse(label)?));
    }
    if times.is_empty() {
        return Err(ScheduleError::EmptyTimes);
    }
    Ok(times)
}

/// Look up a named IANA timezone.
pub fn parse_timezone(name: &str) -> Result<Tz, ScheduleError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| ScheduleError::InvalidTimezone(name.trim().to_string()))
}

fn split_hhmm(s: &str) -> Option<(u32, u32)> {
    let (h, m) = s.trim().split_once(':')?;
    Some((h.parse().ok()?, m.parse().ok()?))
}

fn parse_plain_time(s: &str) -> Option<NaiveTime> {
    let (h, m) = split_hhmm(s)?;
    NaiveTime::from_hms_opt(h, m, 0)
}

/// Resolve a naive local datetime in `tz`.
///
/// Ambiguous local times (DST fall-back) take the earlier instant; times in
/// a DST gap are pushed forward an hour.
pub(crate) fn localize(tz: Tz, naive: NaiveDateTime) -> DateTime<Tz> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(earlier, _) => earlier,
        LocalResult::None => tz
            .from_local_datetime(&(naive + Duration::hours(1)))
            .earliest()
            .unwrap_or_else(|| tz.from_utc_datetime(&naive)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_plain_time_of_day() {
        let t = TimeOfDay::parse("09:30").unwrap();
        assert_eq!(t.days, 0);
        assert_eq!(t.time, NaiveTime::from_hms_opt(9, 30, 0).unwrap());
    }

    #[test]
    fn parses_extended_hours_as_day_carry() {
        let t = TimeOfDay::parse("26:15").unwrap();
        assert_eq!(t.days, 1);
        assert_eq!(t.time, NaiveTime::from_hms_opt(2, 15, 0).unwrap());

        let t = TimeOfDay::parse("24:00").unwrap();
        assert_eq!(t.days, 1);
        assert_eq!(t.time, NaiveTime::from_hms_opt(0, 0, 0).unwrap());
    }

    #[test]
    fn rejects_malformed_times() {
        assert!(matches!(
            TimeOfDay::parse("0930"),
            Err(ScheduleError::InvalidTime(_))
        ));
        assert!(matches!(
            TimeOfDay::parse("09:72"),
            Err(ScheduleError::InvalidTime(_))
        ));
        assert!(matches!(
            TimeOfDay::parse("nine:30"),
            Err(ScheduleError::InvalidTime(_))
        ));
    }

    #[test]
    fn parses_window() {
        let w = Window::parse("10:00-11:30").unwrap();
        assert_eq!(w.start, NaiveTime::from_hms_opt(10, 0, 0).unwrap());
        assert_eq!(w.end, NaiveTime::from_hms_opt(11, 30, 0).unwrap());
    }

    #[test]
    fn window_rejects_extended_hours() {
        // Windows are plain daily times; day-carry is only for `daily_at`.
        assert!(matches!(
            Window::parse("10:00-25:00"),
            Err(ScheduleError::InvalidWindow(_))
        ));
        assert!(matches!(
            Window::parse("10:00"),
            Err(ScheduleError::InvalidWindow(_))
        ));
    }

    #[test]
    fn parses_time_list_with_whitespace() {
        let times = parse_times(" 09:00, 21:30 ,").unwrap();
        assert_eq!(times.len(), 2);
        assert_eq!(times[0].0, "09:00");
        assert_eq!(times[1].0, "21:30");
    }

    #[test]
    fn empty_time_list_is_an_error() {
        assert!(matches!(parse_times(" , "), Err(ScheduleError::EmptyTimes)));
        assert!(matches!(parse_times(""), Err(ScheduleError::EmptyTimes)));
    }

    #[test]
    fn parses_known_timezone() {
        assert_eq!(parse_timezone("Asia/Tokyo").unwrap(), chrono_tz::Asia::Tokyo);
        assert!(matches!(
            parse_timezone("Mars/Olympus"),
            Err(ScheduleError::InvalidTimezone(_))
        ));
    }
}
