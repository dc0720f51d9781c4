//! Cron-based time windows.
//!
//! A window opens at every firing of its cron expression and stays open for
//! `duration` seconds. An instant is inside the window when the most recent
//! firing at or before it is less than `duration` seconds old:
//!
//! ```text
//!   prev firing                    prev + duration
//!        |==============================|
//!        ^ active (inclusive)           ^ inactive (exclusive)
//! ```
//!
//! Expressions use six fields with seconds first (`sec min hour dom month dow`).

use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::warn;

use crate::error::{AccessError, Result};

/// A recurring window of access.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    pub cron_exp: String,
    /// Window length in seconds.
    pub duration: u64,
}

impl TimeWindow {
    pub fn new(cron_exp: impl Into<String>, duration: u64) -> Self {
        Self {
            cron_exp: cron_exp.into(),
            duration,
        }
    }

    /// Whether `instant` falls inside this window, evaluating the cron in `tz`.
    ///
    /// An expression that does not parse never opens.
    pub fn is_active(&self, instant: DateTime<Utc>, tz: Tz) -> bool {
        let schedule = match schedule(&self.cron_exp) {
            Ok(schedule) => schedule,
            Err(err) => {
                warn!(cron = %self.cron_exp, error = %err, "Unparsable cron expression, window closed");
                return false;
            }
        };
        if self.duration == 0 {
            return false;
        }
        let Some(length) = i64::try_from(self.duration)
            .ok()
            .and_then(TimeDelta::try_seconds)
        else {
            return false;
        };

        let local = instant.with_timezone(&tz);
        // Firings are strictly before the cursor, so step one second past the
        // truncated instant to include a firing at the instant itself.
        let cursor = local.trunc_subsecs(0) + TimeDelta::seconds(1);
        let Some(prev) = schedule.after(&cursor).next_back() else {
            return false;
        };

        match prev.checked_add_signed(length) {
            Some(end) => prev <= local && local < end,
            None => prev <= local,
        }
    }
}

/// True if `windows` is empty or any window is active at `instant`.
pub fn any_active<'a, I>(windows: I, instant: DateTime<Utc>, tz: Tz) -> bool
where
    I: IntoIterator<Item = &'a TimeWindow>,
{
    let mut windows = windows.into_iter().peekable();
    if windows.peek().is_none() {
        return true;
    }
    windows.any(|window| window.is_active(instant, tz))
}

/// Checks a cron expression the way policies require: six fields, parsable,
/// and not the all-`*` expression that fires every second.
pub fn validate_cron(cron_exp: &str) -> bool {
    let fields: Vec<&str> = cron_exp.split_whitespace().collect();
    fields.len() == 6
        && !fields.iter().all(|field| *field == "*")
        && schedule(cron_exp).is_ok()
}

/// Day names indexed by the usual numeric weekday, `0` and `7` both Sunday.
const WEEKDAYS: [&str; 8] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Parses an expression, reading numeric weekdays with `0`/`7` as Sunday
/// and `1` as Monday. The `cron` crate itself counts from `1` = Sunday, so
/// numeric day-of-week items are rewritten to names first.
fn schedule(cron_exp: &str) -> std::result::Result<Schedule, cron::error::Error> {
    let mut fields: Vec<String> = cron_exp.split_whitespace().map(str::to_string).collect();
    if let Some(weekdays) = fields.get_mut(5) {
        *weekdays = weekdays
            .split(',')
            .map(weekday_item)
            .collect::<Vec<_>>()
            .join(",");
    }
    Schedule::from_str(&fields.join(" "))
}

/// Rewrites one numeric list item (`n`, `a-b`, `n/s`, `a-b/s`) into day
/// names. Anything else is left for the parser to accept or reject.
fn weekday_item(item: &str) -> String {
    let (base, step) = match item.split_once('/') {
        Some((base, step)) => (base, Some(step)),
        None => (item, None),
    };
    let bounds = match base.split_once('-') {
        Some((start, end)) => start.parse::<usize>().ok().zip(end.parse::<usize>().ok()),
        None => base
            .parse::<usize>()
            .ok()
            .map(|day| (day, if step.is_some() { 7 } else { day })),
    };
    let step = match step.map(str::parse::<usize>) {
        None => Some(1),
        Some(Ok(step)) if step > 0 => Some(step),
        Some(_) => None,
    };

    match (bounds, step) {
        (Some((start, end)), Some(step)) if start <= end && end < WEEKDAYS.len() => {
            let mut names: Vec<&str> = Vec::new();
            for day in (start..=end).step_by(step) {
                if !names.contains(&WEEKDAYS[day]) {
                    names.push(WEEKDAYS[day]);
                }
            }
            names.join(",")
        }
        _ => item.to_string(),
    }
}

// ============================================================================
// Options
// ============================================================================

/// Evaluation instant and zone for time checks. Unset fields fall back to
/// the current time and the grant's timezone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeOptions {
    pub now: Option<DateTime<Utc>>,
    pub timezone: Option<Tz>,
}

impl TimeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    pub fn in_timezone(mut self, tz: Tz) -> Self {
        self.timezone = Some(tz);
        self
    }

    /// Like [`in_timezone`](Self::in_timezone) with an IANA name.
    pub fn in_timezone_named(self, name: &str) -> Result<Self> {
        Ok(self.in_timezone(parse_timezone(name)?))
    }
}

pub(crate) fn parse_timezone(name: &str) -> Result<Tz> {
    name.parse::<Tz>()
        .map_err(|_| AccessError::InvalidTimezone {
            name: name.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Asia::Tehran;
    use test_case::test_case;

    fn tehran(hour: u32, min: u32, sec: u32) -> DateTime<Utc> {
        Tehran
            .with_ymd_and_hms(2023, 6, 23, hour, min, sec)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_morning_window() {
        let window = TimeWindow::new("* * 7 * * *", 9 * 60 * 60);

        assert!(window.is_active(tehran(10, 7, 34), Tehran));
        assert!(!window.is_active(tehran(19, 7, 34), Tehran));
        assert!(window.is_active(tehran(7, 30, 0), Tehran));
        assert!(!window.is_active(tehran(6, 59, 59), Tehran));
    }

    #[test]
    fn test_window_end_is_exclusive() {
        // Every second of hour 7 fires, so the last opening is 07:59:59.
        let every_second = TimeWindow::new("* * 7 * * *", 9 * 60 * 60);
        assert!(every_second.is_active(tehran(16, 59, 58), Tehran));
        assert!(!every_second.is_active(tehran(16, 59, 59), Tehran));

        let on_the_hour = TimeWindow::new("0 0 7 * * *", 9 * 60 * 60);
        assert!(on_the_hour.is_active(tehran(7, 0, 0), Tehran));
        assert!(on_the_hour.is_active(tehran(15, 59, 59), Tehran));
        assert!(!on_the_hour.is_active(tehran(16, 0, 0), Tehran));
    }

    #[test]
    fn test_timezone_shifts_window() {
        let window = TimeWindow::new("* * 6 * * *", 28_800);

        assert!(window.is_active(tehran(10, 7, 34), Tehran));
        assert!(!window.is_active(tehran(19, 7, 34), Tehran));

        // 17:00 in Tehran is 13:30 UTC.
        assert!(!window.is_active(tehran(17, 0, 0), Tehran));
        assert!(window.is_active(tehran(17, 0, 0), Tz::UTC));
    }

    #[test]
    fn test_degenerate_windows_are_closed() {
        let instant = tehran(10, 0, 0);
        assert!(!TimeWindow::new("not a cron", 60).is_active(instant, Tehran));
        assert!(!TimeWindow::new("* * 10 * * *", 0).is_active(instant, Tehran));
    }

    #[test]
    fn test_any_active() {
        let instant = tehran(19, 7, 34);
        let morning = TimeWindow::new("0 0 7 * * *", 3600);
        let evening = TimeWindow::new("0 0 19 * * *", 3600);

        let none: [&TimeWindow; 0] = [];
        assert!(any_active(none, instant, Tehran));
        assert!(!any_active([&morning], instant, Tehran));
        assert!(any_active([&morning, &evening], instant, Tehran));
    }

    #[test_case("* * 7 * * *", true; "every second of hour seven")]
    #[test_case("0 30 9 * * Mon,Wed,Fri", true; "named weekdays")]
    #[test_case("* * * * *", false; "five fields")]
    #[test_case("* * * * * *", false; "every instant")]
    #[test_case("61 * * * * *", false; "second out of range")]
    #[test_case("not a cron", false; "garbage")]
    #[test_case("0 0 9 * * 0", true; "sunday as zero")]
    #[test_case("0 0 9 * * 7", true; "sunday as seven")]
    #[test_case("0 0 9 * * 1-5", true; "numeric weekday range")]
    #[test_case("0 0 9 * * 5-7", true; "range ending on sunday")]
    #[test_case("0 0 9 * * 1/2", true; "stepped weekdays")]
    #[test_case("0 0 9 * * 8", false; "weekday out of range")]
    fn test_validate_cron(cron_exp: &str, valid: bool) {
        assert_eq!(validate_cron(cron_exp), valid);
    }

    fn utc(day: u32, hour: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 6, day, hour, min, 0).unwrap()
    }

    #[test]
    fn test_numeric_weekdays_start_on_monday() {
        // 2023-06-23 is a Friday.
        let weekdays = TimeWindow::new("0 0 9 * * 1-5", 3600);
        assert!(weekdays.is_active(utc(23, 9, 30), Tz::UTC));
        assert!(!weekdays.is_active(utc(24, 9, 30), Tz::UTC));
        assert!(!weekdays.is_active(utc(25, 9, 30), Tz::UTC));
        assert!(weekdays.is_active(utc(26, 9, 30), Tz::UTC));

        for sunday in ["0 0 9 * * 0", "0 0 9 * * 7"] {
            let window = TimeWindow::new(sunday, 3600);
            assert!(window.is_active(utc(25, 9, 30), Tz::UTC), "{sunday}");
            assert!(!window.is_active(utc(23, 9, 30), Tz::UTC), "{sunday}");
        }

        let weekend = TimeWindow::new("0 0 9 * * 6,0", 3600);
        assert!(weekend.is_active(utc(24, 9, 30), Tz::UTC));
        assert!(weekend.is_active(utc(25, 9, 30), Tz::UTC));
        assert!(!weekend.is_active(utc(26, 9, 30), Tz::UTC));
    }

    #[test]
    fn test_options_timezone_name() {
        let options = TimeOptions::new().in_timezone_named("Asia/Tehran").unwrap();
        assert_eq!(options.timezone, Some(Tehran));

        assert!(matches!(
            TimeOptions::new().in_timezone_named("Atlantis/Lost"),
            Err(AccessError::InvalidTimezone { .. })
        ));
    }
}
