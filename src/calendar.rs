//! Business-hours calendar — pure time arithmetic over recipient-local
//! wall clocks.

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use tracing::warn;

use crate::config::SendingRules;

/// Parse an IANA timezone name, falling back to Europe/Amsterdam.
pub fn parse_timezone(name: &str) -> Tz {
    name.parse().unwrap_or_else(|_| {
        warn!("Unknown timezone {name:?}, falling back to Europe/Amsterdam");
        Tz::Europe__Amsterdam
    })
}

/// Whether `instant` falls inside the recipient's business hours.
pub fn is_valid_instant(instant: DateTime<Utc>, tz: Tz, rules: &SendingRules) -> bool {
    let local = instant.with_timezone(&tz);
    if rules.excluded_weekdays.contains(&local.weekday()) {
        return false;
    }
    rules.allowed_hour_start <= local.hour() && local.hour() < rules.allowed_hour_end
}

/// The earliest valid instant at or after `instant` for the recipient's
/// timezone.
///
/// Idempotent: a valid instant maps to itself, and any adjusted result lands
/// exactly on a window-open boundary, which is itself valid.
pub fn next_valid_instant(instant: DateTime<Utc>, tz: Tz, rules: &SendingRules) -> DateTime<Utc> {
    let local = instant.with_timezone(&tz);

    let mut adjusted = if local.hour() < rules.allowed_hour_start {
        window_open(local.date_naive(), tz, rules)
    } else if local.hour() >= rules.allowed_hour_end {
        window_open(local.date_naive() + Days::new(1), tz, rules)
    } else {
        local
    };

    while rules.excluded_weekdays.contains(&adjusted.weekday()) {
        adjusted = window_open(adjusted.date_naive() + Days::new(1), tz, rules);
    }

    adjusted.with_timezone(&Utc)
}

/// The window-open wall time on `date` in `tz`.
///
/// A DST gap at exactly the opening hour is resolved by falling back to the
/// naive time read as UTC; the drift is within the accepted clock-edge
/// tolerance.
fn window_open(date: NaiveDate, tz: Tz, rules: &SendingRules) -> DateTime<Tz> {
    let open = NaiveTime::from_hms_opt(rules.allowed_hour_start.min(23), 0, 0)
        .unwrap_or_else(NaiveTime::default);
    let naive = date.and_time(open);
    tz.from_local_datetime(&naive)
        .earliest()
        .unwrap_or_else(|| tz.from_utc_datetime(&naive))
}
