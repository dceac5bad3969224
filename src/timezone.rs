//! Helpers for working with the server's configured local timezone.
//!
//! Calendar-month boundaries (budget alerts, monthly reports) are computed in
//! the local timezone so that "this month" matches the user's wall clock.

use time::{OffsetDateTime, Time, UtcOffset};
use time_tz::{Offset, TimeZone};

/// Look up the current UTC offset for a canonical timezone name, e.g.
/// "Pacific/Auckland". Returns `None` if the name is not a known timezone.
pub fn get_local_offset(canonical_timezone: &str) -> Option<UtcOffset> {
    time_tz::timezones::get_by_name(canonical_timezone)
        .map(|tz| tz.get_offset_utc(&OffsetDateTime::now_utc()).to_utc())
}

/// The start of the calendar month containing `datetime`, as seen from
/// `offset`.
pub fn start_of_month(datetime: OffsetDateTime, offset: UtcOffset) -> OffsetDateTime {
    let local = datetime.to_offset(offset);
    let first = local
        .date()
        .replace_day(1)
        .expect("day one is valid for every month");

    first.with_time(Time::MIDNIGHT).assume_offset(offset)
}

/// The start of the calendar month after the one containing `datetime`, as
/// seen from `offset`.
pub fn start_of_next_month(datetime: OffsetDateTime, offset: UtcOffset) -> OffsetDateTime {
    let local = datetime.to_offset(offset);
    let (year, month) = match local.month() {
        time::Month::December => (local.year() + 1, time::Month::January),
        month => (local.year(), month.next()),
    };
    let first = time::Date::from_calendar_date(year, month, 1)
        .expect("day one is valid for every month");

    first.with_time(Time::MIDNIGHT).assume_offset(offset)
}

#[cfg(test)]
mod tests {
    use time::{UtcOffset, macros::datetime};

    use super::{get_local_offset, start_of_month, start_of_next_month};

    #[test]
    fn known_timezone_resolves() {
        assert!(get_local_offset("Pacific/Auckland").is_some());
    }

    #[test]
    fn unknown_timezone_is_none() {
        assert_eq!(get_local_offset("Middle/Nowhere"), None);
    }

    #[test]
    fn start_of_month_is_first_midnight() {
        let now = datetime!(2025-03-14 09:26:53 UTC);

        assert_eq!(
            start_of_month(now, UtcOffset::UTC),
            datetime!(2025-03-01 00:00:00 UTC)
        );
    }

    #[test]
    fn start_of_month_respects_offset() {
        // 01:00 UTC on the 1st is still the previous month at UTC-02:00.
        let now = datetime!(2025-03-01 01:00:00 UTC);
        let offset = UtcOffset::from_hms(-2, 0, 0).unwrap();

        assert_eq!(
            start_of_month(now, offset),
            datetime!(2025-02-01 00:00:00 -2:00)
        );
    }

    #[test]
    fn next_month_rolls_over_december() {
        let now = datetime!(2024-12-25 12:00:00 UTC);

        assert_eq!(
            start_of_next_month(now, UtcOffset::UTC),
            datetime!(2025-01-01 00:00:00 UTC)
        );
    }
}
