use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc, Weekday};
use chrono_tz::Tz;

pub const DEFAULT_DAY_BOUNDARY: &str = "03:01";

/// Maps wall-clock instants to virtual days. The calendar day only advances
/// once local time passes the configured boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayClock {
    timezone: Option<Tz>,
    boundary: NaiveTime,
}

impl Default for DayClock {
    fn default() -> Self {
        Self {
            timezone: None,
            boundary: default_boundary(),
        }
    }
}

impl DayClock {
    /// `timezone = None` uses the host's local time.
    pub fn new(timezone: Option<Tz>, boundary: NaiveTime) -> Self {
        Self { timezone, boundary }
    }

    pub fn virtual_day(&self, now: DateTime<Utc>) -> NaiveDate {
        let offset = Duration::hours(i64::from(self.boundary.hour()))
            + Duration::minutes(i64::from(self.boundary.minute()));
        (self.local(now) - offset).date()
    }

    /// Real (not virtual) local weekday.
    pub fn weekday(&self, now: DateTime<Utc>) -> Weekday {
        self.local(now).weekday()
    }

    fn local(&self, now: DateTime<Utc>) -> NaiveDateTime {
        match self.timezone {
            Some(timezone) => now.with_timezone(&timezone).naive_local(),
            None => now.with_timezone(&Local).naive_local(),
        }
    }
}

pub fn default_boundary() -> NaiveTime {
    NaiveTime::from_hms_opt(3, 1, 0).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn seoul_clock() -> DayClock {
        DayClock::new(Some(chrono_tz::Asia::Seoul), default_boundary())
    }

    fn date(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").expect("valid date")
    }

    #[test]
    fn activity_before_boundary_belongs_to_previous_day() {
        let clock = DayClock::new(Some(chrono_tz::Tz::UTC), default_boundary());
        let just_before = Utc.with_ymd_and_hms(2026, 2, 17, 3, 0, 59).unwrap();
        let at_boundary = Utc.with_ymd_and_hms(2026, 2, 17, 3, 1, 0).unwrap();
        let midnight = Utc.with_ymd_and_hms(2026, 2, 17, 0, 0, 0).unwrap();

        assert_eq!(clock.virtual_day(midnight), date("2026-02-16"));
        assert_eq!(clock.virtual_day(just_before), date("2026-02-16"));
        assert_eq!(clock.virtual_day(at_boundary), date("2026-02-17"));
    }

    #[test]
    fn virtual_day_uses_configured_timezone() {
        let clock = seoul_clock();
        // 18:30 UTC on the 16th is 03:30 on the 17th in Seoul.
        let instant = Utc.with_ymd_and_hms(2026, 2, 16, 18, 30, 0).unwrap();
        assert_eq!(clock.virtual_day(instant), date("2026-02-17"));
        // 17:30 UTC is 02:30 in Seoul, still the 16th.
        let earlier = Utc.with_ymd_and_hms(2026, 2, 16, 17, 30, 0).unwrap();
        assert_eq!(clock.virtual_day(earlier), date("2026-02-16"));
    }

    #[test]
    fn weekday_follows_real_local_calendar() {
        let clock = seoul_clock();
        // Monday 01:00 in Seoul: virtual day is still Sunday, weekday is Monday.
        let instant = Utc.with_ymd_and_hms(2026, 2, 15, 16, 0, 0).unwrap();
        assert_eq!(clock.virtual_day(instant), date("2026-02-15"));
        assert_eq!(clock.weekday(instant), Weekday::Mon);
    }

    #[test]
    fn custom_boundary_is_respected() {
        let boundary = NaiveTime::from_hms_opt(5, 0, 0).expect("valid time");
        let clock = DayClock::new(Some(chrono_tz::Tz::UTC), boundary);
        let instant = Utc.with_ymd_and_hms(2026, 2, 17, 4, 59, 0).unwrap();
        assert_eq!(clock.virtual_day(instant), date("2026-02-16"));
    }
}
