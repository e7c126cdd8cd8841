//! Clock & timezone service
//!
//! All internal time math is done on absolute UTC instants; wall-clock values
//! are converted at the boundary with the job's IANA zone. DST rules: an
//! ambiguous local time (fall-back) resolves to the earlier offset, a
//! non-existent local time (spring-forward) advances to the first valid
//! instant.

use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

use super::{SchedulerError, SchedulerResult};

/// Current instant.
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Resolve an IANA zone name.
pub fn resolve_zone(name: &str) -> SchedulerResult<Tz> {
    name.parse::<Tz>()
        .map_err(|_| SchedulerError::ZoneUnknown(name.to_string()))
}

/// Convert a wall-clock time in `tz` to an absolute instant.
pub fn to_instant(wall: NaiveDateTime, tz: Tz) -> DateTime<Utc> {
    match tz.from_local_datetime(&wall) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        LocalResult::None => {
            // Inside a DST gap; step forward to the first representable
            // local minute (gaps are whole minutes in the tz database).
            let mut probe = wall + Duration::minutes(1);
            let limit = wall + Duration::hours(26);
            while probe < limit {
                match tz.from_local_datetime(&probe) {
                    LocalResult::Single(dt) => return dt.with_timezone(&Utc),
                    LocalResult::Ambiguous(earliest, _) => return earliest.with_timezone(&Utc),
                    LocalResult::None => probe += Duration::minutes(1),
                }
            }
            // Zone data never produces gaps this wide; fall back to treating
            // the wall time as UTC rather than panicking.
            Utc.from_utc_datetime(&wall)
        }
    }
}

/// Convert an absolute instant to wall-clock in `tz`.
pub fn to_wall(instant: DateTime<Utc>, tz: Tz) -> NaiveDateTime {
    instant.with_timezone(&tz).naive_local()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn wall(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn test_resolve_known_zones() {
        assert!(resolve_zone("UTC").is_ok());
        assert!(resolve_zone("Asia/Kolkata").is_ok());
        assert!(resolve_zone("America/New_York").is_ok());
        assert!(resolve_zone("Mars/Olympus").is_err());
        assert!(resolve_zone("").is_err());
    }

    #[test]
    fn test_round_trip_unambiguous_wall_time() {
        let tz = resolve_zone("Asia/Kolkata").unwrap();
        let w = wall(2030, 1, 1, 12, 0, 0);
        assert_eq!(to_wall(to_instant(w, tz), tz), w);

        let tz = resolve_zone("America/New_York").unwrap();
        let w = wall(2030, 6, 15, 9, 30, 0);
        assert_eq!(to_wall(to_instant(w, tz), tz), w);
    }

    #[test]
    fn test_kolkata_offset() {
        // IST is UTC+05:30 year-round
        let tz = resolve_zone("Asia/Kolkata").unwrap();
        let instant = to_instant(wall(2030, 1, 1, 12, 0, 0), tz);
        assert_eq!(instant, Utc.with_ymd_and_hms(2030, 1, 1, 6, 30, 0).unwrap());
    }

    #[test]
    fn test_spring_forward_gap_advances() {
        // US DST starts 2030-03-10; 02:30 local does not exist and must land
        // on 03:00 EDT = 07:00 UTC.
        let tz = resolve_zone("America/New_York").unwrap();
        let instant = to_instant(wall(2030, 3, 10, 2, 30, 0), tz);
        assert_eq!(instant, Utc.with_ymd_and_hms(2030, 3, 10, 7, 0, 0).unwrap());
    }

    #[test]
    fn test_fall_back_prefers_earlier_offset() {
        // US DST ends 2030-11-03; 01:30 local occurs twice, the earlier pass
        // is still EDT (UTC-4) so the instant is 05:30 UTC.
        let tz = resolve_zone("America/New_York").unwrap();
        let instant = to_instant(wall(2030, 11, 3, 1, 30, 0), tz);
        assert_eq!(instant, Utc.with_ymd_and_hms(2030, 11, 3, 5, 30, 0).unwrap());
    }

    #[test]
    fn test_to_wall_is_zone_local() {
        let tz = resolve_zone("Asia/Kolkata").unwrap();
        let instant = Utc.with_ymd_and_hms(2030, 1, 1, 6, 30, 0).unwrap();
        assert_eq!(to_wall(instant, tz), wall(2030, 1, 1, 12, 0, 0));
    }
}
