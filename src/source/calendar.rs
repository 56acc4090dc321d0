//! Deterministic draw calendar: one draw per week from a fixed epoch round.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, TimeZone, Utc};

use crate::config::draw_calendar::*;

fn draw_offset() -> FixedOffset {
    FixedOffset::east_opt(UTC_OFFSET_SECS).expect("valid draw calendar offset")
}

/// Instant the epoch round was drawn.
pub fn epoch() -> DateTime<Utc> {
    let (y, m, d) = EPOCH_DATE;
    draw_offset()
        .with_ymd_and_hms(y, m, d, DRAW_HOUR, DRAW_MINUTE, 0)
        .single()
        .expect("valid draw calendar epoch")
        .with_timezone(&Utc)
}

/// Instant round `draw_no` is (or was) drawn. None for rounds before the epoch.
pub fn draw_instant(draw_no: u32) -> Option<DateTime<Utc>> {
    let weeks = draw_no.checked_sub(EPOCH_DRAW_NUMBER)?;
    Some(epoch() + Duration::weeks(i64::from(weeks)))
}

/// Local calendar date of round `draw_no`.
pub fn draw_date(draw_no: u32) -> Option<NaiveDate> {
    draw_instant(draw_no).map(|t| t.with_timezone(&draw_offset()).date_naive())
}

/// Latest round whose draw time has passed at `now`. 0 before the epoch.
pub fn expected_latest_draw(now: DateTime<Utc>) -> u32 {
    let start = epoch();
    if now < start {
        return 0;
    }
    let weeks = (now - start).num_weeks();
    EPOCH_DRAW_NUMBER + u32::try_from(weeks).unwrap_or(u32::MAX - EPOCH_DRAW_NUMBER)
}

pub fn is_draw_published(draw_no: u32, now: DateTime<Utc>) -> bool {
    draw_instant(draw_no).is_some_and(|t| now >= t)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kst(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        draw_offset()
            .with_ymd_and_hms(y, m, d, h, min, 0)
            .single()
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn nothing_is_expected_before_the_epoch() {
        assert_eq!(expected_latest_draw(kst(2002, 12, 7, 20, 34)), 0);
        assert_eq!(expected_latest_draw(kst(2002, 12, 7, 20, 35)), 1);
    }

    #[test]
    fn round_advances_weekly_at_draw_time() {
        assert_eq!(expected_latest_draw(kst(2002, 12, 14, 20, 34)), 1);
        assert_eq!(expected_latest_draw(kst(2002, 12, 14, 20, 35)), 2);
    }

    #[test]
    fn matches_a_known_published_round() {
        assert_eq!(draw_date(1189), NaiveDate::from_ymd_opt(2025, 9, 13));
        assert_eq!(expected_latest_draw(kst(2025, 9, 13, 20, 0)), 1188);
        assert_eq!(expected_latest_draw(kst(2025, 9, 13, 21, 0)), 1189);
        assert_eq!(expected_latest_draw(kst(2025, 9, 19, 12, 0)), 1189);
    }

    #[test]
    fn publication_check() {
        let now = kst(2025, 9, 13, 21, 0);
        assert!(is_draw_published(1189, now));
        assert!(!is_draw_published(1190, now));
        assert!(!is_draw_published(0, now));
        assert_eq!(draw_date(0), None);
    }
}
