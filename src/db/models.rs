//! Row types for the tables in `migrations/`. SQLite hands every integer
//! back as i64; conversion into domain types happens here.

use chrono::DateTime;

use crate::error::{AppError, Result};
use crate::types::{DrawRecord, NumberPair, NumberStatistic, SyncState};

#[derive(Debug, sqlx::FromRow)]
pub struct DrawRow {
    pub draw_number: i64,
    pub year: i64,
    pub draw_date: String,
    pub n1: i64,
    pub n2: i64,
    pub n3: i64,
    pub n4: i64,
    pub n5: i64,
    pub n6: i64,
    pub bonus_number: i64,
}

impl TryFrom<DrawRow> for DrawRecord {
    type Error = AppError;

    fn try_from(r: DrawRow) -> Result<Self> {
        let num = |v: i64| u8::try_from(v).unwrap_or(0);
        let draw_number = u32::try_from(r.draw_number).unwrap_or(0);
        let year = i32::try_from(r.year).unwrap_or(0);
        DrawRecord::new(
            year,
            draw_number,
            r.draw_date,
            [num(r.n1), num(r.n2), num(r.n3), num(r.n4), num(r.n5), num(r.n6)],
            num(r.bonus_number),
        )
        .map_err(|reason| AppError::Invalid(format!("stored draw {}: {reason}", r.draw_number)))
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct NumberStatisticRow {
    pub number: i64,
    pub appearance_count: i64,
    pub last_draw_number: i64,
    pub last_appearance_gap: i64,
    pub popularity_score: f64,
    pub neglect_score: f64,
    pub trend_score: f64,
    pub is_odd: bool,
    pub last_digit: i64,
    pub avoidance_score: f64,
    pub updated_at: i64,
}

impl From<NumberStatisticRow> for NumberStatistic {
    fn from(r: NumberStatisticRow) -> Self {
        Self {
            number: r.number as u8,
            appearance_count: r.appearance_count as u32,
            last_draw_number: r.last_draw_number as u32,
            last_appearance_gap: r.last_appearance_gap as u32,
            popularity_score: r.popularity_score,
            neglect_score: r.neglect_score,
            trend_score: r.trend_score,
            is_odd: r.is_odd,
            last_digit: r.last_digit as u8,
            avoidance_score: r.avoidance_score,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct NumberPairRow {
    pub number_a: i64,
    pub number_b: i64,
    pub pair_count: i64,
    pub last_draw_together: i64,
    pub pair_score: f64,
    pub updated_at: i64,
}

impl From<NumberPairRow> for NumberPair {
    fn from(r: NumberPairRow) -> Self {
        Self {
            number_a: r.number_a as u8,
            number_b: r.number_b as u8,
            pair_count: r.pair_count as u32,
            last_draw_together: r.last_draw_together as u32,
            pair_score: r.pair_score,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct SyncStateRow {
    pub local_latest_draw_number: Option<i64>,
    /// Unix milliseconds.
    pub last_sync_timestamp: Option<i64>,
}

impl From<SyncStateRow> for SyncState {
    fn from(r: SyncStateRow) -> Self {
        Self {
            local_latest_draw_number: r.local_latest_draw_number.and_then(|n| u32::try_from(n).ok()),
            last_sync_timestamp: r.last_sync_timestamp.and_then(DateTime::from_timestamp_millis),
        }
    }
}
