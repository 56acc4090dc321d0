use std::path::PathBuf;
use std::time::Duration;

use crate::error::{AppError, Result};

pub const DATASET_URL: &str =
    "https://raw.githubusercontent.com/stuKim0221/smart-lotto/refs/heads/main/draw_kor.csv";
pub const OFFICIAL_API_URL: &str = "https://www.dhlottery.co.kr/common.do";

/// Column header every valid dataset starts with. Doubles as the
/// signature the fetcher looks for before accepting a response body.
pub const DATASET_HEADER_SIGNATURE: &str = "year,drawNo,date";

/// First field of the header line. Any line starting with it is a header, not data.
pub const HEADER_FIRST_FIELD: &str = "year";

/// Bodies shorter than this are treated as truncated transfers or error pages.
pub const MIN_DATASET_BYTES: usize = 100;

/// year, drawNo, date, 6 main numbers, bonus.
pub const DATASET_FIELD_COUNT: usize = 10;

pub const MIN_NUMBER: u8 = 1;
pub const MAX_NUMBER: u8 = 45;
pub const MAIN_NUMBER_COUNT: usize = 6;

/// Number of most recent draws the trend score looks at.
pub const TREND_WINDOW: usize = 10;

/// Gap (in draws) at which the recency factor of popularity/pair scores halves.
pub const RECENCY_HALF_GAP: f64 = 10.0;

/// Default cadence of the built-in trigger loop (seconds).
pub const SYNC_INTERVAL_SECS: u64 = 3_600;

/// Default minimum time between two successful syncs (hours). 0 disables the gate.
pub const UPDATE_MIN_INTERVAL_HOURS: u64 = 24;

pub const USER_AGENT: &str = concat!("lotto-sync/", env!("CARGO_PKG_VERSION"));

/// Draw calendar epoch: round 1 was drawn on Saturday 2002-12-07 at 20:35 KST.
pub mod draw_calendar {
    pub const EPOCH_DRAW_NUMBER: u32 = 1;
    pub const EPOCH_DATE: (i32, u32, u32) = (2002, 12, 7);
    pub const DRAW_HOUR: u32 = 20;
    pub const DRAW_MINUTE: u32 = 35;
    /// KST is UTC+9 with no daylight saving.
    pub const UTC_OFFSET_SECS: i32 = 9 * 3_600;
}

#[derive(Debug, Clone)]
pub struct Config {
    pub dataset_url: String,
    pub official_api_url: String,
    pub log_level: String,
    pub db_path: String,
    pub api_port: u16,
    /// Local copy of the dataset (DATASET_CACHE_PATH)
    pub dataset_cache_path: PathBuf,
    /// Optional bundled dataset used when no cache exists yet (DATASET_SEED_PATH)
    pub dataset_seed_path: Option<PathBuf>,
    /// Trigger loop cadence (SYNC_INTERVAL_SECS)
    pub sync_interval: Duration,
    /// Minimum time since the last successful sync before a tick runs the pipeline
    /// (UPDATE_MIN_INTERVAL_HOURS, 0 = always)
    pub update_min_interval: Duration,
    pub fetch_connect_timeout: Duration,
    pub fetch_read_timeout: Duration,
    /// Upper bound on rounds the gap filler attempts per run (MAX_BACKFILL, unset = unbounded)
    pub max_backfill: Option<u32>,
}

/// Saturates instead of overflowing on absurd values.
fn hours(h: u64) -> Duration {
    Duration::from_secs(h.saturating_mul(3_600))
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            dataset_url: std::env::var("DATASET_URL").unwrap_or_else(|_| DATASET_URL.to_string()),
            official_api_url: std::env::var("OFFICIAL_API_URL")
                .unwrap_or_else(|_| OFFICIAL_API_URL.to_string()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "lotto.db".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            dataset_cache_path: std::env::var("DATASET_CACHE_PATH")
                .unwrap_or_else(|_| "draw_kor.csv".to_string())
                .into(),
            dataset_seed_path: std::env::var("DATASET_SEED_PATH")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            sync_interval: Duration::from_secs(
                std::env::var("SYNC_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse::<u64>().ok())
                    .filter(|&s| s > 0)
                    .unwrap_or(SYNC_INTERVAL_SECS),
            ),
            update_min_interval: hours(
                std::env::var("UPDATE_MIN_INTERVAL_HOURS")
                    .ok()
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(UPDATE_MIN_INTERVAL_HOURS),
            ),
            fetch_connect_timeout: Duration::from_secs(
                std::env::var("FETCH_CONNECT_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "15".to_string())
                    .parse::<u64>()
                    .unwrap_or(15),
            ),
            fetch_read_timeout: Duration::from_secs(
                std::env::var("FETCH_READ_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse::<u64>()
                    .unwrap_or(30),
            ),
            max_backfill: std::env::var("MAX_BACKFILL")
                .ok()
                .and_then(|s| s.parse::<u32>().ok()),
        })
    }

    /// Defaults with every path pointed into `dir`. Used by tests.
    #[cfg(test)]
    pub fn for_tests(dir: &std::path::Path) -> Self {
        Self {
            dataset_url: DATASET_URL.to_string(),
            official_api_url: OFFICIAL_API_URL.to_string(),
            log_level: "debug".to_string(),
            db_path: dir.join("lotto.db").to_string_lossy().into_owned(),
            api_port: 0,
            dataset_cache_path: dir.join("draw_kor.csv"),
            dataset_seed_path: None,
            sync_interval: Duration::from_secs(SYNC_INTERVAL_SECS),
            update_min_interval: Duration::ZERO,
            fetch_connect_timeout: Duration::from_secs(2),
            fetch_read_timeout: Duration::from_secs(2),
            max_backfill: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hour_conversion_saturates() {
        assert_eq!(hours(0), Duration::ZERO);
        assert_eq!(hours(24), Duration::from_secs(86_400));
        assert_eq!(hours(u64::MAX), Duration::from_secs(u64::MAX));
    }
}
