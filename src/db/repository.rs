use async_trait::async_trait;

use crate::error::Result;
use crate::types::{DrawRecord, NumberPair, NumberStatistic, SyncState};

/// Persistent store for draws, derived statistics and sync bookkeeping.
///
/// Draws are keyed on `draw_number` and never updated once stored. Statistics
/// and pairs are replaced wholesale; a failed replace leaves the previous rows.
#[async_trait]
pub trait DrawRepository: Send + Sync {
    async fn get_latest_draw_number(&self) -> Result<Option<u32>>;

    async fn get_total_draw_count(&self) -> Result<u64>;

    /// Insert records whose draw number is not stored yet. Existing keys are
    /// left untouched. Returns the draw numbers actually inserted.
    async fn upsert_records(&self, records: &[DrawRecord]) -> Result<Vec<u32>>;

    /// Every stored draw, ascending by draw number.
    async fn get_all_draws(&self) -> Result<Vec<DrawRecord>>;

    /// The `limit` most recent draws, newest first.
    async fn get_recent_draws(&self, limit: usize) -> Result<Vec<DrawRecord>>;

    async fn get_draw(&self, draw_number: u32) -> Result<Option<DrawRecord>>;

    /// Ascending by number.
    async fn get_all_number_statistics(&self) -> Result<Vec<NumberStatistic>>;

    /// Ascending by `(number_a, number_b)`.
    async fn get_all_number_pairs(&self) -> Result<Vec<NumberPair>>;

    async fn replace_all_statistics(&self, stats: &[NumberStatistic]) -> Result<()>;

    async fn replace_all_pairs(&self, pairs: &[NumberPair]) -> Result<()>;

    /// Default (all `None`) when never saved.
    async fn load_sync_state(&self) -> Result<SyncState>;

    async fn save_sync_state(&self, state: &SyncState) -> Result<()>;
}
