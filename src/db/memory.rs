use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::db::repository::DrawRepository;
use crate::error::Result;
use crate::types::{DrawRecord, NumberPair, NumberStatistic, SyncState};

/// Process-local repository. Used by tests and by `DB_PATH=:memory:` dry runs.
///
/// Statistics and pairs are whole tables swapped under a lock, so readers see
/// either the previous table or the new one, never a mix.
#[derive(Default)]
pub struct MemoryRepository {
    draws: DashMap<u32, DrawRecord>,
    /// Ascending by number.
    stats: RwLock<Vec<NumberStatistic>>,
    /// Ascending by (number_a, number_b).
    pairs: RwLock<Vec<NumberPair>>,
    sync_state: RwLock<SyncState>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn sorted_draws(&self) -> Vec<DrawRecord> {
        let mut all: Vec<DrawRecord> = self.draws.iter().map(|e| e.value().clone()).collect();
        all.sort_unstable_by_key(DrawRecord::draw_number);
        all
    }
}

// Every writer stores a complete value, so a poisoned lock still holds valid data.
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl DrawRepository for MemoryRepository {
    async fn get_latest_draw_number(&self) -> Result<Option<u32>> {
        Ok(self.draws.iter().map(|e| *e.key()).max())
    }

    async fn get_total_draw_count(&self) -> Result<u64> {
        Ok(self.draws.len() as u64)
    }

    async fn upsert_records(&self, records: &[DrawRecord]) -> Result<Vec<u32>> {
        let mut inserted = Vec::new();
        for r in records {
            if let dashmap::mapref::entry::Entry::Vacant(slot) = self.draws.entry(r.draw_number()) {
                slot.insert(r.clone());
                inserted.push(r.draw_number());
            }
        }
        Ok(inserted)
    }

    async fn get_all_draws(&self) -> Result<Vec<DrawRecord>> {
        Ok(self.sorted_draws())
    }

    async fn get_recent_draws(&self, limit: usize) -> Result<Vec<DrawRecord>> {
        let mut all = self.sorted_draws();
        all.reverse();
        all.truncate(limit);
        Ok(all)
    }

    async fn get_draw(&self, draw_number: u32) -> Result<Option<DrawRecord>> {
        Ok(self.draws.get(&draw_number).map(|e| e.value().clone()))
    }

    async fn get_all_number_statistics(&self) -> Result<Vec<NumberStatistic>> {
        Ok(read(&self.stats).clone())
    }

    async fn get_all_number_pairs(&self) -> Result<Vec<NumberPair>> {
        Ok(read(&self.pairs).clone())
    }

    async fn replace_all_statistics(&self, stats: &[NumberStatistic]) -> Result<()> {
        let mut table = stats.to_vec();
        table.sort_unstable_by_key(|s| s.number);
        *write(&self.stats) = table;
        Ok(())
    }

    async fn replace_all_pairs(&self, pairs: &[NumberPair]) -> Result<()> {
        let mut table = pairs.to_vec();
        table.sort_unstable_by_key(|p| (p.number_a, p.number_b));
        *write(&self.pairs) = table;
        Ok(())
    }

    async fn load_sync_state(&self) -> Result<SyncState> {
        Ok(read(&self.sync_state).clone())
    }

    async fn save_sync_state(&self, state: &SyncState) -> Result<()> {
        *write(&self.sync_state) = state.clone();
        Ok(())
    }
}
