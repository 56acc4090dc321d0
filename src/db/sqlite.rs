use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::db::models::{DrawRow, NumberPairRow, NumberStatisticRow, SyncStateRow};
use crate::db::repository::DrawRepository;
use crate::error::Result;
use crate::types::{DrawRecord, NumberPair, NumberStatistic, SyncState};

const DRAW_COLUMNS: &str =
    "draw_number, year, draw_date, n1, n2, n3, n4, n5, n6, bonus_number";

pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Open (creating if needed) the database file and apply pending migrations.
    pub async fn connect(db_path: &str) -> Result<Self> {
        let opts = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(opts)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("Database ready at {db_path}");
        Ok(Self { pool })
    }
}

#[async_trait]
impl DrawRepository for SqliteRepository {
    async fn get_latest_draw_number(&self) -> Result<Option<u32>> {
        let latest: Option<i64> = sqlx::query_scalar("SELECT MAX(draw_number) FROM draws")
            .fetch_one(&self.pool)
            .await?;
        Ok(latest.and_then(|n| u32::try_from(n).ok()))
    }

    async fn get_total_draw_count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM draws")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn upsert_records(&self, records: &[DrawRecord]) -> Result<Vec<u32>> {
        let created_at = Utc::now().timestamp_millis();
        let mut inserted = Vec::new();
        let mut tx = self.pool.begin().await?;

        for r in records {
            let m = r.main_numbers();
            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO draws (
                    draw_number, year, draw_date, n1, n2, n3, n4, n5, n6, bonus_number, created_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(i64::from(r.draw_number()))
            .bind(r.year())
            .bind(r.date())
            .bind(i64::from(m[0]))
            .bind(i64::from(m[1]))
            .bind(i64::from(m[2]))
            .bind(i64::from(m[3]))
            .bind(i64::from(m[4]))
            .bind(i64::from(m[5]))
            .bind(i64::from(r.bonus_number()))
            .bind(created_at)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 1 {
                inserted.push(r.draw_number());
            }
        }

        tx.commit().await?;
        debug!(
            offered = records.len(),
            inserted = inserted.len(),
            "Upserted draws: {} of {} new",
            inserted.len(),
            records.len(),
        );
        Ok(inserted)
    }

    async fn get_all_draws(&self) -> Result<Vec<DrawRecord>> {
        let rows: Vec<DrawRow> =
            sqlx::query_as(&format!("SELECT {DRAW_COLUMNS} FROM draws ORDER BY draw_number ASC"))
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(DrawRecord::try_from).collect()
    }

    async fn get_recent_draws(&self, limit: usize) -> Result<Vec<DrawRecord>> {
        let rows: Vec<DrawRow> = sqlx::query_as(&format!(
            "SELECT {DRAW_COLUMNS} FROM draws ORDER BY draw_number DESC LIMIT ?"
        ))
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(DrawRecord::try_from).collect()
    }

    async fn get_draw(&self, draw_number: u32) -> Result<Option<DrawRecord>> {
        let row: Option<DrawRow> =
            sqlx::query_as(&format!("SELECT {DRAW_COLUMNS} FROM draws WHERE draw_number = ?"))
                .bind(i64::from(draw_number))
                .fetch_optional(&self.pool)
                .await?;
        row.map(DrawRecord::try_from).transpose()
    }

    async fn get_all_number_statistics(&self) -> Result<Vec<NumberStatistic>> {
        let rows: Vec<NumberStatisticRow> = sqlx::query_as(
            r#"
            SELECT number, appearance_count, last_draw_number, last_appearance_gap,
                   popularity_score, neglect_score, trend_score,
                   is_odd, last_digit, avoidance_score, updated_at
            FROM number_statistics
            ORDER BY number ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(NumberStatistic::from).collect())
    }

    async fn get_all_number_pairs(&self) -> Result<Vec<NumberPair>> {
        let rows: Vec<NumberPairRow> = sqlx::query_as(
            r#"
            SELECT number_a, number_b, pair_count, last_draw_together, pair_score, updated_at
            FROM number_pairs
            ORDER BY number_a ASC, number_b ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(NumberPair::from).collect())
    }

    async fn replace_all_statistics(&self, stats: &[NumberStatistic]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM number_statistics").execute(&mut *tx).await?;

        for s in stats {
            sqlx::query(
                r#"
                INSERT INTO number_statistics (
                    number, appearance_count, last_draw_number, last_appearance_gap,
                    popularity_score, neglect_score, trend_score,
                    is_odd, last_digit, avoidance_score, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(i64::from(s.number))
            .bind(i64::from(s.appearance_count))
            .bind(i64::from(s.last_draw_number))
            .bind(i64::from(s.last_appearance_gap))
            .bind(s.popularity_score)
            .bind(s.neglect_score)
            .bind(s.trend_score)
            .bind(s.is_odd)
            .bind(i64::from(s.last_digit))
            .bind(s.avoidance_score)
            .bind(s.updated_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn replace_all_pairs(&self, pairs: &[NumberPair]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM number_pairs").execute(&mut *tx).await?;

        for p in pairs {
            sqlx::query(
                r#"
                INSERT INTO number_pairs (
                    number_a, number_b, pair_count, last_draw_together, pair_score, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(i64::from(p.number_a))
            .bind(i64::from(p.number_b))
            .bind(i64::from(p.pair_count))
            .bind(i64::from(p.last_draw_together))
            .bind(p.pair_score)
            .bind(p.updated_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn load_sync_state(&self) -> Result<SyncState> {
        let row: Option<SyncStateRow> = sqlx::query_as(
            "SELECT local_latest_draw_number, last_sync_timestamp FROM sync_state WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(SyncState::from).unwrap_or_default())
    }

    async fn save_sync_state(&self, state: &SyncState) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sync_state (id, local_latest_draw_number, last_sync_timestamp)
            VALUES (1, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                local_latest_draw_number = excluded.local_latest_draw_number,
                last_sync_timestamp = excluded.last_sync_timestamp
            "#,
        )
        .bind(state.local_latest_draw_number.map(i64::from))
        .bind(state.last_sync_timestamp.map(|t| t.timestamp_millis()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    async fn open(dir: &tempfile::TempDir) -> SqliteRepository {
        let path = dir.path().join("lotto.db");
        SqliteRepository::connect(path.to_str().unwrap()).await.unwrap()
    }

    fn draw(n: u32, mains: [u8; 6], bonus: u8) -> DrawRecord {
        DrawRecord::new(2002, n, "2002-12-07", mains, bonus).unwrap()
    }

    fn stat(number: u8, count: u32) -> NumberStatistic {
        NumberStatistic {
            number,
            appearance_count: count,
            last_draw_number: 2,
            last_appearance_gap: 0,
            popularity_score: 12.5,
            neglect_score: 0.0,
            trend_score: 50.0,
            is_odd: number % 2 == 1,
            last_digit: number % 10,
            avoidance_score: 50.0,
            updated_at: 1_700_000_000_000,
        }
    }

    #[tokio::test]
    async fn empty_database() {
        let dir = tempfile::tempdir().unwrap();
        let repo = open(&dir).await;
        assert_eq!(repo.get_latest_draw_number().await.unwrap(), None);
        assert_eq!(repo.get_total_draw_count().await.unwrap(), 0);
        assert_eq!(repo.load_sync_state().await.unwrap(), SyncState::default());
        assert!(repo.get_all_draws().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn upsert_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let repo = open(&dir).await;
        let records = vec![draw(1, [10, 23, 29, 33, 37, 40], 16), draw(2, [9, 13, 21, 25, 32, 42], 2)];

        assert_eq!(repo.upsert_records(&records).await.unwrap(), vec![1, 2]);
        assert_eq!(repo.upsert_records(&records).await.unwrap(), Vec::<u32>::new());
        assert_eq!(repo.get_total_draw_count().await.unwrap(), 2);
        assert_eq!(repo.get_latest_draw_number().await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn single_draw_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let repo = open(&dir).await;
        let record = draw(7, [2, 9, 16, 25, 26, 40], 42);
        repo.upsert_records(&[record.clone()]).await.unwrap();

        assert_eq!(repo.get_draw(7).await.unwrap(), Some(record));
        assert_eq!(repo.get_draw(8).await.unwrap(), None);
    }

    #[tokio::test]
    async fn existing_draw_is_never_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let repo = open(&dir).await;
        let original = draw(1, [10, 23, 29, 33, 37, 40], 16);
        repo.upsert_records(&[original.clone()]).await.unwrap();
        repo.upsert_records(&[draw(1, [1, 2, 3, 4, 5, 6], 7)]).await.unwrap();
        assert_eq!(repo.get_all_draws().await.unwrap(), vec![original]);
    }

    #[tokio::test]
    async fn draws_come_back_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let repo = open(&dir).await;
        let records: Vec<_> = [3, 1, 2].iter().map(|&n| draw(n, [1, 2, 3, 4, 5, 6], 7)).collect();
        repo.upsert_records(&records).await.unwrap();

        let all: Vec<u32> = repo.get_all_draws().await.unwrap().iter().map(|r| r.draw_number()).collect();
        assert_eq!(all, vec![1, 2, 3]);
        let recent: Vec<u32> =
            repo.get_recent_draws(2).await.unwrap().iter().map(|r| r.draw_number()).collect();
        assert_eq!(recent, vec![3, 2]);
    }

    #[tokio::test]
    async fn statistics_and_pairs_are_replaced_wholesale() {
        let dir = tempfile::tempdir().unwrap();
        let repo = open(&dir).await;

        repo.replace_all_statistics(&[stat(1, 5), stat(2, 3)]).await.unwrap();
        repo.replace_all_statistics(&[stat(2, 4)]).await.unwrap();
        assert_eq!(repo.get_all_number_statistics().await.unwrap(), vec![stat(2, 4)]);

        let pair = NumberPair {
            number_a: 1,
            number_b: 2,
            pair_count: 2,
            last_draw_together: 2,
            pair_score: 100.0,
            updated_at: 1_700_000_000_000,
        };
        repo.replace_all_pairs(&[pair.clone()]).await.unwrap();
        assert_eq!(repo.get_all_number_pairs().await.unwrap(), vec![pair]);
        repo.replace_all_pairs(&[]).await.unwrap();
        assert!(repo.get_all_number_pairs().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn sync_state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let state = SyncState {
            local_latest_draw_number: Some(1189),
            last_sync_timestamp: Some(Utc.with_ymd_and_hms(2025, 9, 13, 12, 0, 0).unwrap()),
        };
        open(&dir).await.save_sync_state(&state).await.unwrap();
        assert_eq!(open(&dir).await.load_sync_state().await.unwrap(), state);
    }
}
