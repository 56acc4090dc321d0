use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::health::HealthSnapshot;
use crate::config::MAX_NUMBER;
use crate::context::AppContext;
use crate::error::AppError;
use crate::stats::ranking::{
    best_partner, consecutive_pairs, number_statistic, numbers_by_parity, numbers_by_zone, pairs_containing,
    rank_numbers, top_pairs, zone_range, Parity, ZONE_COUNT,
};
use crate::stats::{DistributionReport, NumberOrder};
use crate::sync::PipelineOutcome;
use crate::types::{is_valid_number, DrawRecord, NumberPair, NumberStatistic};

pub type ApiState = Arc<AppContext>;

const DEFAULT_LIMIT: usize = 10;
const MAX_PAIR_LIMIT: usize = 1_000;

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/stats/numbers", get(get_number_stats))
        .route("/stats/numbers/:number", get(get_number_detail))
        .route("/stats/pairs", get(get_pair_stats))
        .route("/stats/distribution", get(get_distribution))
        .route("/draws/latest", get(get_latest_draw))
        .route("/draws/:draw_number", get(get_draw))
        .route("/sync", post(post_sync))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Query param structs
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct NumbersQuery {
    #[serde(default)]
    pub order: NumberOrder,
    pub limit: Option<usize>,
    pub parity: Option<Parity>,
    /// 1..=5, nine numbers per zone.
    pub zone: Option<u8>,
}

#[derive(Deserialize)]
pub struct PairsQuery {
    pub limit: Option<usize>,
    /// Only pairs containing this number, best score first.
    pub number: Option<u8>,
    pub consecutive: Option<bool>,
}

#[derive(Deserialize)]
pub struct DistributionQuery {
    /// Most recent N draws; all draws when omitted.
    pub window: Option<usize>,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub draw_count: u64,
    pub statistics_count: usize,
    pub pair_count: usize,
    pub local_latest_draw: Option<u32>,
    pub last_sync_timestamp: Option<DateTime<Utc>>,
    pub pipeline: HealthSnapshot,
}

#[derive(Serialize)]
pub struct NumberDetailResponse {
    pub statistic: NumberStatistic,
    pub best_partner: Option<NumberPair>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_health(State(state): State<ApiState>) -> Result<Json<HealthResponse>, AppError> {
    let sync_state = state.repo.load_sync_state().await?;
    Ok(Json(HealthResponse {
        status: "ok",
        draw_count: state.repo.get_total_draw_count().await?,
        statistics_count: state.repo.get_all_number_statistics().await?.len(),
        pair_count: state.repo.get_all_number_pairs().await?.len(),
        local_latest_draw: sync_state.local_latest_draw_number,
        last_sync_timestamp: sync_state.last_sync_timestamp,
        pipeline: state.health.snapshot(),
    }))
}

async fn get_number_stats(
    State(state): State<ApiState>,
    Query(params): Query<NumbersQuery>,
) -> Result<Json<Vec<NumberStatistic>>, AppError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).min(usize::from(MAX_NUMBER));
    let mut stats = state.repo.get_all_number_statistics().await?;
    if let Some(parity) = params.parity {
        stats = numbers_by_parity(&stats, parity);
    }
    if let Some(zone) = params.zone {
        if zone_range(zone).is_none() {
            return Err(AppError::Invalid(format!("zone must be between 1 and {ZONE_COUNT}")));
        }
        stats = numbers_by_zone(&stats, zone);
    }
    Ok(Json(rank_numbers(&stats, params.order, limit)))
}

async fn get_number_detail(
    State(state): State<ApiState>,
    Path(number): Path<u8>,
) -> Result<Json<NumberDetailResponse>, AppError> {
    if !is_valid_number(number) {
        return Err(AppError::Invalid(format!("number {number} is outside 1..={MAX_NUMBER}")));
    }
    let stats = state.repo.get_all_number_statistics().await?;
    let statistic = number_statistic(&stats, number)
        .ok_or_else(|| AppError::NotFound(format!("no statistics for number {number} yet")))?;
    let pairs = state.repo.get_all_number_pairs().await?;
    Ok(Json(NumberDetailResponse { statistic, best_partner: best_partner(&pairs, number) }))
}

async fn get_pair_stats(
    State(state): State<ApiState>,
    Query(params): Query<PairsQuery>,
) -> Result<Json<Vec<NumberPair>>, AppError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_PAIR_LIMIT);
    let mut pairs = state.repo.get_all_number_pairs().await?;
    if let Some(consecutive) = params.consecutive {
        pairs = consecutive_pairs(&pairs, consecutive);
    }
    match params.number {
        Some(n) if !is_valid_number(n) => {
            Err(AppError::Invalid(format!("number {n} is outside 1..={MAX_NUMBER}")))
        }
        Some(n) => Ok(Json(pairs_containing(&pairs, n, limit))),
        None => Ok(Json(top_pairs(&pairs, limit))),
    }
}

async fn get_distribution(
    State(state): State<ApiState>,
    Query(params): Query<DistributionQuery>,
) -> Result<Json<DistributionReport>, AppError> {
    let draws = match params.window {
        Some(0) => return Err(AppError::Invalid("window must be at least 1".to_string())),
        Some(n) => state.repo.get_recent_draws(n).await?,
        None => state.repo.get_all_draws().await?,
    };
    Ok(Json(DistributionReport::from_draws(&draws)))
}

async fn get_latest_draw(State(state): State<ApiState>) -> Result<Json<DrawRecord>, AppError> {
    state
        .repo
        .get_recent_draws(1)
        .await?
        .into_iter()
        .next()
        .map(Json)
        .ok_or_else(|| AppError::NotFound("no draws stored yet".to_string()))
}

async fn get_draw(
    State(state): State<ApiState>,
    Path(draw_number): Path<u32>,
) -> Result<Json<DrawRecord>, AppError> {
    state
        .repo
        .get_draw(draw_number)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("draw {draw_number} is not stored")))
}

async fn post_sync(State(state): State<ApiState>) -> (StatusCode, Json<PipelineOutcome>) {
    let outcome = state.pipeline.trigger().await;
    let status = match outcome {
        PipelineOutcome::Completed(_) => StatusCode::OK,
        PipelineOutcome::Failed { .. } => StatusCode::BAD_GATEWAY,
        PipelineOutcome::Coalesced => StatusCode::CONFLICT,
    };
    (status, Json(outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::{DrawRepository, MemoryRepository};
    use crate::stats::StatisticsAggregator;

    struct TestServer {
        _dir: tempfile::TempDir,
        base: String,
    }

    async fn serve(draws: &[DrawRecord]) -> TestServer {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = Config::for_tests(dir.path());
        cfg.dataset_url = "http://127.0.0.1:9/draw_kor.csv".to_string();
        cfg.official_api_url = "http://127.0.0.1:9/common.do".to_string();

        let repo = Arc::new(MemoryRepository::new());
        repo.upsert_records(draws).await.unwrap();
        StatisticsAggregator::new(repo.clone()).recompute().await.unwrap();

        let ctx = AppContext::with_repository(cfg, repo).unwrap();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move { axum::serve(listener, router(ctx)).await });
        TestServer { _dir: dir, base }
    }

    fn history() -> Vec<DrawRecord> {
        vec![
            DrawRecord::new(2002, 1, "2002-12-07", [1, 2, 3, 4, 5, 6], 7).unwrap(),
            DrawRecord::new(2002, 2, "2002-12-14", [1, 2, 8, 9, 10, 11], 12).unwrap(),
        ]
    }

    async fn get_json(url: String) -> (u16, serde_json::Value) {
        let resp = reqwest::get(url).await.unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap_or(serde_json::Value::Null))
    }

    #[tokio::test]
    async fn health_reports_store_contents() {
        let srv = serve(&history()).await;
        let (status, body) = get_json(format!("{}/health", srv.base)).await;
        assert_eq!(status, 200);
        assert_eq!(body["draw_count"], 2);
        assert_eq!(body["statistics_count"], 45);
        assert_eq!(body["pipeline"]["last_status"], "never_run");
    }

    #[tokio::test]
    async fn number_rankings() {
        let srv = serve(&history()).await;
        let (status, body) = get_json(format!("{}/stats/numbers?order=hot&limit=2", srv.base)).await;
        assert_eq!(status, 200);
        let nums: Vec<u64> = body.as_array().unwrap().iter().map(|s| s["number"].as_u64().unwrap()).collect();
        assert_eq!(nums, vec![1, 2]);

        let (status, _) = get_json(format!("{}/stats/numbers?order=lucky", srv.base)).await;
        assert_eq!(status, 400);
    }

    #[tokio::test]
    async fn pairs_and_distribution() {
        let srv = serve(&history()).await;
        let (_, pairs) = get_json(format!("{}/stats/pairs?limit=1", srv.base)).await;
        assert_eq!(pairs[0]["number_a"], 1);
        assert_eq!(pairs[0]["number_b"], 2);
        assert_eq!(pairs[0]["pair_count"], 2);

        let (_, dist) = get_json(format!("{}/stats/distribution?window=1", srv.base)).await;
        assert_eq!(dist["draws"], 1);
        assert_eq!(dist["last_draw"], 2);

        let (status, _) = get_json(format!("{}/stats/distribution?window=0", srv.base)).await;
        assert_eq!(status, 400);
    }

    #[tokio::test]
    async fn latest_draw_or_404() {
        let srv = serve(&history()).await;
        let (status, body) = get_json(format!("{}/draws/latest", srv.base)).await;
        assert_eq!(status, 200);
        assert_eq!(body["draw_number"], 2);
        assert_eq!(body["main_numbers"], serde_json::json!([1, 2, 8, 9, 10, 11]));

        let empty = serve(&[]).await;
        let (status, _) = get_json(format!("{}/draws/latest", empty.base)).await;
        assert_eq!(status, 404);
    }

    fn numbers_of(body: &serde_json::Value) -> Vec<u64> {
        body.as_array().unwrap().iter().map(|s| s["number"].as_u64().unwrap()).collect()
    }

    #[tokio::test]
    async fn number_filters_by_parity_and_zone() {
        let srv = serve(&history()).await;
        let (_, even) = get_json(format!("{}/stats/numbers?parity=even&limit=3", srv.base)).await;
        assert_eq!(numbers_of(&even), vec![2, 4, 6]);

        let (_, zone) = get_json(format!("{}/stats/numbers?zone=2&limit=2", srv.base)).await;
        assert_eq!(numbers_of(&zone), vec![10, 11]);

        let (status, _) = get_json(format!("{}/stats/numbers?zone=6", srv.base)).await;
        assert_eq!(status, 400);
    }

    #[tokio::test]
    async fn number_detail_includes_best_partner() {
        let srv = serve(&history()).await;
        let (status, body) = get_json(format!("{}/stats/numbers/1", srv.base)).await;
        assert_eq!(status, 200);
        assert_eq!(body["statistic"]["appearance_count"], 2);
        assert_eq!(body["best_partner"]["number_a"], 1);
        assert_eq!(body["best_partner"]["number_b"], 2);

        let (status, _) = get_json(format!("{}/stats/numbers/46", srv.base)).await;
        assert_eq!(status, 400);
    }

    #[tokio::test]
    async fn pair_filters() {
        let srv = serve(&history()).await;
        let (_, with_three) = get_json(format!("{}/stats/pairs?number=3&limit=2", srv.base)).await;
        let keys: Vec<(u64, u64)> = with_three
            .as_array()
            .unwrap()
            .iter()
            .map(|p| (p["number_a"].as_u64().unwrap(), p["number_b"].as_u64().unwrap()))
            .collect();
        assert_eq!(keys, vec![(1, 3), (2, 3)]);

        let (_, adjacent) = get_json(format!("{}/stats/pairs?consecutive=true&limit=3", srv.base)).await;
        let keys: Vec<(u64, u64)> = adjacent
            .as_array()
            .unwrap()
            .iter()
            .map(|p| (p["number_a"].as_u64().unwrap(), p["number_b"].as_u64().unwrap()))
            .collect();
        assert_eq!(keys, vec![(1, 2), (2, 3), (3, 4)]);

        let (status, _) = get_json(format!("{}/stats/pairs?number=0", srv.base)).await;
        assert_eq!(status, 400);
    }

    #[tokio::test]
    async fn draw_by_number() {
        let srv = serve(&history()).await;
        let (status, body) = get_json(format!("{}/draws/1", srv.base)).await;
        assert_eq!(status, 200);
        assert_eq!(body["bonus_number"], 7);

        let (status, _) = get_json(format!("{}/draws/99", srv.base)).await;
        assert_eq!(status, 404);
    }

    #[tokio::test]
    async fn sync_failure_is_reported() {
        let srv = serve(&[]).await;
        let resp = reqwest::Client::new().post(format!("{}/sync", srv.base)).send().await.unwrap();
        assert_eq!(resp.status().as_u16(), 502);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["outcome"], "failed");
    }
}
