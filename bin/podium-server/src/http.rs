//! HTTP boundary for the leaderboard
//!
//! Handlers validate and clamp request parameters, call the leaderboard
//! and map its error kinds onto status codes.

use crate::metrics::{api_metrics, metrics_layer};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router, middleware};
use chrono::{DateTime, Utc};
use podium_cache::CacheStats;
use podium_common::{Error, PlayerId, RankEntry, ScoreHistoryEntry};
use podium_leaderboard::{DegradedStep, Leaderboard};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::error;

pub const MAX_TOP_N: i64 = 1000;
pub const MAX_RANGE: i64 = 100;
pub const DEFAULT_HISTORY_LIMIT: usize = 50;
pub const MAX_HISTORY_LIMIT: usize = 1000;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub board: Arc<Leaderboard>,
}

/// Build the API router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/game/rank/upscores", post(update_score))
        .route(
            "/game/rank/user/{player_id}",
            get(get_player_rank).delete(delete_player),
        )
        .route("/game/rank/top/{n}", get(get_top_n))
        .route("/game/rank/range/{player_id}/{range}", get(get_rank_range))
        .route("/game/rank/history/{player_id}", get(get_history))
        .route("/game/rank/health", get(health))
        .route("/game/rank/rebuild", post(rebuild))
        .route("/game/rank/cache_stats", get(cache_stats))
        .route("/metrics", get(metrics_handler))
        .route_layer(middleware::from_fn(metrics_layer))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---- Errors ----

/// JSON error response
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub error: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(error: &'static str, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error,
            message: message.into(),
        }
    }

    fn from_leaderboard(context: &'static str, e: &Error) -> Self {
        let status =
            StatusCode::from_u16(e.http_status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let error = match e {
            Error::NotFound(_) => "Player not found",
            Error::InvalidInput(_) | Error::InvalidPlayerId(_) => "Invalid request",
            _ => context,
        };
        if status.is_server_error() {
            error!(error = %e, "{context}");
        }
        Self {
            status,
            error,
            message: e.to_string(),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: &'a str,
    code: u16,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.error,
            message: &self.message,
            code: self.status.as_u16(),
        };
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

fn parse_player_id(raw: String) -> ApiResult<PlayerId> {
    PlayerId::new(raw).map_err(|e| ApiError::bad_request("Invalid player id", e.to_string()))
}

/// Parse a positive count and clamp it to `max`
fn parse_count(raw: &str, max: i64, what: &'static str) -> ApiResult<usize> {
    match raw.parse::<i64>() {
        Ok(n) if n > 0 => Ok(usize::try_from(n.min(max)).unwrap_or(1)),
        _ => Err(ApiError::bad_request(
            what,
            format!("{raw:?} is not a positive integer"),
        )),
    }
}

// ---- Bodies ----

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequest {
    pub player_id: String,
    pub incr_score: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub reason: String,
}

#[derive(Serialize)]
pub struct SuccessResponse<T: Serialize> {
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    pub timestamp: DateTime<Utc>,
}

impl<T: Serialize> SuccessResponse<T> {
    fn new(message: &'static str, data: Option<T>) -> Json<Self> {
        Json(Self {
            message,
            data,
            timestamp: Utc::now(),
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreUpdated {
    pub player_id: PlayerId,
    pub score_change: i64,
    pub total_score: i64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub degraded: Vec<DegradedStep>,
}

#[derive(Serialize)]
pub struct TopNResponse {
    pub count: usize,
    pub rankings: Vec<RankEntry>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankRangeResponse {
    pub player_id: PlayerId,
    pub range: usize,
    pub rankings: Vec<RankEntry>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub player_id: PlayerId,
    pub count: usize,
    pub history: Vec<ScoreHistoryEntry>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub services: BTreeMap<&'static str, &'static str>,
}

#[derive(Serialize)]
pub struct CacheStatsResponse {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<CacheStats>,
}

// ---- Handlers ----

async fn update_score(
    State(state): State<AppState>,
    body: Result<Json<UpdateRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = body.map_err(|e| ApiError::bad_request("Invalid request body", e.body_text()))?;
    let id = parse_player_id(req.player_id)?;
    if req.incr_score == 0 {
        return Err(ApiError::bad_request(
            "Invalid score",
            "score increment cannot be zero",
        ));
    }

    let outcome = state
        .board
        .update_score(&id, req.incr_score, &req.name, &req.reason)
        .await
        .map_err(|e| ApiError::from_leaderboard("Failed to update score", &e))?;

    api_metrics().record_score_update(outcome.is_degraded());

    Ok(SuccessResponse::new(
        "Score updated successfully",
        Some(ScoreUpdated {
            player_id: id,
            score_change: outcome.delta,
            total_score: outcome.player.total_score,
            degraded: outcome.degraded,
        }),
    ))
}

async fn get_player_rank(
    State(state): State<AppState>,
    Path(player_id): Path<String>,
) -> ApiResult<Json<RankEntry>> {
    let id = parse_player_id(player_id)?;
    let entry = state
        .board
        .get_player_rank(&id)
        .await
        .map_err(|e| ApiError::from_leaderboard("Failed to get player rank", &e))?;
    Ok(Json(entry))
}

async fn delete_player(
    State(state): State<AppState>,
    Path(player_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_player_id(player_id)?;
    let existed = state
        .board
        .delete_player(&id)
        .await
        .map_err(|e| ApiError::from_leaderboard("Failed to delete player", &e))?;
    if !existed {
        return Err(ApiError::from_leaderboard(
            "Failed to delete player",
            &Error::NotFound(id.into_inner()),
        ));
    }
    Ok(SuccessResponse::<()>::new("Player deleted successfully", None))
}

async fn get_top_n(
    State(state): State<AppState>,
    Path(n): Path<String>,
) -> ApiResult<Json<TopNResponse>> {
    let n = parse_count(&n, MAX_TOP_N, "Invalid N parameter")?;
    let rankings = state
        .board
        .get_top_n(n)
        .await
        .map_err(|e| ApiError::from_leaderboard("Failed to get top players", &e))?;
    Ok(Json(TopNResponse {
        count: rankings.len(),
        rankings,
    }))
}

async fn get_rank_range(
    State(state): State<AppState>,
    Path((player_id, range)): Path<(String, String)>,
) -> ApiResult<Json<RankRangeResponse>> {
    let id = parse_player_id(player_id)?;
    let range = parse_count(&range, MAX_RANGE, "Invalid range parameter")?;
    let rankings = state
        .board
        .get_player_rank_range(&id, range)
        .await
        .map_err(|e| ApiError::from_leaderboard("Failed to get player rank range", &e))?;
    Ok(Json(RankRangeResponse {
        player_id: id,
        range,
        rankings,
    }))
}

async fn get_history(
    State(state): State<AppState>,
    Path(player_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<HistoryResponse>> {
    let id = parse_player_id(player_id)?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);
    let history = state
        .board
        .get_player_history(&id, limit)
        .await
        .map_err(|e| ApiError::from_leaderboard("Failed to get player history", &e))?;
    Ok(Json(HistoryResponse {
        player_id: id,
        count: history.len(),
        history,
    }))
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let durable = state.board.check_durable_health().await.is_ok();
    let ranking = state.board.check_ranking_health().await.is_ok();

    let label = |ok: bool| if ok { "healthy" } else { "unhealthy" };
    let services = BTreeMap::from([
        ("durable_store", label(durable)),
        ("ranking_store", label(ranking)),
    ]);

    Json(HealthResponse {
        status: if durable && ranking {
            "healthy"
        } else {
            "degraded"
        },
        timestamp: Utc::now(),
        services,
    })
}

async fn rebuild(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let report = state
        .board
        .rebuild_leaderboard()
        .await
        .map_err(|e| ApiError::from_leaderboard("Failed to rebuild leaderboard", &e))?;
    Ok(SuccessResponse::new(
        "Leaderboard rebuilt successfully",
        Some(report),
    ))
}

async fn cache_stats(State(state): State<AppState>) -> Json<CacheStatsResponse> {
    let stats = state.board.get_cache_stats();
    Json(CacheStatsResponse {
        enabled: stats.is_some(),
        stats,
    })
}

async fn metrics_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        api_metrics().export_prometheus(),
    )
}
