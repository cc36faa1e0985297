use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{item_repo, trend_repo};
use crate::errors::AppError;
use crate::models::TrendHistoryPoint;
use crate::AppState;

use super::ApiResponse;

/// Latest trend state of one item. Reads always return the last known good
/// result — when inference is down scores simply stop moving, they never
/// turn into errors here.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendStateResponse {
    pub item_id: Uuid,
    pub score: f64,
    pub velocity: f64,
    pub confidence: f64,
    pub reasoning: Option<String>,
    pub weights: Option<serde_json::Value>,
    pub last_update: Option<DateTime<Utc>>,
}

pub async fn latest(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
) -> Result<Json<ApiResponse<TrendStateResponse>>, AppError> {
    let item = item_repo::get_item(&state.db, item_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("item {item_id}")))?;

    Ok(Json(ApiResponse::ok(TrendStateResponse {
        item_id: item.id,
        score: item.trend_score,
        velocity: item.trend_velocity,
        confidence: item.trend_confidence,
        reasoning: item.trend_reasoning,
        weights: item.trend_weights,
        last_update: item.last_trend_update,
    })))
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    limit: Option<i64>,
}

pub async fn history(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<ApiResponse<Vec<TrendHistoryPoint>>>, AppError> {
    let limit = query.limit.unwrap_or(50).clamp(1, 500);
    let points = trend_repo::recent_history(&state.db, item_id, limit)
        .await
        .map_err(AppError::Internal)?;

    Ok(Json(ApiResponse::ok(points)))
}

/// Force an immediate re-score of one item, bypassing the result cache.
pub async fn force_update(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
) -> Result<Json<ApiResponse<ForcedUpdateResponse>>, AppError> {
    let result = state
        .orchestrator
        .force_update(item_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("item {item_id}")))?;

    Ok(Json(ApiResponse::ok(ForcedUpdateResponse {
        item_id,
        score: result.score,
        confidence: result.confidence,
        timestamp: result.timestamp,
    })))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForcedUpdateResponse {
    pub item_id: Uuid,
    pub score: f64,
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
}
