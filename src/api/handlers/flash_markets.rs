use axum::extract::State;
use axum::Json;

use crate::db::flash_market_repo;
use crate::models::FlashMarket;
use crate::AppState;

use super::ApiResponse;

/// Flash markets currently accepting positions.
pub async fn active(State(state): State<AppState>) -> Json<ApiResponse<Vec<FlashMarket>>> {
    match flash_market_repo::get_active(&state.db).await {
        Ok(markets) => Json(ApiResponse::ok(markets)),
        Err(e) => Json(ApiResponse::err(e.to_string())),
    }
}
