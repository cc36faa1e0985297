use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::item_repo;
use crate::errors::AppError;
use crate::models::CurveType;
use crate::pricing;
use crate::AppState;

use super::ApiResponse;

#[derive(Deserialize)]
pub struct QuoteQuery {
    amount: u64,
    /// "buy" (default) or "sell".
    side: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResponse {
    pub item_id: Uuid,
    pub side: String,
    pub amount: u64,
    /// Cost to buy or refund for selling, in base units.
    pub total: u64,
    pub average_price: u64,
    pub spot_price: u64,
    pub curve_type: CurveType,
    pub circulating_supply: u64,
    /// Base units locked in the curve at the current supply.
    pub market_value: u64,
}

/// Price a prospective buy or sell against the item's live market account.
pub async fn quote(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
    Query(query): Query<QuoteQuery>,
) -> Result<Json<ApiResponse<QuoteResponse>>, AppError> {
    let item = item_repo::get_item(&state.db, item_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("item {item_id}")))?;

    let account_address = item
        .ledger_account
        .ok_or_else(|| AppError::BadRequest("item has no ledger market".into()))?;

    let account = state
        .ledger
        .get_market_account(&account_address)
        .await
        .map_err(|e| AppError::Unavailable(e.to_string()))?;

    let side = query.side.as_deref().unwrap_or("buy").to_lowercase();
    let total = match side.as_str() {
        "buy" => pricing::buy_cost(
            account.circulating_supply,
            query.amount,
            account.curve_type,
            account.base_price,
        )?,
        "sell" => pricing::sell_refund(
            account.circulating_supply,
            query.amount,
            account.curve_type,
            account.base_price,
        )?,
        other => {
            return Err(AppError::BadRequest(format!(
                "side must be \"buy\" or \"sell\", got \"{other}\""
            )))
        }
    };

    Ok(Json(ApiResponse::ok(QuoteResponse {
        item_id,
        side,
        amount: query.amount,
        total,
        average_price: total / query.amount,
        spot_price: pricing::price_at_supply(
            account.circulating_supply,
            account.curve_type,
            account.base_price,
        ),
        curve_type: account.curve_type,
        circulating_supply: account.circulating_supply,
        market_value: pricing::total_value(
            account.circulating_supply,
            account.curve_type,
            account.base_price,
        ),
    })))
}
