use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{TrendHistoryPoint, TrendResult};

/// Overwrite the item's latest trend state. The previous state is superseded,
/// not deleted — it lives on in trend_history.
pub async fn update_latest(
    pool: &PgPool,
    item_id: Uuid,
    result: &TrendResult,
    velocity_per_minute: f64,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        UPDATE items SET
            trend_score = $2,
            trend_velocity = $3,
            sentiment_score = $4,
            social_activity = $5,
            holder_momentum = $6,
            cross_market_corr = $7,
            trend_confidence = $8,
            trend_reasoning = $9,
            trend_weights = $10,
            last_trend_update = $11
        WHERE id = $1
        "#,
    )
    .bind(item_id)
    .bind(result.score)
    .bind(velocity_per_minute)
    .bind(result.factors.sentiment)
    .bind(result.factors.social_activity)
    .bind(result.factors.holder_momentum)
    .bind(result.factors.cross_market_corr)
    .bind(result.confidence)
    .bind(&result.reasoning)
    .bind(serde_json::to_value(result.weights)?)
    .bind(result.timestamp)
    .execute(pool)
    .await?;

    Ok(())
}

/// Append one scoring-cycle result to the immutable history log.
pub async fn append_history(
    pool: &PgPool,
    item_id: Uuid,
    result: &TrendResult,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO trend_history (item_id, score, factors, weights, timestamp)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(item_id)
    .bind(result.score)
    .bind(serde_json::to_value(result.factors)?)
    .bind(serde_json::to_value(result.weights)?)
    .bind(result.timestamp)
    .execute(pool)
    .await?;

    Ok(())
}

/// Most recent history points for an item, newest first.
pub async fn recent_history(
    pool: &PgPool,
    item_id: Uuid,
    limit: i64,
) -> anyhow::Result<Vec<TrendHistoryPoint>> {
    let rows = sqlx::query_as::<_, TrendHistoryPoint>(
        r#"
        SELECT * FROM trend_history
        WHERE item_id = $1
        ORDER BY timestamp DESC
        LIMIT $2
        "#,
    )
    .bind(item_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
