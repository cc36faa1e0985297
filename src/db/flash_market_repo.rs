use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::FlashMarket;

/// Create a flash market row for a detected spike.
pub async fn insert_market(
    pool: &PgPool,
    item_id: Uuid,
    snapshot_weights: serde_json::Value,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    initial_velocity: f64,
) -> anyhow::Result<FlashMarket> {
    let row = sqlx::query_as::<_, FlashMarket>(
        r#"
        INSERT INTO flash_markets
            (item_id, snapshot_weights, start_time, end_time, initial_velocity, is_active, is_resolved)
        VALUES ($1, $2, $3, $4, $5, true, false)
        RETURNING *
        "#,
    )
    .bind(item_id)
    .bind(snapshot_weights)
    .bind(start_time)
    .bind(end_time)
    .bind(initial_velocity)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Markets past their window but not yet resolved. Resolution retries these
/// on every poll until enough history exists to settle them.
pub async fn get_expired_unresolved(pool: &PgPool) -> anyhow::Result<Vec<FlashMarket>> {
    let rows = sqlx::query_as::<_, FlashMarket>(
        r#"
        SELECT * FROM flash_markets
        WHERE is_active = true AND is_resolved = false AND end_time <= NOW()
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Markets currently open for positions.
pub async fn get_active(pool: &PgPool) -> anyhow::Result<Vec<FlashMarket>> {
    let rows = sqlx::query_as::<_, FlashMarket>(
        r#"
        SELECT * FROM flash_markets
        WHERE is_active = true AND is_resolved = false AND end_time > NOW()
        ORDER BY end_time ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Finalize a market. Terminal — no further mutation happens after this.
pub async fn mark_resolved(
    pool: &PgPool,
    market_id: Uuid,
    final_velocity: f64,
    winning_side: &str,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        UPDATE flash_markets
        SET is_active = false, is_resolved = true, final_velocity = $2, winning_side = $3
        WHERE id = $1
        "#,
    )
    .bind(market_id)
    .bind(final_velocity)
    .bind(winning_side)
    .execute(pool)
    .await?;

    Ok(())
}
