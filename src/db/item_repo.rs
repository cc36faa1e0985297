use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Item, VolumeMinute};

/// Get a single item by id.
pub async fn get_item(pool: &PgPool, item_id: Uuid) -> anyhow::Result<Option<Item>> {
    let row = sqlx::query_as::<_, Item>("SELECT * FROM items WHERE id = $1")
        .bind(item_id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

/// Items due for a trend update: traded within the threshold window, carrying
/// meaningful 24h volume, stale, or never scored at all. Ordered by volume
/// so the busiest markets are considered first.
pub async fn get_update_candidates(
    pool: &PgPool,
    threshold_hours: i64,
) -> anyhow::Result<Vec<Item>> {
    let threshold = Utc::now() - Duration::hours(threshold_hours);

    let rows = sqlx::query_as::<_, Item>(
        r#"
        SELECT * FROM items
        WHERE EXISTS (
                SELECT 1 FROM trades
                WHERE trades.item_id = items.id AND trades.traded_at >= $1
            )
           OR volume_24h > 1.0
           OR last_trend_update < $1
           OR last_trend_update IS NULL
        ORDER BY volume_24h DESC
        "#,
    )
    .bind(threshold)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Items worth scanning for velocity spikes: already trending, fastest first.
pub async fn get_spike_scan_candidates(
    pool: &PgPool,
    min_score: f64,
    limit: i64,
) -> anyhow::Result<Vec<Item>> {
    let rows = sqlx::query_as::<_, Item>(
        r#"
        SELECT * FROM items
        WHERE trend_score > $1
        ORDER BY trend_velocity DESC
        LIMIT $2
        "#,
    )
    .bind(min_score)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Count trades for an item since the given instant.
pub async fn count_trades_since(
    pool: &PgPool,
    item_id: Uuid,
    since: DateTime<Utc>,
) -> anyhow::Result<i64> {
    let row: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM trades WHERE item_id = $1 AND traded_at >= $2",
    )
    .bind(item_id)
    .bind(since)
    .fetch_one(pool)
    .await?;

    Ok(row.0)
}

/// Count comments on an item since the given instant.
pub async fn count_comments_since(
    pool: &PgPool,
    item_id: Uuid,
    since: DateTime<Utc>,
) -> anyhow::Result<i64> {
    let row: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM comments WHERE item_id = $1 AND created_at >= $2",
    )
    .bind(item_id)
    .bind(since)
    .fetch_one(pool)
    .await?;

    Ok(row.0)
}

/// Count likes on an item since the given instant.
pub async fn count_likes_since(
    pool: &PgPool,
    item_id: Uuid,
    since: DateTime<Utc>,
) -> anyhow::Result<i64> {
    let row: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM likes WHERE item_id = $1 AND created_at >= $2",
    )
    .bind(item_id)
    .bind(since)
    .fetch_one(pool)
    .await?;

    Ok(row.0)
}

/// Current number of distinct holders of an item's token.
pub async fn holder_count(pool: &PgPool, item_id: Uuid) -> anyhow::Result<i64> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM holders WHERE item_id = $1")
        .bind(item_id)
        .fetch_one(pool)
        .await?;

    Ok(row.0)
}

/// Per-minute volume buckets since the given instant, most recent first.
pub async fn volume_minutes_since(
    pool: &PgPool,
    item_id: Uuid,
    since: DateTime<Utc>,
) -> anyhow::Result<Vec<VolumeMinute>> {
    let rows = sqlx::query_as::<_, VolumeMinute>(
        r#"
        SELECT item_id, minute, volume FROM volume_minutes
        WHERE item_id = $1 AND minute >= $2
        ORDER BY minute DESC
        "#,
    )
    .bind(item_id)
    .bind(since)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Ids of the highest-volume items other than `exclude`, for correlation.
pub async fn top_volume_item_ids(
    pool: &PgPool,
    exclude: Uuid,
    limit: i64,
) -> anyhow::Result<Vec<Uuid>> {
    let rows: Vec<(Uuid,)> = sqlx::query_as(
        r#"
        SELECT id FROM items
        WHERE id != $1 AND volume_24h > 0
        ORDER BY volume_24h DESC
        LIMIT $2
        "#,
    )
    .bind(exclude)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|r| r.0).collect())
}

/// Find an item by its settlement-ledger account address.
pub async fn get_item_by_ledger_account(
    pool: &PgPool,
    ledger_account: &str,
) -> anyhow::Result<Option<Item>> {
    let row = sqlx::query_as::<_, Item>("SELECT * FROM items WHERE ledger_account = $1")
        .bind(ledger_account)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

/// Record one trade reported by the ledger event stream.
pub async fn insert_trade(
    pool: &PgPool,
    item_id: Uuid,
    side: &str,
    amount: Decimal,
    price: Decimal,
    trader: &str,
    traded_at: DateTime<Utc>,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO trades (item_id, side, amount, price, trader, traded_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(item_id)
    .bind(side)
    .bind(amount)
    .bind(price)
    .bind(trader)
    .bind(traded_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Add traded volume to the current per-minute bucket.
pub async fn bump_volume_minute(
    pool: &PgPool,
    item_id: Uuid,
    minute: DateTime<Utc>,
    volume: Decimal,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO volume_minutes (item_id, minute, volume)
        VALUES ($1, $2, $3)
        ON CONFLICT (item_id, minute) DO UPDATE
            SET volume = volume_minutes.volume + EXCLUDED.volume
        "#,
    )
    .bind(item_id)
    .bind(minute)
    .bind(volume)
    .execute(pool)
    .await?;

    Ok(())
}

/// Recompute an item's rolling statistics from its recent trades.
pub async fn refresh_statistics(pool: &PgPool, item_id: Uuid) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        UPDATE items SET
            volume_24h = COALESCE((
                SELECT SUM(amount * price) FROM trades
                WHERE item_id = $1 AND traded_at >= NOW() - INTERVAL '24 hours'
            ), 0),
            price_change_24h = COALESCE((
                SELECT CASE WHEN first.price > 0
                            THEN ((last.price - first.price) / first.price) * 100
                            ELSE 0 END
                FROM (
                    SELECT price FROM trades
                    WHERE item_id = $1 AND traded_at >= NOW() - INTERVAL '24 hours'
                    ORDER BY traded_at ASC LIMIT 1
                ) AS first,
                (
                    SELECT price FROM trades
                    WHERE item_id = $1
                    ORDER BY traded_at DESC LIMIT 1
                ) AS last
            ), 0)
        WHERE id = $1
        "#,
    )
    .bind(item_id)
    .execute(pool)
    .await?;

    Ok(())
}
