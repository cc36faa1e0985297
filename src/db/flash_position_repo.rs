use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::FlashPosition;

/// All positions in a market that have not been settled yet.
pub async fn get_unresolved_for_market(
    pool: &PgPool,
    market_id: Uuid,
) -> anyhow::Result<Vec<FlashPosition>> {
    let rows = sqlx::query_as::<_, FlashPosition>(
        "SELECT * FROM flash_positions WHERE market_id = $1 AND is_resolved = false",
    )
    .bind(market_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Settle one position with its final payout and profit/loss. Terminal.
pub async fn settle_position(
    pool: &PgPool,
    position_id: Uuid,
    payout: Decimal,
    profit_loss: Decimal,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        UPDATE flash_positions
        SET is_resolved = true, payout = $2, profit_loss = $3
        WHERE id = $1
        "#,
    )
    .bind(position_id)
    .bind(payout)
    .bind(profit_loss)
    .execute(pool)
    .await?;

    Ok(())
}
