use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row for the flash_positions table.
///
/// Positions are originated by the marketplace when a user joins a market;
/// this service only settles them. Terminal once `is_resolved` is set —
/// every position of a resolved market is settled exactly once.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FlashPosition {
    pub id: Uuid,
    pub market_id: Uuid,
    pub user_wallet: String,
    /// "up" or "down".
    pub direction: String,
    pub stake: Decimal,
    pub payout: Option<Decimal>,
    pub profit_loss: Option<Decimal>,
    pub is_resolved: bool,
    pub created_at: Option<DateTime<Utc>>,
}
