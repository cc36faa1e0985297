use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row for the flash_markets table.
///
/// A flash market is a fixed 60-second side-bet opened on a detected trend
/// velocity spike. Created by the spike scanner, mutated only by resolution,
/// terminal once `is_resolved` is set.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FlashMarket {
    pub id: Uuid,
    pub item_id: Uuid,
    /// Factor weights of the parent item at creation time.
    pub snapshot_weights: serde_json::Value,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Trend velocity (points/sec) that triggered the market.
    pub initial_velocity: f64,
    pub final_velocity: Option<f64>,
    /// "up" or "down"; set at resolution.
    pub winning_side: Option<String>,
    pub is_active: bool,
    pub is_resolved: bool,
    pub created_at: Option<DateTime<Utc>>,
}
