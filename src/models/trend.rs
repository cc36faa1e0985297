use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::{TrendFactors, TrendWeights};

/// One complete scoring-cycle output for an item. Written to the item's
/// latest-state columns and appended to the immutable history log; the next
/// result supersedes it without deleting anything.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendResult {
    /// Composite trend index, 0-100.
    pub score: f64,
    pub factors: TrendFactors,
    pub weights: TrendWeights,
    /// Scorer confidence, 0-1.
    pub confidence: f64,
    pub reasoning: String,
    pub timestamp: DateTime<Utc>,
}

/// Database row for the trend_history table (append-only).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TrendHistoryPoint {
    pub id: Uuid,
    pub item_id: Uuid,
    pub score: f64,
    pub factors: serde_json::Value,
    pub weights: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}
