use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row for the items table: one tradable content item plus its
/// latest trend state and rolling statistics.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Item {
    pub id: Uuid,
    pub headline: String,
    pub content: Option<String>,
    /// Address of the market account on the settlement ledger, if delegated.
    pub ledger_account: Option<String>,

    // Rolling statistics, refreshed by the ingestion pipeline
    pub volume_24h: Decimal,
    pub price_change_24h: f64,

    // Latest trend state, superseded on each scoring cycle
    pub trend_score: f64,
    /// Points per minute versus the previous scoring cycle.
    pub trend_velocity: f64,
    pub sentiment_score: f64,
    pub social_activity: f64,
    pub holder_momentum: f64,
    pub cross_market_corr: f64,
    pub trend_confidence: f64,
    pub trend_reasoning: Option<String>,
    pub trend_weights: Option<serde_json::Value>,
    pub last_trend_update: Option<DateTime<Utc>>,

    pub created_at: Option<DateTime<Utc>>,
}

/// Database row for the volume_minutes table: per-minute traded volume bucket.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct VolumeMinute {
    pub item_id: Uuid,
    pub minute: DateTime<Utc>,
    pub volume: Decimal,
}
