pub mod flash_market;
pub mod flash_position;
pub mod item;
pub mod trend;

pub use flash_market::FlashMarket;
pub use flash_position::FlashPosition;
pub use item::{Item, VolumeMinute};
pub use trend::{TrendHistoryPoint, TrendResult};

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// Side of a flash-market bet: will trend velocity keep rising or reverse?
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "up" => Some(Direction::Up),
            "down" => Some(Direction::Down),
            _ => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Update priority
// ---------------------------------------------------------------------------

/// Scheduling priority for a trend update. Informs ordering and logging;
/// batch execution itself is priority-agnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::High => write!(f, "high"),
            Priority::Medium => write!(f, "medium"),
            Priority::Low => write!(f, "low"),
        }
    }
}

// ---------------------------------------------------------------------------
// Bonding curve type
// ---------------------------------------------------------------------------

/// Shape of a market's bonding curve, as stored on the ledger account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CurveType {
    Linear,
    Exponential,
    Logarithmic,
}

impl CurveType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "linear" => Some(CurveType::Linear),
            "exponential" => Some(CurveType::Exponential),
            "logarithmic" => Some(CurveType::Logarithmic),
            _ => None,
        }
    }
}

impl fmt::Display for CurveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CurveType::Linear => write!(f, "linear"),
            CurveType::Exponential => write!(f, "exponential"),
            CurveType::Logarithmic => write!(f, "logarithmic"),
        }
    }
}

// ---------------------------------------------------------------------------
// TrendFactors / TrendWeights
// ---------------------------------------------------------------------------

/// The seven normalized signals collected per item each scoring cycle.
/// Computed fresh every cycle; persisted only as part of a `TrendResult`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendFactors {
    /// Sentiment of the item's text content, -1..1.
    pub sentiment: f64,
    /// Trades per minute over the trailing hour.
    pub trading_velocity: f64,
    /// Signed deviation of recent volume from the 24h per-bucket average.
    pub volume_spike: f64,
    /// 24h price change expressed as a rate (pct / 100).
    pub price_momentum: f64,
    /// Comments + likes over the trailing hour.
    pub social_activity: f64,
    /// Scaled proxy for new-holder rate.
    pub holder_momentum: f64,
    /// Average volume-series correlation against the top traded items, -1..1.
    pub cross_market_corr: f64,
}

impl TrendFactors {
    /// Weighted composite on the 0-100 scale, used as the fallback score
    /// when the inference service returns unparseable output.
    pub fn weighted_score(&self, weights: &TrendWeights) -> f64 {
        let raw = self.sentiment * weights.sentiment
            + self.trading_velocity * weights.trading_velocity
            + self.volume_spike * weights.volume_spike
            + self.price_momentum * weights.price_momentum
            + self.social_activity * weights.social_activity
            + self.holder_momentum * weights.holder_momentum
            + self.cross_market_corr * weights.cross_market_corr;

        (raw * 100.0).clamp(0.0, 100.0)
    }
}

/// Per-factor weights. Must be non-negative and sum to 1.0; callers
/// re-normalize via [`TrendWeights::normalize`] when the source deviates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendWeights {
    pub sentiment: f64,
    pub trading_velocity: f64,
    pub volume_spike: f64,
    pub price_momentum: f64,
    pub social_activity: f64,
    pub holder_momentum: f64,
    pub cross_market_corr: f64,
}

impl TrendWeights {
    pub fn sum(&self) -> f64 {
        self.sentiment
            + self.trading_velocity
            + self.volume_spike
            + self.price_momentum
            + self.social_activity
            + self.holder_momentum
            + self.cross_market_corr
    }

    /// True when every weight is >= 0.
    pub fn is_non_negative(&self) -> bool {
        [
            self.sentiment,
            self.trading_velocity,
            self.volume_spike,
            self.price_momentum,
            self.social_activity,
            self.holder_momentum,
            self.cross_market_corr,
        ]
        .iter()
        .all(|w| *w >= 0.0)
    }

    /// Rescale so the weights sum to 1.0. No-op when the sum is zero.
    pub fn normalize(&mut self) {
        let sum = self.sum();
        if sum == 0.0 {
            return;
        }
        self.sentiment /= sum;
        self.trading_velocity /= sum;
        self.volume_spike /= sum;
        self.price_momentum /= sum;
        self.social_activity /= sum;
        self.holder_momentum /= sum;
        self.cross_market_corr /= sum;
    }
}

impl Default for TrendWeights {
    /// The fixed fallback vector used when inference output cannot be parsed.
    fn default() -> Self {
        Self {
            sentiment: 0.25,
            trading_velocity: 0.20,
            volume_spike: 0.20,
            price_momentum: 0.15,
            social_activity: 0.10,
            holder_momentum: 0.05,
            cross_market_corr: 0.05,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_weights_sum_to_one() {
        assert!((TrendWeights::default().sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn normalize_rescales_to_unit_sum() {
        let mut w = TrendWeights {
            sentiment: 0.5,
            trading_velocity: 0.5,
            volume_spike: 0.5,
            price_momentum: 0.2,
            social_activity: 0.1,
            holder_momentum: 0.1,
            cross_market_corr: 0.1,
        };
        w.normalize();
        assert!((w.sum() - 1.0).abs() < 1e-6);
        // Equal inputs stay equal after rescaling
        assert!((w.sentiment - w.trading_velocity).abs() < 1e-9);
    }

    #[test]
    fn normalize_leaves_zero_vector_alone() {
        let mut w = TrendWeights {
            sentiment: 0.0,
            trading_velocity: 0.0,
            volume_spike: 0.0,
            price_momentum: 0.0,
            social_activity: 0.0,
            holder_momentum: 0.0,
            cross_market_corr: 0.0,
        };
        w.normalize();
        assert_eq!(w.sum(), 0.0);
    }

    #[test]
    fn direction_round_trip() {
        assert_eq!(Direction::from_str("UP"), Some(Direction::Up));
        assert_eq!(Direction::from_str("down"), Some(Direction::Down));
        assert_eq!(Direction::from_str("sideways"), None);
        assert_eq!(Direction::Up.as_str(), "up");
    }
}
