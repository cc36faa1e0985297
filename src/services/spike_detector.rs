use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use sqlx::PgPool;
use tokio::time::Instant;
use uuid::Uuid;

use crate::db::trend_repo;
use crate::models::TrendHistoryPoint;

/// Outcome of one spike check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpikeCheck {
    pub detected: bool,
    /// Trend score change in points per second.
    pub velocity: f64,
}

/// Detects sudden trend-score movement from persisted history.
///
/// Velocity is the score delta between the two most recent history points
/// divided by their time gap in seconds. A per-item cooldown suppresses
/// repeat triggers; the cooldown stamp is recorded at detection time so
/// concurrent scans cannot double-fire.
pub struct VelocitySpikeDetector {
    velocity_threshold: f64,
    cooldown: Duration,
    recent_triggers: Mutex<HashMap<Uuid, Instant>>,
}

impl VelocitySpikeDetector {
    pub fn new(velocity_threshold: f64, cooldown: Duration) -> Self {
        Self {
            velocity_threshold,
            cooldown,
            recent_triggers: Mutex::new(HashMap::new()),
        }
    }

    /// Check the given item against its persisted trend history.
    pub async fn detect(&self, pool: &PgPool, item_id: Uuid) -> anyhow::Result<SpikeCheck> {
        let history = trend_repo::recent_history(pool, item_id, 2).await?;
        Ok(self.evaluate(item_id, &history))
    }

    /// Pure detection step over already-fetched history (newest first).
    pub fn evaluate(&self, item_id: Uuid, history: &[TrendHistoryPoint]) -> SpikeCheck {
        if history.len() < 2 {
            return SpikeCheck {
                detected: false,
                velocity: 0.0,
            };
        }

        let velocity = velocity_between(&history[0], &history[1]);

        let mut triggers = self
            .recent_triggers
            .lock()
            .expect("spike trigger lock poisoned");

        if let Some(last) = triggers.get(&item_id) {
            if last.elapsed() < self.cooldown {
                return SpikeCheck {
                    detected: false,
                    velocity,
                };
            }
        }

        if velocity.abs() > self.velocity_threshold {
            // Stamp immediately, before any market gets created.
            triggers.insert(item_id, Instant::now());
            return SpikeCheck {
                detected: true,
                velocity,
            };
        }

        SpikeCheck {
            detected: false,
            velocity,
        }
    }
}

/// Points-per-second score change between two history points, newest first.
/// 0 when the points are not strictly ordered in time.
pub fn velocity_between(newer: &TrendHistoryPoint, older: &TrendHistoryPoint) -> f64 {
    let dt_secs = (newer.timestamp - older.timestamp).num_milliseconds() as f64 / 1000.0;
    if dt_secs <= 0.0 {
        return 0.0;
    }
    (newer.score - older.score) / dt_secs
}
