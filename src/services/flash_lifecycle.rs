use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use metrics::counter;
use sqlx::PgPool;
use tokio::time::{interval, Duration};

use crate::db::{flash_market_repo, flash_position_repo, item_repo, trend_repo};
use crate::ledger::LedgerClient;
use crate::models::{Direction, FlashMarket, Item};
use crate::services::notifier::{Notification, NotificationBus};
use crate::services::payout::calculate_payouts;
use crate::services::spike_detector::{velocity_between, VelocitySpikeDetector};

/// Fixed betting window of every flash market.
pub const FLASH_WINDOW_SECS: i64 = 60;
/// Cadence of the velocity-spike scan.
const SPIKE_SCAN_INTERVAL: Duration = Duration::from_secs(2);
/// Cadence of the expired-market resolution poll.
const EXPIRY_SCAN_INTERVAL: Duration = Duration::from_secs(5);
/// Only items already trending are scanned for spikes.
const SCAN_MIN_SCORE: f64 = 30.0;
/// Upper bound of items examined per scan pass.
const SCAN_LIMIT: i64 = 20;

/// Scan trending items for velocity spikes and open flash markets on
/// detection. One item's failure never stops the scan.
pub async fn run_spike_scanner(
    pool: PgPool,
    detector: Arc<VelocitySpikeDetector>,
    ledger: Arc<LedgerClient>,
    bus: NotificationBus,
) {
    let mut ticker = interval(SPIKE_SCAN_INTERVAL);
    tracing::info!(
        interval_secs = SPIKE_SCAN_INTERVAL.as_secs(),
        "Spike scanner started"
    );

    loop {
        ticker.tick().await;

        let candidates =
            match item_repo::get_spike_scan_candidates(&pool, SCAN_MIN_SCORE, SCAN_LIMIT).await {
                Ok(items) => items,
                Err(e) => {
                    tracing::error!(error = %e, "Spike scan: failed to fetch candidates");
                    continue;
                }
            };

        for item in &candidates {
            let check = match detector.detect(&pool, item.id).await {
                Ok(c) => c,
                Err(e) => {
                    tracing::error!(error = %e, item_id = %item.id, "Spike check failed");
                    continue;
                }
            };

            if !check.detected {
                continue;
            }

            counter!("spike_detections_total").increment(1);
            tracing::info!(
                item_id = %item.id,
                velocity = check.velocity,
                "Velocity spike detected"
            );

            if let Err(e) = open_flash_market(&pool, &ledger, &bus, item, check.velocity).await {
                tracing::error!(error = %e, item_id = %item.id, "Failed to open flash market");
            }
        }
    }
}

/// Open a 60-second flash market for a spiked item: persist it, submit the
/// ledger create instruction (best-effort), and broadcast the announcement.
pub async fn open_flash_market(
    pool: &PgPool,
    ledger: &LedgerClient,
    bus: &NotificationBus,
    item: &Item,
    velocity: f64,
) -> anyhow::Result<FlashMarket> {
    let start_time = Utc::now();
    let end_time = start_time + ChronoDuration::seconds(FLASH_WINDOW_SECS);
    let snapshot = item
        .trend_weights
        .clone()
        .unwrap_or_else(|| serde_json::json!({}));

    let market = flash_market_repo::insert_market(
        pool,
        item.id,
        snapshot,
        start_time,
        end_time,
        velocity,
    )
    .await?;

    if let Some(account) = item.ledger_account.as_deref() {
        if let Err(e) = ledger
            .create_flash_market(account, velocity, FLASH_WINDOW_SECS as u64)
            .await
        {
            tracing::warn!(error = %e, market_id = %market.id, "Ledger create instruction failed");
        }
    }

    bus.publish(Notification::FlashMarketCreated {
        market_id: market.id,
        item_id: item.id,
        velocity,
        end_time,
    });

    counter!("flash_markets_created").increment(1);
    tracing::info!(
        market_id = %market.id,
        item_id = %item.id,
        end_time = %end_time,
        "Flash market opened"
    );

    Ok(market)
}

/// Periodically settle flash markets whose window has closed.
pub async fn run_expiry_poller(pool: PgPool, ledger: Arc<LedgerClient>) {
    let mut ticker = interval(EXPIRY_SCAN_INTERVAL);
    tracing::info!(
        interval_secs = EXPIRY_SCAN_INTERVAL.as_secs(),
        "Flash market expiry poller started"
    );

    loop {
        ticker.tick().await;

        let expired = match flash_market_repo::get_expired_unresolved(&pool).await {
            Ok(markets) => markets,
            Err(e) => {
                tracing::error!(error = %e, "Expiry poll: failed to fetch expired markets");
                continue;
            }
        };

        for market in &expired {
            match resolve_market(&pool, &ledger, market).await {
                Ok(true) => {}
                Ok(false) => {
                    tracing::debug!(
                        market_id = %market.id,
                        "Resolution deferred, not enough trend history yet"
                    );
                }
                Err(e) => {
                    tracing::error!(error = %e, market_id = %market.id, "Failed to resolve market");
                }
            }
        }
    }
}

/// Resolve one expired market. Returns `false` when fewer than two history
/// points exist for the parent item; the market stays expired-unresolved and
/// is retried on the next poll.
pub async fn resolve_market(
    pool: &PgPool,
    ledger: &LedgerClient,
    market: &FlashMarket,
) -> anyhow::Result<bool> {
    let history = trend_repo::recent_history(pool, market.item_id, 2).await?;
    if history.len() < 2 {
        return Ok(false);
    }

    let final_velocity = velocity_between(&history[0], &history[1]);
    let velocity_change = final_velocity - market.initial_velocity;
    let winning_side = if velocity_change >= 0.0 {
        Direction::Up
    } else {
        Direction::Down
    };

    // Settle every outstanding position exactly once.
    let positions = flash_position_repo::get_unresolved_for_market(pool, market.id).await?;
    let outcomes = calculate_payouts(&positions, winning_side);
    for outcome in &outcomes {
        flash_position_repo::settle_position(
            pool,
            outcome.position_id,
            outcome.payout,
            outcome.profit_loss,
        )
        .await?;
    }

    flash_market_repo::mark_resolved(pool, market.id, final_velocity, winning_side.as_str())
        .await?;

    // Close instruction is best-effort; the DB state is authoritative here.
    if let Ok(Some(item)) = item_repo::get_item(pool, market.item_id).await {
        if let Some(account) = item.ledger_account.as_deref() {
            if let Err(e) = ledger.close_flash_market(account, final_velocity).await {
                tracing::warn!(error = %e, market_id = %market.id, "Ledger close instruction failed");
            }
        }
    }

    counter!("flash_markets_resolved").increment(1);
    tracing::info!(
        market_id = %market.id,
        winning_side = %winning_side,
        final_velocity,
        positions = positions.len(),
        "Flash market resolved"
    );

    Ok(true)
}
