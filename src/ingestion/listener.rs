use chrono::{Timelike, Utc};
use futures_util::{SinkExt, StreamExt};
use metrics::counter;
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::time::Duration;
use tokio::time::{interval, sleep};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::db::item_repo;

use super::events::{parse_event, LedgerEvent, TradeEvent};

const PING_INTERVAL: Duration = Duration::from_secs(25);
const BASE_RECONNECT_DELAY: Duration = Duration::from_secs(2);
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(60);

/// Consume the ledger's domain-event stream and keep item statistics fresh.
///
/// Reconnects with capped exponential backoff. Every event is handled in
/// isolation: a malformed frame or a failed refresh never drops the
/// connection.
pub async fn run_event_listener(ws_url: String, pool: PgPool) {
    let mut attempt: u32 = 0;

    loop {
        tracing::info!(url = %ws_url, "Connecting to ledger event stream...");

        match connect_async(&ws_url).await {
            Ok((ws_stream, _response)) => {
                tracing::info!("Ledger event stream connected");
                attempt = 0;

                let (mut write, mut read) = ws_stream.split();

                let subscribe = r#"{"op":"subscribe","channel":"ledger-events"}"#;
                if let Err(e) = write.send(Message::Text(subscribe.into())).await {
                    tracing::error!(error = %e, "Failed to send subscribe message");
                }

                let mut ping_timer = interval(PING_INTERVAL);
                ping_timer.tick().await; // consume the first immediate tick

                loop {
                    tokio::select! {
                        msg = read.next() => {
                            match msg {
                                Some(Ok(Message::Text(text))) => {
                                    if let Some(event) = parse_event(text.as_ref()) {
                                        if let Err(e) = handle_event(&pool, &event).await {
                                            tracing::error!(
                                                error = %e,
                                                account = %event.market_account(),
                                                "Failed to process ledger event"
                                            );
                                        }
                                    }
                                }
                                Some(Ok(Message::Ping(data))) => {
                                    if let Err(e) = write.send(Message::Pong(data)).await {
                                        tracing::warn!(error = %e, "Failed to send pong");
                                        break;
                                    }
                                }
                                Some(Ok(Message::Close(_))) => {
                                    tracing::warn!("Ledger stream sent close frame");
                                    break;
                                }
                                Some(Ok(_)) => {} // Binary, Pong, Frame — ignore
                                Some(Err(e)) => {
                                    tracing::error!(error = %e, "Ledger stream read error");
                                    break;
                                }
                                None => {
                                    tracing::warn!("Ledger stream ended");
                                    break;
                                }
                            }
                        }
                        _ = ping_timer.tick() => {
                            if let Err(e) = write.send(Message::Ping(vec![].into())).await {
                                tracing::warn!(error = %e, "Failed to send ping");
                                break;
                            }
                        }
                    }
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Ledger stream connection failed");
            }
        }

        // Exponential backoff with cap
        let delay = BASE_RECONNECT_DELAY * 2u32.saturating_pow(attempt);
        let delay = delay.min(MAX_RECONNECT_DELAY);
        attempt = attempt.saturating_add(1);
        tracing::info!(delay_secs = delay.as_secs(), attempt, "Reconnecting...");
        sleep(delay).await;
    }
}

/// Apply one ledger event: record trades and refresh the touched item's
/// rolling statistics.
pub async fn handle_event(pool: &PgPool, event: &LedgerEvent) -> anyhow::Result<()> {
    counter!("ledger_events_total").increment(1);

    let Some(item) = item_repo::get_item_by_ledger_account(pool, event.market_account()).await?
    else {
        tracing::debug!(
            account = %event.market_account(),
            "Ledger event for unknown market account, skipping"
        );
        return Ok(());
    };

    match event {
        LedgerEvent::Purchase(trade) => {
            record_trade(pool, item.id, "BUY", trade).await?;
        }
        LedgerEvent::Sale(trade) => {
            record_trade(pool, item.id, "SELL", trade).await?;
        }
        LedgerEvent::Stake(_) | LedgerEvent::Unstake(_) | LedgerEvent::FeeClaim(_) => {}
    }

    item_repo::refresh_statistics(pool, item.id).await?;

    tracing::debug!(item_id = %item.id, "Item statistics refreshed");
    Ok(())
}

async fn record_trade(
    pool: &PgPool,
    item_id: uuid::Uuid,
    side: &str,
    trade: &TradeEvent,
) -> anyhow::Result<()> {
    let traded_at = trade.timestamp.unwrap_or_else(Utc::now);
    let price = if trade.amount > Decimal::ZERO {
        trade.total / trade.amount
    } else {
        Decimal::ZERO
    };

    item_repo::insert_trade(pool, item_id, side, trade.amount, price, &trade.trader, traded_at)
        .await?;

    // Volume buckets are keyed by the truncated minute.
    let minute = traded_at
        .with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(traded_at);
    item_repo::bump_volume_minute(pool, item_id, minute, trade.total).await?;

    tracing::info!(
        item_id = %item_id,
        side,
        amount = %trade.amount,
        total = %trade.total,
        "Ledger trade recorded"
    );

    Ok(())
}
