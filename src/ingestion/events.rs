use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

/// Domain events emitted by the settlement ledger. Purchases and sales feed
/// the trade log and volume buckets; the rest only trigger a statistics
/// refresh for the touched market.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum LedgerEvent {
    #[serde(rename = "tokensPurchased")]
    Purchase(TradeEvent),

    #[serde(rename = "tokensSold")]
    Sale(TradeEvent),

    #[serde(rename = "tokensStaked")]
    Stake(AccountEvent),

    #[serde(rename = "tokensUnstaked")]
    Unstake(AccountEvent),

    #[serde(rename = "feesClaimed")]
    FeeClaim(AccountEvent),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeEvent {
    /// Market account address on the ledger.
    pub market_account: String,
    pub trader: String,
    pub amount: Decimal,
    /// Total paid (purchase) or refunded (sale), in base units.
    pub total: Decimal,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountEvent {
    pub market_account: String,
    pub wallet: String,
    pub amount: Option<Decimal>,
}

impl LedgerEvent {
    pub fn market_account(&self) -> &str {
        match self {
            LedgerEvent::Purchase(e) | LedgerEvent::Sale(e) => &e.market_account,
            LedgerEvent::Stake(e) | LedgerEvent::Unstake(e) | LedgerEvent::FeeClaim(e) => {
                &e.market_account
            }
        }
    }
}

/// Decode one stream frame. Shape mismatches are logged and dropped here,
/// the single decode boundary for ledger events.
pub fn parse_event(text: &str) -> Option<LedgerEvent> {
    match serde_json::from_str::<LedgerEvent>(text) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring unrecognized ledger event frame");
            None
        }
    }
}
