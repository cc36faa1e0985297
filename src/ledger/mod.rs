pub mod auth;
pub mod client;
pub mod types;

pub use auth::LedgerAuth;
pub use client::{LedgerClient, LedgerError};
pub use types::{decode_market_account, MarketAccount};
