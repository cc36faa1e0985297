use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::Utc;
use reqwest::Client;
use serde_json::json;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::models::TrendFactors;

use super::auth::LedgerAuth;
use super::types::{decode_market_account, MarketAccount};

/// Trend scores and velocities are fixed-point scaled before submission.
const SCORE_SCALE: f64 = 1000.0;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("ledger returned malformed data: {0}")]
    Decode(String),

    #[error("ledger write requires credentials but none are configured")]
    Unsigned,

    #[error("request signing failed: {0}")]
    Auth(#[from] super::auth::AuthError),
}

/// HTTP client for the settlement ledger.
///
/// Reads (market accounts) are unauthenticated; writes (score pushes, flash
/// market create/close instructions) carry HMAC oracle signatures. Without
/// credentials the client degrades to read-only and write calls error, which
/// callers treat as best-effort.
#[derive(Debug, Clone)]
pub struct LedgerClient {
    http: Client,
    base_url: String,
    auth: Option<LedgerAuth>,
}

impl LedgerClient {
    pub fn new(http: Client, base_url: String, auth: Option<LedgerAuth>) -> Self {
        Self {
            http,
            base_url,
            auth,
        }
    }

    /// Fetch and decode a market account for pricing inputs.
    pub async fn get_market_account(&self, address: &str) -> Result<MarketAccount, LedgerError> {
        let url = format!("{}/accounts/market/{}", self.base_url, address);
        let resp = self.http.get(&url).send().await?.error_for_status()?;

        let value: serde_json::Value = resp.json().await?;
        decode_market_account(value).map_err(LedgerError::Decode)
    }

    /// Push a freshly computed trend score on-ledger, with a hash of the
    /// factor vector for verification.
    pub async fn push_trend_score(
        &self,
        address: &str,
        score: f64,
        factors: &TrendFactors,
    ) -> Result<(), LedgerError> {
        let body = json!({
            "account": address,
            "scoreScaled": (score * SCORE_SCALE).round() as u64,
            "factorsHash": factors_hash(factors),
        });
        self.signed_post("/oracle/trend", &body).await
    }

    /// Submit the create instruction for a flash market.
    pub async fn create_flash_market(
        &self,
        address: &str,
        velocity: f64,
        window_secs: u64,
    ) -> Result<(), LedgerError> {
        let body = json!({
            "account": address,
            "velocityScaled": (velocity * SCORE_SCALE).floor() as i64,
            "windowSecs": window_secs,
        });
        self.signed_post("/oracle/flash-markets", &body).await
    }

    /// Submit the close instruction for an expired flash market.
    pub async fn close_flash_market(
        &self,
        address: &str,
        final_velocity: f64,
    ) -> Result<(), LedgerError> {
        let body = json!({
            "account": address,
            "velocityScaled": (final_velocity * SCORE_SCALE).floor() as i64,
        });
        self.signed_post("/oracle/flash-markets/close", &body).await
    }

    async fn signed_post(&self, path: &str, body: &serde_json::Value) -> Result<(), LedgerError> {
        let auth = self.auth.as_ref().ok_or(LedgerError::Unsigned)?;

        let timestamp = Utc::now().timestamp().to_string();
        let body_text = body.to_string();
        let signature = auth.sign(&timestamp, "POST", path, &body_text)?;

        let url = format!("{}{}", self.base_url, path);
        self.http
            .post(&url)
            .header("X-Oracle-Key", &auth.api_key)
            .header("X-Oracle-Timestamp", &timestamp)
            .header("X-Oracle-Signature", signature)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body_text)
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }
}

/// SHA-256 over the canonical JSON of the factor vector, base64-encoded.
pub fn factors_hash(factors: &TrendFactors) -> String {
    let canonical = serde_json::to_string(factors).unwrap_or_default();
    let digest = Sha256::digest(canonical.as_bytes());
    BASE64.encode(digest)
}
