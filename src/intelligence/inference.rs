use std::sync::Arc;

use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{TrendFactors, TrendResult, TrendWeights};
use crate::resilience::{BreakerError, CircuitBreaker};

/// Ambient market snapshot embedded in scoring prompts.
#[derive(Debug, Clone)]
pub struct MarketContext {
    pub volatility: String,
    pub sentiment: String,
    pub active_markets: i64,
}

impl Default for MarketContext {
    fn default() -> Self {
        Self {
            volatility: "medium".into(),
            sentiment: "neutral".into(),
            active_markets: 0,
        }
    }
}

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("inference request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("inference service rate limited")]
    RateLimited,

    #[error("circuit breaker open, inference unavailable")]
    CircuitOpen,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    temperature: f64,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    text: String,
}

/// The structured object the scorer is asked to return. Missing weight keys
/// fail deserialization, which routes through the fallback path.
#[derive(Debug, Deserialize)]
struct RawScore {
    weights: TrendWeights,
    score: f64,
    confidence: f64,
    reasoning: Option<String>,
}

/// Client for the external scoring service.
///
/// Builds a prompt from the seven factors plus market context, sends it
/// through the circuit breaker, and parses the JSON the scorer returns.
/// Malformed output never errors — it degrades to the fixed default weight
/// vector; only total unavailability of the scorer surfaces as an error.
#[derive(Clone)]
pub struct InferenceClient {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
    breaker: Arc<CircuitBreaker>,
}

impl InferenceClient {
    pub fn new(
        http: Client,
        base_url: String,
        api_key: String,
        model: String,
        breaker: Arc<CircuitBreaker>,
    ) -> Self {
        Self {
            http,
            base_url,
            api_key,
            model,
            breaker,
        }
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Score an item's trend from its factor vector.
    pub async fn score_trend(
        &self,
        item_id: uuid::Uuid,
        factors: TrendFactors,
        context: &MarketContext,
    ) -> Result<TrendResult, InferenceError> {
        let prompt = build_trend_prompt(item_id, &factors, context);
        let text = self.complete(&prompt).await?;
        Ok(parse_trend_response(&text, factors))
    }

    /// Score the sentiment of an item's text content, -1..1.
    pub async fn score_sentiment(
        &self,
        headline: &str,
        content: &str,
    ) -> Result<f64, InferenceError> {
        let prompt = build_sentiment_prompt(headline, content);
        let text = self.complete(&prompt).await?;

        Ok(text
            .trim()
            .parse::<f64>()
            .unwrap_or(0.0)
            .clamp(-1.0, 1.0))
    }

    async fn complete(&self, prompt: &str) -> Result<String, InferenceError> {
        let request = async {
            let url = format!("{}/v1/completions", self.base_url);
            let body = CompletionRequest {
                model: &self.model,
                prompt,
                temperature: 0.3,
                max_output_tokens: 1000,
            };

            let resp = self
                .http
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await?;

            if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
                return Err(InferenceError::RateLimited);
            }

            let resp = resp.error_for_status()?;
            let parsed: CompletionResponse = resp.json().await?;
            Ok(parsed.text)
        };

        match self.breaker.call(request).await {
            Ok(text) => Ok(text),
            Err(BreakerError::Open) => Err(InferenceError::CircuitOpen),
            Err(BreakerError::Service(e)) => Err(e),
        }
    }
}

fn build_trend_prompt(
    item_id: uuid::Uuid,
    factors: &TrendFactors,
    context: &MarketContext,
) -> String {
    format!(
        r#"You are a financial analyst specializing in tokenized-content trend analysis.

Current market context:
- Time: {now}
- Market volatility: {volatility}
- Overall sentiment: {market_sentiment}
- Active markets: {active_markets}

For item {item_id}, analyze these factors and determine optimal weights for a trend index:

FACTORS:
- Sentiment: {sentiment:.3} (range: -1 to 1)
- Trading Velocity: {trading_velocity:.2} trades/min
- Volume Spike: {volume_spike:.3} (deviation from average)
- Price Momentum: {price_momentum:.3} (rate of change)
- Social Activity: {social_activity:.2} interactions/hour
- Holder Momentum: {holder_momentum:.2} new holders
- Cross-Market Correlation: {cross_market_corr:.3}

TASK:
1. Determine optimal weights for each factor (must sum to 1.0)
2. Calculate final trend score (0-100)
3. Assess confidence level (0-1)
4. Provide reasoning

RESPONSE FORMAT (JSON only):
{{
  "weights": {{
    "sentiment": 0.25,
    "tradingVelocity": 0.20,
    "volumeSpike": 0.20,
    "priceMomentum": 0.15,
    "socialActivity": 0.10,
    "holderMomentum": 0.05,
    "crossMarketCorr": 0.05
  }},
  "score": 75.5,
  "confidence": 0.85,
  "reasoning": "..."
}}"#,
        now = Utc::now().to_rfc3339(),
        volatility = context.volatility,
        market_sentiment = context.sentiment,
        active_markets = context.active_markets,
        item_id = item_id,
        sentiment = factors.sentiment,
        trading_velocity = factors.trading_velocity,
        volume_spike = factors.volume_spike,
        price_momentum = factors.price_momentum,
        social_activity = factors.social_activity,
        holder_momentum = factors.holder_momentum,
        cross_market_corr = factors.cross_market_corr,
    )
}

fn build_sentiment_prompt(headline: &str, content: &str) -> String {
    let excerpt: String = content.chars().take(500).collect();
    format!(
        "Analyze the sentiment of this story and return a number between -1 \
         (very negative) and 1 (very positive).\n\n\
         Headline: {headline}\n\
         Content: {excerpt}\n\n\
         Return only a single number between -1 and 1, no other text."
    )
}

/// Parse the scorer's reply into a [`TrendResult`].
///
/// Weights must cover all seven keys and be non-negative; a sum off by more
/// than 0.01 is re-normalized. Score and confidence are clamped. Any parse
/// failure falls back to the default weight vector with a direct weighted
/// score computed from the raw factors.
pub fn parse_trend_response(text: &str, factors: TrendFactors) -> TrendResult {
    let parsed = extract_json(text).and_then(|json| serde_json::from_str::<RawScore>(json).ok());

    match parsed {
        Some(raw) if raw.weights.is_non_negative() => {
            let mut weights = raw.weights;
            if (weights.sum() - 1.0).abs() > 0.01 {
                tracing::warn!(sum = weights.sum(), "Scorer weights off-unit, normalizing");
                weights.normalize();
            }

            TrendResult {
                score: raw.score.clamp(0.0, 100.0),
                factors,
                weights,
                confidence: raw.confidence.clamp(0.0, 1.0),
                reasoning: raw
                    .reasoning
                    .unwrap_or_else(|| "trend analysis completed".into()),
                timestamp: Utc::now(),
            }
        }
        _ => {
            tracing::warn!("Unparseable scorer output, using default weights");
            let weights = TrendWeights::default();
            TrendResult {
                score: factors.weighted_score(&weights),
                factors,
                weights,
                confidence: 0.5,
                reasoning: "fallback calculation: scorer output could not be parsed".into(),
                timestamp: Utc::now(),
            }
        }
    }
}

/// Slice out the outermost JSON object embedded in free-form model output.
fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factors() -> TrendFactors {
        TrendFactors {
            sentiment: 0.8,
            trading_velocity: 2.0,
            volume_spike: 1.5,
            price_momentum: 0.1,
            social_activity: 12.0,
            holder_momentum: 3.0,
            cross_market_corr: 0.2,
        }
    }

    #[test]
    fn parses_well_formed_response() {
        let text = r#"Here is my analysis:
{
  "weights": {
    "sentiment": 0.25, "tradingVelocity": 0.20, "volumeSpike": 0.20,
    "priceMomentum": 0.15, "socialActivity": 0.10,
    "holderMomentum": 0.05, "crossMarketCorr": 0.05
  },
  "score": 75.5,
  "confidence": 0.85,
  "reasoning": "strong volume and sentiment"
}"#;
        let result = parse_trend_response(text, factors());
        assert_eq!(result.score, 75.5);
        assert_eq!(result.confidence, 0.85);
        assert_eq!(result.reasoning, "strong volume and sentiment");
        assert!((result.weights.sum() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn off_unit_weights_are_normalized() {
        let text = r#"{
  "weights": {
    "sentiment": 0.5, "tradingVelocity": 0.4, "volumeSpike": 0.4,
    "priceMomentum": 0.3, "socialActivity": 0.2,
    "holderMomentum": 0.1, "crossMarketCorr": 0.1
  },
  "score": 50,
  "confidence": 0.7
}"#;
        let result = parse_trend_response(text, factors());
        assert!((result.weights.sum() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn score_and_confidence_are_clamped() {
        let text = r#"{
  "weights": {
    "sentiment": 0.25, "tradingVelocity": 0.20, "volumeSpike": 0.20,
    "priceMomentum": 0.15, "socialActivity": 0.10,
    "holderMomentum": 0.05, "crossMarketCorr": 0.05
  },
  "score": 150,
  "confidence": 1.4
}"#;
        let result = parse_trend_response(text, factors());
        assert_eq!(result.score, 100.0);
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn missing_weight_key_falls_back_to_defaults() {
        let text = r#"{
  "weights": { "sentiment": 1.0 },
  "score": 90,
  "confidence": 0.9
}"#;
        let result = parse_trend_response(text, factors());
        assert_eq!(result.weights, TrendWeights::default());
        assert_eq!(result.confidence, 0.5);
        // Fallback score is the direct weighted composite
        let expected = factors().weighted_score(&TrendWeights::default());
        assert!((result.score - expected).abs() < 1e-9);
    }

    #[test]
    fn garbage_output_falls_back_to_defaults() {
        let result = parse_trend_response("the market feels bullish today", factors());
        assert_eq!(result.weights, TrendWeights::default());
        assert!(result.score >= 0.0 && result.score <= 100.0);
    }

    #[test]
    fn negative_weights_are_rejected() {
        let text = r#"{
  "weights": {
    "sentiment": -0.5, "tradingVelocity": 0.5, "volumeSpike": 0.4,
    "priceMomentum": 0.3, "socialActivity": 0.2,
    "holderMomentum": 0.05, "crossMarketCorr": 0.05
  },
  "score": 50,
  "confidence": 0.7
}"#;
        let result = parse_trend_response(text, factors());
        assert_eq!(result.weights, TrendWeights::default());
    }

    #[test]
    fn extract_json_finds_outermost_object() {
        assert_eq!(extract_json("noise {\"a\": 1} trailing"), Some("{\"a\": 1}"));
        assert_eq!(extract_json("no json here"), None);
    }
}
