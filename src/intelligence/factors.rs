use chrono::{Duration, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::db::item_repo;
use crate::models::{Item, TrendFactors, VolumeMinute};

use super::inference::InferenceClient;

/// Number of competing items the correlation factor is measured against.
const CORRELATION_PEERS: i64 = 10;

/// Gather the seven trend signals for one item.
///
/// Activity windows: trailing 1 hour, with a 24-hour per-minute volume
/// baseline. Sentiment comes from the inference scorer and degrades to
/// neutral (0) when the scorer fails; everything else is pure repo reads.
pub async fn collect_factors(
    pool: &PgPool,
    inference: &InferenceClient,
    item: &Item,
) -> anyhow::Result<TrendFactors> {
    let now = Utc::now();
    let one_hour_ago = now - Duration::hours(1);
    let one_day_ago = now - Duration::hours(24);

    let sentiment = match inference
        .score_sentiment(&item.headline, item.content.as_deref().unwrap_or(""))
        .await
    {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(error = %e, item_id = %item.id, "Sentiment scoring failed, using neutral");
            0.0
        }
    };

    let trade_count = item_repo::count_trades_since(pool, item.id, one_hour_ago).await?;
    let trading_velocity = trade_count as f64 / 60.0;

    let buckets = item_repo::volume_minutes_since(pool, item.id, one_day_ago).await?;
    let volume_spike = volume_spike_from_buckets(&buckets, one_hour_ago);

    let price_momentum = item.price_change_24h / 100.0;

    let comments = item_repo::count_comments_since(pool, item.id, one_hour_ago).await?;
    let likes = item_repo::count_likes_since(pool, item.id, one_hour_ago).await?;
    let social_activity = (comments + likes) as f64;

    let holders = item_repo::holder_count(pool, item.id).await?;
    let holder_momentum = if holders > 0 { holders as f64 / 10.0 } else { 0.0 };

    let cross_market_corr = cross_market_correlation(pool, item, one_hour_ago).await?;

    Ok(TrendFactors {
        sentiment,
        trading_velocity,
        volume_spike,
        price_momentum,
        social_activity,
        holder_momentum,
        cross_market_corr,
    })
}

/// Signed deviation of the last hour's volume from the 24h per-bucket
/// average; 0 when there is no baseline.
fn volume_spike_from_buckets(
    buckets: &[VolumeMinute],
    one_hour_ago: chrono::DateTime<Utc>,
) -> f64 {
    if buckets.is_empty() {
        return 0.0;
    }

    let recent: f64 = buckets
        .iter()
        .filter(|b| b.minute >= one_hour_ago)
        .map(|b| decimal_to_f64(b.volume))
        .sum();

    let total: f64 = buckets.iter().map(|b| decimal_to_f64(b.volume)).sum();
    let average = total / buckets.len() as f64;

    if average > 0.0 {
        (recent - average) / average
    } else {
        0.0
    }
}

/// Average Pearson correlation of this item's per-minute volume series
/// against the top peers by 24h volume; 0 when no comparable series exist.
async fn cross_market_correlation(
    pool: &PgPool,
    item: &Item,
    since: chrono::DateTime<Utc>,
) -> anyhow::Result<f64> {
    let peer_ids = item_repo::top_volume_item_ids(pool, item.id, CORRELATION_PEERS).await?;
    if peer_ids.is_empty() {
        return Ok(0.0);
    }

    let own_series = series_f64(&item_repo::volume_minutes_since(pool, item.id, since).await?);
    if own_series.is_empty() {
        return Ok(0.0);
    }

    let mut sum = 0.0;
    let mut compared = 0u32;
    for peer_id in &peer_ids {
        let peer_series =
            series_f64(&item_repo::volume_minutes_since(pool, *peer_id, since).await?);
        if peer_series.is_empty() {
            continue;
        }
        sum += pearson(&own_series, &peer_series);
        compared += 1;
    }

    if compared == 0 {
        Ok(0.0)
    } else {
        Ok(sum / compared as f64)
    }
}

fn series_f64(buckets: &[VolumeMinute]) -> Vec<f64> {
    buckets.iter().map(|b| decimal_to_f64(b.volume)).collect()
}

fn decimal_to_f64(d: Decimal) -> f64 {
    d.to_f64().unwrap_or(0.0)
}

/// Pearson correlation coefficient over the index-aligned prefix of the two
/// series; 0 when either series is flat or empty.
pub fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n == 0 {
        return 0.0;
    }

    let mean_a: f64 = a.iter().take(n).sum::<f64>() / n as f64;
    let mean_b: f64 = b.iter().take(n).sum::<f64>() / n as f64;

    let mut numerator = 0.0;
    let mut denom_a = 0.0;
    let mut denom_b = 0.0;
    for i in 0..n {
        let da = a[i] - mean_a;
        let db = b[i] - mean_b;
        numerator += da * db;
        denom_a += da * da;
        denom_b += db * db;
    }

    let denominator = (denom_a * denom_b).sqrt();
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn bucket(minutes_ago: i64, volume: i64) -> VolumeMinute {
        VolumeMinute {
            item_id: Uuid::nil(),
            minute: Utc::now() - Duration::minutes(minutes_ago),
            volume: Decimal::from(volume),
        }
    }

    #[test]
    fn pearson_perfectly_correlated() {
        let a = [1.0, 2.0, 3.0, 4.0];
        let b = [2.0, 4.0, 6.0, 8.0];
        assert!((pearson(&a, &b) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn pearson_anti_correlated() {
        let a = [1.0, 2.0, 3.0];
        let b = [3.0, 2.0, 1.0];
        assert!((pearson(&a, &b) + 1.0).abs() < 1e-9);
    }

    #[test]
    fn pearson_flat_series_is_zero() {
        let a = [5.0, 5.0, 5.0];
        let b = [1.0, 2.0, 3.0];
        assert_eq!(pearson(&a, &b), 0.0);
        assert_eq!(pearson(&[], &b), 0.0);
    }

    #[test]
    fn pearson_aligns_on_shorter_series() {
        let a = [1.0, 2.0, 3.0, 100.0, -50.0];
        let b = [2.0, 4.0, 6.0];
        assert!((pearson(&a, &b) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn volume_spike_positive_when_recent_volume_exceeds_average() {
        let one_hour_ago = Utc::now() - Duration::hours(1);
        // 30 recent buckets of 10, 90 older buckets of 1:
        // recent = 300, average = (300 + 90) / 120 = 3.25
        let mut buckets: Vec<VolumeMinute> = (0..30).map(|i| bucket(i, 10)).collect();
        buckets.extend((70..160).map(|i| bucket(i, 1)));

        let spike = volume_spike_from_buckets(&buckets, one_hour_ago);
        assert!(spike > 0.0);
        assert!((spike - (300.0 - 3.25) / 3.25).abs() < 1e-9);
    }

    #[test]
    fn volume_spike_zero_without_baseline() {
        let one_hour_ago = Utc::now() - Duration::hours(1);
        assert_eq!(volume_spike_from_buckets(&[], one_hour_ago), 0.0);

        let zeros: Vec<VolumeMinute> = (0..10).map(|i| bucket(i, 0)).collect();
        assert_eq!(volume_spike_from_buckets(&zeros, one_hour_ago), 0.0);
    }
}
