use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use chrono::Utc;
use futures_util::future::join_all;
use metrics::{counter, gauge, histogram};
use sqlx::PgPool;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, Instant};
use uuid::Uuid;

use crate::db::{item_repo, trend_repo};
use crate::intelligence::{collect_factors, InferenceClient, InferenceError, MarketContext};
use crate::ledger::LedgerClient;
use crate::models::{Item, Priority, TrendResult};
use crate::resilience::cache::SWEEP_INTERVAL;
use crate::resilience::{FetchError, ResilientCache};

/// Delay before the immediate first update run after start.
const STARTUP_DELAY: Duration = Duration::from_secs(5);
/// Pause between update batches to bound external-call rate.
const BATCH_PAUSE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub update_interval: Duration,
    pub active_threshold_hours: i64,
    pub cache_ttl: Duration,
    pub batch_size: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            update_interval: Duration::from_secs(5 * 60),
            active_threshold_hours: 1,
            cache_ttl: Duration::from_secs(5 * 60),
            batch_size: 5,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct OrchestratorStatus {
    pub started: bool,
    pub tick_in_flight: bool,
    pub cached_results: usize,
}

/// Scheduler for periodic trend scoring.
///
/// Every `update_interval` (plus one immediate run shortly after start) it
/// selects stale or active items, scores them in fixed-size concurrent
/// batches through collector → inference, persists the results, and pushes
/// scores toward the ledger best-effort. A single item's failure is logged
/// and skipped; it never aborts the batch or the timer.
pub struct TrendOrchestrator {
    pool: PgPool,
    inference: Arc<InferenceClient>,
    ledger: Arc<LedgerClient>,
    cache: Arc<ResilientCache<TrendResult>>,
    config: OrchestratorConfig,
    tick_running: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    self_ref: Weak<TrendOrchestrator>,
}

impl TrendOrchestrator {
    pub fn new(
        pool: PgPool,
        inference: Arc<InferenceClient>,
        ledger: Arc<LedgerClient>,
        config: OrchestratorConfig,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            pool,
            inference,
            ledger,
            cache: Arc::new(ResilientCache::new()),
            config,
            tick_running: AtomicBool::new(false),
            tasks: Mutex::new(Vec::new()),
            self_ref: weak.clone(),
        })
    }

    /// Spawn the update timer and the cache sweeper.
    pub fn start(&self) {
        Arc::clone(&self.cache).start_sweeper(SWEEP_INTERVAL);

        let Some(orchestrator) = self.self_ref.upgrade() else {
            return;
        };
        let update_interval = self.config.update_interval;
        let handle = tokio::spawn(async move {
            sleep(STARTUP_DELAY).await;
            orchestrator.tick().await;

            let mut ticker = interval(update_interval);
            ticker.tick().await; // consume the immediate tick
            loop {
                ticker.tick().await;
                orchestrator.tick().await;
            }
        });

        self.tasks
            .lock()
            .expect("orchestrator task lock poisoned")
            .push(handle);

        tracing::info!(
            interval_secs = update_interval.as_secs(),
            batch_size = self.config.batch_size,
            "Trend orchestrator started"
        );
    }

    /// Cancel timers and the cache sweeper. Safe to call multiple times;
    /// in-flight item updates complete and their results are still persisted.
    pub fn stop(&self) {
        let mut tasks = self.tasks.lock().expect("orchestrator task lock poisoned");
        for task in tasks.drain(..) {
            task.abort();
        }
        self.cache.stop();
        self.inference.breaker().shutdown();
        tracing::info!("Trend orchestrator stopped");
    }

    pub fn status(&self) -> OrchestratorStatus {
        OrchestratorStatus {
            started: !self
                .tasks
                .lock()
                .expect("orchestrator task lock poisoned")
                .is_empty(),
            tick_in_flight: self.tick_running.load(Ordering::SeqCst),
            cached_results: self.cache.len(),
        }
    }

    /// One full update cycle. Reentrancy-guarded: an overlapping timer fire
    /// is skipped rather than run concurrently with itself.
    pub async fn tick(&self) {
        if self.tick_running.swap(true, Ordering::SeqCst) {
            tracing::warn!("Update cycle still running, skipping this tick");
            return;
        }

        if let Err(e) = self.run_cycle().await {
            tracing::error!(error = %e, "Update cycle failed");
        }

        self.tick_running.store(false, Ordering::SeqCst);
    }

    async fn run_cycle(&self) -> anyhow::Result<()> {
        let started = Instant::now();
        let mut candidates =
            item_repo::get_update_candidates(&self.pool, self.config.active_threshold_hours)
                .await?;

        if candidates.is_empty() {
            tracing::debug!("No items due for a trend update");
            return Ok(());
        }

        // Priority informs ordering and logging; execution within a batch is
        // priority-agnostic.
        candidates.sort_by_key(priority_for);

        let context = MarketContext {
            active_markets: candidates.len() as i64,
            ..MarketContext::default()
        };

        tracing::info!(
            candidates = candidates.len(),
            high = candidates
                .iter()
                .filter(|i| priority_for(i) == Priority::High)
                .count(),
            "Starting trend update cycle"
        );

        let mut updated = 0usize;
        let mut failed = 0usize;
        let batch_count = candidates.len().div_ceil(self.config.batch_size);

        for (index, batch) in candidates.chunks(self.config.batch_size).enumerate() {
            let results = join_all(batch.iter().map(|item| {
                let context = context.clone();
                async move {
                    self.update_item_trend(item, false, &context)
                        .await
                        .map_err(|e| (item.id, e))
                }
            }))
            .await;

            for result in results {
                match result {
                    Ok(_) => updated += 1,
                    Err((item_id, e)) => {
                        failed += 1;
                        counter!("trend_update_failures_total").increment(1);
                        tracing::warn!(error = %e, item_id = %item_id, "Item update skipped");
                    }
                }
            }

            if index + 1 < batch_count {
                sleep(BATCH_PAUSE).await;
            }
        }

        gauge!("trend_cache_entries").set(self.cache.len() as f64);
        histogram!("trend_cycle_seconds").record(started.elapsed().as_secs_f64());
        tracing::info!(updated, failed, "Trend update cycle completed");

        Ok(())
    }

    /// Score one item, serving from the short-TTL cache unless forced.
    ///
    /// On a cache miss this runs collector → inference, persists the result
    /// (latest state + history append) and pushes the score to the ledger
    /// best-effort.
    pub async fn update_item_trend(
        &self,
        item: &Item,
        force: bool,
        context: &MarketContext,
    ) -> Result<TrendResult, FetchError> {
        let key = item.id.to_string();
        if force {
            self.cache.invalidate(&key);
        }

        let pool = self.pool.clone();
        let inference = Arc::clone(&self.inference);
        let ledger = Arc::clone(&self.ledger);
        let item = item.clone();
        let context = context.clone();

        self.cache
            .get_or_fetch(&key, self.config.cache_ttl, move || {
                let pool = pool.clone();
                let inference = Arc::clone(&inference);
                let ledger = Arc::clone(&ledger);
                let item = item.clone();
                let context = context.clone();
                async move {
                    compute_and_persist(&pool, &inference, &ledger, &item, &context).await
                }
            })
            .await
    }

    /// Forced single-item update, used by the control API. Returns `None`
    /// when the item does not exist.
    pub async fn force_update(&self, item_id: Uuid) -> Result<Option<TrendResult>, FetchError> {
        let item = item_repo::get_item(&self.pool, item_id)
            .await
            .map_err(|e| FetchError::Upstream(e.to_string()))?;

        match item {
            Some(item) => {
                let context = MarketContext::default();
                let result = self.update_item_trend(&item, true, &context).await?;
                Ok(Some(result))
            }
            None => Ok(None),
        }
    }
}

/// One full scoring pass for an item: collect factors, score through the
/// inference client, persist latest state + history, push on-ledger.
async fn compute_and_persist(
    pool: &PgPool,
    inference: &InferenceClient,
    ledger: &LedgerClient,
    item: &Item,
    context: &MarketContext,
) -> Result<TrendResult, FetchError> {
    let started = Instant::now();

    let factors = collect_factors(pool, inference, item)
        .await
        .map_err(|e| FetchError::Upstream(format!("factor collection: {e}")))?;

    let result = inference
        .score_trend(item.id, factors, context)
        .await
        .map_err(|e| match e {
            InferenceError::RateLimited => FetchError::RateLimited(e.to_string()),
            other => FetchError::Upstream(other.to_string()),
        })?;

    let velocity = velocity_per_minute(item, &result);

    trend_repo::update_latest(pool, item.id, &result, velocity)
        .await
        .map_err(|e| FetchError::Upstream(format!("persist latest: {e}")))?;
    trend_repo::append_history(pool, item.id, &result)
        .await
        .map_err(|e| FetchError::Upstream(format!("append history: {e}")))?;

    // Ledger push is best-effort and never fails the update.
    if let Some(account) = item.ledger_account.as_deref() {
        if let Err(e) = ledger
            .push_trend_score(account, result.score, &result.factors)
            .await
        {
            counter!("ledger_push_failures_total").increment(1);
            tracing::warn!(error = %e, item_id = %item.id, "Ledger score push failed");
        }
    }

    counter!("trend_updates_total").increment(1);
    histogram!("trend_update_seconds").record(started.elapsed().as_secs_f64());
    tracing::info!(
        item_id = %item.id,
        score = result.score,
        confidence = result.confidence,
        "Trend updated"
    );

    Ok(result)
}

/// Points-per-minute score change versus the item's previous latest state;
/// 0 for the first ever update.
fn velocity_per_minute(item: &Item, result: &TrendResult) -> f64 {
    match item.last_trend_update {
        Some(previous) => {
            let minutes = (result.timestamp - previous).num_seconds() as f64 / 60.0;
            if minutes > 0.0 {
                (result.score - item.trend_score) / minutes
            } else {
                0.0
            }
        }
        None => 0.0,
    }
}

/// Update urgency for an item, from 24h volume and staleness.
pub fn priority_for(item: &Item) -> Priority {
    use rust_decimal::prelude::ToPrimitive;

    let volume = item.volume_24h.to_f64().unwrap_or(0.0);
    let staleness_hours = match item.last_trend_update {
        Some(last) => (Utc::now() - last).num_seconds() as f64 / 3600.0,
        None => return Priority::High,
    };

    if volume > 10.0 || staleness_hours > 2.0 {
        Priority::High
    } else if volume > 1.0 || staleness_hours > 1.0 {
        Priority::Medium
    } else {
        Priority::Low
    }
}
