pub mod api;
pub mod config;
pub mod db;
pub mod errors;
pub mod ingestion;
pub mod intelligence;
pub mod ledger;
pub mod metrics;
pub mod models;
pub mod pricing;
pub mod resilience;
pub mod services;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::ledger::LedgerClient;
use crate::resilience::CircuitBreaker;
use crate::services::notifier::NotificationBus;
use crate::services::trend_orchestrator::TrendOrchestrator;

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub config: AppConfig,
    pub bus: NotificationBus,
    pub metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
    pub orchestrator: Arc<TrendOrchestrator>,
    pub breaker: Arc<CircuitBreaker>,
    pub ledger: Arc<LedgerClient>,
}
