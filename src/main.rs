use std::sync::Arc;

use trendoracle::api::router::create_router;
use trendoracle::config::AppConfig;
use trendoracle::db;
use trendoracle::ingestion::run_event_listener;
use trendoracle::intelligence::InferenceClient;
use trendoracle::ledger::{LedgerAuth, LedgerClient};
use trendoracle::metrics::init_metrics;
use trendoracle::resilience::CircuitBreaker;
use trendoracle::services::flash_lifecycle::{run_expiry_poller, run_spike_scanner};
use trendoracle::services::notifier::NotificationBus;
use trendoracle::services::spike_detector::VelocitySpikeDetector;
use trendoracle::services::trend_orchestrator::{OrchestratorConfig, TrendOrchestrator};
use trendoracle::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    let addr = format!("{}:{}", config.host, config.port);
    let metrics_handle = init_metrics();

    tracing::info!("Connecting to database...");
    let pool = db::init_pool(&config.database_url).await?;
    tracing::info!("Database connected");

    let http = reqwest::Client::new();

    // --- External clients ---
    let breaker = CircuitBreaker::new(config.breaker_threshold, config.breaker_timeout());
    let inference = Arc::new(InferenceClient::new(
        http.clone(),
        config.inference_url.clone(),
        config.inference_api_key.clone(),
        config.inference_model.clone(),
        Arc::clone(&breaker),
    ));

    let ledger_auth = if config.has_ledger_auth() {
        Some(LedgerAuth::new(
            config.ledger_api_key.clone().unwrap(),
            config.ledger_api_secret.clone().unwrap(),
        ))
    } else {
        tracing::warn!("No ledger oracle credentials — ledger writes will be skipped");
        None
    };
    let ledger = Arc::new(LedgerClient::new(
        http,
        config.ledger_rpc_url.clone(),
        ledger_auth,
    ));

    let bus = NotificationBus::new(256);

    // --- Trend orchestrator: periodic scoring cycles ---
    let orchestrator = TrendOrchestrator::new(
        pool.clone(),
        Arc::clone(&inference),
        Arc::clone(&ledger),
        OrchestratorConfig {
            update_interval: config.update_interval(),
            active_threshold_hours: config.active_market_threshold_hours,
            cache_ttl: config.cache_ttl(),
            batch_size: config.batch_size,
        },
    );
    orchestrator.start();

    // --- Flash markets: spike scan + expiry resolution ---
    let detector = Arc::new(VelocitySpikeDetector::new(
        config.velocity_threshold,
        config.spike_cooldown(),
    ));
    tokio::spawn(run_spike_scanner(
        pool.clone(),
        detector,
        Arc::clone(&ledger),
        bus.clone(),
    ));
    tokio::spawn(run_expiry_poller(pool.clone(), Arc::clone(&ledger)));

    // --- Ledger event ingestion: statistics refresh triggers ---
    tokio::spawn(run_event_listener(config.ledger_ws_url.clone(), pool.clone()));

    let state = AppState {
        db: pool.clone(),
        config,
        bus,
        metrics_handle,
        orchestrator: Arc::clone(&orchestrator),
        breaker,
        ledger,
    };
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {addr}");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // In-flight updates were allowed to finish; cancel timers and flush.
    orchestrator.stop();
    pool.close().await;
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();
}
