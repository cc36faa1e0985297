use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus exporter and register all application metrics.
/// Returns a `PrometheusHandle` whose `render()` method produces the
/// text/plain Prometheus scrape payload.
pub fn init_metrics() -> PrometheusHandle {
    let builder = PrometheusBuilder::new();
    let handle = builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // Pre-register counters so they appear even before the first increment.
    counter!("trend_updates_total").absolute(0);
    counter!("trend_update_failures_total").absolute(0);
    counter!("spike_detections_total").absolute(0);
    counter!("flash_markets_created").absolute(0);
    counter!("flash_markets_resolved").absolute(0);
    counter!("ledger_push_failures_total").absolute(0);
    counter!("ledger_events_total").absolute(0);

    // Pre-register gauges at zero.
    gauge!("trend_cache_entries").set(0.0);

    // Histograms are lazily created on first record; force creation.
    histogram!("trend_update_seconds").record(0.0);
    histogram!("trend_cycle_seconds").record(0.0);

    handle
}
