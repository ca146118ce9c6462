//! Prometheus metrics setup and metric definitions

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return a handle for rendering metrics.
pub fn install_prometheus_recorder() -> PrometheusHandle {
    let buckets = vec![
        0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
    ];

    PrometheusBuilder::new()
        .set_buckets(&buckets)
        .expect("failed to set histogram buckets")
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

/// Register metric descriptions and emit zero values so HELP/TYPE lines are
/// present from startup, not only after the first increment.
pub fn describe_metrics() {
    // HTTP
    describe_counter!("reefline_http_requests_total", "Total number of HTTP requests");
    describe_histogram!(
        "reefline_http_request_duration_seconds",
        "HTTP request duration in seconds"
    );
    describe_gauge!(
        "reefline_http_requests_in_flight",
        "Number of HTTP requests currently being processed"
    );

    // Tenancy
    describe_counter!(
        "reefline_org_context_resolutions_total",
        "Organization context resolutions by outcome"
    );
    describe_counter!(
        "reefline_access_gate_rejections_total",
        "Requests stopped by the access gate, by reason"
    );
    describe_counter!(
        "reefline_csrf_violations_total",
        "State-changing requests with a missing or invalid CSRF token"
    );
    describe_counter!(
        "reefline_usage_query_failures_total",
        "Usage count queries that failed and were reported as zero"
    );
    describe_counter!(
        "reefline_org_scope_transactions_total",
        "Organization-scoped transactions by outcome"
    );

    gauge!("reefline_http_requests_in_flight").set(0.0);
    counter!("reefline_org_context_resolutions_total", "outcome" => "resolved").absolute(0);
    counter!("reefline_access_gate_rejections_total", "reason" => "deactivated").absolute(0);
    counter!("reefline_csrf_violations_total", "enforced" => "false").absolute(0);
    counter!("reefline_usage_query_failures_total", "query" => "bookings").absolute(0);
    counter!("reefline_org_scope_transactions_total", "outcome" => "committed").absolute(0);
}
