// metrics/mod.rs
use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

pub fn setup_metrics(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("Failed to setup metrics")?;

    metrics::describe_counter!("bridge_calls_total", "Bridge calls by method and outcome");
    metrics::describe_histogram!(
        "bridge_call_duration_seconds",
        metrics::Unit::Seconds,
        "Time spent completing a bridge call"
    );
    metrics::describe_gauge!("bridge_sessions", "Open bridge sessions");
    Ok(())
}
