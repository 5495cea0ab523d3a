// src/metrics/prom.rs
//! A concrete sink backed by the Prometheus crate. Each instance owns its
//! registry, so several servers (or tests) never share counters.

use anyhow::{Context, Result};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::fmt;

use super::MetricsSink;

#[derive(Clone)]
pub struct PrometheusMetrics {
    registry: Registry,
    requests_total: IntCounterVec,
    request_duration: HistogramVec,
    tool_calls_total: IntCounterVec,
    tool_call_duration: HistogramVec,
    parse_errors_total: IntCounter,
    notifications_total: IntCounterVec,
}

impl PrometheusMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            Opts::new("zetmem_mcp_requests_total", "Total number of MCP requests handled"),
            &["method", "outcome"],
        )?;
        let request_duration = HistogramVec::new(
            HistogramOpts::new(
                "zetmem_mcp_request_duration_seconds",
                "MCP request handling latency",
            ),
            &["method"],
        )?;
        let tool_calls_total = IntCounterVec::new(
            Opts::new("zetmem_tool_calls_total", "Total number of tool executions"),
            &["tool", "outcome"],
        )?;
        let tool_call_duration = HistogramVec::new(
            HistogramOpts::new("zetmem_tool_call_duration_seconds", "Tool execution latency")
                .buckets(vec![0.005, 0.025, 0.1, 0.5, 1.0, 5.0, 30.0, 120.0]),
            &["tool"],
        )?;
        let parse_errors_total = IntCounter::new(
            "zetmem_mcp_parse_errors_total",
            "Total number of frames that were not valid JSON-RPC",
        )?;
        let notifications_total = IntCounterVec::new(
            Opts::new("zetmem_mcp_notifications_total", "Total number of notifications received"),
            &["method"],
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(request_duration.clone()))?;
        registry.register(Box::new(tool_calls_total.clone()))?;
        registry.register(Box::new(tool_call_duration.clone()))?;
        registry.register(Box::new(parse_errors_total.clone()))?;
        registry.register(Box::new(notifications_total.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            request_duration,
            tool_calls_total,
            tool_call_duration,
            parse_errors_total,
            notifications_total,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The registry in the Prometheus text exposition format.
    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .context("Failed to encode metrics")?;
        String::from_utf8(buffer).context("Metrics output was not UTF-8")
    }
}

impl fmt::Debug for PrometheusMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrometheusMetrics")
            .field("families", &self.registry.gather().len())
            .finish()
    }
}

impl MetricsSink for PrometheusMetrics {
    fn observe_dispatch(&self, method: &str, outcome: &str, duration_secs: f64) {
        self.requests_total.with_label_values(&[method, outcome]).inc();
        self.request_duration
            .with_label_values(&[method])
            .observe(duration_secs);
    }

    fn observe_tool_call(&self, tool: &str, outcome: &str, duration_secs: f64) {
        self.tool_calls_total.with_label_values(&[tool, outcome]).inc();
        self.tool_call_duration
            .with_label_values(&[tool])
            .observe(duration_secs);
    }

    fn inc_parse_errors(&self) {
        self.parse_errors_total.inc();
    }

    fn inc_notifications(&self, method: &str) {
        self.notifications_total.with_label_values(&[method]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_by_label() {
        let metrics = PrometheusMetrics::new().unwrap();
        metrics.observe_dispatch("tools/call", "ok", 0.01);
        metrics.observe_dispatch("tools/call", "ok", 0.02);
        metrics.observe_dispatch("tools/call", "method_not_found", 0.001);
        metrics.observe_tool_call("strategy_guide", "ok", 0.003);
        metrics.inc_parse_errors();
        metrics.inc_notifications("notifications/initialized");

        assert_eq!(
            metrics.requests_total.with_label_values(&["tools/call", "ok"]).get(),
            2
        );
        assert_eq!(
            metrics
                .requests_total
                .with_label_values(&["tools/call", "method_not_found"])
                .get(),
            1
        );
        assert_eq!(
            metrics
                .tool_calls_total
                .with_label_values(&["strategy_guide", "ok"])
                .get(),
            1
        );
        assert_eq!(
            metrics
                .request_duration
                .with_label_values(&["tools/call"])
                .get_sample_count(),
            3
        );
        assert_eq!(metrics.parse_errors_total.get(), 1);
    }

    #[test]
    fn instances_do_not_share_state() {
        let first = PrometheusMetrics::new().unwrap();
        let second = PrometheusMetrics::new().unwrap();
        first.inc_parse_errors();
        assert_eq!(second.parse_errors_total.get(), 0);
    }

    #[test]
    fn renders_text_exposition() {
        let metrics = PrometheusMetrics::new().unwrap();
        metrics.observe_tool_call("strategy_guide", "ok", 0.5);
        assert!(metrics
            .registry()
            .gather()
            .iter()
            .any(|family| family.get_name() == "zetmem_tool_calls_total"));
        let text = metrics.render().unwrap();
        assert!(text.contains("zetmem_tool_calls_total"));
        assert!(text.contains("strategy_guide"));
    }
}
