//! Prometheus Metrics Registry - Trade Engine Observability
//!
//! All metrics follow the naming convention `trade_engine_*`. They are
//! rendered in the text exposition format by `/metrics` on the main
//! HTTP listener.

use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

use crate::usecases::SweepReport;

/// Centralized Prometheus metrics for the trade engine.
pub struct MetricsRegistry {
    registry: Registry,
    /// Routed HTTP requests by matched route, method and status.
    pub http_requests: IntCounterVec,
    /// Routed HTTP latency (seconds) by matched route.
    pub http_latency_seconds: HistogramVec,
    /// Bids closed, by what triggered the close.
    pub bids_closed: IntCounterVec,
    /// Per-bid sweep outcomes (closed, skipped, failed).
    pub sweep_bids: IntCounterVec,
    /// Wall time of one sweep pass (seconds).
    pub sweep_duration_seconds: Histogram,
}

impl MetricsRegistry {
    /// Create and register all Prometheus metrics.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let http_requests = IntCounterVec::new(
            Opts::new("trade_engine_http_requests_total", "Routed HTTP requests"),
            &["route", "method", "status"],
        )?;

        let http_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "trade_engine_http_latency_seconds",
                "Routed HTTP request latency in seconds",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 1.0]),
            &["route"],
        )?;

        let bids_closed = IntCounterVec::new(
            Opts::new("trade_engine_bids_closed_total", "Bids closed"),
            &["trigger"],
        )?;

        let sweep_bids = IntCounterVec::new(
            Opts::new(
                "trade_engine_sweep_bids_total",
                "Expired bids handled by the sweep, by outcome",
            ),
            &["outcome"],
        )?;

        let sweep_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "trade_engine_sweep_duration_seconds",
                "Duration of one expired-bid sweep in seconds",
            )
            .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        )?;

        registry.register(Box::new(http_requests.clone()))?;
        registry.register(Box::new(http_latency_seconds.clone()))?;
        registry.register(Box::new(bids_closed.clone()))?;
        registry.register(Box::new(sweep_bids.clone()))?;
        registry.register(Box::new(sweep_duration_seconds.clone()))?;

        Ok(Self {
            registry,
            http_requests,
            http_latency_seconds,
            bids_closed,
            sweep_bids,
            sweep_duration_seconds,
        })
    }

    /// Fold a sweep report into the counters.
    pub fn observe_sweep(&self, report: &SweepReport, elapsed_secs: f64) {
        self.sweep_duration_seconds.observe(elapsed_secs);
        for (outcome, count) in [
            ("closed", report.closed.len()),
            ("skipped", report.skipped.len()),
            ("failed", report.failed.len()),
        ] {
            self.sweep_bids
                .with_label_values(&[outcome])
                .inc_by(count as u64);
        }
        self.bids_closed
            .with_label_values(&["scheduler"])
            .inc_by(report.closed.len() as u64);
    }

    /// Text exposition of every registered metric.
    pub fn render(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
