//! Prometheus metrics for HTTP traffic and the verification funnel.

use prometheus::{
    CounterVec, Gauge, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};
use std::time::{Duration, Instant};

/// Application metrics collector for Prometheus integration
#[derive(Clone)]
pub struct AppMetrics {
    pub registry: Registry,
    pub http_requests_total: CounterVec,
    pub http_request_duration_seconds: HistogramVec,
    pub app_uptime_seconds: Gauge,
    pub otp_sent_total: IntCounter,
    pub otp_verifications_total: IntCounterVec,
    pub leads_total: IntCounterVec,
    pub rate_limit_rejections_total: IntCounterVec,
    pub rate_limit_store_failures_total: IntCounter,
    start_time: Instant,
}

impl AppMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let http_requests_total = CounterVec::new(
            Opts::new("http_requests_total", "Total number of HTTP requests"),
            &["method", "status", "route"],
        )?;
        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "HTTP request duration in seconds",
            )
            .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
            &["method", "route"],
        )?;
        let app_uptime_seconds = Gauge::new("app_uptime_seconds", "Application uptime in seconds")?;
        let otp_sent_total = IntCounter::new("otp_sent_total", "Verification codes issued")?;
        let otp_verifications_total = IntCounterVec::new(
            Opts::new("otp_verifications_total", "Verification attempts by outcome"),
            &["outcome"],
        )?;
        let leads_total = IntCounterVec::new(
            Opts::new("leads_total", "Lead submissions by outcome"),
            &["outcome"],
        )?;
        let rate_limit_rejections_total = IntCounterVec::new(
            Opts::new("rate_limit_rejections_total", "Requests denied per policy"),
            &["policy"],
        )?;
        let rate_limit_store_failures_total = IntCounter::new(
            "rate_limit_store_failures_total",
            "Counter store errors answered by failing open",
        )?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;
        registry.register(Box::new(app_uptime_seconds.clone()))?;
        registry.register(Box::new(otp_sent_total.clone()))?;
        registry.register(Box::new(otp_verifications_total.clone()))?;
        registry.register(Box::new(leads_total.clone()))?;
        registry.register(Box::new(rate_limit_rejections_total.clone()))?;
        registry.register(Box::new(rate_limit_store_failures_total.clone()))?;

        Ok(Self {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            app_uptime_seconds,
            otp_sent_total,
            otp_verifications_total,
            leads_total,
            rate_limit_rejections_total,
            rate_limit_store_failures_total,
            start_time: Instant::now(),
        })
    }

    /// Record an HTTP request with method, route, status, and duration
    pub fn record_request(&self, method: &str, route: &str, status: u16, duration: Duration) {
        if route == "/api/metrics" {
            return;
        }

        let status = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, status.as_str(), route])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, route])
            .observe(duration.as_secs_f64());
    }

    pub fn record_otp_sent(&self) {
        self.otp_sent_total.inc();
    }

    /// `outcome` is one of `verified`, `invalid`, `expired`
    pub fn record_verification(&self, outcome: &str) {
        self.otp_verifications_total
            .with_label_values(&[outcome])
            .inc();
    }

    pub fn record_lead(&self, outcome: &str) {
        self.leads_total.with_label_values(&[outcome]).inc();
    }

    pub fn record_rate_limited(&self, policy: &str) {
        self.rate_limit_rejections_total
            .with_label_values(&[policy])
            .inc();
    }

    pub fn record_rate_limit_store_failure(&self) {
        self.rate_limit_store_failures_total.inc();
    }

    /// Render metrics in Prometheus text format
    pub fn render(&self) -> Result<String, prometheus::Error> {
        self.app_uptime_seconds
            .set(self.start_time.elapsed().as_secs_f64());
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }
}
