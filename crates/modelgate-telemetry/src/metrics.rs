//! Prometheus metrics for the gateway.
//!
//! Provides metrics for:
//! - Request counts and latencies by tenant, provider, and outcome
//! - Cache operations
//! - Provider errors and circuit breaker state
//! - Budget denials and per-tenant spend

use prometheus::{
    CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::time::Duration;

/// Default latency histogram buckets, in seconds
const LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0,
];

/// Main metrics registry and collectors
pub struct Metrics {
    registry: Registry,
    /// Requests by tenant, provider, outcome, and cache disposition
    requests_total: CounterVec,
    /// End-to-end request latency
    request_duration: HistogramVec,
    /// Cache lookups and stores
    cache_operations: CounterVec,
    /// Provider failures by error type
    provider_errors: CounterVec,
    /// Circuit breaker state per provider (0 closed, 1 half-open, 2 open)
    circuit_breaker_state: GaugeVec,
    /// Authorizations denied by the budget manager
    budget_denials: CounterVec,
    /// Settled spend per tenant this period, in USD
    tenant_spend_usd: GaugeVec,
}

impl Metrics {
    /// Create a new metrics instance
    ///
    /// # Errors
    /// Returns error if metrics cannot be registered
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests_total = CounterVec::new(
            Opts::new("requests_total", "Total number of requests").namespace("modelgate"),
            &["tenant", "provider", "status", "cache"],
        )?;
        registry.register(Box::new(requests_total.clone()))?;

        let request_duration = HistogramVec::new(
            HistogramOpts::new("request_duration_seconds", "Request latency in seconds")
                .namespace("modelgate")
                .buckets(LATENCY_BUCKETS.to_vec()),
            &["provider", "cache"],
        )?;
        registry.register(Box::new(request_duration.clone()))?;

        let cache_operations = CounterVec::new(
            Opts::new("cache_operations_total", "Cache lookups and stores")
                .namespace("modelgate"),
            &["operation", "result"],
        )?;
        registry.register(Box::new(cache_operations.clone()))?;

        let provider_errors = CounterVec::new(
            Opts::new("provider_errors_total", "Provider failures by error type")
                .namespace("modelgate"),
            &["provider", "error_type"],
        )?;
        registry.register(Box::new(provider_errors.clone()))?;

        let circuit_breaker_state = GaugeVec::new(
            Opts::new(
                "circuit_breaker_state",
                "Circuit breaker state (0=closed, 1=half_open, 2=open)",
            )
            .namespace("modelgate"),
            &["provider"],
        )?;
        registry.register(Box::new(circuit_breaker_state.clone()))?;

        let budget_denials = CounterVec::new(
            Opts::new("budget_denials_total", "Authorizations denied by budget")
                .namespace("modelgate"),
            &["tenant"],
        )?;
        registry.register(Box::new(budget_denials.clone()))?;

        let tenant_spend_usd = GaugeVec::new(
            Opts::new("tenant_spend_usd", "Settled tenant spend this period in USD")
                .namespace("modelgate"),
            &["tenant"],
        )?;
        registry.register(Box::new(tenant_spend_usd.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            request_duration,
            cache_operations,
            provider_errors,
            circuit_breaker_state,
            budget_denials,
            tenant_spend_usd,
        })
    }

    /// Record a completed request
    pub fn record_request(
        &self,
        tenant: &str,
        provider: &str,
        status: &str,
        cache_hit: bool,
        latency: Duration,
    ) {
        let cache = if cache_hit { "hit" } else { "miss" };
        self.requests_total
            .with_label_values(&[tenant, provider, status, cache])
            .inc();
        self.request_duration
            .with_label_values(&[provider, cache])
            .observe(latency.as_secs_f64());
    }

    /// Record a cache operation outcome
    pub fn record_cache_operation(&self, operation: &str, result: &str) {
        self.cache_operations
            .with_label_values(&[operation, result])
            .inc();
    }

    /// Record a provider failure
    pub fn record_provider_error(&self, provider: &str, error_type: &str) {
        self.provider_errors
            .with_label_values(&[provider, error_type])
            .inc();
    }

    /// Record the current breaker state for a provider
    pub fn set_circuit_breaker_state(&self, provider: &str, state: f64) {
        self.circuit_breaker_state
            .with_label_values(&[provider])
            .set(state);
    }

    /// Record a budget denial
    pub fn record_budget_denial(&self, tenant: &str) {
        self.budget_denials.with_label_values(&[tenant]).inc();
    }

    /// Record a tenant's settled spend
    pub fn set_tenant_spend(&self, tenant: &str, spend_usd: f64) {
        self.tenant_spend_usd
            .with_label_values(&[tenant])
            .set(spend_usd);
    }

    /// Render all metrics in Prometheus text exposition format
    ///
    /// # Errors
    /// Returns error if encoding fails
    pub fn gather(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
