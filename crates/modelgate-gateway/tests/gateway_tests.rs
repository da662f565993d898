//! End-to-end pipeline tests against mock provider adapters.

use async_trait::async_trait;
use modelgate_config::GatewayConfig;
use modelgate_core::{
    CompletionRequest, CostTier, GatewayError, MaxTokens, ModelClass, ModelId, ModelListing,
    ModelProvider, ProviderCompletion, ProviderId, ProviderRequest, TenantId,
};
use modelgate_gateway::Orchestrator;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Scripted provider: fails its first `fail_first` calls with a
/// retryable upstream error, then succeeds.
struct MockProvider {
    id: ProviderId,
    models: Vec<ModelListing>,
    cost_usd: f64,
    fail_first: u32,
    delay: Option<Duration>,
    calls: AtomicU32,
}

impl MockProvider {
    fn new(id: &str, model: &str, class: ModelClass, tier: CostTier, cost_per_1k: f64) -> Self {
        Self {
            id: ProviderId::new(id).expect("valid provider id"),
            models: vec![ModelListing {
                id: ModelId::new(model).expect("valid model id"),
                class,
                tier,
                cost_per_1k_usd: cost_per_1k,
            }],
            cost_usd: cost_per_1k,
            fail_first: 0,
            delay: None,
            calls: AtomicU32::new(0),
        }
    }

    fn failing(mut self, count: u32) -> Self {
        self.fail_first = count;
        self
    }

    fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelProvider for MockProvider {
    fn id(&self) -> &ProviderId {
        &self.id
    }

    fn models(&self) -> &[ModelListing] {
        &self.models
    }

    async fn complete(&self, request: &ProviderRequest) -> Result<ProviderCompletion, GatewayError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if call < self.fail_first {
            return Err(GatewayError::provider(
                self.id.to_string(),
                "upstream returned 500",
                Some(500),
                true,
            ));
        }
        Ok(ProviderCompletion {
            content: format!("completion from {}", self.id),
            model: request.model.clone(),
            prompt_tokens: 10,
            completion_tokens: 20,
            billed_cost_usd: Some(self.cost_usd),
        })
    }
}

fn base_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.server.request_timeout = Duration::from_secs(5);
    config.pricing.baseline_per_1k_usd = 0.03;
    config
}

fn request(prompt: &str) -> CompletionRequest {
    CompletionRequest::builder()
        .prompt(prompt)
        .tenant_id(TenantId::new("acme").expect("valid tenant"))
        .max_tokens(MaxTokens::new(1000).expect("valid"))
        .build()
        .expect("valid request")
}

fn build(config: GatewayConfig, providers: Vec<Arc<MockProvider>>) -> Orchestrator {
    let mut builder = Orchestrator::builder(config);
    for provider in providers {
        builder = builder.provider(provider as Arc<dyn ModelProvider>);
    }
    builder.build().expect("orchestrator builds")
}

#[tokio::test]
async fn routes_to_cheapest_provider_and_settles_actual_cost() {
    let cheap = Arc::new(MockProvider::new(
        "cheap",
        "small-1",
        ModelClass::Standard,
        CostTier::Economy,
        0.01,
    ));
    let pricey = Arc::new(MockProvider::new(
        "pricey",
        "big-1",
        ModelClass::Standard,
        CostTier::Premium,
        0.99,
    ));
    let gateway = build(base_config(), vec![Arc::clone(&cheap), Arc::clone(&pricey)]);

    let response = gateway.handle(request("hello")).await.expect("success");
    assert_eq!(response.provider_id.as_str(), "cheap");
    assert!(!response.cache_hit);
    assert!((response.cost_usd - 0.01).abs() < 1e-9);
    assert_eq!(response.usage.total(), 30);
    assert_eq!(cheap.calls(), 1);
    assert_eq!(pricey.calls(), 0);

    let snapshot = gateway
        .budget_snapshot(&TenantId::new("acme").expect("valid tenant"))
        .expect("ledger exists");
    assert!((snapshot.spent_usd - 0.01).abs() < 1e-9);
    assert!(snapshot.reserved_usd.abs() < 1e-9);
}

#[tokio::test]
async fn identical_requests_hit_cache_and_charge_once() {
    let provider = Arc::new(MockProvider::new(
        "solo",
        "model-1",
        ModelClass::Standard,
        CostTier::Standard,
        0.02,
    ));
    let gateway = build(base_config(), vec![Arc::clone(&provider)]);

    let first = gateway.handle(request("same prompt")).await.expect("success");
    let second = gateway.handle(request("same prompt")).await.expect("success");

    assert!(!first.cache_hit);
    assert!(second.cache_hit);
    assert_eq!(second.content, first.content);
    assert!(second.cost_usd.abs() < 1e-9);
    assert_eq!(provider.calls(), 1);

    // Only the first call was billed
    let snapshot = gateway
        .budget_snapshot(&TenantId::new("acme").expect("valid tenant"))
        .expect("ledger exists");
    assert!((snapshot.spent_usd - 0.02).abs() < 1e-9);
}

#[tokio::test]
async fn failover_moves_to_next_provider_within_one_request() {
    let flaky = Arc::new(
        MockProvider::new("flaky", "m-a", ModelClass::Standard, CostTier::Economy, 0.001)
            .failing(100),
    );
    let steady = Arc::new(MockProvider::new(
        "steady",
        "m-b",
        ModelClass::Standard,
        CostTier::Standard,
        0.02,
    ));
    let gateway = build(base_config(), vec![Arc::clone(&flaky), Arc::clone(&steady)]);

    let response = gateway.handle(request("hello")).await.expect("failover succeeds");
    assert_eq!(response.provider_id.as_str(), "steady");
    assert_eq!(flaky.calls(), 1);
    assert_eq!(steady.calls(), 1);
}

#[tokio::test]
async fn breaker_opens_after_threshold_and_stops_calls() {
    let mut config = base_config();
    config.circuit_breaker.failure_threshold = 3;
    config.circuit_breaker.cooldown = Duration::from_secs(60);
    config.cache.enabled = false;

    let down = Arc::new(
        MockProvider::new("down", "m-a", ModelClass::Standard, CostTier::Economy, 0.001)
            .failing(1000),
    );
    let up = Arc::new(MockProvider::new(
        "up",
        "m-b",
        ModelClass::Standard,
        CostTier::Standard,
        0.02,
    ));
    let gateway = build(config, vec![Arc::clone(&down), Arc::clone(&up)]);

    // Each request fails over from `down` to `up`, charging one
    // breaker failure to `down` per request
    for i in 0..3 {
        let response = gateway
            .handle(request(&format!("prompt {i}")))
            .await
            .expect("failover succeeds");
        assert_eq!(response.provider_id.as_str(), "up");
    }
    assert_eq!(down.calls(), 3);

    // Circuit now open: `down` is filtered out before dispatch
    for i in 3..6 {
        gateway
            .handle(request(&format!("prompt {i}")))
            .await
            .expect("healthy provider serves");
    }
    assert_eq!(down.calls(), 3);
    assert_eq!(up.calls(), 6);

    let health = gateway.provider_health();
    let down_id = ProviderId::new("down").expect("valid");
    assert_eq!(
        health.get(&down_id).expect("breaker registered").state,
        modelgate_resilience::CircuitState::Open
    );

    // The breaker gauge tracks the trip on /metrics
    let exposition = gateway.metrics().gather().expect("gather");
    assert!(exposition.contains("modelgate_circuit_breaker_state{provider=\"down\"} 2"));
    assert!(exposition.contains("modelgate_circuit_breaker_state{provider=\"up\"} 0"));
}

#[tokio::test]
async fn exhausted_failover_reports_attempt_trail() {
    let mut config = base_config();
    config.routing.max_provider_attempts = 2;

    let a = Arc::new(
        MockProvider::new("alpha", "m-a", ModelClass::Standard, CostTier::Economy, 0.01)
            .failing(1000),
    );
    let b = Arc::new(
        MockProvider::new("beta", "m-b", ModelClass::Standard, CostTier::Standard, 0.02)
            .failing(1000),
    );
    let gateway = build(config, vec![a, b]);

    let err = gateway.handle(request("hello")).await.expect_err("all fail");
    match err {
        GatewayError::AllProvidersUnavailable { attempts } => {
            assert_eq!(attempts.len(), 2);
            let providers: Vec<&str> =
                attempts.iter().map(|a| a.provider_id.as_str()).collect();
            assert!(providers.contains(&"alpha"));
            assert!(providers.contains(&"beta"));
        }
        other => panic!("unexpected error: {other}"),
    }

    // The reservation was released; the tenant can still spend
    let snapshot = gateway
        .budget_snapshot(&TenantId::new("acme").expect("valid tenant"))
        .expect("ledger exists");
    assert!(snapshot.reserved_usd.abs() < 1e-9);
    assert!(snapshot.spent_usd.abs() < 1e-9);
}

#[tokio::test]
async fn budget_exhaustion_returns_payment_required() {
    let mut config = base_config();
    config.budget.default_limit_usd = 0.05;
    // Estimate is 0.03 per request at 1000 max_tokens
    config.cache.enabled = false;

    let provider = Arc::new(MockProvider::new(
        "solo",
        "model-1",
        ModelClass::Standard,
        CostTier::Standard,
        0.03,
    ));
    let gateway = build(config, vec![provider]);

    gateway.handle(request("first")).await.expect("first fits");
    let err = gateway
        .handle(request("second"))
        .await
        .expect_err("second exceeds limit");
    assert!(matches!(err, GatewayError::BudgetExceeded { .. }));
    assert_eq!(err.status_code(), http::StatusCode::PAYMENT_REQUIRED);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_requests_never_overshoot_budget() {
    let mut config = base_config();
    config.budget.default_limit_usd = 1.0;
    config.budget.degrade_threshold = None;
    config.cache.enabled = false;

    let provider = Arc::new(MockProvider::new(
        "solo",
        "model-1",
        ModelClass::Standard,
        CostTier::Standard,
        0.03,
    ));
    let gateway = Arc::new(build(config, vec![provider]));

    let mut handles = Vec::new();
    for i in 0..40 {
        let gateway = Arc::clone(&gateway);
        handles.push(tokio::spawn(async move {
            gateway.handle(request(&format!("prompt {i}"))).await.is_ok()
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        if handle.await.expect("task completes") {
            succeeded += 1;
        }
    }

    let snapshot = gateway
        .budget_snapshot(&TenantId::new("acme").expect("valid tenant"))
        .expect("ledger exists");
    assert!(snapshot.spent_usd <= 1.0 + 1e-9);
    assert!(succeeded <= 33);
    assert!(succeeded > 0);
}

#[tokio::test]
async fn model_hint_pins_routing_to_named_model() {
    let cheap = Arc::new(MockProvider::new(
        "cheap",
        "small-1",
        ModelClass::Standard,
        CostTier::Economy,
        0.001,
    ));
    let hinted = Arc::new(MockProvider::new(
        "hinted",
        "special-1",
        ModelClass::Standard,
        CostTier::Premium,
        0.08,
    ));
    let gateway = build(base_config(), vec![cheap, Arc::clone(&hinted)]);

    let mut req = request("hello");
    req.model_hint = Some(ModelId::new("special-1").expect("valid"));

    let response = gateway.handle(req).await.expect("success");
    assert_eq!(response.provider_id.as_str(), "hinted");
    assert_eq!(response.model_used.as_str(), "special-1");
    assert_eq!(hinted.calls(), 1);
}

#[tokio::test]
async fn max_tokens_over_ceiling_rejected_without_spend() {
    let mut config = base_config();
    config.server.max_tokens_ceiling = 500;

    let provider = Arc::new(MockProvider::new(
        "solo",
        "model-1",
        ModelClass::Standard,
        CostTier::Standard,
        0.02,
    ));
    let gateway = build(config, vec![Arc::clone(&provider)]);

    let err = gateway
        .handle(request("hello"))
        .await
        .expect_err("over ceiling");
    assert!(matches!(err, GatewayError::Validation { .. }));
    assert_eq!(err.status_code(), http::StatusCode::BAD_REQUEST);
    assert_eq!(provider.calls(), 0);
    // No ledger was ever touched
    assert!(gateway
        .budget_snapshot(&TenantId::new("acme").expect("valid tenant"))
        .is_none());
}

#[tokio::test]
async fn slow_provider_times_out_and_fails_over() {
    let mut config = base_config();
    config.server.request_timeout = Duration::from_millis(50);

    let slow = Arc::new(
        MockProvider::new("slow", "m-a", ModelClass::Standard, CostTier::Economy, 0.001)
            .delayed(Duration::from_millis(500)),
    );
    let fast = Arc::new(MockProvider::new(
        "fast",
        "m-b",
        ModelClass::Standard,
        CostTier::Standard,
        0.02,
    ));
    let gateway = build(config, vec![Arc::clone(&slow), Arc::clone(&fast)]);

    let response = gateway.handle(request("hello")).await.expect("failover succeeds");
    assert_eq!(response.provider_id.as_str(), "fast");
    assert_eq!(slow.calls(), 1);
}

#[tokio::test]
async fn degraded_budget_prefers_cheaper_tier() {
    let mut config = base_config();
    config.budget.default_limit_usd = 0.10;
    config.budget.degrade_threshold = Some(0.5);
    config.cache.enabled = false;
    // Estimate 0.003 per request at 100 max_tokens
    config.pricing.baseline_per_1k_usd = 0.03;

    let premium = Arc::new(MockProvider::new(
        "premium",
        "big-1",
        ModelClass::Advanced,
        CostTier::Premium,
        0.05,
    ));
    let economy = Arc::new(MockProvider::new(
        "economy",
        "small-1",
        ModelClass::Standard,
        CostTier::Economy,
        0.01,
    ));
    let gateway = build(config, vec![Arc::clone(&premium), Arc::clone(&economy)]);

    // Spend past the soft threshold
    let mut req = request("warmup");
    req.max_tokens = MaxTokens::new(100).expect("valid");
    let mut warm = req.clone();
    warm.model_class = Some(ModelClass::Advanced);
    let first = gateway.handle(warm).await.expect("success");
    assert_eq!(first.provider_id.as_str(), "premium");

    // Committed spend (0.05 of 0.10) is at the threshold; subsequent
    // requests carry the prefer-cheaper posture and skip premium tiers
    let mut next = request("afterwards");
    next.max_tokens = MaxTokens::new(100).expect("valid");
    let second = gateway.handle(next).await.expect("success");
    assert_eq!(second.provider_id.as_str(), "economy");
}
