//! The request orchestration pipeline.
//!
//! One `handle` call runs the full pipeline for a request: validation,
//! cache lookup, budget authorization, provider selection, the guarded
//! provider call, and settlement. Failover walks the remaining
//! providers within a bounded attempt budget; the trail of excluded
//! providers is attached to the terminal error when everything fails.

use modelgate_budget::{BudgetManager, BudgetManagerConfig, BudgetSnapshot};
use modelgate_config::GatewayConfig;
use modelgate_core::{
    CompletionRequest, CompletionResponse, Fingerprint, GatewayError, GatewayResult, MaxTokens,
    ModelProvider, ProviderAttempt, ProviderId, ProviderRequest, RequestId, TenantId, TokenUsage,
};
use modelgate_core::CachedCompletion;
use modelgate_resilience::{
    CacheConfig, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerRegistry, CircuitState,
    ProviderHealth, ResponseCache,
};
use modelgate_routing::{
    ProviderStatsTracker, RegisteredProvider, RouteContext, RoutingDecision, RoutingEngine,
    ScoreWeights,
};
use modelgate_telemetry::Metrics;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Request-handling policy knobs derived from configuration
#[derive(Debug, Clone)]
pub struct GatewayPolicy {
    /// Maximum providers tried for one request
    pub max_provider_attempts: u32,
    /// Default per-call timeout for providers without an override
    pub provider_timeout: Duration,
    /// Deployment ceiling on max_tokens per request
    pub max_tokens_ceiling: u32,
    /// Per-1k-token rate for the pre-routing budget estimate, in USD
    pub baseline_per_1k_usd: f64,
}

impl Default for GatewayPolicy {
    fn default() -> Self {
        Self {
            max_provider_attempts: 3,
            provider_timeout: Duration::from_secs(120),
            max_tokens_ceiling: 8192,
            baseline_per_1k_usd: 0.03,
        }
    }
}

struct ProviderEntry {
    provider: Arc<dyn ModelProvider>,
    timeout: Option<Duration>,
}

/// Builder for [`Orchestrator`]
pub struct OrchestratorBuilder {
    config: GatewayConfig,
    providers: Vec<Arc<dyn ModelProvider>>,
    metrics: Option<Arc<Metrics>>,
}

impl OrchestratorBuilder {
    /// Start building from a configuration
    #[must_use]
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            providers: Vec::new(),
            metrics: None,
        }
    }

    /// Register a provider adapter.
    ///
    /// Priority, enablement, and timeout come from the matching
    /// `providers` entry in the configuration when one exists.
    #[must_use]
    pub fn provider(mut self, provider: Arc<dyn ModelProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Use an existing metrics instance instead of creating one
    #[must_use]
    pub fn metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Assemble the orchestrator
    ///
    /// # Errors
    /// Returns an error if metrics registration fails.
    pub fn build(self) -> GatewayResult<Orchestrator> {
        let metrics = match self.metrics {
            Some(metrics) => metrics,
            None => Arc::new(
                Metrics::new()
                    .map_err(|e| GatewayError::internal(format!("metrics registration: {e}")))?,
            ),
        };

        let stats = Arc::new(ProviderStatsTracker::with_defaults());

        let mut registered = Vec::with_capacity(self.providers.len());
        let mut entries = HashMap::with_capacity(self.providers.len());
        for provider in self.providers {
            let provider_config = self.config.get_provider(provider.id().as_str());
            let (priority, enabled, timeout) = provider_config
                .map(|c| (c.priority, c.enabled, c.timeout))
                .unwrap_or((100, true, None));
            entries.insert(
                provider.id().clone(),
                ProviderEntry {
                    provider: Arc::clone(&provider),
                    timeout,
                },
            );
            registered.push(RegisteredProvider {
                provider,
                priority,
                enabled,
            });
        }

        let routing = RoutingEngine::new(
            registered,
            Arc::clone(&stats),
            ScoreWeights::new(
                self.config.routing.cost_weight,
                self.config.routing.capability_weight,
                self.config.routing.reliability_weight,
            ),
        );

        let breakers = CircuitBreakerRegistry::new(CircuitBreakerConfig {
            failure_threshold: self.config.circuit_breaker.failure_threshold,
            cooldown: self.config.circuit_breaker.cooldown,
            max_cooldown: self.config.circuit_breaker.max_cooldown,
        });

        let cache = ResponseCache::new(CacheConfig {
            enabled: self.config.cache.enabled,
            capacity: self.config.cache.capacity,
            ttl: self.config.cache.ttl,
        });

        let budget = BudgetManager::new(BudgetManagerConfig {
            period: self.config.budget.period,
            default_limit_usd: self.config.budget.default_limit_usd,
            tenant_limits_usd: self.config.budget.tenant_limits_usd.clone(),
            degrade_threshold: self.config.budget.degrade_threshold,
            enforce_hard_limit: self.config.budget.enforce_hard_limit,
        });

        let policy = GatewayPolicy {
            max_provider_attempts: self.config.routing.max_provider_attempts,
            provider_timeout: self.config.server.request_timeout,
            max_tokens_ceiling: self.config.server.max_tokens_ceiling,
            baseline_per_1k_usd: self.config.pricing.baseline_per_1k_usd,
        };

        Ok(Orchestrator {
            providers: entries,
            routing,
            stats,
            breakers,
            cache,
            budget,
            metrics,
            policy,
        })
    }
}

/// The orchestration pipeline over a fixed provider registry
pub struct Orchestrator {
    providers: HashMap<ProviderId, ProviderEntry>,
    routing: RoutingEngine,
    stats: Arc<ProviderStatsTracker>,
    breakers: CircuitBreakerRegistry,
    cache: ResponseCache,
    budget: BudgetManager,
    metrics: Arc<Metrics>,
    policy: GatewayPolicy,
}

impl Orchestrator {
    /// Start building an orchestrator
    #[must_use]
    pub fn builder(config: GatewayConfig) -> OrchestratorBuilder {
        OrchestratorBuilder::new(config)
    }

    /// Metrics shared with the HTTP surface
    #[must_use]
    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Breaker health per provider, for the health endpoint
    #[must_use]
    pub fn provider_health(&self) -> HashMap<ProviderId, ProviderHealth> {
        self.breakers.snapshots()
    }

    /// Cache statistics, for the health endpoint
    #[must_use]
    pub fn cache_stats(&self) -> modelgate_resilience::CacheStats {
        self.cache.stats()
    }

    /// Budget snapshot for one tenant
    #[must_use]
    pub fn budget_snapshot(&self, tenant: &TenantId) -> Option<BudgetSnapshot> {
        self.budget.snapshot(tenant)
    }

    /// Handle one completion request end to end.
    ///
    /// # Errors
    /// Returns the first non-retryable pipeline error, or
    /// [`GatewayError::AllProvidersUnavailable`] with the attempt trail
    /// when failover exhausts every candidate.
    pub async fn handle(&self, request: CompletionRequest) -> GatewayResult<CompletionResponse> {
        let started = Instant::now();
        let request_id = RequestId::generate();

        self.check_ceiling(request.max_tokens)?;

        let fingerprint = Fingerprint::of(&request);
        if let Some(cached) = self.cache_lookup(&fingerprint) {
            let elapsed = started.elapsed();
            self.metrics.record_request(
                request.tenant_id.as_str(),
                cached.provider_id.as_str(),
                "success",
                true,
                elapsed,
            );
            info!(
                request_id = %request_id,
                tenant = %request.tenant_id,
                provider = %cached.provider_id,
                cache_hit = true,
                latency_ms = elapsed.as_millis() as u64,
                cost_usd = 0.0,
                "Request completed"
            );
            return Ok(cached.into_response(request_id, elapsed.as_millis() as u64));
        }

        let estimate_usd = self.policy.baseline_per_1k_usd
            * f64::from(request.max_tokens.value())
            / 1000.0;
        let token = match self.budget.authorize(&request.tenant_id, estimate_usd) {
            Ok(token) => token,
            Err(err) => {
                self.metrics.record_budget_denial(request.tenant_id.as_str());
                return Err(err);
            }
        };
        let posture = token.posture();
        let mut reservation = Some(token);

        let mut excluded: HashSet<ProviderId> = HashSet::new();
        let mut attempts: Vec<ProviderAttempt> = Vec::new();

        for _ in 0..self.policy.max_provider_attempts {
            let breaker_states = self.breakers.snapshot_states();
            let ctx = RouteContext {
                breaker_states: &breaker_states,
                posture,
                excluded: &excluded,
            };
            let decision = match self.routing.select(&request, &ctx) {
                Ok(decision) => decision,
                Err(err) => {
                    if attempts.is_empty() {
                        if let Some(token) = reservation.take() {
                            self.budget.release(token);
                        }
                        return Err(err);
                    }
                    break;
                }
            };

            let Some(entry) = self.providers.get(&decision.provider_id) else {
                attempts.push(ProviderAttempt::new(
                    decision.provider_id.to_string(),
                    "provider registered for routing but not dispatchable",
                ));
                excluded.insert(decision.provider_id.clone());
                continue;
            };

            let breaker = self.breakers.get_or_create(&decision.provider_id);
            let Some(permit) = breaker.try_acquire() else {
                self.publish_breaker_state(&decision.provider_id, &breaker);
                attempts.push(ProviderAttempt::new(
                    decision.provider_id.to_string(),
                    "circuit open",
                ));
                excluded.insert(decision.provider_id.clone());
                continue;
            };

            match self.call_provider(&request, &decision, entry, &breaker, permit).await {
                Ok(completion) => {
                    let actual_usd = completion
                        .billed_cost_usd
                        .unwrap_or(decision.estimated_cost_usd);
                    if let Some(token) = reservation.take() {
                        self.budget.settle(token, actual_usd);
                    }
                    if let Some(snapshot) = self.budget.snapshot(&request.tenant_id) {
                        self.metrics
                            .set_tenant_spend(request.tenant_id.as_str(), snapshot.spent_usd);
                    }

                    let usage = TokenUsage {
                        prompt_tokens: completion.prompt_tokens,
                        completion_tokens: completion.completion_tokens,
                    };
                    self.cache_store(
                        fingerprint,
                        CachedCompletion {
                            content: completion.content.clone(),
                            model_used: completion.model.clone(),
                            provider_id: decision.provider_id.clone(),
                            cost_usd: actual_usd,
                            usage,
                        },
                    );

                    let elapsed = started.elapsed();
                    self.metrics.record_request(
                        request.tenant_id.as_str(),
                        decision.provider_id.as_str(),
                        "success",
                        false,
                        elapsed,
                    );
                    info!(
                        request_id = %request_id,
                        tenant = %request.tenant_id,
                        provider = %decision.provider_id,
                        model = %completion.model,
                        route_reason = ?decision.reason,
                        cache_hit = false,
                        latency_ms = elapsed.as_millis() as u64,
                        cost_usd = actual_usd,
                        "Request completed"
                    );

                    return Ok(CompletionResponse {
                        request_id,
                        content: completion.content,
                        model_used: completion.model,
                        provider_id: decision.provider_id,
                        cost_usd: actual_usd,
                        cache_hit: false,
                        processing_time_ms: elapsed.as_millis() as u64,
                        usage,
                    });
                }
                Err(err) => {
                    self.metrics.record_provider_error(
                        decision.provider_id.as_str(),
                        err.error_code(),
                    );
                    warn!(
                        request_id = %request_id,
                        provider = %decision.provider_id,
                        error = %err,
                        "Provider attempt failed"
                    );
                    attempts.push(ProviderAttempt::new(
                        decision.provider_id.to_string(),
                        err.to_string(),
                    ));
                    excluded.insert(decision.provider_id);
                }
            }
        }

        if let Some(token) = reservation.take() {
            self.budget.release(token);
        }
        let elapsed = started.elapsed();
        self.metrics.record_request(
            request.tenant_id.as_str(),
            "none",
            "all_providers_unavailable",
            false,
            elapsed,
        );
        Err(GatewayError::AllProvidersUnavailable { attempts })
    }

    async fn call_provider(
        &self,
        request: &CompletionRequest,
        decision: &RoutingDecision,
        entry: &ProviderEntry,
        breaker: &Arc<CircuitBreaker>,
        permit: modelgate_resilience::CallPermit,
    ) -> GatewayResult<modelgate_core::ProviderCompletion> {
        let provider_request = ProviderRequest {
            prompt: request.prompt.clone(),
            model: decision.model_id.clone(),
            max_tokens: request.max_tokens,
        };
        let timeout = entry.timeout.unwrap_or(self.policy.provider_timeout);

        let result = match tokio::time::timeout(timeout, entry.provider.complete(&provider_request))
            .await
        {
            Ok(Ok(completion)) => {
                breaker.record_success(permit);
                self.stats.record_outcome(&decision.provider_id, true);
                Ok(completion)
            }
            Ok(Err(err)) => {
                if err.counts_against_breaker() {
                    breaker.record_failure(permit);
                    self.stats.record_outcome(&decision.provider_id, false);
                } else {
                    // Not the provider's fault; no breaker or stats movement
                    breaker.release(permit);
                }
                Err(err)
            }
            Err(_) => {
                breaker.record_failure(permit);
                self.stats.record_outcome(&decision.provider_id, false);
                Err(GatewayError::timeout(
                    decision.provider_id.to_string(),
                    timeout,
                ))
            }
        };
        self.publish_breaker_state(&decision.provider_id, breaker);
        result
    }

    fn publish_breaker_state(&self, provider_id: &ProviderId, breaker: &CircuitBreaker) {
        let value = match breaker.state() {
            CircuitState::Closed => 0.0,
            CircuitState::HalfOpen => 1.0,
            CircuitState::Open => 2.0,
        };
        self.metrics
            .set_circuit_breaker_state(provider_id.as_str(), value);
    }

    fn check_ceiling(&self, max_tokens: MaxTokens) -> GatewayResult<()> {
        if max_tokens.value() > self.policy.max_tokens_ceiling {
            return Err(GatewayError::validation(
                format!(
                    "max_tokens {} exceeds the deployment ceiling of {}",
                    max_tokens.value(),
                    self.policy.max_tokens_ceiling
                ),
                Some("max_tokens".to_string()),
                "max_tokens_over_ceiling",
            ));
        }
        Ok(())
    }

    /// A cache backend failure degrades to a miss
    fn cache_lookup(&self, fingerprint: &Fingerprint) -> Option<CachedCompletion> {
        match self.cache.get(fingerprint) {
            Ok(Some(cached)) => {
                self.metrics.record_cache_operation("get", "hit");
                Some(cached)
            }
            Ok(None) => {
                self.metrics.record_cache_operation("get", "miss");
                None
            }
            Err(err) => {
                warn!(error = %err, "Cache lookup failed, treating as miss");
                self.metrics.record_cache_operation("get", "error");
                None
            }
        }
    }

    fn cache_store(&self, fingerprint: Fingerprint, payload: CachedCompletion) {
        match self.cache.put(fingerprint, payload) {
            Ok(()) => self.metrics.record_cache_operation("put", "ok"),
            Err(err) => {
                warn!(error = %err, "Cache store failed");
                self.metrics.record_cache_operation("put", "error");
            }
        }
    }
}
