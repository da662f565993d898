//! Weighted provider selection.

use crate::stats::ProviderStatsTracker;
use modelgate_budget::SpendPosture;
use modelgate_core::{
    CompletionRequest, CostTier, GatewayError, ModelId, ModelListing, ModelProvider, ProviderId,
};
use modelgate_resilience::CircuitState;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Scoring weights for provider selection.
///
/// Weights are normalized at construction so callers can supply any
/// positive values.
#[derive(Debug, Clone)]
pub struct ScoreWeights {
    /// Weight of the cost component
    pub cost: f64,
    /// Weight of the capability-fit component
    pub capability: f64,
    /// Weight of the observed-reliability component
    pub reliability: f64,
}

impl ScoreWeights {
    /// Create normalized weights
    #[must_use]
    pub fn new(cost: f64, capability: f64, reliability: f64) -> Self {
        let sum = cost + capability + reliability;
        if sum <= 0.0 {
            return Self::default();
        }
        Self {
            cost: cost / sum,
            capability: capability / sum,
            reliability: reliability / sum,
        }
    }
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            cost: 0.4,
            capability: 0.3,
            reliability: 0.3,
        }
    }
}

/// A provider registered with the routing engine
#[derive(Clone)]
pub struct RegisteredProvider {
    /// The adapter
    pub provider: Arc<dyn ModelProvider>,
    /// Tie-break priority; lower wins
    pub priority: u32,
    /// Whether the provider participates in routing
    pub enabled: bool,
}

/// Why a provider was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteReason {
    /// The request pinned this provider's model by hint
    ModelHint,
    /// Highest weighted score among healthy candidates
    BestScore,
    /// No healthy candidate; a half-open provider gets the probe
    Probe,
}

/// The outcome of one selection pass
#[derive(Debug, Clone, Serialize)]
pub struct RoutingDecision {
    /// Provider to call
    pub provider_id: ProviderId,
    /// Model to request from it
    pub model_id: ModelId,
    /// Upper-bound cost estimate for the call, in USD
    pub estimated_cost_usd: f64,
    /// Why this provider won
    pub reason: RouteReason,
}

/// Inputs the gateway passes into a selection pass.
///
/// Breaker states are a snapshot taken once per pass; the engine never
/// reads breakers directly.
pub struct RouteContext<'a> {
    /// Circuit state per provider; absent means closed
    pub breaker_states: &'a HashMap<ProviderId, CircuitState>,
    /// Spend posture from budget authorization
    pub posture: SpendPosture,
    /// Providers already tried (and failed) for this request
    pub excluded: &'a HashSet<ProviderId>,
}

impl RouteContext<'_> {
    fn state_of(&self, provider_id: &ProviderId) -> CircuitState {
        self.breaker_states
            .get(provider_id)
            .copied()
            .unwrap_or(CircuitState::Closed)
    }
}

struct Candidate<'a> {
    provider_id: ProviderId,
    listing: &'a ModelListing,
    priority: u32,
    state: CircuitState,
}

/// Routing engine over a fixed provider registry
pub struct RoutingEngine {
    providers: Vec<RegisteredProvider>,
    stats: Arc<ProviderStatsTracker>,
    weights: ScoreWeights,
}

impl RoutingEngine {
    /// Create an engine over a provider registry
    #[must_use]
    pub fn new(
        providers: Vec<RegisteredProvider>,
        stats: Arc<ProviderStatsTracker>,
        weights: ScoreWeights,
    ) -> Self {
        Self {
            providers,
            stats,
            weights,
        }
    }

    /// Reliability tracker shared with the gateway
    #[must_use]
    pub fn stats(&self) -> &Arc<ProviderStatsTracker> {
        &self.stats
    }

    /// Select a provider and model for a request.
    ///
    /// A model hint pins routing to the provider serving that exact
    /// model and skips scoring. Otherwise candidates are filtered by
    /// capability class, circuit state, and spend posture, scored, and
    /// ordered deterministically: score descending, then estimated cost
    /// ascending, then priority ascending.
    ///
    /// # Errors
    /// Returns [`GatewayError::NoEligibleProvider`] when no registered
    /// provider can serve the request.
    pub fn select(
        &self,
        request: &CompletionRequest,
        ctx: &RouteContext<'_>,
    ) -> Result<RoutingDecision, GatewayError> {
        if let Some(hint) = &request.model_hint {
            return self.select_by_hint(request, hint, ctx);
        }

        let required = request.required_class();
        let mut candidates: Vec<Candidate<'_>> = Vec::new();

        for registered in &self.providers {
            if !registered.enabled {
                continue;
            }
            let provider_id = registered.provider.id();
            if ctx.excluded.contains(provider_id) {
                continue;
            }
            let state = ctx.state_of(provider_id);
            if state == CircuitState::Open {
                continue;
            }

            // Cheapest listing that satisfies the class requirement,
            // skipping premium tiers under the degraded posture
            let best = registered
                .provider
                .models()
                .iter()
                .filter(|listing| listing.satisfies(required))
                .filter(|listing| {
                    ctx.posture != SpendPosture::PreferCheaper
                        || listing.tier != CostTier::Premium
                })
                .min_by(|a, b| a.cost_per_1k_usd.total_cmp(&b.cost_per_1k_usd));

            if let Some(listing) = best {
                candidates.push(Candidate {
                    provider_id: provider_id.clone(),
                    listing,
                    priority: registered.priority,
                    state,
                });
            }
        }

        if candidates.is_empty() {
            return Err(GatewayError::NoEligibleProvider {
                reason: format!(
                    "no provider serves class {} under the current posture",
                    required
                ),
            });
        }

        // Healthy providers first; half-open ones only get the probe
        // when nothing healthy remains
        let any_closed = candidates
            .iter()
            .any(|c| c.state == CircuitState::Closed);
        let reason = if any_closed {
            candidates.retain(|c| c.state == CircuitState::Closed);
            RouteReason::BestScore
        } else {
            RouteReason::Probe
        };

        let min_cost = candidates
            .iter()
            .map(|c| c.listing.estimate_cost(request.max_tokens))
            .fold(f64::INFINITY, f64::min);

        let mut scored: Vec<(f64, f64, &Candidate<'_>)> = candidates
            .iter()
            .map(|candidate| {
                let estimate = candidate.listing.estimate_cost(request.max_tokens);
                let cost_score = if estimate <= 0.0 {
                    1.0
                } else {
                    min_cost / estimate
                };
                let capability_score = if candidate.listing.class == required {
                    1.0
                } else {
                    // Over-provisioned: serves the request but wastes capability
                    0.75
                };
                let reliability = self.stats.success_rate(&candidate.provider_id);
                let score = self.weights.cost * cost_score
                    + self.weights.capability * capability_score
                    + self.weights.reliability * reliability;
                (score, estimate, candidate)
            })
            .collect();

        scored.sort_by(|a, b| {
            b.0.total_cmp(&a.0)
                .then(a.1.total_cmp(&b.1))
                .then(a.2.priority.cmp(&b.2.priority))
                .then(a.2.provider_id.as_str().cmp(b.2.provider_id.as_str()))
        });

        let (score, estimate, winner) = &scored[0];
        debug!(
            provider = %winner.provider_id,
            model = %winner.listing.id,
            score,
            estimate_usd = estimate,
            ?reason,
            "Provider selected"
        );

        Ok(RoutingDecision {
            provider_id: winner.provider_id.clone(),
            model_id: winner.listing.id.clone(),
            estimated_cost_usd: *estimate,
            reason,
        })
    }

    fn select_by_hint(
        &self,
        request: &CompletionRequest,
        hint: &ModelId,
        ctx: &RouteContext<'_>,
    ) -> Result<RoutingDecision, GatewayError> {
        for registered in &self.providers {
            if !registered.enabled {
                continue;
            }
            let provider_id = registered.provider.id();
            let Some(listing) = registered
                .provider
                .models()
                .iter()
                .find(|listing| &listing.id == hint)
            else {
                continue;
            };
            if ctx.excluded.contains(provider_id) {
                return Err(GatewayError::NoEligibleProvider {
                    reason: format!("hinted model {hint} already failed on {provider_id}"),
                });
            }
            if ctx.state_of(provider_id) == CircuitState::Open {
                return Err(GatewayError::NoEligibleProvider {
                    reason: format!("provider {provider_id} for hinted model {hint} is isolated"),
                });
            }
            return Ok(RoutingDecision {
                provider_id: provider_id.clone(),
                model_id: listing.id.clone(),
                estimated_cost_usd: listing.estimate_cost(request.max_tokens),
                reason: RouteReason::ModelHint,
            });
        }
        Err(GatewayError::NoEligibleProvider {
            reason: format!("no provider serves hinted model {hint}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use modelgate_core::{
        GatewayError, MaxTokens, ModelClass, ProviderCompletion, ProviderRequest, TenantId,
    };

    struct StaticProvider {
        id: ProviderId,
        models: Vec<ModelListing>,
    }

    #[async_trait]
    impl ModelProvider for StaticProvider {
        fn id(&self) -> &ProviderId {
            &self.id
        }

        fn models(&self) -> &[ModelListing] {
            &self.models
        }

        async fn complete(
            &self,
            _request: &ProviderRequest,
        ) -> Result<ProviderCompletion, GatewayError> {
            unreachable!("routing tests never call providers")
        }
    }

    fn listing(id: &str, class: ModelClass, tier: CostTier, cost: f64) -> ModelListing {
        ModelListing {
            id: ModelId::new(id).expect("valid model"),
            class,
            tier,
            cost_per_1k_usd: cost,
        }
    }

    fn registered(
        id: &str,
        priority: u32,
        models: Vec<ModelListing>,
    ) -> RegisteredProvider {
        RegisteredProvider {
            provider: Arc::new(StaticProvider {
                id: ProviderId::new(id).expect("valid provider"),
                models,
            }),
            priority,
            enabled: true,
        }
    }

    fn engine(providers: Vec<RegisteredProvider>) -> RoutingEngine {
        RoutingEngine::new(
            providers,
            Arc::new(ProviderStatsTracker::with_defaults()),
            ScoreWeights::default(),
        )
    }

    fn request() -> CompletionRequest {
        CompletionRequest::builder()
            .prompt("hello")
            .tenant_id(TenantId::new("acme").expect("valid tenant"))
            .max_tokens(MaxTokens::new(1000).expect("valid"))
            .build()
            .expect("valid request")
    }

    fn ctx<'a>(
        states: &'a HashMap<ProviderId, CircuitState>,
        excluded: &'a HashSet<ProviderId>,
    ) -> RouteContext<'a> {
        RouteContext {
            breaker_states: states,
            posture: SpendPosture::Normal,
            excluded,
        }
    }

    fn pid(id: &str) -> ProviderId {
        ProviderId::new(id).expect("valid provider")
    }

    #[test]
    fn test_prefers_cheaper_equal_candidates() {
        let engine = engine(vec![
            registered(
                "pricey",
                0,
                vec![listing("m-a", ModelClass::Standard, CostTier::Standard, 0.03)],
            ),
            registered(
                "cheap",
                0,
                vec![listing("m-b", ModelClass::Standard, CostTier::Standard, 0.01)],
            ),
        ]);
        let states = HashMap::new();
        let excluded = HashSet::new();
        let decision = engine
            .select(&request(), &ctx(&states, &excluded))
            .expect("eligible");
        assert_eq!(decision.provider_id, pid("cheap"));
        assert_eq!(decision.reason, RouteReason::BestScore);
    }

    #[test]
    fn test_class_filter_excludes_weaker_models() {
        let engine = engine(vec![
            registered(
                "light-only",
                0,
                vec![listing("tiny", ModelClass::Lightweight, CostTier::Economy, 0.001)],
            ),
            registered(
                "advanced",
                0,
                vec![listing("big", ModelClass::Advanced, CostTier::Premium, 0.05)],
            ),
        ]);
        let mut req = request();
        req.model_class = Some(ModelClass::Advanced);
        let states = HashMap::new();
        let excluded = HashSet::new();
        let decision = engine
            .select(&req, &ctx(&states, &excluded))
            .expect("eligible");
        assert_eq!(decision.provider_id, pid("advanced"));
    }

    #[test]
    fn test_open_provider_excluded() {
        let engine = engine(vec![
            registered(
                "down",
                0,
                vec![listing("m-a", ModelClass::Standard, CostTier::Standard, 0.001)],
            ),
            registered(
                "up",
                0,
                vec![listing("m-b", ModelClass::Standard, CostTier::Standard, 0.03)],
            ),
        ]);
        let mut states = HashMap::new();
        states.insert(pid("down"), CircuitState::Open);
        let excluded = HashSet::new();
        let decision = engine
            .select(&request(), &ctx(&states, &excluded))
            .expect("eligible");
        assert_eq!(decision.provider_id, pid("up"));
    }

    #[test]
    fn test_half_open_used_only_as_last_resort() {
        let engine = engine(vec![
            registered(
                "recovering",
                0,
                vec![listing("m-a", ModelClass::Standard, CostTier::Standard, 0.001)],
            ),
            registered(
                "healthy",
                0,
                vec![listing("m-b", ModelClass::Standard, CostTier::Standard, 0.03)],
            ),
        ]);
        let mut states = HashMap::new();
        states.insert(pid("recovering"), CircuitState::HalfOpen);
        let excluded = HashSet::new();

        // Healthy candidate wins even though the half-open one is cheaper
        let decision = engine
            .select(&request(), &ctx(&states, &excluded))
            .expect("eligible");
        assert_eq!(decision.provider_id, pid("healthy"));
        assert_eq!(decision.reason, RouteReason::BestScore);

        // With the healthy one excluded, the half-open provider gets a probe
        let excluded: HashSet<ProviderId> = [pid("healthy")].into_iter().collect();
        let decision = engine
            .select(&request(), &ctx(&states, &excluded))
            .expect("eligible");
        assert_eq!(decision.provider_id, pid("recovering"));
        assert_eq!(decision.reason, RouteReason::Probe);
    }

    #[test]
    fn test_prefer_cheaper_posture_skips_premium() {
        let engine = engine(vec![registered(
            "multi",
            0,
            vec![
                listing("prem", ModelClass::Advanced, CostTier::Premium, 0.05),
                listing("std", ModelClass::Standard, CostTier::Standard, 0.01),
            ],
        )]);
        let states = HashMap::new();
        let excluded = HashSet::new();
        let context = RouteContext {
            breaker_states: &states,
            posture: SpendPosture::PreferCheaper,
            excluded: &excluded,
        };

        let decision = engine.select(&request(), &context).expect("eligible");
        assert_eq!(decision.model_id, ModelId::new("std").expect("valid"));

        // A request that needs the premium model gets nothing under
        // the degraded posture
        let mut req = request();
        req.model_class = Some(ModelClass::Advanced);
        assert!(matches!(
            engine.select(&req, &context),
            Err(GatewayError::NoEligibleProvider { .. })
        ));
    }

    #[test]
    fn test_model_hint_pins_provider() {
        let engine = engine(vec![
            registered(
                "cheap",
                0,
                vec![listing("m-b", ModelClass::Standard, CostTier::Standard, 0.001)],
            ),
            registered(
                "hinted",
                0,
                vec![listing("special", ModelClass::Standard, CostTier::Premium, 0.08)],
            ),
        ]);
        let mut req = request();
        req.model_hint = Some(ModelId::new("special").expect("valid"));
        let states = HashMap::new();
        let excluded = HashSet::new();
        let decision = engine
            .select(&req, &ctx(&states, &excluded))
            .expect("eligible");
        assert_eq!(decision.provider_id, pid("hinted"));
        assert_eq!(decision.reason, RouteReason::ModelHint);
    }

    #[test]
    fn test_hint_to_isolated_provider_fails() {
        let engine = engine(vec![registered(
            "hinted",
            0,
            vec![listing("special", ModelClass::Standard, CostTier::Standard, 0.01)],
        )]);
        let mut req = request();
        req.model_hint = Some(ModelId::new("special").expect("valid"));
        let mut states = HashMap::new();
        states.insert(pid("hinted"), CircuitState::Open);
        let excluded = HashSet::new();
        assert!(matches!(
            engine.select(&req, &ctx(&states, &excluded)),
            Err(GatewayError::NoEligibleProvider { .. })
        ));
    }

    #[test]
    fn test_deterministic_tie_break_on_priority() {
        // Identical listings and stats; priority then decides
        let engine = engine(vec![
            registered(
                "second",
                2,
                vec![listing("m-a", ModelClass::Standard, CostTier::Standard, 0.01)],
            ),
            registered(
                "first",
                1,
                vec![listing("m-b", ModelClass::Standard, CostTier::Standard, 0.01)],
            ),
        ]);
        let states = HashMap::new();
        let excluded = HashSet::new();
        for _ in 0..5 {
            let decision = engine
                .select(&request(), &ctx(&states, &excluded))
                .expect("eligible");
            assert_eq!(decision.provider_id, pid("first"));
        }
    }

    #[test]
    fn test_reliability_outweighs_small_cost_edge() {
        let stats = Arc::new(ProviderStatsTracker::with_defaults());
        let flaky = pid("flaky");
        for _ in 0..10 {
            stats.record_outcome(&flaky, false);
        }
        let engine = RoutingEngine::new(
            vec![
                registered(
                    "flaky",
                    0,
                    vec![listing("m-a", ModelClass::Standard, CostTier::Standard, 0.009)],
                ),
                registered(
                    "steady",
                    0,
                    vec![listing("m-b", ModelClass::Standard, CostTier::Standard, 0.01)],
                ),
            ],
            stats,
            ScoreWeights::default(),
        );
        let states = HashMap::new();
        let excluded = HashSet::new();
        let decision = engine
            .select(&request(), &ctx(&states, &excluded))
            .expect("eligible");
        assert_eq!(decision.provider_id, pid("steady"));
    }

    #[test]
    fn test_excluded_providers_skipped() {
        let engine = engine(vec![
            registered(
                "tried",
                0,
                vec![listing("m-a", ModelClass::Standard, CostTier::Standard, 0.001)],
            ),
            registered(
                "fresh",
                0,
                vec![listing("m-b", ModelClass::Standard, CostTier::Standard, 0.03)],
            ),
        ]);
        let states = HashMap::new();
        let excluded: HashSet<ProviderId> = [pid("tried")].into_iter().collect();
        let decision = engine
            .select(&request(), &ctx(&states, &excluded))
            .expect("eligible");
        assert_eq!(decision.provider_id, pid("fresh"));
    }

    #[test]
    fn test_no_candidates_at_all() {
        let engine = engine(vec![]);
        let states = HashMap::new();
        let excluded = HashSet::new();
        assert!(matches!(
            engine.select(&request(), &ctx(&states, &excluded)),
            Err(GatewayError::NoEligibleProvider { .. })
        ));
    }
}
