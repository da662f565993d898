//! The provider capability trait and its wire types.

use crate::error::GatewayError;
use crate::types::{CostTier, MaxTokens, ModelClass, ModelId, ProviderId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One model a provider serves, with its class, tier, and price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelListing {
    /// Model identifier as the provider knows it
    pub id: ModelId,
    /// Capability class
    pub class: ModelClass,
    /// Pricing tier
    pub tier: CostTier,
    /// Price per 1000 generated tokens, in USD
    pub cost_per_1k_usd: f64,
}

impl ModelListing {
    /// Whether this listing can serve a request that requires at least
    /// `required` capability
    #[must_use]
    pub fn satisfies(&self, required: ModelClass) -> bool {
        self.class >= required
    }

    /// Upper-bound cost estimate for a completion of up to `max_tokens`
    #[must_use]
    pub fn estimate_cost(&self, max_tokens: MaxTokens) -> f64 {
        self.cost_per_1k_usd * f64::from(max_tokens.value()) / 1000.0
    }
}

/// What the gateway sends to an adapter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The prompt to complete
    pub prompt: String,
    /// Model the routing engine selected
    pub model: ModelId,
    /// Maximum tokens to generate
    pub max_tokens: MaxTokens,
}

/// What an adapter returns on success
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderCompletion {
    /// Generated text
    pub content: String,
    /// Model that actually served the request
    pub model: ModelId,
    /// Tokens consumed by the prompt
    pub prompt_tokens: u32,
    /// Tokens generated
    pub completion_tokens: u32,
    /// Cost as billed by the provider, when it reports one
    pub billed_cost_usd: Option<f64>,
}

/// Capability contract every vendor adapter implements.
///
/// The gateway never inspects adapter internals; anything that can
/// report its identity, its model listings, and complete a prompt can
/// be registered as a provider.
#[async_trait]
pub trait ModelProvider: Send + Sync + 'static {
    /// Stable provider identifier
    fn id(&self) -> &ProviderId;

    /// Models this provider serves
    fn models(&self) -> &[ModelListing];

    /// Execute a completion against the upstream service
    ///
    /// # Errors
    /// Returns [`GatewayError::Provider`] for upstream failures. The
    /// adapter marks a failure retryable when a later attempt against
    /// another provider could plausibly succeed.
    async fn complete(&self, request: &ProviderRequest) -> Result<ProviderCompletion, GatewayError>;
}
