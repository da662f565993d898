//! Completion responses and the cached subset of them.

use crate::types::{ModelId, ProviderId, RequestId};
use serde::{Deserialize, Serialize};

/// Token accounting for a completion
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens consumed by the prompt
    pub prompt_tokens: u32,
    /// Tokens generated
    pub completion_tokens: u32,
}

impl TokenUsage {
    /// Total tokens for the call
    #[must_use]
    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// What the gateway returns to the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Request identifier assigned at ingress
    pub request_id: RequestId,
    /// Generated text
    pub content: String,
    /// Model that served the request
    pub model_used: ModelId,
    /// Provider that served the request
    pub provider_id: ProviderId,
    /// Cost attributed to this request, in USD (zero on a cache hit)
    #[serde(rename = "estimated_cost")]
    pub cost_usd: f64,
    /// Whether the response was served from cache
    pub cache_hit: bool,
    /// End-to-end processing time in milliseconds
    #[serde(rename = "processing_time")]
    pub processing_time_ms: u64,
    /// Token accounting
    pub usage: TokenUsage,
}

/// The provider-independent payload stored in the response cache.
///
/// Request identity and timing are per-call and stay out of the cache;
/// the original cost is kept for attribution in logs, not re-billed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedCompletion {
    /// Generated text
    pub content: String,
    /// Model that produced the original completion
    pub model_used: ModelId,
    /// Provider that produced the original completion
    pub provider_id: ProviderId,
    /// Cost of the original call, in USD
    pub cost_usd: f64,
    /// Token accounting of the original call
    pub usage: TokenUsage,
}

impl CachedCompletion {
    /// Materialize a caller response from this cached payload.
    ///
    /// Cache hits are free: `cost_usd` on the response is zero and no
    /// budget is charged.
    #[must_use]
    pub fn into_response(self, request_id: RequestId, processing_time_ms: u64) -> CompletionResponse {
        CompletionResponse {
            request_id,
            content: self.content,
            model_used: self.model_used,
            provider_id: self.provider_id,
            cost_usd: 0.0,
            cache_hit: true,
            processing_time_ms,
            usage: self.usage,
        }
    }
}
