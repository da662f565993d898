//! # Modelgate Core
//!
//! Domain types shared across the orchestration gateway:
//! - Validated newtypes for identifiers and request parameters
//! - The immutable [`CompletionRequest`] / [`CompletionResponse`] pair
//! - Deterministic request [`Fingerprint`]s for content-addressed caching
//! - The [`ModelProvider`] capability trait implemented by vendor adapters
//! - The [`GatewayError`] taxonomy with HTTP status mapping

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod fingerprint;
pub mod provider;
pub mod request;
pub mod response;
pub mod types;

pub use error::{GatewayError, GatewayResult, ProviderAttempt};
pub use fingerprint::Fingerprint;
pub use provider::{ModelListing, ModelProvider, ProviderCompletion, ProviderRequest};
pub use request::CompletionRequest;
pub use response::{CachedCompletion, CompletionResponse, TokenUsage};
pub use types::{
    ApiKey, CostTier, MaxTokens, ModelClass, ModelId, ProviderId, RequestId, TenantId, UserId,
    ValidationError,
};
