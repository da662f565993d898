//! # Modelgate Resilience
//!
//! Failure-isolation building blocks for the orchestration gateway:
//! - Per-provider circuit breaker with exponential cooldown backoff
//! - Fingerprint-addressed response cache with strict TTL and LRU eviction

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cache;
pub mod circuit_breaker;

pub use cache::{CacheConfig, CacheStats, ResponseCache};
pub use circuit_breaker::{
    CallPermit, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerRegistry, CircuitState,
    ProviderHealth,
};
