//! Error taxonomy for the gateway.
//!
//! Every failure mode a caller can observe has its own variant so that
//! "your budget is exhausted", "the service is degraded", and "your
//! request was malformed" are never collapsed into one generic error.

use crate::types::ValidationError;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Result type alias using `GatewayError`
pub type GatewayResult<T> = Result<T, GatewayError>;

/// One entry in the trail of providers tried for a single request.
///
/// Attached to [`GatewayError::AllProvidersUnavailable`] so operators
/// can see which providers were tried and why each was excluded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderAttempt {
    /// Provider that was tried or excluded
    pub provider_id: String,
    /// Why the attempt did not produce a response
    pub reason: String,
}

impl ProviderAttempt {
    /// Create a new attempt record
    pub fn new(provider_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            reason: reason.into(),
        }
    }
}

/// Gateway error type covering every caller-observable failure mode
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Request validation failed; the caller must fix the request
    #[error("Validation error: {message}")]
    Validation {
        /// Error message
        message: String,
        /// Field that failed validation (if applicable)
        field: Option<String>,
        /// Error code for programmatic handling
        code: String,
    },

    /// Tenant budget does not admit this request
    #[error("Budget exceeded for tenant {tenant}: spent {spent_usd:.4} of {limit_usd:.4} USD")]
    BudgetExceeded {
        /// Tenant whose budget is exhausted
        tenant: String,
        /// Amount spent (including reservations) this period
        spent_usd: f64,
        /// Hard limit for the period
        limit_usd: f64,
        /// Whether degraded (cheaper-model) routing would have been available
        degraded_available: bool,
    },

    /// Circuit breaker is open; the provider was not contacted
    #[error("Provider unavailable: {provider}")]
    ProviderUnavailable {
        /// Provider with an open circuit breaker
        provider: String,
    },

    /// The adapter call itself failed
    #[error("Provider error: {provider} - {message}")]
    Provider {
        /// Provider that returned the error
        provider: String,
        /// Error message
        message: String,
        /// Upstream status code (if applicable)
        status_code: Option<u16>,
        /// Whether this failure counts against the provider's breaker
        retryable: bool,
    },

    /// Adapter call exceeded its timeout
    #[error("Provider {provider} timed out after {duration:?}")]
    Timeout {
        /// Provider that timed out
        provider: String,
        /// Duration after which the call was abandoned
        duration: Duration,
    },

    /// Routing found no candidate at all
    #[error("No eligible provider: {reason}")]
    NoEligibleProvider {
        /// Why every candidate was excluded
        reason: String,
    },

    /// Every candidate was excluded or exhausted
    #[error("All providers unavailable after {} attempt(s)", attempts.len())]
    AllProvidersUnavailable {
        /// Per-provider attempt trail for diagnosis
        attempts: Vec<ProviderAttempt>,
    },

    /// Cache backend failure; always recovered as a miss by the gateway
    #[error("Cache backend error: {message}")]
    CacheBackend {
        /// Error message
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message
        message: String,
    },

    /// Internal invariant violation
    #[error("Internal error: {message}")]
    Internal {
        /// Error message
        message: String,
    },
}

impl GatewayError {
    /// Get the HTTP status code for this error
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::BudgetExceeded { .. } => StatusCode::PAYMENT_REQUIRED,
            Self::ProviderUnavailable { .. }
            | Self::NoEligibleProvider { .. }
            | Self::AllProvidersUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Provider { status_code, .. } => status_code
                .and_then(|code| StatusCode::from_u16(code).ok())
                .unwrap_or(StatusCode::BAD_GATEWAY),
            Self::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::CacheBackend { .. } | Self::Configuration { .. } | Self::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Get the error type string for API responses
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "invalid_request_error",
            Self::BudgetExceeded { .. } => "budget_error",
            Self::ProviderUnavailable { .. }
            | Self::NoEligibleProvider { .. }
            | Self::AllProvidersUnavailable { .. } => "service_unavailable_error",
            Self::Provider { .. } => "provider_error",
            Self::Timeout { .. } => "timeout_error",
            Self::CacheBackend { .. } | Self::Configuration { .. } | Self::Internal { .. } => {
                "internal_error"
            }
        }
    }

    /// Get the error code for programmatic handling
    #[must_use]
    pub fn error_code(&self) -> &str {
        match self {
            Self::Validation { code, .. } => code,
            Self::BudgetExceeded { .. } => "budget_exceeded",
            Self::ProviderUnavailable { .. } => "provider_unavailable",
            Self::Provider { .. } => "provider_error",
            Self::Timeout { .. } => "timeout",
            Self::NoEligibleProvider { .. } => "no_eligible_provider",
            Self::AllProvidersUnavailable { .. } => "all_providers_unavailable",
            Self::CacheBackend { .. } => "cache_backend_error",
            Self::Configuration { .. } => "configuration_error",
            Self::Internal { .. } => "internal_error",
        }
    }

    /// Whether this failure counts toward the provider's circuit breaker.
    ///
    /// Timeouts and retryable provider errors count; validation,
    /// budget, and routing outcomes never reach a breaker.
    #[must_use]
    pub fn counts_against_breaker(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Provider { retryable, .. } => *retryable,
            _ => false,
        }
    }

    /// Create a validation error
    #[must_use]
    pub fn validation(
        message: impl Into<String>,
        field: Option<String>,
        code: impl Into<String>,
    ) -> Self {
        Self::Validation {
            message: message.into(),
            field,
            code: code.into(),
        }
    }

    /// Create a provider error
    #[must_use]
    pub fn provider(
        provider: impl Into<String>,
        message: impl Into<String>,
        status_code: Option<u16>,
        retryable: bool,
    ) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
            status_code,
            retryable,
        }
    }

    /// Create a provider-unavailable error
    #[must_use]
    pub fn provider_unavailable(provider: impl Into<String>) -> Self {
        Self::ProviderUnavailable {
            provider: provider.into(),
        }
    }

    /// Create a timeout error
    #[must_use]
    pub fn timeout(provider: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            provider: provider.into(),
            duration,
        }
    }

    /// Create an internal error
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create a cache backend error
    #[must_use]
    pub fn cache_backend(message: impl Into<String>) -> Self {
        Self::CacheBackend {
            message: message.into(),
        }
    }
}

impl From<ValidationError> for GatewayError {
    fn from(err: ValidationError) -> Self {
        let (field, code) = match &err {
            ValidationError::InvalidPrompt { .. } => (Some("prompt".to_string()), "invalid_prompt"),
            ValidationError::InvalidMaxTokens { .. } => {
                (Some("max_tokens".to_string()), "invalid_max_tokens")
            }
            ValidationError::InvalidTenantId { .. } => {
                (Some("tenant_id".to_string()), "invalid_tenant_id")
            }
            ValidationError::InvalidUserId { .. } => {
                (Some("user_id".to_string()), "invalid_user_id")
            }
            ValidationError::InvalidModelId { .. } => {
                (Some("model_hint".to_string()), "invalid_model_id")
            }
            ValidationError::InvalidProviderId { .. } => {
                (Some("provider_id".to_string()), "invalid_provider_id")
            }
            ValidationError::InvalidApiKey { .. } => {
                (Some("api_key".to_string()), "invalid_api_key")
            }
        };
        Self::Validation {
            message: err.to_string(),
            field,
            code: code.to_string(),
        }
    }
}
