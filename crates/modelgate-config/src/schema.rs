//! Configuration schema definitions.
//!
//! All configuration types with validation and defaults.

use modelgate_core::{ApiKey, CostTier, ModelClass};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use validator::Validate;

/// Main gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Server configuration
    #[validate(nested)]
    pub server: ServerConfig,

    /// Provider configurations
    #[validate(nested)]
    pub providers: Vec<ProviderConfig>,

    /// Routing configuration
    #[validate(nested)]
    pub routing: RoutingConfig,

    /// Circuit breaker configuration
    #[validate(nested)]
    pub circuit_breaker: CircuitBreakerSettings,

    /// Response cache configuration
    #[validate(nested)]
    pub cache: CacheSettings,

    /// Budget configuration
    #[validate(nested)]
    pub budget: BudgetSettings,

    /// Cost estimation configuration
    #[validate(nested)]
    pub pricing: PricingSettings,

    /// Observability configuration
    #[validate(nested)]
    pub observability: ObservabilityConfig,
}

impl GatewayConfig {
    /// Validate the configuration
    ///
    /// # Errors
    /// Returns validation errors if configuration is invalid
    pub fn validate_config(&self) -> Result<(), validator::ValidationErrors> {
        self.validate()
    }

    /// Get a provider config by ID
    #[must_use]
    pub fn get_provider(&self, id: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.id == id)
    }

    /// Get all enabled providers
    #[must_use]
    pub fn enabled_providers(&self) -> Vec<&ProviderConfig> {
        self.providers.iter().filter(|p| p.enabled).collect()
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind host
    #[validate(length(min = 1))]
    pub host: String,

    /// Bind port
    #[validate(range(min = 1, max = 65535))]
    pub port: u16,

    /// End-to-end request timeout
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Deployment ceiling on max_tokens per request
    #[validate(range(min = 1))]
    pub max_tokens_ceiling: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout: Duration::from_secs(120),
            max_tokens_ceiling: 8192,
        }
    }
}

impl ServerConfig {
    /// Get the socket address
    #[must_use]
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// One model entry a provider serves
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ModelEntry {
    /// Model identifier
    #[validate(length(min = 1, max = 256))]
    pub id: String,

    /// Capability class
    #[serde(default)]
    pub class: ModelClass,

    /// Pricing tier
    #[serde(default)]
    pub tier: CostTier,

    /// Price per 1000 generated tokens, in USD
    #[validate(range(min = 0.0))]
    pub cost_per_1k_usd: f64,
}

/// Provider configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ProviderConfig {
    /// Unique provider instance ID
    #[validate(length(min = 1, max = 64))]
    pub id: String,

    /// Base URL/endpoint
    #[validate(url)]
    pub endpoint: String,

    /// API key (can be env var reference like ${OPENAI_API_KEY})
    #[serde(default)]
    pub api_key: Option<String>,

    /// API key environment variable name
    #[serde(default)]
    pub api_key_env: Option<String>,

    /// Models this provider serves
    #[validate(nested, length(min = 1))]
    pub models: Vec<ModelEntry>,

    /// Request timeout for this provider
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,

    /// Whether this provider is enabled
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Tie-break priority for routing (lower = higher priority)
    #[serde(default = "default_priority")]
    pub priority: u32,
}

impl ProviderConfig {
    /// Resolve the API key from config or environment.
    ///
    /// `api_key_env` names a variable to read; a literal `api_key` is
    /// used as-is. The resolved credential is wrapped in [`ApiKey`] so
    /// it stays redacted in debug output.
    #[must_use]
    pub fn resolve_api_key(&self) -> Option<ApiKey> {
        let raw = self
            .api_key_env
            .as_ref()
            .and_then(|name| std::env::var(name).ok())
            .or_else(|| self.api_key.clone())?;
        match ApiKey::new(raw) {
            Ok(key) => Some(key),
            Err(err) => {
                tracing::warn!(provider = %self.id, error = %err, "Configured API key is invalid");
                None
            }
        }
    }
}

/// Routing configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct RoutingConfig {
    /// Weight of the cost score component
    #[validate(range(min = 0.0))]
    pub cost_weight: f64,

    /// Weight of the capability-fit score component
    #[validate(range(min = 0.0))]
    pub capability_weight: f64,

    /// Weight of the reliability score component
    #[validate(range(min = 0.0))]
    pub reliability_weight: f64,

    /// Maximum providers tried for one request before giving up
    #[validate(range(min = 1, max = 16))]
    pub max_provider_attempts: u32,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            cost_weight: 0.4,
            capability_weight: 0.3,
            reliability_weight: 0.3,
            max_provider_attempts: 3,
        }
    }
}

/// Circuit breaker configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    /// Consecutive failures that open a provider's circuit
    #[validate(range(min = 1))]
    pub failure_threshold: u32,

    /// Initial cooldown before a probe is admitted
    #[serde(with = "humantime_serde")]
    pub cooldown: Duration,

    /// Upper bound on the cooldown as it backs off
    #[serde(with = "humantime_serde")]
    pub max_cooldown: Duration,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(30),
            max_cooldown: Duration::from_secs(300),
        }
    }
}

/// Response cache configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CacheSettings {
    /// Whether caching is enabled
    pub enabled: bool,

    /// Maximum number of entries before LRU eviction
    pub capacity: usize,

    /// TTL applied to every entry
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: 10_000,
            ttl: Duration::from_secs(3600),
        }
    }
}

/// Budget configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct BudgetSettings {
    /// Length of one budget period
    #[serde(with = "humantime_serde")]
    pub period: Duration,

    /// Limit applied to tenants without an explicit override, in USD
    #[validate(range(min = 0.0))]
    pub default_limit_usd: f64,

    /// Per-tenant limit overrides, in USD
    pub tenant_limits_usd: HashMap<String, f64>,

    /// Committed-spend fraction above which routing prefers cheaper
    /// models; absent disables soft degradation
    #[validate(range(min = 0.0, max = 1.0))]
    pub degrade_threshold: Option<f64>,

    /// Whether requests over the limit are rejected
    pub enforce_hard_limit: bool,
}

impl Default for BudgetSettings {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(24 * 3600),
            default_limit_usd: 100.0,
            tenant_limits_usd: HashMap::new(),
            degrade_threshold: Some(0.8),
            enforce_hard_limit: true,
        }
    }
}

/// Cost estimation configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct PricingSettings {
    /// Per-1k-token rate used for the pre-routing budget estimate,
    /// in USD
    #[validate(range(min = 0.0))]
    pub baseline_per_1k_usd: f64,
}

impl Default for PricingSettings {
    fn default() -> Self {
        Self {
            baseline_per_1k_usd: 0.03,
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Logging configuration
    #[validate(nested)]
    pub logging: LoggingConfig,

    /// Metrics configuration
    #[validate(nested)]
    pub metrics: MetricsConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "modelgate=debug")
    #[validate(length(min = 1))]
    pub level: String,

    /// Output format
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Structured JSON lines
    #[default]
    Json,
    /// Human-readable multi-line output
    Pretty,
    /// Single-line human-readable output
    Compact,
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct MetricsConfig {
    /// Whether the metrics endpoint is served
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn default_true() -> bool {
    true
}

fn default_priority() -> u32 {
    100
}
