//! # Modelgate Config
//!
//! Configuration schema, validation, and loading for the orchestration
//! gateway. Configuration comes from YAML/TOML/JSON files with
//! `${VAR}` substitution, plus `MODELGATE_*` environment overrides.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod loader;
pub mod schema;

pub use loader::{load_config, ConfigError, ConfigLoader, ConfigSource};
pub use schema::{
    BudgetSettings, CacheSettings, CircuitBreakerSettings, GatewayConfig, LogFormat,
    LoggingConfig, MetricsConfig, ModelEntry, ObservabilityConfig, PricingSettings,
    ProviderConfig, RoutingConfig, ServerConfig,
};
