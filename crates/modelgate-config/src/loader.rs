//! Configuration loading from files and environment.
//!
//! Supports YAML, TOML, and JSON files with environment variable
//! substitution and `MODELGATE_*` overrides.

use crate::schema::GatewayConfig;
use std::path::Path;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, warn};

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File not found
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// The path to the file that was not found
        path: String,
    },

    /// IO error
    #[error("IO error reading configuration: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Validation error
    #[error("Configuration validation error: {0}")]
    Validation(String),

    /// Unsupported format
    #[error("Unsupported configuration format: {extension}")]
    UnsupportedFormat {
        /// The file extension that was not supported
        extension: String,
    },
}

/// Configuration source
#[derive(Debug, Clone)]
pub enum ConfigSource {
    /// File path
    File(String),
    /// Raw YAML string
    Yaml(String),
    /// Raw TOML string
    Toml(String),
    /// Raw JSON string
    Json(String),
    /// Default configuration
    Default,
}

/// Configuration loader
pub struct ConfigLoader {
    sources: Vec<ConfigSource>,
    env_prefix: Option<String>,
}

impl ConfigLoader {
    /// Create a new config loader
    #[must_use]
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            env_prefix: None,
        }
    }

    /// Add a configuration source
    #[must_use]
    pub fn with_source(mut self, source: ConfigSource) -> Self {
        self.sources.push(source);
        self
    }

    /// Add a file source
    #[must_use]
    pub fn with_file(self, path: impl Into<String>) -> Self {
        self.with_source(ConfigSource::File(path.into()))
    }

    /// Set environment variable prefix for overrides
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    /// Load configuration from all sources.
    ///
    /// Later sources override earlier ones; environment overrides are
    /// applied last, then the result is validated.
    ///
    /// # Errors
    /// Returns error if any source fails to load or validate
    pub async fn load(self) -> Result<GatewayConfig, ConfigError> {
        let mut config = GatewayConfig::default();

        for source in self.sources {
            let overlay = Self::load_source(&source).await?;
            config = Self::merge_configs(config, overlay);
        }

        if let Some(ref prefix) = self.env_prefix {
            config = Self::apply_env_overrides(config, prefix);
        }

        config
            .validate_config()
            .map_err(|e| ConfigError::Validation(format!("{e:?}")))?;

        info!("Configuration loaded successfully");
        Ok(config)
    }

    async fn load_source(source: &ConfigSource) -> Result<GatewayConfig, ConfigError> {
        match source {
            ConfigSource::File(path) => Self::load_file(path).await,
            ConfigSource::Yaml(content) => Self::parse_yaml(content),
            ConfigSource::Toml(content) => Self::parse_toml(content),
            ConfigSource::Json(content) => Self::parse_json(content),
            ConfigSource::Default => Ok(GatewayConfig::default()),
        }
    }

    async fn load_file(path: &str) -> Result<GatewayConfig, ConfigError> {
        let path = Path::new(path);

        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let content = fs::read_to_string(path).await?;
        let content = Self::substitute_env_vars(&content);

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        debug!("Loading configuration from {} (format: {})", path.display(), extension);

        match extension.as_str() {
            "yaml" | "yml" => Self::parse_yaml(&content),
            "toml" => Self::parse_toml(&content),
            "json" => Self::parse_json(&content),
            ext => Err(ConfigError::UnsupportedFormat {
                extension: ext.to_string(),
            }),
        }
    }

    fn parse_yaml(content: &str) -> Result<GatewayConfig, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    fn parse_toml(content: &str) -> Result<GatewayConfig, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    fn parse_json(content: &str) -> Result<GatewayConfig, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Substitute environment variables in content.
    ///
    /// Supports `${VAR}` and `${VAR:-default}` syntax. Missing
    /// variables without a default are left in place with a warning;
    /// they may reference optional secrets.
    ///
    /// # Panics
    /// Panics if the regex is invalid (should not happen with static patterns)
    #[allow(clippy::expect_used)]
    fn substitute_env_vars(content: &str) -> String {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").expect("valid regex");
        let mut result = content.to_string();

        for cap in re.captures_iter(content) {
            let full_match = cap.get(0).expect("match exists").as_str();
            let var_spec = cap.get(1).expect("group exists").as_str();

            let (var_name, default) = if let Some(idx) = var_spec.find(":-") {
                (&var_spec[..idx], Some(&var_spec[idx + 2..]))
            } else {
                (var_spec, None)
            };

            match std::env::var(var_name) {
                Ok(value) => {
                    result = result.replace(full_match, &value);
                }
                Err(_) => {
                    if let Some(default_val) = default {
                        result = result.replace(full_match, default_val);
                    } else {
                        warn!("Environment variable not found: {}", var_name);
                    }
                }
            }
        }

        result
    }

    /// Merge two configurations (later overrides earlier)
    fn merge_configs(base: GatewayConfig, overlay: GatewayConfig) -> GatewayConfig {
        GatewayConfig {
            server: overlay.server,
            providers: if overlay.providers.is_empty() {
                base.providers
            } else {
                overlay.providers
            },
            routing: overlay.routing,
            circuit_breaker: overlay.circuit_breaker,
            cache: overlay.cache,
            budget: overlay.budget,
            pricing: overlay.pricing,
            observability: overlay.observability,
        }
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(mut config: GatewayConfig, prefix: &str) -> GatewayConfig {
        if let Ok(port) = std::env::var(format!("{prefix}_SERVER_PORT")) {
            if let Ok(port) = port.parse() {
                config.server.port = port;
            }
        }

        if let Ok(host) = std::env::var(format!("{prefix}_SERVER_HOST")) {
            config.server.host = host;
        }

        if let Ok(level) = std::env::var(format!("{prefix}_LOG_LEVEL")) {
            config.observability.logging.level = level;
        }

        if let Ok(enabled) = std::env::var(format!("{prefix}_METRICS_ENABLED")) {
            config.observability.metrics.enabled = enabled.parse().unwrap_or(true);
        }

        if let Ok(enabled) = std::env::var(format!("{prefix}_CACHE_ENABLED")) {
            config.cache.enabled = enabled.parse().unwrap_or(true);
        }

        if let Ok(limit) = std::env::var(format!("{prefix}_BUDGET_DEFAULT_LIMIT_USD")) {
            if let Ok(limit) = limit.parse() {
                config.budget.default_limit_usd = limit;
            }
        }

        config
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Load configuration from default locations
///
/// Looks for configuration in order:
/// 1. Path from CONFIG_PATH environment variable
/// 2. ./config.yaml
/// 3. ./config/default.yaml
/// 4. /etc/modelgate/config.yaml
///
/// # Errors
/// Returns error if no configuration is found or parsing fails
pub async fn load_config() -> Result<GatewayConfig, ConfigError> {
    let config_path = std::env::var("CONFIG_PATH").ok();

    let search_paths = if let Some(ref path) = config_path {
        vec![path.as_str()]
    } else {
        vec![
            "config.yaml",
            "config.yml",
            "config/default.yaml",
            "config/default.yml",
            "/etc/modelgate/config.yaml",
        ]
    };

    for path in &search_paths {
        if Path::new(path).exists() {
            info!("Loading configuration from: {}", path);
            return ConfigLoader::new()
                .with_file(*path)
                .with_env_prefix("MODELGATE")
                .load()
                .await;
        }
    }

    warn!("No configuration file found, using defaults");
    Ok(GatewayConfig::default())
}
