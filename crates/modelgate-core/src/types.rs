//! Validated domain newtypes.
//!
//! Identifiers and request parameters are wrapped in newtypes that
//! validate on construction, so the rest of the gateway never handles a
//! malformed value.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU32;
use thiserror::Error;

/// Validation error for domain types
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Prompt validation failed
    #[error("Invalid prompt: {reason}")]
    InvalidPrompt {
        /// Reason for validation failure
        reason: String,
    },

    /// Max tokens value out of range
    #[error("Invalid max_tokens {value}: must be between {min} and {max}")]
    InvalidMaxTokens {
        /// The invalid value provided
        value: u32,
        /// Minimum allowed value
        min: u32,
        /// Maximum allowed value
        max: u32,
    },

    /// Tenant ID validation failed
    #[error("Invalid tenant_id: {reason}")]
    InvalidTenantId {
        /// Reason for validation failure
        reason: String,
    },

    /// User ID validation failed
    #[error("Invalid user_id: {reason}")]
    InvalidUserId {
        /// Reason for validation failure
        reason: String,
    },

    /// Model ID validation failed
    #[error("Invalid model_id: {reason}")]
    InvalidModelId {
        /// Reason for validation failure
        reason: String,
    },

    /// Provider ID validation failed
    #[error("Invalid provider_id: {reason}")]
    InvalidProviderId {
        /// Reason for validation failure
        reason: String,
    },

    /// API key validation failed
    #[error("Invalid api_key: {reason}")]
    InvalidApiKey {
        /// Reason for validation failure
        reason: String,
    },
}

macro_rules! id_newtype {
    ($(#[$doc:meta])* $name:ident, $max:expr, $err:ident, $label:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Maximum length for this identifier
            pub const MAX_LENGTH: usize = $max;

            /// Create a new identifier with validation
            ///
            /// # Errors
            /// Returns a [`ValidationError`] if empty, over-long, or
            /// containing characters outside `[A-Za-z0-9_-]`.
            pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
                let value = value.into();
                if value.is_empty() {
                    return Err(ValidationError::$err {
                        reason: concat!($label, " cannot be empty").to_string(),
                    });
                }
                if value.len() > Self::MAX_LENGTH {
                    return Err(ValidationError::$err {
                        reason: format!(
                            concat!($label, " exceeds maximum length of {}"),
                            Self::MAX_LENGTH
                        ),
                    });
                }
                if !value
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
                {
                    return Err(ValidationError::$err {
                        reason: concat!(
                            $label,
                            " must contain only alphanumeric characters, hyphens, or underscores"
                        )
                        .to_string(),
                    });
                }
                Ok(Self(value))
            }

            /// Get the inner value as a string slice
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

id_newtype!(
    /// Tenant identifier (alphanumeric plus hyphen/underscore)
    TenantId,
    64,
    InvalidTenantId,
    "tenant_id"
);

id_newtype!(
    /// User identifier within a tenant
    UserId,
    64,
    InvalidUserId,
    "user_id"
);

id_newtype!(
    /// Provider identifier
    ProviderId,
    64,
    InvalidProviderId,
    "provider_id"
);

/// Model identifier (non-empty, max 256 chars, free-form)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModelId(String);

impl ModelId {
    /// Maximum length for model ID
    pub const MAX_LENGTH: usize = 256;

    /// Create a new model ID with validation
    ///
    /// # Errors
    /// Returns `ValidationError::InvalidModelId` if empty or exceeds max length
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        if value.is_empty() {
            return Err(ValidationError::InvalidModelId {
                reason: "model_id cannot be empty".to_string(),
            });
        }
        if value.len() > Self::MAX_LENGTH {
            return Err(ValidationError::InvalidModelId {
                reason: format!("model_id exceeds maximum length of {}", Self::MAX_LENGTH),
            });
        }
        Ok(Self(value))
    }

    /// Get the inner value as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ModelId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ModelId> for String {
    fn from(id: ModelId) -> Self {
        id.0
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ModelId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Request identifier, generated at ingress
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(String);

impl RequestId {
    /// Generate a new UUID-based request ID
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Get the inner value as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::generate()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Maximum tokens to generate (1 to 128,000)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct MaxTokens(NonZeroU32);

impl MaxTokens {
    /// Minimum allowed max_tokens
    pub const MIN: u32 = 1;
    /// Absolute upper bound; deployments configure a lower ceiling
    pub const MAX: u32 = 128_000;

    /// Create a new max_tokens value with validation
    ///
    /// # Errors
    /// Returns `ValidationError::InvalidMaxTokens` if value is outside [1, 128000]
    pub fn new(value: u32) -> Result<Self, ValidationError> {
        if !(Self::MIN..=Self::MAX).contains(&value) {
            return Err(ValidationError::InvalidMaxTokens {
                value,
                min: Self::MIN,
                max: Self::MAX,
            });
        }
        NonZeroU32::new(value)
            .map(Self)
            .ok_or(ValidationError::InvalidMaxTokens {
                value,
                min: Self::MIN,
                max: Self::MAX,
            })
    }

    /// Get the inner value
    #[must_use]
    pub fn value(&self) -> u32 {
        self.0.get()
    }
}

impl TryFrom<u32> for MaxTokens {
    type Error = ValidationError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<MaxTokens> for u32 {
    fn from(tokens: MaxTokens) -> Self {
        tokens.value()
    }
}

impl fmt::Display for MaxTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Capability class of a model; requests may demand a minimum class.
///
/// Ordered: `Advanced` can serve a request that asks for `Standard`,
/// never the reverse.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum ModelClass {
    /// Small, fast models for simple completions
    Lightweight,
    /// General-purpose models
    #[default]
    Standard,
    /// Frontier models for hard reasoning tasks
    Advanced,
}

impl ModelClass {
    /// Stable single-byte tag for fingerprinting
    #[must_use]
    pub fn tag(self) -> u8 {
        match self {
            Self::Lightweight => 0,
            Self::Standard => 1,
            Self::Advanced => 2,
        }
    }
}

impl fmt::Display for ModelClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lightweight => write!(f, "lightweight"),
            Self::Standard => write!(f, "standard"),
            Self::Advanced => write!(f, "advanced"),
        }
    }
}

/// Pricing tier of a model; premium tiers are excluded under the
/// prefer-cheaper spend posture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CostTier {
    /// Cheapest tier
    Economy,
    /// Default tier
    #[default]
    Standard,
    /// Most expensive tier
    Premium,
}

impl fmt::Display for CostTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Economy => write!(f, "economy"),
            Self::Standard => write!(f, "standard"),
            Self::Premium => write!(f, "premium"),
        }
    }
}

/// API key (sensitive, never logged)
#[derive(Clone)]
pub struct ApiKey(SecretString);

impl ApiKey {
    /// Create a new API key
    ///
    /// # Errors
    /// Returns `ValidationError::InvalidApiKey` if the key is empty
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        if value.is_empty() {
            return Err(ValidationError::InvalidApiKey {
                reason: "api_key cannot be empty".to_string(),
            });
        }
        Ok(Self(SecretString::new(value)))
    }

    /// Expose the secret value (use sparingly)
    #[must_use]
    pub fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApiKey([REDACTED])")
    }
}

impl fmt::Display for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}
