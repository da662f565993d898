//! The immutable completion request.

use crate::types::{MaxTokens, ModelClass, ModelId, TenantId, UserId, ValidationError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A validated completion request.
///
/// Built once at ingress and never mutated afterwards; every stage of
/// the pipeline sees the same request the caller submitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// The prompt to complete
    pub prompt: String,
    /// Tenant the request is billed to
    pub tenant_id: TenantId,
    /// User within the tenant (for attribution, not billing)
    pub user_id: Option<UserId>,
    /// Maximum tokens to generate
    pub max_tokens: MaxTokens,
    /// Pin routing to the provider serving this exact model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_hint: Option<ModelId>,
    /// Minimum capability class required
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_class: Option<ModelClass>,
    /// Caller-supplied metadata, excluded from fingerprinting
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl CompletionRequest {
    /// Start building a request
    #[must_use]
    pub fn builder() -> CompletionRequestBuilder {
        CompletionRequestBuilder::default()
    }

    /// Effective capability class: the explicit requirement, or
    /// `Standard` when the caller did not ask for one
    #[must_use]
    pub fn required_class(&self) -> ModelClass {
        self.model_class.unwrap_or_default()
    }
}

/// Builder for [`CompletionRequest`]
#[derive(Debug, Default)]
pub struct CompletionRequestBuilder {
    prompt: Option<String>,
    tenant_id: Option<TenantId>,
    user_id: Option<UserId>,
    max_tokens: Option<MaxTokens>,
    model_hint: Option<ModelId>,
    model_class: Option<ModelClass>,
    metadata: BTreeMap<String, String>,
}

impl CompletionRequestBuilder {
    /// Set the prompt
    #[must_use]
    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    /// Set the tenant
    #[must_use]
    pub fn tenant_id(mut self, tenant_id: TenantId) -> Self {
        self.tenant_id = Some(tenant_id);
        self
    }

    /// Set the user
    #[must_use]
    pub fn user_id(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Set max tokens
    #[must_use]
    pub fn max_tokens(mut self, max_tokens: MaxTokens) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Pin routing to a specific model
    #[must_use]
    pub fn model_hint(mut self, hint: ModelId) -> Self {
        self.model_hint = Some(hint);
        self
    }

    /// Require a minimum capability class
    #[must_use]
    pub fn model_class(mut self, class: ModelClass) -> Self {
        self.model_class = Some(class);
        self
    }

    /// Attach a metadata entry
    #[must_use]
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Build and validate the request
    ///
    /// # Errors
    /// Returns a [`ValidationError`] if the prompt is missing or empty,
    /// the tenant is missing, or max_tokens was never set.
    pub fn build(self) -> Result<CompletionRequest, ValidationError> {
        let prompt = self.prompt.unwrap_or_default();
        if prompt.trim().is_empty() {
            return Err(ValidationError::InvalidPrompt {
                reason: "prompt cannot be empty".to_string(),
            });
        }
        let tenant_id = self.tenant_id.ok_or(ValidationError::InvalidTenantId {
            reason: "tenant_id is required".to_string(),
        })?;
        let max_tokens = self.max_tokens.ok_or(ValidationError::InvalidMaxTokens {
            value: 0,
            min: MaxTokens::MIN,
            max: MaxTokens::MAX,
        })?;
        Ok(CompletionRequest {
            prompt,
            tenant_id,
            user_id: self.user_id,
            max_tokens,
            model_hint: self.model_hint,
            model_class: self.model_class,
            metadata: self.metadata,
        })
    }
}
