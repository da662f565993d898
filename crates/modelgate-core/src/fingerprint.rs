//! Deterministic request fingerprints for content-addressed caching.

use crate::request::CompletionRequest;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// SHA-256 fingerprint over the semantic content of a request.
///
/// Two requests that would produce an equivalent completion hash to the
/// same fingerprint. Only the prompt, the effective capability class,
/// the model hint, and max_tokens participate; tenant, user, and
/// metadata are deliberately excluded so identical prompts share cache
/// entries across callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Compute the fingerprint of a request.
    ///
    /// Each variable-length field is length-prefixed before hashing so
    /// that distinct field splits can never collide.
    #[must_use]
    pub fn of(request: &CompletionRequest) -> Self {
        let mut hasher = Sha256::new();

        let prompt = request.prompt.as_bytes();
        hasher.update((prompt.len() as u64).to_be_bytes());
        hasher.update(prompt);

        hasher.update([request.required_class().tag()]);

        match &request.model_hint {
            Some(hint) => {
                let hint = hint.as_str().as_bytes();
                hasher.update([1u8]);
                hasher.update((hint.len() as u64).to_be_bytes());
                hasher.update(hint);
            }
            None => hasher.update([0u8]),
        }

        hasher.update(request.max_tokens.value().to_be_bytes());

        Self(hasher.finalize().into())
    }

    /// Raw digest bytes
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex encoding of the digest
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MaxTokens, ModelClass, ModelId, TenantId};

    fn base_request() -> CompletionRequest {
        CompletionRequest::builder()
            .prompt("summarize this document")
            .tenant_id(TenantId::new("acme").expect("valid tenant"))
            .max_tokens(MaxTokens::new(256).expect("valid"))
            .build()
            .expect("valid request")
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(Fingerprint::of(&base_request()), Fingerprint::of(&base_request()));
    }

    #[test]
    fn test_metadata_and_tenant_excluded() {
        let a = base_request();
        let mut b = base_request();
        b.tenant_id = TenantId::new("other").expect("valid tenant");
        b.metadata.insert("trace".to_string(), "xyz".to_string());
        assert_eq!(Fingerprint::of(&a), Fingerprint::of(&b));
    }

    #[test]
    fn test_prompt_sensitivity() {
        let a = base_request();
        let mut b = base_request();
        b.prompt.push('!');
        assert_ne!(Fingerprint::of(&a), Fingerprint::of(&b));
    }

    #[test]
    fn test_class_sensitivity() {
        let a = base_request();
        let mut b = base_request();
        b.model_class = Some(ModelClass::Advanced);
        assert_ne!(Fingerprint::of(&a), Fingerprint::of(&b));
    }

    #[test]
    fn test_explicit_default_class_matches_absent() {
        let a = base_request();
        let mut b = base_request();
        b.model_class = Some(ModelClass::Standard);
        assert_eq!(Fingerprint::of(&a), Fingerprint::of(&b));
    }

    #[test]
    fn test_hint_sensitivity() {
        let a = base_request();
        let mut b = base_request();
        b.model_hint = Some(ModelId::new("gpt-4o").expect("valid model"));
        assert_ne!(Fingerprint::of(&a), Fingerprint::of(&b));
    }

    #[test]
    fn test_max_tokens_sensitivity() {
        let a = base_request();
        let mut b = base_request();
        b.max_tokens = MaxTokens::new(512).expect("valid");
        assert_ne!(Fingerprint::of(&a), Fingerprint::of(&b));
    }

    #[test]
    fn test_hex_display() {
        let hex = Fingerprint::of(&base_request()).to_hex();
        assert_eq!(hex.len(), 64);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
