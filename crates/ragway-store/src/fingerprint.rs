//! Content fingerprints for the response cache.

use ragway_core::ChatMessage;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// SHA-256 of the canonical `(provider, model, messages)` triple, hex encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(provider: &str, model: &str, messages: &[ChatMessage]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(canonical_json(provider, model, messages).as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// Rebuild a key read back from the database.
    pub(crate) fn from_stored(hex_digest: String) -> Self {
        Self(hex_digest)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// Field order is the serialized key order and must stay alphabetical.
#[derive(Serialize)]
struct CanonicalMessage<'a> {
    content: &'a str,
    role: &'a str,
}

#[derive(Serialize)]
struct Canonical<'a> {
    messages: Vec<CanonicalMessage<'a>>,
    model: &'a str,
    provider: &'a str,
}

/// Compact JSON with keys in sorted order and messages in conversation order.
fn canonical_json(provider: &str, model: &str, messages: &[ChatMessage]) -> String {
    let canonical = Canonical {
        messages: messages
            .iter()
            .map(|m| CanonicalMessage {
                content: &m.content,
                role: m.role.as_str(),
            })
            .collect(),
        model,
        provider,
    };
    // Serializing plain string fields cannot fail.
    serde_json::to_string(&canonical).unwrap_or_default()
}
