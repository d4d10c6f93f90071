use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};

/// Analyzer operations whose results may be cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiCacheOperation {
    GoalAnalysis,
}

impl AiCacheOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            AiCacheOperation::GoalAnalysis => "goal",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AiCacheKey {
    operation: AiCacheOperation,
    semantic_hash: String,
}

impl AiCacheKey {
    pub fn new(operation: AiCacheOperation, semantic_hash: impl Into<String>) -> Self {
        Self {
            operation,
            semantic_hash: semantic_hash.into(),
        }
    }

    pub fn operation(&self) -> AiCacheOperation {
        self.operation
    }

    pub fn semantic_hash(&self) -> &str {
        &self.semantic_hash
    }

    /// Row key: SHA-256 over `operation:hash`, base64 without padding.
    pub fn cache_key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.operation.as_str().as_bytes());
        hasher.update(b":");
        hasher.update(self.semantic_hash.as_bytes());
        STANDARD_NO_PAD.encode(hasher.finalize())
    }
}

impl From<&AiCacheKey> for String {
    fn from(value: &AiCacheKey) -> Self {
        value.cache_key()
    }
}
