use std::sync::Arc;

use thiserror::Error;

/// Failure while fetching or decoding a remote data document
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("rate limited: retry after {retry_after_secs:?} seconds")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unexpected status: {0}")]
    UnexpectedStatus(u16),

    #[error("malformed document: {0}")]
    DataDecode(String),

    #[error("document exceeds {limit} decoded bytes")]
    OutOfResource { limit: usize },
}

impl FetchError {
    /// Whether retrying the fetch can plausibly succeed
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Network(_) | FetchError::RateLimited { .. } => true,
            FetchError::UnexpectedStatus(status) => *status >= 500,
            _ => false,
        }
    }
}

/// Per-identity resolution failure published by the deduplicating resolver
///
/// Cloneable so that every waiter on a shared in-flight future receives the
/// same settled value.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    #[error("package not found in any source: {identity}")]
    PackageNotFound {
        identity: String,
        /// Last checker failure seen for this identity, if any
        cause: Option<Arc<FetchError>>,
    },

    #[error("resolution abandoned before settling: {identity}")]
    Abandoned { identity: String },
}

impl ResolveError {
    pub fn cause(&self) -> Option<&FetchError> {
        match self {
            ResolveError::PackageNotFound { cause, .. } => cause.as_deref(),
            ResolveError::Abandoned { .. } => None,
        }
    }
}

/// Per-namespace failure from the recommendation lookup
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecommendationError {
    #[error("namespace not found: {0}")]
    NamespaceNotFound(String),

    #[error("namespace failed to process: {0}")]
    NamespaceProcessingFailed(String),
}

/// Result cache failure
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("snapshot does not parse as a cache map: {0}")]
    MalformedSnapshot(#[from] serde_json::Error),

    #[error("snapshot io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache lock poisoned")]
    LockPoisoned,
}

/// A batch query that is malformed as a whole
///
/// The only case where a caller sees more than one failure reason at once;
/// per-identity resolution failures degrade individual entries instead.
#[derive(Debug, Error)]
#[error("batch query rejected: {}", reasons.join("; "))]
pub struct BatchError {
    pub reasons: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification_matches_retry_policy() {
        assert!(
            FetchError::RateLimited {
                retry_after_secs: Some(1)
            }
            .is_transient()
        );
        assert!(FetchError::UnexpectedStatus(503).is_transient());
        assert!(!FetchError::UnexpectedStatus(400).is_transient());
        assert!(!FetchError::NotFound("Foo".to_string()).is_transient());
        assert!(!FetchError::DataDecode("bad json".to_string()).is_transient());
        assert!(!FetchError::OutOfResource { limit: 1024 }.is_transient());
    }

    #[test]
    fn batch_error_display_lists_every_reason() {
        let err = BatchError {
            reasons: vec![
                "target platform is empty".to_string(),
                "package id is empty for entry 2".to_string(),
            ],
        };

        let rendered = err.to_string();
        assert!(rendered.contains("target platform is empty"));
        assert!(rendered.contains("entry 2"));
    }
}
