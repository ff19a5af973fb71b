//! Source checker trait: resolves package identities against one data source

use std::collections::HashMap;
use std::sync::Arc;

#[cfg(test)]
use mockall::automock;

use crate::compat::error::FetchError;
use crate::compat::types::{PackageFacts, PackageIdentity};

/// Partial result of running one checker over a batch
#[derive(Debug, Default)]
pub struct CheckOutcome {
    /// Identities this source resolved, with their facts
    pub resolved: HashMap<PackageIdentity, Arc<PackageFacts>>,
    /// Identities this source attempted but failed to fetch; kept as the
    /// candidate cause for a final not-found failure. Identities in neither
    /// map are clean misses for this source.
    pub errors: HashMap<PackageIdentity, FetchError>,
}

impl CheckOutcome {
    pub fn resolved_one(identity: PackageIdentity, facts: PackageFacts) -> Self {
        Self {
            resolved: HashMap::from([(identity, Arc::new(facts))]),
            errors: HashMap::new(),
        }
    }
}

/// Trait for resolving a batch of package identities against one data source
///
/// Checkers are independent of each other; the deduplicating resolver runs
/// them in priority order and hands each one only the still-unresolved
/// subset of the batch.
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait SourceChecker: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Attempt to resolve a batch of identities against this source
    ///
    /// # Returns
    /// * `Ok(CheckOutcome)` - Per-identity facts and failures; identities
    ///   absent from both maps were not found in this source
    /// * `Err(FetchError)` - The checker failed outright before producing
    ///   any per-identity result (e.g., its index document is unavailable)
    async fn check(&self, identities: &[PackageIdentity]) -> Result<CheckOutcome, FetchError>;
}
