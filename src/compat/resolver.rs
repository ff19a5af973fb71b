//! Deduplicating resolver: fans batches of package identities out to the
//! ranked source checkers, settling exactly one shared future per distinct
//! identity

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tokio::sync::oneshot;
use tracing::{debug, error, warn};

use crate::compat::checker::SourceChecker;
use crate::compat::error::{FetchError, ResolveError};
use crate::compat::types::{PackageFacts, PackageIdentity};

pub type FactsResult = Result<Arc<PackageFacts>, ResolveError>;

/// Cloneable handle to one identity's pending or settled resolution
pub type FactsFuture = Shared<BoxFuture<'static, FactsResult>>;

type InflightTable = Arc<Mutex<HashMap<PackageIdentity, FactsFuture>>>;

/// Resolves package identities against a ranked list of source checkers,
/// deduplicating concurrent requests for the same identity.
///
/// Each distinct identity gets exactly one in-flight future; callers asking
/// for an identity that is already being resolved receive a handle to the
/// existing future and no duplicate upstream fetch is issued. Checkers run
/// strictly in priority order within one batch; separate batches interleave
/// independently.
pub struct DedupResolver {
    checkers: Vec<Arc<dyn SourceChecker>>,
    inflight: InflightTable,
}

impl DedupResolver {
    pub fn new(checkers: Vec<Arc<dyn SourceChecker>>) -> Self {
        Self {
            checkers,
            inflight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Start (or join) resolution for a set of identities, returning one
    /// future per identity.
    ///
    /// Identities not already in flight are registered and driven through
    /// the checker chain on a background task; the rest reuse their
    /// existing future.
    pub fn resolve(&self, identities: &HashSet<PackageIdentity>) -> HashMap<PackageIdentity, FactsFuture> {
        let mut futures = HashMap::new();
        let mut senders: HashMap<PackageIdentity, oneshot::Sender<FactsResult>> = HashMap::new();

        {
            // A poisoned lock only means another resolver task panicked while
            // holding it; the table itself is still usable.
            let mut inflight = self
                .inflight
                .lock()
                .unwrap_or_else(PoisonError::into_inner);

            for identity in identities {
                if let Some(existing) = inflight.get(identity) {
                    debug!("Joining in-flight resolution for {}", identity);
                    futures.insert(identity.clone(), existing.clone());
                    continue;
                }

                let (tx, rx) = oneshot::channel();
                let abandoned = ResolveError::Abandoned {
                    identity: identity.to_string(),
                };
                let future: FactsFuture = async move {
                    rx.await.unwrap_or_else(|_| Err(abandoned))
                }
                .boxed()
                .shared();

                inflight.insert(identity.clone(), future.clone());
                senders.insert(identity.clone(), tx);
                futures.insert(identity.clone(), future);
            }
        }

        if !senders.is_empty() {
            debug!("Resolving {} new identities", senders.len());
            tokio::spawn(run_checker_chain(
                self.checkers.clone(),
                Arc::clone(&self.inflight),
                senders,
            ));
        }

        futures
    }
}

fn settle(inflight: &InflightTable, identity: &PackageIdentity) {
    inflight
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .remove(identity);
}

/// Drive the ranked checkers over one batch's unsettled identities.
///
/// Each checker sees only the identities the previous checkers left
/// unresolved; an identity settled by one checker is never re-attempted. A
/// checker failing outright is logged and skipped, its error retained as
/// the candidate cause for identities nothing ends up resolving.
async fn run_checker_chain(
    checkers: Vec<Arc<dyn SourceChecker>>,
    inflight: InflightTable,
    mut senders: HashMap<PackageIdentity, oneshot::Sender<FactsResult>>,
) {
    let mut last_errors: HashMap<PackageIdentity, Arc<FetchError>> = HashMap::new();

    for checker in &checkers {
        if senders.is_empty() {
            break;
        }

        let unresolved: Vec<PackageIdentity> = senders.keys().cloned().collect();
        debug!(
            "Running source checker '{}' over {} unresolved identities",
            checker.name(),
            unresolved.len()
        );

        match checker.check(&unresolved).await {
            Ok(outcome) => {
                for (identity, facts) in outcome.resolved {
                    if let Some(tx) = senders.remove(&identity) {
                        settle(&inflight, &identity);
                        // The receiver half is held by the shared future;
                        // a dropped receiver just means nobody is waiting.
                        let _ = tx.send(Ok(facts));
                    }
                }
                for (identity, err) in outcome.errors {
                    last_errors.insert(identity, Arc::new(err));
                }
            }
            Err(err) => {
                error!(
                    "Source checker '{}' failed, continuing with remaining sources: {}",
                    checker.name(),
                    err
                );
                let shared = Arc::new(err);
                for identity in senders.keys() {
                    last_errors.insert(identity.clone(), Arc::clone(&shared));
                }
            }
        }
    }

    for (identity, tx) in senders {
        settle(&inflight, &identity);
        let cause = last_errors.remove(&identity);
        warn!("No source resolved {}", identity);
        let _ = tx.send(Err(ResolveError::PackageNotFound {
            identity: identity.to_string(),
            cause,
        }));
    }
}
