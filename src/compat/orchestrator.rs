//! Top-level compatibility check orchestration
//!
//! Drives one query batch through the stages
//! `Received -> PackageLevelResolved -> ApiLevelResolved ->
//! RecommendationsAttached -> Done`. A failure at any stage degrades the
//! affected entries to an unknown verdict; one bad package never blocks the
//! rest of the batch.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::compat::cache::ResultCache;
use crate::compat::checker::SourceChecker;
use crate::compat::checkers::{FallbackChecker, PlatformSdkChecker, RegistryChecker};
use crate::compat::decision::{decide, decide_api, upgrade_candidates};
use crate::compat::error::{BatchError, FetchError, ResolveError};
use crate::compat::recommendation::{RecommendationLookup, RecommendationResult};
use crate::compat::resolver::DedupResolver;
use crate::compat::types::{
    AnalysisResult, ApiEntity, AssessmentMode, CompatibilityResult, PackageFacts,
    PackageIdentity, Recommendation, Verdict,
};
use crate::config::{DEFAULT_DATA_BASE_URL, EngineConfig};

/// One batch of compatibility questions
#[derive(Debug, Clone)]
pub struct AnalysisQuery {
    pub target_platform: String,
    pub mode: AssessmentMode,
    /// Package identities with the API usages observed under each
    pub packages: HashMap<PackageIdentity, HashSet<ApiEntity>>,
}

/// Verdict and recommendation for one package plus its APIs
#[derive(Debug, Clone, PartialEq)]
pub struct PackageAnalysis {
    pub package: AnalysisResult,
    /// Keyed by the API's original signature
    pub apis: HashMap<String, AnalysisResult>,
}

#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub target_platform: String,
    pub packages: HashMap<PackageIdentity, PackageAnalysis>,
}

/// Per-API working state
struct ApiState {
    result: AnalysisResult,
    cached: bool,
}

/// Per-identity working state carried between the batch stages
struct EntryState {
    apis: HashSet<ApiEntity>,
    facts: Option<Arc<PackageFacts>>,
    cached: bool,
    package: AnalysisResult,
    api_results: HashMap<String, ApiState>,
}

/// Entry point for compatibility analysis batches
pub struct CompatOrchestrator {
    resolver: Arc<DedupResolver>,
    recommendations: Arc<RecommendationLookup>,
    cache: Arc<ResultCache>,
}

impl CompatOrchestrator {
    pub fn new(
        resolver: Arc<DedupResolver>,
        recommendations: Arc<RecommendationLookup>,
        cache: Arc<ResultCache>,
    ) -> Self {
        Self {
            resolver,
            recommendations,
            cache,
        }
    }

    /// Wire up the orchestrator from configuration, with checkers in
    /// priority order: SDK enumeration, registry metadata, fallback
    /// catalogue
    pub fn from_config(config: &EngineConfig) -> Self {
        let base = |override_url: &Option<String>| {
            override_url
                .clone()
                .unwrap_or_else(|| DEFAULT_DATA_BASE_URL.to_string())
        };

        let mut checkers: Vec<Arc<dyn SourceChecker>> = Vec::new();
        if config.sources.platform_sdk.enabled {
            checkers.push(Arc::new(PlatformSdkChecker::new(&base(
                &config.sources.platform_sdk.base_url,
            ))));
        }
        if config.sources.registry.enabled {
            checkers.push(Arc::new(RegistryChecker::new(&base(
                &config.sources.registry.base_url,
            ))));
        }
        if config.sources.fallback.enabled {
            checkers.push(Arc::new(FallbackChecker::new(&base(
                &config.sources.fallback.base_url,
            ))));
        }

        Self::new(
            Arc::new(DedupResolver::new(checkers)),
            Arc::new(RecommendationLookup::new(&base(
                &config.recommendations.base_url,
            ))),
            Arc::new(ResultCache::new()),
        )
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// Run one query batch to completion
    pub async fn analyze(&self, query: AnalysisQuery) -> Result<AnalysisReport, BatchError> {
        validate(&query)?;
        debug!(
            "Batch received: {} packages, target '{}'",
            query.packages.len(),
            query.target_platform
        );

        let mut entries = self.resolve_package_level(&query).await;
        debug!("Batch stage: PackageLevelResolved");

        self.resolve_api_level(&query, &mut entries);
        debug!("Batch stage: ApiLevelResolved");

        self.attach_recommendations(&query, &mut entries).await;
        debug!("Batch stage: RecommendationsAttached");

        let report = self.finish(&query, entries);
        info!(
            "Batch done: {} packages analyzed for '{}'",
            report.packages.len(),
            query.target_platform
        );
        Ok(report)
    }

    /// Consult the cache, resolve the misses, and compute package-level
    /// verdicts
    async fn resolve_package_level(
        &self,
        query: &AnalysisQuery,
    ) -> HashMap<PackageIdentity, EntryState> {
        let target = &query.target_platform;

        let mut entries: HashMap<PackageIdentity, EntryState> = HashMap::new();
        let mut to_resolve: HashSet<PackageIdentity> = HashSet::new();

        for (identity, apis) in &query.packages {
            let key = ResultCache::package_key(target, identity);
            match self.cache.get(&key) {
                Some(cached) => {
                    debug!("Cache hit for {}", key);
                    entries.insert(
                        identity.clone(),
                        EntryState {
                            apis: apis.clone(),
                            facts: None,
                            cached: true,
                            package: (*cached).clone(),
                            api_results: HashMap::new(),
                        },
                    );
                }
                None => {
                    to_resolve.insert(identity.clone());
                }
            }
        }

        if to_resolve.is_empty() {
            return entries;
        }

        let futures = self.resolver.resolve(&to_resolve);
        let settled = join_all(
            futures
                .into_iter()
                .map(|(identity, future)| async move { (identity, future.await) }),
        )
        .await;

        for (identity, outcome) in settled {
            let apis = query.packages[&identity].clone();
            let (facts, compatibility) = match outcome {
                Ok(facts) => {
                    let result = decide(
                        &identity.version,
                        facts.compatible_versions_for(target),
                        facts.deprecated,
                    );
                    (Some(facts), result)
                }
                Err(err) => {
                    warn!("Degrading {} after resolution failure: {}", identity, err);
                    (None, degraded_result(&err))
                }
            };

            entries.insert(
                identity,
                EntryState {
                    apis,
                    facts,
                    cached: false,
                    package: AnalysisResult {
                        compatibility,
                        recommendation: Recommendation::none(),
                    },
                    api_results: HashMap::new(),
                },
            );
        }

        entries
    }

    /// Compute per-API verdicts, honoring cached API entries
    fn resolve_api_level(
        &self,
        query: &AnalysisQuery,
        entries: &mut HashMap<PackageIdentity, EntryState>,
    ) {
        let target = &query.target_platform;

        for (identity, entry) in entries.iter_mut() {
            for api in &entry.apis {
                let key = ResultCache::api_key(target, identity, api);
                if let Some(cached) = self.cache.get(&key) {
                    entry.api_results.insert(
                        api.original_signature.clone(),
                        ApiState {
                            result: (*cached).clone(),
                            cached: true,
                        },
                    );
                    continue;
                }

                let compatibility = match &entry.facts {
                    Some(facts) => decide_api(&entry.package.compatibility, facts, api),
                    // No facts (resolution failed, or the package verdict
                    // came from the cache): the package-level answer stands.
                    None => entry.package.compatibility.clone(),
                };
                entry.api_results.insert(
                    api.original_signature.clone(),
                    ApiState {
                        result: AnalysisResult {
                            compatibility,
                            recommendation: Recommendation::none(),
                        },
                        cached: false,
                    },
                );
            }
        }
    }

    /// Attach upgrade or replacement recommendations per entry
    async fn attach_recommendations(
        &self,
        query: &AnalysisQuery,
        entries: &mut HashMap<PackageIdentity, EntryState>,
    ) {
        if !query.mode.wants_recommendations() {
            return;
        }

        let target = &query.target_platform;

        // Namespace guidance is only consulted for APIs that are
        // incompatible with no version upgrade available.
        let namespaces: HashSet<String> = entries
            .values()
            .flat_map(|entry| {
                entry.apis.iter().filter(|api| {
                    entry
                        .api_results
                        .get(&api.original_signature)
                        .is_some_and(|state| {
                            !state.cached
                                && state.result.compatibility.verdict == Verdict::Incompatible
                                && upgrade_candidates(&state.result.compatibility).is_empty()
                        })
                })
            })
            .map(|api| api.namespace.clone())
            .collect();

        let guidance: HashMap<String, RecommendationResult> = if namespaces.is_empty() {
            HashMap::new()
        } else {
            self.recommendations.get_recommendations(&namespaces).await
        };

        for entry in entries.values_mut() {
            if !entry.cached {
                entry.package.recommendation =
                    package_recommendation(&entry.package.compatibility);
            }

            for api in &entry.apis {
                let Some(state) = entry.api_results.get_mut(&api.original_signature) else {
                    continue;
                };
                if state.cached {
                    continue;
                }
                state.result.recommendation =
                    api_recommendation(&state.result.compatibility, api, &guidance, target);
            }
        }
    }

    /// Assemble the final report and populate the cache
    fn finish(
        &self,
        query: &AnalysisQuery,
        entries: HashMap<PackageIdentity, EntryState>,
    ) -> AnalysisReport {
        let target = &query.target_platform;
        let mut packages = HashMap::new();

        for (identity, entry) in entries {
            // Only results derived from successfully resolved facts are
            // cached; degraded verdicts stay re-queryable.
            if !entry.cached && entry.facts.is_some() {
                let key = ResultCache::package_key(target, &identity);
                self.cache.add(&key, entry.package.clone());
            }

            let mut apis = HashMap::new();
            for api in &entry.apis {
                let Some(state) = entry.api_results.get(&api.original_signature) else {
                    continue;
                };

                if !state.cached && entry.facts.is_some() {
                    let key = ResultCache::api_key(target, &identity, api);
                    self.cache.add(&key, state.result.clone());
                }
                apis.insert(api.original_signature.clone(), state.result.clone());
            }

            packages.insert(
                identity,
                PackageAnalysis {
                    package: entry.package,
                    apis,
                },
            );
        }

        AnalysisReport {
            target_platform: target.clone(),
            packages,
        }
    }
}

fn validate(query: &AnalysisQuery) -> Result<(), BatchError> {
    let mut reasons = Vec::new();

    if query.target_platform.trim().is_empty() {
        reasons.push("target platform is empty".to_string());
    }

    for identity in query.packages.keys() {
        if identity.package_id.trim().is_empty() {
            reasons.push(format!("package id is empty for '{}'", identity));
        }
        if identity.version.trim().is_empty() {
            reasons.push(format!("version is empty for '{}'", identity.package_id));
        }
    }

    if reasons.is_empty() {
        Ok(())
    } else {
        Err(BatchError { reasons })
    }
}

/// Map a resolution failure onto the degraded verdict family
fn degraded_result(err: &ResolveError) -> CompatibilityResult {
    let verdict = match err.cause() {
        Some(FetchError::OutOfResource { .. }) => Verdict::OutOfMemoryParseError,
        Some(FetchError::DataDecode(_)) => Verdict::GeneralParseError,
        _ => Verdict::Unknown,
    };
    CompatibilityResult::verdict_only(verdict)
}

fn package_recommendation(result: &CompatibilityResult) -> Recommendation {
    let candidates = upgrade_candidates(result);
    if result.verdict == Verdict::Incompatible && !candidates.is_empty() {
        Recommendation::upgrade(candidates)
    } else {
        Recommendation::none()
    }
}

fn api_recommendation(
    result: &CompatibilityResult,
    api: &ApiEntity,
    guidance: &HashMap<String, RecommendationResult>,
    target_platform: &str,
) -> Recommendation {
    if result.verdict != Verdict::Incompatible {
        return Recommendation::none();
    }

    let candidates = upgrade_candidates(result);
    if !candidates.is_empty() {
        return Recommendation::upgrade(candidates);
    }

    match guidance.get(&api.namespace) {
        Some(Ok(data)) => data
            .guidance_for(&api.original_signature, target_platform)
            .map(|g| Recommendation::replace_api(&g.replacement))
            .unwrap_or_else(Recommendation::none),
        _ => Recommendation::none(),
    }
}
