//! Namespace-keyed lookup of human-authored replacement guidance

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::future::join_all;
use serde::Deserialize;
use tokio::sync::{OnceCell, Semaphore};
use tracing::{debug, info, warn};

use crate::compat::decision::extension_call_signature;
use crate::compat::error::{FetchError, RecommendationError};
use crate::compat::fetch::{check_status, decode_json_document, http_client};
use crate::compat::retry::fetch_with_backoff;
use crate::config::RECOMMENDATION_FETCH_PERMITS;

/// One piece of replacement guidance inside a namespace document
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiGuidance {
    /// Signature of the API the guidance applies to
    pub signature: String,
    /// Human-authored replacement text
    pub replacement: String,
    /// Target platforms the guidance applies to; empty means all
    #[serde(default)]
    pub targets: Vec<String>,
}

/// Parsed content of one recommendation data file
///
/// Several namespaces may share one file; each of them settles with the
/// same parsed content.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationData {
    #[serde(default)]
    pub apis: Vec<ApiGuidance>,
}

impl RecommendationData {
    /// Guidance for a signature, matching the exact form first and the
    /// synthesized extension-call form second
    pub fn guidance_for(&self, signature: &str, target_platform: &str) -> Option<&ApiGuidance> {
        let applies = |guidance: &&ApiGuidance| {
            guidance.targets.is_empty()
                || guidance.targets.iter().any(|t| t == target_platform)
        };

        self.apis
            .iter()
            .filter(applies)
            .find(|guidance| guidance.signature == signature)
            .or_else(|| {
                let synthesized = extension_call_signature(signature)?;
                self.apis
                    .iter()
                    .filter(applies)
                    .find(|guidance| guidance.signature == synthesized)
            })
    }
}

pub type RecommendationResult = Result<Arc<RecommendationData>, RecommendationError>;

/// Fetches replacement guidance documents keyed by namespace
///
/// A manifest mapping namespace -> data file is loaded once per process and
/// reused. Within a batch every distinct data file is fetched at most once,
/// and concurrent fetches are bounded by a counting semaphore.
pub struct RecommendationLookup {
    client: reqwest::Client,
    base_url: String,
    manifest: OnceCell<HashMap<String, String>>,
    fetch_permits: Arc<Semaphore>,
}

impl RecommendationLookup {
    /// Creates a new RecommendationLookup with a custom base URL
    pub fn new(base_url: &str) -> Self {
        Self {
            client: http_client(),
            base_url: base_url.to_string(),
            manifest: OnceCell::new(),
            fetch_permits: Arc::new(Semaphore::new(RECOMMENDATION_FETCH_PERMITS)),
        }
    }

    async fn load_manifest(&self) -> Result<HashMap<String, String>, FetchError> {
        let url = format!("{}/recommendations/manifest.json", self.base_url);

        let manifest: HashMap<String, String> =
            fetch_with_backoff("recommendation manifest fetch", || async {
                let response = self.client.get(&url).send().await?;
                check_status(&response, "recommendation manifest")?;
                response
                    .json()
                    .await
                    .map_err(|e| FetchError::DataDecode(e.to_string()))
            })
            .await?;

        info!(
            "Loaded recommendation manifest with {} namespaces",
            manifest.len()
        );
        Ok(manifest)
    }

    async fn manifest(&self) -> Result<&HashMap<String, String>, FetchError> {
        self.manifest.get_or_try_init(|| self.load_manifest()).await
    }

    async fn fetch_file(&self, file_name: &str) -> Result<RecommendationData, FetchError> {
        let _permit = self
            .fetch_permits
            .acquire()
            .await
            .map_err(|_| FetchError::DataDecode("semaphore closed".to_string()))?;

        let url = format!("{}/recommendations/{}", self.base_url, file_name);

        let bytes = fetch_with_backoff(&format!("recommendation fetch for {}", file_name), || async {
            let response = self.client.get(&url).send().await?;
            check_status(&response, file_name)?;
            Ok(response.bytes().await?)
        })
        .await?;

        decode_json_document(file_name, &bytes)
    }

    /// Resolve replacement guidance for a set of namespaces
    ///
    /// Namespaces absent from the manifest settle immediately with
    /// `NamespaceNotFound`; namespaces whose data file fails to fetch or
    /// parse settle with `NamespaceProcessingFailed`; every namespace
    /// sharing a successfully-fetched file settles with that file's parsed
    /// content. One namespace failing never blocks its siblings.
    pub async fn get_recommendations(
        &self,
        namespaces: &HashSet<String>,
    ) -> HashMap<String, RecommendationResult> {
        let mut results: HashMap<String, RecommendationResult> = HashMap::new();

        let manifest = match self.manifest().await {
            Ok(manifest) => manifest,
            Err(err) => {
                warn!("Recommendation manifest unavailable: {}", err);
                for namespace in namespaces {
                    results.insert(
                        namespace.clone(),
                        Err(RecommendationError::NamespaceProcessingFailed(
                            namespace.clone(),
                        )),
                    );
                }
                return results;
            }
        };

        // Group namespaces by data file so shared files are fetched once.
        let mut by_file: HashMap<&str, Vec<&str>> = HashMap::new();
        for namespace in namespaces {
            match manifest.get(namespace) {
                Some(file_name) => by_file.entry(file_name).or_default().push(namespace),
                None => {
                    debug!("Namespace not in recommendation manifest: {}", namespace);
                    results.insert(
                        namespace.clone(),
                        Err(RecommendationError::NamespaceNotFound(namespace.clone())),
                    );
                }
            }
        }

        let fetches = by_file.into_iter().map(|(file_name, group)| async move {
            (file_name, group, self.fetch_file(file_name).await)
        });

        for (file_name, group, fetched) in join_all(fetches).await {
            match fetched {
                Ok(data) => {
                    let data = Arc::new(data);
                    for namespace in group {
                        results.insert(namespace.to_string(), Ok(Arc::clone(&data)));
                    }
                }
                Err(err) => {
                    warn!("Recommendation file {} failed to process: {}", file_name, err);
                    for namespace in group {
                        results.insert(
                            namespace.to_string(),
                            Err(RecommendationError::NamespaceProcessingFailed(
                                namespace.to_string(),
                            )),
                        );
                    }
                }
            }
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    const MANIFEST: &str = r#"{
        "Legacy.Net": "legacy.net.json",
        "Legacy.Net.Sockets": "legacy.net.json",
        "Old.Xml": "old.xml.json"
    }"#;

    fn namespaces(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn namespaces_sharing_a_file_settle_with_one_fetch() {
        let mut server = Server::new_async().await;

        let _manifest = server
            .mock("GET", "/recommendations/manifest.json")
            .with_status(200)
            .with_body(MANIFEST)
            .create_async()
            .await;
        let file_mock = server
            .mock("GET", "/recommendations/legacy.net.json")
            .with_status(200)
            .with_body(
                r#"{"apis": [{"signature": "Legacy.Net.Dial(String)", "replacement": "Use Modern.Net.Connect"}]}"#,
            )
            .expect(1)
            .create_async()
            .await;

        let lookup = RecommendationLookup::new(&server.url());
        let results = lookup
            .get_recommendations(&namespaces(&["Legacy.Net", "Legacy.Net.Sockets"]))
            .await;

        file_mock.assert_async().await;
        let a = results["Legacy.Net"].as_ref().unwrap();
        let b = results["Legacy.Net.Sockets"].as_ref().unwrap();
        assert_eq!(a.apis.len(), 1);
        assert!(Arc::ptr_eq(a, b));
    }

    #[tokio::test]
    async fn unknown_namespace_settles_not_found_without_blocking_siblings() {
        let mut server = Server::new_async().await;

        let _manifest = server
            .mock("GET", "/recommendations/manifest.json")
            .with_status(200)
            .with_body(MANIFEST)
            .create_async()
            .await;
        let _file = server
            .mock("GET", "/recommendations/old.xml.json")
            .with_status(200)
            .with_body(r#"{"apis": []}"#)
            .create_async()
            .await;

        let lookup = RecommendationLookup::new(&server.url());
        let results = lookup
            .get_recommendations(&namespaces(&["Unknown.Ns", "Old.Xml"]))
            .await;

        assert_eq!(
            results["Unknown.Ns"],
            Err(RecommendationError::NamespaceNotFound(
                "Unknown.Ns".to_string()
            ))
        );
        assert!(results["Old.Xml"].is_ok());
    }

    #[tokio::test]
    async fn failed_file_fetch_settles_processing_failed_for_its_namespaces() {
        let mut server = Server::new_async().await;

        let _manifest = server
            .mock("GET", "/recommendations/manifest.json")
            .with_status(200)
            .with_body(MANIFEST)
            .create_async()
            .await;
        let _file = server
            .mock("GET", "/recommendations/old.xml.json")
            .with_status(200)
            .with_body("{malformed")
            .create_async()
            .await;

        let lookup = RecommendationLookup::new(&server.url());
        let results = lookup.get_recommendations(&namespaces(&["Old.Xml"])).await;

        assert_eq!(
            results["Old.Xml"],
            Err(RecommendationError::NamespaceProcessingFailed(
                "Old.Xml".to_string()
            ))
        );
    }

    #[tokio::test]
    async fn manifest_is_loaded_once_across_batches() {
        let mut server = Server::new_async().await;

        let manifest_mock = server
            .mock("GET", "/recommendations/manifest.json")
            .with_status(200)
            .with_body(MANIFEST)
            .expect(1)
            .create_async()
            .await;
        let _file = server
            .mock("GET", "/recommendations/old.xml.json")
            .with_status(200)
            .with_body(r#"{"apis": []}"#)
            .create_async()
            .await;

        let lookup = RecommendationLookup::new(&server.url());
        lookup.get_recommendations(&namespaces(&["Old.Xml"])).await;
        lookup.get_recommendations(&namespaces(&["Old.Xml"])).await;

        manifest_mock.assert_async().await;
    }

    #[test]
    fn guidance_lookup_matches_extension_call_form() {
        let data = RecommendationData {
            apis: vec![ApiGuidance {
                signature: "Ns.Text.Pad(Int32)".to_string(),
                replacement: "Use Modern.Text.Pad".to_string(),
                targets: vec![],
            }],
        };

        let found = data.guidance_for("Ns.Extensions.Pad(Ns.Text, Int32)", "p1");
        assert_eq!(found.unwrap().replacement, "Use Modern.Text.Pad");
    }

    #[test]
    fn guidance_lookup_respects_target_filter() {
        let data = RecommendationData {
            apis: vec![ApiGuidance {
                signature: "Old.Xml.Load(String)".to_string(),
                replacement: "Use New.Xml.Load".to_string(),
                targets: vec!["p2".to_string()],
            }],
        };

        assert!(data.guidance_for("Old.Xml.Load(String)", "p2").is_some());
        assert!(data.guidance_for("Old.Xml.Load(String)", "p1").is_none());
    }
}
