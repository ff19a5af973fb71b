//! Package-registry metadata source checker

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Deserialize;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::compat::checker::{CheckOutcome, SourceChecker};
use crate::compat::error::FetchError;
use crate::compat::fetch::{check_status, decode_gzip_json, http_client};
use crate::compat::retry::fetch_with_backoff;
use crate::compat::semver::parse_version;
use crate::compat::types::{PackageFacts, PackageIdentity};
use crate::config::{FETCH_STAGGER_DELAY_MS, MAX_DECODED_DOCUMENT_BYTES};

/// Compatibility document published per package, gzip JSON
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PackageDocument {
    pub package_id: String,
    #[serde(default)]
    pub versions: Vec<String>,
    /// Target platform -> versions known compatible with that target
    #[serde(default)]
    pub targets: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub deprecated: bool,
    /// Per-API compatibility flags keyed by original signature
    #[serde(default)]
    pub apis: HashMap<String, bool>,
}

impl PackageDocument {
    /// Convert into facts, sorting every target's version list ascending so
    /// downstream consumers never depend on publication order
    pub(crate) fn into_facts(mut self) -> PackageFacts {
        for versions in self.targets.values_mut() {
            versions.sort_by(|a, b| match (parse_version(a), parse_version(b)) {
                (Some(a), Some(b)) => a.cmp(&b),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            });
        }

        PackageFacts {
            package_id: self.package_id,
            versions: self.versions,
            target_versions: self.targets,
            deprecated: self.deprecated,
            api_compatibility: self.apis,
        }
    }
}

/// Source checker backed by the per-package registry metadata store
///
/// Each package's document lives at a deterministic path derived from the
/// lowercased package id, so equal identities always hit the same object.
pub struct RegistryChecker {
    client: reqwest::Client,
    base_url: String,
}

impl RegistryChecker {
    /// Creates a new RegistryChecker with a custom base URL
    pub fn new(base_url: &str) -> Self {
        Self {
            client: http_client(),
            base_url: base_url.to_string(),
        }
    }

    fn document_url(&self, package_id: &str) -> String {
        format!("{}/packages/{}.json.gz", self.base_url, package_id.to_lowercase())
    }

    async fn fetch_document(&self, identity: &PackageIdentity) -> Result<PackageFacts, FetchError> {
        let url = self.document_url(&identity.package_id);

        let bytes = fetch_with_backoff(&format!("registry fetch for {}", identity), || async {
            let response = self.client.get(&url).send().await?;
            check_status(&response, &identity.package_id)?;
            Ok(response.bytes().await?)
        })
        .await?;

        let document: PackageDocument = decode_gzip_json(&bytes, MAX_DECODED_DOCUMENT_BYTES)?;
        Ok(document.into_facts())
    }
}

#[async_trait::async_trait]
impl SourceChecker for RegistryChecker {
    fn name(&self) -> &'static str {
        "registry"
    }

    async fn check(&self, identities: &[PackageIdentity]) -> Result<CheckOutcome, FetchError> {
        let fetches = identities.iter().enumerate().map(|(i, identity)| {
            let delay = Duration::from_millis(FETCH_STAGGER_DELAY_MS * i as u64);
            async move {
                sleep(delay).await;
                (identity, self.fetch_document(identity).await)
            }
        });

        let mut outcome = CheckOutcome::default();
        for (identity, result) in join_all(fetches).await {
            match result {
                Ok(facts) => {
                    outcome.resolved.insert(identity.clone(), Arc::new(facts));
                }
                Err(FetchError::NotFound(_)) => {
                    debug!("Package not in registry store: {}", identity);
                }
                Err(err) => {
                    warn!("Registry fetch failed for {}: {}", identity, err);
                    outcome.errors.insert(identity.clone(), err);
                }
            }
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compat::fetch::gzip_bytes;
    use crate::compat::types::SourceType;
    use mockito::Server;

    fn identity(id: &str, version: &str) -> PackageIdentity {
        PackageIdentity::new(id, version, SourceType::Registry)
    }

    #[tokio::test]
    async fn check_resolves_a_package_from_its_document() {
        let mut server = Server::new_async().await;

        let body = gzip_bytes(
            br#"{
                "packageId": "Newtonsoft.Json",
                "versions": ["12.0.1", "12.0.3"],
                "targets": { "p1": ["12.0.4", "12.0.3"] },
                "deprecated": false,
                "apis": { "Newtonsoft.Json.JsonConvert.SerializeObject(Object)": true }
            }"#,
        );

        let mock = server
            .mock("GET", "/packages/newtonsoft.json.json.gz")
            .with_status(200)
            .with_header("content-type", "application/octet-stream")
            .with_body(body)
            .create_async()
            .await;

        let checker = RegistryChecker::new(&server.url());
        let id = identity("Newtonsoft.Json", "12.0.2");
        let outcome = checker.check(std::slice::from_ref(&id)).await.unwrap();

        mock.assert_async().await;
        let facts = &outcome.resolved[&id];
        // Target lists are sorted ascending on ingest.
        assert_eq!(
            facts.compatible_versions_for("p1"),
            ["12.0.3".to_string(), "12.0.4".to_string()]
        );
        assert!(!facts.deprecated);
        assert!(outcome.errors.is_empty());
    }

    #[tokio::test]
    async fn missing_document_is_a_clean_miss_not_an_error() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/packages/ghost.json.gz")
            .with_status(404)
            .create_async()
            .await;

        let checker = RegistryChecker::new(&server.url());
        let id = identity("Ghost", "1.0.0");
        let outcome = checker.check(std::slice::from_ref(&id)).await.unwrap();

        mock.assert_async().await;
        assert!(outcome.resolved.is_empty());
        assert!(outcome.errors.is_empty());
    }

    #[tokio::test]
    async fn malformed_document_is_recorded_as_a_per_identity_error() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/packages/broken.json.gz")
            .with_status(200)
            .with_body("this is not gzip")
            .create_async()
            .await;

        let checker = RegistryChecker::new(&server.url());
        let id = identity("Broken", "1.0.0");
        let outcome = checker.check(std::slice::from_ref(&id)).await.unwrap();

        mock.assert_async().await;
        assert!(outcome.resolved.is_empty());
        assert!(matches!(
            outcome.errors.get(&id),
            Some(FetchError::DataDecode(_))
        ));
    }

    #[tokio::test]
    async fn one_failing_package_does_not_block_the_rest_of_the_batch() {
        let mut server = Server::new_async().await;

        let good_body = gzip_bytes(
            br#"{"packageId": "Good", "versions": ["1.0.0"], "targets": {"p1": ["1.0.0"]}}"#,
        );
        let _good = server
            .mock("GET", "/packages/good.json.gz")
            .with_status(200)
            .with_body(good_body)
            .create_async()
            .await;
        let _bad = server
            .mock("GET", "/packages/bad.json.gz")
            .with_status(400)
            .create_async()
            .await;

        let checker = RegistryChecker::new(&server.url());
        let good = identity("Good", "1.0.0");
        let bad = identity("Bad", "1.0.0");
        let outcome = checker
            .check(&[good.clone(), bad.clone()])
            .await
            .unwrap();

        assert!(outcome.resolved.contains_key(&good));
        assert!(matches!(
            outcome.errors.get(&bad),
            Some(FetchError::UnexpectedStatus(400))
        ));
    }

    #[tokio::test]
    async fn document_url_lowercases_the_package_id() {
        let checker = RegistryChecker::new("http://example.test");
        assert_eq!(
            checker.document_url("Newtonsoft.Json"),
            "http://example.test/packages/newtonsoft.json.json.gz"
        );
    }
}
