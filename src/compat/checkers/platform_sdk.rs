//! Platform-SDK enumeration source checker

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::compat::checker::{CheckOutcome, SourceChecker};
use crate::compat::checkers::registry::PackageDocument;
use crate::compat::error::FetchError;
use crate::compat::fetch::{check_status, decode_gzip_json, http_client};
use crate::compat::retry::fetch_with_backoff;
use crate::compat::types::{PackageFacts, PackageIdentity};
use crate::config::MAX_DECODED_DOCUMENT_BYTES;

/// Enumeration of every package the platform SDK ships, gzip JSON
#[derive(Debug, Deserialize)]
struct SdkIndex {
    #[serde(default)]
    packages: Vec<PackageDocument>,
}

/// Source checker backed by the platform SDK package enumeration
///
/// The SDK ships one index document enumerating all of its packages; it is
/// fetched once per process and reused for every batch. Identities whose
/// package id is not in the index are clean misses handed to the next
/// checker.
pub struct PlatformSdkChecker {
    client: reqwest::Client,
    base_url: String,
    index: OnceCell<HashMap<String, Arc<PackageFacts>>>,
}

impl PlatformSdkChecker {
    /// Creates a new PlatformSdkChecker with a custom base URL
    pub fn new(base_url: &str) -> Self {
        Self {
            client: http_client(),
            base_url: base_url.to_string(),
            index: OnceCell::new(),
        }
    }

    async fn load_index(&self) -> Result<HashMap<String, Arc<PackageFacts>>, FetchError> {
        let url = format!("{}/sdk/sdk-packages.json.gz", self.base_url);

        let bytes = fetch_with_backoff("SDK index fetch", || async {
            let response = self.client.get(&url).send().await?;
            check_status(&response, "sdk-packages")?;
            Ok(response.bytes().await?)
        })
        .await?;

        let index: SdkIndex = decode_gzip_json(&bytes, MAX_DECODED_DOCUMENT_BYTES)?;

        let packages: HashMap<String, Arc<PackageFacts>> = index
            .packages
            .into_iter()
            .map(|document| {
                let facts = document.into_facts();
                (facts.package_id.to_lowercase(), Arc::new(facts))
            })
            .collect();

        info!("Loaded SDK enumeration with {} packages", packages.len());
        Ok(packages)
    }

    async fn index(&self) -> Result<&HashMap<String, Arc<PackageFacts>>, FetchError> {
        self.index.get_or_try_init(|| self.load_index()).await
    }
}

#[async_trait::async_trait]
impl SourceChecker for PlatformSdkChecker {
    fn name(&self) -> &'static str {
        "platform-sdk"
    }

    async fn check(&self, identities: &[PackageIdentity]) -> Result<CheckOutcome, FetchError> {
        let index = self.index().await?;

        let mut outcome = CheckOutcome::default();
        for identity in identities {
            match index.get(&identity.package_id.to_lowercase()) {
                Some(facts) => {
                    outcome
                        .resolved
                        .insert(identity.clone(), Arc::clone(facts));
                }
                None => debug!("Package not in SDK enumeration: {}", identity),
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

    const INDEX_BODY: &[u8] = br#"{
        "packages": [
            {
                "packageId": "System.Text.Json",
                "versions": ["6.0.0", "8.0.0"],
                "targets": { "p1": ["6.0.0", "8.0.0"] },
                "deprecated": false
            }
        ]
    }"#;

    fn identity(id: &str) -> PackageIdentity {
        PackageIdentity::new(id, "6.0.0", SourceType::PlatformSdk)
    }

    #[tokio::test]
    async fn check_resolves_packages_present_in_the_sdk_index() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/sdk/sdk-packages.json.gz")
            .with_status(200)
            .with_body(gzip_bytes(INDEX_BODY))
            .create_async()
            .await;

        let checker = PlatformSdkChecker::new(&server.url());
        let known = identity("System.Text.Json");
        let unknown = identity("Some.Other.Package");
        let outcome = checker
            .check(&[known.clone(), unknown.clone()])
            .await
            .unwrap();

        mock.assert_async().await;
        assert!(outcome.resolved.contains_key(&known));
        assert!(!outcome.resolved.contains_key(&unknown));
        assert!(outcome.errors.is_empty());
    }

    #[tokio::test]
    async fn index_is_fetched_once_across_batches() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/sdk/sdk-packages.json.gz")
            .with_status(200)
            .with_body(gzip_bytes(INDEX_BODY))
            .expect(1)
            .create_async()
            .await;

        let checker = PlatformSdkChecker::new(&server.url());
        let id = identity("System.Text.Json");
        checker.check(std::slice::from_ref(&id)).await.unwrap();
        checker.check(std::slice::from_ref(&id)).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn package_id_lookup_is_case_insensitive() {
        let mut server = Server::new_async().await;

        let _index = server
            .mock("GET", "/sdk/sdk-packages.json.gz")
            .with_status(200)
            .with_body(gzip_bytes(INDEX_BODY))
            .create_async()
            .await;

        let checker = PlatformSdkChecker::new(&server.url());
        let id = identity("system.text.JSON");
        let outcome = checker.check(std::slice::from_ref(&id)).await.unwrap();

        assert!(outcome.resolved.contains_key(&id));
    }

    #[tokio::test]
    async fn unavailable_index_is_a_checker_level_failure() {
        let mut server = Server::new_async().await;

        let _index = server
            .mock("GET", "/sdk/sdk-packages.json.gz")
            .with_status(404)
            .create_async()
            .await;

        let checker = PlatformSdkChecker::new(&server.url());
        let result = checker.check(&[identity("System.Text.Json")]).await;

        assert!(matches!(result, Err(FetchError::NotFound(_))));
    }
}
