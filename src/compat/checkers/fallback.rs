//! Fallback catalogue source checker

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

/// Curated catalogue document keyed by lowercased package id, gzip JSON
#[derive(Debug, Deserialize)]
struct FallbackCatalog {
    #[serde(default)]
    packages: HashMap<String, PackageDocument>,
}

/// Last-resort source checker backed by a curated catalogue of packages
/// the authoritative sources do not cover
///
/// Runs after the SDK enumeration and the registry store, so it only ever
/// sees identities neither of those resolved.
pub struct FallbackChecker {
    client: reqwest::Client,
    base_url: String,
    catalog: OnceCell<HashMap<String, Arc<PackageFacts>>>,
}

impl FallbackChecker {
    /// Creates a new FallbackChecker with a custom base URL
    pub fn new(base_url: &str) -> Self {
        Self {
            client: http_client(),
            base_url: base_url.to_string(),
            catalog: OnceCell::new(),
        }
    }

    async fn load_catalog(&self) -> Result<HashMap<String, Arc<PackageFacts>>, FetchError> {
        let url = format!("{}/fallback/catalog.json.gz", self.base_url);

        let bytes = fetch_with_backoff("fallback catalogue fetch", || async {
            let response = self.client.get(&url).send().await?;
            check_status(&response, "fallback catalogue")?;
            Ok(response.bytes().await?)
        })
        .await?;

        let catalog: FallbackCatalog = decode_gzip_json(&bytes, MAX_DECODED_DOCUMENT_BYTES)?;

        let packages: HashMap<String, Arc<PackageFacts>> = catalog
            .packages
            .into_iter()
            .map(|(id, document)| (id.to_lowercase(), Arc::new(document.into_facts())))
            .collect();

        info!("Loaded fallback catalogue with {} packages", packages.len());
        Ok(packages)
    }

    async fn catalog(&self) -> Result<&HashMap<String, Arc<PackageFacts>>, FetchError> {
        self.catalog.get_or_try_init(|| self.load_catalog()).await
    }
}

#[async_trait::async_trait]
impl SourceChecker for FallbackChecker {
    fn name(&self) -> &'static str {
        "fallback"
    }

    async fn check(&self, identities: &[PackageIdentity]) -> Result<CheckOutcome, FetchError> {
        let catalog = self.catalog().await?;

        let mut outcome = CheckOutcome::default();
        for identity in identities {
            match catalog.get(&identity.package_id.to_lowercase()) {
                Some(facts) => {
                    outcome
                        .resolved
                        .insert(identity.clone(), Arc::clone(facts));
                }
                None => debug!("Package not in fallback catalogue: {}", identity),
            }
        }

        Ok(outcome)
    }
}
