//! Shared fixtures for engine end-to-end tests

use std::io::Write;

use flate2::Compression;
use flate2::write::GzEncoder;
use mockito::{Mock, Server};

use compat_advisor::compat::orchestrator::CompatOrchestrator;
use compat_advisor::config::{EngineConfig, SourceConfig};

pub fn gzip_bytes(payload: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(payload).unwrap();
    encoder.finish().unwrap()
}

/// Orchestrator with every data source pointed at the given mock server
pub fn orchestrator_for(server: &Server) -> CompatOrchestrator {
    let url = Some(server.url());
    let config = EngineConfig {
        sources: compat_advisor::config::SourcesConfig {
            platform_sdk: SourceConfig {
                enabled: true,
                base_url: url.clone(),
            },
            registry: SourceConfig {
                enabled: true,
                base_url: url.clone(),
            },
            fallback: SourceConfig {
                enabled: true,
                base_url: url.clone(),
            },
        },
        recommendations: compat_advisor::config::RecommendationConfig {
            enabled: true,
            base_url: url,
        },
        ..Default::default()
    };
    CompatOrchestrator::from_config(&config)
}

/// Mount a per-package registry document
pub async fn mount_package_document(server: &mut Server, id_lower: &str, body: &str) -> Mock {
    server
        .mock("GET", format!("/packages/{}.json.gz", id_lower).as_str())
        .with_status(200)
        .with_body(gzip_bytes(body.as_bytes()))
        .create_async()
        .await
}

/// Mount an SDK enumeration with the given packages JSON array
pub async fn mount_sdk_index(server: &mut Server, packages_json: &str) -> Mock {
    let body = format!(r#"{{"packages": {}}}"#, packages_json);
    server
        .mock("GET", "/sdk/sdk-packages.json.gz")
        .with_status(200)
        .with_body(gzip_bytes(body.as_bytes()))
        .create_async()
        .await
}

/// Mount a fallback catalogue keyed by lowercased package id
pub async fn mount_fallback_catalog(server: &mut Server, packages_json: &str) -> Mock {
    let body = format!(r#"{{"packages": {}}}"#, packages_json);
    server
        .mock("GET", "/fallback/catalog.json.gz")
        .with_status(200)
        .with_body(gzip_bytes(body.as_bytes()))
        .create_async()
        .await
}

/// Make the SDK and fallback sources miss everything
pub async fn mount_empty_sdk_and_fallback(server: &mut Server) -> (Mock, Mock) {
    let sdk = mount_sdk_index(server, "[]").await;
    let fallback = mount_fallback_catalog(server, "{}").await;
    (sdk, fallback)
}
