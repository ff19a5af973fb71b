//! CLI entry point: batch query file in, JSON report out

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use crate::compat::orchestrator::{AnalysisQuery, AnalysisReport, CompatOrchestrator};
use crate::compat::types::{
    AnalysisResult, ApiEntity, AssessmentMode, PackageIdentity, SourceType,
};
use crate::config::{self, EngineConfig};

/// On-disk shape of a batch query
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryFile {
    target_platform: String,
    #[serde(default = "default_mode")]
    mode: AssessmentMode,
    packages: Vec<QueryPackage>,
}

fn default_mode() -> AssessmentMode {
    AssessmentMode::All
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryPackage {
    package_id: String,
    version: String,
    #[serde(default = "default_source_type")]
    source_type: SourceType,
    #[serde(default)]
    apis: Vec<ApiEntity>,
}

fn default_source_type() -> SourceType {
    SourceType::Registry
}

/// On-disk shape of the report, sorted for stable output
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReportFile {
    target_platform: String,
    packages: Vec<ReportPackage>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReportPackage {
    package_id: String,
    version: String,
    source_type: SourceType,
    analysis: AnalysisResult,
    apis: Vec<ReportApi>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReportApi {
    signature: String,
    analysis: AnalysisResult,
}

fn into_query(file: QueryFile) -> AnalysisQuery {
    let mut packages: HashMap<PackageIdentity, _> = HashMap::new();
    for package in file.packages {
        let identity =
            PackageIdentity::new(&package.package_id, &package.version, package.source_type);
        packages
            .entry(identity)
            .or_insert_with(std::collections::HashSet::new)
            .extend(package.apis);
    }

    AnalysisQuery {
        target_platform: file.target_platform,
        mode: file.mode,
        packages,
    }
}

fn into_report_file(report: AnalysisReport) -> ReportFile {
    let mut packages: Vec<ReportPackage> = report
        .packages
        .into_iter()
        .map(|(identity, analysis)| {
            let mut apis: Vec<ReportApi> = analysis
                .apis
                .into_iter()
                .map(|(signature, analysis)| ReportApi {
                    signature,
                    analysis,
                })
                .collect();
            apis.sort_by(|a, b| a.signature.cmp(&b.signature));

            ReportPackage {
                package_id: identity.package_id,
                version: identity.version,
                source_type: identity.source_type,
                analysis: analysis.package,
                apis,
            }
        })
        .collect();
    packages.sort_by(|a, b| (&a.package_id, &a.version).cmp(&(&b.package_id, &b.version)));

    ReportFile {
        target_platform: report.target_platform,
        packages,
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("parsing config {}", path.display()))
        }
        None => Ok(EngineConfig::default()),
    }
}

/// Run one `analyze` invocation end to end
pub async fn run_analyze(
    input: PathBuf,
    config_path: Option<PathBuf>,
    snapshot: Option<PathBuf>,
) -> anyhow::Result<()> {
    std::fs::create_dir_all(config::data_dir()).ok();
    let log_file = config::log_path();
    let file_appender = tracing_appender::rolling::never(
        log_file.parent().unwrap_or(Path::new(".")),
        log_file
            .file_name()
            .unwrap_or(std::ffi::OsStr::new("compat-advisor.log")),
    );
    let (writer, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(writer)
        .with_ansi(false)
        .init();

    let engine_config = load_config(config_path.as_deref())?;
    let orchestrator = CompatOrchestrator::from_config(&engine_config);

    let snapshot_path = snapshot
        .or_else(|| engine_config.cache.snapshot_path.clone())
        .unwrap_or_else(config::snapshot_path);
    if snapshot_path.exists()
        && let Err(err) = orchestrator.cache().load_snapshot_file(&snapshot_path)
    {
        warn!(
            "Ignoring unusable cache snapshot {}: {}",
            snapshot_path.display(),
            err
        );
    }

    let text = std::fs::read_to_string(&input)
        .with_context(|| format!("reading query {}", input.display()))?;
    let query_file: QueryFile = serde_json::from_str(&text)
        .with_context(|| format!("parsing query {}", input.display()))?;

    let report = orchestrator
        .analyze(into_query(query_file))
        .await
        .context("analyzing batch")?;

    let out = into_report_file(report);
    println!("{}", serde_json::to_string_pretty(&out)?);

    if let Some(parent) = snapshot_path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    if let Err(err) = orchestrator.cache().save_snapshot(&snapshot_path) {
        warn!(
            "Failed to save cache snapshot {}: {}",
            snapshot_path.display(),
            err
        );
    }

    Ok(())
}
