//! Common types for compatibility analysis

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Data source a package identity originates from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceType {
    /// Public package registry metadata
    Registry,
    /// Packages shipped as part of the platform SDK
    PlatformSdk,
    /// Curated fallback catalogue
    Fallback,
}

impl SourceType {
    /// Returns the string representation of the source type
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Registry => "registry",
            SourceType::PlatformSdk => "platform_sdk",
            SourceType::Fallback => "fallback",
        }
    }
}

impl std::str::FromStr for SourceType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "registry" => Ok(SourceType::Registry),
            "platform_sdk" => Ok(SourceType::PlatformSdk),
            "fallback" => Ok(SourceType::Fallback),
            _ => Err(()),
        }
    }
}

/// Identity of one package at one version, as referenced by a project
///
/// Equality is structural (id + version + source type); identities are
/// deduplicated by equality wherever they are used as map keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageIdentity {
    /// Package name (e.g., "Newtonsoft.Json")
    pub package_id: String,
    /// Version referenced by the project
    pub version: String,
    /// Where this identity came from
    pub source_type: SourceType,
}

impl PackageIdentity {
    pub fn new(package_id: &str, version: &str, source_type: SourceType) -> Self {
        Self {
            package_id: package_id.to_string(),
            version: version.to_string(),
            source_type,
        }
    }
}

/// The rendered form is embedded in cache keys, so two equal identities must
/// render byte-identically. The source type suffix is omitted for the
/// default `Registry` source.
impl fmt::Display for PackageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.source_type {
            SourceType::Registry => write!(f, "{}:{}", self.package_id, self.version),
            other => write!(f, "{}:{}:{}", self.package_id, self.version, other.as_str()),
        }
    }
}

/// Kind of code-level symbol an API entity refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApiKind {
    Method,
    Declaration,
    Annotation,
    Struct,
    Enum,
}

/// A single API usage referenced by a project
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEntity {
    /// Namespace owning the symbol (e.g., "Newtonsoft.Json.Linq")
    pub namespace: String,
    /// Full signature as written in source (e.g., "Foo.Bar.Baz(String, Int32)")
    pub original_signature: String,
    pub kind: ApiKind,
}

impl ApiEntity {
    pub fn new(namespace: &str, original_signature: &str, kind: ApiKind) -> Self {
        Self {
            namespace: namespace.to_string(),
            original_signature: original_signature.to_string(),
            kind,
        }
    }
}

/// Authoritative compatibility facts for one package, as produced by a
/// source checker
///
/// Facts live for the duration of one resolution batch; only the derived
/// [`AnalysisResult`] is cached across batches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PackageFacts {
    pub package_id: String,
    /// All versions the source knows about
    pub versions: Vec<String>,
    /// Target platform -> versions known compatible with that target,
    /// ascending by semver
    pub target_versions: HashMap<String, Vec<String>>,
    pub deprecated: bool,
    /// Per-API compatibility flags, keyed by original signature
    pub api_compatibility: HashMap<String, bool>,
}

impl PackageFacts {
    /// Compatible versions for one target platform, empty if the target is
    /// not assessed
    pub fn compatible_versions_for(&self, target_platform: &str) -> &[String] {
        self.target_versions
            .get(target_platform)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Final compatibility verdict for a package or API
///
/// `GeneralParseError` and `OutOfMemoryParseError` are the two halves of the
/// parse-error family: the latter means the backing document was too large
/// to decode and the query may succeed with more resources, the former that
/// the input is permanently malformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Compatible,
    Incompatible,
    Deprecated,
    Unknown,
    GeneralParseError,
    OutOfMemoryParseError,
}

/// Output of the decision engine for one (package, target) or
/// (package, API, target) query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompatibilityResult {
    pub verdict: Verdict,
    /// Compatible versions strictly greater than the queried version,
    /// ascending (pre-releases included)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub compatible_versions: Vec<String>,
}

impl CompatibilityResult {
    pub fn verdict_only(verdict: Verdict) -> Self {
        Self {
            verdict,
            compatible_versions: Vec::new(),
        }
    }
}

/// Remediation suggested alongside a verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendedAction {
    UpgradePackage,
    ReplaceApi,
    NoRecommendation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub action: RecommendedAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Versions that would resolve the problem, pre-releases filtered out
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_versions: Vec<String>,
}

impl Recommendation {
    pub fn none() -> Self {
        Self {
            action: RecommendedAction::NoRecommendation,
            description: None,
            target_versions: Vec::new(),
        }
    }

    pub fn upgrade(target_versions: Vec<String>) -> Self {
        Self {
            action: RecommendedAction::UpgradePackage,
            description: None,
            target_versions,
        }
    }

    pub fn replace_api(description: &str) -> Self {
        Self {
            action: RecommendedAction::ReplaceApi,
            description: Some(description.to_string()),
            target_versions: Vec::new(),
        }
    }
}

/// Verdict + recommendation bundle, the unit stored in the result cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub compatibility: CompatibilityResult,
    pub recommendation: Recommendation,
}

/// Selects which outputs a batch query computes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssessmentMode {
    /// Compatibility verdicts only; the recommendation lookup is skipped
    Compatibility,
    /// Verdicts plus remediation guidance
    Recommendation,
    /// Everything
    All,
}

impl AssessmentMode {
    pub fn wants_recommendations(&self) -> bool {
        !matches!(self, AssessmentMode::Compatibility)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(
        PackageIdentity::new("Newtonsoft.Json", "12.0.2", SourceType::Registry),
        "Newtonsoft.Json:12.0.2"
    )]
    #[case(
        PackageIdentity::new("System.Text.Json", "6.0.0", SourceType::PlatformSdk),
        "System.Text.Json:6.0.0:platform_sdk"
    )]
    #[case(
        PackageIdentity::new("Legacy.Pkg", "1.0.0", SourceType::Fallback),
        "Legacy.Pkg:1.0.0:fallback"
    )]
    fn package_identity_display_is_stable(
        #[case] identity: PackageIdentity,
        #[case] expected: &str,
    ) {
        assert_eq!(identity.to_string(), expected);
    }

    #[test]
    fn equal_identities_render_byte_identical_strings() {
        let a = PackageIdentity::new("Foo", "1.0.0", SourceType::Registry);
        let b = PackageIdentity::new("Foo", "1.0.0", SourceType::Registry);
        assert_eq!(a, b);
        assert_eq!(a.to_string(), b.to_string());
    }

    #[test]
    fn verdict_serializes_as_screaming_snake_case() {
        assert_eq!(
            serde_json::to_string(&Verdict::OutOfMemoryParseError).unwrap(),
            r#""OUT_OF_MEMORY_PARSE_ERROR""#
        );
        assert_eq!(
            serde_json::to_string(&Verdict::Compatible).unwrap(),
            r#""COMPATIBLE""#
        );
    }

    #[test]
    fn analysis_result_omits_null_fields_on_serialize() {
        let result = AnalysisResult {
            compatibility: CompatibilityResult::verdict_only(Verdict::Unknown),
            recommendation: Recommendation::none(),
        };

        let json = serde_json::to_string(&result).unwrap();
        assert!(!json.contains("description"));
        assert!(!json.contains("targetVersions"));
        assert!(!json.contains("compatibleVersions"));
    }

    #[test]
    fn compatible_versions_for_returns_empty_for_unknown_target() {
        let facts = PackageFacts {
            package_id: "Foo".to_string(),
            target_versions: HashMap::from([(
                "p1".to_string(),
                vec!["1.0.0".to_string()],
            )]),
            ..Default::default()
        };

        assert_eq!(facts.compatible_versions_for("p1"), ["1.0.0".to_string()]);
        assert!(facts.compatible_versions_for("p2").is_empty());
    }
}
