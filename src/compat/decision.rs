//! Compatibility decision engine
//!
//! Turns a package's known-compatible version list into a verdict plus the
//! upgrade versions that would resolve an incompatibility. Pure and
//! synchronous; malformed input degrades to an `Unknown` verdict instead of
//! raising.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::compat::semver::{
    find_greater_compatible_versions, has_lower_or_equal_compatible_version, has_same_major,
    is_greater_than, is_prerelease, is_sentinel, max_version, parse_version,
};
use crate::compat::types::{ApiEntity, ApiKind, CompatibilityResult, PackageFacts, Verdict};

/// Compute the package-level verdict for one (version, target) query
///
/// `compatible_versions` is the sorted set of versions known compatible with
/// the target platform. Deprecation overrides everything else. A package
/// version newer than the highest assessed version is extrapolated as
/// compatible when it shares that version's major component; this boundary
/// is relied upon downstream and must not be widened.
pub fn decide(
    package_version: &str,
    compatible_versions: &[String],
    deprecated: bool,
) -> CompatibilityResult {
    if parse_version(package_version).is_none() {
        debug!("unparseable package version: {}", package_version);
        return CompatibilityResult::verdict_only(Verdict::Unknown);
    }

    if deprecated {
        return CompatibilityResult::verdict_only(Verdict::Deprecated);
    }

    if compatible_versions.is_empty() {
        return CompatibilityResult::verdict_only(Verdict::Incompatible);
    }

    let verdict = match max_version(compatible_versions) {
        Some(max_compat)
            if !is_sentinel(&max_compat) && is_greater_than(package_version, &max_compat) =>
        {
            // Newer than anything assessed: extrapolate within the same major
            if has_same_major(package_version, &max_compat) {
                Verdict::Compatible
            } else {
                Verdict::Incompatible
            }
        }
        _ => {
            if has_lower_or_equal_compatible_version(package_version, compatible_versions) {
                Verdict::Compatible
            } else {
                Verdict::Incompatible
            }
        }
    };

    CompatibilityResult {
        verdict,
        compatible_versions: find_greater_compatible_versions(package_version, compatible_versions),
    }
}

/// Upgrade versions suitable for a recommendation: the greater compatible
/// versions with pre-releases filtered out
pub fn upgrade_candidates(result: &CompatibilityResult) -> Vec<String> {
    result
        .compatible_versions
        .iter()
        .filter(|v| !is_prerelease(v))
        .cloned()
        .collect()
}

static SIGNATURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?<owner>.+)\.(?<method>[^.()]+)\((?<params>.*)\)$")
        .expect("signature pattern is valid")
});

/// Synthesize the extension-call form of a method signature: the first
/// parameter type becomes the receiver and the remaining parameters are
/// re-joined.
///
/// "Ns.Extensions.Pad(Ns.Text, Int32)" -> "Ns.Text.Pad(Int32)"
///
/// Returns None for signatures without parameters or that do not look like
/// a method call.
pub fn extension_call_signature(signature: &str) -> Option<String> {
    let captures = SIGNATURE.captures(signature)?;
    let method = &captures["method"];
    let params = &captures["params"];

    let mut parts = params.split(',').map(str::trim);
    let receiver = parts.next().filter(|p| !p.is_empty())?;
    let rest: Vec<&str> = parts.collect();

    Some(format!("{}.{}({})", receiver, method, rest.join(", ")))
}

/// Refine a package-level result for one API entity
///
/// Method-kind entities are checked against the per-API compatibility flags
/// (exact signature first, then the synthesized extension-call form). Any
/// other entity kind is evaluated purely at the package level. A
/// package-level incompatible verdict short-circuits: every API under the
/// package is incompatible without a per-API lookup.
pub fn decide_api(
    package_result: &CompatibilityResult,
    facts: &PackageFacts,
    api: &ApiEntity,
) -> CompatibilityResult {
    if package_result.verdict == Verdict::Incompatible {
        return package_result.clone();
    }

    if api.kind != ApiKind::Method {
        return package_result.clone();
    }

    let flag = facts
        .api_compatibility
        .get(&api.original_signature)
        .copied()
        .or_else(|| {
            extension_call_signature(&api.original_signature)
                .and_then(|synthesized| facts.api_compatibility.get(&synthesized).copied())
        });

    match flag {
        Some(true) => CompatibilityResult {
            verdict: Verdict::Compatible,
            compatible_versions: package_result.compatible_versions.clone(),
        },
        Some(false) => CompatibilityResult {
            verdict: Verdict::Incompatible,
            compatible_versions: package_result.compatible_versions.clone(),
        },
        // No per-API data: the package-level answer stands
        None => package_result.clone(),
    }
}
