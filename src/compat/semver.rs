//! Version algebra: pure semver operations over raw version strings
//!
//! Every function here is total — malformed input is treated as absent and
//! never raises.

use semver::Version;

/// Parse a version string into a semver::Version, normalizing partial and
/// revision forms.
///
/// Handles partial versions like "1" or "1.2" by padding with zeros, and
/// four-part revision versions like "1.2.3.4" by dropping the revision
/// component for ordering purposes.
///
/// Examples:
/// - "1" -> Version(1, 0, 0)
/// - "1.2" -> Version(1, 2, 0)
/// - "1.2.3" -> Version(1, 2, 3)
/// - "1.2.3.4" -> Version(1, 2, 3)
pub fn parse_version(version: &str) -> Option<Version> {
    let version = version.trim();
    let parts: Vec<&str> = version.split('.').collect();
    let normalized = match parts.len() {
        1 => format!("{}.0.0", parts[0]),
        2 => format!("{}.{}.0", parts[0], parts[1]),
        4 => parts[..3].join("."),
        _ => version.to_string(),
    };
    Version::parse(&normalized).ok()
}

/// Whether a version string is the "compatible with everything" sentinel
/// ("0.0.0" or "0.0.0.0")
pub fn is_sentinel(version: &str) -> bool {
    parse_version(version)
        .is_some_and(|v| v.major == 0 && v.minor == 0 && v.patch == 0 && v.pre.is_empty())
}

/// `a > b`; false when either side fails to parse
pub fn is_greater_than(a: &str, b: &str) -> bool {
    match (parse_version(a), parse_version(b)) {
        (Some(a), Some(b)) => a > b,
        _ => false,
    }
}

/// `a >= b`; false when either side fails to parse
pub fn is_greater_or_equal(a: &str, b: &str) -> bool {
    match (parse_version(a), parse_version(b)) {
        (Some(a), Some(b)) => a >= b,
        _ => false,
    }
}

/// `a <= b`; false when either side fails to parse. The sentinel parses as
/// 0.0.0 and so compares less-or-equal to any real version.
pub fn is_less_or_equal(a: &str, b: &str) -> bool {
    match (parse_version(a), parse_version(b)) {
        (Some(a), Some(b)) => a <= b,
        _ => false,
    }
}

/// Whether both versions parse and share the same major component
pub fn has_same_major(a: &str, b: &str) -> bool {
    match (parse_version(a), parse_version(b)) {
        (Some(a), Some(b)) => a.major == b.major,
        _ => false,
    }
}

/// The subset of `candidates` that parse and are strictly greater than
/// `version`, ascending. Unparseable entries are silently dropped.
pub fn find_greater_compatible_versions(version: &str, candidates: &[String]) -> Vec<String> {
    let Some(current) = parse_version(version) else {
        return Vec::new();
    };

    let mut greater: Vec<(String, Version)> = candidates
        .iter()
        .filter_map(|c| parse_version(c).map(|parsed| (c.clone(), parsed)))
        .filter(|(_, parsed)| *parsed > current)
        .collect();

    greater.sort_by(|(_, a), (_, b)| a.cmp(b));
    greater.into_iter().map(|(original, _)| original).collect()
}

/// The maximum parseable candidate, in its original spelling, or None if
/// nothing parses
pub fn max_version(candidates: &[String]) -> Option<String> {
    candidates
        .iter()
        .filter_map(|c| parse_version(c).map(|parsed| (c, parsed)))
        .max_by(|(_, a), (_, b)| a.cmp(b))
        .map(|(original, _)| original.clone())
}

/// True iff any parseable candidate is `<= version`
pub fn has_lower_or_equal_compatible_version(version: &str, candidates: &[String]) -> bool {
    let Some(current) = parse_version(version) else {
        return false;
    };

    candidates
        .iter()
        .filter_map(|c| parse_version(c))
        .any(|candidate| candidate <= current)
}

/// Whether a version string carries a pre-release component
pub fn is_prerelease(version: &str) -> bool {
    parse_version(version).is_some_and(|v| !v.pre.is_empty())
}
