//! Semantic version checks and ordering

use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;

static SEMVER_RE: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(
        r"^\d+\.\d+\.\d+(?:-[0-9A-Za-z-]+(?:\.[0-9A-Za-z-]+)*)?(?:\+[0-9A-Za-z-]+(?:\.[0-9A-Za-z-]+)*)?$",
    )
    .ok()
});

/// `MAJOR.MINOR.PATCH[-prerelease][+build]`, no leading `v`
pub fn is_semver(version: &str) -> bool {
    SEMVER_RE
        .as_ref()
        .is_some_and(|re| re.is_match(version))
}

/// Total order over version strings.
///
/// Versions the `semver` crate accepts use SemVer precedence (build metadata
/// only breaks ties). Anything else sorts below every parsable version and
/// in plain string order among itself.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    match (semver::Version::parse(a), semver::Version::parse(b)) {
        (Ok(va), Ok(vb)) => va.cmp(&vb).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Greater,
        (Err(_), Ok(_)) => Ordering::Less,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_semver_grammar() {
        for valid in ["1.0.0", "0.0.1", "10.20.30", "1.0.0-beta.1", "1.0.0+build.5", "2.0.0-rc-1+sha.abc"] {
            assert!(is_semver(valid), "{} should be valid", valid);
        }
        for invalid in ["v1.0.0", "1.0", "1", "", "1.0.0.0", "1.0.0-", "1.0.0+", "1.0.0-beta..1", " 1.0.0"] {
            assert!(!is_semver(invalid), "{} should be invalid", invalid);
        }
    }

    #[test]
    fn test_prerelease_sorts_below_release() {
        assert_eq!(compare_versions("1.0.0-beta.1", "1.0.0"), Ordering::Less);
        assert_eq!(compare_versions("1.10.0", "1.9.0"), Ordering::Greater);
        assert_eq!(compare_versions("1.0.0-alpha", "1.0.0-beta"), Ordering::Less);
    }

    #[test]
    fn test_unparsable_sorts_last() {
        let mut versions = vec![
            "0.9.0".to_string(),
            "01.0.0".to_string(),
            "1.10.0".to_string(),
            "1.2.0".to_string(),
        ];
        versions.sort_by(|a, b| compare_versions(b, a));
        assert_eq!(versions, vec!["1.10.0", "1.2.0", "0.9.0", "01.0.0"]);
    }
}
