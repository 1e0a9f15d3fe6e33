//! MantisBT release version handling.
//!
//! MantisBT reports versions such as `1.2.19`, `1.3.0-rc.2` or `1.2.16dev`.
//! The numeric core is kept as a `semver::Version`; the suffix is read as a
//! development stage ranked `dev < alpha < beta < rc < release < pl`, followed
//! by any numeric tail (`rc2`, `pl1`).

use std::cmp::Ordering;
use std::fmt;

use semver::Version;
use thiserror::Error;
use tracing::warn;

/// First release supporting per-user issue queries and built-in user filters.
pub const MIN_USER_FILTERS_VERSION: &str = "1.2.16dev";

/// Error types for version parsing.
#[derive(Error, Debug)]
pub enum VersionError {
    #[error("Invalid version format: {0}")]
    InvalidFormat(String),
}

/// Development stage named by a version suffix, in release order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    /// An unrecognized suffix word; sorts below every known stage.
    Unknown,
    /// `dev`
    Dev,
    /// `alpha` or `a`
    Alpha,
    /// `beta` or `b`
    Beta,
    /// `rc` or `c`
    ReleaseCandidate,
    /// No suffix word.
    Release,
    /// `pl` or `p`
    Patch,
}

impl Stage {
    fn from_word(word: &str) -> Self {
        match word {
            "dev" => Stage::Dev,
            "alpha" | "a" => Stage::Alpha,
            "beta" | "b" => Stage::Beta,
            "rc" | "c" => Stage::ReleaseCandidate,
            "pl" | "p" => Stage::Patch,
            _ => Stage::Unknown,
        }
    }
}

/// A parsed MantisBT version.
#[derive(Debug, Clone)]
pub struct MantisVersion {
    /// Major, minor and patch numbers.
    pub core: Version,
    /// The stage named by the suffix.
    pub stage: Stage,
    /// Numbers following the stage, e.g. `2` in `rc2`.
    pub tail: Vec<u64>,
    /// Normalized suffix identifiers, for display.
    suffix: Vec<String>,
}

impl MantisVersion {
    fn key(&self) -> (&Version, Stage, &[u64]) {
        (&self.core, self.stage, self.tail.as_slice())
    }
}

impl PartialEq for MantisVersion {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for MantisVersion {}

impl PartialOrd for MantisVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MantisVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl fmt::Display for MantisVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.core)?;
        if !self.suffix.is_empty() {
            write!(f, "-{}", self.suffix.join("."))?;
        }
        Ok(())
    }
}

/// Parse a MantisBT version string.
///
/// Missing minor/patch components default to zero, components beyond the
/// third are ignored and any trailing suffix becomes the stage and tail
/// (`1.2.16dev` displays as `1.2.16-dev`, `1.3.0rc1` as `1.3.0-rc.1`).
pub fn parse_version(raw: &str) -> Result<MantisVersion, VersionError> {
    let trimmed = raw.trim().trim_start_matches(['v', 'V']);
    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    let (numbers, suffix) = trimmed.split_at(split);

    let mut parts = numbers
        .split('.')
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<u64>()
                .map_err(|_| VersionError::InvalidFormat(raw.to_string()))
        });

    let major = match parts.next() {
        Some(part) => part?,
        None => return Err(VersionError::InvalidFormat(raw.to_string())),
    };
    let minor = parts.next().transpose()?.unwrap_or(0);
    let patch = parts.next().transpose()?.unwrap_or(0);

    let suffix = split_suffix(suffix);
    let stage = suffix
        .iter()
        .find(|identifier| identifier.parse::<u64>().is_err())
        .map(|word| Stage::from_word(word))
        .unwrap_or(Stage::Release);
    let tail = suffix
        .iter()
        .filter_map(|identifier| identifier.parse::<u64>().ok())
        .collect();

    Ok(MantisVersion {
        core: Version::new(major, minor, patch),
        stage,
        tail,
        suffix,
    })
}

/// Whether `version` is at or above `minimum`.
///
/// A version that cannot be parsed is treated as too old.
pub fn is_at_least(version: &str, minimum: &str) -> bool {
    match (parse_version(version), parse_version(minimum)) {
        (Ok(version), Ok(minimum)) => version >= minimum,
        (Err(e), _) | (_, Err(e)) => {
            warn!(version, minimum, error = %e, "Unparseable MantisBT version");
            false
        }
    }
}

/// Split a free-form suffix like `-RC1` or `dev` into lowercase identifiers
/// (`rc`, `1`), breaking on separators and letter/digit boundaries.
fn split_suffix(suffix: &str) -> Vec<String> {
    let mut identifiers: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_is_digit = false;

    for c in suffix.chars() {
        if !c.is_ascii_alphanumeric() {
            flush_identifier(&mut identifiers, &mut current);
            continue;
        }
        let is_digit = c.is_ascii_digit();
        if !current.is_empty() && is_digit != current_is_digit {
            flush_identifier(&mut identifiers, &mut current);
        }
        current_is_digit = is_digit;
        current.push(c.to_ascii_lowercase());
    }
    flush_identifier(&mut identifiers, &mut current);

    identifiers
}

fn flush_identifier(identifiers: &mut Vec<String>, current: &mut String) {
    if current.is_empty() {
        return;
    }
    // Numbers are stored without leading zeros.
    let identifier = match current.parse::<u64>() {
        Ok(number) => number.to_string(),
        Err(_) => current.clone(),
    };
    identifiers.push(identifier);
    current.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_release() {
        let version = parse_version("1.2.19").unwrap();
        assert_eq!(version.core, Version::new(1, 2, 19));
        assert_eq!(version.stage, Stage::Release);
        assert_eq!(version.to_string(), "1.2.19");
    }

    #[test]
    fn test_parse_dev_suffix() {
        let version = parse_version("1.2.16dev").unwrap();
        assert_eq!(version.stage, Stage::Dev);
        assert_eq!(version.to_string(), "1.2.16-dev");
    }

    #[test]
    fn test_parse_release_candidate() {
        let rc1 = parse_version("1.3.0rc1").unwrap();
        assert_eq!(rc1.to_string(), "1.3.0-rc.1");
        assert_eq!(rc1.stage, Stage::ReleaseCandidate);
        assert_eq!(rc1.tail, vec![1]);
        assert_eq!(parse_version("1.3.0-rc.2").unwrap().to_string(), "1.3.0-rc.2");
    }

    #[test]
    fn test_parse_short_and_long_versions() {
        assert_eq!(parse_version("2.0").unwrap().core, Version::new(2, 0, 0));
        assert_eq!(parse_version("1.2.3.4").unwrap().core, Version::new(1, 2, 3));
    }

    #[test]
    fn test_parse_invalid() {
        assert!(parse_version("").is_err());
        assert!(parse_version("unknown").is_err());
    }

    #[test]
    fn test_short_stage_names_match_long_ones() {
        assert_eq!(
            parse_version("1.2.16a1").unwrap(),
            parse_version("1.2.16alpha1").unwrap()
        );
        assert_eq!(
            parse_version("1.2.16b").unwrap(),
            parse_version("1.2.16-beta").unwrap()
        );
    }

    #[test]
    fn test_stage_ordering() {
        let ordered = [
            "1.2.16foo",
            "1.2.16dev",
            "1.2.16alpha",
            "1.2.16beta",
            "1.2.16beta2",
            "1.2.16rc1",
            "1.2.16",
            "1.2.16pl1",
            "1.2.17dev",
        ];
        for pair in ordered.windows(2) {
            let lower = parse_version(pair[0]).unwrap();
            let higher = parse_version(pair[1]).unwrap();
            assert!(lower < higher, "{} should sort below {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_threshold_is_inclusive() {
        assert!(is_at_least("1.2.16dev", MIN_USER_FILTERS_VERSION));
        assert!(is_at_least("1.2.16", MIN_USER_FILTERS_VERSION));
    }

    #[test]
    fn test_threshold_accepts_later_stages() {
        assert!(is_at_least("1.2.16alpha", MIN_USER_FILTERS_VERSION));
        assert!(is_at_least("1.2.16a1", MIN_USER_FILTERS_VERSION));
        assert!(is_at_least("1.2.16beta", MIN_USER_FILTERS_VERSION));
        assert!(is_at_least("1.2.16b1", MIN_USER_FILTERS_VERSION));
        assert!(is_at_least("1.2.16rc1", MIN_USER_FILTERS_VERSION));
        assert!(is_at_least("1.2.16pl1", MIN_USER_FILTERS_VERSION));
    }

    #[test]
    fn test_threshold_ordering() {
        assert!(!is_at_least("1.2.15", MIN_USER_FILTERS_VERSION));
        assert!(!is_at_least("1.2.15pl3", MIN_USER_FILTERS_VERSION));
        assert!(!is_at_least("1.1.8", MIN_USER_FILTERS_VERSION));
        assert!(is_at_least("1.2.17", MIN_USER_FILTERS_VERSION));
        assert!(is_at_least("1.3.0-rc.1", MIN_USER_FILTERS_VERSION));
        assert!(is_at_least("2.25.7", MIN_USER_FILTERS_VERSION));
    }

    #[test]
    fn test_unparseable_version_is_too_old() {
        assert!(!is_at_least("garbage", MIN_USER_FILTERS_VERSION));
    }
}
