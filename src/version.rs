//! Component versioning utilities
//!
//! Versions are strict `MAJOR.MINOR.PATCH` triples. Ordering is numeric over the
//! tuple, so `1.9.0 < 1.10.0`.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use semver::Version;
use serde::{Deserialize, Serialize};

use crate::error::{ComposerError, Result};

fn shape() -> &'static Regex {
    static SHAPE: OnceLock<Regex> = OnceLock::new();
    SHAPE.get_or_init(|| Regex::new(r"^\d+\.\d+\.\d+$").expect("version shape regex"))
}

/// Which field of a version to increment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BumpKind {
    Major,
    Minor,
    #[default]
    Patch,
}

impl BumpKind {
    /// Unknown kinds fall back to a patch bump
    pub fn parse_lenient(kind: &str) -> Self {
        match kind.trim().to_ascii_lowercase().as_str() {
            "major" => BumpKind::Major,
            "minor" => BumpKind::Minor,
            _ => BumpKind::Patch,
        }
    }
}

impl From<&str> for BumpKind {
    fn from(kind: &str) -> Self {
        Self::parse_lenient(kind)
    }
}

impl fmt::Display for BumpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BumpKind::Major => "major",
            BumpKind::Minor => "minor",
            BumpKind::Patch => "patch",
        };
        f.write_str(s)
    }
}

/// A validated `MAJOR.MINOR.PATCH` version
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SemVer(Version);

impl SemVer {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self(Version::new(major, minor, patch))
    }

    /// Parse a version string, rejecting anything but three numeric fields
    pub fn parse(version: &str) -> Result<Self> {
        if !shape().is_match(version) {
            return Err(ComposerError::InvalidVersion(format!(
                "'{version}' is not of the form MAJOR.MINOR.PATCH"
            )));
        }
        // semver rejects leading zeros, which keeps "01.2.3" and "1.2.3" from
        // both being stored for the same component.
        Version::parse(version)
            .map(Self)
            .map_err(|e| ComposerError::InvalidVersion(format!("'{version}': {e}")))
    }

    pub fn major(&self) -> u64 {
        self.0.major
    }

    pub fn minor(&self) -> u64 {
        self.0.minor
    }

    pub fn patch(&self) -> u64 {
        self.0.patch
    }

    /// Bump one field, resetting the lower ones.
    ///
    /// Fails when the bumped field is already `u64::MAX`.
    pub fn bump(&self, kind: BumpKind) -> Result<Self> {
        let Version { major, minor, patch, .. } = self.0;
        let overflow = || ComposerError::InvalidVersion(format!("{kind} bump of {self} overflows"));
        Ok(match kind {
            BumpKind::Major => Self::new(major.checked_add(1).ok_or_else(overflow)?, 0, 0),
            BumpKind::Minor => Self::new(major, minor.checked_add(1).ok_or_else(overflow)?, 0),
            BumpKind::Patch => Self::new(major, minor, patch.checked_add(1).ok_or_else(overflow)?),
        })
    }
}

impl fmt::Display for SemVer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SemVer {
    type Err = ComposerError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl PartialOrd for SemVer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SemVer {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.0.major, self.0.minor, self.0.patch).cmp(&(
            other.0.major,
            other.0.minor,
            other.0.patch,
        ))
    }
}

/// Check that a string is a well-formed `MAJOR.MINOR.PATCH` version
pub fn is_valid(version: &str) -> bool {
    SemVer::parse(version).is_ok()
}

/// Compare two version strings numerically
pub fn compare(a: &str, b: &str) -> Result<Ordering> {
    Ok(SemVer::parse(a)?.cmp(&SemVer::parse(b)?))
}

/// Increment a version string
pub fn increment(version: &str, kind: impl Into<BumpKind>) -> Result<String> {
    Ok(SemVer::parse(version)?.bump(kind.into())?.to_string())
}

/// Pick the greatest item by version, keeping the earliest on ties.
///
/// Items whose key does not parse are skipped.
pub fn latest_by<T, F>(items: impl IntoIterator<Item = T>, key: F) -> Option<T>
where
    F: Fn(&T) -> &str,
{
    let mut best: Option<(SemVer, T)> = None;
    for item in items {
        let Ok(parsed) = SemVer::parse(key(&item)) else {
            tracing::warn!(version = key(&item), "skipping unparsable version");
            continue;
        };
        let newer = match &best {
            Some((current, _)) => parsed > *current,
            None => true,
        };
        if newer {
            best = Some((parsed, item));
        }
    }
    best.map(|(_, item)| item)
}

/// Latest of a list of version strings
pub fn latest_of<'a>(versions: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    latest_by(versions, |v| *v)
}
