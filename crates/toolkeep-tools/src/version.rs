//! Parsing and ordering of version-named SDK directories.

use std::{fmt, fs, path::Path, str::FromStr};

use thiserror::Error;
use tracing::debug;

/// A `major.minor.build.revision` SDK version.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SdkVersion {
    pub major: u32,
    pub minor: u32,
    pub build: u32,
    pub revision: u32,
}

/// The `major.minor` prefix an installed SDK must match.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MajorMinor {
    pub major: u32,
    pub minor: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("invalid version '{0}'")]
pub struct VersionParseError(String);

impl SdkVersion {
    pub fn new(major: u32, minor: u32, build: u32, revision: u32) -> Self {
        Self {
            major,
            minor,
            build,
            revision,
        }
    }

    pub fn major_minor(&self) -> MajorMinor {
        MajorMinor {
            major: self.major,
            minor: self.minor,
        }
    }
}

impl FromStr for SdkVersion {
    type Err = VersionParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let parts = parse_components(raw)?;
        match parts.as_slice() {
            [major, minor, build, revision] => Ok(Self::new(*major, *minor, *build, *revision)),
            _ => Err(VersionParseError(raw.to_string())),
        }
    }
}

impl fmt::Display for SdkVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.build, self.revision
        )
    }
}

impl FromStr for MajorMinor {
    type Err = VersionParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let parts = parse_components(raw)?;
        match parts.as_slice() {
            [major, minor] => Ok(Self {
                major: *major,
                minor: *minor,
            }),
            _ => Err(VersionParseError(raw.to_string())),
        }
    }
}

impl fmt::Display for MajorMinor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

fn parse_components(raw: &str) -> Result<Vec<u32>, VersionParseError> {
    raw.split('.')
        .map(|part| {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(VersionParseError(raw.to_string()));
            }
            part.parse::<u32>()
                .map_err(|_| VersionParseError(raw.to_string()))
        })
        .collect()
}

/// Lists the versions installed as child directories of `bin_root` that
/// match `required`, newest first.
///
/// Unparseable names and other major.minor lines are skipped. A missing
/// or unreadable directory yields an empty list.
pub fn scan_versions(bin_root: &Path, required: MajorMinor) -> Vec<SdkVersion> {
    let entries = match fs::read_dir(bin_root) {
        Ok(entries) => entries,
        Err(err) => {
            debug!(
                "Cannot scan {} for SDK versions: {}",
                bin_root.display(),
                err
            );
            return Vec::new();
        }
    };

    let mut versions: Vec<SdkVersion> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_type().map(|t| t.is_dir()).unwrap_or(false)
        })
        .filter_map(|entry| {
            entry.file_name().to_str()?.parse::<SdkVersion>().ok()
        })
        .filter(|version| version.major_minor() == required)
        .collect();
    versions.sort_unstable_by(|a, b| b.cmp(a));
    versions.dedup();
    versions
}
