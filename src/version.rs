//! Dotted-triplet version comparison used by the update check.
//!
//! Only `major.minor.build` is considered. Strings with any other number of
//! dot-separated parts are rejected rather than truncated or zero-padded.
use std::cmp::Ordering;
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

/// Errors produced while parsing a candidate version string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionError {
    /// The string did not split into exactly three dot-separated parts.
    #[error("invalid version format {input:?}: expected major.minor.build, found {parts} part(s)")]
    InvalidFormat { input: String, parts: usize },
    /// One of the three parts is not an integer.
    #[error("invalid version component {component:?} in {input:?}: {source}")]
    InvalidComponent {
        input: String,
        component: String,
        #[source]
        source: ParseIntError,
    },
}

/// A parsed `major.minor.build` triplet. Serves as the reference operand
/// (usually [`Version::current`]) and as the parsed form of a candidate string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: i64,
    pub minor: i64,
    pub build: i64,
}

impl Version {
    pub const fn new(major: i64, minor: i64, build: i64) -> Self {
        Self {
            major,
            minor,
            build,
        }
    }

    /// The version this binary was compiled as.
    pub fn current() -> Self {
        // Cargo guarantees these are plain integers.
        let part = |s: &str| s.parse::<i64>().unwrap_or_default();
        Self::new(
            part(env!("CARGO_PKG_VERSION_MAJOR")),
            part(env!("CARGO_PKG_VERSION_MINOR")),
            part(env!("CARGO_PKG_VERSION_PATCH")),
        )
    }

    fn as_tuple(&self) -> (i64, i64, i64) {
        (self.major, self.minor, self.build)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.build)
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_triplet(s)
    }
}

/// Split `input` into exactly three integer components.
fn parse_triplet(input: &str) -> Result<Version, VersionError> {
    let parts: Vec<&str> = input.split('.').collect();
    if parts.len() != 3 {
        return Err(VersionError::InvalidFormat {
            input: input.to_string(),
            parts: parts.len(),
        });
    }

    let component = |raw: &str| {
        raw.parse::<i64>()
            .map_err(|source| VersionError::InvalidComponent {
                input: input.to_string(),
                component: raw.to_string(),
                source,
            })
    };

    Ok(Version::new(
        component(parts[0])?,
        component(parts[1])?,
        component(parts[2])?,
    ))
}

/// Compare a dotted-triplet `candidate` against `reference`.
///
/// Components are compared in priority order (major, then minor, then build);
/// a higher-priority difference wins regardless of the lower components.
/// `Less` means the candidate is older than the reference, `Greater` newer.
pub fn compare_version(
    candidate: &str,
    reference: &Version,
) -> Result<Ordering, VersionError> {
    let candidate = parse_triplet(candidate)?;
    Ok(candidate.as_tuple().cmp(&reference.as_tuple()))
}

/// Signed form of [`compare_version`]: `-1`, `0` or `1`.
pub fn compare_version_signed(
    candidate: &str,
    reference: &Version,
) -> Result<i32, VersionError> {
    compare_version(candidate, reference).map(|ord| ord as i32)
}
