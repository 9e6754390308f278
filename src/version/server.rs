//! Server release version

use crate::error::{GdsError, GdsResult};
use std::fmt;
use std::str::FromStr;

/// `major.minor.patch` release of the compute server.
///
/// Ordering is lexicographic on the three numbers. Pre-release suffixes
/// (`2.7.0-alpha01`) are accepted when parsing and ignored for ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ServerVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ServerVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }

    /// Whether this version lies in `[min_inclusive, max_exclusive)`
    pub fn is_within(&self, min_inclusive: ServerVersion, max_exclusive: Option<ServerVersion>) -> bool {
        *self >= min_inclusive && max_exclusive.map_or(true, |max| *self < max)
    }
}

impl FromStr for ServerVersion {
    type Err = GdsError;

    fn from_str(s: &str) -> GdsResult<Self> {
        let core = s.trim().split(['-', '+']).next().unwrap_or_default();
        let mut parts = core.split('.');

        let mut next = |name: &str| -> GdsResult<u32> {
            match parts.next() {
                None => Ok(0),
                Some(p) => p.parse::<u32>().map_err(|_| {
                    GdsError::UnexpectedResponse(format!(
                        "Invalid {} component in server version `{}`",
                        name, s
                    ))
                }),
            }
        };

        let major = next("major")?;
        let minor = next("minor")?;
        let patch = next("patch")?;
        Ok(Self::new(major, minor, patch))
    }
}

impl fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
