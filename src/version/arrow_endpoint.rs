//! Bulk-transfer endpoint generation

use crate::error::{GdsError, GdsResult};

/// Action-name generation spoken by the bulk-transfer endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ArrowEndpointVersion {
    /// Unprefixed action names (`CREATE_GRAPH`)
    Alpha,
    /// `v1/` prefixed action names (`v1/CREATE_GRAPH`)
    V1,
}

impl ArrowEndpointVersion {
    /// Pick the version to speak from the list the server advertises.
    ///
    /// `v1` is preferred; `alpha` is used when it is the only known entry or when
    /// the server predates version advertising (empty list).
    pub fn from_arrow_info<S: AsRef<str>>(supported: &[S]) -> GdsResult<Self> {
        if supported.is_empty() {
            return Ok(ArrowEndpointVersion::Alpha);
        }
        if supported.iter().any(|v| v.as_ref() == "v1") {
            return Ok(ArrowEndpointVersion::V1);
        }
        if supported.iter().any(|v| v.as_ref() == "alpha") {
            return Ok(ArrowEndpointVersion::Alpha);
        }

        let listed: Vec<&str> = supported.iter().map(AsRef::as_ref).collect();
        Err(GdsError::UnsupportedArrowVersion(format!(
            "[{}]. The client supports [alpha, v1]",
            listed.join(", ")
        )))
    }

    pub fn version(&self) -> &'static str {
        match self {
            ArrowEndpointVersion::Alpha => "alpha",
            ArrowEndpointVersion::V1 => "v1",
        }
    }

    /// Prefix put in front of every action name
    pub fn prefix(&self) -> &'static str {
        match self {
            ArrowEndpointVersion::Alpha => "",
            ArrowEndpointVersion::V1 => "v1/",
        }
    }
}
