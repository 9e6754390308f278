//! Session protocol version and its resolution

use crate::error::{GdsError, GdsResult};
use crate::query::{CallParameters, ProcedureExecutor};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

/// Query listing the protocol versions the database side supports
pub const PROTOCOL_VERSION_QUERY: &str = "CALL gds.session.dbms.protocol.version() YIELD version";

/// Wire-shape generation for projection and write-back calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProtocolVersion {
    /// Legacy shape: flat positional parameters
    V1,
    /// Current shape: connection and configuration maps, `.v2` procedures
    V2,
}

impl ProtocolVersion {
    /// Version assumed when the server advertises nothing
    pub const LEGACY: ProtocolVersion = ProtocolVersion::V1;

    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolVersion::V1 => "v1",
            ProtocolVersion::V2 => "v2",
        }
    }

    /// Suffix appended to versioned procedure names
    pub fn procedure_suffix(&self) -> &'static str {
        match self {
            ProtocolVersion::V1 => "",
            ProtocolVersion::V2 => ".v2",
        }
    }
}

impl FromStr for ProtocolVersion {
    type Err = GdsError;

    fn from_str(s: &str) -> GdsResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "v1" => Ok(ProtocolVersion::V1),
            "v2" => Ok(ProtocolVersion::V2),
            other => Err(GdsError::UnexpectedResponse(format!(
                "Unknown protocol version `{}`",
                other
            ))),
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Asks the database which protocol versions it supports and picks the highest.
///
/// Stateless: every `resolve` issues one query. Sessions cache the result.
#[derive(Clone)]
pub struct ProtocolVersionResolver {
    executor: Arc<dyn ProcedureExecutor>,
}

impl ProtocolVersionResolver {
    pub fn new(executor: Arc<dyn ProcedureExecutor>) -> Self {
        Self { executor }
    }

    pub async fn resolve(&self) -> GdsResult<ProtocolVersion> {
        let result = self
            .executor
            .run_cypher(PROTOCOL_VERSION_QUERY, &CallParameters::new())
            .await?;

        let mut highest: Option<ProtocolVersion> = None;
        for row in &result.rows {
            match row.get("version").and_then(Value::as_str) {
                Some(raw) => match raw.parse::<ProtocolVersion>() {
                    Ok(version) => highest = highest.max(Some(version)),
                    Err(_) => warn!("Ignoring unsupported protocol version `{}`", raw),
                },
                None => warn!("Protocol version row without a `version` string: {:?}", row),
            }
        }

        let resolved = highest.unwrap_or(ProtocolVersion::LEGACY);
        debug!("Resolved protocol version {}", resolved);
        Ok(resolved)
    }
}
