//! Discovery of the server's bulk-transfer endpoint

use crate::error::{GdsError, GdsResult};
use crate::query::{CallParameters, ProcedureExecutor};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

/// Procedure describing the bulk-transfer endpoint
pub const ARROW_INFO_ENDPOINT: &str = "gds.debug.arrow";

/// State of the bulk-transfer endpoint as reported by the server
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ArrowInfo {
    #[serde(rename = "listenAddress")]
    pub listen_address: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    pub running: bool,
    /// Advertised endpoint versions; older servers send none
    #[serde(default)]
    pub versions: Vec<String>,
}

fn enabled_by_default() -> bool {
    true
}

impl ArrowInfo {
    /// Ask the compute server about its bulk-transfer endpoint
    pub async fn fetch(executor: &dyn ProcedureExecutor) -> GdsResult<Self> {
        let result = executor
            .call_procedure(ARROW_INFO_ENDPOINT, &CallParameters::new(), None)
            .await?;
        let row = result.first().ok_or_else(|| {
            GdsError::UnexpectedResponse(format!("`{}` returned no rows", ARROW_INFO_ENDPOINT))
        })?;

        let object: Map<String, Value> = row.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        let info: ArrowInfo = serde_json::from_value(Value::Object(object))?;
        debug!(
            "Bulk-transfer endpoint at {} (running: {}, versions: {:?})",
            info.listen_address, info.running, info.versions
        );
        Ok(info)
    }

    /// Whether projections and write-backs can be routed over bulk transfer
    pub fn is_available(&self) -> bool {
        self.enabled && self.running
    }
}
