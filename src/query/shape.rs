//! Version-dependent parameter shapes
//!
//! Projection and bulk write-back calls exist in two wire generations. Which
//! one is used is a pure function of the endpoint family and the session's
//! protocol version, so the shapes can be checked without any transport.

use crate::error::{GdsError, GdsResult};
use crate::query::endpoint::{EndpointKind, BULK_WRITE_ENDPOINT, PROJECT_ARROW_PARAM, PROJECT_ENDPOINT};
use crate::query::params::{snake_to_camel, CallParameters};
use crate::version::ProtocolVersion;
use serde_json::{json, Map, Value};

/// Wire generation of a shaped call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeGeneration {
    /// Flat positional parameters
    Legacy,
    /// Connection map plus folded configuration map, `.v2` procedure
    Current,
}

impl ShapeGeneration {
    pub fn select(version: ProtocolVersion) -> Self {
        if version >= ProtocolVersion::V2 {
            ShapeGeneration::Current
        } else {
            ShapeGeneration::Legacy
        }
    }

    fn version(&self) -> ProtocolVersion {
        match self {
            ShapeGeneration::Legacy => ProtocolVersion::V1,
            ShapeGeneration::Current => ProtocolVersion::V2,
        }
    }
}

/// How a call is reshaped before it reaches a transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shaping {
    Unchanged,
    Project(ShapeGeneration),
    WriteBack(ShapeGeneration),
}

impl Shaping {
    pub fn select(kind: EndpointKind, version: ProtocolVersion) -> Self {
        let generation = ShapeGeneration::select(version);
        match kind {
            EndpointKind::GraphProjection => Shaping::Project(generation),
            EndpointKind::WriteBack => Shaping::WriteBack(generation),
            EndpointKind::Passthrough => Shaping::Unchanged,
        }
    }
}

/// Live bulk-transfer connection facts injected into shaped calls
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionMetadata {
    pub host: String,
    pub port: u16,
    pub token: String,
    pub encrypted: bool,
}

impl ConnectionMetadata {
    /// Connection facts merged with caller tuning; caller keys win
    pub fn arrow_configuration(&self, caller: Option<Value>) -> GdsResult<Map<String, Value>> {
        let mut merged = Map::new();
        merged.insert("encrypted".to_string(), json!(self.encrypted));
        merged.insert("host".to_string(), json!(self.host));
        merged.insert("port".to_string(), json!(self.port));
        merged.insert("token".to_string(), json!(self.token));

        match caller {
            None | Some(Value::Null) => {}
            Some(Value::Object(tuning)) => merged.extend(tuning),
            Some(other) => {
                return Err(GdsError::Configuration(format!(
                    "Arrow configuration must be a map, got `{}`",
                    other
                )))
            }
        }
        Ok(merged)
    }
}

/// Procedure name of the projection call
pub fn project_endpoint(generation: ShapeGeneration) -> String {
    format!("{}{}", PROJECT_ENDPOINT, generation.version().procedure_suffix())
}

/// Procedure name of the bulk write call
pub fn bulk_write_endpoint(generation: ShapeGeneration) -> String {
    format!("{}{}", BULK_WRITE_ENDPOINT, generation.version().procedure_suffix())
}

/// Reshape the caller's projection parameters
pub fn shape_projection(
    generation: ShapeGeneration,
    mut params: CallParameters,
    connection: &ConnectionMetadata,
) -> GdsResult<CallParameters> {
    match generation {
        ShapeGeneration::Legacy => {
            let caller = params.get(PROJECT_ARROW_PARAM).cloned();
            let arrow = connection.arrow_configuration(caller)?;
            // replaces in place when present, appends otherwise
            params.insert(PROJECT_ARROW_PARAM, Value::Object(arrow));
            Ok(params)
        }
        ShapeGeneration::Current => {
            let graph_name = take_required(&mut params, "graph_name")?;
            let query = take_required(&mut params, "query")?;
            let arrow = connection.arrow_configuration(params.remove(PROJECT_ARROW_PARAM))?;

            let configuration: Map<String, Value> = params
                .into_iter()
                .map(|(key, value)| (snake_to_camel(&key), value))
                .collect();

            Ok(CallParameters::new()
                .with("graph_name", graph_name)
                .with("query", query)
                .with(PROJECT_ARROW_PARAM, Value::Object(arrow))
                .with("configuration", Value::Object(configuration)))
        }
    }
}

/// Inputs of the bulk write call that follows a write-back procedure
#[derive(Debug, Clone, PartialEq)]
pub struct BulkWriteRequest {
    pub graph_name: Value,
    pub job_id: String,
    /// Target database; only the legacy shape sends it
    pub database: Option<String>,
    pub arrow_configuration: Map<String, Value>,
    /// The write-back procedure's own configuration
    pub write_config: Map<String, Value>,
}

/// Parameters of the bulk write call
pub fn shape_bulk_write(generation: ShapeGeneration, request: BulkWriteRequest) -> GdsResult<CallParameters> {
    match generation {
        ShapeGeneration::Legacy => {
            let database = request.database.ok_or_else(|| {
                GdsError::Configuration(
                    "The database executor reports no database name, which the v1 write protocol requires"
                        .to_string(),
                )
            })?;
            Ok(CallParameters::new()
                .with("graphName", request.graph_name)
                .with("databaseName", database)
                .with("jobId", request.job_id)
                .with("arrowConfiguration", Value::Object(request.arrow_configuration)))
        }
        ShapeGeneration::Current => {
            let mut configuration = Map::new();
            if let Some(concurrency) = request.write_config.get("concurrency") {
                configuration.insert("concurrency".to_string(), concurrency.clone());
            }
            Ok(CallParameters::new()
                .with("graphName", request.graph_name)
                .with("jobId", request.job_id)
                .with("arrowConfiguration", Value::Object(request.arrow_configuration))
                .with("configuration", Value::Object(configuration)))
        }
    }
}

fn take_required(params: &mut CallParameters, key: &str) -> GdsResult<Value> {
    params
        .remove(key)
        .ok_or_else(|| GdsError::Configuration(format!("Missing required parameter `{}`", key)))
}
