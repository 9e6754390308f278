//! Bulk-transfer client
//!
//! Named actions and streamed batch upload/download against the server's
//! columnar endpoint. Action bodies are flat JSON objects; optional settings
//! are only sent when the caller supplied them.

use crate::arrow::auth::AuthMiddleware;
use crate::arrow::info::ArrowInfo;
use crate::arrow::transport::{
    Action, BatchStream, FlightDescriptor, FlightTransport, OutgoingHeaders, ResponseHeaders,
};
use crate::config::{ArrowConnectionConfig, Credentials};
use crate::error::{GdsError, GdsResult};
use crate::version::ArrowEndpointVersion;
use bytes::Bytes;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

/// Token sent in connection metadata when the endpoint needs no authentication
pub const IGNORED_TOKEN: &str = "IGNORED";

/// Optional settings of a graph creation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CreateGraphOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub undirected_relationship_types: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inverse_indexed_relationship_types: Option<Vec<String>>,
}

/// Settings of a database creation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CreateDatabaseOptions {
    pub force: bool,
    pub high_io: bool,
    pub use_bad_collector: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_property: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NodeLoadDoneResult {
    pub name: String,
    pub node_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RelationshipLoadDoneResult {
    pub name: String,
    pub relationship_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TripletLoadDoneResult {
    pub name: String,
    pub node_count: u64,
    pub relationship_count: u64,
}

/// Entity kind of an uploaded stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityType {
    Node,
    Relationship,
    Triplet,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Node => "node",
            EntityType::Relationship => "relationship",
            EntityType::Triplet => "triplet",
        }
    }
}

/// Client of the bulk-transfer endpoint
pub struct GdsArrowClient {
    transport: Arc<dyn FlightTransport>,
    host: String,
    port: u16,
    encrypted: bool,
    auth: Option<AuthMiddleware>,
    endpoint_version: ArrowEndpointVersion,
}

impl GdsArrowClient {
    /// Client of the endpoint at `host:port`.
    ///
    /// With credentials the first call runs a handshake and the bearer token
    /// it yields is sent with every later call.
    ///
    /// # Example
    ///
    /// ```
    /// use gds_client::arrow::{FlightTransport, GdsArrowClient};
    /// use gds_client::{ArrowEndpointVersion, Credentials};
    /// use std::sync::Arc;
    ///
    /// fn client(transport: Arc<dyn FlightTransport>) -> GdsArrowClient {
    ///     let credentials = Credentials::new("neo4j", "password");
    ///     let client = GdsArrowClient::new(
    ///         transport,
    ///         "localhost",
    ///         8491,
    ///         false,
    ///         Some(&credentials),
    ///         ArrowEndpointVersion::V1,
    ///     );
    ///     assert_eq!(client.connection_info(), ("localhost".to_string(), 8491));
    ///     client
    /// }
    /// ```
    pub fn new(
        transport: Arc<dyn FlightTransport>,
        host: impl Into<String>,
        port: u16,
        encrypted: bool,
        credentials: Option<&Credentials>,
        endpoint_version: ArrowEndpointVersion,
    ) -> Self {
        Self {
            transport,
            host: host.into(),
            port,
            encrypted,
            auth: credentials.map(AuthMiddleware::new),
            endpoint_version,
        }
    }

    /// Client for the endpoint described by `info`, honoring the configured
    /// address override
    pub fn from_info(
        transport: Arc<dyn FlightTransport>,
        info: &ArrowInfo,
        config: &ArrowConnectionConfig,
    ) -> GdsResult<Self> {
        let address = config
            .connection_string_override
            .as_deref()
            .unwrap_or(&info.listen_address);
        let (host, port) = parse_address(address)?;
        let endpoint_version = ArrowEndpointVersion::from_arrow_info(&info.versions)?;

        info!(
            "Connecting bulk transfer to {}:{} (endpoint version {})",
            host,
            port,
            endpoint_version.version()
        );
        Ok(Self::new(
            transport,
            host,
            port,
            config.encrypted,
            config.credentials.as_ref(),
            endpoint_version,
        ))
    }

    /// Host and port of the endpoint
    pub fn connection_info(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }

    /// Whether the endpoint is reached over TLS
    pub fn encrypted(&self) -> bool {
        self.encrypted
    }

    /// Action-name generation negotiated with the endpoint
    pub fn endpoint_version(&self) -> ArrowEndpointVersion {
        self.endpoint_version
    }

    /// Bearer token for the endpoint, handshaking first if none is held yet
    pub async fn request_token(&self) -> GdsResult<String> {
        let auth = match &self.auth {
            Some(auth) => auth,
            None => return Ok(IGNORED_TOKEN.to_string()),
        };
        if let Some(token) = auth.token() {
            return Ok(token);
        }

        let headers = self
            .transport
            .handshake(&auth.sending_headers())
            .await
            .map_err(handle_flight_error)?;
        auth.received_headers(&headers)?;

        auth.token().ok_or_else(|| {
            GdsError::Authentication("No token received from the bulk-transfer handshake".to_string())
        })
    }

    /// Start an in-memory graph fed by node then relationship uploads
    pub async fn create_graph(
        &self,
        graph_name: &str,
        database: &str,
        options: &CreateGraphOptions,
    ) -> GdsResult<Value> {
        let body = action_body(json!({"name": graph_name, "database_name": database}), options)?;
        self.send_action("CREATE_GRAPH", body).await
    }

    /// Start an in-memory graph fed by triplet uploads
    pub async fn create_graph_from_triplets(
        &self,
        graph_name: &str,
        database: &str,
        options: &CreateGraphOptions,
    ) -> GdsResult<Value> {
        let body = action_body(json!({"name": graph_name, "database_name": database}), options)?;
        self.send_action("CREATE_GRAPH_FROM_TRIPLETS", body).await
    }

    /// Start a database import fed by node then relationship uploads
    pub async fn create_database(&self, name: &str, options: &CreateDatabaseOptions) -> GdsResult<Value> {
        let body = action_body(json!({"name": name}), options)?;
        self.send_action("CREATE_DATABASE", body).await
    }

    /// Mark the node uploads of `graph_name` complete
    pub async fn node_load_done(&self, graph_name: &str) -> GdsResult<NodeLoadDoneResult> {
        let result = self.send_action("NODE_LOAD_DONE", json!({"name": graph_name})).await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Mark the relationship uploads of `graph_name` complete
    pub async fn relationship_load_done(&self, graph_name: &str) -> GdsResult<RelationshipLoadDoneResult> {
        let result = self
            .send_action("RELATIONSHIP_LOAD_DONE", json!({"name": graph_name}))
            .await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Mark the triplet uploads of `graph_name` complete
    pub async fn triplet_load_done(&self, graph_name: &str) -> GdsResult<TripletLoadDoneResult> {
        let result = self.send_action("TRIPLET_LOAD_DONE", json!({"name": graph_name})).await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Drop a partially loaded graph or database
    pub async fn abort(&self, name: &str) -> GdsResult<()> {
        self.send_action("ABORT", json!({"name": name})).await?;
        Ok(())
    }

    /// Run an action under the negotiated name prefix and decode its first result
    pub async fn send_action(&self, action_type: &str, body: Value) -> GdsResult<Value> {
        let action = Action {
            action_type: format!("{}{}", self.endpoint_version.prefix(), action_type),
            body: Bytes::from(serde_json::to_vec(&body)?),
        };
        debug!("Sending bulk-transfer action {}", action.action_type);

        let name = action.action_type.clone();
        let response = self
            .transport
            .do_action(action, &self.headers())
            .await
            .map_err(handle_flight_error)?;
        self.observe(&response.headers)?;

        let first = response.payload.into_iter().next().ok_or_else(|| {
            GdsError::UnexpectedResponse(format!("Action `{}` returned no result", name))
        })?;
        Ok(serde_json::from_slice(&first)?)
    }

    /// Upload encoded node batches for `graph_name`
    pub async fn upload_nodes(&self, graph_name: &str, batches: BatchStream) -> GdsResult<()> {
        self.upload(graph_name, EntityType::Node, batches).await
    }

    /// Upload encoded relationship batches for `graph_name`
    pub async fn upload_relationships(&self, graph_name: &str, batches: BatchStream) -> GdsResult<()> {
        self.upload(graph_name, EntityType::Relationship, batches).await
    }

    /// Upload encoded triplet batches for `graph_name`
    pub async fn upload_triplets(&self, graph_name: &str, batches: BatchStream) -> GdsResult<()> {
        self.upload(graph_name, EntityType::Triplet, batches).await
    }

    async fn upload(&self, graph_name: &str, entity_type: EntityType, batches: BatchStream) -> GdsResult<()> {
        let command = json!({"name": graph_name, "entity_type": entity_type.as_str()});
        let descriptor = FlightDescriptor::Command(Bytes::from(serde_json::to_vec(&command)?));
        debug!("Uploading {} batches for graph {}", entity_type.as_str(), graph_name);

        let response = self
            .transport
            .do_put(descriptor, batches, &self.headers())
            .await
            .map_err(handle_flight_error)?;
        self.observe(&response.headers)
    }

    /// Download the batches published under `path`
    pub async fn get_stream(&self, path: &str) -> GdsResult<BatchStream> {
        let descriptor = FlightDescriptor::Path(vec![path.to_string()]);
        let response = self
            .transport
            .do_get(descriptor, &self.headers())
            .await
            .map_err(handle_flight_error)?;
        self.observe(&response.headers)?;
        Ok(response.payload)
    }

    /// Release the transport
    pub async fn close(&self) -> GdsResult<()> {
        self.transport.close().await
    }

    fn headers(&self) -> OutgoingHeaders {
        self.auth
            .as_ref()
            .map(AuthMiddleware::sending_headers)
            .unwrap_or_default()
    }

    fn observe(&self, headers: &ResponseHeaders) -> GdsResult<()> {
        match &self.auth {
            Some(auth) => auth.received_headers(headers),
            None => Ok(()),
        }
    }
}

fn action_body<T: Serialize>(base: Value, options: &T) -> GdsResult<Value> {
    let mut body: Map<String, Value> = match base {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    if let Value::Object(extra) = serde_json::to_value(options)? {
        body.extend(extra);
    }
    Ok(Value::Object(body))
}

/// `host:port` split into its parts
pub fn parse_address(address: &str) -> GdsResult<(String, u16)> {
    let (host, port) = address
        .rsplit_once(':')
        .ok_or_else(|| GdsError::Configuration(format!("Expected `host:port`, got `{}`", address)))?;
    let port = port
        .parse::<u16>()
        .map_err(|_| GdsError::Configuration(format!("Invalid port in `{}`", address)))?;
    Ok((host.to_string(), port))
}

fn flight_error_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r"(?s)^(\w+Error): .*?FlightRuntimeException: (.+?)(?:\. gRPC client debug context.*)?$").ok()
        })
        .as_ref()
}

/// Reduce a transport failure to its innermost server diagnostic
pub fn clean_flight_message(message: &str) -> String {
    flight_error_pattern()
        .and_then(|pattern| pattern.captures(message))
        .map(|caps| format!("{}: {}", &caps[1], &caps[2]))
        .unwrap_or_else(|| message.to_string())
}

/// Transport errors keep their variant; server diagnostics are cleaned
pub fn handle_flight_error(err: GdsError) -> GdsError {
    match err {
        GdsError::Flight(message) => GdsError::Flight(clean_flight_message(&message)),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::RecordingTransport;
    use futures::StreamExt;

    fn client(transport: Arc<RecordingTransport>) -> GdsArrowClient {
        GdsArrowClient::new(
            transport,
            "localhost",
            8491,
            false,
            Some(&Credentials::new("user", "password")),
            ArrowEndpointVersion::V1,
        )
    }

    #[tokio::test]
    async fn test_create_graph_body() {
        let transport = Arc::new(RecordingTransport::new());
        let client = client(transport.clone());

        client
            .create_graph("g", "neo4j", &CreateGraphOptions::default())
            .await
            .unwrap();
        client
            .create_graph(
                "g",
                "neo4j",
                &CreateGraphOptions {
                    concurrency: Some(2),
                    undirected_relationship_types: Some(vec!["R".to_string()]),
                    inverse_indexed_relationship_types: Some(vec![]),
                },
            )
            .await
            .unwrap();

        let actions = transport.actions();
        assert_eq!(actions[0].0, "v1/CREATE_GRAPH");
        assert_eq!(actions[0].1, json!({"name": "g", "database_name": "neo4j"}));
        assert_eq!(
            actions[1].1,
            json!({
                "name": "g",
                "database_name": "neo4j",
                "concurrency": 2,
                "undirected_relationship_types": ["R"],
                "inverse_indexed_relationship_types": [],
            })
        );
    }

    #[tokio::test]
    async fn test_create_database_defaults() {
        let transport = Arc::new(RecordingTransport::new());
        let client = client(transport.clone());

        client
            .create_database("db", &CreateDatabaseOptions::default())
            .await
            .unwrap();
        client
            .create_database(
                "db",
                &CreateDatabaseOptions {
                    force: true,
                    id_type: Some("STRING".to_string()),
                    concurrency: Some(4),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let actions = transport.actions();
        assert_eq!(actions[0].0, "v1/CREATE_DATABASE");
        assert_eq!(
            actions[0].1,
            json!({"name": "db", "force": false, "high_io": false, "use_bad_collector": false})
        );
        assert_eq!(
            actions[1].1,
            json!({
                "name": "db",
                "force": true,
                "high_io": false,
                "use_bad_collector": false,
                "id_type": "STRING",
                "concurrency": 4,
            })
        );
    }

    #[tokio::test]
    async fn test_load_done_results() {
        let transport = Arc::new(RecordingTransport::new());
        transport.push_action_result(json!({"name": "g", "node_count": 42}));
        transport.push_action_result(json!({"name": "g", "relationship_count": 7}));
        transport.push_action_result(json!({"name": "g", "node_count": 3, "relationship_count": 2}));
        let client = client(transport.clone());

        let nodes = client.node_load_done("g").await.unwrap();
        let rels = client.relationship_load_done("g").await.unwrap();
        let triplets = client.triplet_load_done("g").await.unwrap();

        assert_eq!(nodes, NodeLoadDoneResult { name: "g".to_string(), node_count: 42 });
        assert_eq!(rels.relationship_count, 7);
        assert_eq!(triplets.node_count, 3);

        let names: Vec<String> = transport.actions().into_iter().map(|(name, _)| name).collect();
        assert_eq!(
            names,
            vec!["v1/NODE_LOAD_DONE", "v1/RELATIONSHIP_LOAD_DONE", "v1/TRIPLET_LOAD_DONE"]
        );
    }

    #[tokio::test]
    async fn test_alpha_endpoint_has_no_prefix() {
        let transport = Arc::new(RecordingTransport::new());
        let client = GdsArrowClient::new(
            transport.clone(),
            "localhost",
            8491,
            false,
            None,
            ArrowEndpointVersion::Alpha,
        );

        client.abort("g").await.unwrap();

        assert_eq!(transport.actions(), vec![("ABORT".to_string(), json!({"name": "g"}))]);
    }

    #[tokio::test]
    async fn test_request_token_handshakes_once() {
        let transport = Arc::new(RecordingTransport::new());
        transport.set_handshake_token("bearer-token");
        let client = client(transport.clone());

        assert_eq!(client.request_token().await.unwrap(), "bearer-token");
        assert_eq!(client.request_token().await.unwrap(), "bearer-token");
        assert_eq!(transport.handshakes(), 1);
    }

    #[tokio::test]
    async fn test_request_token_without_credentials() {
        let transport = Arc::new(RecordingTransport::new());
        let client = GdsArrowClient::new(transport.clone(), "h", 1, false, None, ArrowEndpointVersion::V1);

        assert_eq!(client.request_token().await.unwrap(), IGNORED_TOKEN);
        assert_eq!(transport.handshakes(), 0);
    }

    #[tokio::test]
    async fn test_action_headers_rotate_token() {
        let transport = Arc::new(RecordingTransport::new());
        transport.set_response_token("rotated");
        let client = client(transport.clone());

        client.abort("g").await.unwrap();
        client.abort("g").await.unwrap();

        let sent = transport.sent_authorization();
        assert_eq!(sent[0], "Basic dXNlcjpwYXNzd29yZA==");
        assert_eq!(sent[1], "Bearer rotated");
    }

    #[tokio::test]
    async fn test_upload_and_get_stream() {
        let transport = Arc::new(RecordingTransport::new());
        transport.push_get_batches(vec![Bytes::from_static(b"b1"), Bytes::from_static(b"b2")]);
        let client = client(transport.clone());

        let batches = futures::stream::iter(vec![Ok(Bytes::from_static(b"n1"))]).boxed();
        client.upload_nodes("g", batches).await.unwrap();
        let downloaded: Vec<Bytes> = client
            .get_stream("job-1.nodes")
            .await
            .unwrap()
            .map(|b| b.unwrap())
            .collect()
            .await;

        assert_eq!(
            transport.puts(),
            vec![(json!({"name": "g", "entity_type": "node"}), 1)]
        );
        assert_eq!(transport.gets(), vec![vec!["job-1.nodes".to_string()]]);
        assert_eq!(downloaded.len(), 2);
    }

    #[test]
    fn test_clean_flight_message() {
        let raw = "FlightServerError: Flight RPC failed with message: org.apache.arrow.flight.FlightRuntimeException: \
UNKNOWN: Graph with name `people-and-fruits` does not exist on database `neo4j`. It might exist on another database.. \
gRPC client debug context: UNKNOWN:Error received from peer ipv4:35.241.177.75:8491 {grpc_status:2, \
grpc_message:\"org.apache.arrow.flight.FlightRuntimeException: UNKNOWN: Graph with name `people-and-fruits` does not exist\"}. \
Client context: IOError: Server never sent a data message. Detail: Internal";
        assert_eq!(
            clean_flight_message(raw),
            "FlightServerError: UNKNOWN: Graph with name `people-and-fruits` does not exist on database `neo4j`. \
It might exist on another database."
        );

        let raw = "FlightServerError: Flight returned internal error, with message: \
org.apache.arrow.flight.FlightRuntimeException: UNKNOWN: Unexpected configuration key(s): [undirectedRelationshipTypes]";
        assert_eq!(
            clean_flight_message(raw),
            "FlightServerError: UNKNOWN: Unexpected configuration key(s): [undirectedRelationshipTypes]"
        );

        assert_eq!(clean_flight_message("connection refused"), "connection refused");
    }

    #[tokio::test]
    async fn test_action_errors_are_cleaned() {
        let transport = Arc::new(RecordingTransport::new());
        transport.fail_next_action(
            "FlightServerError: Flight returned internal error, with message: \
org.apache.arrow.flight.FlightRuntimeException: UNKNOWN: Graph `g` already exists",
        );
        let client = client(transport.clone());

        let err = client
            .create_graph("g", "neo4j", &CreateGraphOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "FlightServerError: UNKNOWN: Graph `g` already exists");
    }

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address("localhost:8491").unwrap(), ("localhost".to_string(), 8491));
        assert!(parse_address("localhost").is_err());
        assert!(parse_address("localhost:http").is_err());
    }
}
