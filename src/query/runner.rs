//! Session query routing
//!
//! `SessionQueryRunner` sits between callers and the two servers of a session.
//! The compute server (`gds`) runs algorithms; the database server (`db`) owns
//! the data and drives bulk transfer into and out of the compute server.
//!
//! Projections are sent to the database with connection metadata so it can
//! push the graph over bulk transfer. Write-backs on remote-projected graphs run
//! on the compute server, which stages the results, and are then picked up by
//! a bulk write call on the database. Everything else passes through to the
//! compute server unchanged.

use crate::arrow::GdsArrowClient;
use crate::error::{GdsError, GdsResult};
use crate::query::endpoint::{Endpoint, EndpointKind, GRAPH_LIST_ENDPOINT, WRITE_ARROW_KEY};
use crate::query::executor::{ProcedureExecutor, TabularResult};
use crate::query::params::CallParameters;
use crate::query::shape::{
    bulk_write_endpoint, project_endpoint, shape_bulk_write, shape_projection, BulkWriteRequest,
    ConnectionMetadata, ShapeGeneration, Shaping,
};
use crate::version::{ProtocolVersion, ProtocolVersionResolver};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};
use uuid::Uuid;

/// Location reported by the graph catalog for graphs projected from a remote database
const REMOTE_LOCATION: &str = "remote";

/// Routes procedure calls of one session
pub struct SessionQueryRunner {
    gds: Arc<dyn ProcedureExecutor>,
    db: Arc<dyn ProcedureExecutor>,
    arrow: Option<Arc<GdsArrowClient>>,
    bulk_routing: bool,
    resolver: ProtocolVersionResolver,
    protocol_version: OnceCell<ProtocolVersion>,
}

impl SessionQueryRunner {
    /// Create a runner over the compute-server and database executors.
    ///
    /// `bulk_routing` turns routing of projections and remote write-backs on;
    /// `arrow` may be `None` when only local graphs are written.
    ///
    /// # Example
    ///
    /// ```
    /// use gds_client::query::{ProcedureExecutor, SessionQueryRunner};
    /// use std::sync::Arc;
    ///
    /// fn plain(gds: Arc<dyn ProcedureExecutor>, db: Arc<dyn ProcedureExecutor>) -> SessionQueryRunner {
    ///     let runner = SessionQueryRunner::new(gds, db, None, false);
    ///     assert!(!runner.bulk_routing_enabled());
    ///     runner
    /// }
    /// ```
    pub fn new(
        gds: Arc<dyn ProcedureExecutor>,
        db: Arc<dyn ProcedureExecutor>,
        arrow: Option<Arc<GdsArrowClient>>,
        bulk_routing: bool,
    ) -> Self {
        let resolver = ProtocolVersionResolver::new(db.clone());
        Self {
            gds,
            db,
            arrow,
            bulk_routing,
            resolver,
            protocol_version: OnceCell::new(),
        }
    }

    /// Executor of the compute server
    pub fn gds_executor(&self) -> &Arc<dyn ProcedureExecutor> {
        &self.gds
    }

    /// Executor of the database server
    pub fn db_executor(&self) -> &Arc<dyn ProcedureExecutor> {
        &self.db
    }

    /// Bulk-transfer client, if the session has one
    pub fn arrow_client(&self) -> Option<&Arc<GdsArrowClient>> {
        self.arrow.as_ref()
    }

    /// Whether projections and remote write-backs go over bulk transfer
    pub fn bulk_routing_enabled(&self) -> bool {
        self.bulk_routing
    }

    /// Protocol version of the session, resolved on first use
    pub async fn protocol_version(&self) -> GdsResult<ProtocolVersion> {
        self.protocol_version
            .get_or_try_init(|| self.resolver.resolve())
            .await
            .copied()
    }

    /// Run a query on the database unchanged
    pub async fn run_cypher(&self, query: &str, params: &CallParameters) -> GdsResult<TabularResult> {
        self.db.run_cypher(query, params).await
    }

    /// Call `endpoint` on whichever server should carry it.
    ///
    /// Write-backs on graphs projected from the local database always pass
    /// through. The bulk-transfer client is only required once a call has to
    /// be routed over bulk transfer.
    pub async fn call_procedure(
        &self,
        endpoint: &str,
        params: CallParameters,
        yields: Option<&[&str]>,
    ) -> GdsResult<TabularResult> {
        let endpoint = Endpoint::classify(endpoint);

        if !self.bulk_routing || !endpoint.needs_bulk_transfer() {
            return self.gds.call_procedure(endpoint.name(), &params, yields).await;
        }

        let mut graph_name = None;
        if endpoint.kind() == EndpointKind::WriteBack {
            let name = params.get("graph_name").cloned().ok_or_else(|| {
                GdsError::Configuration(format!("`{}` needs a `graph_name` parameter", endpoint.name()))
            })?;
            if !self.is_remote_projected(&name).await? {
                return self.gds.call_procedure(endpoint.name(), &params, yields).await;
            }
            graph_name = Some(name);
        }

        let arrow = self.arrow.clone().ok_or_else(|| {
            GdsError::Configuration(format!(
                "`{}` needs bulk transfer, but the session has no bulk-transfer client",
                endpoint.name()
            ))
        })?;

        match Shaping::select(endpoint.kind(), self.protocol_version().await?) {
            Shaping::Project(generation) => {
                self.remote_projection(generation, &arrow, params, yields)
                    .await
            }
            Shaping::WriteBack(generation) => {
                let graph_name = graph_name.unwrap_or(Value::Null);
                self.remote_write_back(generation, &arrow, &endpoint, graph_name, params, yields)
                    .await
            }
            Shaping::Unchanged => self.gds.call_procedure(endpoint.name(), &params, yields).await,
        }
    }

    async fn remote_projection(
        &self,
        generation: ShapeGeneration,
        arrow: &GdsArrowClient,
        params: CallParameters,
        yields: Option<&[&str]>,
    ) -> GdsResult<TabularResult> {
        let connection = connection_metadata(arrow).await?;

        let shaped = shape_projection(generation, params, &connection)?;
        let endpoint = project_endpoint(generation);
        debug!("Projecting over bulk transfer with {}", endpoint);

        self.db.call_procedure(&endpoint, &shaped, yields).await
    }

    async fn remote_write_back(
        &self,
        generation: ShapeGeneration,
        arrow: &GdsArrowClient,
        endpoint: &Endpoint,
        graph_name: Value,
        mut params: CallParameters,
        yields: Option<&[&str]>,
    ) -> GdsResult<TabularResult> {
        let connection = connection_metadata(arrow).await?;

        let mut config = match params.get("config") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(config)) => config.clone(),
            Some(other) => {
                return Err(GdsError::Configuration(format!(
                    "`config` of `{}` must be a map, got `{}`",
                    endpoint.name(),
                    other
                )))
            }
        };
        let arrow_tuning = config.remove(WRITE_ARROW_KEY);

        let sent_job_id = match config.get("jobId") {
            Some(Value::String(id)) => id.clone(),
            Some(other) => other.to_string(),
            None => {
                let id = Uuid::new_v4().to_string();
                config.insert("jobId".to_string(), Value::String(id.clone()));
                id
            }
        };
        config.insert("writeToResultStore".to_string(), Value::Bool(true));
        params.insert("config", Value::Object(config.clone()));

        let result = self.gds.call_procedure(endpoint.name(), &params, yields).await?;

        let job_id = result
            .scalar("jobId")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or(sent_job_id);

        let request = BulkWriteRequest {
            graph_name,
            job_id,
            database: self.db.database(),
            arrow_configuration: connection.arrow_configuration(arrow_tuning)?,
            write_config: config,
        };
        let shaped = shape_bulk_write(generation, request)?;
        let write_endpoint = bulk_write_endpoint(generation);
        info!("Writing results of {} back with {}", endpoint.name(), write_endpoint);

        self.db.call_procedure(&write_endpoint, &shaped, None).await
    }

    async fn is_remote_projected(&self, graph_name: &Value) -> GdsResult<bool> {
        let params = CallParameters::new().with("graph_name", graph_name.clone());
        let result = self
            .gds
            .call_procedure(GRAPH_LIST_ENDPOINT, &params, Some(&["databaseLocation"]))
            .await?;
        Ok(result.scalar("databaseLocation").and_then(Value::as_str) == Some(REMOTE_LOCATION))
    }

    /// Close both executors and the bulk-transfer client, reporting the first failure
    pub async fn close(&self) -> GdsResult<()> {
        let mut first_error = None;

        if let Some(arrow) = &self.arrow {
            if let Err(e) = arrow.close().await {
                first_error.get_or_insert(e);
            }
        }
        if let Err(e) = self.gds.close().await {
            first_error.get_or_insert(e);
        }
        if let Err(e) = self.db.close().await {
            first_error.get_or_insert(e);
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

async fn connection_metadata(arrow: &GdsArrowClient) -> GdsResult<ConnectionMetadata> {
    let (host, port) = arrow.connection_info();
    Ok(ConnectionMetadata {
        host,
        port,
        token: arrow.request_token().await?,
        encrypted: arrow.encrypted(),
    })
}
