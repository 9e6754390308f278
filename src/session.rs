//! Client session
//!
//! A `Session` binds the compute-server and database executors, the optional
//! bulk-transfer client and the facts resolved about the servers. It owns the
//! connections and releases them in [`Session::close`].

use crate::arrow::{ArrowInfo, FlightTransport, GdsArrowClient};
use crate::config::SessionConfig;
use crate::error::GdsResult;
use crate::query::{CallParameters, ProcedureExecutor, SessionQueryRunner, TabularResult};
use crate::version::{ProtocolVersion, ServerVersion};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, warn};

/// Query returning the compute server's release
pub const SERVER_VERSION_QUERY: &str = "RETURN gds.version() AS version";

/// Connections and resolved server facts of one client session
pub struct Session {
    runner: SessionQueryRunner,
    server_version: OnceCell<ServerVersion>,
    closed: bool,
}

impl Session {
    /// Open a session over the given executors.
    ///
    /// When bulk transfer is enabled the compute server is asked about its
    /// endpoint. An endpoint that is not running turns bulk routing off for
    /// the session. Without a transport, calls that must be routed over bulk
    /// transfer fail with a configuration error.
    ///
    /// When discovery or the client setup fails, the transport and both
    /// executors are closed before the error is returned.
    pub async fn connect(
        config: &SessionConfig,
        gds: Arc<dyn ProcedureExecutor>,
        db: Arc<dyn ProcedureExecutor>,
        transport: Option<Arc<dyn FlightTransport>>,
    ) -> GdsResult<Self> {
        let resolved = Self::bulk_transfer(config, gds.as_ref(), transport.clone()).await;
        let (arrow, bulk_routing) = match resolved {
            Ok(resolved) => resolved,
            Err(e) => {
                release(gds.as_ref(), db.as_ref(), transport.as_deref()).await;
                return Err(e);
            }
        };

        info!("Session opened (bulk routing: {})", bulk_routing);
        Ok(Self::from_runner(SessionQueryRunner::new(gds, db, arrow, bulk_routing)))
    }

    async fn bulk_transfer(
        config: &SessionConfig,
        gds: &dyn ProcedureExecutor,
        transport: Option<Arc<dyn FlightTransport>>,
    ) -> GdsResult<(Option<Arc<GdsArrowClient>>, bool)> {
        if !config.arrow.enabled {
            return Ok((None, false));
        }

        let arrow_info = ArrowInfo::fetch(gds).await?;
        if !arrow_info.is_available() {
            warn!(
                "Bulk transfer is not running on the server ({}), routing all calls as procedures",
                arrow_info.listen_address
            );
            return Ok((None, false));
        }

        let arrow = match transport {
            Some(transport) => Some(Arc::new(GdsArrowClient::from_info(
                transport,
                &arrow_info,
                &config.arrow,
            )?)),
            None => None,
        };
        Ok((arrow, true))
    }

    /// Wrap an already configured runner
    pub fn from_runner(runner: SessionQueryRunner) -> Self {
        Self {
            runner,
            server_version: OnceCell::new(),
            closed: false,
        }
    }

    /// Router of the session's calls
    pub fn runner(&self) -> &SessionQueryRunner {
        &self.runner
    }

    /// Bulk-transfer client, if one was set up
    pub fn arrow_client(&self) -> Option<&Arc<GdsArrowClient>> {
        self.runner.arrow_client()
    }

    /// Call `endpoint`, routed as [`SessionQueryRunner::call_procedure`] decides
    pub async fn call_procedure(
        &self,
        endpoint: &str,
        params: CallParameters,
        yields: Option<&[&str]>,
    ) -> GdsResult<TabularResult> {
        self.runner.call_procedure(endpoint, params, yields).await
    }

    /// Run a query on the database
    pub async fn run_cypher(&self, query: &str, params: &CallParameters) -> GdsResult<TabularResult> {
        self.runner.run_cypher(query, params).await
    }

    /// Protocol version negotiated with the database, resolved once
    pub async fn protocol_version(&self) -> GdsResult<ProtocolVersion> {
        self.runner.protocol_version().await
    }

    /// Release of the compute server, queried once
    pub async fn server_version(&self) -> GdsResult<ServerVersion> {
        self.server_version
            .get_or_try_init(|| async {
                let result = self
                    .runner
                    .gds_executor()
                    .run_cypher(SERVER_VERSION_QUERY, &CallParameters::new())
                    .await?;
                let raw = result.scalar("version").and_then(Value::as_str).unwrap_or_default();
                raw.parse::<ServerVersion>()
            })
            .await
            .copied()
    }

    /// Close every connection of the session.
    ///
    /// All resources are closed even when one fails; the first failure is returned.
    pub async fn close(mut self) -> GdsResult<()> {
        self.closed = true;
        self.runner.close().await
    }
}

/// Close whatever a failed `connect` was handed; failures are only logged
async fn release(
    gds: &dyn ProcedureExecutor,
    db: &dyn ProcedureExecutor,
    transport: Option<&dyn FlightTransport>,
) {
    if let Some(transport) = transport {
        if let Err(e) = transport.close().await {
            warn!("Failed to close the bulk-transfer transport: {}", e);
        }
    }
    for executor in [gds, db] {
        if let Err(e) = executor.close().await {
            warn!(
                "Failed to close the connection to `{}`: {}",
                executor.database().unwrap_or_default(),
                e
            );
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.closed {
            warn!("Session dropped without close(); connections were not released cleanly");
        }
    }
}
