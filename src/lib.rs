//! GDS Client
//!
//! Session client for graph data science servers. Procedure calls are routed
//! either to the compute server as plain procedure calls or through the
//! database with bulk-transfer connection metadata, depending on the operation
//! and on the protocol version the servers negotiate.
//!
//! # Modules
//!
//! - [`query`] - procedure-call routing and version-dependent parameter shapes
//! - [`arrow`] - bulk-transfer client and its credential handling
//! - [`version`] - server, protocol and endpoint versions
//! - [`poll`] - bounded polling for long-running operations
//! - [`aura`] - cloud-management API (tenants, instances, OAuth tokens)
//! - [`compute`] - asynchronous jobs on a compute cluster
//! - [`session`] - binds executors and clients and owns their release
//!
//! # Example
//!
//! Without a bulk-transfer transport, write-backs work on graphs projected
//! from the local database:
//!
//! ```no_run
//! use gds_client::{CallParameters, GdsResult, Session, SessionConfig};
//! use gds_client::query::ProcedureExecutor;
//! use std::sync::Arc;
//!
//! async fn degree(gds: Arc<dyn ProcedureExecutor>, db: Arc<dyn ProcedureExecutor>) -> GdsResult<()> {
//!     let session = Session::connect(&SessionConfig::default(), gds, db, None).await?;
//!     let params = CallParameters::new()
//!         .with("graph_name", "g")
//!         .with("config", serde_json::json!({"writeProperty": "degree"}));
//!     session.call_procedure("gds.degree.write", params, None).await?;
//!     session.close().await
//! }
//! ```

pub mod arrow;
pub mod aura;
pub mod compute;
pub mod config;
pub mod error;
pub mod poll;
pub mod query;
pub mod session;
pub mod version;

#[cfg(test)]
mod test_utils;

pub use arrow::{FlightTransport, GdsArrowClient};
pub use aura::{AuraApi, HttpClient, ReqwestHttpClient};
pub use compute::{ComputeJobClient, JobHandle, JobRequest};
pub use config::{AuraApiConfig, ComputeClusterConfig, Credentials, GdsConfig, SessionConfig};
pub use error::{GdsError, GdsResult};
pub use poll::{PollConfig, PollOutcome};
pub use query::{CallParameters, ProcedureExecutor, SessionQueryRunner, TabularResult};
pub use session::Session;
pub use version::{ArrowEndpointVersion, ProtocolVersion, ServerVersion};

/// Version of this crate, sent in the user agent of REST calls
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
