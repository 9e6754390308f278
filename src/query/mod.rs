//! Procedure-call routing
//!
//! Builds procedure calls, decides which server carries them and reshapes
//! their parameters for the session's protocol version.

pub mod endpoint;
pub mod executor;
pub mod params;
pub mod runner;
pub mod shape;

pub use endpoint::{Endpoint, EndpointKind};
pub use executor::{procedure_query, ProcedureExecutor, Row, TabularResult};
pub use params::CallParameters;
pub use runner::SessionQueryRunner;
pub use shape::{ConnectionMetadata, ShapeGeneration, Shaping};
