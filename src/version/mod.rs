//! Version negotiation
//!
//! Three independent version notions travel through the client:
//! - `ServerVersion` - the compute server's release, for feature gating
//! - `ProtocolVersion` - wire shape of projection and write-back calls
//! - `ArrowEndpointVersion` - action-name generation of the bulk-transfer endpoint

pub mod arrow_endpoint;
pub mod protocol;
pub mod server;

pub use arrow_endpoint::ArrowEndpointVersion;
pub use protocol::{ProtocolVersion, ProtocolVersionResolver};
pub use server::ServerVersion;
