//! Bulk-transfer channel
//!
//! - `transport` - the raw wire seam
//! - `auth` - Basic to Bearer credential handling
//! - `client` - named actions and batch streams
//! - `info` - endpoint discovery

pub mod auth;
pub mod client;
pub mod info;
pub mod transport;

pub use auth::{AuthMiddleware, Credential};
pub use client::{
    CreateDatabaseOptions, CreateGraphOptions, GdsArrowClient, NodeLoadDoneResult,
    RelationshipLoadDoneResult, TripletLoadDoneResult,
};
pub use info::ArrowInfo;
pub use transport::{
    Action, BatchStream, FlightDescriptor, FlightResponse, FlightTransport, HeaderValue,
    OutgoingHeaders, ResponseHeaders,
};
