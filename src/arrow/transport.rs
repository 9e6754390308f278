//! Bulk-transfer wire seam
//!
//! `FlightTransport` is the raw action/put/get channel to the server's
//! columnar endpoint. Batches cross it as encoded bytes; the client never
//! decodes them.
//!
//! This crate ships no network implementation. Callers hand
//! [`Session::connect`](crate::session::Session::connect) a transport backed
//! by their own gRPC Flight client, connected to the address the server
//! advertises (see [`GdsArrowClient::connection_info`](crate::arrow::GdsArrowClient::connection_info)).
//! An implementation must:
//!
//! - run the basic-auth handshake with the given headers and return the
//!   server's response headers, which carry the bearer token
//! - send every header in `OutgoingHeaders` as call metadata
//! - return response headers of every call, so refreshed tokens are picked up
//! - report server failures as `GdsError::Flight` with the full status message
//!
//! ```
//! use async_trait::async_trait;
//! use bytes::Bytes;
//! use gds_client::arrow::{
//!     Action, BatchStream, FlightDescriptor, FlightResponse, FlightTransport, OutgoingHeaders,
//!     ResponseHeaders,
//! };
//! use gds_client::{GdsError, GdsResult};
//!
//! /// Stand-in for an endpoint that is down
//! struct Unreachable;
//!
//! #[async_trait]
//! impl FlightTransport for Unreachable {
//!     async fn handshake(&self, _headers: &OutgoingHeaders) -> GdsResult<ResponseHeaders> {
//!         Err(GdsError::Flight("status: Unavailable, message: \"connection refused\"".into()))
//!     }
//!
//!     async fn do_action(
//!         &self,
//!         action: Action,
//!         _headers: &OutgoingHeaders,
//!     ) -> GdsResult<FlightResponse<Vec<Bytes>>> {
//!         Err(GdsError::Flight(format!("cannot run {}", action.action_type)))
//!     }
//!
//!     async fn do_put(
//!         &self,
//!         _descriptor: FlightDescriptor,
//!         _batches: BatchStream,
//!         _headers: &OutgoingHeaders,
//!     ) -> GdsResult<FlightResponse<()>> {
//!         Err(GdsError::Flight("cannot upload".into()))
//!     }
//!
//!     async fn do_get(
//!         &self,
//!         _descriptor: FlightDescriptor,
//!         _headers: &OutgoingHeaders,
//!     ) -> GdsResult<FlightResponse<BatchStream>> {
//!         Err(GdsError::Flight("cannot download".into()))
//!     }
//! }
//! ```

use crate::error::GdsResult;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use std::collections::HashMap;
use std::fmt;

/// Header carrying credentials in both directions
pub const AUTHORIZATION_HEADER: &str = "authorization";

/// Headers attached to an outgoing call
pub type OutgoingHeaders = Vec<(String, String)>;

/// Stream of encoded record batches
pub type BatchStream = BoxStream<'static, GdsResult<Bytes>>;

/// A response header value; gRPC metadata may be text or binary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderValue {
    Text(String),
    Binary(Bytes),
}

impl fmt::Display for HeaderValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderValue::Text(s) => f.write_str(s),
            HeaderValue::Binary(b) => f.write_str(&String::from_utf8_lossy(b)),
        }
    }
}

/// Multi-valued response headers, names lowercased
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseHeaders(HashMap<String, Vec<HeaderValue>>);

impl ResponseHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style append of one text value
    pub fn with_text(mut self, name: &str, value: impl Into<String>) -> Self {
        self.append(name, HeaderValue::Text(value.into()));
        self
    }

    pub fn append(&mut self, name: &str, value: HeaderValue) {
        self.0.entry(name.to_ascii_lowercase()).or_default().push(value);
    }

    pub fn get(&self, name: &str) -> Option<&[HeaderValue]> {
        self.0.get(&name.to_ascii_lowercase()).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A named action with a JSON body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub action_type: String,
    pub body: Bytes,
}

/// Address of a put or get stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlightDescriptor {
    Path(Vec<String>),
    Command(Bytes),
}

/// Payload of a call together with the headers the server sent back
pub struct FlightResponse<T> {
    pub headers: ResponseHeaders,
    pub payload: T,
}

impl<T> FlightResponse<T> {
    pub fn new(headers: ResponseHeaders, payload: T) -> Self {
        Self { headers, payload }
    }
}

/// Raw bulk-transfer channel.
///
/// Server failures should be reported as `GdsError::Flight` carrying the full
/// transport message; the client reduces it to the innermost diagnostic.
#[async_trait]
pub trait FlightTransport: Send + Sync {
    /// Authentication handshake with the given credentials
    async fn handshake(&self, headers: &OutgoingHeaders) -> GdsResult<ResponseHeaders>;

    /// Execute an action and collect its result bodies
    async fn do_action(
        &self,
        action: Action,
        headers: &OutgoingHeaders,
    ) -> GdsResult<FlightResponse<Vec<Bytes>>>;

    /// Upload a stream of batches
    async fn do_put(
        &self,
        descriptor: FlightDescriptor,
        batches: BatchStream,
        headers: &OutgoingHeaders,
    ) -> GdsResult<FlightResponse<()>>;

    /// Download a stream of batches
    async fn do_get(
        &self,
        descriptor: FlightDescriptor,
        headers: &OutgoingHeaders,
    ) -> GdsResult<FlightResponse<BatchStream>>;

    /// Release the connection
    async fn close(&self) -> GdsResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_are_case_insensitive() {
        let headers = ResponseHeaders::new().with_text("Authorization", "Bearer t");
        assert_eq!(
            headers.get("authorization"),
            Some(&[HeaderValue::Text("Bearer t".to_string())][..])
        );
        assert!(headers.get("x-other").is_none());
    }

    #[test]
    fn test_binary_header_display() {
        let value = HeaderValue::Binary(Bytes::from_static(b"12342"));
        assert_eq!(value.to_string(), "12342");
    }
}
