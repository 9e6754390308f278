//! Error types for the GDS client

use thiserror::Error;

/// Errors that can occur when using the GDS client
#[derive(Error, Debug)]
pub enum GdsError {
    /// The session lacks a capability the requested routing needs
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Bulk-transfer server error, reduced to its innermost diagnostic
    #[error("{0}")]
    Flight(String),

    /// Credential handling failed (malformed auth header, missing token)
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// The account does not resolve to exactly one tenant
    #[error("Ambiguous tenant: {0}")]
    AmbiguousTenant(String),

    /// None of the advertised bulk-transfer endpoint versions is supported
    #[error("Unsupported arrow endpoint versions: {0}")]
    UnsupportedArrowVersion(String),

    /// An asynchronous job rejected its input
    #[error("Invalid job input: {0}")]
    JobInput(String),

    /// An asynchronous job failed on the server side
    #[error("Job failed: {0}")]
    JobFailed(String),

    /// Non-success HTTP status from a REST endpoint
    #[error("HTTP {status}: {message}")]
    HttpStatus {
        status: u16,
        message: String,
    },

    /// Procedure call failed in the executor
    #[error("Query error: {0}")]
    Query(String),

    /// Bulk-transfer transport failure that carries no server diagnostic
    #[error("Transport error: {0}")]
    Transport(String),

    /// A response was missing fields or had an unexpected shape
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML configuration error
    #[error("Config parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type GdsResult<T> = Result<T, GdsError>;
