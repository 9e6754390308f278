//! Endpoint descriptors
//!
//! Every procedure name the router sees falls into one operation family. The
//! family decides which transport carries the call and whether its parameters
//! need version-dependent packaging.

/// Remote graph projection over bulk transfer
pub const PROJECT_ENDPOINT: &str = "gds.arrow.project";

/// Bulk pickup of results staged by a write-back procedure
pub const BULK_WRITE_ENDPOINT: &str = "gds.arrow.write";

/// Graph catalog lookup used to find where a graph lives
pub const GRAPH_LIST_ENDPOINT: &str = "gds.graph.list";

/// Parameter of a projection call carrying bulk-transfer tuning
pub const PROJECT_ARROW_PARAM: &str = "arrow_configuration";

/// Key inside a write-back `config` carrying bulk-transfer tuning
pub const WRITE_ARROW_KEY: &str = "arrowConfiguration";

/// Operation family of an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointKind {
    /// Builds a graph in the compute server from database data
    GraphProjection,
    /// Computes results that must be written back to the database
    WriteBack,
    /// Plain procedure call, no reshaping
    Passthrough,
}

/// A named logical operation and its family
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    name: String,
    kind: EndpointKind,
}

impl Endpoint {
    /// Descriptor for a procedure name
    pub fn classify(name: &str) -> Self {
        let kind = if name == PROJECT_ENDPOINT {
            EndpointKind::GraphProjection
        } else if name.rsplit('.').next() == Some("write") && !name.starts_with(BULK_WRITE_ENDPOINT) {
            EndpointKind::WriteBack
        } else {
            EndpointKind::Passthrough
        };

        Self {
            name: name.to_string(),
            kind,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> EndpointKind {
        self.kind
    }

    /// Whether routing this endpoint needs a bulk-transfer client
    pub fn needs_bulk_transfer(&self) -> bool {
        self.kind != EndpointKind::Passthrough
    }
}
