//! Client configuration
//!
//! Every endpoint, credential and default the client needs is carried by these
//! structs and handed to constructors. Nothing is read from the process
//! environment. Durations are written in milliseconds when loaded from YAML.

use crate::error::GdsResult;
use crate::poll::{Backoff, PollConfig};
use serde::{Deserialize, Deserializer};
use std::time::Duration;

/// Default base URI of the cloud-management API
pub const DEFAULT_AURA_BASE_URI: &str = "https://api.neo4j.io";

/// User name sent with compute jobs when none is configured
pub const DEFAULT_JOB_USER: &str = "DUMMY_USER";

/// Basic credentials for the bulk-transfer endpoint
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Basic credentials
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Bulk-transfer connection settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArrowConnectionConfig {
    /// Route projections and write-backs over bulk transfer
    pub enabled: bool,
    /// `host:port` to use instead of the address the server advertises
    pub connection_string_override: Option<String>,
    /// Whether the bulk-transfer channel is TLS encrypted
    pub encrypted: bool,
    /// Credentials for the initial Basic handshake
    pub credentials: Option<Credentials>,
}

impl Default for ArrowConnectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            connection_string_override: None,
            encrypted: false,
            credentials: None,
        }
    }
}

/// Session settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub arrow: ArrowConnectionConfig,
}

/// Cloud-management API settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuraApiConfig {
    /// Stored without a trailing `/`
    #[serde(deserialize_with = "trimmed_uri")]
    pub base_uri: String,
    pub client_id: String,
    pub client_secret: String,
    /// Resolved from the account when absent
    pub tenant_id: Option<String>,
    pub user_agent: String,
    pub instance_poll: PollConfig,
}

impl Default for AuraApiConfig {
    fn default() -> Self {
        Self {
            base_uri: DEFAULT_AURA_BASE_URI.to_string(),
            client_id: String::new(),
            client_secret: String::new(),
            tenant_id: None,
            user_agent: format!("gds-client-rust-v{}", crate::VERSION),
            instance_poll: PollConfig {
                initial_interval: Duration::from_millis(200),
                max_wait: Duration::from_secs(300),
                backoff: Backoff::Fixed,
            },
        }
    }
}

impl AuraApiConfig {
    /// Settings for the given API client, with every other field defaulted
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            ..Self::default()
        }
    }

    /// Use this tenant instead of resolving it from the account
    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    /// Point the client at another API host
    pub fn with_base_uri(mut self, base_uri: impl Into<String>) -> Self {
        self.base_uri = base_uri.into().trim_end_matches('/').to_string();
        self
    }
}

/// Compute cluster settings for asynchronous jobs
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ComputeClusterConfig {
    /// Base URI of the job REST API, e.g. `http://10.0.0.1:5005`, stored without a trailing `/`
    #[serde(deserialize_with = "trimmed_uri")]
    pub web_uri: String,
    /// Bulk-transfer URI the job reads the graph from
    pub graph_arrow_uri: String,
    /// Experiment tracking URI, used when a job asks for tracking
    pub mlflow_uri: Option<String>,
    pub user_name: String,
    pub encrypted_db_password: Option<String>,
    pub job_poll: PollConfig,
}

impl Default for ComputeClusterConfig {
    fn default() -> Self {
        Self {
            web_uri: "http://localhost:5005".to_string(),
            graph_arrow_uri: "grpc://localhost:8491".to_string(),
            mlflow_uri: None,
            user_name: DEFAULT_JOB_USER.to_string(),
            encrypted_db_password: None,
            job_poll: PollConfig {
                initial_interval: Duration::from_secs(1),
                max_wait: Duration::from_secs(3600),
                backoff: Backoff::Fixed,
            },
        }
    }
}

/// Top-level configuration document
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GdsConfig {
    pub session: SessionConfig,
    pub aura: Option<AuraApiConfig>,
    pub compute: Option<ComputeClusterConfig>,
}

impl GdsConfig {
    /// Parse a YAML configuration document
    pub fn from_yaml_str(yaml: &str) -> GdsResult<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }
}

fn trimmed_uri<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let uri = String::deserialize(deserializer)?;
    Ok(uri.trim_end_matches('/').to_string())
}

/// Serde helpers for durations written as milliseconds
pub(crate) mod duration_ms {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
