//! Response bodies of the cloud-management API

use crate::error::{GdsError, GdsResult};
use crate::poll::StatusSnapshot;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Missing and `null` strings both read as empty
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Instance as listed for a tenant
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InstanceDetails {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub tenant_id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub cloud_provider: String,
}

/// Full view of one instance
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InstanceSpecificDetails {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub tenant_id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub cloud_provider: String,
    pub status: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub connection_url: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub memory: String,
    #[serde(default, rename = "type", deserialize_with = "lenient_string")]
    pub instance_type: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub region: String,
}

impl StatusSnapshot for InstanceSpecificDetails {
    fn status(&self) -> &str {
        &self.status
    }
}

/// Credentials of a freshly created instance; shown only once
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceCreateDetails {
    pub id: String,
    pub username: String,
    pub password: String,
    pub connection_url: String,
}

impl InstanceCreateDetails {
    const FIELDS: [&'static str; 4] = ["id", "username", "password", "connection_url"];

    /// Requires every field; extra fields are ignored
    pub fn from_json(json: &Value) -> GdsResult<Self> {
        let field = |name: &str| json.get(name).and_then(Value::as_str).map(str::to_string);

        match (field("id"), field("username"), field("password"), field("connection_url")) {
            (Some(id), Some(username), Some(password), Some(connection_url)) => Ok(Self {
                id,
                username,
                password,
                connection_url,
            }),
            _ => Err(GdsError::UnexpectedResponse(format!(
                "Missing required field. Expected `{:?}` but got `{}`",
                Self::FIELDS,
                json
            ))),
        }
    }
}

/// Tenant entry of `GET /v1/tenants`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TenantSummary {
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct InstanceConfiguration {
    #[serde(rename = "type")]
    instance_type: String,
    region: String,
    cloud_provider: String,
}

#[derive(Debug, Clone, Deserialize)]
struct RawTenantDetails {
    id: String,
    instance_configurations: Vec<InstanceConfiguration>,
}

/// What a tenant may create
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantDetails {
    pub id: String,
    /// Instance type used for data-science instances
    pub ds_type: String,
    pub regions_per_provider: BTreeMap<String, BTreeSet<String>>,
}

impl TenantDetails {
    /// Fails when the tenant offers no data-science instance type
    pub fn from_json(json: &Value) -> GdsResult<Self> {
        let raw: RawTenantDetails = serde_json::from_value(json.clone())?;

        let mut regions_per_provider: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut instance_types = BTreeSet::new();
        let mut ds_type = None;

        for config in raw.instance_configurations {
            if config.instance_type.split('-').nth(1) == Some("ds") {
                regions_per_provider
                    .entry(config.cloud_provider)
                    .or_default()
                    .insert(config.region);
                ds_type = Some(config.instance_type.clone());
            }
            instance_types.insert(config.instance_type);
        }

        let ds_type = ds_type.ok_or_else(|| {
            GdsError::Configuration(format!(
                "Tenant with id `{}` cannot create DS instances. Available instances are `{:?}`.",
                raw.id, instance_types
            ))
        })?;

        Ok(Self {
            id: raw.id,
            ds_type,
            regions_per_provider,
        })
    }
}
