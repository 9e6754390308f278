//! Cloud-management API client
//!
//! Creates, inspects and deletes data-science instances of one tenant. The
//! tenant is resolved from the account when it is not configured.

use crate::aura::http::{HttpClient, HttpRequest, HttpResponse};
use crate::aura::responses::{
    InstanceCreateDetails, InstanceDetails, InstanceSpecificDetails, TenantDetails, TenantSummary,
};
use crate::aura::token::TokenLifecycle;
use crate::config::AuraApiConfig;
use crate::error::{GdsError, GdsResult};
use crate::poll::{poll_until, PollConfig, PollOutcome, Sleeper, TokioSleeper, INSTANCE_READINESS};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

/// Database major version of created instances
const INSTANCE_VERSION: &str = "5";

#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

/// Client of the cloud-management REST API
pub struct AuraApi {
    http: Arc<dyn HttpClient>,
    config: AuraApiConfig,
    tokens: TokenLifecycle,
    tenant_id: String,
    sleeper: Arc<dyn Sleeper>,
}

impl AuraApi {
    /// Connect, resolving the tenant when none is configured
    pub async fn new(http: Arc<dyn HttpClient>, config: AuraApiConfig) -> GdsResult<Self> {
        let tokens = TokenLifecycle::new(http.clone(), &config);
        let mut api = Self {
            http,
            config,
            tokens,
            tenant_id: String::new(),
            sleeper: Arc::new(TokioSleeper),
        };

        api.tenant_id = match api.config.tenant_id.clone() {
            Some(tenant_id) => tenant_id,
            None => api.resolve_tenant_id().await?,
        };
        info!("Using tenant {}", api.tenant_id);
        Ok(api)
    }

    /// Replace the sleeper used between instance status checks
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Tenant the client acts for
    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    /// Instance types and sizes the tenant may create
    pub async fn tenant_details(&self) -> GdsResult<TenantDetails> {
        let response = self
            .send(HttpRequest::get(self.url(&format!("/v1/tenants/{}", self.tenant_id))))
            .await?
            .error_for_status()?;
        let envelope: DataEnvelope<Value> = response.json()?;
        TenantDetails::from_json(&envelope.data)
    }

    /// Create a data-science instance; the type comes from the tenant details
    pub async fn create_instance(
        &self,
        name: &str,
        memory: &str,
        cloud_provider: &str,
        region: &str,
    ) -> GdsResult<InstanceCreateDetails> {
        let tenant = self.tenant_details().await?;

        let body = json!({
            "name": name,
            "memory": memory,
            "version": INSTANCE_VERSION,
            "region": region,
            "type": tenant.ds_type,
            "tenant_id": self.tenant_id,
            "cloud_provider": cloud_provider,
        });
        info!("Creating instance {} ({}, {} in {})", name, memory, cloud_provider, region);

        let response = self
            .send(HttpRequest::post(self.url("/v1/instances")).json(body))
            .await?
            .error_for_status()?;
        let envelope: DataEnvelope<Value> = response.json()?;
        InstanceCreateDetails::from_json(&envelope.data)
    }

    /// `None` when the instance does not exist
    pub async fn delete_instance(&self, instance_id: &str) -> GdsResult<Option<InstanceSpecificDetails>> {
        let response = self
            .send(HttpRequest::delete(self.url(&format!("/v1/instances/{}", instance_id))))
            .await?;
        data_or_none(response)
    }

    /// Instances of the tenant
    pub async fn list_instances(&self) -> GdsResult<Vec<InstanceDetails>> {
        let response = self
            .send(HttpRequest::get(self.url("/v1/instances")).query("tenantId", self.tenant_id.as_str()))
            .await?
            .error_for_status()?;
        let envelope: DataEnvelope<Vec<InstanceDetails>> = response.json()?;
        Ok(envelope.data)
    }

    /// `None` when the instance does not exist
    pub async fn list_instance(&self, instance_id: &str) -> GdsResult<Option<InstanceSpecificDetails>> {
        let response = self
            .send(HttpRequest::get(self.url(&format!("/v1/instances/{}", instance_id))))
            .await?;
        data_or_none(response)
    }

    /// Wait for the instance to reach `running`
    pub async fn wait_for_instance_running(
        &self,
        instance_id: &str,
        poll: &PollConfig,
    ) -> GdsResult<PollOutcome<InstanceSpecificDetails>> {
        debug!("Waiting for instance {} to be running", instance_id);
        poll_until(
            || self.list_instance(instance_id),
            &INSTANCE_READINESS,
            poll,
            self.sleeper.as_ref(),
        )
        .await
    }

    /// Same as `wait_for_instance_running` with the configured budget
    pub async fn wait_for_instance(&self, instance_id: &str) -> GdsResult<PollOutcome<InstanceSpecificDetails>> {
        self.wait_for_instance_running(instance_id, &self.config.instance_poll)
            .await
    }

    /// Instance id from a connection URI like `neo4j+s://<id>[-suffix].databases.neo4j.io`
    pub fn extract_id(uri: &str) -> GdsResult<String> {
        let parse_error = || GdsError::Configuration(format!("Could not parse the uri `{}`", uri));

        let (_, rest) = uri.split_once("://").ok_or_else(parse_error)?;
        let (host, _) = rest.split_once('.').ok_or_else(parse_error)?;
        let id = host.split('-').next().unwrap_or_default();
        if id.is_empty() {
            return Err(parse_error());
        }
        Ok(id.to_string())
    }

    async fn resolve_tenant_id(&self) -> GdsResult<String> {
        let response = self
            .send(HttpRequest::get(self.url("/v1/tenants")))
            .await?
            .error_for_status()?;
        let envelope: DataEnvelope<Vec<TenantSummary>> = response.json()?;

        match envelope.data.as_slice() {
            [tenant] => Ok(tenant.id.clone()),
            [] => Err(GdsError::AmbiguousTenant(
                "This account has no access to any tenant".to_string(),
            )),
            tenants => {
                let listed: Vec<String> = tenants
                    .iter()
                    .map(|t| format!("{}: {}", t.id, t.name))
                    .collect();
                Err(GdsError::AmbiguousTenant(format!(
                    "This account has access to multiple tenants: `{{{}}}`. Please specify which one to use.",
                    listed.join(", ")
                )))
            }
        }
    }

    async fn send(&self, request: HttpRequest) -> GdsResult<HttpResponse> {
        let token = self.tokens.token().await?;
        let request = request
            .header("Authorization", format!("Bearer {}", token))
            .header("User-agent", self.config.user_agent.as_str());
        self.http.send(request).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_uri, path)
    }
}

fn data_or_none<T: DeserializeOwned>(response: HttpResponse) -> GdsResult<Option<T>> {
    if response.status == 404 {
        return Ok(None);
    }
    let envelope: DataEnvelope<T> = response.error_for_status()?.json()?;
    Ok(Some(envelope.data))
}
