//! Asynchronous jobs on a compute cluster
//!
//! Jobs are started over REST, polled until they exit, and their results are
//! downloaded over bulk transfer as `<job_id>.nodes` / `<job_id>.relationships`.

use crate::arrow::{BatchStream, GdsArrowClient};
use crate::aura::http::{HttpClient, HttpRequest};
use crate::config::ComputeClusterConfig;
use crate::error::{GdsError, GdsResult};
use crate::poll::{poll_until, PollOutcome, Sleeper, StatusSnapshot, TokioSleeper, JOB_COMPLETION};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Graph name sent by jobs that read no graph
pub const NO_GRAPH: &str = "NOGRAPH";

/// Server-assigned job identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of result a job can publish
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    Nodes,
    Relationships,
}

impl ResultKind {
    fn suffix(&self) -> &'static str {
        match self {
            ResultKind::Nodes => "nodes",
            ResultKind::Relationships => "relationships",
        }
    }
}

/// A job to submit
#[derive(Debug, Clone, PartialEq)]
pub struct JobRequest {
    pub task: String,
    /// Graph the job reads; `None` for jobs working on a stored model only
    pub graph_name: Option<String>,
    pub model_name: Option<String>,
    /// Task-specific settings
    pub task_config: Map<String, Value>,
    pub stream_node_results: bool,
    pub stream_rel_results: bool,
    pub mlflow_experiment_name: Option<String>,
}

impl JobRequest {
    /// A request for `task` with no graph, model or settings.
    ///
    /// # Example
    ///
    /// ```
    /// use gds_client::JobRequest;
    ///
    /// let request = JobRequest::new("GraphSage")
    ///     .on_graph("cora")
    ///     .with_config("embeddingDimension", 64)
    ///     .stream_nodes();
    /// assert_eq!(request.graph_name.as_deref(), Some("cora"));
    /// assert!(request.stream_node_results);
    /// ```
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            graph_name: None,
            model_name: None,
            task_config: Map::new(),
            stream_node_results: false,
            stream_rel_results: false,
            mlflow_experiment_name: None,
        }
    }

    /// Graph the job reads
    pub fn on_graph(mut self, graph_name: impl Into<String>) -> Self {
        self.graph_name = Some(graph_name.into());
        self
    }

    /// Stored model the job works on
    pub fn with_model(mut self, model_name: impl Into<String>) -> Self {
        self.model_name = Some(model_name.into());
        self
    }

    /// Add one task setting; a repeated key replaces the earlier value
    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.task_config.insert(key.into(), value.into());
        self
    }

    /// Ask the job to keep node results for streaming
    pub fn stream_nodes(mut self) -> Self {
        self.stream_node_results = true;
        self
    }

    /// Ask the job to keep relationship results for streaming
    pub fn stream_relationships(mut self) -> Self {
        self.stream_rel_results = true;
        self
    }

    /// Track the job in this experiment; needs a configured tracking URI
    pub fn with_mlflow_experiment(mut self, name: impl Into<String>) -> Self {
        self.mlflow_experiment_name = Some(name.into());
        self
    }
}

/// A started job
#[derive(Debug, Clone, PartialEq)]
pub struct JobHandle {
    pub job_id: JobId,
    pub task: String,
    pub stream_node_results: bool,
    pub stream_rel_results: bool,
}

/// Status of a job as reported by the cluster
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JobStatusSnapshot {
    pub job_status: String,
    #[serde(default)]
    pub errors: Vec<String>,
    /// HTTP status of the status response
    #[serde(skip)]
    pub http_status: u16,
}

impl StatusSnapshot for JobStatusSnapshot {
    fn status(&self) -> &str {
        &self.job_status
    }
}

#[derive(Debug, Deserialize)]
struct StartResponse {
    job_id: String,
}

/// Client of the compute cluster's job API
pub struct ComputeJobClient {
    http: Arc<dyn HttpClient>,
    config: ComputeClusterConfig,
    arrow: Option<Arc<GdsArrowClient>>,
    sleeper: Arc<dyn Sleeper>,
}

impl ComputeJobClient {
    /// Client of the cluster at `config.web_uri`, sleeping on the tokio timer
    pub fn new(http: Arc<dyn HttpClient>, config: ComputeClusterConfig) -> Self {
        Self {
            http,
            config,
            arrow: None,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Bulk-transfer client used to download results
    pub fn with_arrow_client(mut self, arrow: Arc<GdsArrowClient>) -> Self {
        self.arrow = Some(arrow);
        self
    }

    /// Replace the sleeper used between job status checks
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Request body of a job start
    pub fn start_body(&self, request: &JobRequest) -> Value {
        let mut task_config = Map::new();
        task_config.insert(
            "graph_config".to_string(),
            json!({
                "name": request.graph_name.as_deref().unwrap_or(NO_GRAPH),
                "config_type": "GdsGraphConfig",
            }),
        );
        if let Some(model_name) = &request.model_name {
            task_config.insert("modelname".to_string(), json!(model_name));
        }
        task_config.insert("task_config".to_string(), Value::Object(request.task_config.clone()));
        if request.stream_node_results {
            task_config.insert("stream_node_results".to_string(), json!(true));
        }
        if request.stream_rel_results {
            task_config.insert("stream_rel_results".to_string(), json!(true));
        }
        if let (Some(experiment), Some(tracking_uri)) = (&request.mlflow_experiment_name, &self.config.mlflow_uri) {
            task_config.insert(
                "mlflow".to_string(),
                json!({"tracking_uri": tracking_uri, "experiment_name": experiment}),
            );
        }

        let mut body = Map::new();
        body.insert("user_name".to_string(), json!(self.config.user_name));
        body.insert("task".to_string(), json!(request.task));
        body.insert("task_config".to_string(), Value::Object(task_config));
        body.insert("graph_arrow_uri".to_string(), json!(self.config.graph_arrow_uri));
        if let Some(password) = &self.config.encrypted_db_password {
            body.insert("encrypted_db_password".to_string(), json!(password));
        }
        Value::Object(body)
    }

    /// Start a job and return its handle
    pub async fn start_job(&self, request: &JobRequest) -> GdsResult<JobHandle> {
        if request.mlflow_experiment_name.is_some() && self.config.mlflow_uri.is_none() {
            return Err(GdsError::Configuration(
                "An experiment name was given, but no tracking URI is configured".to_string(),
            ));
        }

        let url = format!("{}/api/machine-learning/start", self.config.web_uri);
        let response = self
            .http
            .send(HttpRequest::post(url).json(self.start_body(request)))
            .await?
            .error_for_status()?;
        let started: StartResponse = response.json()?;

        info!("Job '{}' with ID '{}' started", request.task, started.job_id);
        Ok(JobHandle {
            job_id: JobId::new(started.job_id),
            task: request.task.clone(),
            stream_node_results: request.stream_node_results,
            stream_rel_results: request.stream_rel_results,
        })
    }

    /// Current status of a job
    pub async fn job_status(&self, job_id: &JobId) -> GdsResult<JobStatusSnapshot> {
        let url = format!("{}/api/machine-learning/status/{}", self.config.web_uri, job_id);
        let response = self.http.send(HttpRequest::get(url)).await?;

        let mut snapshot: JobStatusSnapshot = response.json()?;
        snapshot.http_status = response.status;
        Ok(snapshot)
    }

    /// Wait for the job to exit within the configured budget.
    ///
    /// A failed job is an error: `JobInput` when the cluster rejected the
    /// job's input (HTTP 400), `JobFailed` otherwise.
    pub async fn wait_for_job(&self, job: &JobHandle) -> GdsResult<PollOutcome<JobStatusSnapshot>> {
        let outcome = poll_until(
            || async { self.job_status(&job.job_id).await.map(Some) },
            &JOB_COMPLETION,
            &self.config.job_poll,
            self.sleeper.as_ref(),
        )
        .await?;

        match outcome {
            PollOutcome::Failed(Some(snapshot)) => {
                let message = format!(
                    "Job '{}' failed with errors:\n{}",
                    job.task,
                    snapshot.errors.join("\n")
                );
                if snapshot.http_status == 400 {
                    Err(GdsError::JobInput(message))
                } else {
                    Err(GdsError::JobFailed(message))
                }
            }
            PollOutcome::Failed(None) => Err(GdsError::JobFailed(format!(
                "Job '{}' with ID '{}' disappeared",
                job.task, job.job_id
            ))),
            PollOutcome::Converged(snapshot) => {
                info!("Job with ID '{}' completed", job.job_id);
                Ok(PollOutcome::Converged(snapshot))
            }
            pending => Ok(pending),
        }
    }

    /// Download the results a finished job published
    pub async fn stream_results(&self, job: &JobHandle, kind: ResultKind) -> GdsResult<BatchStream> {
        let published = match kind {
            ResultKind::Nodes => job.stream_node_results,
            ResultKind::Relationships => job.stream_rel_results,
        };
        if !published {
            return Err(GdsError::Configuration(format!(
                "No {} results to fetch: the job was not started with stream_{}_results",
                kind.suffix(),
                match kind {
                    ResultKind::Nodes => "node",
                    ResultKind::Relationships => "rel",
                }
            )));
        }

        let arrow = self.arrow.as_ref().ok_or_else(|| {
            GdsError::Configuration("No bulk-transfer client configured for job results".to_string())
        })?;
        arrow
            .get_stream(&format!("{}.{}", job.job_id, kind.suffix()))
            .await
    }

    /// Metrics recorded for a trained model, if any
    pub async fn model_metrics(&self, model_name: &str) -> GdsResult<Option<Value>> {
        let url = format!("{}/internal/fetch-model-metadata", self.config.web_uri);
        let request = HttpRequest::get(url)
            .query("user_name", self.config.user_name.as_str())
            .query("modelname", model_name);

        let metadata: Value = self.http.send(request).await?.error_for_status()?.json()?;
        Ok(metadata.get("metrics").cloned())
    }
}
