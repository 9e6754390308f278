#![allow(dead_code)]

use async_trait::async_trait;
use gds_client::aura::{HttpClient, HttpRequest, HttpResponse, Method};
use gds_client::poll::Sleeper;
use gds_client::query::{CallParameters, ProcedureExecutor, Row, TabularResult};
use gds_client::{GdsError, GdsResult};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub const BASE_URI: &str = "https://api.neo4j.io";

pub fn row(columns: &[(&str, Value)]) -> Row {
    columns
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// Executor answering every query with the same rows
pub struct FixedExecutor {
    database: String,
    rows: Mutex<VecDeque<Vec<Row>>>,
    calls: Mutex<Vec<(String, CallParameters)>>,
}

impl FixedExecutor {
    pub fn new(database: &str) -> Self {
        Self {
            database: database.to_string(),
            rows: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Rows of the next query; the last pushed rows repeat
    pub fn push(&self, rows: Vec<Row>) {
        self.rows.lock().unwrap().push_back(rows);
    }

    pub fn calls(&self) -> Vec<(String, CallParameters)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProcedureExecutor for FixedExecutor {
    async fn run_cypher(&self, query: &str, params: &CallParameters) -> GdsResult<TabularResult> {
        self.calls
            .lock()
            .unwrap()
            .push((query.to_string(), params.clone()));
        let mut rows = self.rows.lock().unwrap();
        let next = if rows.len() > 1 {
            rows.pop_front().unwrap_or_default()
        } else {
            rows.front().cloned().unwrap_or_default()
        };
        Ok(TabularResult::new(next))
    }

    fn database(&self) -> Option<String> {
        Some(self.database.clone())
    }
}

/// HTTP double matching on method and URL, in registration order
#[derive(Default)]
pub struct StubHttp {
    routes: Mutex<Vec<(Method, String, HttpResponse)>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl StubHttp {
    pub fn new() -> Self {
        Self::default()
    }

    /// Later registrations for the same route take precedence
    pub fn stub(&self, method: Method, path: &str, status: u16, body: Value) {
        self.routes.lock().unwrap().push((
            method,
            format!("{}{}", BASE_URI, path),
            HttpResponse::json_body(status, &body),
        ));
    }

    pub fn stub_token(&self, expires_in: i64) {
        self.stub(
            Method::Post,
            "/oauth/token",
            200,
            json!({"access_token": "very_short_token", "expires_in": expires_in, "token_type": "Bearer"}),
        );
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, path: &str) -> usize {
        let url = format!("{}{}", BASE_URI, path);
        self.requests().iter().filter(|r| r.url == url).count()
    }
}

#[async_trait]
impl HttpClient for StubHttp {
    async fn send(&self, request: HttpRequest) -> GdsResult<HttpResponse> {
        let found = self
            .routes
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(method, url, _)| *method == request.method && *url == request.url)
            .map(|(_, _, response)| response.clone());
        self.requests.lock().unwrap().push(request.clone());
        found.ok_or_else(|| GdsError::Transport(format!("unexpected request to {}", request.url)))
    }
}

/// Counts sleeps on a virtual clock
pub struct CountingSleeper {
    origin: Instant,
    sleeps: Mutex<Vec<Duration>>,
}

impl Default for CountingSleeper {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
            sleeps: Mutex::new(Vec::new()),
        }
    }
}

impl CountingSleeper {
    pub fn count(&self) -> usize {
        self.sleeps.lock().unwrap().len()
    }

    pub fn total(&self) -> Duration {
        self.sleeps.lock().unwrap().iter().sum()
    }
}

#[async_trait]
impl Sleeper for CountingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }

    fn now(&self) -> Instant {
        self.origin + self.total()
    }
}
