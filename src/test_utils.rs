//! Recording doubles for the capability traits

use crate::arrow::transport::{
    Action, BatchStream, FlightDescriptor, FlightResponse, FlightTransport, OutgoingHeaders,
    ResponseHeaders, AUTHORIZATION_HEADER,
};
use crate::aura::http::{HttpClient, HttpRequest, HttpResponse, Method};
use crate::error::{GdsError, GdsResult};
use crate::poll::Sleeper;
use crate::query::{CallParameters, ProcedureExecutor, Row, TabularResult};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub fn row(columns: &[(&str, Value)]) -> Row {
    columns
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// Records sleeps without sleeping, on a clock that only moves when slept or advanced
#[derive(Debug)]
pub struct RecordingSleeper {
    origin: Instant,
    sleeps: Mutex<Vec<Duration>>,
    advanced: Mutex<Duration>,
}

impl Default for RecordingSleeper {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
            sleeps: Mutex::new(Vec::new()),
            advanced: Mutex::new(Duration::ZERO),
        }
    }
}

impl RecordingSleeper {
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }

    pub fn total(&self) -> Duration {
        self.sleeps().iter().sum()
    }

    /// Move the clock without recording a sleep, as a slow call would
    pub fn advance(&self, duration: Duration) {
        *self.advanced.lock().unwrap() += duration;
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }

    fn now(&self) -> Instant {
        self.origin + self.total() + *self.advanced.lock().unwrap()
    }
}

/// Records every query; answers from a queue, then from a default result
pub struct CollectingExecutor {
    database: String,
    calls: Mutex<Vec<(String, CallParameters)>>,
    queued: Mutex<VecDeque<Vec<Row>>>,
    default_rows: Mutex<Vec<Row>>,
    close_error: Mutex<Option<String>>,
    closed: Mutex<bool>,
}

impl CollectingExecutor {
    pub fn new(database: &str) -> Self {
        Self {
            database: database.to_string(),
            calls: Mutex::new(Vec::new()),
            queued: Mutex::new(VecDeque::new()),
            default_rows: Mutex::new(Vec::new()),
            close_error: Mutex::new(None),
            closed: Mutex::new(false),
        }
    }

    pub fn push_result(&self, rows: Vec<Row>) {
        self.queued.lock().unwrap().push_back(rows);
    }

    pub fn set_default_result(&self, rows: Vec<Row>) {
        *self.default_rows.lock().unwrap() = rows;
    }

    pub fn fail_close(&self, message: &str) {
        *self.close_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn queries(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(q, _)| q.clone()).collect()
    }

    pub fn last_query(&self) -> Option<String> {
        self.calls.lock().unwrap().last().map(|(q, _)| q.clone())
    }

    pub fn last_params(&self) -> Option<CallParameters> {
        self.calls.lock().unwrap().last().map(|(_, p)| p.clone())
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.lock().unwrap()
    }
}

#[async_trait]
impl ProcedureExecutor for CollectingExecutor {
    async fn run_cypher(&self, query: &str, params: &CallParameters) -> GdsResult<TabularResult> {
        self.calls
            .lock()
            .unwrap()
            .push((query.to_string(), params.clone()));
        let rows = self
            .queued
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default_rows.lock().unwrap().clone());
        Ok(TabularResult::new(rows))
    }

    fn database(&self) -> Option<String> {
        Some(self.database.clone())
    }

    async fn close(&self) -> GdsResult<()> {
        *self.closed.lock().unwrap() = true;
        match self.close_error.lock().unwrap().clone() {
            Some(message) => Err(GdsError::Query(message)),
            None => Ok(()),
        }
    }
}

#[derive(Default)]
struct TransportState {
    actions: Vec<(String, Value)>,
    action_results: VecDeque<Value>,
    action_failure: Option<String>,
    authorization: Vec<String>,
    handshake_token: Option<String>,
    response_token: Option<String>,
    handshakes: usize,
    puts: Vec<(Value, usize)>,
    gets: Vec<Vec<String>>,
    get_batches: VecDeque<Vec<Bytes>>,
    closed: bool,
}

/// In-memory bulk-transfer endpoint
#[derive(Default)]
pub struct RecordingTransport {
    state: Mutex<TransportState>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_action_result(&self, result: Value) {
        self.state.lock().unwrap().action_results.push_back(result);
    }

    pub fn fail_next_action(&self, message: &str) {
        self.state.lock().unwrap().action_failure = Some(message.to_string());
    }

    /// Token handed out by the handshake
    pub fn set_handshake_token(&self, token: &str) {
        self.state.lock().unwrap().handshake_token = Some(token.to_string());
    }

    /// Token sent back with every action response
    pub fn set_response_token(&self, token: &str) {
        self.state.lock().unwrap().response_token = Some(token.to_string());
    }

    pub fn push_get_batches(&self, batches: Vec<Bytes>) {
        self.state.lock().unwrap().get_batches.push_back(batches);
    }

    pub fn actions(&self) -> Vec<(String, Value)> {
        self.state.lock().unwrap().actions.clone()
    }

    pub fn sent_authorization(&self) -> Vec<String> {
        self.state.lock().unwrap().authorization.clone()
    }

    pub fn handshakes(&self) -> usize {
        self.state.lock().unwrap().handshakes
    }

    pub fn puts(&self) -> Vec<(Value, usize)> {
        self.state.lock().unwrap().puts.clone()
    }

    pub fn gets(&self) -> Vec<Vec<String>> {
        self.state.lock().unwrap().gets.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }

    fn token_headers(token: &Option<String>) -> ResponseHeaders {
        match token {
            Some(token) => ResponseHeaders::new().with_text(AUTHORIZATION_HEADER, format!("Bearer {}", token)),
            None => ResponseHeaders::new(),
        }
    }
}

fn authorization(headers: &OutgoingHeaders) -> String {
    headers
        .iter()
        .find(|(k, _)| k == AUTHORIZATION_HEADER)
        .map(|(_, v)| v.clone())
        .unwrap_or_default()
}

#[async_trait]
impl FlightTransport for RecordingTransport {
    async fn handshake(&self, _headers: &OutgoingHeaders) -> GdsResult<ResponseHeaders> {
        let mut state = self.state.lock().unwrap();
        state.handshakes += 1;
        Ok(Self::token_headers(&state.handshake_token))
    }

    async fn do_action(
        &self,
        action: Action,
        headers: &OutgoingHeaders,
    ) -> GdsResult<FlightResponse<Vec<Bytes>>> {
        let mut state = self.state.lock().unwrap();
        state.authorization.push(authorization(headers));
        if let Some(message) = state.action_failure.take() {
            return Err(GdsError::Flight(message));
        }

        let body: Value = serde_json::from_slice(&action.body)?;
        state.actions.push((action.action_type, body));
        let result = state
            .action_results
            .pop_front()
            .unwrap_or_else(|| Value::Object(Default::default()));
        Ok(FlightResponse::new(
            Self::token_headers(&state.response_token),
            vec![Bytes::from(serde_json::to_vec(&result)?)],
        ))
    }

    async fn do_put(
        &self,
        descriptor: FlightDescriptor,
        batches: BatchStream,
        headers: &OutgoingHeaders,
    ) -> GdsResult<FlightResponse<()>> {
        let uploaded = batches.collect::<Vec<_>>().await.len();
        let command = match descriptor {
            FlightDescriptor::Command(bytes) => serde_json::from_slice(&bytes)?,
            FlightDescriptor::Path(path) => Value::from(path),
        };

        let mut state = self.state.lock().unwrap();
        state.authorization.push(authorization(headers));
        state.puts.push((command, uploaded));
        Ok(FlightResponse::new(Self::token_headers(&state.response_token), ()))
    }

    async fn do_get(
        &self,
        descriptor: FlightDescriptor,
        headers: &OutgoingHeaders,
    ) -> GdsResult<FlightResponse<BatchStream>> {
        let mut state = self.state.lock().unwrap();
        state.authorization.push(authorization(headers));
        if let FlightDescriptor::Path(path) = descriptor {
            state.gets.push(path);
        }
        let batches = state.get_batches.pop_front().unwrap_or_default();
        let stream = futures::stream::iter(batches.into_iter().map(Ok)).boxed();
        Ok(FlightResponse::new(Self::token_headers(&state.response_token), stream))
    }

    async fn close(&self) -> GdsResult<()> {
        self.state.lock().unwrap().closed = true;
        Ok(())
    }
}

/// Scripted HTTP endpoint keyed by method and URL without query.
///
/// Responses for a route are served in order; the last one repeats.
#[derive(Default)]
pub struct MockHttpClient {
    routes: Mutex<HashMap<(String, String), VecDeque<HttpResponse>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, method: Method, url: &str, response: HttpResponse) {
        self.routes
            .lock()
            .unwrap()
            .entry((format!("{:?}", method), url.to_string()))
            .or_default()
            .push_back(response);
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn send(&self, request: HttpRequest) -> GdsResult<HttpResponse> {
        let key = (format!("{:?}", request.method), request.url.clone());
        self.requests.lock().unwrap().push(request);

        let mut routes = self.routes.lock().unwrap();
        let queue = routes
            .get_mut(&key)
            .ok_or_else(|| GdsError::Transport(format!("no route for {:?}", key)))?;
        let response = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        response.ok_or_else(|| GdsError::Transport(format!("no response for {:?}", key)))
    }
}
