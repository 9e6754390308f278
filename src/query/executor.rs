//! Procedure-call transport seam
//!
//! The client never speaks the database wire protocol itself. It builds query
//! text and ordered parameters and hands them to a `ProcedureExecutor`.

use crate::error::GdsResult;
use crate::query::params::CallParameters;
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One result row, columns in yield order
pub type Row = IndexMap<String, Value>;

/// Rows returned by a procedure call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TabularResult {
    pub rows: Vec<Row>,
}

impl TabularResult {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    /// Number of result rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the result is empty
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }

    /// Column names of the first row
    pub fn columns(&self) -> Vec<&str> {
        self.rows
            .first()
            .map(|r| r.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Value of `column` in the first row
    pub fn scalar(&self, column: &str) -> Option<&Value> {
        self.rows.first().and_then(|r| r.get(column))
    }
}

/// Executes procedure calls against one server.
#[async_trait]
pub trait ProcedureExecutor: Send + Sync {
    /// Run query text with its parameters and collect the rows
    async fn run_cypher(&self, query: &str, params: &CallParameters) -> GdsResult<TabularResult>;

    /// Name of the database this executor targets, if it knows one
    fn database(&self) -> Option<String> {
        None
    }

    /// Release the underlying connection
    async fn close(&self) -> GdsResult<()> {
        Ok(())
    }

    /// `CALL endpoint($a, ...)[ YIELD ...]` with `params` in declaration order
    async fn call_procedure(
        &self,
        endpoint: &str,
        params: &CallParameters,
        yields: Option<&[&str]>,
    ) -> GdsResult<TabularResult> {
        let query = procedure_query(endpoint, params, yields);
        self.run_cypher(&query, params).await
    }
}

/// Build the query text of a procedure call
pub fn procedure_query(endpoint: &str, params: &CallParameters, yields: Option<&[&str]>) -> String {
    let yields_clause = match yields {
        Some(columns) if !columns.is_empty() => format!(" YIELD {}", columns.join(", ")),
        _ => String::new(),
    };
    format!("CALL {}({}){}", endpoint, params.placeholder_str(), yields_clause)
}
