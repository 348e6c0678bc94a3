//! Deserialized shape of the `/query` endpoint responses.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Map, Value};

/// Top-level response of a `/query` call.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub results: Vec<StatementResult>,
}

/// Result of one statement; errors are reported inline per statement.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatementResult {
    #[serde(default)]
    pub statement_id: u64,
    #[serde(default)]
    pub series: Vec<Series>,
    #[serde(default)]
    pub error: Option<String>,
}

/// One measurement's worth of result rows, columnar.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Series {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tags: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub values: Vec<Vec<Value>>,
}

impl Series {
    /// Reassembles the columnar values into one map per row.
    pub fn rows(&self) -> impl Iterator<Item = Map<String, Value>> + '_ {
        self.values.iter().map(move |row| {
            self.columns
                .iter()
                .cloned()
                .zip(row.iter().cloned())
                .collect()
        })
    }
}

impl QueryResponse {
    /// The first inline statement error, if any.
    pub fn first_error(&self) -> Option<&str> {
        self.results
            .iter()
            .find_map(|result| result.error.as_deref())
    }

    pub fn series(&self) -> impl Iterator<Item = &Series> {
        self.results.iter().flat_map(|result| result.series.iter())
    }

    /// Total number of result rows across all series.
    pub fn value_count(&self) -> usize {
        self.series().map(|series| series.values.len()).sum()
    }
}
