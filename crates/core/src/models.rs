use crate::dataset::{cell_text, Dataset};
use crate::error::IndexError;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Field that carries the embedding in every indexed document.
pub const VECTOR_FIELD: &str = "vector";

/// Rectangular data with a fixed column order, shared by datasets and
/// search results so both can be exported.
pub trait Tabular {
    fn columns(&self) -> &[String];
    fn rows(&self) -> Vec<&[Value]>;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexConfiguration {
    pub index: String,
    pub text_column: String,
    pub identifier_column: String,
    pub display_columns: Vec<String>,
}

impl IndexConfiguration {
    /// Checks the configuration against `dataset` and returns the identifier
    /// of every record in dataset order.
    pub fn validate(&self, dataset: &Dataset) -> Result<Vec<String>, IndexError> {
        validate_index_name(&self.index)?;

        if self.display_columns.is_empty() {
            return Err(IndexError::NoDisplayColumns);
        }

        if dataset.column_index(VECTOR_FIELD).is_some() {
            return Err(IndexError::ReservedColumn(VECTOR_FIELD.to_string()));
        }

        for column in [&self.text_column, &self.identifier_column]
            .into_iter()
            .chain(self.display_columns.iter())
        {
            if dataset.column_index(column).is_none() {
                return Err(IndexError::UnknownColumn(column.clone()));
            }
        }

        let mut first_seen = HashMap::<String, usize>::new();
        let mut identifiers = Vec::with_capacity(dataset.len());
        for (row, record) in dataset.records().iter().enumerate() {
            let id = match dataset.value(record, &self.identifier_column) {
                Some(Value::Null) | None => {
                    return Err(IndexError::MissingIdentifier {
                        row,
                        column: self.identifier_column.clone(),
                    })
                }
                Some(value) => cell_text(value),
            };

            if let Some(first_row) = first_seen.insert(id.clone(), row) {
                return Err(IndexError::DuplicateIdentifier {
                    id,
                    first_row,
                    row,
                });
            }
            identifiers.push(id);
        }

        Ok(identifiers)
    }
}

/// Elasticsearch index naming rules: lowercase, no path or wildcard
/// characters, must not start with `-`, `_` or `+`, at most 255 bytes.
pub fn validate_index_name(name: &str) -> Result<(), IndexError> {
    let pattern = index_name_pattern()?;
    if name.len() > 255 || !pattern.is_match(name) {
        return Err(IndexError::InvalidIndexName(name.to_string()));
    }
    Ok(())
}

fn index_name_pattern() -> Result<&'static Regex, regex::Error> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    if let Some(pattern) = PATTERN.get() {
        return Ok(pattern);
    }
    let compiled = Regex::new(r"^[a-z0-9][a-z0-9._\-]*$")?;
    Ok(PATTERN.get_or_init(|| compiled))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexProgress {
    pub current: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RowFailure {
    pub id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexReport {
    pub index: String,
    pub total: usize,
    pub succeeded: usize,
    pub failed: Vec<RowFailure>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOptions {
    pub k: usize,
    pub num_candidates: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            k: 10,
            num_candidates: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub score: f64,
    pub values: Vec<Value>,
}

/// Ranked hits, best first, with values projected to `columns`.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub query: String,
    pub columns: Vec<String>,
    pub hits: Vec<SearchHit>,
}

impl Tabular for SearchResult {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn rows(&self) -> Vec<&[Value]> {
        self.hits.iter().map(|hit| hit.values.as_slice()).collect()
    }
}
