use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct KnnQuery {
    pub field: String,
    pub query_vector: Vec<f32>,
    pub k: usize,
    pub num_candidates: usize,
    pub source_fields: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct StoreHit {
    pub id: String,
    pub score: f64,
    pub source: Map<String, Value>,
}

impl StoreHit {
    /// Values of `columns` in order; absent fields read as null.
    pub fn project(&self, columns: &[String]) -> Vec<Value> {
        columns
            .iter()
            .map(|column| self.source.get(column).cloned().unwrap_or(Value::Null))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}
