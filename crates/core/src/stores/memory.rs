use crate::error::StoreError;
use crate::store::{KnnQuery, StoreHit, UpsertOutcome};
use crate::traits::VectorStore;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Default)]
struct MemoryIndex {
    dimensions: usize,
    documents: BTreeMap<String, Map<String, Value>>,
}

/// Exact cosine k-NN over documents held in memory.
#[derive(Default)]
pub struct InMemoryStore {
    indices: Mutex<HashMap<String, MemoryIndex>>,
    rejected_ids: HashSet<String>,
    calls: AtomicUsize,
}

impl InMemoryStore {
    pub fn rejecting(ids: &[&str]) -> Self {
        Self {
            rejected_ids: ids.iter().map(|id| id.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn document(&self, index: &str, id: &str) -> Option<Map<String, Value>> {
        let indices = self.indices.lock().ok()?;
        indices.get(index)?.documents.get(id).cloned()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, MemoryIndex>>, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.indices
            .lock()
            .map_err(|_| StoreError::Request("memory store poisoned".to_string()))
    }
}

fn missing(index: &str) -> StoreError {
    StoreError::BackendResponse {
        backend: "memory".to_string(),
        details: format!("no such index {index}"),
    }
}

fn cosine(left: &[f32], right: &[f32]) -> f64 {
    let dot: f32 = left.iter().zip(right).map(|(a, b)| a * b).sum();
    let norm = |values: &[f32]| values.iter().map(|value| value * value).sum::<f32>().sqrt();
    let denominator = norm(left) * norm(right);
    if denominator == 0.0 {
        0.0
    } else {
        f64::from(dot / denominator)
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn ping(&self) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        true
    }

    async fn ensure_index(&self, index: &str, dimensions: usize) -> Result<(), StoreError> {
        let mut indices = self.lock()?;
        let entry = indices.entry(index.to_string()).or_insert_with(|| MemoryIndex {
            dimensions,
            documents: BTreeMap::new(),
        });
        if entry.dimensions != dimensions {
            return Err(StoreError::IncompatibleIndex {
                index: index.to_string(),
                details: format!("{} != {dimensions}", entry.dimensions),
            });
        }
        Ok(())
    }

    async fn upsert(
        &self,
        index: &str,
        id: &str,
        document: &Map<String, Value>,
    ) -> Result<UpsertOutcome, StoreError> {
        let mut indices = self.lock()?;
        if self.rejected_ids.contains(id) {
            return Err(StoreError::Request(format!("document {id} rejected")));
        }
        let target = indices.get_mut(index).ok_or_else(|| missing(index))?;
        match target.documents.insert(id.to_string(), document.clone()) {
            Some(_) => Ok(UpsertOutcome::Updated),
            None => Ok(UpsertOutcome::Created),
        }
    }

    async fn refresh(&self, index: &str) -> Result<(), StoreError> {
        let indices = self.lock()?;
        indices.get(index).map(|_| ()).ok_or_else(|| missing(index))
    }

    async fn count(&self, index: &str) -> Result<u64, StoreError> {
        let indices = self.lock()?;
        let target = indices.get(index).ok_or_else(|| missing(index))?;
        Ok(target.documents.len() as u64)
    }

    async fn knn_search(&self, index: &str, query: &KnnQuery) -> Result<Vec<StoreHit>, StoreError> {
        let indices = self.lock()?;
        let target = indices.get(index).ok_or_else(|| missing(index))?;

        let mut hits: Vec<StoreHit> = target
            .documents
            .iter()
            .filter_map(|(id, document)| {
                let vector: Vec<f32> = document
                    .get(&query.field)?
                    .as_array()?
                    .iter()
                    .filter_map(|value| value.as_f64().map(|number| number as f32))
                    .collect();
                let source = query
                    .source_fields
                    .iter()
                    .filter_map(|field| Some((field.clone(), document.get(field)?.clone())))
                    .collect();
                Some(StoreHit {
                    id: id.clone(),
                    score: (1.0 + cosine(&query.query_vector, &vector)) / 2.0,
                    source,
                })
            })
            .collect();

        hits.sort_by(|left, right| right.score.total_cmp(&left.score));
        hits.truncate(query.k);
        Ok(hits)
    }
}
