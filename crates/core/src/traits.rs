use crate::error::StoreError;
use crate::store::{KnnQuery, StoreHit, UpsertOutcome};
use async_trait::async_trait;
use serde_json::{Map, Value};

/// A document store with a built-in k-NN query over one dense-vector field.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn ping(&self) -> bool;

    /// Creates `index` with a `dimensions`-wide vector field if it is absent.
    /// An existing index must already declare the same dimensionality.
    async fn ensure_index(&self, index: &str, dimensions: usize) -> Result<(), StoreError>;

    async fn upsert(
        &self,
        index: &str,
        id: &str,
        document: &Map<String, Value>,
    ) -> Result<UpsertOutcome, StoreError>;

    /// Makes every write so far visible to search.
    async fn refresh(&self, index: &str) -> Result<(), StoreError>;

    async fn count(&self, index: &str) -> Result<u64, StoreError>;

    async fn knn_search(&self, index: &str, query: &KnnQuery) -> Result<Vec<StoreHit>, StoreError>;
}
