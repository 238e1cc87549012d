use crate::embeddings::Embedder;
use crate::error::SearchError;
use crate::models::{IndexConfiguration, SearchHit, SearchOptions, SearchResult, VECTOR_FIELD};
use crate::store::KnnQuery;
use crate::traits::VectorStore;
use tracing::info;

/// Largest candidate pool the store accepts for one k-NN query.
pub const MAX_NUM_CANDIDATES: usize = 10_000;

/// Embeds `query_text` and runs an approximate k-NN query against the
/// configured index, projecting hits to the display columns.
///
/// The embedder must be the one the index was built with; nothing here can
/// tell two models of equal dimensionality apart.
pub async fn search<S>(
    query_text: &str,
    config: &IndexConfiguration,
    embedder: &dyn Embedder,
    store: &S,
    options: SearchOptions,
) -> Result<SearchResult, SearchError>
where
    S: VectorStore + ?Sized,
{
    if query_text.trim().is_empty() {
        return Err(SearchError::EmptyQuery);
    }

    if options.k == 0
        || options.num_candidates < options.k
        || options.num_candidates > MAX_NUM_CANDIDATES
    {
        return Err(SearchError::InvalidLimits {
            k: options.k,
            num_candidates: options.num_candidates,
        });
    }

    let query_vector = embedder.embed(query_text).await?;
    let query = KnnQuery {
        field: VECTOR_FIELD.to_string(),
        query_vector,
        k: options.k,
        num_candidates: options.num_candidates,
        source_fields: config.display_columns.clone(),
    };

    let mut hits = store.knn_search(&config.index, &query).await?;
    hits.sort_by(|left, right| right.score.total_cmp(&left.score));
    hits.truncate(options.k);

    let result = SearchResult {
        query: query_text.to_string(),
        columns: config.display_columns.clone(),
        hits: hits
            .into_iter()
            .map(|hit| SearchHit {
                values: hit.project(&config.display_columns),
                id: hit.id,
                score: hit.score,
            })
            .collect(),
    };

    info!(index = %config.index, hits = result.hits.len(), "search finished");
    Ok(result)
}
