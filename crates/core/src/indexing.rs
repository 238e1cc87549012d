use crate::dataset::{cell_text, Dataset};
use crate::embeddings::Embedder;
use crate::error::IndexError;
use crate::models::{IndexConfiguration, IndexProgress, IndexReport, RowFailure, VECTOR_FIELD};
use crate::traits::VectorStore;
use chrono::Utc;
use serde_json::Value;
use tracing::{info, warn};

/// Embeds and upserts every record of `dataset` into `config.index`.
///
/// Configuration problems (unknown columns, duplicate or missing
/// identifiers, an incompatible index) fail the whole call before any row is
/// written. Once rows are flowing, a failing row is recorded in the report
/// and the loop moves on. `progress` is called after every row.
pub async fn index_dataset<S, P>(
    dataset: &Dataset,
    config: &IndexConfiguration,
    embedder: &dyn Embedder,
    store: &S,
    mut progress: P,
) -> Result<IndexReport, IndexError>
where
    S: VectorStore + ?Sized,
    P: FnMut(IndexProgress),
{
    let identifiers = config.validate(dataset)?;
    let started_at = Utc::now();
    let total = dataset.len();

    store.ensure_index(&config.index, embedder.dimensions()).await?;

    let mut succeeded = 0usize;
    let mut failed = Vec::new();

    for (position, (record, id)) in dataset.records().iter().zip(identifiers).enumerate() {
        let text = dataset
            .value(record, &config.text_column)
            .map(cell_text)
            .unwrap_or_default();

        let outcome = match embedder.embed(&text).await {
            Ok(vector) => {
                let mut document = dataset.document(record);
                document.insert(VECTOR_FIELD.to_string(), Value::from(vector));
                store
                    .upsert(&config.index, &id, &document)
                    .await
                    .map_err(|error| error.to_string())
            }
            Err(error) => Err(error.to_string()),
        };

        match outcome {
            Ok(_) => succeeded += 1,
            Err(reason) => {
                warn!(index = %config.index, %id, %reason, "row not indexed");
                failed.push(RowFailure { id, reason });
            }
        }

        progress(IndexProgress {
            current: position + 1,
            total,
        });
    }

    if let Err(error) = store.refresh(&config.index).await {
        warn!(index = %config.index, %error, "refresh after indexing failed");
    }

    let report = IndexReport {
        index: config.index.clone(),
        total,
        succeeded,
        failed,
        started_at,
        finished_at: Utc::now(),
    };

    info!(
        index = %report.index,
        total = report.total,
        succeeded = report.succeeded,
        failed = report.failed.len(),
        "indexing finished"
    );

    Ok(report)
}
