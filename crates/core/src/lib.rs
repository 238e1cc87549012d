pub mod config;
pub mod dataset;
pub mod embeddings;
pub mod error;
pub mod export;
pub mod indexing;
pub mod models;
pub mod search;
pub mod session;
pub mod store;
pub mod stores;
pub mod traits;

pub use config::{ConfigSource, EmbeddingBackendKind, EmbeddingConfig, HubConfig, StoreConfig};
pub use dataset::{cell_text, ColumnKind, ColumnSummary, Dataset, Record};
pub use embeddings::{
    CharacterNgramEmbedder, Embedder, EmbeddingBackend, EmbeddingProvider, ModelId, TeiEmbedder,
};
pub use error::{
    ConfigError, ConnectionError, EmbedError, ExportError, IndexError, ParseError, SearchError,
    SessionError, StoreError,
};
pub use export::{export, to_csv, to_excel, to_pdf, ExportFormat};
pub use indexing::index_dataset;
pub use models::{
    IndexConfiguration, IndexProgress, IndexReport, RowFailure, SearchHit, SearchOptions,
    SearchResult, Tabular, VECTOR_FIELD,
};
pub use search::{search, MAX_NUM_CANDIDATES};
pub use session::{Session, Stage};
pub use store::{KnnQuery, StoreHit, UpsertOutcome};
pub use stores::ElasticStore;
pub use traits::VectorStore;
