use crate::config::StoreConfig;
use crate::dataset::Dataset;
use crate::embeddings::{EmbeddingProvider, ModelId};
use crate::error::SessionError;
use crate::export::{export, ExportFormat};
use crate::indexing::index_dataset;
use crate::models::{IndexConfiguration, IndexProgress, IndexReport, SearchOptions, SearchResult};
use crate::search::search;
use crate::stores::ElasticStore;
use crate::traits::VectorStore;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

/// How far a session has progressed. Stages only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Disconnected,
    Connected,
    DatasetLoaded,
    Indexed,
    Searched,
    Exported,
}

/// Everything one user works with: the open connection, the loaded models,
/// the uploaded dataset, the chosen configuration and the last result.
pub struct Session<S = ElasticStore> {
    id: Uuid,
    stage: Stage,
    store: Option<S>,
    embeddings: EmbeddingProvider,
    model: ModelId,
    dataset: Option<Dataset>,
    config: Option<IndexConfiguration>,
    last_result: Option<SearchResult>,
}

impl<S: VectorStore> Session<S> {
    pub fn new(embeddings: EmbeddingProvider, model: ModelId) -> Self {
        Self {
            id: Uuid::new_v4(),
            stage: Stage::Disconnected,
            store: None,
            embeddings,
            model,
            dataset: None,
            config: None,
            last_result: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn model(&self) -> ModelId {
        self.model
    }

    pub fn dataset(&self) -> Option<&Dataset> {
        self.dataset.as_ref()
    }

    pub fn config(&self) -> Option<&IndexConfiguration> {
        self.config.as_ref()
    }

    pub fn last_result(&self) -> Option<&SearchResult> {
        self.last_result.as_ref()
    }

    pub fn embeddings(&self) -> &EmbeddingProvider {
        &self.embeddings
    }

    /// Uses an already opened store handle.
    pub fn attach_store(&mut self, store: S) {
        self.store = Some(store);
        self.advance(Stage::Connected);
    }

    pub async fn ping(&self) -> bool {
        match &self.store {
            Some(store) => store.ping().await,
            None => false,
        }
    }

    pub fn load_dataset(&mut self, bytes: &[u8]) -> Result<&Dataset, SessionError> {
        self.require("load", Stage::Connected)?;
        let dataset = Dataset::parse(bytes)?;
        info!(session = %self.id, rows = dataset.len(), columns = dataset.columns().len(), "dataset loaded");

        self.config = None;
        self.last_result = None;
        self.advance(Stage::DatasetLoaded);
        Ok(self.dataset.insert(dataset))
    }

    /// Chooses the index and columns for the loaded dataset, and optionally
    /// switches the embedding model.
    pub fn configure(
        &mut self,
        config: IndexConfiguration,
        model: Option<ModelId>,
    ) -> Result<(), SessionError> {
        self.require("configure", Stage::DatasetLoaded)?;
        let dataset = self.dataset.as_ref().ok_or(SessionError::StageNotReached {
            action: "configure",
            required: Stage::DatasetLoaded,
            current: self.stage,
        })?;

        config.validate(dataset).map_err(SessionError::Index)?;
        if let Some(model) = model {
            self.model = model;
        }
        info!(session = %self.id, index = %config.index, model = %self.model, "configured");
        self.config = Some(config);
        Ok(())
    }

    pub async fn index<P>(&mut self, progress: P) -> Result<IndexReport, SessionError>
    where
        P: FnMut(IndexProgress),
    {
        self.require("index", Stage::DatasetLoaded)?;
        let embedder = self.embeddings.load(self.model).await?;
        let (store, dataset, config) = self.context("index")?;

        let report = index_dataset(dataset, config, embedder.as_ref(), store, progress)
            .instrument(info_span!("index", session = %self.id))
            .await?;

        self.advance(Stage::Indexed);
        Ok(report)
    }

    pub async fn search(
        &mut self,
        query: &str,
        options: SearchOptions,
    ) -> Result<&SearchResult, SessionError> {
        self.require("search", Stage::DatasetLoaded)?;
        let embedder = self.embeddings.load(self.model).await?;
        let (store, _, config) = self.context("search")?;

        let result = search(query, config, embedder.as_ref(), store, options)
            .instrument(info_span!("search", session = %self.id))
            .await?;

        self.advance(Stage::Searched);
        Ok(self.last_result.insert(result))
    }

    pub async fn count(&self) -> Result<u64, SessionError> {
        let (store, _, config) = self.context("count")?;
        Ok(store.count(&config.index).await?)
    }

    /// Serializes the last search result.
    pub fn export(&mut self, format: ExportFormat) -> Result<Vec<u8>, SessionError> {
        self.require("export", Stage::Searched)?;
        let result = self.last_result.as_ref().ok_or(SessionError::StageNotReached {
            action: "export",
            required: Stage::Searched,
            current: self.stage,
        })?;

        let bytes = export(result, format)?;
        info!(session = %self.id, %format, bytes = bytes.len(), rows = result.hits.len(), "exported");
        self.advance(Stage::Exported);
        Ok(bytes)
    }

    fn context(
        &self,
        action: &'static str,
    ) -> Result<(&S, &Dataset, &IndexConfiguration), SessionError> {
        let not_reached = |required| SessionError::StageNotReached {
            action,
            required,
            current: self.stage,
        };
        let store = self.store.as_ref().ok_or_else(|| not_reached(Stage::Connected))?;
        let dataset = self
            .dataset
            .as_ref()
            .ok_or_else(|| not_reached(Stage::DatasetLoaded))?;
        let config = self.config.as_ref().ok_or(SessionError::NotConfigured)?;
        Ok((store, dataset, config))
    }

    fn require(&self, action: &'static str, required: Stage) -> Result<(), SessionError> {
        if self.stage < required {
            return Err(SessionError::StageNotReached {
                action,
                required,
                current: self.stage,
            });
        }
        Ok(())
    }

    fn advance(&mut self, stage: Stage) {
        if stage > self.stage {
            info!(session = %self.id, from = ?self.stage, to = ?stage, "stage advanced");
            self.stage = stage;
        }
    }
}

impl Session<ElasticStore> {
    /// Opens the store connection. A failure leaves the session where it
    /// was so the user can fix the settings and retry.
    pub async fn connect(&mut self, config: &StoreConfig) -> Result<(), SessionError> {
        let store = ElasticStore::connect(config).await?;
        self.attach_store(store);
        Ok(())
    }
}
