use crate::error::{ConfigError, EmbedError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

/// Sentence-embedding models a session can pick from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModelId {
    #[default]
    MiniLm,
    Mpnet,
}

impl ModelId {
    pub fn dimensions(self) -> usize {
        match self {
            ModelId::MiniLm => 384,
            ModelId::Mpnet => 768,
        }
    }

    pub fn repository(self) -> &'static str {
        match self {
            ModelId::MiniLm => "sentence-transformers/all-MiniLM-L6-v2",
            ModelId::Mpnet => "sentence-transformers/all-mpnet-base-v2",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ModelId::MiniLm => "minilm",
            ModelId::Mpnet => "mpnet",
        }
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelId {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let lowered = value.trim().to_ascii_lowercase();
        let name = lowered.rsplit('/').next().unwrap_or_default();
        match name {
            "minilm" | "all-minilm-l6-v2" => Ok(ModelId::MiniLm),
            "mpnet" | "all-mpnet-base-v2" => Ok(ModelId::Mpnet),
            _ => Err(ConfigError::Invalid(format!("unknown embedding model {value:?}"))),
        }
    }
}

#[async_trait]
pub trait Embedder: Send + Sync {
    fn model(&self) -> ModelId;

    fn dimensions(&self) -> usize {
        self.model().dimensions()
    }

    /// Empty text is a valid input and still yields a full-length vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;
}

/// Offline embedder: hashed character trigrams, L2-normalized, sized to the
/// chosen model. Never returns the zero vector.
#[derive(Debug, Clone, Copy)]
pub struct CharacterNgramEmbedder {
    model: ModelId,
}

impl CharacterNgramEmbedder {
    pub fn new(model: ModelId) -> Self {
        Self { model }
    }

    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.model.dimensions()];
        let padded: Vec<char> = format!("\u{2}{}\u{3}", text.to_lowercase())
            .chars()
            .collect();

        let width = padded.len().min(3);
        for window in padded.windows(width) {
            let mut hash = 1469598103934665603u64;
            for byte in self.model.as_str().bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            for character in window {
                let mut buffer = [0u8; 4];
                for byte in character.encode_utf8(&mut buffer).bytes() {
                    hash ^= byte as u64;
                    hash = hash.wrapping_mul(1099511628211);
                }
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        vector
    }
}

#[async_trait]
impl Embedder for CharacterNgramEmbedder {
    fn model(&self) -> ModelId {
        self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        Ok(self.embed_sync(text))
    }
}

/// Client for a text-embeddings-inference server hosting one of the
/// sentence-transformers models.
pub struct TeiEmbedder {
    client: Client,
    endpoint: String,
    model: ModelId,
}

#[derive(Debug, Deserialize)]
struct TeiInfo {
    model_id: String,
}

impl TeiEmbedder {
    /// Connects once and checks that the server hosts `model`.
    pub async fn load(endpoint: impl Into<String>, model: ModelId) -> Result<Self, EmbedError> {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        let client = Client::new();

        let response = client.get(format!("{endpoint}/info")).send().await?;
        if !response.status().is_success() {
            return Err(EmbedError::BackendResponse(format!(
                "GET /info returned {}",
                response.status()
            )));
        }

        let info: TeiInfo = response.json().await?;
        if !info.model_id.eq_ignore_ascii_case(model.repository()) {
            return Err(EmbedError::ModelMismatch {
                expected: model.repository().to_string(),
                served: info.model_id,
            });
        }

        Ok(Self {
            client,
            endpoint,
            model,
        })
    }
}

#[async_trait]
impl Embedder for TeiEmbedder {
    fn model(&self) -> ModelId {
        self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        // The server rejects empty inputs; a lone space tokenizes to the same
        // special tokens.
        let input = if text.is_empty() { " " } else { text };

        let response = self
            .client
            .post(format!("{}/embed", self.endpoint))
            .json(&json!({ "inputs": input }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbedError::BackendResponse(format!("{status}: {body}")));
        }

        let parsed: Value = response.json().await?;
        let vector: Vec<f32> = parsed
            .pointer("/0")
            .and_then(Value::as_array)
            .ok_or_else(|| EmbedError::BackendResponse("missing embedding array".to_string()))?
            .iter()
            .map(|value| value.as_f64().map(|number| number as f32))
            .collect::<Option<_>>()
            .ok_or_else(|| EmbedError::BackendResponse("non-numeric embedding".to_string()))?;

        if vector.len() != self.dimensions() {
            return Err(EmbedError::DimensionMismatch {
                model: self.model.to_string(),
                expected: self.dimensions(),
                found: vector.len(),
            });
        }

        Ok(vector)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmbeddingBackend {
    Local,
    Tei { endpoint: String },
}

impl fmt::Display for EmbeddingBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmbeddingBackend::Local => f.write_str("local"),
            EmbeddingBackend::Tei { endpoint } => write!(f, "tei at {endpoint}"),
        }
    }
}

/// Loads each model at most once and hands out the cached instance.
pub struct EmbeddingProvider {
    backend: EmbeddingBackend,
    loaded: HashMap<ModelId, Arc<dyn Embedder>>,
}

impl EmbeddingProvider {
    pub fn new(backend: EmbeddingBackend) -> Self {
        Self {
            backend,
            loaded: HashMap::new(),
        }
    }

    pub fn backend(&self) -> &EmbeddingBackend {
        &self.backend
    }

    pub fn is_loaded(&self, model: ModelId) -> bool {
        self.loaded.contains_key(&model)
    }

    pub async fn load(&mut self, model: ModelId) -> Result<Arc<dyn Embedder>, EmbedError> {
        if let Some(embedder) = self.loaded.get(&model) {
            debug!(%model, "reusing loaded embedding model");
            return Ok(Arc::clone(embedder));
        }

        let embedder: Arc<dyn Embedder> = match &self.backend {
            EmbeddingBackend::Local => Arc::new(CharacterNgramEmbedder::new(model)),
            EmbeddingBackend::Tei { endpoint } => Arc::new(TeiEmbedder::load(endpoint, model).await?),
        };

        info!(%model, dimensions = model.dimensions(), "embedding model loaded");
        self.loaded.insert(model, Arc::clone(&embedder));
        Ok(embedder)
    }
}
