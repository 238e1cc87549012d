use crate::embeddings::{EmbeddingBackend, EmbeddingProvider, ModelId};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use url::Url;

/// Points at a TOML secrets file; when set it is the only configuration source.
pub const SECRETS_ENV: &str = "VECTOR_FUSION_SECRETS";

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StoreConfig {
    pub endpoint: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Verify the store's TLS certificate. Off by default for local
    /// self-signed clusters.
    pub verify_tls: bool,
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://localhost:9200".to_string(),
            username: Some("elastic".to_string()),
            password: None,
            verify_tls: false,
            timeout_secs: 30,
        }
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("endpoint", &self.endpoint)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("verify_tls", &self.verify_tls)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackendKind {
    #[default]
    Local,
    Tei,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub backend: EmbeddingBackendKind,
    /// Base url of the text-embeddings-inference server.
    pub tei_url: Option<String>,
    pub model: ModelId,
}

impl EmbeddingConfig {
    pub fn provider(&self) -> Result<EmbeddingProvider, ConfigError> {
        let backend = match self.backend {
            EmbeddingBackendKind::Local => EmbeddingBackend::Local,
            EmbeddingBackendKind::Tei => EmbeddingBackend::Tei {
                endpoint: self
                    .tei_url
                    .clone()
                    .ok_or_else(|| ConfigError::Invalid("tei backend needs tei_url".to_string()))?,
            },
        };
        Ok(EmbeddingProvider::new(backend))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    Environment,
    SecretsFile,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct HubConfig {
    pub store: StoreConfig,
    pub embedding: EmbeddingConfig,
}

impl HubConfig {
    /// Secrets file when `VECTOR_FUSION_SECRETS` is set, environment otherwise.
    pub fn load() -> Result<(Self, ConfigSource), ConfigError> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    pub fn load_with(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(Self, ConfigSource), ConfigError> {
        match lookup(SECRETS_ENV) {
            Some(path) => Ok((Self::from_file(path)?, ConfigSource::SecretsFile)),
            None => Ok((Self::from_lookup(lookup)?, ConfigSource::Environment)),
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path: PathBuf = path.as_ref().to_path_buf();
        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;

        let config: Self = toml::from_str(&content).map_err(|error| ConfigError::Parse {
            path,
            message: error.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(endpoint) = lookup("ELASTICSEARCH_URL") {
            config.store.endpoint = endpoint;
        }
        if let Some(username) = lookup("ELASTICSEARCH_USERNAME") {
            config.store.username = Some(username).filter(|name| !name.is_empty());
        }
        if let Some(password) = lookup("ELASTICSEARCH_PASSWORD") {
            config.store.password = Some(password);
        }
        if let Some(verify) = lookup("ELASTICSEARCH_VERIFY_CERTS") {
            config.store.verify_tls = parse_flag("ELASTICSEARCH_VERIFY_CERTS", &verify)?;
        }
        if let Some(timeout) = lookup("ELASTICSEARCH_TIMEOUT_SECS") {
            config.store.timeout_secs = timeout.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("ELASTICSEARCH_TIMEOUT_SECS={timeout:?}"))
            })?;
        }
        if let Some(backend) = lookup("EMBEDDING_BACKEND") {
            config.embedding.backend = match backend.trim().to_ascii_lowercase().as_str() {
                "local" => EmbeddingBackendKind::Local,
                "tei" => EmbeddingBackendKind::Tei,
                other => {
                    return Err(ConfigError::Invalid(format!(
                        "EMBEDDING_BACKEND must be local or tei, got {other:?}"
                    )))
                }
            };
        }
        if let Some(url) = lookup("EMBEDDING_TEI_URL") {
            config.embedding.tei_url = Some(url);
        }
        if let Some(model) = lookup("EMBEDDING_MODEL") {
            config.embedding.model = model.parse()?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let endpoint = Url::parse(&self.store.endpoint)?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "store endpoint must be http or https, got {}",
                endpoint.scheme()
            )));
        }

        if self.embedding.backend == EmbeddingBackendKind::Tei {
            let tei = self
                .embedding
                .tei_url
                .as_deref()
                .ok_or_else(|| ConfigError::Invalid("tei backend needs tei_url".to_string()))?;
            Url::parse(tei)?;
        }

        Ok(())
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid(format!("{key}={value:?} is not a boolean"))),
    }
}
