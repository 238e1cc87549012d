use crate::config::StoreConfig;
use crate::error::{ConnectionError, StoreError};
use crate::models::VECTOR_FIELD;
use crate::store::{KnnQuery, StoreHit, UpsertOutcome};
use crate::traits::VectorStore;
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

const BACKEND: &str = "elasticsearch";

/// Handle to an Elasticsearch cluster spoken to over its REST API.
pub struct ElasticStore {
    client: Arc<Client>,
    endpoint: Url,
    username: Option<String>,
    password: Option<String>,
}

impl ElasticStore {
    /// Builds the client without touching the network.
    pub fn new(config: &StoreConfig) -> Result<Self, ConnectionError> {
        let endpoint = Url::parse(&config.endpoint).map_err(|error| {
            ConnectionError::InvalidEndpoint {
                endpoint: config.endpoint.clone(),
                details: error.to_string(),
            }
        })?;

        if !matches!(endpoint.scheme(), "http" | "https") || endpoint.cannot_be_a_base() {
            return Err(ConnectionError::InvalidEndpoint {
                endpoint: config.endpoint.clone(),
                details: "expected an http or https url".to_string(),
            });
        }

        let client = Client::builder()
            .danger_accept_invalid_certs(!config.verify_tls)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(ConnectionError::Client)?;

        Ok(Self {
            client: Arc::new(client),
            endpoint,
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    /// Builds the client and checks that the cluster answers and accepts the
    /// credentials.
    pub async fn connect(config: &StoreConfig) -> Result<Self, ConnectionError> {
        let store = Self::new(config)?;
        let unreachable = |details: String| ConnectionError::Unreachable {
            endpoint: config.endpoint.clone(),
            details,
        };

        let response = store
            .request(Method::GET, &[])
            .map_err(|error| unreachable(error.to_string()))?
            .send()
            .await
            .map_err(|error| unreachable(error.to_string()))?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(ConnectionError::Unauthorized(config.endpoint.clone()))
            }
            status if !status.is_success() => return Err(unreachable(status.to_string())),
            _ => {}
        }

        let banner: Value = response.json().await.unwrap_or(Value::Null);
        let cluster = banner_field(&banner, "/cluster_name");
        let version = banner_field(&banner, "/version/number");
        info!(
            endpoint = %config.endpoint,
            cluster,
            version,
            "connected to elasticsearch"
        );

        Ok(store)
    }

    fn url(&self, segments: &[&str]) -> Result<Url, StoreError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::Request(format!("{} cannot carry a path", self.endpoint)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder, StoreError> {
        let request = self.client.request(method, self.url(segments)?);
        Ok(match &self.username {
            Some(username) => request.basic_auth(username, self.password.as_ref()),
            None => request,
        })
    }

    async fn check_vector_mapping(&self, index: &str, dimensions: usize) -> Result<(), StoreError> {
        let response = self.request(Method::GET, &[index, "_mapping"])?.send().await?;
        let mapping: Value = expect_success(response).await?.json().await?;

        let incompatible = |details: String| StoreError::IncompatibleIndex {
            index: index.to_string(),
            details,
        };

        let vector = mapping
            .as_object()
            .and_then(|indices| indices.values().next())
            .and_then(|entry| entry.pointer(&format!("/mappings/properties/{VECTOR_FIELD}")))
            .ok_or_else(|| incompatible(format!("no {VECTOR_FIELD} field")))?;

        if vector.pointer("/type").and_then(Value::as_str) != Some("dense_vector") {
            return Err(incompatible(format!("{VECTOR_FIELD} is not a dense_vector")));
        }

        match vector.pointer("/dims").and_then(Value::as_u64) {
            Some(found) if found == dimensions as u64 => Ok(()),
            found => Err(incompatible(format!(
                "{VECTOR_FIELD} has {} dimensions, the model produces {dimensions}",
                found.map_or_else(|| "unknown".to_string(), |dims| dims.to_string())
            ))),
        }
    }
}

async fn expect_success(response: Response) -> Result<Response, StoreError> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(StoreError::BackendResponse {
        backend: BACKEND.to_string(),
        details: format!("{status}: {body}"),
    })
}

fn banner_field<'a>(banner: &'a Value, pointer: &str) -> &'a str {
    banner.pointer(pointer).and_then(Value::as_str).unwrap_or("unknown")
}

#[async_trait]
impl VectorStore for ElasticStore {
    async fn ping(&self) -> bool {
        let Ok(request) = self.request(Method::GET, &[]) else {
            return false;
        };
        match request.send().await {
            Ok(response) => response.status().is_success(),
            Err(error) => {
                debug!(%error, "ping failed");
                false
            }
        }
    }

    async fn ensure_index(&self, index: &str, dimensions: usize) -> Result<(), StoreError> {
        let response = self.request(Method::HEAD, &[index])?.send().await?;

        if response.status() == StatusCode::OK {
            return self.check_vector_mapping(index, dimensions).await;
        }

        if response.status() != StatusCode::NOT_FOUND {
            return Err(StoreError::BackendResponse {
                backend: BACKEND.to_string(),
                details: response.status().to_string(),
            });
        }

        let response = self
            .request(Method::PUT, &[index])?
            .json(&json!({
                "settings": {
                    "number_of_shards": 1,
                    "number_of_replicas": 0
                },
                "mappings": {
                    "dynamic": true,
                    "properties": {
                        VECTOR_FIELD: {
                            "type": "dense_vector",
                            "dims": dimensions,
                            "index": true,
                            "similarity": "cosine"
                        }
                    }
                }
            }))
            .send()
            .await?;

        expect_success(response).await?;
        info!(index, dimensions, "created index");
        Ok(())
    }

    async fn upsert(
        &self,
        index: &str,
        id: &str,
        document: &Map<String, Value>,
    ) -> Result<UpsertOutcome, StoreError> {
        let response = self
            .request(Method::PUT, &[index, "_doc", id])?
            .json(document)
            .send()
            .await?;

        let body: Value = expect_success(response).await?.json().await?;
        match body.pointer("/result").and_then(Value::as_str) {
            Some("created") => Ok(UpsertOutcome::Created),
            Some("updated") | Some("noop") => Ok(UpsertOutcome::Updated),
            other => Err(StoreError::BackendResponse {
                backend: BACKEND.to_string(),
                details: format!("unexpected write result {other:?}"),
            }),
        }
    }

    async fn refresh(&self, index: &str) -> Result<(), StoreError> {
        let response = self.request(Method::POST, &[index, "_refresh"])?.send().await?;
        expect_success(response).await?;
        Ok(())
    }

    async fn count(&self, index: &str) -> Result<u64, StoreError> {
        let response = self.request(Method::GET, &[index, "_count"])?.send().await?;
        let body: Value = expect_success(response).await?.json().await?;
        body.pointer("/count")
            .and_then(Value::as_u64)
            .ok_or_else(|| StoreError::BackendResponse {
                backend: BACKEND.to_string(),
                details: "count missing from response".to_string(),
            })
    }

    async fn knn_search(&self, index: &str, query: &KnnQuery) -> Result<Vec<StoreHit>, StoreError> {
        let body = json!({
            "knn": {
                "field": query.field,
                "query_vector": query.query_vector,
                "k": query.k,
                "num_candidates": query.num_candidates
            },
            "_source": query.source_fields,
            "size": query.k
        });
        debug!(index, k = query.k, num_candidates = query.num_candidates, "knn search");

        let response = self
            .request(Method::POST, &[index, "_search"])?
            .json(&body)
            .send()
            .await?;

        let response_json: Value = expect_success(response).await?.json().await?;
        let hits = response_json
            .pointer("/hits/hits")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut result: Vec<StoreHit> = hits
            .into_iter()
            .map(|raw| StoreHit {
                id: raw
                    .pointer("/_id")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                score: raw.pointer("/_score").and_then(Value::as_f64).unwrap_or(0.0),
                source: raw
                    .get("_source")
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_default(),
            })
            .collect();

        result.sort_by(|left, right| right.score.total_cmp(&left.score));
        Ok(result)
    }
}
