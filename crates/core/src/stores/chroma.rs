use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tokio::sync::OnceCell;
use url::Url;

use crate::error::{IndexError, SearchError};
use crate::models::{ChunkMetadata, ChunkRecord, MetadataFilter, RetrievalHit};
use crate::traits::VectorIndex;

const BACKEND: &str = "chroma";

/// Vector store backed by a Chroma server's REST API. The collection is
/// resolved (and created if absent) lazily on first use; the lookup runs at
/// most once per store instance even under concurrent first calls.
pub struct ChromaStore {
    client: Client,
    endpoint: Url,
    collection_name: String,
    collection_id: OnceCell<String>,
}

impl ChromaStore {
    pub fn new(endpoint: &str, collection_name: impl Into<String>) -> Result<Self, SearchError> {
        Ok(Self {
            client: Client::new(),
            endpoint: Url::parse(endpoint)?,
            collection_name: collection_name.into(),
            collection_id: OnceCell::new(),
        })
    }

    async fn collection_id(&self) -> Result<&str, SearchError> {
        self.collection_id
            .get_or_try_init(|| async {
                let response = self
                    .client
                    .post(self.api_url("collections")?)
                    .json(&json!({
                        "name": self.collection_name,
                        "get_or_create": true,
                    }))
                    .send()
                    .await?;

                if !response.status().is_success() {
                    return Err(backend_error(response.status().to_string()));
                }

                let parsed: Value = response.json().await?;
                parsed
                    .pointer("/id")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| backend_error("collection response missing id".to_string()))
            })
            .await
            .map(String::as_str)
    }

    fn api_url(&self, path: &str) -> Result<Url, SearchError> {
        Ok(self.endpoint.join(&format!("api/v1/{path}"))?)
    }
}

#[async_trait]
impl VectorIndex for ChromaStore {
    async fn insert_chunks(
        &self,
        chunks: &[ChunkRecord],
        embeddings: &[Vec<f32>],
    ) -> Result<(), IndexError> {
        if chunks.len() != embeddings.len() {
            return Err(IndexError::EmbeddingMismatch {
                chunks: chunks.len(),
                embeddings: embeddings.len(),
            });
        }
        if chunks.is_empty() {
            return Ok(());
        }

        let collection = self.collection_id().await?;
        let metadatas = chunks
            .iter()
            .map(|chunk| serde_json::to_value(&chunk.metadata))
            .collect::<Result<Vec<_>, _>>()?;

        let response = self
            .client
            .post(
                self.api_url(&format!("collections/{collection}/add"))
                    .map_err(IndexError::Store)?,
            )
            .json(&json!({
                "ids": chunks.iter().map(|chunk| &chunk.chunk_key).collect::<Vec<_>>(),
                "embeddings": embeddings,
                "documents": chunks.iter().map(|chunk| &chunk.text).collect::<Vec<_>>(),
                "metadatas": metadatas,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(IndexError::BackendResponse {
                backend: BACKEND.to_string(),
                details: response.status().to_string(),
            });
        }
        Ok(())
    }

    async fn delete_where(&self, filter: &MetadataFilter) -> Result<(), IndexError> {
        let collection = self.collection_id().await?;
        let response = self
            .client
            .post(
                self.api_url(&format!("collections/{collection}/delete"))
                    .map_err(IndexError::Store)?,
            )
            .json(&json!({ "where": chroma_where(filter) }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(IndexError::BackendResponse {
                backend: BACKEND.to_string(),
                details: response.status().to_string(),
            });
        }
        Ok(())
    }

    async fn search_nearest(
        &self,
        query_vector: &[f32],
        k: usize,
        include_vectors: bool,
    ) -> Result<Vec<RetrievalHit>, SearchError> {
        let collection = self.collection_id().await?;
        let mut include = vec!["documents", "metadatas", "distances"];
        if include_vectors {
            include.push("embeddings");
        }

        let response = self
            .client
            .post(self.api_url(&format!("collections/{collection}/query"))?)
            .json(&json!({
                "query_embeddings": [query_vector],
                "n_results": k,
                "include": include,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(backend_error(response.status().to_string()));
        }

        let parsed: Value = response.json().await?;
        parse_query_response(&parsed)
    }
}

/// Chroma's `where` takes a plain equality map for one key but requires an
/// explicit `$and` once multiple keys are filtered.
fn chroma_where(filter: &MetadataFilter) -> Value {
    let entries = filter.as_map();
    if entries.len() == 1 {
        return json!(entries);
    }
    let clauses: Vec<Value> = entries
        .iter()
        .map(|(key, value)| json!({ key: value }))
        .collect();
    json!({ "$and": clauses })
}

/// Flattens Chroma's per-query parallel arrays (`ids[0]`, `documents[0]`,
/// ...) into ranked hits. Distances become scores as `1 - distance` so that
/// higher is better.
fn parse_query_response(parsed: &Value) -> Result<Vec<RetrievalHit>, SearchError> {
    let ids = parsed
        .pointer("/ids/0")
        .and_then(Value::as_array)
        .ok_or_else(|| backend_error("query response missing ids".to_string()))?;
    let documents = parsed
        .pointer("/documents/0")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let metadatas = parsed
        .pointer("/metadatas/0")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let distances = parsed
        .pointer("/distances/0")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let embeddings = parsed
        .pointer("/embeddings/0")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut hits = Vec::with_capacity(ids.len());
    for (position, id) in ids.iter().enumerate() {
        let chunk_key = id.as_str().unwrap_or_default().to_string();
        let metadata: ChunkMetadata = match metadatas.get(position) {
            Some(value) => serde_json::from_value(value.clone())?,
            None => {
                return Err(backend_error(format!(
                    "query response missing metadata for {chunk_key}"
                )))
            }
        };
        let text = documents
            .get(position)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let score = distances
            .get(position)
            .and_then(Value::as_f64)
            .map(|distance| (1.0 - distance) as f32)
            .unwrap_or(0.0);
        let vector = embeddings.get(position).and_then(Value::as_array).map(|values| {
            values
                .iter()
                .filter_map(Value::as_f64)
                .map(|value| value as f32)
                .collect()
        });

        hits.push(RetrievalHit {
            chunk_key,
            text,
            metadata,
            score,
            vector,
        });
    }
    Ok(hits)
}

fn backend_error(details: String) -> SearchError {
    SearchError::BackendResponse {
        backend: BACKEND.to_string(),
        details,
    }
}
