use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{IndexError, SearchError};
use crate::models::{ChunkMetadata, ChunkRecord, MetadataFilter, RetrievalHit};
use crate::retrieval::cosine_similarity;
use crate::traits::VectorIndex;

/// Exact-scan in-process vector store. Every query scores all records with
/// cosine similarity; ties break by chunk key, so ranking is deterministic
/// for a fixed index state. Used by the test suite and small demos.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<BTreeMap<String, StoredRecord>>,
}

struct StoredRecord {
    text: String,
    metadata: ChunkMetadata,
    vector: Vec<f32>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl VectorIndex for MemoryStore {
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

        let mut records = self.records.write().await;
        for (chunk, vector) in chunks.iter().zip(embeddings) {
            records.insert(
                chunk.chunk_key.clone(),
                StoredRecord {
                    text: chunk.text.clone(),
                    metadata: chunk.metadata.clone(),
                    vector: vector.clone(),
                },
            );
        }
        Ok(())
    }

    async fn delete_where(&self, filter: &MetadataFilter) -> Result<(), IndexError> {
        let mut records = self.records.write().await;
        records.retain(|_, record| !filter.matches(&record.metadata));
        Ok(())
    }

    async fn search_nearest(
        &self,
        query_vector: &[f32],
        k: usize,
        include_vectors: bool,
    ) -> Result<Vec<RetrievalHit>, SearchError> {
        let records = self.records.read().await;
        let mut hits: Vec<RetrievalHit> = records
            .iter()
            .map(|(chunk_key, record)| RetrievalHit {
                chunk_key: chunk_key.clone(),
                text: record.text.clone(),
                metadata: record.metadata.clone(),
                score: cosine_similarity(query_vector, &record.vector),
                vector: include_vectors.then(|| record.vector.clone()),
            })
            .collect();

        hits.sort_by(|left, right| {
            right
                .score
                .total_cmp(&left.score)
                .then_with(|| left.chunk_key.cmp(&right.chunk_key))
        });
        hits.truncate(k);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn record(chunk_key: &str, document_id: &str, index: u64, text: &str) -> ChunkRecord {
        ChunkRecord {
            chunk_key: chunk_key.to_string(),
            text: text.to_string(),
            metadata: ChunkMetadata::new(document_id, index, &Map::new()),
        }
    }

    #[tokio::test]
    async fn search_ranks_by_cosine_similarity() {
        let store = MemoryStore::new();
        let chunks = vec![
            record("post_1_chunk_0", "post_1", 0, "aligned"),
            record("post_2_chunk_0", "post_2", 0, "opposite"),
            record("post_3_chunk_0", "post_3", 0, "orthogonal"),
        ];
        let embeddings = vec![vec![1.0, 0.0], vec![-1.0, 0.0], vec![0.0, 1.0]];
        store.insert_chunks(&chunks, &embeddings).await.unwrap();

        let hits = store.search_nearest(&[1.0, 0.0], 3, false).await.unwrap();
        assert_eq!(hits[0].chunk_key, "post_1_chunk_0");
        assert_eq!(hits[1].chunk_key, "post_3_chunk_0");
        assert_eq!(hits[2].chunk_key, "post_2_chunk_0");
        assert!(hits[0].vector.is_none());
    }

    #[tokio::test]
    async fn include_vectors_attaches_stored_embeddings() {
        let store = MemoryStore::new();
        let chunks = vec![record("post_1_chunk_0", "post_1", 0, "text")];
        store
            .insert_chunks(&chunks, &[vec![0.5, 0.5]])
            .await
            .unwrap();

        let hits = store.search_nearest(&[1.0, 0.0], 1, true).await.unwrap();
        assert_eq!(hits[0].vector, Some(vec![0.5, 0.5]));
    }

    #[tokio::test]
    async fn insert_is_an_upsert_by_chunk_key() {
        let store = MemoryStore::new();
        let first = vec![record("post_1_chunk_0", "post_1", 0, "old text")];
        store.insert_chunks(&first, &[vec![1.0]]).await.unwrap();

        let second = vec![record("post_1_chunk_0", "post_1", 0, "new text")];
        store.insert_chunks(&second, &[vec![1.0]]).await.unwrap();

        assert_eq!(store.len().await, 1);
        let hits = store.search_nearest(&[1.0], 1, false).await.unwrap();
        assert_eq!(hits[0].text, "new text");
    }

    #[tokio::test]
    async fn delete_where_removes_only_matches() {
        let store = MemoryStore::new();
        let chunks = vec![
            record("post_1_chunk_0", "post_1", 0, "a"),
            record("post_1_chunk_1", "post_1", 1, "b"),
            record("post_2_chunk_0", "post_2", 0, "c"),
        ];
        store
            .insert_chunks(&chunks, &[vec![1.0], vec![1.0], vec![1.0]])
            .await
            .unwrap();

        store
            .delete_where(&MetadataFilter::original_document("post_1"))
            .await
            .unwrap();

        assert_eq!(store.len().await, 1);
        let hits = store.search_nearest(&[1.0], 5, false).await.unwrap();
        assert_eq!(hits[0].chunk_key, "post_2_chunk_0");
    }

    #[tokio::test]
    async fn mismatched_embedding_count_is_rejected() {
        let store = MemoryStore::new();
        let chunks = vec![record("post_1_chunk_0", "post_1", 0, "a")];
        let result = store.insert_chunks(&chunks, &[]).await;
        assert!(matches!(
            result,
            Err(IndexError::EmbeddingMismatch {
                chunks: 1,
                embeddings: 0
            })
        ));
    }
}
