use crate::error::{IndexError, SearchError};
use crate::models::{ChunkRecord, MetadataFilter, RetrievalHit};
use async_trait::async_trait;

/// Vector index collaborator: one record per chunk, keyed by chunk key.
#[async_trait]
pub trait VectorIndex {
    /// Bulk upsert of chunks and their embeddings (parallel slices). The
    /// batch is not transactional; a failure may leave it partially
    /// applied, which callers handle by delete-then-reinsert on update.
    async fn insert_chunks(
        &self,
        chunks: &[ChunkRecord],
        embeddings: &[Vec<f32>],
    ) -> Result<(), IndexError>;

    /// Removes every record whose metadata matches all filter entries.
    /// Zero matches is a no-op, not an error.
    async fn delete_where(&self, filter: &MetadataFilter) -> Result<(), IndexError>;

    /// Top-`k` records by similarity to `query_vector`, best first. Ties
    /// break by the store's native order, deterministic for a fixed index
    /// state. `include_vectors` attaches stored embeddings to each hit,
    /// which MMR re-ranking needs.
    async fn search_nearest(
        &self,
        query_vector: &[f32],
        k: usize,
        include_vectors: bool,
    ) -> Result<Vec<RetrievalHit>, SearchError>;
}
