use std::collections::HashSet;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::chunking::{build_chunks, SplitterConfig};
use crate::embeddings::Embedder;
use crate::error::{IdParseError, IndexError, SearchError};
use crate::models::{DocumentId, DocumentKind, MetadataFilter, RetrievalHit};
use crate::retrieval::{mmr_select, MmrParams};
use crate::traits::VectorIndex;

#[derive(Debug, Clone, Copy)]
pub struct CoordinatorOptions {
    pub splitter: SplitterConfig,
    /// Chunk over-fetch multiplier for paginated semantic search: the store
    /// is asked for `(offset + limit) * overfetch_multiplier` chunks so that
    /// enough unique parent posts are likely found even though several
    /// chunks can map to the same post. This is an approximation, not a
    /// guarantee; deep pagination (large offsets) may under-return.
    pub overfetch_multiplier: usize,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            splitter: SplitterConfig::default(),
            overfetch_multiplier: 5,
        }
    }
}

/// Result of an indexing call. Empty input is a skip, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOutcome {
    Indexed { chunks: usize },
    SkippedEmpty,
}

/// Owns the two collaborator handles (vector store and embedder) and runs
/// every public operation: indexing, deletion, chunk retrieval, and
/// paginated document-level search. Construct once at startup and share by
/// reference.
pub struct SearchCoordinator<S, E>
where
    S: VectorIndex,
    E: Embedder,
{
    store: S,
    embedder: E,
    options: CoordinatorOptions,
}

impl<S, E> SearchCoordinator<S, E>
where
    S: VectorIndex + Send + Sync,
    E: Embedder + Send + Sync,
{
    pub fn new(store: S, embedder: E) -> Self {
        Self::with_options(store, embedder, CoordinatorOptions::default())
    }

    pub fn with_options(store: S, embedder: E, options: CoordinatorOptions) -> Self {
        Self {
            store,
            embedder,
            options,
        }
    }

    pub fn options(&self) -> CoordinatorOptions {
        self.options
    }

    /// Splits `text`, assigns chunk identity and metadata, embeds every
    /// chunk, and bulk-inserts the batch. Whitespace-only text and
    /// zero-chunk splits are skips. The batch is not transactional: a store
    /// failure can leave the document partially indexed, and no rollback is
    /// attempted.
    pub async fn index_document(
        &self,
        document_id: &str,
        text: &str,
        metadata: &Map<String, Value>,
    ) -> Result<IndexOutcome, IndexError> {
        if text.trim().is_empty() {
            warn!(document_id, "document text is empty or whitespace only, skipping");
            return Ok(IndexOutcome::SkippedEmpty);
        }

        let chunks = build_chunks(document_id, text, metadata, self.options.splitter);
        if chunks.is_empty() {
            warn!(document_id, "splitter produced no chunks, skipping");
            return Ok(IndexOutcome::SkippedEmpty);
        }

        let embeddings: Vec<Vec<f32>> = chunks
            .iter()
            .map(|chunk| self.embedder.embed(&chunk.text))
            .collect();

        self.store.insert_chunks(&chunks, &embeddings).await?;
        info!(document_id, chunk_count = chunks.len(), "document indexed");
        Ok(IndexOutcome::Indexed {
            chunks: chunks.len(),
        })
    }

    /// Delete-then-insert. Chunks are never mutated in place; this is the
    /// only supported way to pick up edited document text. Note the two
    /// calls are not atomic: there is a window where the document is absent
    /// from the index.
    pub async fn reindex_document(
        &self,
        document_id: &str,
        text: &str,
        metadata: &Map<String, Value>,
    ) -> Result<IndexOutcome, IndexError> {
        self.delete_document(document_id).await?;
        self.index_document(document_id, text, metadata).await
    }

    /// Removes every chunk derived from `document_id` via a metadata
    /// filter, so the caller never needs to know how many chunks exist.
    /// Deleting a document with no indexed chunks is a no-op.
    pub async fn delete_document(&self, document_id: &str) -> Result<(), IndexError> {
        self.store
            .delete_where(&MetadataFilter::original_document(document_id))
            .await?;
        info!(document_id, "all chunks deleted");
        Ok(())
    }

    /// Diverse chunk retrieval: embeds `query` and MMR-selects `params.k`
    /// hits out of `params.fetch_k` nearest neighbors.
    pub async fn search_chunks(
        &self,
        query: &str,
        params: MmrParams,
    ) -> Result<Vec<RetrievalHit>, SearchError> {
        params.validate()?;
        let query_vector = self.embedder.embed(query);
        self.mmr_search(&query_vector, params).await
    }

    /// Same as [`Self::search_chunks`] but the caller supplies the vector.
    /// With `use_mmr` off this is a plain top-`k` nearest-neighbor search
    /// and `fetch_k`/`lambda_mult` are ignored.
    pub async fn search_chunks_by_vector(
        &self,
        query_vector: &[f32],
        params: MmrParams,
        use_mmr: bool,
    ) -> Result<Vec<RetrievalHit>, SearchError> {
        if !use_mmr {
            return self.store.search_nearest(query_vector, params.k, false).await;
        }
        params.validate()?;
        self.mmr_search(query_vector, params).await
    }

    async fn mmr_search(
        &self,
        query_vector: &[f32],
        params: MmrParams,
    ) -> Result<Vec<RetrievalHit>, SearchError> {
        let candidates = self
            .store
            .search_nearest(query_vector, params.fetch_k, true)
            .await?;
        Ok(mmr_select(query_vector, candidates, &params))
    }

    /// Paginated document-level search: returns unique parent post ids
    /// ordered by the rank of their first-seen chunk, sliced to
    /// `[offset, offset + limit)`.
    ///
    /// Chunk hits resolve to a parent id by document kind: `post_*` uses
    /// the numeric suffix, `comment_*`/`reply_*` use the `post_id` metadata
    /// field. Hits with unknown kinds, malformed suffixes, or a missing
    /// `post_id` are logged and skipped. Fewer unique ids than requested is
    /// returned as-is; no larger fetch is retried.
    pub async fn semantic_search(
        &self,
        query: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<u64>, SearchError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let fetch_budget =
            (offset + limit).saturating_mul(self.options.overfetch_multiplier.max(1));
        let query_vector = self.embedder.embed(query);
        let hits = self
            .store
            .search_nearest(&query_vector, fetch_budget, false)
            .await?;
        info!(
            fetched = hits.len(),
            fetch_budget, limit, offset, "aggregating chunk hits into post ids"
        );

        let mut seen = HashSet::new();
        let mut unique_post_ids = Vec::new();
        for hit in &hits {
            match resolve_post_id(hit) {
                Ok(post_id) => {
                    if seen.insert(post_id) {
                        unique_post_ids.push(post_id);
                    }
                }
                Err(reason) => {
                    warn!(chunk_key = %hit.chunk_key, %reason, "skipping chunk hit");
                }
            }
        }

        Ok(unique_post_ids
            .into_iter()
            .skip(offset)
            .take(limit)
            .collect())
    }

    /// Fail-soft view: collaborator failures are logged and collapsed to
    /// empty defaults, keeping read paths available at the cost of hiding
    /// the distinction between "no results" and "store unreachable".
    pub fn best_effort(&self) -> BestEffort<'_, S, E> {
        BestEffort { inner: self }
    }
}

fn resolve_post_id(hit: &RetrievalHit) -> Result<u64, HitRejection> {
    let document_id: DocumentId = hit.metadata.original_document_id.parse()?;
    match document_id.kind {
        DocumentKind::Post => Ok(document_id.numeric_id),
        DocumentKind::Comment | DocumentKind::Reply => {
            hit.metadata.post_id.ok_or(HitRejection::MissingPostId)
        }
    }
}

#[derive(Debug, Error)]
enum HitRejection {
    #[error(transparent)]
    Id(#[from] IdParseError),

    #[error("comment/reply chunk lacks a post_id in metadata")]
    MissingPostId,
}

/// Adapter restoring the original fail-soft contract on top of the explicit
/// `Result` API: writes swallow errors, reads degrade to empty.
pub struct BestEffort<'a, S, E>
where
    S: VectorIndex,
    E: Embedder,
{
    inner: &'a SearchCoordinator<S, E>,
}

impl<S, E> BestEffort<'_, S, E>
where
    S: VectorIndex + Send + Sync,
    E: Embedder + Send + Sync,
{
    pub async fn index_document(
        &self,
        document_id: &str,
        text: &str,
        metadata: &Map<String, Value>,
    ) {
        if let Err(err) = self.inner.index_document(document_id, text, metadata).await {
            error!(document_id, error = %err, "indexing failed");
        }
    }

    pub async fn delete_document(&self, document_id: &str) {
        if let Err(err) = self.inner.delete_document(document_id).await {
            error!(document_id, error = %err, "deletion failed");
        }
    }

    pub async fn search_chunks(&self, query: &str, params: MmrParams) -> Vec<RetrievalHit> {
        match self.inner.search_chunks(query, params).await {
            Ok(hits) => hits,
            Err(err) => {
                error!(error = %err, "chunk search failed, returning empty");
                Vec::new()
            }
        }
    }

    pub async fn semantic_search(&self, query: &str, limit: usize, offset: usize) -> Vec<u64> {
        match self.inner.semantic_search(query, limit, offset).await {
            Ok(post_ids) => post_ids,
            Err(err) => {
                error!(error = %err, "semantic search failed, returning empty");
                Vec::new()
            }
        }
    }
}
