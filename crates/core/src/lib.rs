pub mod chunking;
pub mod embeddings;
pub mod error;
pub mod ingest;
pub mod models;
pub mod orchestrator;
pub mod retrieval;
pub mod stores;
pub mod traits;

pub use chunking::{build_chunks, chunk_key, split_text, SplitterConfig};
pub use embeddings::{CharacterNgramEmbedder, Embedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::{IdParseError, IndexError, Result, SearchError};
pub use ingest::{
    discover_document_files, load_documents_best_effort, DocumentBatch, SkippedFile,
};
pub use models::{
    ChunkMetadata, ChunkRecord, DocumentId, DocumentKind, MetadataFilter, RetrievalHit,
    SourceDocument, CHUNK_INDEX_KEY, ORIGINAL_DOC_ID_KEY, POST_ID_KEY,
};
pub use orchestrator::{BestEffort, CoordinatorOptions, IndexOutcome, SearchCoordinator};
pub use retrieval::{cosine_similarity, mmr_select, MmrParams};
pub use stores::{ChromaStore, MemoryStore};
pub use traits::VectorIndex;
