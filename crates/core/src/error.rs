use thiserror::Error;

/// Write-path failures: chunk insertion, metadata-filtered deletion, and
/// bulk document loading.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("embedding count {embeddings} does not match chunk count {chunks}")]
    EmbeddingMismatch { chunks: usize, embeddings: usize },

    #[error("invalid document file {path}: {details}")]
    InvalidDocument { path: String, details: String },

    #[error("vector store error: {0}")]
    Store(#[from] SearchError),
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("search request failed: {0}")]
    Request(String),
}

/// A source-document id that does not follow the `<kind>_<numericId>` shape.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdParseError {
    #[error("unrecognized document kind in id: {0}")]
    UnknownKind(String),

    #[error("malformed numeric suffix in id: {0}")]
    BadNumericSuffix(String),
}

pub type Result<T, E = IndexError> = std::result::Result<T, E>;
