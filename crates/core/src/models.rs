use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::IdParseError;

/// Metadata key linking a chunk back to its source document.
pub const ORIGINAL_DOC_ID_KEY: &str = "original_doc_id";
/// Metadata key holding the chunk's zero-based position within its document.
pub const CHUNK_INDEX_KEY: &str = "chunk_index";
/// Metadata key holding the owning post's numeric id for comment/reply chunks.
pub const POST_ID_KEY: &str = "post_id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    Post,
    Comment,
    Reply,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Post => "post",
            DocumentKind::Comment => "comment",
            DocumentKind::Reply => "reply",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed form of a source-document id such as `post_32` or `comment_9`.
///
/// Indexing treats document ids as opaque strings; only the aggregation
/// layer parses them, so unknown kinds surface as skippable errors rather
/// than rejected writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentId {
    pub kind: DocumentKind,
    pub numeric_id: u64,
}

impl FromStr for DocumentId {
    type Err = IdParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (kind_raw, suffix) = raw
            .rsplit_once('_')
            .ok_or_else(|| IdParseError::UnknownKind(raw.to_string()))?;

        let kind = match kind_raw {
            "post" => DocumentKind::Post,
            "comment" => DocumentKind::Comment,
            "reply" => DocumentKind::Reply,
            _ => return Err(IdParseError::UnknownKind(raw.to_string())),
        };

        let numeric_id = suffix
            .parse::<u64>()
            .map_err(|_| IdParseError::BadNumericSuffix(raw.to_string()))?;

        Ok(Self { kind, numeric_id })
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.kind, self.numeric_id)
    }
}

/// A document as supplied by the external content store: opaque id, raw
/// text, and free-form metadata forwarded onto every chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDocument {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Typed chunk metadata: the two reserved linkage fields are required, the
/// owning post id is optional (comments and replies only), and everything
/// else the caller supplied rides along in `extra`.
///
/// Wire names match the store payloads: `original_doc_id`, `chunk_index`,
/// `post_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    #[serde(rename = "original_doc_id")]
    pub original_document_id: String,

    #[serde(rename = "chunk_index")]
    pub chunk_index: u64,

    #[serde(
        rename = "post_id",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_post_id"
    )]
    pub post_id: Option<u64>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChunkMetadata {
    /// Builds chunk metadata from caller-supplied fields. The reserved
    /// linkage keys always win on conflict: any caller entries under
    /// `original_doc_id` or `chunk_index` are dropped. A `post_id` entry is
    /// lifted into the typed field, accepting either a JSON number or a
    /// numeric string.
    pub fn new(
        original_document_id: impl Into<String>,
        chunk_index: u64,
        caller_metadata: &Map<String, Value>,
    ) -> Self {
        let mut extra = caller_metadata.clone();
        extra.remove(ORIGINAL_DOC_ID_KEY);
        extra.remove(CHUNK_INDEX_KEY);
        let post_id = extra.remove(POST_ID_KEY).as_ref().and_then(value_as_u64);

        Self {
            original_document_id: original_document_id.into(),
            chunk_index,
            post_id,
            extra,
        }
    }
}

fn lenient_post_id<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_as_u64))
}

fn value_as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number.as_u64(),
        Value::String(raw) => raw.trim().parse().ok(),
        _ => None,
    }
}

/// One indexable chunk: the store primary key, the chunk text, and its
/// linkage metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub chunk_key: String,
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// A chunk returned from a nearest-neighbor query, best-first. The stored
/// embedding is only populated when the caller asked for vectors (MMR
/// re-ranking needs them).
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalHit {
    pub chunk_key: String,
    pub text: String,
    pub metadata: ChunkMetadata,
    pub score: f32,
    pub vector: Option<Vec<f32>>,
}

/// Key/value equality filter over chunk metadata, used for bulk deletion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataFilter(BTreeMap<String, Value>);

impl MetadataFilter {
    pub fn equals(key: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(key.into(), value.into());
        Self(entries)
    }

    /// Filter matching every chunk derived from one source document.
    pub fn original_document(document_id: &str) -> Self {
        Self::equals(ORIGINAL_DOC_ID_KEY, document_id)
    }

    pub fn as_map(&self) -> &BTreeMap<String, Value> {
        &self.0
    }

    pub fn matches(&self, metadata: &ChunkMetadata) -> bool {
        match serde_json::to_value(metadata) {
            Ok(Value::Object(fields)) => self
                .0
                .iter()
                .all(|(key, expected)| fields.get(key) == Some(expected)),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn caller_metadata(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn document_id_parses_each_kind() {
        let parsed: DocumentId = "post_32".parse().unwrap();
        assert_eq!(parsed.kind, DocumentKind::Post);
        assert_eq!(parsed.numeric_id, 32);

        let parsed: DocumentId = "comment_9".parse().unwrap();
        assert_eq!(parsed.kind, DocumentKind::Comment);

        let parsed: DocumentId = "reply_104".parse().unwrap();
        assert_eq!(parsed.kind, DocumentKind::Reply);
        assert_eq!(parsed.to_string(), "reply_104");
    }

    #[test]
    fn document_id_rejects_unknown_kind() {
        let error = "widget_3".parse::<DocumentId>().unwrap_err();
        assert_eq!(error, IdParseError::UnknownKind("widget_3".to_string()));
    }

    #[test]
    fn document_id_rejects_bad_suffix() {
        let error = "post_abc".parse::<DocumentId>().unwrap_err();
        assert_eq!(error, IdParseError::BadNumericSuffix("post_abc".to_string()));

        assert!("justtext".parse::<DocumentId>().is_err());
    }

    #[test]
    fn reserved_keys_win_over_caller_metadata() {
        let caller = caller_metadata(&[
            (ORIGINAL_DOC_ID_KEY, json!("post_999")),
            (CHUNK_INDEX_KEY, json!(77)),
            ("author_username", json!("string2")),
        ]);

        let metadata = ChunkMetadata::new("comment_4", 2, &caller);
        assert_eq!(metadata.original_document_id, "comment_4");
        assert_eq!(metadata.chunk_index, 2);
        assert!(!metadata.extra.contains_key(ORIGINAL_DOC_ID_KEY));
        assert!(!metadata.extra.contains_key(CHUNK_INDEX_KEY));
        assert_eq!(metadata.extra["author_username"], json!("string2"));
    }

    #[test]
    fn post_id_accepts_number_or_numeric_string() {
        let caller = caller_metadata(&[(POST_ID_KEY, json!("41"))]);
        let metadata = ChunkMetadata::new("comment_9", 0, &caller);
        assert_eq!(metadata.post_id, Some(41));

        let caller = caller_metadata(&[(POST_ID_KEY, json!(17))]);
        let metadata = ChunkMetadata::new("reply_3", 0, &caller);
        assert_eq!(metadata.post_id, Some(17));

        let caller = caller_metadata(&[(POST_ID_KEY, json!("not a number"))]);
        let metadata = ChunkMetadata::new("reply_3", 0, &caller);
        assert_eq!(metadata.post_id, None);
    }

    #[test]
    fn metadata_round_trips_through_json() {
        let caller = caller_metadata(&[
            ("author_username", json!("string")),
            (POST_ID_KEY, json!(41)),
        ]);
        let metadata = ChunkMetadata::new("comment_9", 1, &caller);

        let encoded = serde_json::to_value(&metadata).unwrap();
        assert_eq!(encoded[ORIGINAL_DOC_ID_KEY], json!("comment_9"));
        assert_eq!(encoded[CHUNK_INDEX_KEY], json!(1));
        assert_eq!(encoded[POST_ID_KEY], json!(41));

        let decoded: ChunkMetadata = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, metadata);
    }

    #[test]
    fn filter_matches_on_linkage_field() {
        let metadata = ChunkMetadata::new("post_8", 0, &Map::new());
        assert!(MetadataFilter::original_document("post_8").matches(&metadata));
        assert!(!MetadataFilter::original_document("post_9").matches(&metadata));
    }

    #[test]
    fn filter_matches_extra_fields() {
        let caller = caller_metadata(&[("source_type", json!("post"))]);
        let metadata = ChunkMetadata::new("post_8", 0, &caller);
        assert!(MetadataFilter::equals("source_type", "post").matches(&metadata));
        assert!(!MetadataFilter::equals("source_type", "comment").matches(&metadata));
    }
}
