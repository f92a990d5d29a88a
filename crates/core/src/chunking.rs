use serde_json::{Map, Value};

use crate::models::{ChunkMetadata, ChunkRecord};

/// Target chunk size in characters (roughly 2048 tokens at ~3 chars/token).
pub const DEFAULT_CHUNK_CHARS: usize = 6144;
/// ~20% overlap between consecutive chunks.
pub const DEFAULT_OVERLAP_CHARS: usize = DEFAULT_CHUNK_CHARS / 5;

/// Boundary descent order: paragraph, line, sentence, word. Anything still
/// too long after the last separator is cut at character positions.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", ". ", " "];

#[derive(Debug, Clone, Copy)]
pub struct SplitterConfig {
    pub chunk_chars: usize,
    pub overlap_chars: usize,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_chars: DEFAULT_CHUNK_CHARS,
            overlap_chars: DEFAULT_OVERLAP_CHARS,
        }
    }
}

/// Store primary key of a chunk: `<documentId>_chunk_<index>`.
pub fn chunk_key(document_id: &str, index: u64) -> String {
    format!("{document_id}_chunk_{index}")
}

/// Splits `text` into ordered chunks of at most `chunk_chars` characters,
/// preferring the largest semantic boundary available and carrying
/// `overlap_chars` of trailing context into each following chunk.
///
/// Empty or whitespace-only input yields no chunks; input already within the
/// target size yields exactly one trimmed chunk.
pub fn split_text(text: &str, config: SplitterConfig) -> Vec<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    if char_len(trimmed) <= config.chunk_chars {
        return vec![trimmed.to_string()];
    }

    let pieces = split_recursive(trimmed, &SEPARATORS, config.chunk_chars);
    merge_pieces(pieces, config)
}

/// Splits, assigns chunk identity, and attaches linkage metadata in one
/// pass. Indices are 0-based and gapless per document.
pub fn build_chunks(
    document_id: &str,
    text: &str,
    caller_metadata: &Map<String, Value>,
    config: SplitterConfig,
) -> Vec<ChunkRecord> {
    split_text(text, config)
        .into_iter()
        .enumerate()
        .map(|(index, chunk_text)| {
            let index = index as u64;
            ChunkRecord {
                chunk_key: chunk_key(document_id, index),
                metadata: ChunkMetadata::new(document_id, index, caller_metadata),
                text: chunk_text,
            }
        })
        .collect()
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn split_recursive(text: &str, separators: &[&str], max_chars: usize) -> Vec<String> {
    if char_len(text) <= max_chars {
        return vec![text.to_string()];
    }

    let Some((separator, rest)) = separators.split_first() else {
        return hard_split(text, max_chars);
    };

    if !text.contains(separator) {
        return split_recursive(text, rest, max_chars);
    }

    let mut pieces = Vec::new();
    for fragment in split_keeping_separator(text, separator) {
        if char_len(&fragment) <= max_chars {
            pieces.push(fragment);
        } else {
            pieces.extend(split_recursive(&fragment, rest, max_chars));
        }
    }
    pieces
}

/// Each fragment keeps its trailing separator so that merged chunks
/// reproduce the source text verbatim.
fn split_keeping_separator(text: &str, separator: &str) -> Vec<String> {
    let mut fragments = Vec::new();
    let mut rest = text;
    while let Some(at) = rest.find(separator) {
        let end = at + separator.len();
        fragments.push(rest[..end].to_string());
        rest = &rest[end..];
    }
    if !rest.is_empty() {
        fragments.push(rest.to_string());
    }
    fragments
}

fn hard_split(text: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(max_chars.max(1))
        .map(|window| window.iter().collect())
        .collect()
}

/// Greedy merge of boundary pieces into chunks. When a chunk fills up, its
/// trailing pieces (up to `overlap_chars`) seed the next chunk.
fn merge_pieces(pieces: Vec<String>, config: SplitterConfig) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut window: Vec<String> = Vec::new();
    let mut window_len = 0usize;

    for piece in pieces {
        let piece_len = char_len(&piece);

        if window_len + piece_len > config.chunk_chars && !window.is_empty() {
            push_chunk(&mut chunks, &window);
            while window_len > config.overlap_chars
                || (window_len + piece_len > config.chunk_chars && window_len > 0)
            {
                let removed = window.remove(0);
                window_len -= char_len(&removed);
            }
        }

        window_len += piece_len;
        window.push(piece);
    }

    push_chunk(&mut chunks, &window);
    chunks
}

fn push_chunk(chunks: &mut Vec<String>, window: &[String]) {
    let chunk = window.concat();
    let trimmed = chunk.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}
