use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde_json::Value;
use walkdir::WalkDir;

use crate::error::IndexError;
use crate::models::SourceDocument;

/// Recursively collects `.json` files under `folder`, sorted for stable
/// ingestion order.
pub fn discover_document_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_json = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        if is_json {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

pub struct DocumentBatch {
    pub documents: Vec<SourceDocument>,
    pub skipped_files: Vec<SkippedFile>,
    pub loaded_at: DateTime<Utc>,
}

/// Loads every document file under `folder`, skipping unreadable or
/// malformed files instead of aborting the batch. A file may hold a single
/// document object or an array of them.
pub fn load_documents_best_effort(folder: &Path) -> Result<DocumentBatch, IndexError> {
    let files = discover_document_files(folder);

    if files.is_empty() {
        return Err(IndexError::InvalidDocument {
            path: folder.display().to_string(),
            details: "no .json document files found".to_string(),
        });
    }

    let mut documents = Vec::new();
    let mut skipped_files = Vec::new();

    for path in files {
        match parse_document_file(&path) {
            Ok(mut parsed) => documents.append(&mut parsed),
            Err(error) => skipped_files.push(SkippedFile {
                path,
                reason: error.to_string(),
            }),
        }
    }

    Ok(DocumentBatch {
        documents,
        skipped_files,
        loaded_at: Utc::now(),
    })
}

fn parse_document_file(path: &Path) -> Result<Vec<SourceDocument>, IndexError> {
    let raw = fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&raw)?;

    let documents: Vec<SourceDocument> = match value {
        Value::Array(items) => items
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<_, _>>()?,
        other => vec![serde_json::from_value(other)?],
    };

    for document in &documents {
        if document.id.trim().is_empty() {
            return Err(IndexError::InvalidDocument {
                path: path.display().to_string(),
                details: "document id is empty".to_string(),
            });
        }
    }

    Ok(documents)
}
