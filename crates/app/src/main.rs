use chrono::Utc;
use clap::{Parser, Subcommand};
use forum_search_core::{
    load_documents_best_effort, CharacterNgramEmbedder, ChromaStore, IndexOutcome, MmrParams,
    SearchCoordinator,
};
use std::path::Path;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "forum-search", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Chroma base URL
    #[arg(long, default_value = "http://localhost:8000")]
    chroma_url: String,

    /// Chroma collection name
    #[arg(long, default_value = "forum_content")]
    collection: String,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest a folder of JSON document files into the vector store.
    Ingest {
        /// Folder searched recursively for .json files.
        #[arg(long)]
        folder: String,
        /// Delete existing chunks of each document before inserting.
        #[arg(long, default_value_t = false)]
        reindex: bool,
    },
    /// Delete every chunk derived from one document.
    Delete {
        /// Source document id, e.g. post_32.
        #[arg(long)]
        document_id: String,
    },
    /// Paginated semantic search returning unique post ids.
    Search {
        /// Search query
        #[arg(long)]
        query: String,
        #[arg(long, default_value = "20")]
        limit: usize,
        #[arg(long, default_value = "0")]
        offset: usize,
    },
    /// Diverse chunk retrieval (MMR) with full linkage metadata.
    Chunks {
        /// Search query
        #[arg(long)]
        query: String,
        /// Number of chunks to return.
        #[arg(long, default_value = "5")]
        k: usize,
        /// Candidate pool fetched before MMR selection.
        #[arg(long, default_value = "10")]
        fetch_k: usize,
        /// Relevance/diversity trade-off: 1.0 = relevance, 0.0 = diversity.
        #[arg(long, default_value = "0.5")]
        lambda_mult: f32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    let store = ChromaStore::new(&cli.chroma_url, &cli.collection)
        .map_err(|error| anyhow::anyhow!(error.to_string()))?;
    let coordinator = SearchCoordinator::new(store, CharacterNgramEmbedder::default());

    info!(
        version = env!("CARGO_PKG_VERSION"),
        started_at = %Utc::now().to_rfc3339(),
        "forum-search boot"
    );

    match cli.command {
        Command::Ingest { folder, reindex } => {
            let batch = load_documents_best_effort(Path::new(&folder))
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            if !batch.skipped_files.is_empty() {
                warn!(
                    skipped = batch.skipped_files.len(),
                    folder = %folder,
                    "some document files were skipped"
                );
                for skipped in &batch.skipped_files {
                    warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipped file");
                }
            }

            let mut indexed = 0usize;
            let mut skipped_empty = 0usize;
            for document in &batch.documents {
                let outcome = if reindex {
                    coordinator
                        .reindex_document(&document.id, &document.text, &document.metadata)
                        .await
                } else {
                    coordinator
                        .index_document(&document.id, &document.text, &document.metadata)
                        .await
                }
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

                match outcome {
                    IndexOutcome::Indexed { .. } => indexed += 1,
                    IndexOutcome::SkippedEmpty => skipped_empty += 1,
                }
            }

            println!(
                "{indexed} documents indexed, {skipped_empty} skipped as empty at {}",
                batch.loaded_at.to_rfc3339()
            );
        }
        Command::Delete { document_id } => {
            coordinator
                .delete_document(&document_id)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            println!("deleted all chunks for {document_id}");
        }
        Command::Search {
            query,
            limit,
            offset,
        } => {
            let post_ids = coordinator
                .semantic_search(&query, limit, offset)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            if post_ids.is_empty() {
                println!("no matching posts");
            }
            for post_id in post_ids {
                println!("post_{post_id}");
            }
        }
        Command::Chunks {
            query,
            k,
            fetch_k,
            lambda_mult,
        } => {
            let hits = coordinator
                .search_chunks(
                    &query,
                    MmrParams {
                        k,
                        fetch_k,
                        lambda_mult,
                    },
                )
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            for hit in hits {
                println!(
                    "score={:.4} chunk={} document={} index={}",
                    hit.score,
                    hit.chunk_key,
                    hit.metadata.original_document_id,
                    hit.metadata.chunk_index
                );
                println!("  {}", hit.text);
            }
        }
    }

    Ok(())
}
