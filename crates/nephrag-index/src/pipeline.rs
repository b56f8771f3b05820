//! Offline collection building: load -> split -> embed -> replace collection.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use nephrag_llm::{LlmError, LlmProvider};
use serde_json::json;
use uuid::Uuid;

use crate::document::{Chunk, DocumentLoader, TextLoader, TextSplitter};
use crate::error::{IndexError, Result};
use crate::vector_store::{VectorPoint, VectorStore};

/// Outcome of a collection build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub collection: String,
    pub documents: usize,
    pub chunks: usize,
}

pub struct IngestionPipeline<P: LlmProvider> {
    loader: TextLoader,
    splitter: TextSplitter,
    store: Arc<dyn VectorStore>,
    provider: Arc<P>,
}

impl<P: LlmProvider> IngestionPipeline<P> {
    #[must_use]
    pub fn new(splitter: TextSplitter, store: Arc<dyn VectorStore>, provider: Arc<P>) -> Self {
        Self {
            loader: TextLoader::default(),
            splitter,
            store,
            provider,
        }
    }

    /// Rebuild `collection` from every supported file directly inside `docs_dir`.
    ///
    /// All chunks are embedded before the existing collection is touched, so a
    /// failed build leaves the previous collection in place. A directory with no
    /// usable text reports zero chunks and does not modify the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory is missing, a document cannot be read,
    /// embedding fails, or the vector store rejects the write.
    pub async fn build(&self, collection: &str, docs_dir: &Path) -> Result<BuildReport> {
        if !self.provider.supports_embeddings() {
            return Err(LlmError::EmbedUnsupported {
                provider: self.provider.name(),
            }
            .into());
        }
        let files = self.list_documents(docs_dir).await?;

        let mut documents = 0;
        let mut chunks: Vec<Chunk> = Vec::new();
        for file in &files {
            for doc in self.loader.load(file).await? {
                documents += 1;
                chunks.extend(self.splitter.split(&doc));
            }
        }
        let splitter = self.splitter.config();
        tracing::debug!(
            collection,
            documents,
            chunks = chunks.len(),
            chunk_size = splitter.chunk_size,
            chunk_overlap = splitter.chunk_overlap,
            "documents split"
        );

        if chunks.is_empty() {
            tracing::warn!(collection, dir = %docs_dir.display(), "no content to index");
            return Ok(BuildReport {
                collection: collection.to_owned(),
                documents,
                chunks: 0,
            });
        }

        let mut points = Vec::with_capacity(chunks.len());
        let mut dimension: Option<usize> = None;
        for chunk in &chunks {
            let vector = self.provider.embed(&chunk.content).await?;
            match dimension {
                None => dimension = Some(vector.len()),
                Some(expected) if expected != vector.len() => {
                    return Err(IndexError::DimensionMismatch {
                        expected,
                        actual: vector.len(),
                    });
                }
                Some(_) => {}
            }
            points.push(chunk_point(chunk, vector));
        }

        let vector_size = u64::try_from(dimension.unwrap_or_default()).unwrap_or(u64::MAX);
        self.store.delete_collection(collection).await?;
        self.store.ensure_collection(collection, vector_size).await?;
        let count = points.len();
        self.store.upsert(collection, points).await?;

        tracing::info!(collection, documents, chunks = count, "collection built");
        Ok(BuildReport {
            collection: collection.to_owned(),
            documents,
            chunks: count,
        })
    }

    async fn list_documents(&self, docs_dir: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = match tokio::fs::read_dir(docs_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(IndexError::MissingDirectory(docs_dir.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_file() && self.loader.accepts(&path) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

fn chunk_point(chunk: &Chunk, vector: Vec<f32>) -> VectorPoint {
    let content_hash = blake3::hash(chunk.content.as_bytes()).to_hex().to_string();

    let mut hasher = blake3::Hasher::new();
    hasher.update(chunk.metadata.source.as_bytes());
    hasher.update(&chunk.chunk_index.to_le_bytes());
    hasher.update(chunk.content.as_bytes());
    let id = Uuid::new_v5(&Uuid::NAMESPACE_OID, hasher.finalize().as_bytes());

    let payload: HashMap<String, serde_json::Value> = HashMap::from([
        ("content".to_owned(), json!(chunk.content)),
        ("source".to_owned(), json!(chunk.metadata.source)),
        ("content_type".to_owned(), json!(chunk.metadata.content_type)),
        ("chunk_index".to_owned(), json!(chunk.chunk_index)),
        ("content_hash".to_owned(), json!(content_hash)),
    ]);

    VectorPoint {
        id: id.to_string(),
        vector,
        payload,
    }
}
