//! Error types for nephrag-index.

use std::path::PathBuf;

/// Errors raised while building or querying a collection.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Document loading or splitting failed.
    #[error("document error: {0}")]
    Document(#[from] crate::document::DocumentError),

    #[error("vector store error: {0}")]
    VectorStore(#[from] crate::vector_store::VectorStoreError),

    /// Embedding provider failure.
    #[error("LLM error: {0}")]
    Llm(#[from] nephrag_llm::LlmError),

    /// Source document directory does not exist.
    #[error("document directory not found: {}", .0.display())]
    MissingDirectory(PathBuf),

    /// Embeddings of one build disagreed on dimension.
    #[error("embedding dimension changed from {expected} to {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Result type alias using `IndexError`.
pub type Result<T> = std::result::Result<T, IndexError>;
