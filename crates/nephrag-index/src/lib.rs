//! Document ingestion, per-collection vector storage and similarity retrieval.

pub mod document;
pub mod error;
pub mod local;
pub mod pipeline;
pub mod qdrant_ops;
pub mod retriever;
pub mod vector_store;

pub use error::{IndexError, Result};
pub use local::LocalVectorStore;
pub use pipeline::{BuildReport, IngestionPipeline};
pub use qdrant_ops::QdrantOps;
pub use retriever::{Retriever, SearchHit};
pub use vector_store::{ScoredVectorPoint, VectorPoint, VectorStore, VectorStoreError};
