use std::time::Duration;

use nephrag_index::{IndexError, VectorStoreError};
use nephrag_llm::LlmError;

use crate::category::Category;
use crate::lab::LabError;

#[derive(Debug, thiserror::Error)]
pub enum NephragError {
    #[error("no vector index exists for category {0}")]
    IndexNotFound(Category),

    #[error(transparent)]
    InvalidInput(#[from] LabError),

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("index error: {0}")]
    Index(#[from] IndexError),

    #[error("vector store error: {0}")]
    VectorStore(#[from] VectorStoreError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),
}

pub type Result<T> = std::result::Result<T, NephragError>;
