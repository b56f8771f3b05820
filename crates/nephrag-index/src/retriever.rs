//! Query embedding + top-k similarity search over one collection.

use std::sync::Arc;

use nephrag_llm::{LlmError, LlmProvider};

use crate::error::Result;
use crate::vector_store::{ScoredVectorPoint, VectorStore};

/// Source label used when a stored chunk carries no `source` payload.
pub const UNKNOWN_SOURCE: &str = "unknown source";

/// A retrieved chunk with decoded payload.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub content: String,
    pub source: String,
    pub score: f32,
}

pub struct Retriever<P: LlmProvider> {
    store: Arc<dyn VectorStore>,
    provider: Arc<P>,
    score_threshold: f32,
}

impl<P: LlmProvider> Retriever<P> {
    #[must_use]
    pub fn new(store: Arc<dyn VectorStore>, provider: Arc<P>) -> Self {
        Self {
            store,
            provider,
            score_threshold: f32::MIN,
        }
    }

    /// Drop hits scoring below `threshold`.
    #[must_use]
    pub fn with_score_threshold(mut self, threshold: f32) -> Self {
        self.score_threshold = threshold;
        self
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Return at most `k` chunks of `collection`, most relevant first.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding the query or searching the store fails.
    pub async fn search(&self, collection: &str, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        if !self.provider.supports_embeddings() {
            return Err(LlmError::EmbedUnsupported {
                provider: self.provider.name(),
            }
            .into());
        }

        let vector = self.provider.embed(query).await?;
        let limit = u64::try_from(k).unwrap_or(u64::MAX);
        let points = self.store.search(collection, vector, limit).await?;

        let hits: Vec<SearchHit> = points
            .into_iter()
            .filter(|p| p.score >= self.score_threshold)
            .filter_map(point_to_hit)
            .take(k)
            .collect();

        tracing::debug!(collection, k, hits = hits.len(), "similarity search");
        Ok(hits)
    }
}

fn point_to_hit(point: ScoredVectorPoint) -> Option<SearchHit> {
    let Some(content) = point.payload.get("content").and_then(|v| v.as_str()) else {
        tracing::warn!(id = %point.id, "stored point has no content payload");
        return None;
    };
    let source = point
        .payload
        .get("source")
        .and_then(|v| v.as_str())
        .unwrap_or(UNKNOWN_SOURCE);
    Some(SearchHit {
        content: content.to_owned(),
        source: source.to_owned(),
        score: point.score,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use nephrag_llm::mock::MockProvider;

    use super::*;
    use crate::local::LocalVectorStore;
    use crate::vector_store::VectorPoint;

    fn point(id: &str, vector: Vec<f32>, content: Option<&str>, source: Option<&str>) -> VectorPoint {
        let mut payload = HashMap::new();
        if let Some(c) = content {
            payload.insert("content".to_owned(), serde_json::json!(c));
        }
        if let Some(s) = source {
            payload.insert("source".to_owned(), serde_json::json!(s));
        }
        VectorPoint {
            id: id.into(),
            vector,
            payload,
        }
    }

    async fn seeded_store(dir: &std::path::Path) -> Arc<dyn VectorStore> {
        let store = LocalVectorStore::new(dir);
        store.ensure_collection("col", 2).await.unwrap();
        store
            .upsert(
                "col",
                vec![
                    point("a", vec![1.0, 0.0], Some("alpha"), Some("a.md")),
                    point("b", vec![0.0, 1.0], Some("beta"), None),
                    point("c", vec![0.8, 0.2], Some("gamma"), Some("c.md")),
                ],
            )
            .await
            .unwrap();
        Arc::new(store)
    }

    fn provider(embedding: Vec<f32>) -> Arc<MockProvider> {
        Arc::new(MockProvider::default().with_embedding(embedding))
    }

    #[tokio::test]
    async fn returns_at_most_k_in_relevance_order() {
        let dir = tempfile::tempdir().unwrap();
        let retriever = Retriever::new(seeded_store(dir.path()).await, provider(vec![1.0, 0.0]));
        let hits = retriever.search("col", "query", 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].content, "alpha");
        assert_eq!(hits[0].source, "a.md");
        assert_eq!(hits[1].content, "gamma");
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn missing_source_gets_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let retriever = Retriever::new(seeded_store(dir.path()).await, provider(vec![0.0, 1.0]));
        let hits = retriever.search("col", "query", 1).await.unwrap();
        assert_eq!(hits[0].content, "beta");
        assert_eq!(hits[0].source, UNKNOWN_SOURCE);
    }

    #[tokio::test]
    async fn score_threshold_filters() {
        let dir = tempfile::tempdir().unwrap();
        let retriever = Retriever::new(seeded_store(dir.path()).await, provider(vec![1.0, 0.0]))
            .with_score_threshold(0.99);
        let hits = retriever.search("col", "query", 3).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].content, "alpha");
    }

    #[tokio::test]
    async fn zero_k_skips_embedding() {
        let dir = tempfile::tempdir().unwrap();
        let mock = provider(vec![1.0, 0.0]);
        let retriever = Retriever::new(seeded_store(dir.path()).await, Arc::clone(&mock));
        assert!(retriever.search("col", "query", 0).await.unwrap().is_empty());
        assert_eq!(mock.embed_calls(), 0);
    }

    #[tokio::test]
    async fn provider_without_embeddings_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut mock = MockProvider::default().with_embedding(vec![1.0, 0.0]);
        mock.supports_embeddings = false;
        let mock = Arc::new(mock);
        let retriever = Retriever::new(seeded_store(dir.path()).await, Arc::clone(&mock));

        let err = retriever.search("col", "query", 3).await.unwrap_err();
        assert!(matches!(
            err,
            crate::IndexError::Llm(LlmError::EmbedUnsupported { provider: "mock" })
        ));
        assert_eq!(mock.embed_calls(), 0);
    }

    #[tokio::test]
    async fn query_from_another_embedding_model_errors() {
        let dir = tempfile::tempdir().unwrap();
        let retriever = Retriever::new(seeded_store(dir.path()).await, provider(vec![1.0, 0.0, 0.0]));
        let err = retriever.search("col", "query", 3).await.unwrap_err();
        assert!(matches!(err, crate::IndexError::VectorStore(_)));
    }

    #[test]
    fn point_without_content_is_skipped() {
        let scored = ScoredVectorPoint {
            id: "x".into(),
            score: 0.5,
            payload: HashMap::new(),
        };
        assert!(point_to_hit(scored).is_none());
    }
}
