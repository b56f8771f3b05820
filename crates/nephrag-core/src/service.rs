//! Question answering: route, resolve the collection, search, optionally generate.

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use nephrag_index::{Retriever, SearchHit};
use nephrag_llm::{LlmProvider, Message};

use crate::catalog::IndexCatalog;
use crate::category::{Category, KeywordTable};
use crate::error::{NephragError, Result};

pub const SYSTEM_PROMPT: &str = "You are a nephrology reference assistant. Answer the question \
using only the numbered excerpts provided. If the excerpts do not contain the answer, say so \
plainly. Cite excerpts by number. Reply in the language of the question.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AskSettings {
    pub top_k: usize,
    pub search_timeout: Duration,
    pub llm_timeout: Duration,
    pub generate_answer: bool,
}

impl Default for AskSettings {
    fn default() -> Self {
        Self {
            top_k: 3,
            search_timeout: Duration::from_secs(30),
            llm_timeout: Duration::from_secs(120),
            generate_answer: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub question: String,
    pub category: Category,
    pub collection: String,
    pub hits: Vec<SearchHit>,
    pub generated: Option<String>,
}

pub struct QaService<P: LlmProvider> {
    router: KeywordTable,
    catalog: IndexCatalog,
    retriever: Retriever<P>,
    provider: Arc<P>,
    settings: AskSettings,
}

impl<P: LlmProvider> QaService<P> {
    #[must_use]
    pub fn new(
        router: KeywordTable,
        catalog: IndexCatalog,
        retriever: Retriever<P>,
        provider: Arc<P>,
        settings: AskSettings,
    ) -> Self {
        Self {
            router,
            catalog,
            retriever,
            provider,
            settings,
        }
    }

    #[must_use]
    pub fn route(&self, question: &str) -> Category {
        self.router.route(question)
    }

    #[must_use]
    pub fn settings(&self) -> &AskSettings {
        &self.settings
    }

    /// Answer with the configured `top_k` and generation setting.
    ///
    /// # Errors
    ///
    /// See [`QaService::ask_with`].
    pub async fn ask(&self, question: &str) -> Result<Answer> {
        self.ask_with(question, self.settings.top_k, self.settings.generate_answer)
            .await
    }

    /// Route `question`, retrieve at most `top_k` chunks from its category's
    /// collection and, when `generate` is set and something was found, ask the
    /// provider for an answer grounded in those chunks.
    ///
    /// # Errors
    ///
    /// Returns [`NephragError::IndexNotFound`] when the question routes to
    /// `Unknown` or the category's collection does not exist, `Timeout` when
    /// search or generation exceeds its limit, and the underlying error when
    /// embedding, search or generation fails.
    pub async fn ask_with(&self, question: &str, top_k: usize, generate: bool) -> Result<Answer> {
        let category = self.route(question);
        tracing::debug!(%category, "question routed");

        let collection = self.catalog.resolve(category)?;
        let hits = self.search_collection(category, &collection, question, top_k).await?;

        let generated = if generate && !hits.is_empty() {
            Some(self.generate(question, &hits).await?)
        } else {
            None
        };

        tracing::info!(
            %category,
            collection = %collection,
            hits = hits.len(),
            generated = generated.is_some(),
            "question answered"
        );
        Ok(Answer {
            question: question.to_owned(),
            category,
            collection,
            hits,
            generated,
        })
    }

    /// Look up at most `k` chunks for `query` in the collection of `category`.
    ///
    /// # Errors
    ///
    /// Returns [`NephragError::IndexNotFound`] without searching when the
    /// category has no existing collection.
    pub async fn search(&self, category: Category, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        let collection = self.catalog.resolve(category)?;
        self.search_collection(category, &collection, query, k).await
    }

    async fn search_collection(
        &self,
        category: Category,
        collection: &str,
        query: &str,
        k: usize,
    ) -> Result<Vec<SearchHit>> {
        let after = self.settings.search_timeout;
        tokio::time::timeout(after, self.lookup(category, collection, query, k))
            .await
            .map_err(|_| NephragError::Timeout {
                operation: "search",
                after,
            })?
    }

    /// Existence check and similarity search, bounded together by the caller.
    async fn lookup(
        &self,
        category: Category,
        collection: &str,
        query: &str,
        k: usize,
    ) -> Result<Vec<SearchHit>> {
        if !self.retriever.store().collection_exists(collection).await? {
            tracing::warn!(%category, collection, "collection not found");
            return Err(NephragError::IndexNotFound(category));
        }
        Ok(self.retriever.search(collection, query, k).await?)
    }

    async fn generate(&self, question: &str, hits: &[SearchHit]) -> Result<String> {
        let messages = [
            Message::system(SYSTEM_PROMPT),
            Message::user(build_prompt(question, hits)),
        ];
        let after = self.settings.llm_timeout;
        let reply = tokio::time::timeout(after, self.provider.chat(&messages))
            .await
            .map_err(|_| NephragError::Timeout {
                operation: "generation",
                after,
            })??;
        tracing::debug!(provider = self.provider.name(), chars = reply.len(), "answer generated");
        Ok(reply)
    }
}

fn build_prompt(question: &str, hits: &[SearchHit]) -> String {
    let mut prompt = String::from("Excerpts:\n\n");
    for (i, hit) in hits.iter().enumerate() {
        let _ = writeln!(prompt, "[{}] ({})\n{}\n", i + 1, hit.source, hit.content);
    }
    let _ = write!(prompt, "Question: {question}");
    prompt
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::future::Future;
    use std::pin::Pin;

    use nephrag_index::{
        LocalVectorStore, ScoredVectorPoint, VectorPoint, VectorStore, VectorStoreError,
    };
    use nephrag_llm::mock::MockProvider;

    use super::*;

    async fn seeded_store(dir: &std::path::Path) -> Arc<dyn VectorStore> {
        let store = LocalVectorStore::new(dir);
        store.ensure_collection("vector_store_aki", 2).await.unwrap();
        store
            .upsert(
                "vector_store_aki",
                vec![
                    VectorPoint {
                        id: "1".into(),
                        vector: vec![1.0, 0.0],
                        payload: HashMap::from([
                            ("content".to_owned(), serde_json::json!("AKI is a rapid decline in kidney function.")),
                            ("source".to_owned(), serde_json::json!("aki_overview.md")),
                        ]),
                    },
                    VectorPoint {
                        id: "2".into(),
                        vector: vec![0.0, 1.0],
                        payload: HashMap::from([(
                            "content".to_owned(),
                            serde_json::json!("Creatinine rises within 48 hours."),
                        )]),
                    },
                ],
            )
            .await
            .unwrap();
        store.ensure_collection("vector_store_ckd", 2).await.unwrap();
        Arc::new(store)
    }

    fn provider() -> MockProvider {
        MockProvider::default()
            .with_embedding(vec![1.0, 0.0])
            .with_default_response("AKI is defined by a rapid creatinine rise [1].")
    }

    fn service(store: Arc<dyn VectorStore>, provider: MockProvider, settings: AskSettings) -> QaService<MockProvider> {
        let provider = Arc::new(provider);
        QaService::new(
            KeywordTable::default(),
            IndexCatalog::default(),
            Retriever::new(store, Arc::clone(&provider)),
            provider,
            settings,
        )
    }

    #[tokio::test]
    async fn ask_returns_ranked_hits() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(seeded_store(dir.path()).await, provider(), AskSettings::default());

        let answer = svc.ask("What causes AKI?").await.unwrap();
        assert_eq!(answer.category, Category::AcuteKidneyInjury);
        assert_eq!(answer.collection, "vector_store_aki");
        assert_eq!(answer.hits.len(), 2);
        assert_eq!(answer.hits[0].source, "aki_overview.md");
        assert_eq!(answer.hits[1].source, nephrag_index::retriever::UNKNOWN_SOURCE);
        assert!(answer.generated.is_none());
    }

    #[tokio::test]
    async fn top_k_limits_hits() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(seeded_store(dir.path()).await, provider(), AskSettings::default());
        let answer = svc.ask_with("급성 신손상", 1, false).await.unwrap();
        assert_eq!(answer.hits.len(), 1);
    }

    #[tokio::test]
    async fn unknown_category_never_searches() {
        let dir = tempfile::tempdir().unwrap();
        let mock = provider();
        let svc = service(seeded_store(dir.path()).await, mock.clone(), AskSettings::default());

        let err = svc.ask("How is hypertension treated?").await.unwrap_err();
        assert!(matches!(err, NephragError::IndexNotFound(Category::Unknown)));
        assert_eq!(mock.embed_calls(), 0);
    }

    #[tokio::test]
    async fn missing_collection_never_searches() {
        let dir = tempfile::tempdir().unwrap();
        let mock = provider();
        let svc = service(seeded_store(dir.path()).await, mock.clone(), AskSettings::default());

        let err = svc.ask("nephrotic edema").await.unwrap_err();
        assert!(matches!(err, NephragError::IndexNotFound(Category::NephroticSyndrome)));
        assert_eq!(mock.embed_calls(), 0);
    }

    #[tokio::test]
    async fn search_by_category() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(seeded_store(dir.path()).await, provider(), AskSettings::default());
        let hits = svc
            .search(Category::AcuteKidneyInjury, "definition", 5)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert!(matches!(
            svc.search(Category::Unknown, "definition", 5).await,
            Err(NephragError::IndexNotFound(Category::Unknown))
        ));
    }

    #[tokio::test]
    async fn existing_empty_collection_returns_no_hits() {
        let dir = tempfile::tempdir().unwrap();
        let mock = provider();
        let settings = AskSettings {
            generate_answer: true,
            ..AskSettings::default()
        };
        let svc = service(seeded_store(dir.path()).await, mock.clone(), settings);

        let answer = svc.ask("ckd diet").await.unwrap();
        assert!(answer.hits.is_empty());
        assert!(answer.generated.is_none());
        assert_eq!(mock.chat_calls(), 0);
    }

    #[tokio::test]
    async fn slow_search_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let settings = AskSettings {
            search_timeout: Duration::from_millis(20),
            ..AskSettings::default()
        };
        let svc = service(seeded_store(dir.path()).await, provider().with_delay(2_000), settings);

        let err = svc.ask("aki").await.unwrap_err();
        assert!(matches!(err, NephragError::Timeout { operation: "search", .. }));
    }

    #[tokio::test]
    async fn slow_generation_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let store = seeded_store(dir.path()).await;
        let settings = AskSettings {
            search_timeout: Duration::from_secs(30),
            llm_timeout: Duration::from_millis(20),
            ..AskSettings::default()
        };
        let svc = service(store, provider().with_delay(100), settings);

        let err = svc.ask_with("aki", 3, true).await.unwrap_err();
        assert!(matches!(
            err,
            NephragError::Timeout {
                operation: "generation",
                ..
            }
        ));
    }

    /// Local store whose existence check stalls like an unreachable server.
    struct StalledStore {
        inner: LocalVectorStore,
        stall: Duration,
    }

    type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

    impl VectorStore for StalledStore {
        fn ensure_collection(
            &self,
            collection: &str,
            vector_size: u64,
        ) -> BoxFuture<'_, std::result::Result<(), VectorStoreError>> {
            self.inner.ensure_collection(collection, vector_size)
        }

        fn collection_exists(
            &self,
            collection: &str,
        ) -> BoxFuture<'_, std::result::Result<bool, VectorStoreError>> {
            let collection = collection.to_owned();
            Box::pin(async move {
                tokio::time::sleep(self.stall).await;
                self.inner.collection_exists(&collection).await
            })
        }

        fn delete_collection(
            &self,
            collection: &str,
        ) -> BoxFuture<'_, std::result::Result<(), VectorStoreError>> {
            self.inner.delete_collection(collection)
        }

        fn upsert(
            &self,
            collection: &str,
            points: Vec<VectorPoint>,
        ) -> BoxFuture<'_, std::result::Result<(), VectorStoreError>> {
            self.inner.upsert(collection, points)
        }

        fn search(
            &self,
            collection: &str,
            vector: Vec<f32>,
            limit: u64,
        ) -> BoxFuture<'_, std::result::Result<Vec<ScoredVectorPoint>, VectorStoreError>> {
            self.inner.search(collection, vector, limit)
        }
    }

    #[tokio::test]
    async fn stalled_existence_check_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let inner = LocalVectorStore::new(dir.path());
        inner.ensure_collection("vector_store_aki", 2).await.unwrap();
        let store: Arc<dyn VectorStore> = Arc::new(StalledStore {
            inner,
            stall: Duration::from_millis(2_000),
        });
        let mock = provider();
        let settings = AskSettings {
            search_timeout: Duration::from_millis(50),
            ..AskSettings::default()
        };
        let svc = service(store, mock.clone(), settings);

        let started = std::time::Instant::now();
        let err = svc.ask("aki").await.unwrap_err();
        assert!(matches!(err, NephragError::Timeout { operation: "search", .. }));
        assert!(started.elapsed() < Duration::from_millis(1_500));
        assert_eq!(mock.embed_calls(), 0);
    }

    #[tokio::test]
    async fn generation_uses_hits() {
        let dir = tempfile::tempdir().unwrap();
        let mock = provider();
        let svc = service(seeded_store(dir.path()).await, mock.clone(), AskSettings::default());

        let answer = svc.ask_with("aki definition", 3, true).await.unwrap();
        assert_eq!(
            answer.generated.as_deref(),
            Some("AKI is defined by a rapid creatinine rise [1].")
        );
        assert_eq!(mock.chat_calls(), 1);
    }

    #[tokio::test]
    async fn generation_failure_is_llm_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut mock = provider();
        mock.fail_chat = true;
        let svc = service(seeded_store(dir.path()).await, mock, AskSettings::default());

        let err = svc.ask_with("aki", 3, true).await.unwrap_err();
        assert!(matches!(err, NephragError::Llm(_)));
    }

    #[tokio::test]
    async fn route_uses_configured_table() {
        let dir = tempfile::tempdir().unwrap();
        let mut table = KeywordTable::default();
        table.extend(Category::ElectrolyteDisorder, ["hyperkalemia".to_owned()]);
        let provider = Arc::new(provider());
        let svc = QaService::new(
            table,
            IndexCatalog::default(),
            Retriever::new(seeded_store(dir.path()).await, Arc::clone(&provider)),
            provider,
            AskSettings::default(),
        );
        assert_eq!(svc.route("Hyperkalemia management"), Category::ElectrolyteDisorder);
    }

    #[test]
    fn prompt_numbers_excerpts() {
        let hits = vec![
            SearchHit {
                content: "first".into(),
                source: "a.md".into(),
                score: 0.9,
            },
            SearchHit {
                content: "second".into(),
                source: "b.md".into(),
                score: 0.5,
            },
        ];
        let prompt = build_prompt("why?", &hits);
        assert!(prompt.contains("[1] (a.md)\nfirst"));
        assert!(prompt.contains("[2] (b.md)\nsecond"));
        assert!(prompt.ends_with("Question: why?"));
    }
}
