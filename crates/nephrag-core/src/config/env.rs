use super::{Config, StoreBackend};

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("NEPHRAG_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("NEPHRAG_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("NEPHRAG_LLM_EMBEDDING_MODEL") {
            self.llm.embedding_model = v;
        }
        if let Ok(v) = std::env::var("NEPHRAG_INDEX_BACKEND") {
            match v.parse::<StoreBackend>() {
                Ok(backend) => self.index.backend = backend,
                Err(_) => tracing::warn!("ignoring invalid NEPHRAG_INDEX_BACKEND value: {v}"),
            }
        }
        if let Ok(v) = std::env::var("NEPHRAG_INDEX_ROOT") {
            self.index.root = v.into();
        }
        if let Ok(v) = std::env::var("NEPHRAG_DOCS_ROOT") {
            self.index.docs_root = v.into();
        }
        if let Ok(v) = std::env::var("NEPHRAG_QDRANT_URL") {
            self.index.qdrant_url = v;
        }
        if let Ok(v) = std::env::var("NEPHRAG_RETRIEVAL_TOP_K") {
            match v.parse::<usize>() {
                Ok(k) => self.retrieval.top_k = k,
                Err(_) => tracing::warn!("ignoring invalid NEPHRAG_RETRIEVAL_TOP_K value: {v}"),
            }
        }
        if let Ok(v) = std::env::var("NEPHRAG_RETRIEVAL_SCORE_THRESHOLD") {
            match v.parse::<f32>() {
                Ok(t) if t.is_finite() => self.retrieval.score_threshold = Some(t),
                _ => tracing::warn!("ignoring invalid NEPHRAG_RETRIEVAL_SCORE_THRESHOLD value: {v}"),
            }
        }
        if let Ok(v) = std::env::var("NEPHRAG_GENERATE_ANSWER") {
            match v.parse::<bool>() {
                Ok(enabled) => self.retrieval.generate_answer = enabled,
                Err(_) => tracing::warn!("ignoring invalid NEPHRAG_GENERATE_ANSWER value: {v}"),
            }
        }
        if let Ok(v) = std::env::var("NEPHRAG_TIMEOUT_SEARCH") {
            match v.parse::<u64>() {
                Ok(secs) => self.timeouts.search_seconds = secs,
                Err(_) => tracing::warn!("ignoring invalid NEPHRAG_TIMEOUT_SEARCH value: {v}"),
            }
        }
        if let Ok(v) = std::env::var("NEPHRAG_TIMEOUT_LLM") {
            match v.parse::<u64>() {
                Ok(secs) => self.timeouts.llm_seconds = secs,
                Err(_) => tracing::warn!("ignoring invalid NEPHRAG_TIMEOUT_LLM value: {v}"),
            }
        }
    }
}
