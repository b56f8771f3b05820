mod env;
mod types;


pub use types::*;

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, bail};
use nephrag_index::document::SplitterConfig;

use crate::catalog::IndexCatalog;
use crate::category::{Category, KeywordTable};
use crate::service::AskSettings;

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            toml::from_str::<Self>(&content)
                .with_context(|| format!("failed to parse config file {}", path.display()))?
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns an error describing the first setting that cannot work.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.index.chunk_size == 0 {
            bail!("index.chunk_size must be greater than 0");
        }
        if self.index.chunk_overlap >= self.index.chunk_size {
            bail!(
                "index.chunk_overlap ({}) must be smaller than index.chunk_size ({})",
                self.index.chunk_overlap,
                self.index.chunk_size
            );
        }
        if self.retrieval.top_k == 0 {
            bail!("retrieval.top_k must be greater than 0");
        }
        if self.timeouts.search_seconds == 0 {
            bail!("timeouts.search_seconds must be greater than 0");
        }
        if self.timeouts.llm_seconds == 0 {
            bail!("timeouts.llm_seconds must be greater than 0");
        }
        if let Some(slug) = self
            .routing
            .extra_keywords
            .keys()
            .find(|slug| Category::from_slug(slug).is_none())
        {
            bail!("routing.extra_keywords: unknown category slug {slug:?}");
        }
        Ok(())
    }

    /// Built-in keyword table with `routing.extra_keywords` appended.
    #[must_use]
    pub fn keyword_table(&self) -> KeywordTable {
        let mut table = KeywordTable::default();
        for (slug, triggers) in &self.routing.extra_keywords {
            match Category::from_slug(slug) {
                Some(category) => {
                    table.extend(category, triggers.iter().cloned());
                }
                None => tracing::warn!("ignoring extra keywords for unknown category {slug:?}"),
            }
        }
        table
    }

    #[must_use]
    pub fn catalog(&self) -> IndexCatalog {
        IndexCatalog::new(
            self.index.collection_prefix.clone(),
            self.index.collection_suffix.clone(),
            self.index.docs_root.clone(),
        )
    }

    #[must_use]
    pub fn splitter_config(&self) -> SplitterConfig {
        SplitterConfig {
            chunk_size: self.index.chunk_size,
            chunk_overlap: self.index.chunk_overlap,
            sentence_aware: true,
        }
    }

    #[must_use]
    pub fn ask_settings(&self) -> AskSettings {
        AskSettings {
            top_k: self.retrieval.top_k,
            search_timeout: Duration::from_secs(self.timeouts.search_seconds),
            llm_timeout: Duration::from_secs(self.timeouts.llm_seconds),
            generate_answer: self.retrieval.generate_answer,
        }
    }
}
