//! Maps categories to vector collection names and document directories.

use std::path::{Path, PathBuf};

use crate::category::Category;
use crate::error::{NephragError, Result};

pub const DEFAULT_PREFIX: &str = "vector_store_";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexCatalog {
    prefix: String,
    suffix: String,
    docs_root: PathBuf,
}

impl Default for IndexCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX, "", "docs")
    }
}

impl IndexCatalog {
    #[must_use]
    pub fn new(prefix: impl Into<String>, suffix: impl Into<String>, docs_root: impl Into<PathBuf>) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: suffix.into(),
            docs_root: docs_root.into(),
        }
    }

    /// `<prefix><slug><suffix>`, or `None` for [`Category::Unknown`].
    #[must_use]
    pub fn collection(&self, category: Category) -> Option<String> {
        category
            .slug()
            .map(|slug| format!("{}{slug}{}", self.prefix, self.suffix))
    }

    /// # Errors
    ///
    /// Returns [`NephragError::IndexNotFound`] when the category has no collection.
    pub fn resolve(&self, category: Category) -> Result<String> {
        self.collection(category)
            .ok_or(NephragError::IndexNotFound(category))
    }

    #[must_use]
    pub fn docs_root(&self) -> &Path {
        &self.docs_root
    }

    /// Source documents for a category live in `<docs_root>/<slug>`.
    #[must_use]
    pub fn docs_dir(&self, category: Category) -> Option<PathBuf> {
        category.slug().map(|slug| self.docs_root.join(slug))
    }
}
