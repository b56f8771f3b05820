//! Directory-per-collection vector store with brute-force cosine search.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::vector_store::{
    BoxFuture, ScoredVectorPoint, VectorPoint, VectorStore, VectorStoreError,
};

const POINTS_FILE: &str = "points.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoredCollection {
    dimension: u64,
    points: Vec<StoredPoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredPoint {
    id: String,
    vector: Vec<f32>,
    payload: HashMap<String, serde_json::Value>,
}

/// Each collection lives in `<root>/<collection>/points.json`.
pub struct LocalVectorStore {
    root: PathBuf,
    cache: RwLock<HashMap<String, Arc<StoredCollection>>>,
}

impl LocalVectorStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collection_dir(&self, collection: &str) -> Result<PathBuf, VectorStoreError> {
        let valid = !collection.is_empty()
            && collection != "."
            && collection != ".."
            && !collection.contains(['/', '\\']);
        if !valid {
            return Err(VectorStoreError::Collection(format!(
                "invalid collection name: {collection:?}"
            )));
        }
        Ok(self.root.join(collection))
    }

    fn cached(&self, collection: &str) -> Result<Option<Arc<StoredCollection>>, VectorStoreError> {
        let cache = self
            .cache
            .read()
            .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
        Ok(cache.get(collection).cloned())
    }

    fn remember(
        &self,
        collection: &str,
        stored: Arc<StoredCollection>,
    ) -> Result<(), VectorStoreError> {
        let mut cache = self
            .cache
            .write()
            .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
        cache.insert(collection.to_owned(), stored);
        Ok(())
    }

    fn forget(&self, collection: &str) -> Result<(), VectorStoreError> {
        let mut cache = self
            .cache
            .write()
            .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
        cache.remove(collection);
        Ok(())
    }

    async fn load(&self, collection: &str) -> Result<Arc<StoredCollection>, VectorStoreError> {
        if let Some(stored) = self.cached(collection)? {
            return Ok(stored);
        }
        let file = self.collection_dir(collection)?.join(POINTS_FILE);
        let bytes = tokio::fs::read(&file).await.map_err(|e| {
            VectorStoreError::Collection(format!("collection {collection} not readable: {e}"))
        })?;
        let stored: StoredCollection = serde_json::from_slice(&bytes)
            .map_err(|e| VectorStoreError::Serialization(e.to_string()))?;
        let stored = Arc::new(stored);
        self.remember(collection, Arc::clone(&stored))?;
        Ok(stored)
    }

    async fn persist(
        &self,
        collection: &str,
        stored: StoredCollection,
    ) -> Result<(), VectorStoreError> {
        let dir = self.collection_dir(collection)?;
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
        let bytes = serde_json::to_vec(&stored)
            .map_err(|e| VectorStoreError::Serialization(e.to_string()))?;

        // Write-then-rename so readers never observe a truncated file.
        let tmp = dir.join(format!("{POINTS_FILE}.tmp"));
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| VectorStoreError::Upsert(e.to_string()))?;
        tokio::fs::rename(&tmp, dir.join(POINTS_FILE))
            .await
            .map_err(|e| VectorStoreError::Upsert(e.to_string()))?;

        self.remember(collection, Arc::new(stored))
    }
}

impl std::fmt::Debug for LocalVectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalVectorStore")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

impl VectorStore for LocalVectorStore {
    fn ensure_collection(
        &self,
        collection: &str,
        vector_size: u64,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let file = self.collection_dir(&collection)?.join(POINTS_FILE);
            let exists = tokio::fs::try_exists(&file)
                .await
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            if exists {
                return Ok(());
            }
            self.persist(
                &collection,
                StoredCollection {
                    dimension: vector_size,
                    points: Vec::new(),
                },
            )
            .await
        })
    }

    fn collection_exists(&self, collection: &str) -> BoxFuture<'_, Result<bool, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let file = self.collection_dir(&collection)?.join(POINTS_FILE);
            tokio::fs::try_exists(&file)
                .await
                .map_err(|e| VectorStoreError::Collection(e.to_string()))
        })
    }

    fn delete_collection(&self, collection: &str) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let dir = self.collection_dir(&collection)?;
            self.forget(&collection)?;
            match tokio::fs::remove_dir_all(&dir).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(VectorStoreError::Collection(e.to_string())),
            }
        })
    }

    fn upsert(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let current = self.load(&collection).await?;
            let mut stored = StoredCollection::clone(&current);

            for p in points {
                if u64::try_from(p.vector.len()).ok() != Some(stored.dimension) {
                    return Err(VectorStoreError::Upsert(format!(
                        "point {} has dimension {}, collection {collection} expects {}",
                        p.id,
                        p.vector.len(),
                        stored.dimension
                    )));
                }
                let point = StoredPoint {
                    id: p.id,
                    vector: p.vector,
                    payload: p.payload,
                };
                if let Some(existing) = stored.points.iter_mut().find(|sp| sp.id == point.id) {
                    *existing = point;
                } else {
                    stored.points.push(point);
                }
            }

            self.persist(&collection, stored).await
        })
    }

    fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: u64,
    ) -> BoxFuture<'_, Result<Vec<ScoredVectorPoint>, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let stored = self
                .load(&collection)
                .await
                .map_err(|e| VectorStoreError::Search(e.to_string()))?;
            if u64::try_from(vector.len()).ok() != Some(stored.dimension) {
                return Err(VectorStoreError::Search(format!(
                    "query has dimension {}, collection {collection} expects {}",
                    vector.len(),
                    stored.dimension
                )));
            }

            let mut scored: Vec<ScoredVectorPoint> = stored
                .points
                .iter()
                .map(|sp| ScoredVectorPoint {
                    id: sp.id.clone(),
                    score: cosine_similarity(&vector, &sp.vector),
                    payload: sp.payload.clone(),
                })
                .collect();

            // Stable sort: equal scores keep insertion order.
            scored.sort_by(|a, b| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            scored.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
            Ok(scored)
        })
    }
}
