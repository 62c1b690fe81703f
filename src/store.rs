//! Persistence seam for ingestion results.
//!
//! Only an in-memory store ships; durable backends implement [`ResultStore`].

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::ingestion::IngestionResult;

/// Entries kept by [`InMemoryResultStore::new`] before the oldest are evicted.
pub const DEFAULT_STORE_CAPACITY: usize = 1_000;

/// Errors raised by a result store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend rejected or failed the operation.
    #[error("Result store unavailable: {0}")]
    Unavailable(String),
}

/// Stored result ranked against a query embedding.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredDocument {
    /// Key the result is stored under.
    pub document_id: String,
    /// Cosine similarity between the query and the stored embedding.
    pub score: f32,
    /// The stored result.
    #[serde(flatten)]
    pub result: IngestionResult,
}

/// Keyed storage for completed ingestion results.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Insert or replace the result stored under `document_id`.
    async fn put(&self, document_id: &str, result: IngestionResult) -> Result<(), StoreError>;

    /// Fetch the result stored under `document_id`.
    async fn get(&self, document_id: &str) -> Result<Option<IngestionResult>, StoreError>;

    /// Rank stored results that carry an embedding by cosine similarity to `query`, best first,
    /// returning at most `limit` of them.
    async fn search(&self, query: &[f32], limit: usize)
    -> Result<Vec<ScoredDocument>, StoreError>;
}

#[derive(Default)]
struct Entries {
    results: HashMap<String, IngestionResult>,
    // Insertion order, oldest first; a replaced key moves to the back.
    order: VecDeque<String>,
}

/// Process-local store backed by a map.
///
/// Holds at most `capacity` results and evicts the least recently written one when full.
pub struct InMemoryResultStore {
    capacity: usize,
    entries: RwLock<Entries>,
}

impl Default for InMemoryResultStore {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_STORE_CAPACITY)
    }
}

impl InMemoryResultStore {
    /// Create an empty store holding up to [`DEFAULT_STORE_CAPACITY`] results.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store holding up to `capacity` results (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: RwLock::new(Entries::default()),
        }
    }
}

#[async_trait]
impl ResultStore for InMemoryResultStore {
    async fn put(&self, document_id: &str, result: IngestionResult) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        if entries
            .results
            .insert(document_id.to_string(), result)
            .is_some()
        {
            entries.order.retain(|id| id != document_id);
        }
        entries.order.push_back(document_id.to_string());

        while entries.results.len() > self.capacity {
            let Some(oldest) = entries.order.pop_front() else {
                break;
            };
            entries.results.remove(&oldest);
            tracing::debug!(document_id = %oldest, capacity = self.capacity, "Evicted oldest stored result");
        }
        Ok(())
    }

    async fn get(&self, document_id: &str) -> Result<Option<IngestionResult>, StoreError> {
        Ok(self.entries.read().await.results.get(document_id).cloned())
    }

    async fn search(
        &self,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredDocument>, StoreError> {
        let entries = self.entries.read().await;
        let mut scored: Vec<ScoredDocument> = entries
            .results
            .iter()
            .filter_map(|(document_id, result)| {
                let vector = result.embedding_vector.as_deref()?;
                let score = cosine_similarity(query, vector)?;
                Some(ScoredDocument {
                    document_id: document_id.clone(),
                    score,
                    result: result.clone(),
                })
            })
            .collect();
        scored.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.document_id.cmp(&b.document_id))
        });
        scored.truncate(limit);
        Ok(scored)
    }
}

/// Cosine similarity of two equal-length, non-zero vectors.
fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.is_empty() || a.len() != b.len() {
        return None;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 || !dot.is_finite() {
        return None;
    }
    Some(dot / (norm_a * norm_b))
}
