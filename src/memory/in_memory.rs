//! In-memory tier store
//!
//! One `tokio::sync::RwLock` per collection, cosine similarity search.
//! Used for tests, the CLI demo, and single-process deployments.

use super::record::{CandidateStatus, MemoryPayload, MemoryRecord, PersonaStatus};
use super::store::{SearchHit, StatusSwap, TierStore};
use super::tier::{MemoryTier, RecordKind};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

type Collection = Arc<RwLock<HashMap<Uuid, MemoryRecord>>>;

/// In-memory store holding one collection per record kind
pub struct InMemoryTierStore {
    dimension: usize,
    collections: HashMap<RecordKind, Collection>,
}

impl InMemoryTierStore {
    /// Create an empty store accepting embeddings of `dimension`
    pub fn new(dimension: usize) -> Self {
        let collections = RecordKind::ALL
            .into_iter()
            .map(|kind| (kind, Arc::new(RwLock::new(HashMap::new()))))
            .collect();
        Self {
            dimension,
            collections,
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of records of a kind
    pub async fn count(&self, kind: RecordKind) -> usize {
        self.collection(kind).read().await.len()
    }

    fn collection(&self, kind: RecordKind) -> &Collection {
        // Every kind is inserted in `new`
        &self.collections[&kind]
    }

    fn check_dimension(&self, vector: &[f32], what: &str) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(Error::Validation(format!(
                "{what} has dimension {}, store expects {}",
                vector.len(),
                self.dimension
            )));
        }
        Ok(())
    }
}

/// Cosine similarity in [-1, 1]; zero vectors score 0.
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl TierStore for InMemoryTierStore {
    async fn upsert(&self, tier: MemoryTier, record: MemoryRecord) -> Result<()> {
        record.validate()?;
        if record.tier() != tier {
            return Err(Error::Validation(format!(
                "record {} belongs to tier {}, not {tier}",
                record.id(),
                record.tier()
            )));
        }
        self.check_dimension(record.embedding(), "record embedding")?;

        self.collection(record.kind())
            .write()
            .await
            .insert(record.id(), record);
        Ok(())
    }

    async fn get(&self, kind: RecordKind, id: Uuid) -> Result<Option<MemoryRecord>> {
        Ok(self.collection(kind).read().await.get(&id).cloned())
    }

    async fn delete(&self, kind: RecordKind, id: Uuid) -> Result<Option<MemoryRecord>> {
        Ok(self.collection(kind).write().await.remove(&id))
    }

    async fn list(&self, kind: RecordKind) -> Result<Vec<MemoryRecord>> {
        let mut records: Vec<MemoryRecord> =
            self.collection(kind).read().await.values().cloned().collect();
        records.sort_by(|a, b| a.created_at().cmp(&b.created_at()).then(a.id().cmp(&b.id())));
        Ok(records)
    }

    async fn search(&self, tier: MemoryTier, vector: &[f32], limit: usize) -> Result<Vec<SearchHit>> {
        self.check_dimension(vector, "query vector")?;

        let map = self.collection(tier.searchable_kind()).read().await;
        let mut hits: Vec<SearchHit> = map
            .values()
            .filter(|r| match r.payload() {
                MemoryPayload::PersonaMemory(m) => m.status == PersonaStatus::Active,
                MemoryPayload::Candidate(_) => false,
                _ => true,
            })
            .map(|r| SearchHit {
                score: cosine_similarity(vector, r.embedding()),
                record: r.clone(),
            })
            .collect();
        drop(map);

        hits.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then(a.record.id().cmp(&b.record.id()))
        });
        hits.truncate(limit);
        Ok(hits)
    }

    async fn compare_and_swap_status(
        &self,
        candidate_id: Uuid,
        expected: CandidateStatus,
        new: CandidateStatus,
    ) -> Result<StatusSwap> {
        let mut map = self.collection(RecordKind::Candidate).write().await;
        let Some(record) = map.get_mut(&candidate_id) else {
            return Ok(StatusSwap::Missing);
        };
        let current = match record.as_candidate() {
            Some(c) => c.status,
            None => {
                return Err(Error::Integrity(format!(
                    "record {candidate_id} in candidate collection is not a candidate"
                )))
            }
        };
        if current != expected {
            return Ok(StatusSwap::Mismatch(current));
        }
        record.update(|p| {
            if let MemoryPayload::Candidate(c) = p {
                c.status = new;
            }
        })?;
        Ok(StatusSwap::Swapped(record.clone()))
    }
}
