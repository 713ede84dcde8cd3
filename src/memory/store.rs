//! Memory tier store abstraction
//!
//! The engine depends only on this trait; persisted layout (collections,
//! field names) belongs to the implementation. Each record kind lives in
//! its own collection and every collection is independently lockable.

use super::record::{CandidateStatus, MemoryRecord};
use super::tier::{MemoryTier, RecordKind};
use crate::error::Result;
use async_trait::async_trait;
use uuid::Uuid;

/// One similarity search hit
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub record: MemoryRecord,
    /// Similarity, higher is better; no fixed range is assumed
    pub score: f32,
}

/// Outcome of a conditional candidate status update
#[derive(Debug, Clone)]
pub enum StatusSwap {
    /// Status matched and was replaced; carries the updated record
    Swapped(MemoryRecord),
    /// Status did not match; carries the status found
    Mismatch(CandidateStatus),
    /// No candidate with that id
    Missing,
}

/// Per-tier persistence of memory records and their vectors
#[async_trait]
pub trait TierStore: Send + Sync {
    /// Idempotent write keyed by record id. Fails if the record does not
    /// belong to `tier` or its embedding has the wrong dimension.
    async fn upsert(&self, tier: MemoryTier, record: MemoryRecord) -> Result<()>;

    /// Fetch one record
    async fn get(&self, kind: RecordKind, id: Uuid) -> Result<Option<MemoryRecord>>;

    /// Remove one record, returning it if it existed
    async fn delete(&self, kind: RecordKind, id: Uuid) -> Result<Option<MemoryRecord>>;

    /// All records of a kind
    async fn list(&self, kind: RecordKind) -> Result<Vec<MemoryRecord>>;

    /// Nearest-neighbour search over the tier's searchable collection.
    /// Archived persona memories and review candidates are never returned.
    async fn search(&self, tier: MemoryTier, vector: &[f32], limit: usize) -> Result<Vec<SearchHit>>;

    /// Atomically replace a candidate's status iff it currently equals
    /// `expected`. This is the claim every promote/reject goes through.
    async fn compare_and_swap_status(
        &self,
        candidate_id: Uuid,
        expected: CandidateStatus,
        new: CandidateStatus,
    ) -> Result<StatusSwap>;
}
