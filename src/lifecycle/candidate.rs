//! Candidate lifecycle orchestration
//!
//! Owns no data: every write goes through the `TierStore`. Promote and
//! reject first claim the candidate with a compare-and-swap on its status,
//! so concurrent transitions on one id resolve to exactly one outcome.

use super::extraction::{extract_all, ExtractionBackend};
use crate::embedding::{embed_checked, Embedder};
use crate::error::{Error, Result};
use crate::memory::{
    CandidateStatus, JournalEntry, MemoryPayload, MemoryRecord, MemoryTier, PersonaMemory,
    PersonaMemoryCandidate, PersonaStatus, RecordKind, StatusSwap, TierStore,
};
use std::sync::Arc;
use uuid::Uuid;

/// What happened to the candidate half of an ingestion
#[derive(Debug)]
pub enum CandidateOutcome {
    /// A candidate now awaits review
    Created(MemoryRecord),
    /// The entry is blocked from elevation; nothing was extracted
    Blocked,
    /// Extraction or candidate write failed; the journal entry is still stored
    Failed(Error),
}

/// Result of ingesting a journal entry. The entry write and the candidate
/// creation are reported separately.
#[derive(Debug)]
pub struct IngestOutcome {
    /// The persisted journal record
    pub entry: MemoryRecord,
    pub candidate: CandidateOutcome,
}

impl IngestOutcome {
    pub fn candidate_record(&self) -> Option<&MemoryRecord> {
        match &self.candidate {
            CandidateOutcome::Created(record) => Some(record),
            _ => None,
        }
    }
}

/// Why a candidate's sources are unusable
enum SourceFault {
    Missing(Uuid),
    Blocked(Uuid),
}

/// Drives journal ingestion and candidate review
pub struct CandidateLifecycle {
    store: Arc<dyn TierStore>,
    embedder: Arc<dyn Embedder>,
    extractor: Arc<dyn ExtractionBackend>,
    dimension: usize,
}

impl CandidateLifecycle {
    pub fn new(
        store: Arc<dyn TierStore>,
        embedder: Arc<dyn Embedder>,
        extractor: Arc<dyn ExtractionBackend>,
        dimension: usize,
    ) -> Self {
        Self {
            store,
            embedder,
            extractor,
            dimension,
        }
    }

    /// Persist a journal entry and, unless it is blocked, create one review
    /// candidate from it.
    ///
    /// Returns `Err` only when the journal entry itself could not be stored.
    pub async fn ingest(&self, entry: JournalEntry) -> Result<IngestOutcome> {
        let vector = embed_checked(self.embedder.as_ref(), &entry.content, self.dimension).await?;
        let blocked = entry.public_elevation_blocked;
        let content = entry.content.clone();
        let record = MemoryRecord::new(MemoryPayload::JournalEntry(entry), vector)?;
        self.store.upsert(MemoryTier::Journal, record.clone()).await?;
        tracing::info!(entry_id = %record.id(), blocked, "Journal entry ingested");

        if blocked {
            return Ok(IngestOutcome {
                entry: record,
                candidate: CandidateOutcome::Blocked,
            });
        }

        let candidate = match self.create_candidate(record.id(), &content).await {
            Ok(Some(candidate)) => CandidateOutcome::Created(candidate),
            Ok(None) => CandidateOutcome::Blocked,
            Err(e) => {
                tracing::warn!(entry_id = %record.id(), "Candidate creation failed: {}", e);
                CandidateOutcome::Failed(e)
            }
        };

        Ok(IngestOutcome {
            entry: record,
            candidate,
        })
    }

    /// Extraction + candidate write. `Ok(None)` means the entry became
    /// blocked while extraction was running.
    async fn create_candidate(&self, entry_id: Uuid, content: &str) -> Result<Option<MemoryRecord>> {
        let extraction = extract_all(self.extractor.as_ref(), content).await?;
        let vector = embed_checked(self.embedder.as_ref(), &extraction.summary, self.dimension)
            .await
            .map_err(|e| Error::Processing(format!("summary embedding failed: {e}")))?;

        let fault = self
            .source_fault(&[entry_id])
            .await
            .map_err(|e| Error::Processing(format!("source check failed: {e}")))?;
        if fault.is_some() {
            tracing::info!(entry_id = %entry_id, "Entry blocked during extraction, discarding candidate");
            return Ok(None);
        }

        let candidate = MemoryRecord::new(
            MemoryPayload::Candidate(PersonaMemoryCandidate {
                summary: extraction.summary,
                themes: extraction.themes,
                narrative_elements: extraction.narrative_elements,
                source_entry_refs: vec![entry_id],
                status: CandidateStatus::AwaitingReview,
                review_notes: None,
                promoted_memory_id: None,
            }),
            vector,
        )
        .map_err(|e| Error::Processing(e.to_string()))?;
        let candidate_id = candidate.id();
        self.store
            .upsert(MemoryTier::Persona, candidate.clone())
            .await
            .map_err(|e| Error::Processing(format!("candidate write failed: {e}")))?;

        // A concurrent block may have swept candidates before this write landed.
        match self.source_fault(&[entry_id]).await {
            Ok(None) => {}
            Ok(Some(_)) => {
                self.store
                    .delete(RecordKind::Candidate, candidate_id)
                    .await
                    .map_err(|e| Error::Processing(format!("candidate cleanup failed: {e}")))?;
                tracing::info!(entry_id = %entry_id, "Entry blocked during candidate write, candidate removed");
                return Ok(None);
            }
            Err(e) => {
                if let Err(cleanup) = self.store.delete(RecordKind::Candidate, candidate_id).await {
                    tracing::error!(candidate_id = %candidate_id, "Failed to remove unverified candidate: {}", cleanup);
                }
                return Err(Error::Processing(format!("source re-check failed: {e}")));
            }
        }

        tracing::info!(entry_id = %entry_id, candidate_id = %candidate_id, "Candidate awaiting review");
        Ok(Some(candidate))
    }

    /// Fetch a journal entry
    pub async fn get_journal_entry(&self, id: Uuid) -> Result<MemoryRecord> {
        self.store
            .get(RecordKind::JournalEntry, id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("journal entry {id}")))
    }

    /// Change an entry's elevation gate.
    ///
    /// Blocking deletes every candidate derived from the entry, whatever its
    /// status, and archives the persona memories promoted from it.
    pub async fn set_elevation_blocked(&self, id: Uuid, blocked: bool) -> Result<MemoryRecord> {
        let mut record = self.get_journal_entry(id).await?;
        record.update(|p| {
            if let MemoryPayload::JournalEntry(entry) = p {
                entry.public_elevation_blocked = blocked;
            }
        })?;
        self.store.upsert(MemoryTier::Journal, record.clone()).await?;

        if blocked {
            let (removed, archived) = self.sweep_derived(id).await?;
            tracing::info!(entry_id = %id, removed, archived, "Entry blocked from elevation");
        }
        Ok(record)
    }

    /// Remove candidates and archive persona memories that reference `entry_id`.
    async fn sweep_derived(&self, entry_id: Uuid) -> Result<(usize, usize)> {
        let mut removed = 0usize;
        for candidate in self.store.list(RecordKind::Candidate).await? {
            let derived = candidate
                .as_candidate()
                .map(|c| c.source_entry_refs.contains(&entry_id))
                .unwrap_or(false);
            if derived {
                self.store.delete(RecordKind::Candidate, candidate.id()).await?;
                removed += 1;
            }
        }

        let mut archived = 0usize;
        for memory in self.store.list(RecordKind::PersonaMemory).await? {
            let active_derived = memory
                .as_persona()
                .map(|m| m.status == PersonaStatus::Active && m.source_entry_refs.contains(&entry_id))
                .unwrap_or(false);
            if active_derived {
                self.archive(memory).await?;
                archived += 1;
            }
        }
        Ok((removed, archived))
    }

    async fn archive(&self, mut record: MemoryRecord) -> Result<MemoryRecord> {
        record.update(|p| {
            if let MemoryPayload::PersonaMemory(m) = p {
                m.status = PersonaStatus::Archived;
            }
        })?;
        self.store.upsert(MemoryTier::Persona, record.clone()).await?;
        Ok(record)
    }

    /// Candidates awaiting review, oldest first.
    ///
    /// Re-checks every candidate's sources: a candidate derived from a
    /// blocked entry is deleted, one whose source is missing is hidden.
    pub async fn list_candidates(&self) -> Result<Vec<MemoryRecord>> {
        let mut listed = Vec::new();
        for record in self.store.list(RecordKind::Candidate).await? {
            let Some(candidate) = record.as_candidate() else {
                tracing::error!(record_id = %record.id(), "Non-candidate record in candidate collection");
                continue;
            };
            if candidate.status != CandidateStatus::AwaitingReview {
                continue;
            }
            match self.source_fault(&candidate.source_entry_refs).await? {
                None => listed.push(record),
                Some(SourceFault::Blocked(entry_id)) => {
                    tracing::error!(
                        candidate_id = %record.id(),
                        entry_id = %entry_id,
                        "Integrity fault: candidate derived from blocked entry, deleting"
                    );
                    self.store.delete(RecordKind::Candidate, record.id()).await?;
                }
                Some(SourceFault::Missing(entry_id)) => {
                    tracing::error!(
                        candidate_id = %record.id(),
                        entry_id = %entry_id,
                        "Integrity fault: candidate source entry missing"
                    );
                }
            }
        }
        Ok(listed)
    }

    /// Fetch a candidate in any status
    pub async fn get_candidate(&self, id: Uuid) -> Result<MemoryRecord> {
        self.store
            .get(RecordKind::Candidate, id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("candidate {id}")))
    }

    /// Promote a candidate, creating a new persona memory.
    ///
    /// A second promote on the same id fails with `Error::Conflict`.
    pub async fn promote(&self, candidate_id: Uuid, review_notes: Option<String>) -> Result<MemoryRecord> {
        let claimed = self
            .claim(candidate_id, CandidateStatus::Promoted)
            .await?;
        let Some(candidate) = claimed.as_candidate().cloned() else {
            return Err(Error::Integrity(format!("{candidate_id} is not a candidate")));
        };

        match self.source_fault(&candidate.source_entry_refs).await {
            Ok(None) => {}
            Ok(Some(SourceFault::Blocked(entry_id))) => {
                self.store.delete(RecordKind::Candidate, candidate_id).await?;
                return Err(Error::Integrity(format!(
                    "candidate {candidate_id} derives from blocked entry {entry_id}; candidate deleted"
                )));
            }
            Ok(Some(SourceFault::Missing(entry_id))) => {
                self.release(candidate_id).await;
                return Err(Error::Integrity(format!(
                    "candidate {candidate_id} references missing entry {entry_id}"
                )));
            }
            Err(e) => {
                self.release(candidate_id).await;
                return Err(e);
            }
        }

        let memory = MemoryRecord::new(
            MemoryPayload::PersonaMemory(PersonaMemory {
                summary: candidate.summary.clone(),
                themes: candidate.themes.clone(),
                narrative_elements: candidate.narrative_elements.clone(),
                source_entry_refs: candidate.source_entry_refs.clone(),
                status: PersonaStatus::Active,
                source_candidate_id: candidate_id,
            }),
            claimed.embedding().to_vec(),
        );
        let memory = match memory {
            Ok(memory) => memory,
            Err(e) => {
                self.release(candidate_id).await;
                return Err(e);
            }
        };
        if let Err(e) = self.store.upsert(MemoryTier::Persona, memory.clone()).await {
            self.release(candidate_id).await;
            return Err(e);
        }

        let mut bookkeeping = claimed;
        let memory_id = memory.id();
        bookkeeping.update(|p| {
            if let MemoryPayload::Candidate(c) = p {
                c.promoted_memory_id = Some(memory_id);
                if review_notes.is_some() {
                    c.review_notes = review_notes;
                }
            }
        })?;
        if let Err(e) = self.store.upsert(MemoryTier::Persona, bookkeeping).await {
            tracing::warn!(candidate_id = %candidate_id, "Failed to record promotion on candidate: {}", e);
        }

        // A block that landed while promoting may have swept before these writes.
        if let Some(SourceFault::Blocked(entry_id)) = self.source_fault(&candidate.source_entry_refs).await? {
            self.sweep_derived(entry_id).await?;
            return Err(Error::Integrity(format!(
                "entry {entry_id} was blocked while promoting candidate {candidate_id}; promotion withdrawn"
            )));
        }

        tracing::info!(candidate_id = %candidate_id, memory_id = %memory_id, "Candidate promoted");
        Ok(memory)
    }

    /// Reject a candidate. The candidate is deleted; no persona memory is
    /// created.
    pub async fn reject(&self, candidate_id: Uuid) -> Result<()> {
        self.claim(candidate_id, CandidateStatus::Rejected).await?;
        if let Err(e) = self.store.delete(RecordKind::Candidate, candidate_id).await {
            // Left behind as `rejected`, which is never listed or promotable.
            tracing::warn!(candidate_id = %candidate_id, "Failed to delete rejected candidate: {}", e);
        }
        tracing::info!(candidate_id = %candidate_id, "Candidate rejected");
        Ok(())
    }

    /// Archive a promoted persona memory so it is no longer searched
    pub async fn archive_persona_memory(&self, memory_id: Uuid) -> Result<MemoryRecord> {
        let record = self
            .store
            .get(RecordKind::PersonaMemory, memory_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("persona memory {memory_id}")))?;
        let record = self.archive(record).await?;
        tracing::info!(memory_id = %memory_id, "Persona memory archived");
        Ok(record)
    }

    /// All promoted persona memories, active and archived
    pub async fn list_persona_memories(&self) -> Result<Vec<MemoryRecord>> {
        self.store.list(RecordKind::PersonaMemory).await
    }

    async fn claim(&self, candidate_id: Uuid, new: CandidateStatus) -> Result<MemoryRecord> {
        match self
            .store
            .compare_and_swap_status(candidate_id, CandidateStatus::AwaitingReview, new)
            .await?
        {
            StatusSwap::Swapped(record) => Ok(record),
            StatusSwap::Mismatch(status) => Err(Error::Conflict {
                candidate_id,
                status,
            }),
            StatusSwap::Missing => Err(Error::NotFound(format!("candidate {candidate_id}"))),
        }
    }

    /// Undo a promote claim after a failure further down the path
    async fn release(&self, candidate_id: Uuid) {
        let result = self
            .store
            .compare_and_swap_status(candidate_id, CandidateStatus::Promoted, CandidateStatus::AwaitingReview)
            .await;
        if let Err(e) = result {
            tracing::error!(candidate_id = %candidate_id, "Failed to release candidate claim: {}", e);
        }
    }

    async fn source_fault(&self, refs: &[Uuid]) -> Result<Option<SourceFault>> {
        for entry_id in refs {
            match self.store.get(RecordKind::JournalEntry, *entry_id).await? {
                None => return Ok(Some(SourceFault::Missing(*entry_id))),
                Some(record) => {
                    let blocked = record
                        .as_journal()
                        .map(|e| e.public_elevation_blocked)
                        .unwrap_or(true);
                    if blocked {
                        return Ok(Some(SourceFault::Blocked(*entry_id)));
                    }
                }
            }
        }
        Ok(None)
    }
}
