//! Memory records: a common header plus a tier-tagged payload
//!
//! A record's id and tier are fixed at creation. Promotion never moves a
//! record; it creates a new one in the target tier.

use super::tier::{MemoryTier, RecordKind};
use crate::error::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A stored memory record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    id: Uuid,
    tier: MemoryTier,
    embedding: Vec<f32>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    payload: MemoryPayload,
}

/// Tier-specific payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MemoryPayload {
    /// Raw private journal entry
    JournalEntry(JournalEntry),
    /// Persona memory awaiting review
    Candidate(PersonaMemoryCandidate),
    /// Promoted persona memory
    PersonaMemory(PersonaMemory),
    /// Approved public knowledge
    PublicKnowledge(PublicKnowledge),
}

impl MemoryPayload {
    pub fn kind(&self) -> RecordKind {
        match self {
            MemoryPayload::JournalEntry(_) => RecordKind::JournalEntry,
            MemoryPayload::Candidate(_) => RecordKind::Candidate,
            MemoryPayload::PersonaMemory(_) => RecordKind::PersonaMemory,
            MemoryPayload::PublicKnowledge(_) => RecordKind::PublicKnowledge,
        }
    }
}

/// Journal payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Full raw text
    pub content: String,
    /// Emotional markers chosen by the author
    #[serde(default)]
    pub emotional_markers: Vec<String>,
    /// Themes chosen by the author
    #[serde(default)]
    pub themes: Vec<String>,
    /// When true this entry must never produce a candidate
    #[serde(default)]
    pub public_elevation_blocked: bool,
}

/// Structured narrative elements extracted from an entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrativeElements {
    pub protagonist: Option<String>,
    pub desire: Option<String>,
    pub obstacle: Option<String>,
    pub tone: Option<String>,
}

impl NarrativeElements {
    pub fn is_empty(&self) -> bool {
        self.protagonist.is_none()
            && self.desire.is_none()
            && self.obstacle.is_none()
            && self.tone.is_none()
    }
}

/// Review status of a persona memory candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateStatus {
    AwaitingReview,
    Promoted,
    Rejected,
}

impl CandidateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateStatus::AwaitingReview => "awaiting_review",
            CandidateStatus::Promoted => "promoted",
            CandidateStatus::Rejected => "rejected",
        }
    }

    /// Only `awaiting_review` has outgoing transitions
    pub fn is_terminal(&self) -> bool {
        !matches!(self, CandidateStatus::AwaitingReview)
    }
}

impl fmt::Display for CandidateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Candidate payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonaMemoryCandidate {
    pub summary: String,
    /// Model-classified themes
    pub themes: Vec<String>,
    pub narrative_elements: NarrativeElements,
    /// Journal entries this candidate was derived from (never empty)
    pub source_entry_refs: Vec<Uuid>,
    pub status: CandidateStatus,
    #[serde(default)]
    pub review_notes: Option<String>,
    /// Persona memory created when this candidate was promoted
    #[serde(default)]
    pub promoted_memory_id: Option<Uuid>,
}

/// Lifecycle status of a promoted persona memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonaStatus {
    Active,
    Archived,
}

/// Promoted persona memory payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonaMemory {
    pub summary: String,
    pub themes: Vec<String>,
    pub narrative_elements: NarrativeElements,
    pub source_entry_refs: Vec<Uuid>,
    pub status: PersonaStatus,
    /// Candidate this memory was promoted from
    pub source_candidate_id: Uuid,
}

/// Where approved public content may be used
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextRules {
    #[serde(default)]
    pub allowed_themes: Vec<String>,
    #[serde(default)]
    pub disallowed_themes: Vec<String>,
    #[serde(default)]
    pub context_boundaries: Vec<String>,
}

/// How responses built from public content are constrained
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardrailRules {
    #[serde(default)]
    pub response_templates: Vec<String>,
    #[serde(default)]
    pub fallback_responses: Vec<String>,
}

/// Public knowledge payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKnowledge {
    pub topic: String,
    pub approved_content: String,
    #[serde(default)]
    pub context_rules: ContextRules,
    #[serde(default)]
    pub guardrail_rules: GuardrailRules,
    /// Editor who approved publication
    pub approved_by: String,
}

impl MemoryRecord {
    /// Create a new record with a fresh id; the tier follows the payload.
    pub fn new(payload: MemoryPayload, embedding: Vec<f32>) -> Result<Self> {
        let now = Utc::now();
        Self::restore(Uuid::new_v4(), embedding, now, now, payload)
    }

    /// Rebuild a record from persisted fields (storage adapters).
    pub fn restore(
        id: Uuid,
        embedding: Vec<f32>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
        payload: MemoryPayload,
    ) -> Result<Self> {
        let record = Self {
            id,
            tier: payload.kind().tier(),
            embedding,
            created_at,
            updated_at,
            payload,
        };
        record.validate()?;
        Ok(record)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Tier label as stored on the record
    pub fn tier(&self) -> MemoryTier {
        self.tier
    }

    pub fn kind(&self) -> RecordKind {
        self.payload.kind()
    }

    pub fn embedding(&self) -> &[f32] {
        &self.embedding
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn payload(&self) -> &MemoryPayload {
        &self.payload
    }

    pub fn as_journal(&self) -> Option<&JournalEntry> {
        match &self.payload {
            MemoryPayload::JournalEntry(entry) => Some(entry),
            _ => None,
        }
    }

    pub fn as_candidate(&self) -> Option<&PersonaMemoryCandidate> {
        match &self.payload {
            MemoryPayload::Candidate(candidate) => Some(candidate),
            _ => None,
        }
    }

    pub fn as_persona(&self) -> Option<&PersonaMemory> {
        match &self.payload {
            MemoryPayload::PersonaMemory(memory) => Some(memory),
            _ => None,
        }
    }

    pub fn as_public(&self) -> Option<&PublicKnowledge> {
        match &self.payload {
            MemoryPayload::PublicKnowledge(knowledge) => Some(knowledge),
            _ => None,
        }
    }

    /// Mutate the payload in place. `updated_at` always advances; the
    /// payload kind (and so the tier) cannot change.
    pub fn update<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(&mut MemoryPayload),
    {
        let kind = self.kind();
        let mut payload = self.payload.clone();
        f(&mut payload);
        if payload.kind() != kind {
            return Err(Error::Validation(format!(
                "record {} cannot change kind from {kind} to {}",
                self.id,
                payload.kind()
            )));
        }
        self.payload = payload;
        self.touch();
        Ok(())
    }

    fn touch(&mut self) {
        let now = Utc::now();
        self.updated_at = if now > self.updated_at {
            now
        } else {
            self.updated_at + Duration::microseconds(1)
        };
    }

    /// Check structural invariants that hold regardless of configuration.
    pub fn validate(&self) -> Result<()> {
        if self.tier != self.kind().tier() {
            return Err(Error::Validation(format!(
                "record {} is labelled {} but holds a {} payload",
                self.id,
                self.tier,
                self.kind()
            )));
        }
        if self.embedding.is_empty() {
            return Err(Error::Validation(format!("record {} has an empty embedding", self.id)));
        }
        if self.embedding.iter().any(|v| !v.is_finite()) {
            return Err(Error::Validation(format!(
                "record {} has a non-finite embedding value",
                self.id
            )));
        }

        match &self.payload {
            MemoryPayload::JournalEntry(entry) if entry.content.trim().is_empty() => Err(
                Error::Validation(format!("journal entry {} has no content", self.id)),
            ),
            MemoryPayload::Candidate(c) if c.source_entry_refs.is_empty() => Err(Error::Validation(
                format!("candidate {} has no source entry refs", self.id),
            )),
            MemoryPayload::PersonaMemory(m) if m.source_entry_refs.is_empty() => Err(
                Error::Validation(format!("persona memory {} has no source entry refs", self.id)),
            ),
            MemoryPayload::PublicKnowledge(k) if k.approved_content.trim().is_empty() => Err(
                Error::Validation(format!("public knowledge {} has no approved content", self.id)),
            ),
            _ => Ok(()),
        }
    }
}

/// Builder for journal payloads
pub struct JournalEntryBuilder {
    content: String,
    emotional_markers: Vec<String>,
    themes: Vec<String>,
    public_elevation_blocked: bool,
}

impl JournalEntryBuilder {
    /// Start a builder with the raw entry text
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            emotional_markers: Vec::new(),
            themes: Vec::new(),
            public_elevation_blocked: false,
        }
    }

    /// Add an emotional marker
    pub fn emotional_marker(mut self, marker: impl Into<String>) -> Self {
        self.emotional_markers.push(marker.into());
        self
    }

    /// Add a user-chosen theme
    pub fn theme(mut self, theme: impl Into<String>) -> Self {
        self.themes.push(theme.into());
        self
    }

    /// Block (or unblock) elevation of this entry into persona memory
    pub fn elevation_blocked(mut self, blocked: bool) -> Self {
        self.public_elevation_blocked = blocked;
        self
    }

    /// Build the payload, returning an error if the content is blank
    pub fn build(self) -> Result<JournalEntry> {
        if self.content.trim().is_empty() {
            return Err(Error::Validation("journal content is required".to_string()));
        }
        Ok(JournalEntry {
            content: self.content,
            emotional_markers: self.emotional_markers,
            themes: self.themes,
            public_elevation_blocked: self.public_elevation_blocked,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn journal_payload(content: &str) -> MemoryPayload {
        MemoryPayload::JournalEntry(JournalEntryBuilder::new(content).build().unwrap())
    }

    fn candidate_payload(refs: Vec<Uuid>) -> MemoryPayload {
        MemoryPayload::Candidate(PersonaMemoryCandidate {
            summary: "summary".to_string(),
            themes: vec!["career".to_string()],
            narrative_elements: NarrativeElements::default(),
            source_entry_refs: refs,
            status: CandidateStatus::AwaitingReview,
            review_notes: None,
            promoted_memory_id: None,
        })
    }

    #[test]
    fn test_tier_follows_payload() {
        let journal = MemoryRecord::new(journal_payload("dear diary"), vec![1.0]).unwrap();
        assert_eq!(journal.tier(), MemoryTier::Journal);

        let candidate =
            MemoryRecord::new(candidate_payload(vec![journal.id()]), vec![1.0]).unwrap();
        assert_eq!(candidate.tier(), MemoryTier::Persona);
        assert_eq!(candidate.kind(), RecordKind::Candidate);
    }

    #[test]
    fn test_candidate_requires_source_ref() {
        let err = MemoryRecord::new(candidate_payload(vec![]), vec![1.0]).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_embedding_must_be_finite_and_present() {
        assert!(MemoryRecord::new(journal_payload("x"), vec![]).is_err());
        assert!(MemoryRecord::new(journal_payload("x"), vec![f32::NAN]).is_err());
    }

    #[test]
    fn test_update_advances_updated_at() {
        let mut record = MemoryRecord::new(journal_payload("entry"), vec![0.5, 0.5]).unwrap();
        let before = record.updated_at();
        record
            .update(|p| {
                if let MemoryPayload::JournalEntry(e) = p {
                    e.public_elevation_blocked = true;
                }
            })
            .unwrap();
        assert!(record.updated_at() > before);
        assert_eq!(record.created_at(), before);
        assert!(record.as_journal().unwrap().public_elevation_blocked);
    }

    #[test]
    fn test_update_cannot_change_kind() {
        let mut record = MemoryRecord::new(journal_payload("entry"), vec![1.0]).unwrap();
        let id = record.id();
        let err = record
            .update(|p| *p = candidate_payload(vec![id]))
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(record.tier(), MemoryTier::Journal);
        assert!(record.as_journal().is_some());
    }

    #[test]
    fn test_mislabelled_record_fails_validation() {
        let record = MemoryRecord::new(journal_payload("entry"), vec![1.0]).unwrap();
        let mut json = serde_json::to_value(&record).unwrap();
        json["tier"] = serde_json::json!("public");
        let tampered: MemoryRecord = serde_json::from_value(json).unwrap();
        assert_eq!(tampered.tier(), MemoryTier::Public);
        assert!(tampered.validate().is_err());
    }

    #[test]
    fn test_journal_builder_requires_content() {
        assert!(JournalEntryBuilder::new("   ").build().is_err());
        let entry = JournalEntryBuilder::new("walked by the sea")
            .emotional_marker("calm")
            .theme("nature")
            .elevation_blocked(true)
            .build()
            .unwrap();
        assert_eq!(entry.emotional_markers, vec!["calm"]);
        assert_eq!(entry.themes, vec!["nature"]);
        assert!(entry.public_elevation_blocked);
    }

    #[test]
    fn test_candidate_status_transitions() {
        assert!(!CandidateStatus::AwaitingReview.is_terminal());
        assert!(CandidateStatus::Promoted.is_terminal());
        assert!(CandidateStatus::Rejected.is_terminal());
        assert_eq!(CandidateStatus::AwaitingReview.to_string(), "awaiting_review");
    }
}
